//! 连接生命周期管理
//!
//! [`ChatRelay`] 是整个中继的唯一共享对象：注册表、历史记录和路由器都
//! 放在同一把互斥锁后面，注册 / 改名 / 释放不会交错执行，
//! 每个连接看到的事件顺序也完全相同。

use std::collections::HashMap;
use std::sync::Arc;

use config::{NoticeScope, RelayConfig};
use domain::{
    notices, ClientEvent, ConnectionId, ConnectionState, DomainError, DomainResult,
    MessageEnvelope, Rejection, ServerEvent, Username,
};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::error::ApplicationError;
use crate::history::HistoryLog;
use crate::outbound::{DeliveryError, OutboundSink};
use crate::registry::IdentityRegistry;
use crate::router::{BroadcastRouter, Dispatch};

struct RelayState {
    registry: IdentityRegistry,
    router: BroadcastRouter,
    /// 存活连接的状态；关闭后条目被移除，不保留 `Closed` 墓碑
    sessions: HashMap<ConnectionId, ConnectionState>,
    /// 投递失败、等待断开的连接
    evictions: Vec<(ConnectionId, DeliveryError)>,
    rename_conflict_notice: NoticeScope,
}

impl RelayState {
    fn absorb(&mut self, dispatch: Dispatch) {
        for (connection, err) in dispatch.failed {
            warn!(
                connection_id = %connection,
                error = %err,
                "出站投递失败，连接将被断开"
            );
            self.evictions.push((connection, err));
        }
    }

    /// 该连接在本次操作中是否投递失败
    fn delivery_failure(&self, connection: ConnectionId) -> Option<DeliveryError> {
        self.evictions
            .iter()
            .find(|(evicted, _)| *evicted == connection)
            .map(|(_, err)| *err)
    }

    fn session(&self, connection: ConnectionId) -> DomainResult<&ConnectionState> {
        self.sessions
            .get(&connection)
            .ok_or(DomainError::ConnectionClosed)
    }

    fn identity(&self, connection: ConnectionId) -> DomainResult<Username> {
        self.session(connection)?.require_identity().cloned()
    }

    fn register(&mut self, connection: ConnectionId, raw_name: &str) -> DomainResult<Username> {
        self.session(connection)?.ensure_can_register()?;
        let name = Username::parse(raw_name)?;
        self.registry.register(name.clone(), connection)?;
        self.sessions
            .insert(connection, ConnectionState::Registered(name.clone()));

        let replay = self.router.replay_to(&self.registry, connection);
        debug!(connection_id = %connection, replayed = replay.delivered, "历史消息已回放");
        self.absorb(replay);

        let notice = self
            .router
            .on_system_notice(&self.registry, notices::connected(name.as_str()));
        self.absorb(notice);
        let roster = self.router.broadcast_roster(&self.registry);
        self.absorb(roster);
        Ok(name)
    }

    fn send_public(&mut self, connection: ConnectionId, text: String) -> DomainResult<()> {
        let sender = self.identity(connection)?;
        let dispatch = self.router.on_public_message(&self.registry, &sender, text);
        self.absorb(dispatch);
        Ok(())
    }

    fn send_private(
        &mut self,
        connection: ConnectionId,
        to: String,
        text: String,
    ) -> DomainResult<()> {
        let sender = self.identity(connection)?;
        if self.registry.holder(&to).is_none() {
            debug!(from = %sender, to = %to, "私聊收件人不在线，照常投递");
        }
        let dispatch = self
            .router
            .on_private_message(&self.registry, &sender, to, text);
        self.absorb(dispatch);
        Ok(())
    }

    fn typing(&mut self, connection: ConnectionId, to: Option<String>) -> DomainResult<()> {
        let sender = self.identity(connection)?;
        let dispatch = self.router.on_typing(&self.registry, &sender, to);
        self.absorb(dispatch);
        Ok(())
    }

    fn change_username(
        &mut self,
        connection: ConnectionId,
        raw_name: &str,
    ) -> DomainResult<Option<Username>> {
        let current = self.identity(connection)?;
        let new_name = Username::parse(raw_name)?;
        if new_name == current {
            return Ok(None);
        }

        match self.registry.rename(connection, new_name.clone()) {
            Ok(old) => {
                self.sessions
                    .insert(connection, ConnectionState::Registered(new_name.clone()));
                let text = notices::renamed(old.as_str(), new_name.as_str());
                let notice = self.router.on_system_notice(&self.registry, text);
                self.absorb(notice);
                let roster = self.router.broadcast_roster(&self.registry);
                self.absorb(roster);
                Ok(Some(old))
            }
            Err(err @ DomainError::NameTaken { .. }) => {
                let text = notices::name_in_use(new_name.as_str());
                let dispatch = match self.rename_conflict_notice {
                    NoticeScope::Everyone => self.router.on_system_notice(&self.registry, text),
                    NoticeScope::Requester => {
                        let notice = ServerEvent::Message(MessageEnvelope::system(text));
                        self.router.send_to(connection, notice)
                    }
                };
                self.absorb(dispatch);
                Err(err)
            }
            Err(err) => Err(err),
        }
    }

    /// 关闭连接并清理身份；对同一连接重复调用是空操作
    fn close(&mut self, connection: ConnectionId) -> Option<Username> {
        let mut state = self.sessions.remove(&connection)?;
        self.router.detach(connection);

        let released = state.close();
        let name = self.registry.release(connection);
        debug_assert_eq!(released, name, "session state and registry diverged");

        if let Some(name) = &name {
            let notice = self
                .router
                .on_system_notice(&self.registry, notices::disconnected(name.as_str()));
            self.absorb(notice);
            let roster = self.router.broadcast_roster(&self.registry);
            self.absorb(roster);
        }
        name
    }

    /// 断开所有投递失败的连接。断开本身会产生新的广播，可能继续触发失败。
    fn flush_evictions(&mut self) {
        while let Some((connection, err)) = self.evictions.pop() {
            if let Some(name) = self.close(connection) {
                warn!(
                    connection_id = %connection,
                    username = %name,
                    error = %err,
                    "慢速或已断开的连接被移除"
                );
            }
        }
    }

    fn reject(&mut self, connection: ConnectionId, event: &str, err: &DomainError) {
        let dispatch = self
            .router
            .send_to(connection, ServerEvent::Error(Rejection::new(event, err)));
        self.absorb(dispatch);
    }
}

/// 聊天中继：身份注册表、历史记录、广播路由与连接状态机
pub struct ChatRelay {
    state: Mutex<RelayState>,
}

impl ChatRelay {
    pub fn new(clock: Arc<dyn Clock>, config: &RelayConfig) -> Self {
        let RelayConfig {
            history_capacity,
            private_delivery,
            rename_conflict_notice,
            ..
        } = *config;
        let router = BroadcastRouter::new(
            clock,
            HistoryLog::with_capacity(history_capacity),
            private_delivery,
        );
        Self {
            state: Mutex::new(RelayState {
                registry: IdentityRegistry::new(),
                router,
                sessions: HashMap::new(),
                evictions: Vec::new(),
                rename_conflict_notice,
            }),
        }
    }

    /// 接入一个新连接，初始状态为未注册
    pub async fn admit(&self, sink: Arc<dyn OutboundSink>) -> ConnectionId {
        let connection = ConnectionId::new();
        let mut state = self.state.lock().await;
        state.router.attach(connection, sink);
        state.sessions.insert(connection, ConnectionState::Unregistered);
        info!(connection_id = %connection, "新连接已接入");
        connection
    }

    /// 分发一个入站事件
    pub async fn handle(
        &self,
        connection: ConnectionId,
        event: ClientEvent,
    ) -> Result<(), ApplicationError> {
        match event {
            ClientEvent::Register { name } => self.register(connection, &name).await.map(|_| ()),
            ClientEvent::SendPublicMessage { text } => self.send_public(connection, text).await,
            ClientEvent::SendPrivateMessage { to, message } => {
                self.send_private(connection, to, message).await
            }
            ClientEvent::Typing { to } => self.typing(connection, to).await,
            ClientEvent::ChangeUsername { new_name } => {
                self.change_username(connection, &new_name).await.map(|_| ())
            }
            ClientEvent::Disconnect => {
                self.close(connection).await;
                Ok(())
            }
        }
    }

    /// 注册显示名称。成功后向该连接回放历史，并广播上线通知和名单。
    ///
    /// 注册过程中该连接自身的出站队列失效时，连接随即被断开，返回
    /// [`ApplicationError::Delivery`]。
    pub async fn register(
        &self,
        connection: ConnectionId,
        name: &str,
    ) -> Result<Username, ApplicationError> {
        let mut state = self.state.lock().await;
        let result = state.register(connection, name);
        let lost = match &result {
            Ok(name) => {
                info!(connection_id = %connection, username = %name, "用户已注册");
                state.delivery_failure(connection)
            }
            Err(err) => {
                info!(connection_id = %connection, error = %err, "注册被拒绝");
                state.reject(connection, "register", err);
                None
            }
        };
        state.flush_evictions();
        match lost {
            Some(err) => Err(err.into()),
            None => result.map_err(Into::into),
        }
    }

    pub async fn send_public(
        &self,
        connection: ConnectionId,
        text: String,
    ) -> Result<(), ApplicationError> {
        let mut state = self.state.lock().await;
        let result = state.send_public(connection, text);
        Self::finish(&mut state, connection, "sendPublicMessage", result)
    }

    pub async fn send_private(
        &self,
        connection: ConnectionId,
        to: String,
        text: String,
    ) -> Result<(), ApplicationError> {
        let mut state = self.state.lock().await;
        let result = state.send_private(connection, to, text);
        Self::finish(&mut state, connection, "sendPrivateMessage", result)
    }

    pub async fn typing(
        &self,
        connection: ConnectionId,
        to: Option<String>,
    ) -> Result<(), ApplicationError> {
        let mut state = self.state.lock().await;
        let result = state.typing(connection, to);
        Self::finish(&mut state, connection, "typing", result)
    }

    /// 修改显示名称，成功时返回旧名称；改成当前名称时返回 `None`。
    ///
    /// 名称冲突不会单独回复拒绝，而是按配置发出系统通知。
    pub async fn change_username(
        &self,
        connection: ConnectionId,
        new_name: &str,
    ) -> Result<Option<Username>, ApplicationError> {
        let mut state = self.state.lock().await;
        let result = state.change_username(connection, new_name);
        match &result {
            Ok(Some(old)) => {
                info!(connection_id = %connection, from = %old, to = %new_name, "用户已改名");
            }
            Ok(None) => {}
            Err(err @ DomainError::NameTaken { .. }) => {
                info!(connection_id = %connection, error = %err, "改名冲突");
            }
            Err(err) => state.reject(connection, "changeUsername", err),
        }
        state.flush_evictions();
        result.map_err(Into::into)
    }

    /// 关闭连接，返回被释放的名称。可以安全地重复调用。
    pub async fn close(&self, connection: ConnectionId) -> Option<Username> {
        let mut state = self.state.lock().await;
        let released = state.close(connection);
        state.flush_evictions();
        match &released {
            Some(name) => info!(connection_id = %connection, username = %name, "用户已断开"),
            None => debug!(connection_id = %connection, "未注册或已关闭的连接断开"),
        }
        released
    }

    /// 向单个连接回复拒绝（例如传输层解析失败的帧）
    pub async fn reject(&self, connection: ConnectionId, event: &str, err: &DomainError) {
        let mut state = self.state.lock().await;
        state.reject(connection, event, err);
        state.flush_evictions();
    }

    /// 当前在线名单
    pub async fn roster(&self) -> Vec<String> {
        self.state.lock().await.registry.snapshot()
    }

    /// 历史记录快照
    pub async fn history(&self) -> Vec<MessageEnvelope> {
        self.state.lock().await.router.history().snapshot()
    }

    /// 连接的当前状态。已关闭（包括被驱逐）的连接不再保留，返回 `None`。
    pub async fn connection_state(&self, connection: ConnectionId) -> Option<ConnectionState> {
        self.state.lock().await.sessions.get(&connection).cloned()
    }

    pub async fn connection_count(&self) -> usize {
        self.state.lock().await.sessions.len()
    }

    fn finish(
        state: &mut RelayState,
        connection: ConnectionId,
        event: &str,
        result: DomainResult<()>,
    ) -> Result<(), ApplicationError> {
        if let Err(err) = &result {
            debug!(connection_id = %connection, event, error = %err, "事件被拒绝");
            state.reject(connection, event, err);
        }
        state.flush_evictions();
        result.map_err(Into::into)
    }
}
