//! 广播路由器
//!
//! 为入站事件盖上发送者和时间戳，写入历史后扇出到所有已注册连接。
//! 路由器一次只处理一个事件，所有连接看到的信封顺序完全一致。

use std::collections::HashMap;
use std::sync::Arc;

use config::DeliveryScope;
use domain::{ConnectionId, MessageEnvelope, ServerEvent, Username};

use crate::clock::{time_of_day, Clock};
use crate::history::HistoryLog;
use crate::outbound::{DeliveryError, OutboundSink};
use crate::registry::IdentityRegistry;

/// 一次扇出的结果。投递失败的连接由调用方决定如何处理。
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Dispatch {
    pub delivered: usize,
    pub failed: Vec<(ConnectionId, DeliveryError)>,
}

impl Dispatch {
    fn record(&mut self, connection: ConnectionId, result: Result<(), DeliveryError>) {
        match result {
            Ok(()) => self.delivered += 1,
            Err(err) => self.failed.push((connection, err)),
        }
    }
}

pub struct BroadcastRouter {
    clock: Arc<dyn Clock>,
    history: HistoryLog,
    endpoints: HashMap<ConnectionId, Arc<dyn OutboundSink>>,
    private_delivery: DeliveryScope,
}

impl BroadcastRouter {
    pub fn new(
        clock: Arc<dyn Clock>,
        history: HistoryLog,
        private_delivery: DeliveryScope,
    ) -> Self {
        Self {
            clock,
            history,
            endpoints: HashMap::new(),
            private_delivery,
        }
    }

    /// 接入连接的出站端点
    pub fn attach(&mut self, connection: ConnectionId, sink: Arc<dyn OutboundSink>) {
        self.endpoints.insert(connection, sink);
    }

    /// 移除出站端点，之后不再向该连接投递
    pub fn detach(&mut self, connection: ConnectionId) -> bool {
        self.endpoints.remove(&connection).is_some()
    }

    pub fn is_attached(&self, connection: ConnectionId) -> bool {
        self.endpoints.contains_key(&connection)
    }

    pub fn endpoint_count(&self) -> usize {
        self.endpoints.len()
    }

    pub fn history(&self) -> &HistoryLog {
        &self.history
    }

    pub fn on_public_message(
        &mut self,
        registry: &IdentityRegistry,
        sender: &Username,
        text: impl Into<String>,
    ) -> Dispatch {
        let envelope = MessageEnvelope::public(sender, text, time_of_day(self.clock.as_ref()));
        self.publish(registry, envelope)
    }

    /// 收件人不在线也照常投递，接收方根据 `to` 自行过滤
    pub fn on_private_message(
        &mut self,
        registry: &IdentityRegistry,
        sender: &Username,
        recipient: impl Into<String>,
        text: impl Into<String>,
    ) -> Dispatch {
        let envelope = MessageEnvelope::private(
            sender,
            recipient,
            text,
            time_of_day(self.clock.as_ref()),
        );
        self.publish(registry, envelope)
    }

    /// 输入提示只广播，不写入历史
    pub fn on_typing(
        &mut self,
        registry: &IdentityRegistry,
        sender: &Username,
        recipient: Option<String>,
    ) -> Dispatch {
        self.publish(registry, MessageEnvelope::typing(sender, recipient))
    }

    pub fn on_system_notice(
        &mut self,
        registry: &IdentityRegistry,
        text: impl Into<String>,
    ) -> Dispatch {
        self.publish(registry, MessageEnvelope::system(text))
    }

    /// 推送当前名单（独立事件，不是消息信封）
    pub fn broadcast_roster(&self, registry: &IdentityRegistry) -> Dispatch {
        let event = ServerEvent::UserList(registry.snapshot());
        let mut dispatch = Dispatch::default();
        for connection in registry.connections() {
            if let Some(sink) = self.endpoints.get(&connection) {
                dispatch.record(connection, sink.deliver(event.clone()));
            }
        }
        dispatch
    }

    /// 向单个已注册连接回放历史，不影响其他连接
    pub fn replay_to(&self, registry: &IdentityRegistry, connection: ConnectionId) -> Dispatch {
        let mut dispatch = Dispatch::default();
        let (Some(sink), Some(name)) = (
            self.endpoints.get(&connection),
            registry.name_of(connection),
        ) else {
            return dispatch;
        };

        let participants_only = self.private_delivery == DeliveryScope::Participants;
        let result = self.history.replay_to(sink.as_ref(), |envelope| {
            let scoped = participants_only && envelope.recipient().is_some();
            !scoped || envelope.involves(name.as_str())
        });
        match result {
            Ok(count) => dispatch.delivered = count,
            Err(err) => dispatch.failed.push((connection, err)),
        }
        dispatch
    }

    /// 定向投递给单个连接（拒绝回复、仅请求方可见的通知）
    pub fn send_to(&self, connection: ConnectionId, event: ServerEvent) -> Dispatch {
        let mut dispatch = Dispatch::default();
        if let Some(sink) = self.endpoints.get(&connection) {
            dispatch.record(connection, sink.deliver(event));
        }
        dispatch
    }

    fn publish(&mut self, registry: &IdentityRegistry, envelope: MessageEnvelope) -> Dispatch {
        if envelope.is_persistent() {
            self.history.append(envelope.clone());
        }

        // 只投递给发送者和收件人时，保留一份信封用于筛选
        let scoped = (self.private_delivery == DeliveryScope::Participants
            && envelope.recipient().is_some())
        .then(|| envelope.clone());
        let event = ServerEvent::Message(envelope);
        let mut dispatch = Dispatch::default();

        // 未注册的连接不接收广播，注册时通过回放补齐
        for connection in registry.connections() {
            let Some(sink) = self.endpoints.get(&connection) else {
                continue;
            };
            if let Some(envelope) = &scoped {
                let in_scope = registry
                    .name_of(connection)
                    .is_some_and(|name| envelope.involves(name.as_str()));
                if !in_scope {
                    continue;
                }
            }
            dispatch.record(connection, sink.deliver(event.clone()));
        }

        tracing::debug!(
            delivered = dispatch.delivered,
            failed = dispatch.failed.len(),
            "envelope dispatched"
        );
        dispatch
    }
}
