use std::sync::Arc;

use application::{ChannelSink, ChatRelay, OutboundQueue};
use axum::extract::ws::{Message as WsMessage, WebSocket};
use domain::{ClientEvent, ConnectionId, DomainError};
use futures_util::{
    stream::{SplitSink, SplitStream},
    SinkExt, StreamExt,
};

use crate::state::AppState;

/// 无法识别事件名时拒绝回复中使用的名称
const UNKNOWN_EVENT: &str = "unknown";

/// WebSocket 连接
///
/// 读任务把入站帧解析成 [`ClientEvent`] 交给中继；写任务把中继投递到
/// 出站队列的事件序列化后写回客户端。任意一端结束，连接即被关闭。
pub struct WebSocketConnection {
    socket: WebSocket,
    relay: Arc<ChatRelay>,
    connection: ConnectionId,
    outbound: OutboundQueue,
}

impl WebSocketConnection {
    /// 在中继中登记新连接，初始状态为未注册
    pub async fn new(socket: WebSocket, state: AppState) -> Self {
        let (sink, outbound) = ChannelSink::channel(state.outbound_buffer);
        let connection = state.relay.admit(Arc::new(sink)).await;
        tracing::info!(connection_id = %connection, "WebSocket 连接已建立");

        Self {
            socket,
            relay: state.relay,
            connection,
            outbound,
        }
    }

    /// 运行连接主循环，返回时连接已从中继移除
    pub async fn run(self) {
        let Self {
            socket,
            relay,
            connection,
            outbound,
        } = self;
        let (sender, incoming) = socket.split();

        let mut send_task = tokio::spawn(write_loop(sender, outbound, connection));
        let mut recv_task = tokio::spawn(read_loop(incoming, relay.clone(), connection));

        tokio::select! {
            _ = &mut send_task => {
                tracing::debug!(connection_id = %connection, "WebSocket发送任务完成");
                recv_task.abort();
            }
            _ = &mut recv_task => {
                tracing::debug!(connection_id = %connection, "WebSocket接收任务完成");
                send_task.abort();
            }
        }

        // 被驱逐的连接此时已经关闭，这里是空操作
        relay.close(connection).await;
        tracing::info!(connection_id = %connection, "WebSocket连接已断开");
    }
}

async fn write_loop(
    mut sender: SplitSink<WebSocket, WsMessage>,
    mut outbound: OutboundQueue,
    connection: ConnectionId,
) {
    while let Some(event) = outbound.recv().await {
        let payload = match event.to_json() {
            Ok(json) => json,
            Err(err) => {
                tracing::warn!(
                    connection_id = %connection,
                    error = %err,
                    "failed to serialize websocket payload"
                );
                continue;
            }
        };
        if sender.send(WsMessage::Text(payload.into())).await.is_err() {
            tracing::warn!(connection_id = %connection, "Failed to send text message");
            return;
        }
    }
    // 出站队列被中继关闭（连接被驱逐），主动结束 WebSocket
    let _ = sender.close().await;
}

async fn read_loop(
    mut incoming: SplitStream<WebSocket>,
    relay: Arc<ChatRelay>,
    connection: ConnectionId,
) {
    while let Some(frame) = incoming.next().await {
        let message = match frame {
            Ok(message) => message,
            Err(err) => {
                tracing::warn!(connection_id = %connection, error = %err, "WebSocket读取失败");
                return;
            }
        };

        match message {
            WsMessage::Text(text) => match ClientEvent::parse(text.as_str()) {
                Ok(ClientEvent::Disconnect) => {
                    tracing::debug!(connection_id = %connection, "客户端请求断开");
                    return;
                }
                Ok(event) => {
                    let name = event.name();
                    if let Err(err) = relay.handle(connection, event).await {
                        tracing::debug!(
                            connection_id = %connection,
                            event = name,
                            error = %err,
                            "事件处理失败"
                        );
                    }
                }
                Err(err) => {
                    tracing::warn!(
                        connection_id = %connection,
                        error = %err,
                        "收到格式错误的帧"
                    );
                    relay.reject(connection, UNKNOWN_EVENT, &err).await;
                }
            },
            WsMessage::Binary(_) => {
                let err = DomainError::malformed_event("binary frames are not supported");
                tracing::warn!(connection_id = %connection, "收到二进制帧");
                relay.reject(connection, UNKNOWN_EVENT, &err).await;
            }
            WsMessage::Close(_) => {
                tracing::debug!(connection_id = %connection, "WebSocket收到关闭消息");
                return;
            }
            WsMessage::Ping(_) | WsMessage::Pong(_) => {}
        }
    }
}
