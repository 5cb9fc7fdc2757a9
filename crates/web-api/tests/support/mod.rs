#![allow(dead_code)]

use std::{net::SocketAddr, sync::Arc, time::Duration};

use application::{ChatRelay, SystemClock};
use config::RelayConfig;
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::{net::TcpListener, sync::oneshot, time::sleep, time::timeout};
use tokio_tungstenite::{
    connect_async, tungstenite::Message as TungsteniteMessage, MaybeTlsStream, WebSocketStream,
};
use web_api::{router, AppState};

pub type WsClient = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

pub struct TestServer {
    pub addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
}

impl TestServer {
    pub async fn spawn() -> Self {
        Self::spawn_with(RelayConfig::default()).await
    }

    pub async fn spawn_with(config: RelayConfig) -> Self {
        let relay = Arc::new(ChatRelay::new(Arc::new(SystemClock), &config));
        let app = router(AppState::new(relay, &config));
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr");
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        tokio::spawn(async move {
            axum::serve(listener, app.into_make_service())
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
                .ok();
        });

        // allow server to start
        sleep(Duration::from_millis(100)).await;

        Self {
            addr,
            shutdown: Some(shutdown_tx),
        }
    }

    pub fn http_url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub async fn connect(&self) -> WsClient {
        let (stream, _) = connect_async(format!("ws://{}/ws", self.addr))
            .await
            .expect("connect websocket");
        stream
    }

    /// 连接并注册，丢弃注册时收到的回放与通知
    pub async fn join(&self, name: &str) -> WsClient {
        let mut client = self.connect().await;
        send_event(&mut client, "register", json!(name)).await;
        wait_for(&mut client, |frame| {
            frame["event"] == "userList"
                && frame["data"]
                    .as_array()
                    .is_some_and(|names| names.iter().any(|n| n == name))
        })
        .await;
        client
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
    }
}

pub async fn send_event(client: &mut WsClient, event: &str, data: Value) {
    let frame = json!({ "event": event, "data": data }).to_string();
    client
        .send(TungsteniteMessage::Text(frame.into()))
        .await
        .expect("send frame");
}

/// 读取下一个 JSON 文本帧，超时则测试失败
pub async fn next_frame(client: &mut WsClient) -> Value {
    loop {
        let message = timeout(Duration::from_secs(5), client.next())
            .await
            .expect("frame timeout")
            .expect("stream ended")
            .expect("websocket error");
        if let TungsteniteMessage::Text(text) = message {
            return serde_json::from_str(text.as_str()).expect("json frame");
        }
    }
}

/// 读取帧直到满足条件，返回满足条件之前（含）的所有帧
pub async fn wait_for<F>(client: &mut WsClient, predicate: F) -> Vec<Value>
where
    F: Fn(&Value) -> bool,
{
    let mut seen = Vec::new();
    loop {
        let frame = next_frame(client).await;
        let done = predicate(&frame);
        seen.push(frame);
        if done {
            return seen;
        }
    }
}
