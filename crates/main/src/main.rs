//! 主应用程序入口
//!
//! 加载配置，启动聊天中继的 Axum 服务。

use std::sync::Arc;

use application::{ChatRelay, SystemClock};
use config::AppConfig;
use tracing_subscriber::EnvFilter;
use web_api::{router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load()?;

    // 初始化日志，RUST_LOG 优先于配置文件
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.logging.filter)),
        )
        .init();

    let relay = Arc::new(ChatRelay::new(Arc::new(SystemClock), &config.relay));
    let app = router(AppState::new(relay, &config.relay));

    let address = config.server.bind_address();
    let listener = tokio::net::TcpListener::bind(&address).await?;
    tracing::info!(
        history_capacity = ?config.relay.history_capacity,
        outbound_buffer = config.relay.outbound_buffer,
        "聊天中继启动在 http://{}",
        address
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("聊天中继已停止");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "无法监听 Ctrl-C 信号");
        std::future::pending::<()>().await;
    }
    tracing::info!("收到关闭信号");
}
