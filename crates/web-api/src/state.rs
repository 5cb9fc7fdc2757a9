use std::sync::Arc;

use application::ChatRelay;
use config::RelayConfig;

#[derive(Clone)]
pub struct AppState {
    pub relay: Arc<ChatRelay>,
    /// 每个连接的出站队列长度
    pub outbound_buffer: usize,
}

impl AppState {
    pub fn new(relay: Arc<ChatRelay>, config: &RelayConfig) -> Self {
        Self {
            relay,
            outbound_buffer: config.outbound_buffer.max(1),
        }
    }
}
