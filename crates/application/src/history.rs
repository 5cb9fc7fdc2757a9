//! 消息历史记录
//!
//! 进程生命周期内的只追加日志，新注册的连接会收到完整回放。
//! 可选容量：设置后变为环形缓冲，优先淘汰最旧的记录。

use std::collections::VecDeque;

use domain::{MessageEnvelope, ServerEvent};

use crate::outbound::{DeliveryError, OutboundSink};

#[derive(Debug, Default)]
pub struct HistoryLog {
    entries: VecDeque<MessageEnvelope>,
    capacity: Option<usize>,
}

impl HistoryLog {
    /// 不限容量的历史记录
    pub fn unbounded() -> Self {
        Self::default()
    }

    /// 最多保留 `capacity` 条记录；`None` 表示不限制
    pub fn with_capacity(capacity: Option<usize>) -> Self {
        Self {
            entries: VecDeque::new(),
            capacity: capacity.map(|capacity| capacity.max(1)),
        }
    }

    /// 追加一条记录，返回被淘汰的最旧记录（如果有）
    pub fn append(&mut self, envelope: MessageEnvelope) -> Option<MessageEnvelope> {
        debug_assert!(envelope.is_persistent(), "typing envelopes are never stored");
        let evicted = match self.capacity {
            Some(capacity) if self.entries.len() >= capacity => self.entries.pop_front(),
            _ => None,
        };
        self.entries.push_back(envelope);
        evicted
    }

    /// 按追加顺序把记录投递给单个连接，`filter` 返回 `false` 的记录被跳过。
    ///
    /// 回放不会修改日志，也不占用连接的积压额度，返回实际投递的条数。
    pub fn replay_to<F>(
        &self,
        sink: &dyn OutboundSink,
        filter: F,
    ) -> Result<usize, DeliveryError>
    where
        F: Fn(&MessageEnvelope) -> bool,
    {
        let mut delivered = 0;
        for envelope in self.entries.iter().filter(|envelope| filter(envelope)) {
            sink.replay(ServerEvent::Message(envelope.clone()))?;
            delivered += 1;
        }
        Ok(delivered)
    }

    pub fn iter(&self) -> impl Iterator<Item = &MessageEnvelope> {
        self.entries.iter()
    }

    pub fn snapshot(&self) -> Vec<MessageEnvelope> {
        self.entries.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
