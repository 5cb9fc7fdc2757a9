//! 出站投递
//!
//! 每个连接拥有一个出站队列。实时事件计入积压上限，路由器只做非阻塞写入，
//! 慢读者积压超过上限后由生命周期管理器断开，不会拖住其他连接。
//! 历史回放走不计数的通道：回放长度只受历史容量限制，与积压上限无关。

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use domain::ServerEvent;
use thiserror::Error;
use tokio::sync::mpsc::{self, error::TryRecvError};

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryError {
    #[error("outbound queue is full")]
    Full,
    #[error("outbound channel is closed")]
    Closed,
}

/// 单个连接的出站端点
pub trait OutboundSink: Send + Sync {
    /// 非阻塞投递一个实时事件，积压超过上限时返回 [`DeliveryError::Full`]
    fn deliver(&self, event: ServerEvent) -> Result<(), DeliveryError>;

    /// 投递一条历史回放，不计入积压上限
    fn replay(&self, event: ServerEvent) -> Result<(), DeliveryError>;
}

#[derive(Debug)]
struct Queued {
    event: ServerEvent,
    /// 是否占用积压额度
    metered: bool,
}

/// 基于 tokio mpsc 的出站端点
#[derive(Clone)]
pub struct ChannelSink {
    sender: mpsc::UnboundedSender<Queued>,
    backlog: Arc<AtomicUsize>,
    limit: usize,
}

/// 出站队列的接收端，交给传输层的写任务
#[derive(Debug)]
pub struct OutboundQueue {
    receiver: mpsc::UnboundedReceiver<Queued>,
    backlog: Arc<AtomicUsize>,
}

impl ChannelSink {
    /// 创建端点以及对应的接收端，`limit` 是允许积压的实时事件数
    pub fn channel(limit: usize) -> (Self, OutboundQueue) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let backlog = Arc::new(AtomicUsize::new(0));
        let sink = Self {
            sender,
            backlog: backlog.clone(),
            limit: limit.max(1),
        };
        (sink, OutboundQueue { receiver, backlog })
    }

    fn push(&self, event: ServerEvent, metered: bool) -> Result<(), DeliveryError> {
        self.sender
            .send(Queued { event, metered })
            .map_err(|_| DeliveryError::Closed)
    }
}

impl OutboundSink for ChannelSink {
    fn deliver(&self, event: ServerEvent) -> Result<(), DeliveryError> {
        if self.sender.is_closed() {
            return Err(DeliveryError::Closed);
        }
        self.backlog
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |queued| {
                (queued < self.limit).then_some(queued + 1)
            })
            .map_err(|_| DeliveryError::Full)?;
        self.push(event, true).inspect_err(|_| {
            self.backlog.fetch_sub(1, Ordering::AcqRel);
        })
    }

    fn replay(&self, event: ServerEvent) -> Result<(), DeliveryError> {
        self.push(event, false)
    }
}

impl OutboundQueue {
    /// 等待下一个事件；端点被中继移除且队列读空后返回 `None`
    pub async fn recv(&mut self) -> Option<ServerEvent> {
        let queued = self.receiver.recv().await?;
        Some(self.release(queued))
    }

    pub fn try_recv(&mut self) -> Result<ServerEvent, TryRecvError> {
        self.receiver.try_recv().map(|queued| self.release(queued))
    }

    /// 当前积压的实时事件数
    pub fn backlog(&self) -> usize {
        self.backlog.load(Ordering::Acquire)
    }

    fn release(&self, queued: Queued) -> ServerEvent {
        if queued.metered {
            self.backlog.fetch_sub(1, Ordering::AcqRel);
        }
        queued.event
    }
}
