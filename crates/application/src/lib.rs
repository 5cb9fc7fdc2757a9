//! 应用层实现。
//!
//! 围绕领域模型提供中继用例：身份注册表、历史记录、广播路由，
//! 以及把它们串起来的连接生命周期管理器。

pub mod clock;
pub mod error;
pub mod history;
pub mod lifecycle;
pub mod outbound;
pub mod registry;
pub mod router;

pub use clock::{Clock, SystemClock};
pub use error::ApplicationError;
pub use history::HistoryLog;
pub use lifecycle::ChatRelay;
pub use outbound::{ChannelSink, DeliveryError, OutboundQueue, OutboundSink};
pub use registry::IdentityRegistry;
pub use router::{BroadcastRouter, Dispatch};
