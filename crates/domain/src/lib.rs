//! 聊天中继核心领域模型
//!
//! 包含显示名称、连接状态、消息信封以及线上事件格式等核心类型。

pub mod connection;
pub mod envelope;
pub mod errors;
pub mod events;
pub mod notices;
pub mod value_objects;

// 重新导出常用类型
pub use connection::*;
pub use envelope::*;
pub use errors::*;
pub use events::*;
pub use value_objects::*;
