//! 领域模型错误定义
//!
//! 所有错误都是业务规则层面的拒绝，不存在致命错误：调用方负责把它们
//! 转换为定向回复或系统通知。

use thiserror::Error;

/// 领域模型错误类型
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// 名称已被其他连接占用
    #[error("name \"{name}\" already in use")]
    NameTaken { name: String },

    /// 连接尚未注册身份
    #[error("connection is not registered")]
    NotRegistered,

    /// 连接已经注册过身份
    #[error("connection is already registered as \"{name}\"")]
    AlreadyRegistered { name: String },

    /// 名称不合法
    #[error("invalid name: {reason}")]
    InvalidName { reason: String },

    /// 连接已关闭
    #[error("connection is closed")]
    ConnectionClosed,

    /// 无法解析的入站事件
    #[error("malformed event: {reason}")]
    MalformedEvent { reason: String },
}

impl DomainError {
    /// 创建名称占用错误
    pub fn name_taken(name: impl Into<String>) -> Self {
        Self::NameTaken { name: name.into() }
    }

    /// 创建重复注册错误
    pub fn already_registered(name: impl Into<String>) -> Self {
        Self::AlreadyRegistered { name: name.into() }
    }

    /// 创建名称校验错误
    pub fn invalid_name(reason: impl Into<String>) -> Self {
        Self::InvalidName {
            reason: reason.into(),
        }
    }

    /// 创建事件解析错误
    pub fn malformed_event(reason: impl Into<String>) -> Self {
        Self::MalformedEvent {
            reason: reason.into(),
        }
    }

    /// 面向客户端的稳定错误码
    pub fn code(&self) -> &'static str {
        match self {
            Self::NameTaken { .. } => "NAME_TAKEN",
            Self::NotRegistered => "NOT_REGISTERED",
            Self::AlreadyRegistered { .. } => "ALREADY_REGISTERED",
            Self::InvalidName { .. } => "INVALID_NAME",
            Self::ConnectionClosed => "CONNECTION_CLOSED",
            Self::MalformedEvent { .. } => "MALFORMED_EVENT",
        }
    }
}

/// 领域模型结果类型
pub type DomainResult<T> = Result<T, DomainError>;
