//! 连接状态机
//!
//! `Unregistered -> Registered -> Closed`，`Closed` 为终止状态。

use crate::errors::{DomainError, DomainResult};
use crate::value_objects::Username;

/// 单个连接的注册状态
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// 已接入但尚未注册身份
    #[default]
    Unregistered,
    /// 已绑定身份
    Registered(Username),
    /// 已关闭
    Closed,
}

impl ConnectionState {
    pub fn identity(&self) -> Option<&Username> {
        match self {
            ConnectionState::Registered(name) => Some(name),
            _ => None,
        }
    }

    pub fn is_registered(&self) -> bool {
        matches!(self, ConnectionState::Registered(_))
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, ConnectionState::Closed)
    }

    /// 要求连接处于已注册状态，返回其身份。
    pub fn require_identity(&self) -> DomainResult<&Username> {
        match self {
            ConnectionState::Registered(name) => Ok(name),
            ConnectionState::Unregistered => Err(DomainError::NotRegistered),
            ConnectionState::Closed => Err(DomainError::ConnectionClosed),
        }
    }

    /// 注册前的状态检查。
    pub fn ensure_can_register(&self) -> DomainResult<()> {
        match self {
            ConnectionState::Unregistered => Ok(()),
            ConnectionState::Registered(name) => {
                Err(DomainError::already_registered(name.as_str()))
            }
            ConnectionState::Closed => Err(DomainError::ConnectionClosed),
        }
    }

    /// 关闭连接，返回关闭前持有的身份。重复关闭返回 `None`。
    pub fn close(&mut self) -> Option<Username> {
        match std::mem::replace(self, ConnectionState::Closed) {
            ConnectionState::Registered(name) => Some(name),
            _ => None,
        }
    }
}
