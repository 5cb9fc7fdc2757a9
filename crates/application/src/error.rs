use domain::DomainError;
use thiserror::Error;

use crate::outbound::DeliveryError;

#[derive(Debug, Error)]
pub enum ApplicationError {
    #[error("domain error: {0}")]
    Domain(#[from] DomainError),
    #[error("delivery error: {0}")]
    Delivery(#[from] DeliveryError),
}

impl ApplicationError {
    /// 取出业务规则错误（如果是的话）
    pub fn as_domain(&self) -> Option<&DomainError> {
        match self {
            ApplicationError::Domain(err) => Some(err),
            ApplicationError::Delivery(_) => None,
        }
    }
}
