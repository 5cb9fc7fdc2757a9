use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use domain::DomainError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: ErrorBody,
}

impl ApiError {
    pub fn new(status: StatusCode, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status,
            body: ErrorBody {
                code: code.into(),
                message: message.into(),
            },
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "BAD_REQUEST", message)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<DomainError> for ApiError {
    fn from(error: DomainError) -> Self {
        let status = match &error {
            DomainError::InvalidName { .. } | DomainError::MalformedEvent { .. } => {
                StatusCode::BAD_REQUEST
            }
            DomainError::NameTaken { .. } | DomainError::AlreadyRegistered { .. } => {
                StatusCode::CONFLICT
            }
            DomainError::NotRegistered => StatusCode::FORBIDDEN,
            DomainError::ConnectionClosed => StatusCode::GONE,
        };
        Self::new(status, error.code(), error.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_errors_map_to_http_status() {
        let invalid: ApiError = DomainError::invalid_name("name cannot be empty").into();
        assert_eq!(invalid.status(), StatusCode::BAD_REQUEST);
        assert_eq!(invalid.body.code, "INVALID_NAME");

        let taken: ApiError = DomainError::name_taken("bob").into();
        assert_eq!(taken.status(), StatusCode::CONFLICT);
        assert_eq!(taken.body.message, "name \"bob\" already in use");
    }
}
