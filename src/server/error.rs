use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use crate::config::ConfigError;
use crate::db::{ConnectionError, RepositoryError};
use crate::models::DocumentError;
use crate::offline::OfflineError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Invalid request: {0}")]
    BadRequest(String),
    #[error("{0}")]
    LimitReached(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Database unavailable: {0}")]
    Unavailable(String),
    #[error("Internal server error: {0}")]
    Internal(String),
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<&'static str>,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = match self {
            Self::BadRequest(_) => (StatusCode::BAD_REQUEST, None),
            Self::LimitReached(_) => (StatusCode::BAD_REQUEST, Some("LIMIT_REACHED")),
            Self::NotFound(_) => (StatusCode::NOT_FOUND, None),
            Self::Unavailable(_) => (StatusCode::SERVICE_UNAVAILABLE, None),
            Self::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, None),
        };
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }
        let body = ErrorBody {
            error: self.to_string(),
            code,
        };
        (status, Json(body)).into_response()
    }
}

impl From<DocumentError> for ApiError {
    fn from(e: DocumentError) -> Self {
        Self::bad_request(e.to_string())
    }
}

impl From<OfflineError> for ApiError {
    fn from(e: OfflineError) -> Self {
        match e {
            OfflineError::CapacityExceeded { .. } => Self::LimitReached(e.to_string()),
            OfflineError::Document(e) => e.into(),
            other => Self::internal(other.to_string()),
        }
    }
}

impl From<ConnectionError> for ApiError {
    fn from(e: ConnectionError) -> Self {
        Self::Unavailable(e.to_string())
    }
}

impl From<RepositoryError> for ApiError {
    fn from(e: RepositoryError) -> Self {
        match e {
            RepositoryError::Validation(e) => e.into(),
            RepositoryError::NotFound(id) => Self::not_found(format!("word {}", id)),
            other => Self::internal(other.to_string()),
        }
    }
}

impl From<ConfigError> for ApiError {
    fn from(e: ConfigError) -> Self {
        match e {
            ConfigError::InvalidValue { .. } => Self::bad_request(e.to_string()),
            other => Self::internal(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (ApiError::from(DocumentError::MissingLemma), StatusCode::BAD_REQUEST),
            (
                ApiError::from(OfflineError::CapacityExceeded { limit: 3 }),
                StatusCode::BAD_REQUEST,
            ),
            (
                ApiError::from(ConnectionError::NotConfigured),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                ApiError::from(RepositoryError::NotFound(uuid::Uuid::nil())),
                StatusCode::NOT_FOUND,
            ),
            (
                ApiError::from(RepositoryError::Database(sqlx::Error::PoolClosed)),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (error, expected) in cases {
            assert_eq!(error.into_response().status(), expected);
        }
    }

    #[test]
    fn test_capacity_carries_code() {
        let error = ApiError::from(OfflineError::CapacityExceeded { limit: 3 });
        assert!(matches!(error, ApiError::LimitReached(ref m) if m.contains("limit reached (3)")));
    }
}
