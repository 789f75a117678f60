//! Error types for the HTTP API.
//!
//! Every handler returns [`ApiResult`]. Domain and database errors convert
//! with `?` and render as `{ "error": message, "code": CODE }`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tracing::error;

use fifo_core::{CoreError, ValidationError};
use fifo_db::DbError;
use fifo_hub::HubError;

/// Result type alias for handlers.
pub type ApiResult<T> = Result<T, ApiError>;

/// Machine-readable error category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    BadRequest,
    Unauthorized,
    Forbidden,
    NotFound,
    Conflict,
    Internal,
    Unavailable,
}

impl ErrorCode {
    pub fn status(&self) -> StatusCode {
        match self {
            ErrorCode::BadRequest => StatusCode::BAD_REQUEST,
            ErrorCode::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorCode::Forbidden => StatusCode::FORBIDDEN,
            ErrorCode::NotFound => StatusCode::NOT_FOUND,
            ErrorCode::Conflict => StatusCode::CONFLICT,
            ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
            ErrorCode::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

/// API error returned by handlers and middleware.
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct ApiError {
    pub code: ErrorCode,
    pub message: String,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        ApiError {
            code,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::BadRequest, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Unauthorized, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Forbidden, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotFound, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Conflict, message)
    }

    /// Internal failure. The detail is logged, the client gets a generic text.
    pub fn internal(detail: impl std::fmt::Display) -> Self {
        error!(error = %detail, "Internal server error");
        Self::new(ErrorCode::Internal, "Internal server error")
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({
            "error": self.message,
            "code": self.code,
        });
        (self.code.status(), Json(body)).into_response()
    }
}

// =============================================================================
// Conversions
// =============================================================================

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        let code = match &err {
            CoreError::PackageNotFound(_) | CoreError::UserNotFound(_) => ErrorCode::NotFound,
            CoreError::AlreadyInQueue { .. } | CoreError::NotYetQueued(_) => ErrorCode::Conflict,
            CoreError::InvalidCredentials => ErrorCode::Unauthorized,
            CoreError::UnknownRole(_) | CoreError::Validation(_) => ErrorCode::BadRequest,
        };
        ApiError::new(code, err.to_string())
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        ApiError::bad_request(err.to_string())
    }
}

impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::Domain(core) => core.into(),
            DbError::NotFound { .. } => ApiError::not_found(err.to_string()),
            DbError::UniqueViolation { .. } => ApiError::conflict(err.to_string()),
            DbError::ForeignKeyViolation(_) => ApiError::bad_request(err.to_string()),
            DbError::PoolExhausted => {
                ApiError::new(ErrorCode::Unavailable, "Database is busy, try again")
            }
            DbError::Closed => ApiError::new(ErrorCode::Unavailable, "Server is shutting down"),
            other => ApiError::internal(other),
        }
    }
}

impl From<HubError> for ApiError {
    fn from(err: HubError) -> Self {
        match err {
            HubError::ChannelClosed => {
                ApiError::new(ErrorCode::Unavailable, "Server is shutting down")
            }
            other => ApiError::internal(other),
        }
    }
}
