// HTTP error handling

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Result type for HTTP handlers
pub type AppResult<T> = Result<T, AppError>;

/// Application error with HTTP status code and a stable machine-readable
/// code clients branch on (e.g. `room_ended` stops the retry loop).
#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
}

impl AppError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "bad_request", message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "auth_error", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "not_found", message)
    }

    pub fn internal_server_error(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal", message)
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.status, self.message)
    }
}

impl std::error::Error for AppError {}

/// Error response JSON structure
#[derive(Debug, Serialize, Deserialize)]
struct ErrorResponse {
    error: String,
    code: String,
    status: u16,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status;
        let body = Json(ErrorResponse {
            error: self.message,
            code: self.code.to_string(),
            status: status.as_u16(),
        });

        (status, body).into_response()
    }
}

/// Convert liveroom_core errors to HTTP errors
impl From<liveroom_core::Error> for AppError {
    fn from(err: liveroom_core::Error) -> Self {
        use liveroom_core::Error;

        let code = err.code();
        match err {
            Error::Authentication(msg) => Self::new(StatusCode::UNAUTHORIZED, code, msg),
            Error::NotFound(msg) => Self::new(StatusCode::NOT_FOUND, code, msg),
            Error::DuplicateRoom => Self::new(
                StatusCode::CONFLICT,
                code,
                "Host already owns an open room",
            ),
            Error::InvalidTransition(reason) => Self::new(
                StatusCode::BAD_REQUEST,
                code,
                format!("Invalid transition: {reason}"),
            ),
            Error::RoomEnded => Self::new(StatusCode::BAD_REQUEST, code, "Room has ended"),
            Error::RateLimited {
                retry_after_seconds,
            } => Self::new(
                StatusCode::TOO_MANY_REQUESTS,
                code,
                format!("Rate limit exceeded. Try again in {retry_after_seconds}s"),
            ),
            Error::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, code, "Internal server error")
            }
        }
    }
}

/// Convert anyhow errors to HTTP errors
impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        tracing::error!("Unhandled error: {}", err);
        Self::internal_server_error("Internal server error")
    }
}
