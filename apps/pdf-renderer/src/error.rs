//! Error types for the PDF renderer

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

/// Application-wide result type
pub type Result<T> = std::result::Result<T, AppError>;

/// Request-level failures, rendered as the uniform envelope
/// `{"error":{"code":<int>,"message":<string>}}`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    PayloadTooLarge(String),

    #[error("PDF rendering took too long")]
    RenderTimeout,

    #[error("Chrome session interrupted")]
    SessionInterrupted,

    #[error("Not Found")]
    NotFound,

    #[error("{0}")]
    Internal(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::RenderTimeout => StatusCode::REQUEST_TIMEOUT,
            AppError::SessionInterrupted => StatusCode::SERVICE_UNAVAILABLE,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = self.to_string();
        if status.is_server_error() {
            tracing::warn!(status = status.as_u16(), message = %message, "Request failed");
        }
        (status, error_envelope(status, &message)).into_response()
    }
}

pub fn error_envelope(status: StatusCode, message: &str) -> Json<serde_json::Value> {
    Json(json!({
        "error": {
            "code": status.as_u16(),
            "message": message,
        }
    }))
}
