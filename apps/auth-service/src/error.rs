//! Error types for the auth service

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

/// Request-level failures surfaced to the gateway.
///
/// Every variant renders the uniform envelope
/// `{"error":{"code":<int>,"message":<string>}}`.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("token store not ready")]
    StoreNotReady,

    #[error("invalid api key")]
    InvalidApiKey,

    #[error("missing required scope")]
    MissingScope,

    #[error("Too many requests")]
    RateLimited,
}

impl AuthError {
    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::StoreNotReady => StatusCode::SERVICE_UNAVAILABLE,
            AuthError::InvalidApiKey | AuthError::MissingScope => StatusCode::UNAUTHORIZED,
            AuthError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status();
        (status, error_envelope(status, &self.to_string())).into_response()
    }
}

/// The shared error body shape, also used by the 404 fallback.
pub fn error_envelope(status: StatusCode, message: &str) -> Json<serde_json::Value> {
    Json(json!({
        "error": {
            "code": status.as_u16(),
            "message": message,
        }
    }))
}
