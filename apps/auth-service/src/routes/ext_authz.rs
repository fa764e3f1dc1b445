//! The allow response for the gateway's external-authorization callout.

use axum::http::{HeaderName, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Extension;

use crate::middleware::ApiKey;

pub const AUTH_MODE_HEADER: &str = "x-auth-mode";

/// Reached only after authentication and both limiters passed; tells the
/// gateway how the request was admitted.
pub async fn ext_authz_ok(Extension(key): Extension<ApiKey>) -> Response {
    let mode = if key.is_public() { "public" } else { "token" };
    (
        StatusCode::OK,
        [(HeaderName::from_static(AUTH_MODE_HEADER), mode)],
    )
        .into_response()
}
