//! Optional API-key authentication
//!
//! Classifies every request before the rate limiters run:
//! - ops paths require a token carrying the `ops` scope,
//! - a missing key (or an OPTIONS preflight) is public access,
//! - a present key must validate against the token snapshot.
//!
//! The outcome is an [`ApiKey`] request extension: empty for public traffic,
//! the token value for authenticated traffic.

use axum::extract::{Request, State};
use axum::http::Method;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::error::AuthError;
use crate::state::AppState;

pub const API_KEY_HEADER: &str = "x-api-key";

const EXT_AUTHZ_PREFIX: &str = "/ext-authz";
const OPS_SCOPE: &str = "ops";

/// The validated key for this request; empty means public access.
#[derive(Debug, Clone, Default)]
pub struct ApiKey(pub String);

impl ApiKey {
    pub fn is_public(&self) -> bool {
        self.0.is_empty()
    }
}

pub async fn optional_api_key_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let key = req
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .unwrap_or("")
        .to_string();

    if is_ops_path(&path) {
        match authorize_ops(&state, &key).await {
            Ok(()) => {
                tracing::info!(key = %redact_token(&key), method = %method, path = %path, "auth allow ops");
            }
            Err(e) => {
                tracing::warn!(
                    reason = %e,
                    key = %redact_token(&key),
                    method = %method,
                    path = %path,
                    "auth reject"
                );
                return e.into_response();
            }
        }
        req.extensions_mut().insert(ApiKey(key));
        return next.run(req).await;
    }

    // Missing key = public access. Also allow OPTIONS preflight.
    if method == Method::OPTIONS || key.is_empty() {
        tracing::debug!(reason = "public", method = %method, path = %path, "auth allow");
        req.extensions_mut().insert(ApiKey::default());
        return next.run(req).await;
    }

    if !state.tokens().ready().await {
        tracing::warn!(reason = "token_store_not_ready", method = %method, path = %path, "auth reject");
        return AuthError::StoreNotReady.into_response();
    }
    if !state.tokens().validate(&key).await {
        tracing::warn!(
            reason = "invalid_key",
            key = %redact_token(&key),
            method = %method,
            path = %path,
            "auth reject"
        );
        return AuthError::InvalidApiKey.into_response();
    }

    tracing::debug!(key = %redact_token(&key), method = %method, path = %path, "auth allow");
    req.extensions_mut().insert(ApiKey(key));
    next.run(req).await
}

async fn authorize_ops(state: &AppState, key: &str) -> Result<(), AuthError> {
    if key.is_empty() {
        return Err(AuthError::MissingScope);
    }
    if !state.tokens().ready().await {
        return Err(AuthError::StoreNotReady);
    }
    if !state.tokens().validate(key).await {
        return Err(AuthError::InvalidApiKey);
    }
    if !state.tokens().has_scope(key, OPS_SCOPE).await {
        return Err(AuthError::MissingScope);
    }
    Ok(())
}

/// The gateway's ext-authz callout prefixes the original path; strip it
/// before deciding whether this is an ops request.
fn is_ops_path(path: &str) -> bool {
    let effective = path.strip_prefix(EXT_AUTHZ_PREFIX).unwrap_or(path);
    effective == "/ops" || effective.starts_with("/ops/")
}

fn redact_token(token: &str) -> String {
    if token.is_empty() {
        return String::new();
    }
    if token.len() <= 8 {
        return "***".to_string();
    }
    format!("{}...{}", &token[..4], &token[token.len() - 4..])
}
