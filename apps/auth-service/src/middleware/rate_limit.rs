//! Token and user rate limiting
//!
//! Two limiters run in sequence after authentication:
//! - the token limiter, keyed by token value with a per-token budget from the
//!   token snapshot,
//! - the user limiter, keyed by a client fingerprint, covering anonymous
//!   traffic only.
//!
//! A request authenticated with a valid key is never charged against the
//! fingerprint budget.

use axum::extract::{ConnectInfo, Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use sha2::{Digest, Sha256};

use crate::error::AuthError;
use crate::state::AppState;

use super::auth::ApiKey;

pub async fn token_rate_limit(State(state): State<AppState>, req: Request, next: Next) -> Response {
    if !state.config().enable_token_rate_limiter {
        return next.run(req).await;
    }

    let token = match req.extensions().get::<ApiKey>() {
        Some(key) if !key.is_public() => key.0.clone(),
        // anonymous traffic is the user limiter's problem
        _ => return next.run(req).await,
    };

    let limit = state.tokens().rate_limit(&token).await;
    if limit == 0 {
        return next.run(req).await;
    }

    let limiter = state
        .limiters()
        .get_or_create(limit, state.config().rate_interval, state.window_store())
        .await;

    match limiter.check(&token).await {
        Ok(decision) if decision.allowed => next.run(req).await,
        Ok(_) => {
            tracing::warn!(token = %token, path = %req.uri().path(), "Rate limit exceeded");
            AuthError::RateLimited.into_response()
        }
        Err(e) => {
            // window store trouble must not turn into request failures
            tracing::warn!(error = %e, "Window store unavailable, allowing request");
            next.run(req).await
        }
    }
}

pub async fn user_rate_limit(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let Some(limiter) = state.user_limiter() else {
        return next.run(req).await;
    };

    // Authenticated requests were already limited per token.
    if let Some(key) = req.extensions().get::<ApiKey>() {
        if !key.is_public() {
            return next.run(req).await;
        }
    }

    let key = client_fingerprint(&req);
    match limiter.check(&key).await {
        Ok(decision) if decision.allowed => next.run(req).await,
        Ok(_) => {
            tracing::warn!(user = %key, path = %req.uri().path(), "Rate limit exceeded");
            AuthError::RateLimited.into_response()
        }
        Err(e) => {
            tracing::warn!(error = %e, "Window store unavailable, allowing request");
            next.run(req).await
        }
    }
}

/// Stable anonymous-client key: sha256 over client IP and user agent.
///
/// The gateway terminates the downstream connection, so `X-Forwarded-For`
/// is the trusted source of the client address; the socket address is only a
/// fallback for direct access.
fn client_fingerprint(req: &Request) -> String {
    let ip = req
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| {
            req.extensions()
                .get::<ConnectInfo<std::net::SocketAddr>>()
                .map(|ci| ci.0.ip().to_string())
                .unwrap_or_default()
        });

    let user_agent = req
        .headers()
        .get("user-agent")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    let mut hasher = Sha256::new();
    hasher.update(ip.as_bytes());
    hasher.update(user_agent.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::Request as HttpRequest;

    use super::*;

    fn request(xff: Option<&str>, user_agent: Option<&str>) -> Request {
        let mut builder = HttpRequest::get("/ext-authz/x");
        if let Some(xff) = xff {
            builder = builder.header("x-forwarded-for", xff);
        }
        if let Some(ua) = user_agent {
            builder = builder.header("user-agent", ua);
        }
        builder.body(Body::empty()).unwrap()
    }

    #[test]
    fn fingerprint_is_stable_per_client() {
        let a = client_fingerprint(&request(Some("10.0.0.1"), Some("curl/8.0")));
        let b = client_fingerprint(&request(Some("10.0.0.1"), Some("curl/8.0")));
        assert_eq!(a, b);
    }

    #[test]
    fn fingerprint_varies_with_ip_and_agent() {
        let base = client_fingerprint(&request(Some("10.0.0.1"), Some("curl/8.0")));
        let other_ip = client_fingerprint(&request(Some("10.0.0.2"), Some("curl/8.0")));
        let other_ua = client_fingerprint(&request(Some("10.0.0.1"), Some("wget/1.21")));
        assert_ne!(base, other_ip);
        assert_ne!(base, other_ua);
    }

    #[test]
    fn fingerprint_uses_first_forwarded_hop() {
        let direct = client_fingerprint(&request(Some("10.0.0.1"), Some("curl/8.0")));
        let chained = client_fingerprint(&request(Some("10.0.0.1, 192.168.0.9"), Some("curl/8.0")));
        assert_eq!(direct, chained);
    }

    #[test]
    fn fingerprint_matches_known_digest() {
        let got = client_fingerprint(&request(Some("10.0.0.1"), Some("curl/8.0")));
        let mut hasher = Sha256::new();
        hasher.update(b"10.0.0.1curl/8.0");
        assert_eq!(got, hex::encode(hasher.finalize()));
    }
}
