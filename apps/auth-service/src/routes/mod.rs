//! HTTP surface of the auth service.

mod ext_authz;

use axum::http::StatusCode;
use axum::middleware::from_fn_with_state;
use axum::response::IntoResponse;
use axum::routing::{any, get};
use axum::{extract::State, Json, Router};
use tower_http::trace::TraceLayer;

use crate::error::error_envelope;
use crate::middleware::{optional_api_key_auth, token_rate_limit, user_rate_limit};
use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    // The gateway's ext-authz callout uses a path prefix and appends the
    // original path, so both the bare prefix and everything under it match.
    let ext_authz = Router::new()
        .route("/ext-authz", any(ext_authz::ext_authz_ok))
        .route("/ext-authz/*path", any(ext_authz::ext_authz_ok))
        .layer(from_fn_with_state(state.clone(), user_rate_limit))
        .layer(from_fn_with_state(state.clone(), token_rate_limit))
        .layer(from_fn_with_state(state.clone(), optional_api_key_auth));

    Router::new()
        .route("/livez", get(livez))
        .route("/readyz", get(readyz))
        .merge(ext_authz)
        .fallback(not_found)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn livez() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok"}))
}

/// Readiness follows the token store: the gateway should not route traffic
/// here until the first snapshot is installed.
async fn readyz(State(state): State<AppState>) -> impl IntoResponse {
    if state.tokens().ready().await {
        (
            StatusCode::OK,
            Json(serde_json::json!({"status": "ready"})),
        )
            .into_response()
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            error_envelope(StatusCode::SERVICE_UNAVAILABLE, "token store not ready"),
        )
            .into_response()
    }
}

async fn not_found() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        error_envelope(StatusCode::NOT_FOUND, "Not Found"),
    )
}
