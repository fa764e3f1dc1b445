//! HTTP surface of the PDF renderer.

mod ops;
mod pdf;

use axum::routing::get;
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::error::AppError;
use crate::middleware::request_context;
use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    let v0 = Router::new()
        .route("/pdf", get(pdf::convert_url).post(pdf::convert_html))
        .route("/chrome/stats", get(ops::chrome_stats))
        .route("/monitor", get(ops::monitor));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .nest("/v0", v0)
        .route("/ops/health", get(ops::health))
        .fallback(not_found)
        .layer(axum::middleware::from_fn(request_context))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Ensure all responses, including 404s, return the JSON envelope.
async fn not_found() -> AppError {
    AppError::NotFound
}
