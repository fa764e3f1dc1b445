//! Operational endpoints: health, pool stats and the monitor snapshot.

use axum::extract::State;
use axum::Json;
use serde_json::json;

use crate::error::AppError;
use crate::state::AppState;

pub async fn health() -> Json<serde_json::Value> {
    Json(json!({"status": "ok"}))
}

/// Basic observability for the Chrome pool (capacity / idle / in_use).
pub async fn chrome_stats(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, AppError> {
    let cfg = &state.config().pdf;

    if cfg.chrome_pool_size <= 0 {
        return Ok(Json(json!({
            "enabled": false,
            "capacity": 0,
            "idle": 0,
            "in_use": 0,
            "pool_size_conf": cfg.chrome_pool_size,
            "profile_dir": "",
            "timeout_secs": cfg.timeout_secs,
            "restarts": 0,
        })));
    }

    let pool = state
        .chrome_pool()
        .await
        .map_err(|e| AppError::Internal(format!("Chrome pool init failed: {e}")))?;
    let stats = pool.stats().await;

    Ok(Json(json!({
        "enabled": stats.enabled,
        "capacity": stats.capacity,
        "idle": stats.idle,
        "in_use": stats.in_use,
        "pool_size_conf": stats.pool_size_conf,
        "profile_dir": stats.profile_dir,
        "timeout_secs": cfg.timeout_secs,
        "restarts": stats.restarts,
        "last_restart": stats.last_restart,
    })))
}

/// Coarse operational dashboard; intentionally opaque and additive.
pub async fn monitor(State(state): State<AppState>) -> Json<serde_json::Value> {
    let pool = match state.chrome_pool_if_started() {
        Some(pool) => Some(pool.stats().await),
        None => None,
    };

    Json(json!({
        "service": "pdf-renderer",
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_secs": state.uptime_secs(),
        "pdf_cache_enabled": state.pdf_cache().is_some(),
        "chrome_pool": pool,
    }))
}
