//! Headless Chrome: tab pool, render pipeline and failure classification.

mod fault;
mod pool;
mod readiness;
mod render;

use thiserror::Error;

pub use fault::is_session_interrupted;
pub use pool::{ChromePool, PoolStats, PooledTab, ACQUIRE_TIMEOUT};
pub use render::render_pdf;

/// Failures on the render path. Browser-side errors keep their full message
/// chain so the session-fault classifier can inspect it.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("chrome pool is closed")]
    PoolClosed,

    #[error("timed out waiting for a free tab")]
    AcquireTimeout,

    #[error("render timed out after {0}s")]
    Timeout(u64),

    #[error("{0}")]
    Browser(String),

    #[error("cannot create profile directory: {0}")]
    Profile(#[from] std::io::Error),
}

impl RenderError {
    /// Flatten an `anyhow` chain from headless_chrome into one message so
    /// substring classification sees every layer.
    pub fn browser(err: anyhow::Error) -> Self {
        RenderError::Browser(format!("{err:#}"))
    }
}
