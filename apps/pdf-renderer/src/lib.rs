//! HTML/URL to PDF rendering service.
//!
//! Requests are validated, served from a content-addressed Redis cache when
//! possible, and otherwise rendered in a fresh tab of a long-lived headless
//! Chrome. Concurrency is capped by a semaphore-bounded tab pool; a broken
//! browser session triggers one pool restart and one retry.

pub mod cache;
pub mod chrome;
pub mod config;
pub mod error;
pub mod middleware;
pub mod pdf;
pub mod routes;
pub mod state;

pub use config::Config;
pub use error::AppError;
pub use state::AppState;
