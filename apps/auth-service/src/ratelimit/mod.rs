//! Sliding-window rate limiting over a shared window store.

mod cache;
mod sliding;
mod window;

pub use cache::LimiterCache;
pub use sliding::{Decision, SlidingWindowLimiter};
pub use window::{
    connect_window_store, MemoryWindowStore, RedisWindowStore, WindowStore, WindowStoreConfig,
    WindowStoreError,
};
