//! Limiter handler cache
//!
//! Token limits are dynamic (looked up per request from the token store), so
//! handlers are memoized by limit value instead of being rebuilt per request.
//! The set of distinct limit values across live tokens is small and bounded,
//! so entries are never evicted.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;

use super::sliding::SlidingWindowLimiter;
use super::window::WindowStore;

#[derive(Default)]
pub struct LimiterCache {
    handlers: RwLock<HashMap<u32, Arc<SlidingWindowLimiter>>>,
}

impl LimiterCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch the limiter for `max`, creating it on first use. Readers share
    /// the lock; a miss escalates to the write lock and inserts.
    pub async fn get_or_create(
        &self,
        max: u32,
        window: Duration,
        store: Arc<dyn WindowStore>,
    ) -> Arc<SlidingWindowLimiter> {
        {
            let handlers = self.handlers.read().await;
            if let Some(h) = handlers.get(&max) {
                return h.clone();
            }
        }

        let mut handlers = self.handlers.write().await;
        handlers
            .entry(max)
            .or_insert_with(|| Arc::new(SlidingWindowLimiter::new(max, window, store)))
            .clone()
    }

    pub async fn len(&self) -> usize {
        self.handlers.read().await.len()
    }
}
