//! Application state management

use std::sync::Arc;

use crate::config::Config;
use crate::ratelimit::{LimiterCache, SlidingWindowLimiter, WindowStore};
use crate::tokens::TokenStore;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: Config,
    tokens: Arc<TokenStore>,
    window_store: Arc<dyn WindowStore>,
    limiters: LimiterCache,
    /// Single fingerprint limiter for anonymous traffic; `None` when the
    /// user limiter is disabled or has no budget.
    user_limiter: Option<SlidingWindowLimiter>,
}

impl AppState {
    pub fn new(
        config: Config,
        tokens: Arc<TokenStore>,
        window_store: Arc<dyn WindowStore>,
    ) -> Self {
        let user_limiter = (config.enable_user_limiter && config.user_limit > 0).then(|| {
            SlidingWindowLimiter::new(config.user_limit, config.rate_interval, window_store.clone())
        });

        Self {
            inner: Arc::new(AppStateInner {
                config,
                tokens,
                window_store,
                limiters: LimiterCache::new(),
                user_limiter,
            }),
        }
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    pub fn tokens(&self) -> &TokenStore {
        &self.inner.tokens
    }

    pub fn window_store(&self) -> Arc<dyn WindowStore> {
        self.inner.window_store.clone()
    }

    pub fn limiters(&self) -> &LimiterCache {
        &self.inner.limiters
    }

    pub fn user_limiter(&self) -> Option<&SlidingWindowLimiter> {
        self.inner.user_limiter.as_ref()
    }
}
