//! Sliding-window counter
//!
//! Blends two adjacent fixed windows: the previous window's count is weighted
//! by the unelapsed fraction of the current window, which approximates a
//! moving window without storing individual timestamps.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use super::window::{WindowStore, WindowStoreError};

const KEY_PREFIX: &str = "ratelimit:";

/// Per-key counter state persisted in the window store.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct WindowState {
    curr_hits: u64,
    prev_hits: u64,
    window_start_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub allowed: bool,
    pub remaining: u64,
}

/// A ready-to-invoke limiter for one `max`/`window` pair.
///
/// The read-modify-write cycle against the store is serialized through a
/// per-limiter mutex; the store itself provides cross-replica visibility.
pub struct SlidingWindowLimiter {
    max: u32,
    window: Duration,
    store: Arc<dyn WindowStore>,
    update: Mutex<()>,
}

impl SlidingWindowLimiter {
    pub fn new(max: u32, window: Duration, store: Arc<dyn WindowStore>) -> Self {
        Self {
            max,
            window,
            store,
            update: Mutex::new(()),
        }
    }

    /// Record a hit for `key` and decide whether it stays under the limit.
    pub async fn check(&self, key: &str) -> Result<Decision, WindowStoreError> {
        let _guard = self.update.lock().await;

        let now_ms = unix_millis();
        let window_ms = self.window.as_millis().max(1) as u64;
        let store_key = format!("{KEY_PREFIX}{key}");

        let mut state = match self.store.get(&store_key).await? {
            Some(raw) => serde_json::from_slice(&raw).unwrap_or_default(),
            None => WindowState::default(),
        };
        if state.window_start_ms == 0 {
            state.window_start_ms = now_ms;
        }

        let elapsed = now_ms.saturating_sub(state.window_start_ms);
        if elapsed >= 2 * window_ms {
            state = WindowState {
                window_start_ms: now_ms,
                ..WindowState::default()
            };
        } else if elapsed >= window_ms {
            state.prev_hits = state.curr_hits;
            state.curr_hits = 0;
            state.window_start_ms += window_ms;
        }

        let elapsed_in_window = now_ms.saturating_sub(state.window_start_ms).min(window_ms);
        let weight = 1.0 - elapsed_in_window as f64 / window_ms as f64;
        let rate = state.prev_hits as f64 * weight + state.curr_hits as f64 + 1.0;

        if rate > self.max as f64 {
            return Ok(Decision {
                allowed: false,
                remaining: 0,
            });
        }

        state.curr_hits += 1;
        let raw = serde_json::to_vec(&state).expect("window state serializes");
        self.store
            .set(&store_key, raw, Duration::from_millis(2 * window_ms))
            .await?;

        Ok(Decision {
            allowed: true,
            remaining: (self.max as f64 - rate).max(0.0) as u64,
        })
    }
}

fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::super::window::MemoryWindowStore;
    use super::*;

    fn limiter(max: u32, window: Duration) -> SlidingWindowLimiter {
        SlidingWindowLimiter::new(max, window, Arc::new(MemoryWindowStore::new()))
    }

    #[tokio::test]
    async fn allows_up_to_max_then_denies() {
        let limiter = limiter(3, Duration::from_secs(3600));

        for _ in 0..3 {
            assert!(limiter.check("k").await.unwrap().allowed);
        }
        assert!(!limiter.check("k").await.unwrap().allowed);
    }

    #[tokio::test]
    async fn keys_are_independent() {
        let limiter = limiter(1, Duration::from_secs(3600));

        assert!(limiter.check("a").await.unwrap().allowed);
        assert!(limiter.check("b").await.unwrap().allowed);
        assert!(!limiter.check("a").await.unwrap().allowed);
        assert!(!limiter.check("b").await.unwrap().allowed);
    }

    #[tokio::test]
    async fn window_rolls_over() {
        let limiter = limiter(1, Duration::from_millis(30));

        assert!(limiter.check("k").await.unwrap().allowed);
        assert!(!limiter.check("k").await.unwrap().allowed);

        // after two full windows the previous count no longer weighs in
        tokio::time::sleep(Duration::from_millis(70)).await;
        assert!(limiter.check("k").await.unwrap().allowed);
    }

    #[tokio::test]
    async fn previous_window_weighs_into_current() {
        let limiter = limiter(2, Duration::from_millis(400));

        assert!(limiter.check("k").await.unwrap().allowed);
        assert!(limiter.check("k").await.unwrap().allowed);

        // Just after rollover the previous window still carries most of its
        // weight, so the blended rate stays above max.
        tokio::time::sleep(Duration::from_millis(410)).await;
        assert!(!limiter.check("k").await.unwrap().allowed);
    }

    #[tokio::test]
    async fn remaining_counts_down() {
        let limiter = limiter(3, Duration::from_secs(3600));

        let first = limiter.check("k").await.unwrap();
        let second = limiter.check("k").await.unwrap();
        assert!(first.remaining > second.remaining);
    }
}
