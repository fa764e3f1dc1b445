//! Periodic token reloader
//!
//! Feeds the [`TokenStore`] from a [`TokenRepository`] in the background.
//! A failed load leaves the current snapshot in place: stale tokens beat an
//! empty store.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::repository::{RepositoryError, TokenRepository};
use super::store::TokenStore;

#[derive(Clone)]
pub struct TokenReloader {
    repo: Arc<dyn TokenRepository>,
    store: Arc<TokenStore>,
    interval: Duration,
}

impl TokenReloader {
    pub fn new(repo: Arc<dyn TokenRepository>, store: Arc<TokenStore>, interval: Duration) -> Self {
        Self {
            repo,
            store,
            interval,
        }
    }

    /// Run a single load-and-replace cycle. On failure the store is left
    /// untouched and the error is returned to the caller.
    pub async fn load_once(&self) -> Result<(), RepositoryError> {
        let all = self.repo.load_tokens().await?;
        self.store.replace(all).await;
        Ok(())
    }

    /// Spawn the periodic reload loop. Tick failures are logged and the loop
    /// keeps running; it stops when `cancel` is triggered.
    pub fn start(&self, cancel: CancellationToken) -> JoinHandle<()> {
        let reloader = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(reloader.interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // interval fires immediately; the caller already did the initial load
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        if let Err(e) = reloader.load_once().await {
                            tracing::error!(error = %e, "Token reload failed");
                        }
                    }
                }
            }
        })
    }
}
