//! Application state management

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::OnceCell;

use crate::cache::PdfCache;
use crate::chrome::{ChromePool, RenderError};
use crate::config::Config;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: Config,
    pdf_cache: Option<PdfCache>,
    /// Pool creation is deferred to first use so a missing browser binary is
    /// a request error, not a startup abort.
    chrome_pool: OnceCell<Arc<ChromePool>>,
    start_time: Instant,
}

impl AppState {
    pub async fn new(config: Config) -> Self {
        let pdf_cache = PdfCache::connect(&config.cache).await;
        Self {
            inner: Arc::new(AppStateInner {
                config,
                pdf_cache,
                chrome_pool: OnceCell::new(),
                start_time: Instant::now(),
            }),
        }
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    pub fn pdf_cache(&self) -> Option<&PdfCache> {
        self.inner.pdf_cache.as_ref()
    }

    pub fn uptime_secs(&self) -> u64 {
        self.inner.start_time.elapsed().as_secs()
    }

    /// The shared tab pool, created on first use. Both `/v0/pdf` methods and
    /// the stats endpoint share the same pool through this cell.
    pub async fn chrome_pool(&self) -> Result<Arc<ChromePool>, RenderError> {
        self.inner
            .chrome_pool
            .get_or_try_init(|| async {
                ChromePool::new(self.config()).await.map(Arc::new)
            })
            .await
            .cloned()
    }

    /// The pool if it has been initialized, without forcing creation.
    pub fn chrome_pool_if_started(&self) -> Option<Arc<ChromePool>> {
        self.inner.chrome_pool.get().cloned()
    }
}
