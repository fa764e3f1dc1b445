//! Chrome tab pool
//!
//! One long-lived Chromium process, with concurrency capped by a semaphore
//! sized to `chrome_pool_size`. Tabs are never reused: printing leaves a tab
//! in an unreliable state, so every acquire opens a fresh tab on the shared
//! browser and release closes it. Restart swaps in a whole new browser and
//! profile; in-flight tabs on the old browser fail their renders and are
//! retried by the caller.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use headless_chrome::{Browser, LaunchOptions, Tab};
use serde::Serialize;
use tokio::sync::{Mutex, OwnedSemaphorePermit, Semaphore};

use crate::config::{Config, PdfConfig};

use super::RenderError;

pub const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);
const MIN_WARMUP_TIMEOUT: Duration = Duration::from_secs(10);
/// The pool owns browser lifecycle; the library's idle watchdog must never
/// reap the process between requests.
const IDLE_BROWSER_TIMEOUT: Duration = Duration::from_secs(24 * 60 * 60);
const PROFILE_PREFIX: &str = "html2pdf-chrome-profile";

/// Flags for containerized headless rendering. Software GL avoids
/// Vulkan/ANGLE issues in minimal images; the rest silences background
/// machinery that has no business in a render farm.
const CHROME_FLAGS: &[&str] = &[
    "--disable-gpu",
    "--disable-gpu-compositing",
    "--disable-features=Vulkan,UseSkiaRenderer",
    "--use-gl=swiftshader",
    "--disable-dev-shm-usage",
    "--disable-background-networking",
    "--disable-background-timer-throttling",
    "--disable-breakpad",
    "--disable-client-side-phishing-detection",
    "--disable-component-update",
    "--disable-default-apps",
    "--disable-domain-reliability",
    "--disable-extensions",
    "--disable-sync",
    "--no-first-run",
    "--no-default-browser-check",
];

/// A single-use tab plus the pool slot it occupies. Dropping the permit
/// returns the slot; the tab itself is closed by [`ChromePool::release`].
pub struct PooledTab {
    pub tab: Arc<Tab>,
    _permit: OwnedSemaphorePermit,
}

/// Lightweight snapshot for observability.
#[derive(Debug, Clone, Serialize)]
pub struct PoolStats {
    pub enabled: bool,
    pub capacity: usize,
    pub idle: usize,
    pub in_use: usize,
    pub pool_size_conf: i32,
    pub profile_dir: String,
    pub restarts: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_restart: Option<String>,
}

struct PoolInner {
    browser: Option<Arc<Browser>>,
    profile_dir: PathBuf,
}

pub struct ChromePool {
    cfg: PdfConfig,
    inner: Mutex<PoolInner>,
    sem: Arc<Semaphore>,
    capacity: usize,
    closed: AtomicBool,
    restarts: AtomicU64,
    last_restart: std::sync::RwLock<Option<DateTime<Utc>>>,
}

impl ChromePool {
    /// Launch the shared browser and warm it up. Warm-up failures are logged
    /// and tolerated; a browser that cannot even launch is an error.
    pub async fn new(config: &Config) -> Result<Self, RenderError> {
        let pool_size = config.pdf.chrome_pool_size;
        if pool_size <= 0 {
            return Err(RenderError::Browser(
                "chrome pool disabled (chrome_pool_size <= 0)".to_string(),
            ));
        }

        let cfg = config.pdf.clone();
        let profile_dir = create_profile_dir(&cfg)?;

        let launch_cfg = cfg.clone();
        let launch_profile = profile_dir.clone();
        let browser = tokio::task::spawn_blocking(move || {
            launch_browser(&launch_cfg, &launch_profile)
        })
        .await
        .map_err(|e| RenderError::Browser(e.to_string()))?
        .map_err(RenderError::browser)?;

        let browser = Arc::new(browser);

        let warmup_timeout = Duration::from_secs(cfg.timeout_secs).max(MIN_WARMUP_TIMEOUT);
        let warmup_browser = browser.clone();
        let warmup = tokio::task::spawn_blocking(move || warm_up(&warmup_browser, warmup_timeout));
        match tokio::time::timeout(warmup_timeout, warmup).await {
            Ok(Ok(Ok(()))) => {}
            Ok(Ok(Err(e))) => tracing::warn!(error = %format!("{e:#}"), "Chrome warm-up failed"),
            Ok(Err(e)) => tracing::warn!(error = %e, "Chrome warm-up task failed"),
            Err(_) => tracing::warn!("Chrome warm-up timed out"),
        }

        let capacity = pool_size as usize;
        tracing::info!(
            tabs = capacity,
            profile_dir = %profile_dir.display(),
            "Chrome pool initialized"
        );

        Ok(Self {
            cfg,
            inner: Mutex::new(PoolInner {
                browser: Some(browser),
                profile_dir,
            }),
            sem: Arc::new(Semaphore::new(capacity)),
            capacity,
            closed: AtomicBool::new(false),
            restarts: AtomicU64::new(0),
            last_restart: std::sync::RwLock::new(None),
        })
    }

    /// Wait for a pool slot (bounded by `timeout`) and open a fresh tab.
    /// A timed-out wait consumes nothing.
    pub async fn acquire(&self, timeout: Duration) -> Result<PooledTab, RenderError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(RenderError::PoolClosed);
        }

        let permit = match tokio::time::timeout(timeout, self.sem.clone().acquire_owned()).await {
            Err(_) => return Err(RenderError::AcquireTimeout),
            Ok(Err(_)) => return Err(RenderError::PoolClosed),
            Ok(Ok(permit)) => permit,
        };

        let browser = {
            let inner = self.inner.lock().await;
            inner.browser.clone().ok_or(RenderError::PoolClosed)?
        };

        let tab = tokio::task::spawn_blocking(move || browser.new_tab())
            .await
            .map_err(|e| RenderError::Browser(e.to_string()))?
            .map_err(RenderError::browser)?;

        Ok(PooledTab { tab, _permit: permit })
    }

    /// Close the tab and free the slot. The render error is accepted for API
    /// continuity but has no side effect here; retry policy lives with the
    /// caller.
    pub fn release(&self, tab: PooledTab, _render_err: Option<&RenderError>) {
        let PooledTab { tab, _permit } = tab;
        tokio::task::spawn_blocking(move || {
            if let Err(e) = tab.close(true) {
                tracing::debug!(error = %format!("{e:#}"), "Tab close failed");
            }
        });
        // _permit drops here, returning the slot
    }

    /// Tear down and recreate the browser process and profile. Semaphore
    /// state is untouched: slots held by in-flight renders stay held, their
    /// tabs die with the old browser and the renders fail into the retry
    /// path.
    pub async fn restart(&self) -> Result<(), RenderError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(RenderError::PoolClosed);
        }

        let mut inner = self.inner.lock().await;

        let old_browser = inner.browser.take();
        let old_profile = std::mem::take(&mut inner.profile_dir);

        // Kill the old process before the replacement starts.
        if let Some(browser) = old_browser {
            let _ = tokio::task::spawn_blocking(move || drop(browser)).await;
        }

        let profile_dir = create_profile_dir(&self.cfg)?;
        let launch_cfg = self.cfg.clone();
        let launch_profile = profile_dir.clone();
        let browser = tokio::task::spawn_blocking(move || {
            launch_browser(&launch_cfg, &launch_profile)
        })
        .await
        .map_err(|e| RenderError::Browser(e.to_string()))?
        .map_err(RenderError::browser)?;

        inner.browser = Some(Arc::new(browser));
        inner.profile_dir = profile_dir.clone();
        drop(inner);

        self.restarts.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut last) = self.last_restart.write() {
            *last = Some(Utc::now());
        }

        remove_profile_dir(&old_profile);
        tracing::warn!(profile_dir = %profile_dir.display(), "Chrome pool restarted");
        Ok(())
    }

    /// Idempotent shutdown: refuse new acquires, kill the browser, drop the
    /// profile.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.sem.close();

        let mut inner = self.inner.lock().await;
        let browser = inner.browser.take();
        let profile = std::mem::take(&mut inner.profile_dir);
        drop(inner);

        if let Some(browser) = browser {
            let _ = tokio::task::spawn_blocking(move || drop(browser)).await;
        }
        remove_profile_dir(&profile);
    }

    pub async fn stats(&self) -> PoolStats {
        let profile_dir = {
            let inner = self.inner.lock().await;
            inner.profile_dir.display().to_string()
        };
        let closed = self.closed.load(Ordering::SeqCst);
        let idle = self.sem.available_permits();

        let last_restart = self
            .last_restart
            .read()
            .ok()
            .and_then(|guard| *guard)
            .map(|t| t.to_rfc3339_opts(chrono::SecondsFormat::Secs, true));

        PoolStats {
            enabled: !closed,
            capacity: self.capacity,
            idle,
            in_use: self.capacity - idle,
            pool_size_conf: self.cfg.chrome_pool_size,
            profile_dir,
            restarts: self.restarts.load(Ordering::SeqCst),
            last_restart,
        }
    }
}

/// Launch options shared by the pool and the one-shot path.
pub(super) fn launch_browser(cfg: &PdfConfig, profile_dir: &Path) -> anyhow::Result<Browser> {
    let args: Vec<&OsStr> = CHROME_FLAGS.iter().map(OsStr::new).collect();

    let mut builder = LaunchOptions::default_builder();
    builder
        .headless(true)
        .sandbox(!cfg.chrome_no_sandbox)
        .user_data_dir(Some(profile_dir.to_path_buf()))
        .args(args)
        .idle_browser_timeout(IDLE_BROWSER_TIMEOUT);
    if !cfg.chrome_path.is_empty() {
        builder.path(Some(PathBuf::from(&cfg.chrome_path)));
    }
    let options = builder
        .build()
        .map_err(|e| anyhow::anyhow!("invalid launch options: {e}"))?;

    Browser::new(options)
}

fn warm_up(browser: &Browser, timeout: Duration) -> anyhow::Result<()> {
    let tab = browser.new_tab()?;
    tab.set_default_timeout(timeout);
    tab.navigate_to("about:blank")?;
    tab.wait_until_navigated()?;
    let _ = tab.close(true);
    Ok(())
}

fn create_profile_dir(cfg: &PdfConfig) -> Result<PathBuf, RenderError> {
    let base = if cfg.user_data_dir.is_empty() {
        std::env::temp_dir().join(PROFILE_PREFIX)
    } else {
        PathBuf::from(&cfg.user_data_dir)
    };
    std::fs::create_dir_all(&base)?;

    let dir = base.join(format!("{PROFILE_PREFIX}-{}", uuid::Uuid::new_v4()));
    std::fs::create_dir(&dir)?;
    Ok(dir)
}

fn remove_profile_dir(dir: &Path) {
    if dir.as_os_str().is_empty() {
        return;
    }
    if let Err(e) = std::fs::remove_dir_all(dir) {
        tracing::debug!(dir = %dir.display(), error = %e, "Profile cleanup failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_dirs_are_unique_and_nested_under_base() {
        let cfg = PdfConfig {
            user_data_dir: std::env::temp_dir()
                .join("html2pdf-pool-test")
                .display()
                .to_string(),
            ..PdfConfig::default()
        };

        let a = create_profile_dir(&cfg).unwrap();
        let b = create_profile_dir(&cfg).unwrap();
        assert_ne!(a, b);
        assert!(a.starts_with(&cfg.user_data_dir));
        assert!(a.is_dir());

        remove_profile_dir(&a);
        remove_profile_dir(&b);
        assert!(!a.exists());
    }

    #[test]
    fn remove_profile_dir_ignores_empty_and_missing_paths() {
        remove_profile_dir(Path::new(""));
        remove_profile_dir(Path::new("/nonexistent/html2pdf-profile"));
    }

    #[test]
    fn launch_flags_force_software_rendering() {
        assert!(CHROME_FLAGS.contains(&"--disable-gpu"));
        assert!(CHROME_FLAGS.contains(&"--use-gl=swiftshader"));
        assert!(CHROME_FLAGS.contains(&"--disable-dev-shm-usage"));
    }
}
