//! Content-addressed PDF cache
//!
//! Purely a latency/cost optimisation: every operation is bounded and
//! soft-failing. A read error is a miss, a write error is a no-op, and a
//! Redis that never comes up just disables the cache.

use std::time::Duration;

use redis::aio::ConnectionManager;
use redis::AsyncCommands;

use crate::config::CacheConfig;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(2);
const OP_TIMEOUT: Duration = Duration::from_secs(1);
const FALLBACK_TTL: Duration = Duration::from_secs(60);

#[derive(Clone)]
pub struct PdfCache {
    conn: ConnectionManager,
    ttl: Duration,
}

impl PdfCache {
    /// Connect to the configured Redis. Returns `None` (and logs why) when
    /// caching is disabled or the backend is unreachable.
    pub async fn connect(cfg: &CacheConfig) -> Option<Self> {
        if !cfg.pdf_cache_enabled {
            return None;
        }
        if cfg.redis_host.trim().is_empty() {
            tracing::warn!("PDF cache enabled but redis_host is empty, caching disabled");
            return None;
        }

        let (host, port) = split_addr(&cfg.redis_host);
        let info = redis::ConnectionInfo {
            addr: redis::ConnectionAddr::Tcp(host, port),
            redis: redis::RedisConnectionInfo {
                db: cfg.redis_pdf_db,
                username: None,
                password: None,
            },
        };

        let client = match redis::Client::open(info) {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!(error = %e, "Invalid redis config, PDF caching disabled");
                return None;
            }
        };

        match tokio::time::timeout(CONNECT_TIMEOUT, ConnectionManager::new(client)).await {
            Ok(Ok(conn)) => {
                tracing::info!(host = %cfg.redis_host, db = cfg.redis_pdf_db, "PDF cache connected");
                Some(Self {
                    conn,
                    ttl: cfg.pdf_cache_ttl,
                })
            }
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "Redis unreachable, PDF caching disabled");
                None
            }
            Err(_) => {
                tracing::warn!("Redis connect timed out, PDF caching disabled");
                None
            }
        }
    }

    /// Bounded read; any failure counts as a miss.
    pub async fn get(&self, key: &str) -> Option<Vec<u8>> {
        let mut conn = self.conn.clone();
        match tokio::time::timeout(OP_TIMEOUT, conn.get::<_, Option<Vec<u8>>>(key)).await {
            Ok(Ok(Some(data))) => {
                tracing::info!(key = %key, "PDF cache hit");
                Some(data)
            }
            Ok(Ok(None)) => None,
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "Redis read failed");
                None
            }
            Err(_) => {
                tracing::warn!(key = %key, "Redis read timed out");
                None
            }
        }
    }

    /// Bounded best-effort write.
    pub async fn put(&self, key: &str, data: &[u8]) {
        let ttl = if self.ttl.is_zero() {
            FALLBACK_TTL
        } else {
            self.ttl
        };

        let mut conn = self.conn.clone();
        match tokio::time::timeout(
            OP_TIMEOUT,
            conn.set_ex::<_, _, ()>(key, data, ttl.as_secs().max(1)),
        )
        .await
        {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::warn!(error = %e, "Redis write failed"),
            Err(_) => tracing::warn!(key = %key, "Redis write timed out"),
        }
    }
}

fn split_addr(addr: &str) -> (String, u16) {
    match addr.rsplit_once(':') {
        Some((host, port)) => (host.to_string(), port.parse().unwrap_or(6379)),
        None => (addr.to_string(), 6379),
    }
}
