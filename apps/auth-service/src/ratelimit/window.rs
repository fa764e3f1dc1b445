//! Shared window store
//!
//! Rate-limit counters live in Redis so every auth replica sees the same
//! windows. Store construction never takes the process down: with no address
//! configured, or when the connection cannot be established, counters fall
//! back to process-local memory.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use thiserror::Error;
use tokio::sync::RwLock;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Error)]
pub enum WindowStoreError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("window store timeout")]
    Timeout,
}

/// Counter storage surface required by the sliding-window limiter.
#[async_trait]
pub trait WindowStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, WindowStoreError>;
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration)
        -> Result<(), WindowStoreError>;
    async fn delete(&self, key: &str) -> Result<(), WindowStoreError>;
    async fn reset(&self) -> Result<(), WindowStoreError>;
    async fn close(&self) -> Result<(), WindowStoreError>;
}

#[derive(Debug, Clone, Default)]
pub struct WindowStoreConfig {
    pub addr: String,
    pub password: String,
    pub db: i64,
}

/// Process-local fallback store with lazy expiry.
#[derive(Default)]
pub struct MemoryWindowStore {
    entries: RwLock<HashMap<String, (Vec<u8>, Instant)>>,
}

impl MemoryWindowStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl WindowStore for MemoryWindowStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, WindowStoreError> {
        let entries = self.entries.read().await;
        Ok(entries.get(key).and_then(|(value, expires)| {
            (*expires > Instant::now()).then(|| value.clone())
        }))
    }

    async fn set(
        &self,
        key: &str,
        value: Vec<u8>,
        ttl: Duration,
    ) -> Result<(), WindowStoreError> {
        let mut entries = self.entries.write().await;
        let now = Instant::now();
        entries.retain(|_, (_, expires)| *expires > now);
        entries.insert(key.to_string(), (value, now + ttl));
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), WindowStoreError> {
        self.entries.write().await.remove(key);
        Ok(())
    }

    async fn reset(&self) -> Result<(), WindowStoreError> {
        self.entries.write().await.clear();
        Ok(())
    }

    async fn close(&self) -> Result<(), WindowStoreError> {
        Ok(())
    }
}

pub struct RedisWindowStore {
    conn: ConnectionManager,
}

impl RedisWindowStore {
    pub async fn connect(cfg: &WindowStoreConfig) -> Result<Self, WindowStoreError> {
        let (host, port) = split_addr(&cfg.addr);
        let info = redis::ConnectionInfo {
            addr: redis::ConnectionAddr::Tcp(host, port),
            redis: redis::RedisConnectionInfo {
                db: cfg.db,
                username: None,
                password: (!cfg.password.is_empty()).then(|| cfg.password.clone()),
            },
        };
        let client = redis::Client::open(info)?;
        let conn = tokio::time::timeout(CONNECT_TIMEOUT, ConnectionManager::new(client))
            .await
            .map_err(|_| WindowStoreError::Timeout)??;
        Ok(Self { conn })
    }
}

#[async_trait]
impl WindowStore for RedisWindowStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, WindowStoreError> {
        let mut conn = self.conn.clone();
        Ok(conn.get::<_, Option<Vec<u8>>>(key).await?)
    }

    async fn set(
        &self,
        key: &str,
        value: Vec<u8>,
        ttl: Duration,
    ) -> Result<(), WindowStoreError> {
        let mut conn = self.conn.clone();
        conn.set_ex::<_, _, ()>(key, value, ttl.as_secs().max(1))
            .await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), WindowStoreError> {
        let mut conn = self.conn.clone();
        conn.del::<_, ()>(key).await?;
        Ok(())
    }

    async fn reset(&self) -> Result<(), WindowStoreError> {
        let mut conn = self.conn.clone();
        redis::cmd("FLUSHDB").query_async::<_, ()>(&mut conn).await?;
        Ok(())
    }

    async fn close(&self) -> Result<(), WindowStoreError> {
        Ok(())
    }
}

/// Build the window store for the configured backend, falling back to memory
/// when Redis is not reachable.
pub async fn connect_window_store(cfg: &WindowStoreConfig) -> std::sync::Arc<dyn WindowStore> {
    if cfg.addr.trim().is_empty() {
        tracing::warn!("Redis addr empty, using memory for rate limiting");
        return std::sync::Arc::new(MemoryWindowStore::new());
    }
    match RedisWindowStore::connect(cfg).await {
        Ok(store) => {
            tracing::info!(addr = %cfg.addr, db = cfg.db, "Using redis for rate limiting");
            std::sync::Arc::new(store)
        }
        Err(e) => {
            tracing::error!(error = %e, "Redis limiter store init failed, falling back to memory");
            std::sync::Arc::new(MemoryWindowStore::new())
        }
    }
}

fn split_addr(addr: &str) -> (String, u16) {
    match addr.rsplit_once(':') {
        Some((host, port)) => (
            host.to_string(),
            port.parse().unwrap_or(6379),
        ),
        None => (addr.to_string(), 6379),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_store_round_trip() {
        let store = MemoryWindowStore::new();
        assert!(store.get("k").await.unwrap().is_none());

        store
            .set("k", b"v".to_vec(), Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some(b"v".to_vec()));

        store.delete("k").await.unwrap();
        assert!(store.get("k").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn memory_store_expires_entries() {
        let store = MemoryWindowStore::new();
        store
            .set("k", b"v".to_vec(), Duration::from_millis(1))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(store.get("k").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn memory_store_reset_clears_everything() {
        let store = MemoryWindowStore::new();
        store
            .set("a", b"1".to_vec(), Duration::from_secs(60))
            .await
            .unwrap();
        store
            .set("b", b"2".to_vec(), Duration::from_secs(60))
            .await
            .unwrap();
        store.reset().await.unwrap();
        assert!(store.get("a").await.unwrap().is_none());
        assert!(store.get("b").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn empty_addr_falls_back_to_memory() {
        let store = connect_window_store(&WindowStoreConfig::default()).await;
        store
            .set("k", b"v".to_vec(), Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some(b"v".to_vec()));
    }

    #[test]
    fn split_addr_variants() {
        assert_eq!(split_addr("localhost:6380"), ("localhost".to_string(), 6380));
        assert_eq!(split_addr("redis"), ("redis".to_string(), 6379));
        assert_eq!(split_addr("redis:bad"), ("redis".to_string(), 6379));
    }
}
