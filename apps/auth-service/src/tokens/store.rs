//! In-memory token snapshot
//!
//! Keeps `token -> entry` in memory for fast lookup on the request path.
//! The whole map is swapped atomically on reload; readers only ever see a
//! complete snapshot.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::RwLock;

/// The set of scope names granted to a token.
///
/// Built from the repository's `{name: bool}` JSON column; only names mapped
/// to `true` are members.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Scope(HashSet<String>);

impl Scope {
    pub fn from_flags(flags: HashMap<String, bool>) -> Self {
        Self(
            flags
                .into_iter()
                .filter_map(|(name, granted)| granted.then_some(name))
                .collect(),
        )
    }

    pub fn contains(&self, scope: &str) -> bool {
        self.0.contains(scope)
    }
}

impl FromIterator<String> for Scope {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenEntry {
    pub rate_limit: u32,
    pub scope: Scope,
}

type Snapshot = Arc<HashMap<String, TokenEntry>>;

/// Thread-safe token lookup backed by a replaceable snapshot.
///
/// `None` means no load has ever succeeded; once a snapshot is installed the
/// store stays ready for the rest of the process lifetime.
#[derive(Debug, Default)]
pub struct TokenStore {
    map: RwLock<Option<Snapshot>>,
}

impl TokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn ready(&self) -> bool {
        self.map.read().await.is_some()
    }

    pub async fn validate(&self, token: &str) -> bool {
        match self.snapshot().await {
            Some(map) => map.contains_key(token),
            None => false,
        }
    }

    /// The per-token request budget, or 0 when the token is unknown, the
    /// store is not ready, or the token carries no limit.
    pub async fn rate_limit(&self, token: &str) -> u32 {
        match self.snapshot().await {
            Some(map) => map.get(token).map(|e| e.rate_limit).unwrap_or(0),
            None => 0,
        }
    }

    pub async fn has_scope(&self, token: &str, scope: &str) -> bool {
        match self.snapshot().await {
            Some(map) => map
                .get(token)
                .map(|e| e.scope.contains(scope))
                .unwrap_or(false),
            None => false,
        }
    }

    /// Atomically install a new snapshot. Partial updates are impossible:
    /// readers hold either the old `Arc` or the new one.
    pub async fn replace(&self, all: HashMap<String, TokenEntry>) {
        let mut guard = self.map.write().await;
        *guard = Some(Arc::new(all));
    }

    async fn snapshot(&self) -> Option<Snapshot> {
        self.map.read().await.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(rate_limit: u32, scopes: &[(&str, bool)]) -> TokenEntry {
        TokenEntry {
            rate_limit,
            scope: Scope::from_flags(
                scopes
                    .iter()
                    .map(|(name, granted)| (name.to_string(), *granted))
                    .collect(),
            ),
        }
    }

    #[tokio::test]
    async fn ready_validate_rate_limit() {
        let store = TokenStore::new();
        assert!(!store.ready().await);
        assert!(!store.validate("abc").await);
        assert_eq!(store.rate_limit("abc").await, 0);

        store
            .replace(HashMap::from([(
                "abc".to_string(),
                entry(10, &[("api", true), ("ops", false)]),
            )]))
            .await;

        assert!(store.ready().await);
        assert!(store.validate("abc").await);
        assert!(!store.validate("missing").await);
        assert_eq!(store.rate_limit("abc").await, 10);
        assert_eq!(store.rate_limit("missing").await, 0);
        assert!(store.has_scope("abc", "api").await);
        assert!(!store.has_scope("abc", "ops").await);
        assert!(!store.has_scope("missing", "api").await);
    }

    #[tokio::test]
    async fn replace_swaps_whole_snapshot() {
        let store = TokenStore::new();
        store
            .replace(HashMap::from([("old".to_string(), entry(1, &[]))]))
            .await;
        store
            .replace(HashMap::from([("new".to_string(), entry(2, &[]))]))
            .await;

        assert!(!store.validate("old").await);
        assert!(store.validate("new").await);
        // ready never reverts, even after replacing with an empty map
        store.replace(HashMap::new()).await;
        assert!(store.ready().await);
    }

    #[tokio::test]
    async fn concurrent_readers_see_complete_snapshots() {
        let store = Arc::new(TokenStore::new());

        let readers: Vec<_> = (0..8)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move {
                    for _ in 0..200 {
                        // Every installed generation contains "a"; a reader
                        // that observes readiness must find it.
                        if store.ready().await {
                            assert!(store.validate("a").await);
                        }
                    }
                })
            })
            .collect();

        for gen in 0..50u32 {
            store
                .replace(HashMap::from([("a".to_string(), entry(gen, &[]))]))
                .await;
        }

        for r in readers {
            r.await.unwrap();
        }
    }
}
