//! Postgres token repository
//!
//! Loads the full token table through the `fn_fetch_auth_tokens()` function.
//! A schema-verification call runs before each load so a half-migrated
//! database fails the reload instead of installing a broken snapshot.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use thiserror::Error;

use super::store::{Scope, TokenEntry};

const QUERY_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("schema check failed: {0}")]
    Schema(#[source] sqlx::Error),

    #[error("token query failed: {0}")]
    Query(#[source] sqlx::Error),

    #[error("token query timed out after {}s", QUERY_TIMEOUT.as_secs())]
    Timeout,

    #[error("malformed scope for token: {0}")]
    MalformedScope(#[source] serde_json::Error),
}

/// Source of token snapshots for the reloader.
#[async_trait]
pub trait TokenRepository: Send + Sync {
    async fn load_tokens(&self) -> Result<HashMap<String, TokenEntry>, RepositoryError>;
}

pub struct PostgresTokenRepository {
    pool: PgPool,
}

impl PostgresTokenRepository {
    /// The pool connects lazily: the service may come up before the database
    /// does, and the store simply stays not-ready until a load succeeds.
    pub fn connect_lazy(dsn: &str) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect_lazy(dsn)?;
        Ok(Self { pool })
    }
}

#[async_trait]
impl TokenRepository for PostgresTokenRepository {
    async fn load_tokens(&self) -> Result<HashMap<String, TokenEntry>, RepositoryError> {
        tokio::time::timeout(
            QUERY_TIMEOUT,
            sqlx::query("SELECT fn_verify_tokens_schema();").execute(&self.pool),
        )
        .await
        .map_err(|_| RepositoryError::Timeout)?
        .map_err(RepositoryError::Schema)?;

        let rows = tokio::time::timeout(
            QUERY_TIMEOUT,
            sqlx::query("SELECT token, rate_limit, scope FROM fn_fetch_auth_tokens();")
                .fetch_all(&self.pool),
        )
        .await
        .map_err(|_| RepositoryError::Timeout)?
        .map_err(RepositoryError::Query)?;

        let mut out = HashMap::with_capacity(rows.len());
        for row in rows {
            let token: String = row.try_get("token").map_err(RepositoryError::Query)?;
            let rate_limit: i32 = row.try_get("rate_limit").map_err(RepositoryError::Query)?;
            let scope_raw: Option<serde_json::Value> =
                row.try_get("scope").map_err(RepositoryError::Query)?;

            let scope = match scope_raw {
                Some(value) => Scope::from_flags(
                    serde_json::from_value(value).map_err(RepositoryError::MalformedScope)?,
                ),
                None => Scope::default(),
            };

            out.insert(
                token,
                TokenEntry {
                    rate_limit: rate_limit.max(0) as u32,
                    scope,
                },
            );
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scope_flags_keep_only_granted_names() {
        let value = serde_json::json!({"api": true, "ops": false});
        let flags: HashMap<String, bool> = serde_json::from_value(value).unwrap();
        let scope = Scope::from_flags(flags);
        assert!(scope.contains("api"));
        assert!(!scope.contains("ops"));
    }

    #[test]
    fn scope_rejects_non_boolean_values() {
        let value = serde_json::json!({"api": "yes"});
        let parsed: Result<HashMap<String, bool>, _> = serde_json::from_value(value);
        assert!(parsed.is_err());
    }
}
