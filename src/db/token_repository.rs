//! Token repository
//!
//! Rows are keyed by the token fingerprint; plaintexts are never stored.

use std::time::Duration;

use sqlx::SqlitePool;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::{bounded, format_timestamp, parse_timestamp, StoreError};
use crate::models::{Fingerprint, Token, TokenRecord, TokenScope};

pub struct TokenRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> TokenRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn insert(&self, token: &Token) -> Result<(), StoreError> {
        bounded(
            sqlx::query("INSERT INTO tokens (hash, user_id, expiry, scope) VALUES (?, ?, ?, ?)")
                .bind(token.fingerprint.as_slice())
                .bind(token.user_id)
                .bind(format_timestamp(&token.expiry))
                .bind(token.scope.as_str())
                .execute(self.pool),
        )
        .await?;
        Ok(())
    }

    /// Exact match on fingerprint and scope. Expiry is left to the caller.
    pub async fn find(
        &self,
        fingerprint: &Fingerprint,
        scope: TokenScope,
    ) -> Result<TokenRecord, StoreError> {
        let row = bounded(
            sqlx::query_as::<_, (i64, String)>(
                "SELECT user_id, expiry FROM tokens WHERE hash = ? AND scope = ?",
            )
            .bind(fingerprint.as_slice())
            .bind(scope.as_str())
            .fetch_optional(self.pool),
        )
        .await?;

        let (user_id, expiry) = row.ok_or(StoreError::NotFound)?;
        Ok(TokenRecord {
            user_id,
            expiry: parse_timestamp(&expiry)?,
        })
    }

    /// Revoke every token of `scope` held by `user_id`
    pub async fn delete_all_for_user(
        &self,
        scope: TokenScope,
        user_id: i64,
    ) -> Result<u64, StoreError> {
        let result = bounded(
            sqlx::query("DELETE FROM tokens WHERE scope = ? AND user_id = ?")
                .bind(scope.as_str())
                .bind(user_id)
                .execute(self.pool),
        )
        .await?;
        Ok(result.rows_affected())
    }

    /// Drop rows whose expiry has passed
    pub async fn delete_expired(&self) -> Result<u64, StoreError> {
        let now = format_timestamp(&chrono::Utc::now());
        let result = bounded(
            sqlx::query("DELETE FROM tokens WHERE expiry <= ?")
                .bind(now)
                .execute(self.pool),
        )
        .await?;
        Ok(result.rows_affected())
    }
}

/// How often expired tokens are swept from storage
pub const PURGE_PERIOD: Duration = Duration::from_secs(60 * 60);

/// Delete expired tokens every `period` until aborted
pub fn spawn_expired_purge(pool: SqlitePool, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        loop {
            interval.tick().await;
            match TokenRepository::new(&pool).delete_expired().await {
                Ok(0) => {}
                Ok(purged) => debug!(purged, "Expired tokens purged"),
                Err(e) => warn!(error = %e, "Expired token purge failed"),
            }
        }
    })
}
