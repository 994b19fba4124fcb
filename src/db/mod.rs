//! Database layer
//!
//! SQLite storage for:
//! - User accounts and their permission grants
//! - Hashed tokens (authentication, activation, password reset)
//! - The movie catalog

pub mod movie_repository;
pub mod permission_repository;
pub mod token_repository;
pub mod user_repository;

use std::{future::Future, str::FromStr, time::Duration};

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions},
    Pool, Sqlite,
};
use thiserror::Error;

use crate::config::DatabaseConfig;

pub use movie_repository::MovieRepository;
pub use permission_repository::PermissionRepository;
pub use token_repository::TokenRepository;
pub use user_repository::UserRepository;

/// Database connection pool type
pub type DbPool = Pool<Sqlite>;

/// Upper bound on any single storage round trip
pub const QUERY_TIMEOUT: Duration = Duration::from_secs(3);

/// Storage failures
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,

    #[error("edit conflict")]
    EditConflict,

    #[error("duplicate email")]
    DuplicateEmail,

    #[error("storage operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("entropy source failure: {0}")]
    Entropy(String),

    #[error("password hashing failure: {0}")]
    Hashing(String),

    #[error("corrupt row: {0}")]
    Corrupt(String),

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

impl StoreError {
    /// Shorthand used by tests and fakes
    pub fn timeout() -> Self {
        StoreError::Timeout(QUERY_TIMEOUT)
    }
}

/// Run a query under [`QUERY_TIMEOUT`]
pub async fn bounded<T, F>(query: F) -> Result<T, StoreError>
where
    F: Future<Output = Result<T, sqlx::Error>>,
{
    match tokio::time::timeout(QUERY_TIMEOUT, query).await {
        Ok(result) => result.map_err(StoreError::from),
        Err(_) => Err(StoreError::Timeout(QUERY_TIMEOUT)),
    }
}

/// Fixed-width UTC timestamp so that stored values order lexically
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse a timestamp column written by [`format_timestamp`]
pub fn parse_timestamp(ts: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(ts)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::Corrupt(format!("invalid timestamp {:?}: {}", ts, e)))
}

/// Initialize the database connection pool and run migrations
pub async fn init_pool(config: &DatabaseConfig) -> Result<DbPool> {
    let options = SqliteConnectOptions::from_str(&config.url)
        .with_context(|| format!("Invalid database URL: {}", config.url))?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .foreign_keys(true)
        .busy_timeout(Duration::from_secs(config.connect_timeout_secs));

    let pool = SqlitePoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
        .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
        .connect_with(options)
        .await
        .context("Failed to connect to database")?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("Failed to run database migrations")?;

    Ok(pool)
}

/// Cheap liveness check for the pool
pub async fn check_health(pool: &DbPool) -> Result<(), StoreError> {
    bounded(sqlx::query("SELECT 1").execute(pool)).await?;
    Ok(())
}
