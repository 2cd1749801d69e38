//! # Database Connection Pool Module
//!
//! Owns the SQLite connection pool every store handle runs on. File-backed
//! databases get WAL journaling and a small pragma tune-up; in-memory
//! databases are pinned to a single connection because each SQLite memory
//! connection is its own private database.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let pool = create_pool(DatabaseConfig::new("sqlite:offsync.db")).await?;
//! let store = LocalStore::with_default_catalog(pool, "claims")?;
//! ```

use crate::error::{Result, StoreError};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use std::str::FromStr;
use std::time::Duration;
use tracing::{info, warn};

/// Database connection pool configuration.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Database URL, e.g. `sqlite:offsync.db` or `sqlite::memory:`.
    pub database_url: String,
    /// Minimum number of idle connections to maintain.
    pub min_connections: u32,
    /// Maximum number of connections in the pool.
    pub max_connections: u32,
    /// Maximum time to wait for a connection from the pool.
    pub acquire_timeout: Duration,
    /// Maximum lifetime of a single connection.
    pub max_lifetime: Option<Duration>,
    /// How long a connection may sit idle before being closed.
    pub idle_timeout: Option<Duration>,
    /// How long SQLite waits on a locked table before failing a statement.
    pub busy_timeout: Duration,
    /// Prepared statement cache size per connection.
    pub statement_cache_capacity: usize,
}

impl DatabaseConfig {
    /// Configuration for a file-backed database.
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            min_connections: 1,
            max_connections: 5,
            acquire_timeout: Duration::from_secs(30),
            max_lifetime: Some(Duration::from_secs(30 * 60)),
            idle_timeout: Some(Duration::from_secs(10 * 60)),
            busy_timeout: Duration::from_secs(5),
            statement_cache_capacity: 100,
        }
    }

    /// Configuration for an in-memory database.
    ///
    /// The pool is capped at one connection and recycling is disabled: every
    /// fresh in-memory connection starts from an empty database, so handing
    /// out a second connection would split the data.
    pub fn in_memory() -> Self {
        Self {
            database_url: "sqlite::memory:".to_string(),
            min_connections: 1,
            max_connections: 1,
            acquire_timeout: Duration::from_secs(30),
            max_lifetime: None,
            idle_timeout: None,
            busy_timeout: Duration::from_secs(5),
            statement_cache_capacity: 100,
        }
    }

    pub fn min_connections(mut self, min_connections: u32) -> Self {
        self.min_connections = min_connections;
        self
    }

    pub fn max_connections(mut self, max_connections: u32) -> Self {
        self.max_connections = max_connections;
        self
    }

    pub fn acquire_timeout(mut self, acquire_timeout: Duration) -> Self {
        self.acquire_timeout = acquire_timeout;
        self
    }

    pub fn busy_timeout(mut self, busy_timeout: Duration) -> Self {
        self.busy_timeout = busy_timeout;
        self
    }

    pub fn statement_cache_capacity(mut self, capacity: usize) -> Self {
        self.statement_cache_capacity = capacity;
        self
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self::in_memory()
    }
}

/// Create a connection pool from the given configuration.
///
/// Verifies the database answers a trivial query before returning, so a
/// misconfigured URL fails here rather than on the first store operation.
///
/// # Errors
///
/// Returns [`StoreError::Database`] when the URL does not parse or the
/// database cannot be reached.
pub async fn create_pool(config: DatabaseConfig) -> Result<SqlitePool> {
    let connect_options = SqliteConnectOptions::from_str(&config.database_url)
        .map_err(StoreError::Database)?
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .busy_timeout(config.busy_timeout)
        .create_if_missing(true)
        .pragma("cache_size", "-64000")
        .statement_cache_capacity(config.statement_cache_capacity);

    let pool = SqlitePoolOptions::new()
        .min_connections(config.min_connections)
        .max_connections(config.max_connections)
        .acquire_timeout(config.acquire_timeout)
        .max_lifetime(config.max_lifetime)
        .idle_timeout(config.idle_timeout)
        .connect_with(connect_options)
        .await
        .map_err(|e| {
            warn!(error = %e, url = %config.database_url, "Failed to create database pool");
            StoreError::Database(e)
        })?;

    health_check(&pool).await?;
    info!(url = %config.database_url, "Database pool ready");
    Ok(pool)
}

/// Verify the database is reachable.
pub async fn health_check(pool: &SqlitePool) -> Result<()> {
    sqlx::query("SELECT 1").fetch_one(pool).await?;
    Ok(())
}

/// In-memory pool for tests.
pub async fn create_test_pool() -> Result<SqlitePool> {
    create_pool(DatabaseConfig::in_memory()).await
}

// ===== Tests =====

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_in_memory_pool() {
        let pool = create_pool(DatabaseConfig::in_memory()).await.unwrap();
        health_check(&pool).await.unwrap();
    }

    #[tokio::test]
    async fn test_in_memory_pool_keeps_data_on_one_connection() {
        let pool = create_test_pool().await.unwrap();

        sqlx::query("CREATE TABLE scratch (value INTEGER)")
            .execute(&pool)
            .await
            .unwrap();
        sqlx::query("INSERT INTO scratch (value) VALUES (42)")
            .execute(&pool)
            .await
            .unwrap();

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM scratch")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_database_config_builder() {
        let config = DatabaseConfig::new("sqlite:test.db")
            .min_connections(2)
            .max_connections(10)
            .acquire_timeout(Duration::from_secs(5))
            .busy_timeout(Duration::from_secs(1))
            .statement_cache_capacity(50);

        assert_eq!(config.database_url, "sqlite:test.db");
        assert_eq!(config.min_connections, 2);
        assert_eq!(config.max_connections, 10);
        assert_eq!(config.acquire_timeout, Duration::from_secs(5));
        assert_eq!(config.busy_timeout, Duration::from_secs(1));
        assert_eq!(config.statement_cache_capacity, 50);
    }

    #[test]
    fn test_in_memory_config_is_single_connection() {
        let config = DatabaseConfig::in_memory();
        assert_eq!(config.max_connections, 1);
        assert!(config.max_lifetime.is_none());
        assert!(config.idle_timeout.is_none());
    }

    #[tokio::test]
    async fn test_concurrent_queries() {
        let pool = create_test_pool().await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let pool = pool.clone();
            handles.push(tokio::spawn(async move {
                sqlx::query("SELECT 1").fetch_one(&pool).await.unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_journal_mode_applied() {
        let pool = create_test_pool().await.unwrap();
        let mode: String = sqlx::query_scalar("PRAGMA journal_mode")
            .fetch_one(&pool)
            .await
            .unwrap();
        // In-memory databases report "memory" regardless of the WAL request.
        assert!(mode == "wal" || mode == "memory");
    }
}
