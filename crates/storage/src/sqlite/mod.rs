use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use thiserror::Error;

use crate::repository::{ProgressRepository, Storage};

mod mapping;
mod migrate;
mod progress_repo;

/// Progress records backed by a `SQLite` pool.
#[derive(Clone)]
pub struct SqliteRepository {
    pool: SqlitePool,
}

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SqliteInitError {
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

/// Connection settings for the progress store.
///
/// Several devices writing the same record contend on one row; the busy
/// timeout decides how long a writer waits on the `SQLite` lock before the
/// attempt fails and the service retries from a fresh read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SqliteOptions {
    pub max_connections: u32,
    pub acquire_timeout: Duration,
    pub busy_timeout: Duration,
}

impl SqliteOptions {
    pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;
    pub const DEFAULT_WAIT: Duration = Duration::from_secs(5);

    /// Lock waits and pool checkouts never outlast `wait`.
    #[must_use]
    pub fn bounded_by(wait: Duration) -> Self {
        Self {
            max_connections: Self::DEFAULT_MAX_CONNECTIONS,
            acquire_timeout: wait,
            busy_timeout: wait,
        }
    }

    fn connect_options(&self, database_url: &str) -> Result<SqliteConnectOptions, sqlx::Error> {
        Ok(SqliteConnectOptions::from_str(database_url)?
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(self.busy_timeout))
    }
}

impl Default for SqliteOptions {
    fn default() -> Self {
        Self::bounded_by(Self::DEFAULT_WAIT)
    }
}

impl SqliteRepository {
    /// Open the store with default connection settings.
    ///
    /// # Errors
    ///
    /// Returns `SqliteInitError` if the URL is malformed or the first
    /// connection cannot be established.
    pub async fn connect(database_url: &str) -> Result<Self, SqliteInitError> {
        Self::connect_with(database_url, SqliteOptions::default()).await
    }

    /// Open the store with explicit connection settings. Every pooled
    /// connection enforces foreign keys, so deleting a course record removes
    /// its lecture and sub-lecture rows.
    ///
    /// # Errors
    ///
    /// Returns `SqliteInitError` if the URL is malformed or the first
    /// connection cannot be established.
    pub async fn connect_with(
        database_url: &str,
        options: SqliteOptions,
    ) -> Result<Self, SqliteInitError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(options.max_connections.max(1))
            .acquire_timeout(options.acquire_timeout)
            .connect_with(options.connect_options(database_url)?)
            .await?;
        Ok(Self { pool })
    }

    /// Create the progress tables if they do not exist.
    ///
    /// # Errors
    ///
    /// Returns `SqliteInitError` if migration queries fail.
    pub async fn migrate(&self) -> Result<(), SqliteInitError> {
        migrate::run_migrations(&self.pool).await
    }
}

impl Storage {
    /// Open and migrate a `SQLite` progress store.
    ///
    /// # Errors
    ///
    /// Returns `SqliteInitError` if connection or migrations cannot be
    /// completed.
    pub async fn sqlite(
        database_url: &str,
        options: SqliteOptions,
    ) -> Result<Self, SqliteInitError> {
        let repo = SqliteRepository::connect_with(database_url, options).await?;
        repo.migrate().await?;
        let progress: Arc<dyn ProgressRepository> = Arc::new(repo);
        Ok(Self { progress })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repository_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<SqliteRepository>();
    }

    #[test]
    fn bounded_options_share_one_wait() {
        let options = SqliteOptions::bounded_by(Duration::from_millis(750));
        assert_eq!(options.busy_timeout, Duration::from_millis(750));
        assert_eq!(options.acquire_timeout, Duration::from_millis(750));
        assert_eq!(options.max_connections, SqliteOptions::DEFAULT_MAX_CONNECTIONS);
        assert_eq!(SqliteOptions::default().busy_timeout, SqliteOptions::DEFAULT_WAIT);
    }

    #[tokio::test]
    async fn pooled_connections_apply_lock_wait_and_foreign_keys() {
        let options = SqliteOptions::bounded_by(Duration::from_millis(1_250));
        let repo = SqliteRepository::connect_with("sqlite::memory:", options)
            .await
            .unwrap();

        let busy: i64 = sqlx::query_scalar("PRAGMA busy_timeout")
            .fetch_one(&repo.pool)
            .await
            .unwrap();
        assert_eq!(busy, 1_250);

        let foreign_keys: i64 = sqlx::query_scalar("PRAGMA foreign_keys")
            .fetch_one(&repo.pool)
            .await
            .unwrap();
        assert_eq!(foreign_keys, 1);
    }
}
