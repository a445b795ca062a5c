//! SQLite store and per-table repositories.

pub mod early_payouts;
pub mod fee_payments;
pub mod groups;
pub mod members;
pub mod memberships;
pub mod referrals;
pub mod trust_events;

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use sqlx::pool::PoolConnection;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Sqlite, SqliteConnection, SqlitePool};
use tracing::debug;

use crate::config::StorageConfig;
use crate::storage::schema::{CREATE_INDEXES, CREATE_TABLES};
use crate::storage::{Result, StorageError};

/// Pooled handle on the circles database.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Wrap an existing pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open a pool for the configured path.
    ///
    /// An in-memory database exists per connection, so it gets exactly one
    /// connection that is never recycled.
    pub async fn connect(config: &StorageConfig) -> Result<Self> {
        let pool = if config.is_in_memory() {
            let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect_with(options)
                .await?
        } else {
            if let Some(parent) = Path::new(&config.path).parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }
            let options = SqliteConnectOptions::new()
                .filename(&config.path)
                .create_if_missing(true)
                .foreign_keys(true)
                .busy_timeout(Duration::from_secs(5));
            SqlitePoolOptions::new()
                .max_connections(config.max_connections.max(1))
                .connect_with(options)
                .await?
        };

        Ok(Self::new(pool))
    }

    /// Initialize the database schema.
    pub async fn init(&self) -> Result<()> {
        for statement in CREATE_TABLES.iter().chain(CREATE_INDEXES) {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        debug!("circles schema ready");
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Borrow a connection for reads outside any transaction.
    pub async fn acquire(&self) -> Result<PoolConnection<Sqlite>> {
        Ok(self.pool.acquire().await?)
    }

    /// Start a write transaction on a fresh connection.
    ///
    /// BEGIN IMMEDIATE acquires the write lock upfront, preventing deadlocks
    /// when concurrent DEFERRED transactions race to upgrade from shared to exclusive.
    pub async fn begin_immediate(&self) -> Result<PoolConnection<Sqlite>> {
        let mut conn = self.pool.acquire().await?;
        sqlx::query("BEGIN IMMEDIATE").execute(&mut *conn).await?;
        Ok(conn)
    }

    /// Commit on success, roll back on failure, and hand the result through.
    pub async fn finish<T, E>(
        conn: &mut SqliteConnection,
        result: std::result::Result<T, E>,
    ) -> std::result::Result<T, E>
    where
        E: From<StorageError>,
    {
        match result {
            Ok(value) => {
                sqlx::query("COMMIT")
                    .execute(&mut *conn)
                    .await
                    .map_err(|e| E::from(StorageError::Database(e)))?;
                Ok(value)
            }
            Err(e) => {
                let _ = sqlx::query("ROLLBACK").execute(&mut *conn).await;
                Err(e)
            }
        }
    }
}

/// Count rows changed by the last statement, treating zero as a lost race.
pub(crate) fn expect_one_row(affected: u64, table: &'static str) -> Result<()> {
    if affected == 1 {
        Ok(())
    } else {
        Err(StorageError::Corrupt {
            table,
            reason: format!("expected one row to change, {affected} did"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::Row;

    #[tokio::test]
    async fn test_init_is_idempotent() {
        let store = SqliteStore::connect(&StorageConfig::in_memory()).await.unwrap();
        store.init().await.unwrap();
        store.init().await.unwrap();

        let row = sqlx::query("SELECT COUNT(*) AS n FROM sqlite_master WHERE type = 'table'")
            .fetch_one(store.pool())
            .await
            .unwrap();
        let tables: i64 = row.get("n");
        assert_eq!(tables, 7);
    }

    #[tokio::test]
    async fn test_rollback_discards_writes() {
        let store = SqliteStore::connect(&StorageConfig::in_memory()).await.unwrap();
        store.init().await.unwrap();

        let mut conn = store.begin_immediate().await.unwrap();
        let result: Result<()> = async {
            sqlx::query(
                "INSERT INTO members (id, username, referral_code, created_at) \
                 VALUES ('a', 'asha', 'CIR000001', '2026-01-01T00:00:00.000000Z')",
            )
            .execute(&mut *conn)
            .await?;
            Err(StorageError::Corrupt {
                table: "members",
                reason: "forced".to_string(),
            })
        }
        .await;
        assert!(SqliteStore::finish(&mut conn, result).await.is_err());
        drop(conn);

        let row = sqlx::query("SELECT COUNT(*) AS n FROM members")
            .fetch_one(store.pool())
            .await
            .unwrap();
        let members: i64 = row.get("n");
        assert_eq!(members, 0);
    }

    #[tokio::test]
    async fn test_file_database_creates_parent_dir() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("circles.db");
        let config = StorageConfig::with_path(path.to_str().unwrap());

        let store = SqliteStore::connect(&config).await.unwrap();
        store.init().await.unwrap();
        assert!(path.exists());
    }
}
