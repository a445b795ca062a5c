//! Storage implementations.
//!
//! All state lives in one SQLite database. Repository functions take a
//! `&mut SqliteConnection` so the engine can compose several of them inside a
//! single `BEGIN IMMEDIATE` transaction.

use tracing::info;

use crate::config::StorageConfig;
use crate::model::UnknownVariant;

pub mod helpers;
pub mod schema;
pub mod sqlite;

pub use sqlite::SqliteStore;

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// Errors from the relational store.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),

    #[error("Invalid date: {0}")]
    InvalidDate(String),

    #[error("Invalid UUID: {0}")]
    InvalidUuid(#[from] uuid::Error),

    #[error("Invalid stored value: {0}")]
    InvalidValue(#[from] UnknownVariant),

    #[error("Corrupt {table} row: {reason}")]
    Corrupt { table: &'static str, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Open the configured database and apply the schema.
pub async fn init_storage(config: &StorageConfig) -> Result<SqliteStore> {
    info!(path = %config.path, "Storage: sqlite");

    let store = SqliteStore::connect(config).await?;
    store.init().await?;
    Ok(store)
}
