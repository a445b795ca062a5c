//! Storage configuration types.

use serde::Deserialize;

/// Path value that selects a private in-memory database.
pub const IN_MEMORY_PATH: &str = ":memory:";

/// Storage configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// SQLite database file. `:memory:` keeps everything in process.
    pub path: String,
    /// Maximum pooled connections for file databases.
    /// In-memory databases always use a single connection.
    pub max_connections: u32,
}

impl StorageConfig {
    pub fn in_memory() -> Self {
        Self::default()
    }

    pub fn with_path(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    pub fn is_in_memory(&self) -> bool {
        self.path == IN_MEMORY_PATH
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: IN_MEMORY_PATH.to_string(),
            max_connections: 5,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_config_default() {
        let storage = StorageConfig::default();
        assert!(storage.is_in_memory());
        assert_eq!(storage.max_connections, 5);
    }

    #[test]
    fn test_storage_config_with_path() {
        let storage = StorageConfig::with_path("/var/lib/circles/circles.db");
        assert!(!storage.is_in_memory());
        assert_eq!(storage.path, "/var/lib/circles/circles.db");
    }
}
