//! Runtime configuration for the category tree store
//!
//! `CanopyConfig` collects the storage settings the core needs at startup.
//! Every field has a default, so partial JSON files deserialize without error.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Upper bound for the SQLite busy timeout (one minute)
const MAX_BUSY_TIMEOUT_MS: u64 = 60_000;

/// Configuration for the category tree database
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CanopyConfig {
    /// Path to the database file
    pub database_path: PathBuf,

    /// How long a connection waits on a locked database before failing
    pub busy_timeout_ms: u64,

    /// Enable Write-Ahead Logging (readers do not block the single writer)
    pub wal_mode: bool,
}

impl Default for CanopyConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("./data/canopy.db"),
            busy_timeout_ms: 5000,
            wal_mode: true,
        }
    }
}

impl CanopyConfig {
    /// Default configuration pointing at a specific database file
    pub fn with_database_path(path: impl Into<PathBuf>) -> Self {
        Self {
            database_path: path.into(),
            ..Self::default()
        }
    }

    /// Parse configuration from a JSON document and validate it
    pub fn from_json_str(json: &str) -> Result<Self, String> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| format!("Invalid configuration: {}", e))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a JSON file
    pub fn from_json_file(path: &Path) -> Result<Self, String> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file {:?}: {}", path, e))?;
        Self::from_json_str(&contents)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.database_path.as_os_str().is_empty() {
            return Err("database_path cannot be empty".to_string());
        }

        if self.busy_timeout_ms == 0 {
            return Err("busy_timeout_ms must be greater than 0".to_string());
        }

        if self.busy_timeout_ms > MAX_BUSY_TIMEOUT_MS {
            return Err(format!(
                "busy_timeout_ms cannot exceed {} ms",
                MAX_BUSY_TIMEOUT_MS
            ));
        }

        Ok(())
    }
}
