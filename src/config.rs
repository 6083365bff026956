//! Configuration loading and management
//!
//! Handles parsing of the optional `config.toml` in the data directory.

use serde::Deserialize;
use std::path::Path;

use crate::error::{Error, Result};
use crate::lock::DEFAULT_LOCK_TIMEOUT_MS;
use crate::storage::CONFIG_FILE;

/// Upper bound accepted for `store.lock_timeout_ms`
pub const MAX_LOCK_TIMEOUT_MS: u64 = 60_000;

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Config {
    /// Database settings
    #[serde(default)]
    pub store: StoreConfig,

    /// Defaults for `task list`
    #[serde(default)]
    pub list: ListConfig,

    /// Defaults for `task stats`
    #[serde(default)]
    pub stats: StatsConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StoreConfig {
    /// Database file name, relative to the data directory
    #[serde(default = "default_store_file")]
    pub file: String,

    /// How long to wait for another process to release the database
    #[serde(default = "default_lock_timeout_ms")]
    pub lock_timeout_ms: u64,
}

fn default_store_file() -> String {
    "tasks.db".to_string()
}

fn default_lock_timeout_ms() -> u64 {
    DEFAULT_LOCK_TIMEOUT_MS
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            file: default_store_file(),
            lock_timeout_ms: default_lock_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ListConfig {
    /// Print the tag column without `--tag`
    #[serde(default)]
    pub show_tags: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct StatsConfig {
    /// Print the per-day average without `--average`
    #[serde(default)]
    pub show_average: bool,
}

impl Config {
    /// Load and validate a config file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load `config.toml` from the data directory, or return defaults
    pub fn load_from_dir(data_dir: &Path) -> Self {
        let config_path = data_dir.join(CONFIG_FILE);
        if !config_path.exists() {
            return Self::default();
        }
        match Self::load(&config_path) {
            Ok(config) => config,
            Err(err) => {
                tracing::warn!(path = %config_path.display(), error = %err, "ignoring config");
                Self::default()
            }
        }
    }

    fn validate(&self) -> Result<()> {
        self.store.validate()
    }
}

impl StoreConfig {
    fn validate(&self) -> Result<()> {
        let file = self.file.trim();
        if file.is_empty() {
            return Err(Error::InvalidConfig("store.file cannot be empty".to_string()));
        }
        if file.contains(|ch: char| ch == '/' || ch == '\\') || file == "." || file == ".." {
            return Err(Error::InvalidConfig(
                "store.file must be a plain file name".to_string(),
            ));
        }
        if self.lock_timeout_ms == 0 {
            return Err(Error::InvalidConfig(
                "store.lock_timeout_ms must be >= 1".to_string(),
            ));
        }
        if self.lock_timeout_ms > MAX_LOCK_TIMEOUT_MS {
            return Err(Error::InvalidConfig(format!(
                "store.lock_timeout_ms must be <= {MAX_LOCK_TIMEOUT_MS}"
            )));
        }
        Ok(())
    }
}
