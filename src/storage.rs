//! Data directory layout for task
//!
//! Everything lives under one directory, `$HOME/task` unless `--dir` or
//! `TASK_DIR` says otherwise.
//!
//! # Directory Structure
//!
//! ```text
//! task/
//!   config.toml        # Optional settings
//!   tasks.db/          # sled database (name set by [store].file)
//!   tasks.db.lock      # Exclusive lock held while the database is open
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use directories::BaseDirs;

use crate::error::{Error, Result};

/// Directory created under the home directory when nothing else is given
pub const DEFAULT_DIR_NAME: &str = "task";

/// Name of the config file inside the data directory
pub const CONFIG_FILE: &str = "config.toml";

/// Resolved data directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Storage {
    data_dir: PathBuf,
}

impl Storage {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    /// Use `explicit` when given (flag or environment), else `$HOME/task`.
    pub fn resolve(explicit: Option<PathBuf>) -> Result<Self> {
        if let Some(dir) = explicit {
            return Ok(Self::new(dir));
        }

        let base = BaseDirs::new().ok_or_else(|| {
            Error::InvalidArgument(
                "could not determine the home directory; pass --dir or set TASK_DIR".to_string(),
            )
        })?;
        Ok(Self::new(base.home_dir().join(DEFAULT_DIR_NAME)))
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Path to the database for the configured file name
    pub fn db_path(&self, file_name: &str) -> PathBuf {
        self.data_dir.join(file_name)
    }

    /// Create the data directory if it is missing
    pub fn ensure_dirs(&self) -> Result<()> {
        fs::create_dir_all(&self.data_dir)?;
        Ok(())
    }
}
