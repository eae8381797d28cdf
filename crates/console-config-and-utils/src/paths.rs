//! File system paths for the console.

use crate::{CoreError, CoreResult};
use std::path::PathBuf;

/// Directory name under the user's home directory.
const BASE_DIR_NAME: &str = ".messaging-console";
/// Central JSONL log file name.
const LOG_FILE_NAME: &str = "console.jsonl";

/// Manages file system paths for the console.
#[derive(Debug, Clone)]
pub struct Paths {
    /// Base directory for runtime files (~/.messaging-console)
    base_dir: PathBuf,
}

impl Paths {
    /// Create a new Paths instance rooted at `~/.messaging-console`.
    pub fn new() -> CoreResult<Self> {
        let home = dirs::home_dir()
            .ok_or_else(|| CoreError::Path("Could not determine home directory".to_string()))?;

        Ok(Self {
            base_dir: home.join(BASE_DIR_NAME),
        })
    }

    /// Create a new Paths instance with a custom base directory.
    pub fn with_base_dir(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    /// Get the base directory.
    pub fn base_dir(&self) -> &PathBuf {
        &self.base_dir
    }

    /// Get the config file path (<base>/config.json).
    pub fn config_file(&self) -> PathBuf {
        self.base_dir.join("config.json")
    }

    /// Get the logs directory (<base>/logs).
    pub fn logs_dir(&self) -> PathBuf {
        self.base_dir.join("logs")
    }

    /// Get the central log file (<base>/logs/console.jsonl).
    pub fn log_file(&self) -> PathBuf {
        self.logs_dir().join(LOG_FILE_NAME)
    }

    /// Get the local contact cache directory (<base>/cache).
    pub fn cache_dir(&self) -> PathBuf {
        self.base_dir.join("cache")
    }

    /// Ensure all required directories exist.
    pub fn ensure_dirs(&self) -> CoreResult<()> {
        std::fs::create_dir_all(&self.base_dir)?;
        std::fs::create_dir_all(self.logs_dir())?;
        std::fs::create_dir_all(self.cache_dir())?;
        Ok(())
    }
}
