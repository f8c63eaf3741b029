use anyhow::Result;
use std::path::{Path, PathBuf};

use crate::config::ConfigManager;

/// Locations of the files the engine persists between runs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatePaths {
    /// Append-only record of local file-system events
    pub change_log: PathBuf,

    /// Audit trail of remote operation outcomes
    pub sync_log: PathBuf,

    /// JSON map of per-project checkpoints
    pub checkpoint: PathBuf,
}

impl StatePaths {
    /// Paths inside the user's configuration directory, created if missing
    pub fn from_config() -> Result<Self> {
        ConfigManager::ensure_config_dir()?;
        Ok(Self {
            change_log: ConfigManager::change_log_path()?,
            sync_log: ConfigManager::sync_log_path()?,
            checkpoint: ConfigManager::checkpoint_path()?,
        })
    }

    /// Same file names placed under `dir`
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            change_log: dir.join("changes.log"),
            sync_log: dir.join("sync.log"),
            checkpoint: dir.join("checkpoint.json"),
        }
    }
}
