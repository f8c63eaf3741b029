use anyhow::Result;
use std::path::PathBuf;

use super::store::LineStore;

/// Share of the limit kept when the sync log rotates
const KEEP_RATIO: f64 = 0.1;

/// Prefix marking a failed remote operation
pub const FAIL_PREFIX: &str = "FAIL: ";

/// Write-once audit trail of remote operation outcomes
#[derive(Debug)]
pub struct SyncLog {
    store: LineStore,
}

impl SyncLog {
    pub fn open(path: impl Into<PathBuf>, limit: usize) -> Result<Self> {
        Ok(Self {
            store: LineStore::open(path, limit, KEEP_RATIO)?,
        })
    }

    pub fn store(&self) -> &LineStore {
        &self.store
    }

    /// Append `[date|time]>\tmessage`
    pub fn log(&self, message: &str) -> Result<()> {
        let line = format!(
            "[{}]>\t{}",
            chrono::Local::now().format("%Y-%m-%d|%H:%M:%S"),
            message
        );
        self.store.append(&line)
    }

    /// Record a failed operation
    pub fn fail(&self, message: &str) -> Result<()> {
        self.log(&format!("{FAIL_PREFIX}{message}"))
    }

    /// The newest `count` entries, oldest first
    pub fn tail(&self, count: usize) -> Result<Vec<String>> {
        self.store.lines_by_index(-(count as isize), None)
    }
}

/// Strip the timestamp prefix from a sync-log line
pub fn message_of(line: &str) -> &str {
    line.split_once(">\t").map(|(_, m)| m).unwrap_or(line)
}
