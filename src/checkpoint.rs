//! Persisted pointer to the last remote commit this client has accounted for.

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Last remote commit seen plus the time of the last push
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_commit_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_commit_date: Option<DateTime<FixedOffset>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_pushed: Option<DateTime<Utc>>,
}

/// JSON file of checkpoints keyed by project
///
/// Writes are last-write-wins; the slot is bookkeeping, not a transaction log.
#[derive(Debug)]
pub struct CheckpointStore {
    path: PathBuf,
    project: String,
    lock: Mutex<()>,
}

impl CheckpointStore {
    pub fn new(path: impl Into<PathBuf>, project: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            project: project.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Checkpoint for this store's project; empty when none was saved yet
    pub fn load(&self) -> Result<Checkpoint> {
        let _guard = self.guard()?;
        Ok(self
            .read_all()?
            .remove(&self.project)
            .unwrap_or_default())
    }

    /// Record `commit_id` as the newest accounted-for commit
    ///
    /// A commit older than the stored one is ignored so the pointer only moves
    /// forward. Returns whether the checkpoint changed.
    pub fn advance(&self, commit_id: &str, committed: DateTime<FixedOffset>) -> Result<bool> {
        let _guard = self.guard()?;
        let mut all = self.read_all()?;
        let current = all.get(&self.project).cloned().unwrap_or_default();

        if let Some(stored) = current.last_commit_date {
            if committed < stored {
                log::debug!(
                    "Ignoring checkpoint {commit_id} ({committed}) older than stored {stored}"
                );
                return Ok(false);
            }
        }

        let next = Checkpoint {
            last_commit_id: Some(commit_id.to_string()),
            last_commit_date: Some(committed),
            last_pushed: current.last_pushed,
        };
        let changed = next != current;
        all.insert(self.project.clone(), next);
        self.write_all(&all)?;
        Ok(changed)
    }

    /// Stamp the time of the last push
    pub fn mark_pushed(&self, at: DateTime<Utc>) -> Result<()> {
        let _guard = self.guard()?;
        let mut all = self.read_all()?;
        let mut checkpoint = all.get(&self.project).cloned().unwrap_or_default();
        checkpoint.last_pushed = Some(at);
        all.insert(self.project.clone(), checkpoint);
        self.write_all(&all)
    }

    /// Forget this project's checkpoint
    pub fn reset(&self) -> Result<()> {
        let _guard = self.guard()?;
        let mut all = self.read_all()?;
        if all.remove(&self.project).is_some() {
            self.write_all(&all)?;
        }
        Ok(())
    }

    fn guard(&self) -> Result<std::sync::MutexGuard<'_, ()>> {
        self.lock
            .lock()
            .map_err(|_| anyhow!("Checkpoint lock poisoned"))
    }

    fn read_all(&self) -> Result<BTreeMap<String, Checkpoint>> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let content = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read checkpoint: {}", self.path.display()))?;
        if content.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        serde_json::from_str(&content).context("Failed to parse checkpoint file")
    }

    fn write_all(&self, all: &BTreeMap<String, Checkpoint>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content =
            serde_json::to_string_pretty(all).context("Failed to serialize checkpoint")?;
        fs::write(&self.path, content)
            .with_context(|| format!("Failed to write checkpoint: {}", self.path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn date(s: &str) -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339(s).unwrap()
    }

    #[test]
    fn test_empty_store_loads_default() {
        let dir = TempDir::new().unwrap();
        let store = CheckpointStore::new(dir.path().join("checkpoint.json"), "alice/notes");
        assert_eq!(store.load().unwrap(), Checkpoint::default());
    }

    #[test]
    fn test_advance_only_moves_forward() {
        let dir = TempDir::new().unwrap();
        let store = CheckpointStore::new(dir.path().join("checkpoint.json"), "alice/notes");

        assert!(store.advance("c2", date("2024-05-02T10:00:00+00:00")).unwrap());
        assert!(!store.advance("c1", date("2024-05-01T10:00:00+00:00")).unwrap());
        assert!(!store.advance("c2", date("2024-05-02T10:00:00+00:00")).unwrap());

        let checkpoint = store.load().unwrap();
        assert_eq!(checkpoint.last_commit_id.as_deref(), Some("c2"));

        assert!(store.advance("c3", date("2024-05-03T10:00:00+02:00")).unwrap());
        assert_eq!(store.load().unwrap().last_commit_id.as_deref(), Some("c3"));
    }

    #[test]
    fn test_projects_are_namespaced() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("checkpoint.json");
        let notes = CheckpointStore::new(&path, "alice/notes");
        let wiki = CheckpointStore::new(&path, "alice/wiki");

        notes.advance("n1", date("2024-05-02T10:00:00+00:00")).unwrap();
        wiki.advance("w1", date("2024-05-01T10:00:00+00:00")).unwrap();

        assert_eq!(notes.load().unwrap().last_commit_id.as_deref(), Some("n1"));
        assert_eq!(wiki.load().unwrap().last_commit_id.as_deref(), Some("w1"));

        wiki.reset().unwrap();
        assert!(wiki.load().unwrap().last_commit_id.is_none());
        assert!(notes.load().unwrap().last_commit_id.is_some());
    }

    #[test]
    fn test_mark_pushed_keeps_commit() {
        let dir = TempDir::new().unwrap();
        let store = CheckpointStore::new(dir.path().join("checkpoint.json"), "p/r");
        store.advance("c1", date("2024-05-02T10:00:00+00:00")).unwrap();
        store.mark_pushed(Utc::now()).unwrap();

        let checkpoint = store.load().unwrap();
        assert_eq!(checkpoint.last_commit_id.as_deref(), Some("c1"));
        assert!(checkpoint.last_pushed.is_some());
    }
}
