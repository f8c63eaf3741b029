use anyhow::Result;
use std::path::PathBuf;

use super::event::ChangeEvent;
use super::store::LineStore;
use super::types::{ChangeAction, BOUNDARY_PHRASE};

/// Share of the limit kept when the change log rotates
const KEEP_RATIO: f64 = 0.3;

/// How many trailing records are checked for a pending MODIFY of the same path
const REPEAT_WINDOW: isize = 200;

/// Durable record of local file-system events
#[derive(Debug)]
pub struct ChangeLog {
    store: LineStore,
}

impl ChangeLog {
    pub fn open(path: impl Into<PathBuf>, limit: usize) -> Result<Self> {
        Ok(Self {
            store: LineStore::open(path, limit, KEEP_RATIO)?,
        })
    }

    pub fn store(&self) -> &LineStore {
        &self.store
    }

    /// Record an event; returns `false` when the append was suppressed
    ///
    /// A MODIFY is dropped if a MODIFY for the same path already sits in the
    /// last 200 records: the next reconciliation already covers it.
    pub fn add_action(
        &self,
        action: ChangeAction,
        path: &str,
        old_path: Option<&str>,
    ) -> Result<bool> {
        if action == ChangeAction::Modify && self.has_recent_modify(path)? {
            log::trace!("Suppressed repeated MODIFY for {path}");
            return Ok(false);
        }

        let event = ChangeEvent::now(action, path, old_path.map(String::from));
        self.store.append(&event.to_line())?;
        Ok(true)
    }

    fn has_recent_modify(&self, path: &str) -> Result<bool> {
        let recent = self.store.lines_by_index(-REPEAT_WINDOW, None)?;
        Ok(recent
            .iter()
            .filter_map(|line| ChangeEvent::parse(line).ok())
            .any(|e| e.action == ChangeAction::Modify && e.path == path))
    }

    /// Append the boundary written at the end of a push cycle
    pub fn mark_pushed(&self, changes: usize) -> Result<()> {
        self.add_action(
            ChangeAction::LocalChangesPushed,
            &format!("{changes} changes"),
            None,
        )
        .map(|_| ())
    }

    /// Append the boundary written at the end of a pull cycle
    pub fn mark_pulled(&self, changes: usize) -> Result<()> {
        self.add_action(
            ChangeAction::LocalChangesPulled,
            &format!("{changes} changes"),
            None,
        )
        .map(|_| ())
    }

    /// Events recorded since the most recent boundary marker, oldest first
    pub fn window(&self) -> Result<Vec<ChangeEvent>> {
        let lines = self.store.lines_to_phrase(BOUNDARY_PHRASE, 1, false, false)?;
        Ok(lines
            .iter()
            .filter_map(|line| match ChangeEvent::parse(line) {
                Ok(event) if !event.action.is_boundary() => Some(event),
                Ok(_) => None,
                Err(e) => {
                    log::warn!("Skipping unreadable change record: {e:#}");
                    None
                }
            })
            .collect())
    }

    /// The newest `count` records, oldest first, for display
    pub fn recent(&self, count: usize) -> Result<Vec<ChangeEvent>> {
        let lines = self.store.lines_by_index(-(count as isize), None)?;
        Ok(lines
            .iter()
            .filter_map(|line| ChangeEvent::parse(line).ok())
            .collect())
    }

    /// Drop every record
    pub fn clear(&self) -> Result<()> {
        self.store.clear()
    }
}
