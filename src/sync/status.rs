use anyhow::Result;
use colored::Colorize;

use crate::checkpoint::{Checkpoint, CheckpointStore};
use crate::journal::{message_of, ChangeLog, SyncLog, FAIL_PREFIX};
use crate::reconcile::{reconcile, NetOp};
use crate::settings::SyncSettings;

use super::state::StatePaths;
use super::SyncEngine;

/// Snapshot of local sync state; reads nothing from the remote
#[derive(Debug, Clone)]
pub struct SyncStatus {
    pub project: String,
    pub branch: String,
    pub checkpoint: Checkpoint,
    /// Raw events since the last boundary marker
    pub pending_events: usize,
    /// What the next push would send
    pub pending_ops: Vec<NetOp>,
    /// Newest sync log entries, oldest first
    pub recent_sync: Vec<String>,
}

impl SyncStatus {
    fn collect(
        project: String,
        branch: String,
        change_log: &ChangeLog,
        sync_log: &SyncLog,
        checkpoint: &CheckpointStore,
        recent: usize,
    ) -> Result<Self> {
        let events = change_log.window()?;
        Ok(Self {
            project,
            branch,
            checkpoint: checkpoint.load()?,
            pending_events: events.len(),
            pending_ops: reconcile(&events),
            recent_sync: sync_log.tail(recent)?,
        })
    }

    /// Status straight from the state files; needs no token
    pub fn load(settings: &SyncSettings, paths: &StatePaths, recent: usize) -> Result<Self> {
        Self::collect(
            settings.project_key(),
            settings.branch.clone(),
            &ChangeLog::open(&paths.change_log, settings.change_log_limit)?,
            &SyncLog::open(&paths.sync_log, settings.sync_log_limit)?,
            &CheckpointStore::new(&paths.checkpoint, settings.project_key()),
            recent,
        )
    }
}

impl SyncEngine {
    pub fn status(&self, recent: usize) -> Result<SyncStatus> {
        let options = self.client.options();
        SyncStatus::collect(
            format!("{}/{}", options.project, options.repository),
            options.branch.clone(),
            &self.change_log,
            &self.sync_log,
            &self.checkpoint,
            recent,
        )
    }
}

/// Show sync status
pub fn print_status(status: &SyncStatus, show_ops: bool) {
    println!("{}", "=== GitLab Vault Sync Status ===".bold().cyan());
    println!();

    println!("{}", "Remote:".bold());
    println!("  Project: {}", status.project.cyan());
    println!("  Branch: {}", status.branch.cyan());
    match (&status.checkpoint.last_commit_id, &status.checkpoint.last_commit_date) {
        (Some(id), Some(date)) => println!("  Last commit: {} ({})", id.yellow(), date),
        _ => println!("  Last commit: {}", "never synced".yellow()),
    }
    if let Some(pushed) = status.checkpoint.last_pushed {
        println!("  Last push: {}", pushed.format("%Y-%m-%d %H:%M:%S UTC"));
    }

    println!();
    println!("{}", "Local changes:".bold());
    println!(
        "  {} events, {} operations pending",
        status.pending_events.to_string().cyan(),
        status.pending_ops.len().to_string().cyan()
    );
    if show_ops {
        for op in &status.pending_ops {
            match &op.old_path {
                Some(old) => println!("  {:<8} {} <- {}", op.action.as_str(), op.path, old),
                None => println!("  {:<8} {}", op.action.as_str(), op.path),
            }
        }
    }

    if !status.recent_sync.is_empty() {
        println!();
        println!("{}", "Recent sync activity:".bold());
        for line in &status.recent_sync {
            let message = message_of(line);
            if message.starts_with(FAIL_PREFIX) {
                println!("  {}", message.red());
            } else {
                println!("  {}", message.green());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use crate::vault::Vault;
    use crate::journal::ChangeAction;

    #[test]
    fn test_status_reports_pending_and_recent() {
        let h = harness();
        h.vault.write("a.md", b"a").unwrap();
        h.engine.record_event(ChangeAction::Create, "a.md", None).unwrap();
        h.engine.record_event(ChangeAction::Modify, "a.md", None).unwrap();
        h.engine.record_event(ChangeAction::Delete, "b.md", None).unwrap();

        let before = h.engine.status(5).unwrap();
        assert_eq!(before.project, "alice/notes");
        assert_eq!(before.branch, "master");
        assert_eq!(before.pending_events, 3);
        assert_eq!(before.pending_ops.len(), 2);
        assert!(before.checkpoint.last_commit_id.is_none());

        h.engine.push_changes().unwrap();
        h.engine.wait_idle();

        let after = h.engine.status(5).unwrap();
        assert_eq!(after.pending_events, 0);
        assert_eq!(after.recent_sync.len(), 2);
        assert!(after.checkpoint.last_commit_id.is_some());
        super::print_status(&after, true);
    }

    #[test]
    fn test_load_matches_engine_view() {
        let h = harness();
        h.engine.record_event(ChangeAction::Delete, "a.md", None).unwrap();

        let paths = super::StatePaths::in_dir(&h.dir.path().join("state"));
        let loaded = super::SyncStatus::load(&settings(), &paths, 5).unwrap();
        assert_eq!(loaded.project, "alice/notes");
        assert_eq!(loaded.pending_events, 1);
        assert_eq!(loaded.pending_ops, h.engine.status(5).unwrap().pending_ops);
    }
}
