//! Record command handler

use anyhow::{Context, Result};

use crate::journal::{ChangeAction, ChangeLog};
use crate::settings::SyncSettings;
use crate::sync::{StatePaths, SyncEngine};

/// Handle record command
///
/// Without auto mode only the change log is touched, so no token is needed.
pub fn handle_record(
    settings: &SyncSettings,
    paths: &StatePaths,
    action: ChangeAction,
    path: &str,
    old_path: Option<&str>,
) -> Result<bool> {
    if action.is_boundary() {
        anyhow::bail!("{action} is written by push and pull, it cannot be recorded");
    }
    if action == ChangeAction::Rename && old_path.is_none() {
        anyhow::bail!("RENAME needs the previous path (--from)");
    }

    if settings.auto {
        let engine = SyncEngine::from_settings(settings)?;
        let recorded = engine.record_event(action, path, old_path)?;
        engine.wait_idle();
        return Ok(recorded);
    }

    let change_log = ChangeLog::open(&paths.change_log, settings.change_log_limit)
        .context("Failed to open change log")?;
    change_log.add_action(action, path, old_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_record_without_auto_appends_to_change_log() {
        let dir = TempDir::new().unwrap();
        let paths = StatePaths::in_dir(dir.path());
        let settings = SyncSettings::default();

        assert!(handle_record(&settings, &paths, ChangeAction::Modify, "a.md", None).unwrap());
        assert!(!handle_record(&settings, &paths, ChangeAction::Modify, "a.md", None).unwrap());
        assert!(handle_record(&settings, &paths, ChangeAction::Rename, "b.md", Some("a.md")).unwrap());

        let log = ChangeLog::open(&paths.change_log, 100).unwrap();
        let window = log.window().unwrap();
        assert_eq!(window.len(), 2);
        assert_eq!(window[1].old_path.as_deref(), Some("a.md"));
    }

    #[test]
    fn test_record_rejects_markers_and_bare_renames() {
        let dir = TempDir::new().unwrap();
        let paths = StatePaths::in_dir(dir.path());
        let settings = SyncSettings::default();

        assert!(handle_record(&settings, &paths, ChangeAction::LocalChangesPushed, "x", None).is_err());
        assert!(handle_record(&settings, &paths, ChangeAction::Rename, "b.md", None).is_err());
    }
}
