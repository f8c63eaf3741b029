use anyhow::Result;
use chrono::Utc;
use std::sync::Arc;

use crate::journal::ChangeAction;
use crate::reconcile::{reconcile, NetOp};
use crate::remote::{CommitOptions, GitLabClient};

use super::transfer::record_outcome;
use super::SyncEngine;

impl SyncEngine {
    /// Send every change recorded since the last boundary marker
    ///
    /// The window is reconciled into one operation per path, each queued as
    /// its own task. The boundary marker is written right away so events
    /// recorded while the tasks run open the next window; a window that
    /// cancels out still gets its "0 changes" marker. Returns the number of
    /// operations queued.
    pub fn push_changes(&self) -> Result<usize> {
        let events = self.change_log.window()?;
        let ops = reconcile(&events);
        log::info!(
            "Reconciled {} events into {} operations",
            events.len(),
            ops.len()
        );

        let count = ops.len();
        if count == 0 {
            self.notifier.notify("Nothing to send");
        }
        for op in ops {
            self.schedule(op)?;
        }

        if self.options.retain_history {
            self.change_log.mark_pushed(count)?;
        } else {
            self.change_log.clear()?;
        }

        let client = Arc::clone(&self.client);
        let checkpoint = Arc::clone(&self.checkpoint);
        self.queue.append(move || {
            client.save_last_commit(&checkpoint)?;
            checkpoint.mark_pushed(Utc::now())
        })?;

        Ok(count)
    }

    /// Queue the remote call for one net operation
    ///
    /// The task records its outcome in the sync log and never fails itself.
    pub(crate) fn schedule(&self, op: NetOp) -> Result<()> {
        let client = Arc::clone(&self.client);
        let sync_log = Arc::clone(&self.sync_log);
        let notifier = Arc::clone(&self.notifier);

        self.queue.append(move || {
            let Some(description) = describe(&op) else {
                return Ok(());
            };
            record_outcome(&sync_log, notifier.as_ref(), &description, run(&client, &op))
        })
    }
}

/// Sync log text for an operation; `None` for markers
fn describe(op: &NetOp) -> Option<String> {
    let path = &op.path;
    let text = match (op.action, op.old_path.as_deref()) {
        (ChangeAction::Create | ChangeAction::Rename, Some(old)) => {
            format!("renaming file \"{old}\" -> \"{path}\"")
        }
        (ChangeAction::Create, None) => format!("creating file \"{path}\""),
        (ChangeAction::Modify, _) => format!("modifying file \"{path}\""),
        (ChangeAction::Delete, _) => format!("deleting file \"{path}\""),
        (ChangeAction::Rename, None) => format!("creating file \"{path}\""),
        (ChangeAction::LocalChangesPushed | ChangeAction::LocalChangesPulled, _) => return None,
    };
    Some(text)
}

/// Perform the remote side of `op`
///
/// A create that still carries its source path (a rename followed by edits)
/// runs as a rename: the old remote file is removed once the new one exists.
fn run(client: &GitLabClient, op: &NetOp) -> Result<()> {
    let time = op.timestamp.to_rfc3339();
    let path = &op.path;

    match (op.action, op.old_path.as_deref()) {
        (ChangeAction::Create | ChangeAction::Rename, Some(old)) => {
            client.create(
                path,
                &CommitOptions::message(format!(
                    "renaming[c] file \"{old}\" -> \"{path}\" - {time}"
                )),
                true,
            )?;
            client.delete(
                old,
                &CommitOptions::message(format!(
                    "renaming[d] file \"{old}\" -> \"{path}\" - {time}"
                )),
            )
        }
        (ChangeAction::Create | ChangeAction::Rename, None) => client.create(
            path,
            &CommitOptions::message(format!("creating file \"{path}\" - {time}")),
            true,
        ),
        (ChangeAction::Modify, _) => client.modify(
            path,
            &CommitOptions::message(format!("modifying file \"{path}\" - {time}")),
            true,
        ),
        (ChangeAction::Delete, _) => client.delete(
            path,
            &CommitOptions::message(format!("deleting file \"{path}\" - {time}")),
        ),
        (ChangeAction::LocalChangesPushed | ChangeAction::LocalChangesPulled, _) => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use crate::vault::Vault;
    use super::*;
    use crate::journal::message_of;
    use crate::remote::Method;
    use crate::settings::SyncSettings;

    #[test]
    fn test_push_collapses_create_and_modifies() {
        let h = harness();
        h.vault.write("notes/a.md", b"v1").unwrap();
        h.engine.record_event(ChangeAction::Create, "notes/a.md", None).unwrap();
        h.vault.write("notes/a.md", b"v2").unwrap();
        h.engine.record_event(ChangeAction::Modify, "notes/a.md", None).unwrap();
        h.vault.write("notes/a.md", b"v3").unwrap();
        h.engine.record_event(ChangeAction::Modify, "notes/a.md", None).unwrap();

        assert_eq!(h.engine.push_changes().unwrap(), 1);
        h.engine.wait_idle();

        let writes: Vec<_> = h
            .transport
            .requests()
            .into_iter()
            .filter(|r| r.route.starts_with("files/"))
            .collect();
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].method, Method::Post);
        assert_eq!(writes[0].content().unwrap(), b"v3");
        let message = writes[0].body.as_ref().unwrap()["commit_message"]
            .as_str()
            .unwrap()
            .to_string();
        assert!(message.starts_with("creating file \"notes/a.md\" - "));

        let entries = h.engine.sync_log().tail(10).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(message_of(&entries[0]), "creating file \"notes/a.md\"");

        let newest = h.transport.commits().last().unwrap().id.clone();
        let checkpoint = h.engine.checkpoint().load().unwrap();
        assert_eq!(checkpoint.last_commit_id, Some(newest));
        assert!(checkpoint.last_pushed.is_some());
    }

    #[test]
    fn test_push_appends_marker_and_empties_window() {
        let h = harness();
        h.vault.write("a.md", b"a").unwrap();
        h.vault.write("b.md", b"b").unwrap();
        h.engine.record_event(ChangeAction::Create, "a.md", None).unwrap();
        h.engine.record_event(ChangeAction::Create, "b.md", None).unwrap();

        assert_eq!(h.engine.push_changes().unwrap(), 2);
        h.engine.wait_idle();

        assert!(h.engine.change_log().window().unwrap().is_empty());
        let last = h.engine.change_log().recent(1).unwrap();
        assert_eq!(last[0].action, ChangeAction::LocalChangesPushed);
        assert_eq!(last[0].path, "2 changes");
        assert_eq!(h.engine.push_changes().unwrap(), 0);
    }

    #[test]
    fn test_cancelled_window_is_still_closed() {
        let h = harness();
        h.vault.write("a.md", b"a").unwrap();
        h.engine.record_event(ChangeAction::Create, "a.md", None).unwrap();
        h.engine.record_event(ChangeAction::Delete, "a.md", None).unwrap();

        assert_eq!(h.engine.push_changes().unwrap(), 0);
        h.engine.wait_idle();

        assert!(h.engine.change_log().window().unwrap().is_empty());
        let last = h.engine.change_log().recent(1).unwrap();
        assert_eq!(last[0].action, ChangeAction::LocalChangesPushed);
        assert_eq!(last[0].path, "0 changes");
        assert!(h.engine.checkpoint().load().unwrap().last_pushed.is_some());
        assert!(h.notifier.messages().contains(&"Nothing to send".to_string()));
        assert!(!h.transport.requests().iter().any(|r| r.route.starts_with("files/")));
    }

    #[test]
    fn test_push_without_history_clears_log() {
        let h = harness_with(SyncSettings {
            retain_history: false,
            ..settings()
        });
        h.vault.write("a.md", b"a").unwrap();
        h.engine.record_event(ChangeAction::Create, "a.md", None).unwrap();

        h.engine.push_changes().unwrap();
        h.engine.wait_idle();
        assert!(h.engine.change_log().store().is_empty());
    }

    #[test]
    fn test_failed_operation_is_logged_and_queue_continues() {
        let h = harness();
        h.vault.write("ok.md", b"ok").unwrap();
        h.engine.record_event(ChangeAction::Delete, "ghost.md", None).unwrap();
        h.engine.record_event(ChangeAction::Create, "ok.md", None).unwrap();

        h.engine.push_changes().unwrap();
        h.engine.wait_idle();

        let entries: Vec<String> = h
            .engine
            .sync_log()
            .tail(10)
            .unwrap()
            .iter()
            .map(|l| message_of(l).to_string())
            .collect();
        assert_eq!(
            entries,
            vec![
                "FAIL: deleting file \"ghost.md\"".to_string(),
                "creating file \"ok.md\"".to_string(),
            ]
        );
        assert_eq!(h.transport.file("ok.md").unwrap(), b"ok");
        assert!(h
            .notifier
            .messages()
            .contains(&"Failed deleting file \"ghost.md\"".to_string()));
    }

    #[test]
    fn test_rename_creates_then_deletes() {
        let h = harness();
        h.transport.seed_file("old.md", b"body");
        h.vault.write("new.md", b"body").unwrap();
        h.engine
            .record_event(ChangeAction::Rename, "new.md", Some("old.md"))
            .unwrap();

        h.engine.push_changes().unwrap();
        h.engine.wait_idle();

        let files: Vec<_> = h
            .transport
            .requests()
            .into_iter()
            .filter(|r| r.route.starts_with("files/"))
            .map(|r| (r.method, r.route))
            .collect();
        assert_eq!(
            files,
            vec![
                (Method::Post, "files/new.md".to_string()),
                (Method::Delete, "files/old.md".to_string()),
            ]
        );
        assert_eq!(h.transport.paths(), vec!["new.md".to_string()]);
    }

    #[test]
    fn test_rename_skips_delete_when_create_fails() {
        let h = harness();
        h.transport.seed_file("old.md", b"body");
        h.engine
            .record_event(ChangeAction::Rename, "new.md", Some("old.md"))
            .unwrap();

        h.engine.push_changes().unwrap();
        h.engine.wait_idle();

        assert!(h.transport.file("old.md").is_some());
        assert!(!h
            .transport
            .requests()
            .iter()
            .any(|r| r.method == Method::Delete));
        let last = h.engine.sync_log().tail(1).unwrap();
        assert_eq!(
            message_of(&last[0]),
            "FAIL: renaming file \"old.md\" -> \"new.md\""
        );
    }

    #[test]
    fn test_edited_rename_still_removes_source() {
        let h = harness();
        h.transport.seed_file("a.md", b"old");
        h.vault.write("b.md", b"edited").unwrap();
        h.engine.record_event(ChangeAction::Rename, "b.md", Some("a.md")).unwrap();
        h.engine.record_event(ChangeAction::Modify, "b.md", None).unwrap();

        h.engine.push_changes().unwrap();
        h.engine.wait_idle();

        assert_eq!(h.transport.paths(), vec!["b.md".to_string()]);
        assert_eq!(h.transport.file("b.md").unwrap(), b"edited");
    }
}
