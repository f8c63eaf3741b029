use anyhow::Result;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::checkpoint::Checkpoint;
use crate::remote::{newest_commit, DiffKind, FileDiff, GitLabClient};
use crate::vault::Vault;

use super::SyncEngine;

impl SyncEngine {
    /// Replay remote commits made since the checkpoint onto the vault
    ///
    /// Commits are listed on the caller, then applied oldest first on the
    /// queue: one task per commit fetches its diff and queues one task per
    /// changed file. The checkpoint and the PULLED marker are written by a
    /// task that runs after every apply. Returns the number of new commits.
    pub fn fetch_changes(&self) -> Result<usize> {
        self.fetch_since(&self.checkpoint.load()?)
    }

    /// Push the pending window, then pull what other devices committed
    ///
    /// The pull runs after the push has drained and is measured from the
    /// checkpoint held before the push, so remote commits older than our
    /// own are still applied. Returns the operations pushed and commits
    /// pulled.
    pub fn push_then_fetch(&self) -> Result<(usize, usize)> {
        let before = self.checkpoint.load()?;
        let pushed = self.push_changes()?;
        self.wait_idle();
        let pulled = self.fetch_since(&before)?;
        Ok((pushed, pulled))
    }

    /// [`SyncEngine::fetch_changes`] measured from an earlier checkpoint
    pub(super) fn fetch_since(&self, checkpoint: &Checkpoint) -> Result<usize> {
        let mut commits = self.client.get_commits(checkpoint)?;
        if let Some(seen) = &checkpoint.last_commit_id {
            commits.retain(|c| &c.id != seen);
        }

        if commits.is_empty() {
            let client = Arc::clone(&self.client);
            let store = Arc::clone(&self.checkpoint);
            self.queue.append(move || {
                client.save_last_commit(&store)?;
                Ok(())
            })?;
            self.notifier.notify("Everything is up to date");
            return Ok(0);
        }

        commits.sort_by(|a, b| a.committed_date.cmp(&b.committed_date));
        log::info!("Pulling {} remote commits", commits.len());

        let newest = newest_commit(&commits).cloned();
        let changed = Arc::new(AtomicUsize::new(0));
        let count = commits.len();

        for commit in commits {
            let client = Arc::clone(&self.client);
            let vault = Arc::clone(&self.vault);
            let queue = Arc::clone(&self.queue);
            let changed = Arc::clone(&changed);

            self.queue.append(move || {
                let diffs = client.get_diffs(&commit.id)?;
                log::debug!("Commit {} changed {} files", commit.short_id, diffs.len());
                changed.fetch_add(diffs.len(), Ordering::SeqCst);

                for diff in diffs {
                    let client = Arc::clone(&client);
                    let vault = Arc::clone(&vault);
                    queue.append(move || {
                        if let Err(e) = apply_diff(&client, vault.as_ref(), &diff) {
                            log::warn!("Could not apply {}: {e:#}", diff.new_path);
                        }
                        Ok(())
                    })?;
                }
                Ok(())
            })?;
        }

        // Runs after every per-commit task, so the follow-up it queues lands
        // behind every apply task those commits queued.
        let queue = Arc::clone(&self.queue);
        let store = Arc::clone(&self.checkpoint);
        let change_log = Arc::clone(&self.change_log);
        let notifier = Arc::clone(&self.notifier);
        self.queue.append(move || {
            queue.append(move || {
                if let Some(commit) = &newest {
                    store.advance(&commit.id, commit.committed_date)?;
                }
                let total = changed.load(Ordering::SeqCst);
                change_log.mark_pulled(total)?;
                notifier.notify(&format!("Pulled {total} changes"));
                Ok(())
            })
        })?;

        Ok(count)
    }
}

/// Bring one changed file of a remote commit into the vault
fn apply_diff(client: &GitLabClient, vault: &dyn Vault, diff: &FileDiff) -> Result<()> {
    match diff.kind() {
        DiffKind::Write => {
            if !client.save_local_file(&diff.new_path, None, false)? {
                log::debug!("{} no longer exists remotely", diff.new_path);
            }
            Ok(())
        }
        DiffKind::Rename => vault.rename(&diff.old_path, &diff.new_path),
        DiffKind::Delete => vault.remove(&diff.new_path),
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use crate::vault::Vault;
    use crate::checkpoint::Checkpoint;
    use crate::journal::ChangeAction;
    use crate::remote::FileDiff;
    use chrono::{DateTime, Duration, FixedOffset};

    fn at(minutes: i64) -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339("2024-03-01T12:00:00+00:00").unwrap() + Duration::minutes(minutes)
    }

    fn diff(path: &str, new_file: bool, deleted_file: bool) -> FileDiff {
        FileDiff {
            old_path: path.into(),
            new_path: path.into(),
            new_file,
            renamed_file: false,
            deleted_file,
        }
    }

    fn seed_checkpoint(h: &Harness, id: &str, date: DateTime<FixedOffset>) {
        h.transport.push_commit(id, date, vec![]);
        h.engine.checkpoint().advance(id, date).unwrap();
    }

    #[test]
    fn test_push_then_fetch_keeps_local_events() {
        let h = harness();
        seed_checkpoint(&h, "c0", at(0));
        h.vault.write("local.md", b"mine").unwrap();
        h.engine.record_event(ChangeAction::Create, "local.md", None).unwrap();
        h.transport.seed_file("remote.md", b"theirs");
        h.transport.push_commit("c1", at(1), vec![diff("remote.md", true, false)]);

        let (pushed, pulled) = h.engine.push_then_fetch().unwrap();
        h.engine.wait_idle();

        assert_eq!(pushed, 1);
        assert_eq!(pulled, 2);
        assert_eq!(h.transport.file("local.md").unwrap(), b"mine");
        assert_eq!(h.vault.read("remote.md").unwrap(), b"theirs");
        assert!(h.engine.change_log().window().unwrap().is_empty());

        let newest = h.transport.commits().last().unwrap().id.clone();
        let checkpoint = h.engine.checkpoint().load().unwrap();
        assert_eq!(checkpoint.last_commit_id, Some(newest));
    }

    #[test]
    fn test_add_then_delete_leaves_file_absent() {
        let h = harness();
        seed_checkpoint(&h, "c0", at(0));
        h.transport.push_commit("c1", at(1), vec![diff("x.md", true, false)]);
        h.transport.push_commit("c2", at(2), vec![diff("x.md", false, true)]);

        assert_eq!(h.engine.fetch_changes().unwrap(), 2);
        h.engine.wait_idle();

        assert!(!h.vault.exists("x.md"));
        let checkpoint = h.engine.checkpoint().load().unwrap();
        assert_eq!(checkpoint.last_commit_id.as_deref(), Some("c2"));

        let last = h.engine.change_log().recent(1).unwrap();
        assert_eq!(last[0].action, ChangeAction::LocalChangesPulled);
        assert_eq!(last[0].path, "2 changes");
    }

    #[test]
    fn test_writes_renames_and_deletes_in_commit_order() {
        let h = harness();
        seed_checkpoint(&h, "c0", at(0));
        h.vault.write("gone.md", b"bye").unwrap();
        h.transport.seed_file("notes/new.md", b"fresh");
        h.transport.push_commit("c1", at(1), vec![diff("notes/new.md", true, false)]);
        h.transport.push_commit(
            "c2",
            at(2),
            vec![
                FileDiff {
                    old_path: "notes/new.md".into(),
                    new_path: "notes/moved.md".into(),
                    new_file: false,
                    renamed_file: true,
                    deleted_file: false,
                },
                diff("gone.md", false, true),
            ],
        );

        h.engine.fetch_changes().unwrap();
        h.engine.wait_idle();

        assert!(!h.vault.exists("notes/new.md"));
        assert_eq!(h.vault.read("notes/moved.md").unwrap(), b"fresh");
        assert!(!h.vault.exists("gone.md"));
        assert_eq!(h.engine.change_log().recent(1).unwrap()[0].path, "3 changes");
    }

    #[test]
    fn test_up_to_date_refreshes_checkpoint() {
        let h = harness();
        seed_checkpoint(&h, "c0", at(0));

        assert_eq!(h.engine.fetch_changes().unwrap(), 0);
        h.engine.wait_idle();

        assert!(h
            .notifier
            .messages()
            .contains(&"Everything is up to date".to_string()));
        assert_eq!(
            h.engine.checkpoint().load().unwrap().last_commit_id.as_deref(),
            Some("c0")
        );
        assert!(h.engine.change_log().store().is_empty());
    }

    #[test]
    fn test_commits_applied_oldest_first_whatever_the_listing_order() {
        let h = harness();
        seed_checkpoint(&h, "c0", at(0));
        h.transport.seed_file("x.md", b"final");
        // Same date order as ids, but listed newest first by the server
        h.transport.push_commit("c1", at(1), vec![diff("x.md", true, false)]);
        h.transport.push_commit("c2", at(2), vec![diff("x.md", false, false)]);

        h.engine.fetch_changes().unwrap();
        h.engine.wait_idle();

        let diff_routes: Vec<_> = h
            .transport
            .requests()
            .into_iter()
            .filter(|r| r.route.ends_with("/diff"))
            .map(|r| r.route)
            .collect();
        assert_eq!(diff_routes, vec!["commits/c1/diff", "commits/c2/diff"]);
        assert_eq!(h.vault.read("x.md").unwrap(), b"final");
    }

    #[test]
    fn test_failed_apply_does_not_stop_the_pull() {
        let h = harness();
        seed_checkpoint(&h, "c0", at(0));
        h.transport.seed_file("b.md", b"b");
        h.transport.push_commit(
            "c1",
            at(1),
            vec![diff("missing.md", false, true), diff("b.md", true, false)],
        );

        h.engine.fetch_changes().unwrap();
        h.engine.wait_idle();

        assert_eq!(h.vault.read("b.md").unwrap(), b"b");
        assert_eq!(
            h.engine.checkpoint().load().unwrap(),
            Checkpoint {
                last_commit_id: Some("c1".into()),
                last_commit_date: Some(at(1)),
                last_pushed: None,
            }
        );
    }
}
