use anyhow::Result;
use std::sync::Arc;

use crate::journal::SyncLog;
use crate::notify::Notifier;
use crate::remote::{CommitOptions, GitLabClient, TreeEntry};
use crate::vault::Vault;

use super::SyncEngine;

/// Editor configuration folder optionally left out of downloads
pub const VAULT_CONFIG_DIR: &str = ".obsidian";

/// Folders never uploaded by a full send
const SKIPPED_DIRS: [&str; 2] = [".git", "node_modules"];

fn is_skipped(path: &str) -> bool {
    path.split('/').any(|segment| SKIPPED_DIRS.contains(&segment))
}

fn in_config_dir(path: &str) -> bool {
    path == VAULT_CONFIG_DIR || path.starts_with(&format!("{VAULT_CONFIG_DIR}/"))
}

/// Every file below `dir`, depth first; returns the number of folders visited
fn collect_files(vault: &dyn Vault, dir: &str, files: &mut Vec<String>) -> Result<usize> {
    let listing = vault.list(dir)?;
    files.extend(listing.files);

    let mut folders = 0;
    for folder in listing.folders {
        if is_skipped(&folder) {
            log::debug!("Skipping {folder}");
            continue;
        }
        folders += 1 + collect_files(vault, &folder, files)?;
    }
    Ok(folders)
}

/// Write the files of a tree listing into the vault
///
/// Directories are created first. A file the remote cannot return, or the
/// vault cannot store, is logged and skipped; the rest are still written.
fn write_tree(
    client: &GitLabClient,
    vault: &dyn Vault,
    tree: &[TreeEntry],
    skip_config_dir: bool,
) -> Result<usize> {
    let wanted = |entry: &&TreeEntry| !(skip_config_dir && in_config_dir(&entry.path));

    for dir in tree.iter().filter(|e| e.is_dir).filter(wanted) {
        vault.mkdir(&dir.path)?;
    }

    let mut written = 0;
    for file in tree.iter().filter(|e| !e.is_dir).filter(wanted) {
        let Some(remote) = client.read(&file.path, None) else {
            log::warn!("Skipping unreadable remote file {}", file.path);
            continue;
        };
        match remote.bytes().and_then(|bytes| vault.write(&file.path, &bytes)) {
            Ok(()) => written += 1,
            Err(e) => log::warn!("Skipping {}: {e:#}", file.path),
        }
    }
    Ok(written)
}

/// Log a finished remote operation to the sync log
pub(super) fn record_outcome(
    sync_log: &SyncLog,
    notifier: &dyn Notifier,
    description: &str,
    outcome: Result<()>,
) -> Result<()> {
    match outcome {
        Ok(()) => sync_log.log(description),
        Err(e) => {
            log::warn!("Failed {description}: {e:#}");
            notifier.notify(&format!("Failed {description}"));
            sync_log.fail(description)
        }
    }
}

impl SyncEngine {
    /// Upload every file in the vault
    ///
    /// Each file is created without fallback, in its own queued task. Returns
    /// the number of files and folders found.
    pub fn push_all(&self) -> Result<(usize, usize)> {
        let mut files = Vec::new();
        let folders = collect_files(self.vault.as_ref(), "", &mut files)?;
        let file_count = files.len();
        log::info!("Sending {file_count} files in {folders} folders");

        for path in files {
            let client = Arc::clone(&self.client);
            let sync_log = Arc::clone(&self.sync_log);
            let notifier = Arc::clone(&self.notifier);
            self.queue.append(move || {
                let outcome = client.create(&path, &CommitOptions::default(), false);
                record_outcome(
                    &sync_log,
                    notifier.as_ref(),
                    &format!("creating file \"{path}\""),
                    outcome,
                )
            })?;
        }

        let client = Arc::clone(&self.client);
        let store = Arc::clone(&self.checkpoint);
        let notifier = Arc::clone(&self.notifier);
        self.queue.append(move || {
            notifier.notify(&format!("Done for {file_count} files in {folders} folders"));
            client.save_last_commit(&store)?;
            Ok(())
        })?;

        Ok((file_count, folders))
    }

    /// Copy the remote tree below `path` ("" for everything) into the vault
    ///
    /// With `skip_config_dir` the editor configuration folder is left out.
    pub fn download_repository(&self, path: &str, skip_config_dir: bool) -> Result<()> {
        let client = Arc::clone(&self.client);
        let vault = Arc::clone(&self.vault);
        let store = Arc::clone(&self.checkpoint);
        let notifier = Arc::clone(&self.notifier);
        let path = path.to_string();

        self.queue.append(move || {
            let tree = client.read_repo_tree(&path, true)?;
            let written = write_tree(&client, vault.as_ref(), &tree, skip_config_dir)?;
            notifier.notify(&format!("Done: {written} files"));
            client.save_last_commit(&store)?;
            Ok(())
        })
    }

    /// Upload a file, or every file below a folder
    pub fn send_path(&self, path: &str) -> Result<()> {
        let client = Arc::clone(&self.client);
        let vault = Arc::clone(&self.vault);
        let sync_log = Arc::clone(&self.sync_log);
        let notifier = Arc::clone(&self.notifier);
        let path = path.to_string();

        self.queue.append(move || {
            let files = if vault.is_dir(&path) {
                let mut files = Vec::new();
                collect_files(vault.as_ref(), &path, &mut files)?;
                files
            } else {
                vec![path]
            };
            for file in files {
                let outcome = client.create(&file, &CommitOptions::default(), true);
                let description = format!("creating file \"{file}\"");
                if let Err(e) = record_outcome(&sync_log, notifier.as_ref(), &description, outcome) {
                    log::warn!("Could not log {description}: {e:#}");
                }
            }
            notifier.notify("Done");
            Ok(())
        })
    }

    /// Overwrite a local file, or a local folder, with the remote version
    pub fn load_path(&self, path: &str) -> Result<()> {
        let client = Arc::clone(&self.client);
        let vault = Arc::clone(&self.vault);
        let notifier = Arc::clone(&self.notifier);
        let path = path.to_string();

        self.queue.append(move || {
            if vault.is_dir(&path) {
                let tree = client.read_repo_tree(&path, false)?;
                write_tree(&client, vault.as_ref(), &tree, false)?;
            } else if !client.save_local_file(&path, None, false)? {
                log::warn!("{path} does not exist remotely");
                return Ok(());
            }
            notifier.notify("Done");
            Ok(())
        })
    }

    /// Delete a file, or every file below a local folder, from the remote
    pub fn remove_path(&self, path: &str) -> Result<()> {
        let client = Arc::clone(&self.client);
        let vault = Arc::clone(&self.vault);
        let sync_log = Arc::clone(&self.sync_log);
        let notifier = Arc::clone(&self.notifier);
        let path = path.to_string();

        self.queue.append(move || {
            let files = if vault.is_dir(&path) {
                let mut files = Vec::new();
                collect_files(vault.as_ref(), &path, &mut files)?;
                files
            } else {
                vec![path]
            };
            for file in files {
                let outcome = client.delete(&file, &CommitOptions::default());
                let description = format!("deleting file \"{file}\"");
                if let Err(e) = record_outcome(&sync_log, notifier.as_ref(), &description, outcome) {
                    log::warn!("Could not log {description}: {e:#}");
                }
            }
            notifier.notify("Done");
            Ok(())
        })
    }
}
