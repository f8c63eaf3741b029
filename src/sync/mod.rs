// Module declarations
mod init;
mod pull;
mod push;
mod state;
mod status;
mod transfer;

// Re-export public types and functions
pub use init::Services;
pub use state::StatePaths;
pub use status::{print_status, SyncStatus};
pub use transfer::VAULT_CONFIG_DIR;

use anyhow::Result;
use chrono::Local;
use std::sync::Arc;

use crate::checkpoint::CheckpointStore;
use crate::journal::{ChangeAction, ChangeLog, SyncLog};
use crate::notify::Notifier;
use crate::queue::TaskQueue;
use crate::reconcile::NetOp;
use crate::remote::{GitLabClient, RemoteOptions};
use crate::settings::SyncSettings;
use crate::vault::Vault;

/// Behaviour switches taken from the settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineOptions {
    /// Send every recorded event to the remote right away
    pub auto: bool,
    /// Keep pushed events behind a marker instead of truncating the log
    pub retain_history: bool,
}

impl From<&SyncSettings> for EngineOptions {
    fn from(settings: &SyncSettings) -> Self {
        Self {
            auto: settings.auto,
            retain_history: settings.retain_history,
        }
    }
}

/// Owns every service a push or pull cycle touches
///
/// Remote calls and pull-side local writes run on the task queue; the
/// public methods only read local state and schedule work. Call
/// [`SyncEngine::wait_idle`] to block until everything scheduled has run.
pub struct SyncEngine {
    queue: Arc<TaskQueue>,
    change_log: Arc<ChangeLog>,
    sync_log: Arc<SyncLog>,
    checkpoint: Arc<CheckpointStore>,
    client: Arc<GitLabClient>,
    vault: Arc<dyn Vault>,
    notifier: Arc<dyn Notifier>,
    options: EngineOptions,
}

impl SyncEngine {
    pub fn new(settings: &SyncSettings, services: Services, paths: &StatePaths) -> Result<Self> {
        let client = GitLabClient::new(
            RemoteOptions::from(settings),
            services.transport,
            Arc::clone(&services.vault),
            Arc::clone(&services.notifier),
        );

        Ok(Self {
            queue: Arc::new(TaskQueue::new()?),
            change_log: Arc::new(ChangeLog::open(&paths.change_log, settings.change_log_limit)?),
            sync_log: Arc::new(SyncLog::open(&paths.sync_log, settings.sync_log_limit)?),
            checkpoint: Arc::new(CheckpointStore::new(&paths.checkpoint, settings.project_key())),
            client: Arc::new(client),
            vault: services.vault,
            notifier: services.notifier,
            options: EngineOptions::from(settings),
        })
    }

    pub fn change_log(&self) -> &ChangeLog {
        &self.change_log
    }

    pub fn sync_log(&self) -> &SyncLog {
        &self.sync_log
    }

    pub fn checkpoint(&self) -> &CheckpointStore {
        &self.checkpoint
    }

    pub fn client(&self) -> &GitLabClient {
        &self.client
    }

    pub fn options(&self) -> EngineOptions {
        self.options
    }

    /// Block until every scheduled task, including tasks they scheduled, has run
    pub fn wait_idle(&self) {
        self.queue.wait_idle();
    }

    /// Record a local file-system event
    ///
    /// In auto mode the matching remote operation is queued immediately.
    /// Returns `false` when the change log suppressed a repeated MODIFY.
    pub fn record_event(
        &self,
        action: ChangeAction,
        path: &str,
        old_path: Option<&str>,
    ) -> Result<bool> {
        let recorded = self.change_log.add_action(action, path, old_path)?;
        log::debug!("Recorded {action} {path} (kept: {recorded})");

        if self.options.auto && !action.is_boundary() {
            self.schedule(NetOp {
                action,
                path: path.to_string(),
                timestamp: Local::now().fixed_offset(),
                old_path: old_path.map(String::from),
            })?;
        }
        Ok(recorded)
    }

    /// A file was opened locally; in auto mode refresh it from the remote
    ///
    /// A file the remote does not know yet is uploaded instead.
    pub fn file_opened(&self, path: &str) -> Result<()> {
        if !self.options.auto {
            return Ok(());
        }
        let client = Arc::clone(&self.client);
        let path = path.to_string();
        self.queue.append(move || {
            client.save_local_file(&path, None, true)?;
            Ok(())
        })
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::notify::RecordingNotifier;
    use crate::remote::MemoryTransport;
    use crate::vault::LocalVault;
    use tempfile::TempDir;

    pub struct Harness {
        pub dir: TempDir,
        pub vault: Arc<LocalVault>,
        pub transport: Arc<MemoryTransport>,
        pub notifier: Arc<RecordingNotifier>,
        pub engine: SyncEngine,
    }

    pub fn settings() -> SyncSettings {
        SyncSettings {
            api_url: "http://gitlab.test/api/v4".into(),
            project_name: "alice".into(),
            repo_name: "notes".into(),
            email: "alice@example.com".into(),
            username: "alice".into(),
            ..Default::default()
        }
    }

    pub fn harness_with(settings: SyncSettings) -> Harness {
        let dir = TempDir::new().unwrap();
        let vault = Arc::new(LocalVault::new(dir.path().join("vault")));
        let transport = Arc::new(MemoryTransport::new());
        let notifier = Arc::new(RecordingNotifier::default());
        let services = Services {
            transport: transport.clone(),
            vault: vault.clone(),
            notifier: notifier.clone(),
        };
        let engine =
            SyncEngine::new(&settings, services, &StatePaths::in_dir(&dir.path().join("state")))
                .unwrap();
        Harness {
            dir,
            vault,
            transport,
            notifier,
            engine,
        }
    }

    pub fn harness() -> Harness {
        harness_with(settings())
    }
}
