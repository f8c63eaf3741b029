use anyhow::Result;
use std::sync::Arc;

use crate::notify::{ConsoleNotifier, Notifier};
use crate::remote::{ReqwestTransport, Transport};
use crate::settings::SyncSettings;
use crate::vault::{LocalVault, Vault};

use super::state::StatePaths;
use super::SyncEngine;

/// Capabilities injected into the engine
pub struct Services {
    pub transport: Arc<dyn Transport>,
    pub vault: Arc<dyn Vault>,
    pub notifier: Arc<dyn Notifier>,
}

impl Services {
    /// HTTP transport with the resolved token, the configured vault root and
    /// console notifications
    pub fn for_settings(settings: &SyncSettings) -> Result<Self> {
        let token = settings.resolve_token()?;
        Ok(Self {
            transport: Arc::new(ReqwestTransport::new(&token)?),
            vault: Arc::new(LocalVault::new(&settings.vault_root)),
            notifier: Arc::new(ConsoleNotifier::new(settings.notifications)),
        })
    }
}

impl SyncEngine {
    /// Engine wired to the real remote and the user's state directory
    pub fn from_settings(settings: &SyncSettings) -> Result<Self> {
        settings.validate()?;
        let services = Services::for_settings(settings)?;
        Self::new(settings, services, &StatePaths::from_config()?)
    }
}
