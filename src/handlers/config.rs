//! Configuration command handlers

use anyhow::{Context, Result};
use colored::Colorize;
use std::path::PathBuf;

use crate::settings::SyncSettings;

use super::{is_interactive, run_onboarding_flow};

/// Settings overrides given on the command line
#[derive(Debug, Default, Clone)]
pub struct ConfigUpdate {
    pub api_url: Option<String>,
    pub project_name: Option<String>,
    pub repo_name: Option<String>,
    pub branch: Option<String>,
    pub email: Option<String>,
    pub username: Option<String>,
    pub vault_root: Option<PathBuf>,
    pub auto: Option<bool>,
    pub notifications: Option<bool>,
}

impl ConfigUpdate {
    fn is_empty(&self) -> bool {
        self.api_url.is_none()
            && self.project_name.is_none()
            && self.repo_name.is_none()
            && self.branch.is_none()
            && self.email.is_none()
            && self.username.is_none()
            && self.vault_root.is_none()
            && self.auto.is_none()
            && self.notifications.is_none()
    }
}

/// Handle config command
///
/// Without overrides an interactive terminal gets the onboarding prompts,
/// anything else gets the current settings printed.
pub fn handle_config(show: bool, update: ConfigUpdate) -> Result<()> {
    let mut settings = SyncSettings::load().context("Failed to load settings")?;

    if show {
        settings.show();
        return Ok(());
    }

    if update.is_empty() {
        if is_interactive() {
            run_onboarding_flow()?;
        } else {
            settings.show();
        }
        return Ok(());
    }

    settings.update(
        update.api_url,
        update.project_name,
        update.repo_name,
        update.branch,
        update.email,
        update.username,
        update.vault_root,
        update.auto,
        update.notifications,
    );
    settings.save().context("Failed to save settings")?;

    println!("{}", "✓ Settings updated".green());
    settings.show();
    if let Err(e) = settings.validate() {
        println!("  {} {}", "Warning:".yellow(), e);
    }
    Ok(())
}
