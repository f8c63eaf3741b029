//! Onboarding and initialization handlers
//!
//! Handles the first-time setup flow including checking initialization
//! status and running the interactive onboarding process.

use anyhow::{Context, Result};
use colored::Colorize;

use crate::config::ConfigManager;
use crate::onboarding;
use crate::settings::SyncSettings;

/// Check if gitlab-vault-sync has been initialized
pub fn is_initialized() -> Result<bool> {
    Ok(ConfigManager::settings_path()?.exists())
}

/// Run the onboarding flow and save the resulting settings
pub fn run_onboarding_flow() -> Result<SyncSettings> {
    ConfigManager::ensure_config_dir()?;
    let current = SyncSettings::load().context("Failed to load existing settings")?;

    let settings = onboarding::run_onboarding(&current).context("Onboarding cancelled or failed")?;
    settings.save().context("Failed to save settings")?;

    println!();
    println!("{}", "✓ Ready to sync!".green().bold());
    println!(
        "  Run {} to upload the whole directory or {} to download the repository.",
        "gitlab-vault-sync push-all".cyan(),
        "gitlab-vault-sync download".cyan()
    );
    println!();

    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CONFIG_DIR_ENV;
    use serial_test::serial;
    use tempfile::TempDir;

    #[test]
    #[serial]
    fn test_is_initialized_follows_settings_file() {
        let dir = TempDir::new().unwrap();
        std::env::set_var(CONFIG_DIR_ENV, dir.path());

        assert!(!is_initialized().unwrap());
        SyncSettings::default().save().unwrap();
        assert!(is_initialized().unwrap());

        std::env::remove_var(CONFIG_DIR_ENV);
    }
}
