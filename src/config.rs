use anyhow::{Context, Result};
use std::path::PathBuf;

const APP_DIR_NAME: &str = "gitlab-vault-sync";

/// Environment variable that overrides the configuration directory
pub const CONFIG_DIR_ENV: &str = "GITLAB_VAULT_SYNC_DIR";

/// Cross-platform configuration directory manager
pub struct ConfigManager;

impl ConfigManager {
    /// Get the main configuration directory path following platform conventions:
    /// - `$GITLAB_VAULT_SYNC_DIR` when set
    /// - Linux: $XDG_CONFIG_HOME/gitlab-vault-sync or ~/.config/gitlab-vault-sync
    /// - macOS: ~/Library/Application Support/gitlab-vault-sync
    /// - Windows: %APPDATA%\gitlab-vault-sync
    pub fn config_dir() -> Result<PathBuf> {
        if let Ok(dir) = std::env::var(CONFIG_DIR_ENV) {
            return Ok(PathBuf::from(dir));
        }

        #[cfg(target_os = "linux")]
        {
            if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
                Ok(PathBuf::from(xdg_config).join(APP_DIR_NAME))
            } else {
                let home = dirs::home_dir().context("Failed to get home directory")?;
                Ok(home.join(".config").join(APP_DIR_NAME))
            }
        }

        #[cfg(target_os = "macos")]
        {
            let home = dirs::home_dir().context("Failed to get home directory")?;
            Ok(home
                .join("Library")
                .join("Application Support")
                .join(APP_DIR_NAME))
        }

        #[cfg(target_os = "windows")]
        {
            Ok(dirs::config_dir()
                .context("Failed to get Windows config directory")?
                .join(APP_DIR_NAME))
        }

        #[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
        {
            let home = dirs::home_dir().context("Failed to get home directory")?;
            Ok(home.join(format!(".{APP_DIR_NAME}")))
        }
    }

    /// Get the settings file path (settings.toml)
    pub fn settings_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("settings.toml"))
    }

    /// Get the checkpoint file path (checkpoint.json)
    pub fn checkpoint_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("checkpoint.json"))
    }

    /// Get the change log path
    pub fn change_log_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("changes.log"))
    }

    /// Get the sync log path
    pub fn sync_log_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("sync.log"))
    }

    /// Get the application log file path
    pub fn log_file_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("gitlab-vault-sync.log"))
    }

    /// Ensure the configuration directory exists
    pub fn ensure_config_dir() -> Result<PathBuf> {
        let config_dir = Self::config_dir()?;
        std::fs::create_dir_all(&config_dir).with_context(|| {
            format!(
                "Failed to create config directory: {}",
                config_dir.display()
            )
        })?;
        Ok(config_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_config_paths() {
        std::env::remove_var(CONFIG_DIR_ENV);
        let config_dir = ConfigManager::config_dir().unwrap();
        assert!(config_dir.to_string_lossy().contains(APP_DIR_NAME));

        let settings = ConfigManager::settings_path().unwrap();
        assert!(settings.to_string_lossy().ends_with("settings.toml"));

        let checkpoint = ConfigManager::checkpoint_path().unwrap();
        assert!(checkpoint.to_string_lossy().ends_with("checkpoint.json"));

        let changes = ConfigManager::change_log_path().unwrap();
        assert!(changes.to_string_lossy().ends_with("changes.log"));

        let sync = ConfigManager::sync_log_path().unwrap();
        assert!(sync.to_string_lossy().ends_with("sync.log"));

        let log = ConfigManager::log_file_path().unwrap();
        assert!(log.to_string_lossy().ends_with("gitlab-vault-sync.log"));
    }

    #[test]
    #[serial]
    fn test_env_override_respected() {
        std::env::set_var(CONFIG_DIR_ENV, "/tmp/vault-sync-override");
        let config_dir = ConfigManager::config_dir().unwrap();
        assert_eq!(config_dir, PathBuf::from("/tmp/vault-sync-override"));
        std::env::remove_var(CONFIG_DIR_ENV);
    }

    #[test]
    #[serial]
    #[cfg(target_os = "linux")]
    fn test_xdg_config_home_respected() {
        std::env::remove_var(CONFIG_DIR_ENV);
        std::env::set_var("XDG_CONFIG_HOME", "/tmp/test-xdg-config");
        let config_dir = ConfigManager::config_dir().unwrap();
        assert!(config_dir
            .to_string_lossy()
            .contains("/tmp/test-xdg-config/gitlab-vault-sync"));
        std::env::remove_var("XDG_CONFIG_HOME");
    }
}
