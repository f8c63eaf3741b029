use anyhow::{bail, Context, Result};
use colored::Colorize;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Default GitLab REST endpoint
pub const GITLAB_API_URL: &str = "https://gitlab.com/api/v4";

/// Environment variable holding the GitLab private token
pub const TOKEN_ENV: &str = "GITLAB_VAULT_SYNC_TOKEN";

/// Persisted settings for the sync engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncSettings {
    /// Base URL of the GitLab REST API
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// GitLab namespace (user or group) owning the repository
    #[serde(default)]
    pub project_name: String,

    /// Repository name inside the namespace
    #[serde(default)]
    pub repo_name: String,

    /// Branch every read and write is scoped to
    #[serde(default = "default_branch")]
    pub branch: String,

    /// Commit author email
    #[serde(default)]
    pub email: String,

    /// Commit author name
    #[serde(default)]
    pub username: String,

    /// Local directory mirrored to the repository
    #[serde(default = "default_vault_root")]
    pub vault_root: PathBuf,

    /// Push every recorded event immediately instead of waiting for `push`
    #[serde(default)]
    pub auto: bool,

    /// Follow every push with a pull of other devices' commits
    #[serde(default)]
    pub fetch_on_start: bool,

    /// Show transient notifications
    #[serde(default = "default_true")]
    pub notifications: bool,

    /// Keep change history behind a boundary marker after a push (false truncates the log)
    #[serde(default = "default_true")]
    pub retain_history: bool,

    /// Record limit for the change log
    #[serde(default = "default_change_log_limit")]
    pub change_log_limit: usize,

    /// Record limit for the sync log
    #[serde(default = "default_sync_log_limit")]
    pub sync_log_limit: usize,

    /// Private token; the environment variable takes precedence
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

fn default_api_url() -> String {
    GITLAB_API_URL.to_string()
}

fn default_branch() -> String {
    "master".to_string()
}

fn default_vault_root() -> PathBuf {
    PathBuf::from(".")
}

fn default_true() -> bool {
    true
}

fn default_change_log_limit() -> usize {
    2000
}

fn default_sync_log_limit() -> usize {
    500
}

impl Default for SyncSettings {
    fn default() -> Self {
        SyncSettings {
            api_url: default_api_url(),
            project_name: String::new(),
            repo_name: String::new(),
            branch: default_branch(),
            email: String::new(),
            username: String::new(),
            vault_root: default_vault_root(),
            auto: false,
            fetch_on_start: false,
            notifications: true,
            retain_history: true,
            change_log_limit: default_change_log_limit(),
            sync_log_limit: default_sync_log_limit(),
            token: None,
        }
    }
}

impl SyncSettings {
    /// Load settings from the config directory, falling back to defaults
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::settings_path()?)
    }

    /// Load settings from an explicit path
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings file: {}", path.display()))?;

        toml::from_str(&content).context("Failed to parse settings file")
    }

    /// Save settings to the config directory
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::settings_path()?)
    }

    /// Save settings to an explicit path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize settings")?;

        fs::write(path, content)
            .with_context(|| format!("Failed to write settings file: {}", path.display()))?;

        Ok(())
    }

    fn settings_path() -> Result<PathBuf> {
        crate::config::ConfigManager::settings_path()
    }

    /// Resolve the private token from the environment or the settings file
    pub fn resolve_token(&self) -> Result<String> {
        if let Ok(token) = std::env::var(TOKEN_ENV) {
            if !token.is_empty() {
                return Ok(token);
            }
        }
        match &self.token {
            Some(token) if !token.is_empty() => Ok(token.clone()),
            _ => bail!("No GitLab token configured. Set {TOKEN_ENV} or add `token` to settings.toml"),
        }
    }

    /// Key used to namespace the checkpoint per remote project
    pub fn project_key(&self) -> String {
        format!("{}/{}", self.project_name, self.repo_name)
    }

    /// Ensure the fields the remote adapter needs are present
    pub fn validate(&self) -> Result<()> {
        if self.project_name.trim().is_empty() {
            bail!("project_name is not configured");
        }
        if self.repo_name.trim().is_empty() {
            bail!("repo_name is not configured");
        }
        if self.branch.trim().is_empty() {
            bail!("branch is not configured");
        }
        if !self.api_url.starts_with("http://") && !self.api_url.starts_with("https://") {
            bail!("Invalid API URL '{}': expected http(s)://", self.api_url);
        }
        Ok(())
    }

    /// Apply the optional overrides given on the command line
    #[allow(clippy::too_many_arguments)]
    pub fn update(
        &mut self,
        api_url: Option<String>,
        project_name: Option<String>,
        repo_name: Option<String>,
        branch: Option<String>,
        email: Option<String>,
        username: Option<String>,
        vault_root: Option<PathBuf>,
        auto: Option<bool>,
        notifications: Option<bool>,
    ) {
        if let Some(v) = api_url {
            self.api_url = v.trim_end_matches('/').to_string();
        }
        if let Some(v) = project_name {
            self.project_name = v;
        }
        if let Some(v) = repo_name {
            self.repo_name = v;
        }
        if let Some(v) = branch {
            self.branch = v;
        }
        if let Some(v) = email {
            self.email = v;
        }
        if let Some(v) = username {
            self.username = v;
        }
        if let Some(v) = vault_root {
            self.vault_root = v;
        }
        if let Some(v) = auto {
            self.auto = v;
        }
        if let Some(v) = notifications {
            self.notifications = v;
        }
    }

    /// Print the current settings, masking the token
    pub fn show(&self) {
        println!("{}", "Current Settings:".bold());
        println!("  {} {}", "API:".dimmed(), self.api_url);
        println!("  {} {}", "Project:".dimmed(), self.project_key());
        println!("  {} {}", "Branch:".dimmed(), self.branch);
        println!("  {} {} <{}>", "Author:".dimmed(), self.username, self.email);
        println!("  {} {}", "Vault:".dimmed(), self.vault_root.display());
        println!("  {} {}", "Auto:".dimmed(), on_off(self.auto));
        println!("  {} {}", "Notifications:".dimmed(), on_off(self.notifications));
        println!("  {} {}", "Retain history:".dimmed(), on_off(self.retain_history));
        let token = match &self.token {
            Some(t) => "*".repeat(t.len()),
            None => "(from environment)".to_string(),
        };
        println!("  {} {}", "Token:".dimmed(), token);
    }
}

fn on_off(value: bool) -> colored::ColoredString {
    if value {
        "on".green()
    } else {
        "off".yellow()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let settings = SyncSettings::default();
        assert_eq!(settings.api_url, GITLAB_API_URL);
        assert_eq!(settings.branch, "master");
        assert!(settings.notifications);
        assert!(!settings.auto);
        assert_eq!(settings.change_log_limit, 2000);
        assert_eq!(settings.sync_log_limit, 500);
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("settings.toml");

        let mut settings = SyncSettings::default();
        settings.project_name = "alice".to_string();
        settings.repo_name = "notes".to_string();
        settings.auto = true;
        settings.save_to(&path).unwrap();

        let loaded = SyncSettings::load_from(&path).unwrap();
        assert_eq!(loaded, settings);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("settings.toml");
        fs::write(&path, "project_name = \"alice\"\nrepo_name = \"notes\"\n").unwrap();

        let loaded = SyncSettings::load_from(&path).unwrap();
        assert_eq!(loaded.project_key(), "alice/notes");
        assert_eq!(loaded.branch, "master");
        assert!(loaded.retain_history);
    }

    #[test]
    fn test_validate_rejects_missing_project() {
        let settings = SyncSettings::default();
        assert!(settings.validate().is_err());

        let settings = SyncSettings {
            project_name: "alice".into(),
            repo_name: "notes".into(),
            api_url: "gitlab.com/api/v4".into(),
            ..Default::default()
        };
        let err = settings.validate().unwrap_err();
        assert!(err.to_string().contains("Invalid API URL"));
    }

    #[test]
    #[serial]
    fn test_token_env_takes_precedence() {
        let settings = SyncSettings {
            token: Some("from-file".into()),
            ..Default::default()
        };

        std::env::set_var(TOKEN_ENV, "from-env");
        assert_eq!(settings.resolve_token().unwrap(), "from-env");

        std::env::remove_var(TOKEN_ENV);
        assert_eq!(settings.resolve_token().unwrap(), "from-file");

        let empty = SyncSettings::default();
        assert!(empty.resolve_token().is_err());
    }

    #[test]
    fn test_update_trims_api_url() {
        let mut settings = SyncSettings::default();
        settings.update(
            Some("https://git.example.com/api/v4/".into()),
            None,
            None,
            Some("main".into()),
            None,
            None,
            None,
            Some(true),
            None,
        );
        assert_eq!(settings.api_url, "https://git.example.com/api/v4");
        assert_eq!(settings.branch, "main");
        assert!(settings.auto);
    }
}
