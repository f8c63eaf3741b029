//! Branch listing and switching

use anyhow::{Context, Result};
use colored::Colorize;
use inquire::{Select, Text};

use crate::remote::GitLabClient;
use crate::settings::SyncSettings;

use super::is_interactive;

const NEW_BRANCH: &str = "+ New branch...";

/// What switching to a branch name involves
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BranchChoice {
    Existing(String),
    /// Has to be created from the current branch first
    New(String),
}

pub fn classify(branches: &[String], name: &str) -> BranchChoice {
    let name = name.trim();
    if branches.iter().any(|b| b == name) {
        BranchChoice::Existing(name.to_string())
    } else {
        BranchChoice::New(name.to_string())
    }
}

fn prompt_branch(branches: &[String], current: &str) -> Result<Option<String>> {
    let mut options: Vec<String> = branches.to_vec();
    options.push(NEW_BRANCH.to_string());
    let start = branches.iter().position(|b| b == current).unwrap_or(0);

    let picked = Select::new("Switch to branch:", options)
        .with_starting_cursor(start)
        .prompt_skippable()
        .context("Failed to get branch selection")?;

    let Some(picked) = picked else {
        return Ok(None);
    };
    if picked != NEW_BRANCH {
        return Ok(Some(picked));
    }

    let name = Text::new("New branch name:")
        .with_help_message(&format!("Created from {current}"))
        .prompt()
        .context("Failed to get branch name")?;
    Ok(Some(name))
}

/// Handle branches command
///
/// Lists the remote branches, then switches to `target` (or a prompted
/// choice), creating it from the current branch when it does not exist.
pub fn handle_branches(
    settings: &mut SyncSettings,
    client: &GitLabClient,
    target: Option<String>,
) -> Result<()> {
    let branches = client.get_branches().context("Failed to list branches")?;

    let target = match target {
        Some(name) => Some(name),
        None if is_interactive() => prompt_branch(&branches, &settings.branch)?,
        None => None,
    };

    let Some(target) = target else {
        println!("{}", "Branches:".bold());
        for branch in &branches {
            if *branch == settings.branch {
                println!("  {} {}", "*".green(), branch.green());
            } else {
                println!("    {branch}");
            }
        }
        return Ok(());
    };

    match classify(&branches, &target) {
        BranchChoice::Existing(name) => {
            settings.branch = name;
        }
        BranchChoice::New(name) => {
            if name.is_empty() {
                anyhow::bail!("Branch name cannot be empty");
            }
            client.create_branch(&name, &settings.branch)?;
            println!("  {} Created branch {} from {}", "✓".green(), name.cyan(), settings.branch);
            settings.branch = name;
        }
    }

    settings.save().context("Failed to save settings")?;
    println!("  {} Now syncing branch {}", "✓".green(), settings.branch.cyan());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CONFIG_DIR_ENV;
    use crate::notify::RecordingNotifier;
    use crate::remote::{MemoryTransport, RemoteOptions};
    use crate::vault::LocalVault;
    use serial_test::serial;
    use std::sync::Arc;
    use tempfile::TempDir;

    #[test]
    fn test_classify() {
        let branches = vec!["master".to_string(), "drafts".to_string()];
        assert_eq!(classify(&branches, "drafts"), BranchChoice::Existing("drafts".into()));
        assert_eq!(classify(&branches, " ideas "), BranchChoice::New("ideas".into()));
    }

    #[test]
    #[serial]
    fn test_switch_creates_missing_branch() {
        let dir = TempDir::new().unwrap();
        std::env::set_var(CONFIG_DIR_ENV, dir.path());

        let mut settings = SyncSettings {
            project_name: "alice".into(),
            repo_name: "notes".into(),
            ..Default::default()
        };
        let client = GitLabClient::new(
            RemoteOptions::from(&settings),
            Arc::new(MemoryTransport::new()),
            Arc::new(LocalVault::new(dir.path())),
            Arc::new(RecordingNotifier::default()),
        );

        handle_branches(&mut settings, &client, Some("ideas".into())).unwrap();
        assert_eq!(settings.branch, "ideas");
        assert_eq!(client.get_branches().unwrap(), vec!["master", "ideas"]);
        assert_eq!(SyncSettings::load().unwrap().branch, "ideas");

        handle_branches(&mut settings, &client, Some("master".into())).unwrap();
        assert_eq!(settings.branch, "master");

        std::env::remove_var(CONFIG_DIR_ENV);
    }
}
