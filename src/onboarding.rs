use anyhow::{Context, Result};
use colored::Colorize;
use inquire::{Confirm, Password, Text};
use std::path::PathBuf;

use crate::settings::{SyncSettings, TOKEN_ENV};

/// Check an API base URL before it is saved
pub fn is_valid_api_url(url: &str) -> bool {
    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"));
    matches!(rest, Some(host) if !host.trim_matches('/').is_empty())
}

/// Non-empty and free of whitespace
fn is_valid_name(value: &str) -> bool {
    let value = value.trim();
    !value.is_empty() && !value.contains(char::is_whitespace)
}

fn ask(prompt: &str, current: &str, help: &str) -> Result<String> {
    let answer = Text::new(prompt)
        .with_default(current)
        .with_help_message(help)
        .prompt()
        .with_context(|| format!("Failed to read {prompt}"))?;
    Ok(answer.trim().to_string())
}

/// Run the interactive onboarding flow
///
/// Every prompt defaults to the value in `current`, so the flow doubles as an
/// editor for existing settings.
pub fn run_onboarding(current: &SyncSettings) -> Result<SyncSettings> {
    println!("\n{}", "First time setup. Let's connect a GitLab repository!".cyan().bold());
    println!();

    let mut settings = current.clone();

    let api_url = ask("GitLab API URL:", &settings.api_url, "REST endpoint, ends with /api/v4")?;
    if !is_valid_api_url(&api_url) {
        anyhow::bail!("Invalid API URL. Must start with 'https://' or 'http://'");
    }
    settings.api_url = api_url.trim_end_matches('/').to_string();

    settings.project_name = ask(
        "Namespace (user or group):",
        &settings.project_name,
        "The part of the repository path before the slash",
    )?;
    settings.repo_name = ask("Repository name:", &settings.repo_name, "The repository inside the namespace")?;
    if !is_valid_name(&settings.project_name) || !is_valid_name(&settings.repo_name) {
        anyhow::bail!("Namespace and repository must be non-empty and contain no spaces");
    }

    settings.branch = ask("Branch:", &settings.branch, "Every read and write uses this branch")?;
    settings.username = ask("Commit author name:", &settings.username, "Shown on every commit")?;
    settings.email = ask("Commit author email:", &settings.email, "Shown on every commit")?;

    let vault_root = ask(
        "Local directory to sync:",
        &settings.vault_root.display().to_string(),
        "Absolute path recommended",
    )?;
    settings.vault_root = PathBuf::from(vault_root);

    settings.auto = Confirm::new("Send every recorded change immediately?")
        .with_default(settings.auto)
        .with_help_message("Otherwise changes wait for `push`")
        .prompt()
        .context("Failed to read auto mode")?;

    let store_token = Confirm::new("Store the access token in the settings file?")
        .with_default(false)
        .with_help_message(&format!("Say no to supply it through {TOKEN_ENV} instead"))
        .prompt()
        .context("Failed to read token preference")?;
    if store_token {
        let token = Password::new("Personal access token:")
            .without_confirmation()
            .prompt()
            .context("Failed to read token")?;
        settings.token = Some(token);
    }

    settings.validate()?;
    Ok(settings)
}
