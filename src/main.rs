use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;

use gitlab_vault_sync::handlers::{self, config::ConfigUpdate, LogKind};
use gitlab_vault_sync::journal::ChangeAction;
use gitlab_vault_sync::logger;
use gitlab_vault_sync::settings::SyncSettings;
use gitlab_vault_sync::sync::{self, StatePaths, SyncEngine, SyncStatus};

#[derive(Parser)]
#[command(name = "gitlab-vault-sync")]
#[command(about = "Sync a local notes directory with a GitLab repository", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Configure the repository connection interactively
    Init,

    /// Record a local file-system event in the change log
    Record {
        /// CREATE, MODIFY, DELETE or RENAME
        #[arg(value_parser = parse_action)]
        action: ChangeAction,

        /// Vault-relative path of the file
        path: String,

        /// Previous path, required for RENAME
        #[arg(long)]
        from: Option<String>,
    },

    /// Send the changes recorded since the last push or pull
    Push,

    /// Upload every file in the vault
    PushAll,

    /// Apply remote commits made since the last checkpoint
    Pull,

    /// Copy the repository (or one folder of it) into the vault
    Download {
        /// Repository folder to download (prompted for when omitted on a terminal)
        path: Option<String>,

        /// Leave out the editor configuration folder
        #[arg(long, conflicts_with = "include_config")]
        skip_config: bool,

        /// Include the editor configuration folder without asking
        #[arg(long)]
        include_config: bool,
    },

    /// Upload a file or every file in a folder
    Send { path: String },

    /// Overwrite a local file or folder with the remote version
    Load { path: String },

    /// Delete a file or every file in a folder from the remote
    Remove { path: String },

    /// A file was opened; in auto mode refresh it from the remote
    Open { path: String },

    /// List branches or switch to one, creating it when missing
    Branches {
        /// Branch to switch to
        switch: Option<String>,
    },

    /// Show recent sync activity
    Log {
        /// Show the change log instead of the sync log
        #[arg(long)]
        changes: bool,

        /// Number of entries
        #[arg(short = 'n', long, default_value_t = 20)]
        count: usize,
    },

    /// Show checkpoint, pending changes and recent activity
    Status {
        /// List the operations the next push would send
        #[arg(short, long)]
        verbose: bool,

        /// Number of recent sync log entries
        #[arg(short = 'n', long, default_value_t = 10)]
        count: usize,
    },

    /// Show or change settings
    Config {
        #[arg(long)]
        api_url: Option<String>,

        /// Namespace (user or group) owning the repository
        #[arg(long)]
        project: Option<String>,

        /// Repository name
        #[arg(long)]
        repo: Option<String>,

        #[arg(long)]
        branch: Option<String>,

        /// Commit author email
        #[arg(long)]
        email: Option<String>,

        /// Commit author name
        #[arg(long)]
        username: Option<String>,

        /// Local directory to sync
        #[arg(long)]
        vault: Option<PathBuf>,

        /// Send recorded changes immediately
        #[arg(long)]
        auto: Option<bool>,

        #[arg(long)]
        notifications: Option<bool>,

        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
}

fn parse_action(value: &str) -> Result<ChangeAction, String> {
    value
        .to_ascii_uppercase()
        .parse()
        .map_err(|e: anyhow::Error| e.to_string())
}

fn load_settings() -> Result<SyncSettings> {
    if !handlers::is_initialized()? && handlers::is_interactive() {
        return handlers::run_onboarding_flow();
    }
    SyncSettings::load().context("Failed to load settings")
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logger::init_logger()?;

    match cli.command {
        Commands::Init => {
            handlers::run_onboarding_flow()?;
        }
        Commands::Record { action, path, from } => {
            let settings = load_settings()?;
            let paths = StatePaths::from_config()?;
            if !handlers::handle_record(&settings, &paths, action, &path, from.as_deref())? {
                log::debug!("{action} {path} already pending");
            }
        }
        Commands::Push => {
            let settings = load_settings()?;
            let engine = SyncEngine::from_settings(&settings)?;
            if settings.fetch_on_start {
                let (count, commits) = engine.push_then_fetch()?;
                engine.wait_idle();
                logger::log_cycle("push", &format!("{count} operations, {commits} commits"))?;
                println!(
                    "{} {} operations, pulled {} commits",
                    "✓ Pushed".green(),
                    count,
                    commits
                );
            } else {
                let count = engine.push_changes()?;
                engine.wait_idle();
                logger::log_cycle("push", &format!("{count} operations"))?;
                println!("{} {} operations", "✓ Pushed".green(), count);
            }
        }
        Commands::PushAll => {
            let settings = load_settings()?;
            let engine = SyncEngine::from_settings(&settings)?;
            let (files, folders) = engine.push_all()?;
            engine.wait_idle();
            logger::log_cycle("push-all", &format!("{files} files in {folders} folders"))?;
            println!("{} {} files in {} folders", "✓ Sent".green(), files, folders);
        }
        Commands::Pull => {
            let settings = load_settings()?;
            let engine = SyncEngine::from_settings(&settings)?;
            let commits = engine.fetch_changes()?;
            engine.wait_idle();
            logger::log_cycle("pull", &format!("{commits} commits"))?;
            println!("{} {} commits", "✓ Pulled".green(), commits);
        }
        Commands::Download {
            path,
            skip_config,
            include_config,
        } => {
            let settings = load_settings()?;
            let engine = SyncEngine::from_settings(&settings)?;
            let skip = match (skip_config, include_config) {
                (true, _) => Some(true),
                (_, true) => Some(false),
                _ => None,
            };
            handlers::handle_download(&engine, path, skip)?;
        }
        Commands::Send { path } => {
            let engine = SyncEngine::from_settings(&load_settings()?)?;
            engine.send_path(&path)?;
            engine.wait_idle();
        }
        Commands::Load { path } => {
            let engine = SyncEngine::from_settings(&load_settings()?)?;
            engine.load_path(&path)?;
            engine.wait_idle();
        }
        Commands::Remove { path } => {
            let engine = SyncEngine::from_settings(&load_settings()?)?;
            engine.remove_path(&path)?;
            engine.wait_idle();
        }
        Commands::Open { path } => {
            let engine = SyncEngine::from_settings(&load_settings()?)?;
            engine.file_opened(&path)?;
            engine.wait_idle();
        }
        Commands::Branches { switch } => {
            let mut settings = load_settings()?;
            let engine = SyncEngine::from_settings(&settings)?;
            handlers::handle_branches(&mut settings, engine.client(), switch)?;
        }
        Commands::Log { changes, count } => {
            let settings = load_settings()?;
            let kind = if changes { LogKind::Changes } else { LogKind::Sync };
            handlers::handle_log(&settings, &StatePaths::from_config()?, kind, count)?;
        }
        Commands::Status { verbose, count } => {
            let settings = load_settings()?;
            let status = SyncStatus::load(&settings, &StatePaths::from_config()?, count)?;
            sync::print_status(&status, verbose);
        }
        Commands::Config {
            api_url,
            project,
            repo,
            branch,
            email,
            username,
            vault,
            auto,
            notifications,
            show,
        } => {
            handlers::handle_config(
                show,
                ConfigUpdate {
                    api_url,
                    project_name: project,
                    repo_name: repo,
                    branch,
                    email,
                    username,
                    vault_root: vault,
                    auto,
                    notifications,
                },
            )?;
        }
    }

    Ok(())
}
