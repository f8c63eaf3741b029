//! Change log and sync log viewers

use anyhow::{Context, Result};
use colored::Colorize;

use crate::journal::{ChangeAction, ChangeLog, SyncLog, FAIL_PREFIX};
use crate::settings::SyncSettings;
use crate::sync::StatePaths;

/// Which log to show
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogKind {
    /// Outcomes of remote operations
    Sync,
    /// Recorded local events, markers included
    Changes,
}

/// Split a sync log line into its timestamp and message
pub fn split_sync_line(line: &str) -> (&str, &str) {
    match line.split_once(">\t") {
        Some((stamp, message)) => (stamp.trim_start_matches('[').trim_end_matches(']'), message),
        None => ("", line),
    }
}

/// Handle log command
pub fn handle_log(
    settings: &SyncSettings,
    paths: &StatePaths,
    kind: LogKind,
    count: usize,
) -> Result<()> {
    match kind {
        LogKind::Sync => {
            let log = SyncLog::open(&paths.sync_log, settings.sync_log_limit)
                .context("Failed to open sync log")?;
            let lines = log.tail(count)?;
            if lines.is_empty() {
                println!("{}", "No sync activity yet.".yellow());
            }
            for line in &lines {
                let (stamp, message) = split_sync_line(line);
                let message = if message.starts_with(FAIL_PREFIX) {
                    message.red()
                } else {
                    message.green()
                };
                println!("{} {}", stamp.dimmed(), message);
            }
        }
        LogKind::Changes => {
            let log = ChangeLog::open(&paths.change_log, settings.change_log_limit)
                .context("Failed to open change log")?;
            let events = log.recent(count)?;
            if events.is_empty() {
                println!("{}", "No recorded changes.".yellow());
            }
            for event in &events {
                let action = match event.action {
                    ChangeAction::Create => event.action.as_str().green(),
                    ChangeAction::Modify => event.action.as_str().cyan(),
                    ChangeAction::Delete => event.action.as_str().red(),
                    ChangeAction::Rename => event.action.as_str().yellow(),
                    _ => event.action.as_str().bold(),
                };
                let stamp = event.timestamp.format("%Y-%m-%d %H:%M:%S").to_string();
                match &event.old_path {
                    Some(old) => println!("{} {action} {} <- {old}", stamp.dimmed(), event.path),
                    None => println!("{} {action} {}", stamp.dimmed(), event.path),
                }
            }
        }
    }
    Ok(())
}
