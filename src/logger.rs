use anyhow::{Context, Result};
use log::LevelFilter;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

use crate::config::ConfigManager;

/// Size at which the app log is moved to `.log.old`
const MAX_LOG_SIZE: u64 = 10 * 1024 * 1024;

/// Crates whose debug output drowns the adapter's own request log
const NOISY_MODULES: [&str; 3] = ["reqwest", "hyper_util", "rustls"];

/// Initialize the logging system
///
/// Console output goes to stderr so command summaries on stdout stay clean.
/// The level comes from `RUST_LOG` (default `info`); the HTTP stack is capped
/// at `warn` unless `RUST_LOG` names it explicitly.
///
/// ```bash
/// # Show every request the adapter makes
/// RUST_LOG=debug gitlab-vault-sync push
///
/// # Quiet console, cycle summaries still reach the log file
/// RUST_LOG=off gitlab-vault-sync pull
/// ```
pub fn init_logger() -> Result<()> {
    ConfigManager::ensure_config_dir()?;

    let spec = std::env::var("RUST_LOG").ok();
    let level = spec
        .as_deref()
        .and_then(|s| s.parse::<LevelFilter>().ok())
        .unwrap_or(LevelFilter::Info);

    let mut builder = env_logger::Builder::new();
    builder
        .format(|buf, record| {
            writeln!(
                buf,
                "{} [{:5}] {}",
                chrono::Local::now().format("%H:%M:%S"),
                record.level(),
                record.args()
            )
        })
        .filter_level(level)
        .target(env_logger::Target::Stderr);
    for module in NOISY_MODULES {
        builder.filter_module(module, level.min(LevelFilter::Warn));
    }
    if let Some(spec) = &spec {
        builder.parse_filters(spec);
    }
    // A second init (tests, embedding) keeps the first logger
    builder.try_init().ok();

    rotate_log_if_needed()?;
    log_to_file(&format!("Logger initialized with level: {level:?}"))
}

/// Append one line to the app log in the config directory
pub fn log_to_file(message: &str) -> Result<()> {
    append_line(&ConfigManager::log_file_path()?, message)
}

/// Record the outcome of a push, pull or transfer command in the app log
pub fn log_cycle(command: &str, detail: &str) -> Result<()> {
    log::info!("{command}: {detail}");
    log_to_file(&format!("{command}: {detail}"))
}

fn append_line(path: &Path, message: &str) -> Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open log file: {}", path.display()))?;

    writeln!(
        file,
        "[{}] {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
        message
    )
    .with_context(|| format!("Failed to write log file: {}", path.display()))
}

/// Move the app log aside once it exceeds 10MB, replacing any older backup
pub fn rotate_log_if_needed() -> Result<()> {
    let log_path = ConfigManager::log_file_path()?;
    let Ok(metadata) = std::fs::metadata(&log_path) else {
        return Ok(());
    };
    if metadata.len() <= MAX_LOG_SIZE {
        return Ok(());
    }

    let backup = log_path.with_extension("log.old");
    if backup.exists() {
        std::fs::remove_file(&backup)
            .with_context(|| format!("Failed to remove {}", backup.display()))?;
    }
    std::fs::rename(&log_path, &backup)
        .with_context(|| format!("Failed to rotate {}", log_path.display()))?;
    log::info!("Log file rotated to {}", backup.display());
    Ok(())
}
