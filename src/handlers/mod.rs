//! Command handler modules
//!
//! This module contains the command handler functions behind main.rs,
//! organized by functionality area.

pub mod branches;
pub mod config;
pub mod download;
pub mod logs;
pub mod onboarding;
pub mod record;

// Re-export all public handler functions for convenient use
pub use branches::handle_branches;
pub use config::handle_config;
pub use download::handle_download;
pub use logs::{handle_log, LogKind};
pub use onboarding::{is_initialized, run_onboarding_flow};
pub use record::handle_record;

/// Check if we're running in an interactive terminal
pub fn is_interactive() -> bool {
    atty::is(atty::Stream::Stdin) && atty::is(atty::Stream::Stdout)
}
