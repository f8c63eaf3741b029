//! # gitlab-vault-sync
//!
//! A command-line tool for keeping a local directory of notes (the *vault*)
//! in sync with a GitLab repository through the repository files REST API.
//!
//! ## Overview
//!
//! Local file-system events are recorded in a durable change log. A push
//! reads back every event since the last boundary marker, collapses them into
//! one net operation per path and sends those operations to GitLab as
//! individual commits. A pull lists the commits made since the stored
//! checkpoint and replays their diffs onto the vault.
//!
//! ## Key Features
//!
//! - **Minimal remote writes**: a create followed by edits becomes one create carrying the final content
//! - **Ordered execution**: every remote call runs on a single worker in submission order
//! - **Failure tolerant**: create and modify fall back to each other once; failures land in the sync log
//! - **Monotonic checkpoint**: the last seen commit only moves forward, per project
//! - **Cross-platform**: Supports Linux, macOS, and Windows with platform-specific config directories
//!
//! ## Architecture
//!
//! - Configuration and settings ([`config`], [`settings`])
//! - Durable logs and the commit checkpoint ([`journal`], [`checkpoint`])
//! - Change collapsing ([`reconcile`])
//! - Serial execution ([`queue`])
//! - GitLab REST adapter ([`remote`])
//! - Local file access and user feedback ([`vault`], [`notify`], [`logger`])
//! - Push and pull orchestration ([`sync`])
//! - Command handlers and first-run setup ([`handlers`], [`onboarding`])

/// Persisted pointer to the newest remote commit accounted for.
///
/// Checkpoints are namespaced per project and only ever move forward in
/// commit date.
pub mod checkpoint;

/// Platform-agnostic configuration directory management.
///
/// Provides utilities for locating and managing configuration files and directories
/// following platform conventions (XDG on Linux, Application Support on macOS,
/// AppData on Windows).
pub mod config;

/// Command handlers used by the binary.
pub mod handlers;

/// Change log and sync log.
///
/// Bounded line-oriented stores with size-triggered rotation. The change log
/// records local events and the boundary markers written by push and pull;
/// the sync log records the outcome of every remote operation.
pub mod journal;

/// Logging configuration and utilities.
///
/// Sets up dual logging to both console (configurable via `RUST_LOG` environment
/// variable) and a persistent log file in the config directory. Includes automatic
/// log rotation when files exceed size limits.
pub mod logger;

/// Transient user notifications.
pub mod notify;

/// Interactive onboarding flow for first-time setup.
///
/// Collects the GitLab endpoint, repository, branch, commit author and vault
/// location through terminal prompts and validates them before saving.
pub mod onboarding;

/// Single-worker FIFO task queue with failure containment.
pub mod queue;

/// Collapse of a change window into one net operation per path.
pub mod reconcile;

/// GitLab repository API adapter.
///
/// Maps create, modify, delete and read onto the files endpoint (with
/// create/modify fallback), and exposes the tree, commits, diff and branches
/// listings through a pagination helper.
pub mod remote;

/// Persisted user settings (`settings.toml`).
pub mod settings;

/// Core synchronization logic.
///
/// Implements the main sync operations:
/// - **Push**: reconciles recorded changes and schedules one remote operation per path
/// - **Pull**: replays remote commit diffs onto the vault, oldest first
/// - **Transfer**: whole-vault upload, repository download, per-path send/load/remove
pub mod sync;

/// Filesystem capability the engine reads from and writes to.
pub mod vault;
