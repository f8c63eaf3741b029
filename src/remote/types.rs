use anyhow::{Context, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

/// Commit as returned by the commits endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteCommit {
    pub id: String,
    #[serde(default)]
    pub short_id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub author_name: String,
    pub committed_date: DateTime<FixedOffset>,
}

/// Per-file change flags of a commit diff
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileDiff {
    pub old_path: String,
    pub new_path: String,
    #[serde(default)]
    pub new_file: bool,
    #[serde(default)]
    pub renamed_file: bool,
    #[serde(default)]
    pub deleted_file: bool,
}

/// What a diff entry means for the local copy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiffKind {
    /// New or modified: overwrite with remote content
    Write,
    /// Move `old_path` to `new_path` without re-fetching content
    Rename,
    Delete,
}

impl FileDiff {
    pub fn kind(&self) -> DiffKind {
        if self.deleted_file {
            DiffKind::Delete
        } else if self.renamed_file {
            DiffKind::Rename
        } else {
            DiffKind::Write
        }
    }
}

/// One entry of a repository tree listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeEntry {
    pub id: String,
    pub path: String,
    pub is_dir: bool,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawTreeEntry {
    pub id: String,
    pub path: String,
    #[serde(rename = "type")]
    pub kind: String,
}

impl From<RawTreeEntry> for TreeEntry {
    fn from(raw: RawTreeEntry) -> Self {
        Self {
            is_dir: raw.kind == "tree",
            id: raw.id,
            path: raw.path,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawBranch {
    pub name: String,
}

/// File payload from the files endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteFile {
    pub file_path: String,
    #[serde(default)]
    pub encoding: String,
    pub content: String,
    #[serde(default)]
    pub last_commit_id: Option<String>,
}

impl RemoteFile {
    /// Decoded file bytes
    pub fn bytes(&self) -> Result<Vec<u8>> {
        let compact: String = self.content.split_whitespace().collect();
        STANDARD
            .decode(compact)
            .with_context(|| format!("Invalid base64 content for {}", self.file_path))
    }
}

/// Overrides for the commit written by a file operation
#[derive(Debug, Clone, Default)]
pub struct CommitOptions {
    pub branch: Option<String>,
    pub author_email: Option<String>,
    pub author_name: Option<String>,
    pub commit_message: Option<String>,
}

impl CommitOptions {
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            commit_message: Some(message.into()),
            ..Default::default()
        }
    }
}
