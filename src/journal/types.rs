use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Prefix shared by both boundary markers
pub const BOUNDARY_PHRASE: &str = "LOCAL_CHANGES";

/// Action recorded for a single change-log line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChangeAction {
    /// File was created locally
    Create,
    /// File content changed locally
    Modify,
    /// File was removed locally
    Delete,
    /// File moved from `old_path` to `path`
    Rename,
    /// Boundary written after a push cycle
    LocalChangesPushed,
    /// Boundary written after a pull cycle
    LocalChangesPulled,
}

impl ChangeAction {
    /// Returns the on-disk representation
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeAction::Create => "CREATE",
            ChangeAction::Modify => "MODIFY",
            ChangeAction::Delete => "DELETE",
            ChangeAction::Rename => "RENAME",
            ChangeAction::LocalChangesPushed => "LOCAL_CHANGES_PUSHED",
            ChangeAction::LocalChangesPulled => "LOCAL_CHANGES_PULLED",
        }
    }

    /// Whether this action delimits a reconciliation window
    pub fn is_boundary(&self) -> bool {
        matches!(
            self,
            ChangeAction::LocalChangesPushed | ChangeAction::LocalChangesPulled
        )
    }
}

impl fmt::Display for ChangeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChangeAction {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        Ok(match s {
            "CREATE" => ChangeAction::Create,
            "MODIFY" => ChangeAction::Modify,
            "DELETE" => ChangeAction::Delete,
            "RENAME" => ChangeAction::Rename,
            "LOCAL_CHANGES_PUSHED" => ChangeAction::LocalChangesPushed,
            "LOCAL_CHANGES_PULLED" => ChangeAction::LocalChangesPulled,
            other => bail!("Unknown change action '{other}'"),
        })
    }
}
