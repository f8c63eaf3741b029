use anyhow::{bail, Context, Result};
use chrono::{DateTime, FixedOffset, Local};

use super::types::ChangeAction;

const FIELD_DELIMITER: char = '\t';
const NO_OLD_PATH: &str = "null";

/// A single file-system event as stored in the change log
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEvent {
    pub timestamp: DateTime<FixedOffset>,
    pub action: ChangeAction,
    pub path: String,
    /// Only set for [`ChangeAction::Rename`]
    pub old_path: Option<String>,
}

impl ChangeEvent {
    /// Create an event stamped with the current local time
    pub fn now(action: ChangeAction, path: impl Into<String>, old_path: Option<String>) -> Self {
        let old_path = if action == ChangeAction::Rename {
            old_path
        } else {
            None
        };
        Self {
            timestamp: Local::now().fixed_offset(),
            action,
            path: path.into(),
            old_path,
        }
    }

    /// Serialize as `[timestamp]\tACTION\tpath\told_path`
    pub fn to_line(&self) -> String {
        format!(
            "[{}]{d}{}{d}{}{d}{}",
            self.timestamp.to_rfc3339(),
            self.action,
            self.path,
            self.old_path.as_deref().unwrap_or(NO_OLD_PATH),
            d = FIELD_DELIMITER
        )
    }

    /// Parse one change-log line
    pub fn parse(line: &str) -> Result<Self> {
        let mut fields = line.trim_end_matches(['\r', '\n']).splitn(4, FIELD_DELIMITER);

        let raw_time = fields.next().unwrap_or_default();
        let raw_time = raw_time
            .strip_prefix('[')
            .and_then(|t| t.strip_suffix(']'))
            .with_context(|| format!("Malformed timestamp field in '{line}'"))?;
        let timestamp = DateTime::parse_from_rfc3339(raw_time)
            .with_context(|| format!("Invalid timestamp '{raw_time}'"))?;

        let action: ChangeAction = fields
            .next()
            .context("Missing action field")?
            .parse()?;

        let path = fields.next().context("Missing path field")?.to_string();
        if path.is_empty() {
            bail!("Empty path in '{line}'");
        }

        let old_path = match fields.next() {
            None | Some(NO_OLD_PATH) | Some("") => None,
            Some(p) => Some(p.to_string()),
        };

        Ok(Self {
            timestamp,
            action,
            path,
            old_path,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::create(ChangeAction::Create, "notes/a.md", None)]
    #[case::modify(ChangeAction::Modify, "a b/c.d.md", None)]
    #[case::delete(ChangeAction::Delete, "x.md", None)]
    #[case::rename(ChangeAction::Rename, "new/b.md", Some("old/a.md"))]
    #[case::marker(ChangeAction::LocalChangesPushed, "3 changes", None)]
    fn test_line_roundtrip(
        #[case] action: ChangeAction,
        #[case] path: &str,
        #[case] old_path: Option<&str>,
    ) {
        let event = ChangeEvent::now(action, path, old_path.map(String::from));
        let parsed = ChangeEvent::parse(&event.to_line()).unwrap();

        assert_eq!(parsed.action, action);
        assert_eq!(parsed.path, path);
        assert_eq!(parsed.old_path.as_deref(), old_path);
        assert_eq!(parsed.timestamp, event.timestamp);
    }

    #[test]
    fn test_old_path_dropped_for_non_rename() {
        let event = ChangeEvent::now(ChangeAction::Modify, "a.md", Some("b.md".into()));
        assert!(event.old_path.is_none());
        assert!(event.to_line().ends_with("\tnull"));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(ChangeEvent::parse("").is_err());
        assert!(ChangeEvent::parse("not a record").is_err());
        assert!(ChangeEvent::parse("[2024-01-01T00:00:00+00:00]\tTOUCH\ta.md\tnull").is_err());
        assert!(ChangeEvent::parse("[2024-01-01T00:00:00+00:00]\tCREATE").is_err());
    }

    #[test]
    fn test_parse_accepts_missing_old_path_field() {
        let parsed = ChangeEvent::parse("[2024-01-01T00:00:00+00:00]\tDELETE\ta.md").unwrap();
        assert_eq!(parsed.action, ChangeAction::Delete);
        assert!(parsed.old_path.is_none());
    }
}
