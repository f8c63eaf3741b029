use anyhow::{anyhow, Context, Result};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

/// Fraction of the limit that triggers rotation
const ROTATE_THRESHOLD: f64 = 0.9;

/// Append-only, line-oriented record file with tail-keeping rotation
///
/// The mutex guards the live record count and serializes physical appends
/// coming from independent event sources.
#[derive(Debug)]
pub struct LineStore {
    path: PathBuf,
    limit: usize,
    keep_ratio: f64,
    count: Mutex<usize>,
}

impl LineStore {
    /// Open (or lazily create) a store at `path`
    ///
    /// Once the record count exceeds 90% of `limit`, the file is rewritten with
    /// only the newest `keep_ratio * limit` records.
    pub fn open(path: impl Into<PathBuf>, limit: usize, keep_ratio: f64) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create log directory: {}", parent.display())
            })?;
        }

        let count = read_records(&path)?.len();
        Ok(Self {
            path,
            limit,
            keep_ratio,
            count: Mutex::new(count),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Number of live records
    pub fn len(&self) -> usize {
        self.lock().map(|c| *c).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> Result<MutexGuard<'_, usize>> {
        self.count
            .lock()
            .map_err(|_| anyhow!("Log store lock poisoned: {}", self.path.display()))
    }

    /// Append one record, rotating afterwards if the limit was crossed
    pub fn append(&self, record: &str) -> Result<()> {
        let mut count = self.lock()?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("Failed to open log file: {}", self.path.display()))?;
        writeln!(file, "{record}")
            .with_context(|| format!("Failed to append to {}", self.path.display()))?;

        *count += 1;
        self.check_limit(&mut count)
    }

    fn check_limit(&self, count: &mut usize) -> Result<()> {
        if (*count as f64) <= ROTATE_THRESHOLD * self.limit as f64 {
            return Ok(());
        }

        let keep = (self.keep_ratio * self.limit as f64).round() as usize;
        let records = read_records(&self.path)?;
        let tail = &records[records.len().saturating_sub(keep)..];
        write_records(&self.path, tail)?;

        log::debug!(
            "Rotated {} from {} to {} records",
            self.path.display(),
            records.len(),
            tail.len()
        );
        *count = tail.len();
        Ok(())
    }

    /// All records, oldest first
    pub fn records(&self) -> Result<Vec<String>> {
        let _guard = self.lock()?;
        read_records(&self.path)
    }

    /// Return up to `count` records starting at `start`
    ///
    /// A negative `start` counts back from the end; `count = None` reads to the end.
    pub fn lines_by_index(&self, start: isize, count: Option<usize>) -> Result<Vec<String>> {
        let records = self.records()?;
        let len = records.len();

        let start = if start < 0 {
            len.saturating_sub(start.unsigned_abs())
        } else {
            start as usize
        };
        if start > len {
            return Ok(Vec::new());
        }
        let end = match count {
            Some(n) => start.saturating_add(n).min(len),
            None => len,
        };

        Ok(records[start..end].to_vec())
    }

    /// Collect records from the newest backwards until `count` records
    /// containing `phrase` have been passed
    ///
    /// Matching records are kept only when `include_phrase` is set. The result
    /// is newest-first when `reverse` is true, oldest-first otherwise. A `count`
    /// of zero scans the whole file.
    pub fn lines_to_phrase(
        &self,
        phrase: &str,
        count: usize,
        include_phrase: bool,
        reverse: bool,
    ) -> Result<Vec<String>> {
        let records = self.records()?;
        let mut remaining = count;
        let mut collected = Vec::new();

        for record in records.into_iter().rev() {
            if record.contains(phrase) {
                if include_phrase {
                    collected.push(record);
                }
                remaining = remaining.saturating_sub(1);
                if count > 0 && remaining == 0 {
                    break;
                }
            } else {
                collected.push(record);
            }
        }

        if !reverse {
            collected.reverse();
        }
        Ok(collected)
    }

    /// Truncate to empty
    pub fn clear(&self) -> Result<()> {
        let mut count = self.lock()?;
        write_records(&self.path, &[])?;
        *count = 0;
        Ok(())
    }
}

fn read_records(path: &Path) -> Result<Vec<String>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read log file: {}", path.display()))?;
    Ok(content
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(String::from)
        .collect())
}

fn write_records(path: &Path, records: &[String]) -> Result<()> {
    let mut content = records.join("\n");
    if !content.is_empty() {
        content.push('\n');
    }
    fs::write(path, content).with_context(|| format!("Failed to write log file: {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use tempfile::TempDir;

    fn store_with(dir: &TempDir, records: usize, limit: usize, keep: f64) -> LineStore {
        let store = LineStore::open(dir.path().join("test.log"), limit, keep).unwrap();
        for i in 0..records {
            store.append(&format!("record {i}")).unwrap();
        }
        store
    }

    #[test]
    fn test_open_counts_existing_records() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("test.log");
        fs::write(&path, "a\n\nb\nc\n").unwrap();

        let store = LineStore::open(&path, 100, 0.3).unwrap();
        assert_eq!(store.len(), 3);
    }

    #[rstest]
    #[case::change_log(0.3, 30)]
    #[case::sync_log(0.1, 10)]
    fn test_rotation_keeps_tail_in_order(#[case] keep: f64, #[case] expected: usize) {
        let dir = TempDir::new().unwrap();
        let store = store_with(&dir, 90, 100, keep);
        assert_eq!(store.len(), 90, "at the threshold nothing rotates");

        store.append("record 90").unwrap();

        let records = store.records().unwrap();
        assert_eq!(records.len(), expected);
        assert_eq!(store.len(), expected);
        let first = 91 - expected;
        let want: Vec<String> = (first..91).map(|i| format!("record {i}")).collect();
        assert_eq!(records, want);
    }

    #[test]
    fn test_lines_by_index() {
        let dir = TempDir::new().unwrap();
        let store = store_with(&dir, 5, 100, 0.3);

        assert_eq!(store.lines_by_index(1, Some(2)).unwrap(), vec!["record 1", "record 2"]);
        assert_eq!(store.lines_by_index(-2, None).unwrap(), vec!["record 3", "record 4"]);
        assert_eq!(store.lines_by_index(-200, None).unwrap().len(), 5);
        assert_eq!(store.lines_by_index(3, Some(10)).unwrap().len(), 2);
        assert!(store.lines_by_index(9, None).unwrap().is_empty());
    }

    #[test]
    fn test_lines_to_phrase_stops_at_nth_marker() {
        let dir = TempDir::new().unwrap();
        let store = LineStore::open(dir.path().join("t.log"), 100, 0.3).unwrap();
        for line in ["a", "MARK 1", "b", "c", "MARK 2", "d", "e"] {
            store.append(line).unwrap();
        }

        assert_eq!(store.lines_to_phrase("MARK", 1, false, false).unwrap(), vec!["d", "e"]);
        assert_eq!(store.lines_to_phrase("MARK", 1, false, true).unwrap(), vec!["e", "d"]);
        assert_eq!(
            store.lines_to_phrase("MARK", 2, true, false).unwrap(),
            vec!["MARK 1", "b", "c", "MARK 2", "d", "e"]
        );
        assert_eq!(store.lines_to_phrase("NOPE", 1, false, false).unwrap().len(), 7);
    }

    #[test]
    fn test_clear_truncates() {
        let dir = TempDir::new().unwrap();
        let store = store_with(&dir, 4, 100, 0.3);
        store.clear().unwrap();

        assert!(store.is_empty());
        assert!(store.records().unwrap().is_empty());
        store.append("fresh").unwrap();
        assert_eq!(store.records().unwrap(), vec!["fresh"]);
    }
}
