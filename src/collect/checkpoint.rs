//! Append-only checkpoint log for crash-safe resume.
//!
//! One self-describing JSON record per line. Complete lines are always valid
//! JSON; a partial trailing line from a crash mid-write is skipped on load
//! rather than failing the whole run. The file is only ever appended to —
//! truncation is an explicit operator action, never part of normal operation.

use super::github::RecordBundle;
use crate::Result;
use ohno::IntoAppError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

const LOG_TARGET: &str = "checkpoint";

/// Terminal status of one work unit within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    Done,
    Skipped,
    Errored,
}

/// One checkpoint entry: the terminal outcome of one repository.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointRecord {
    pub repo_full_name: String,
    pub status: RecordStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub records: Option<RecordBundle>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CheckpointRecord {
    #[must_use]
    pub fn done(repo_full_name: String, records: RecordBundle) -> Self {
        Self {
            repo_full_name,
            status: RecordStatus::Done,
            records: Some(records),
            reason: None,
            error: None,
        }
    }

    #[must_use]
    pub fn skipped(repo_full_name: String, reason: String) -> Self {
        Self {
            repo_full_name,
            status: RecordStatus::Skipped,
            records: None,
            reason: Some(reason),
            error: None,
        }
    }

    #[must_use]
    pub fn errored(repo_full_name: String, error: String) -> Self {
        Self {
            repo_full_name,
            status: RecordStatus::Errored,
            records: None,
            reason: None,
            error: Some(error),
        }
    }
}

/// The append-only record store keyed by repository full name.
///
/// Opening the log is the run's writability check: if the file cannot be
/// created or opened for append, the whole run is impossible and fails
/// immediately. Appends are serialized behind a mutex so records from
/// concurrent workers never interleave.
#[derive(Debug)]
pub struct CheckpointLog {
    path: PathBuf,
    file: Mutex<File>,
}

impl CheckpointLog {
    /// Open (creating if necessary) the checkpoint log at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)
                .into_app_err_with(|| format!("unable to create checkpoint directory '{}'", parent.display()))?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .into_app_err_with(|| format!("unable to open checkpoint log '{}'", path.display()))?;

        // A torn trailing line from a crash mid-write would otherwise glue
        // itself to the next append; start appends on a fresh line instead.
        if !ends_with_newline(path)? {
            log::debug!(target: LOG_TARGET, "checkpoint log '{}' has a torn trailing line", path.display());
            writeln!(file).into_app_err_with(|| format!("unable to repair checkpoint log '{}'", path.display()))?;
        }

        Ok(Self {
            path: path.to_path_buf(),
            file: Mutex::new(file),
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record as a single atomic line.
    pub fn append(&self, record: &CheckpointRecord) -> Result<()> {
        let line = serde_json::to_string(record)
            .into_app_err_with(|| format!("unable to serialize checkpoint record for '{}'", record.repo_full_name))?;

        let mut file = self.file.lock().expect("lock not poisoned");
        writeln!(file, "{line}").into_app_err_with(|| format!("unable to append to checkpoint log '{}'", self.path.display()))?;
        file.flush()
            .into_app_err_with(|| format!("unable to flush checkpoint log '{}'", self.path.display()))
    }

    /// The set of unit ids that already have a record of any status.
    ///
    /// With `retry_failed`, errored units are excluded from the set so a
    /// rerun attempts them again — an explicit operator choice, not the
    /// default.
    pub fn load_done_ids(&self, retry_failed: bool) -> Result<HashSet<String>> {
        let mut done = HashSet::new();
        for record in self.load_all()? {
            if retry_failed && record.status == RecordStatus::Errored {
                continue;
            }
            let _ = done.insert(record.repo_full_name);
        }
        Ok(done)
    }

    /// Load every well-formed record, in file order.
    pub fn load_all(&self) -> Result<Vec<CheckpointRecord>> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(e).into_app_err_with(|| format!("unable to read checkpoint log '{}'", self.path.display()));
            }
        };

        let mut records = Vec::new();
        for line in BufReader::new(file).lines() {
            let line = line.into_app_err_with(|| format!("unable to read checkpoint log '{}'", self.path.display()))?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match serde_json::from_str::<CheckpointRecord>(line) {
                Ok(record) => records.push(record),
                Err(e) => {
                    // Most likely a partial trailing line from a crash mid-write.
                    log::debug!(target: LOG_TARGET, "skipping malformed checkpoint line: {e:#}");
                }
            }
        }

        Ok(records)
    }
}

/// Whether the file is empty or ends with a newline.
fn ends_with_newline(path: &Path) -> Result<bool> {
    use std::io::{Read, Seek, SeekFrom};

    let mut file = File::open(path).into_app_err_with(|| format!("unable to read checkpoint log '{}'", path.display()))?;
    let len = file
        .metadata()
        .into_app_err_with(|| format!("unable to stat checkpoint log '{}'", path.display()))?
        .len();
    if len == 0 {
        return Ok(true);
    }

    let _ = file
        .seek(SeekFrom::End(-1))
        .into_app_err_with(|| format!("unable to seek in checkpoint log '{}'", path.display()))?;
    let mut last = [0_u8; 1];
    file.read_exact(&mut last)
        .into_app_err_with(|| format!("unable to read checkpoint log '{}'", path.display()))?;

    Ok(last[0] == b'\n')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collect::github::RepoMetaRow;
    use std::io::Write as _;

    fn bundle(name: &str) -> RecordBundle {
        RecordBundle {
            meta: RepoMetaRow {
                repo_full_name: name.to_string(),
                stars: Some(5),
                ..RepoMetaRow::default()
            },
            pulls: Vec::new(),
            bugs: Vec::new(),
            contributors: Vec::new(),
        }
    }

    #[test]
    fn test_append_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let log = CheckpointLog::open(dir.path().join("checkpoint.jsonl")).unwrap();

        log.append(&CheckpointRecord::done("alpha/one".to_string(), bundle("alpha/one"))).unwrap();
        log.append(&CheckpointRecord::skipped("alpha/two".to_string(), "archived_or_fork".to_string()))
            .unwrap();
        log.append(&CheckpointRecord::errored("alpha/three".to_string(), "repository not found".to_string()))
            .unwrap();

        let records = log.load_all().unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].status, RecordStatus::Done);
        assert!(records[0].records.is_some());
        assert_eq!(records[1].reason.as_deref(), Some("archived_or_fork"));
        assert_eq!(records[2].error.as_deref(), Some("repository not found"));
    }

    #[test]
    fn test_done_ids_include_every_status() {
        let dir = tempfile::tempdir().unwrap();
        let log = CheckpointLog::open(dir.path().join("checkpoint.jsonl")).unwrap();

        log.append(&CheckpointRecord::done("a/done".to_string(), bundle("a/done"))).unwrap();
        log.append(&CheckpointRecord::skipped("a/skipped".to_string(), "archived_or_fork".to_string()))
            .unwrap();
        log.append(&CheckpointRecord::errored("a/errored".to_string(), "boom".to_string())).unwrap();

        let done = log.load_done_ids(false).unwrap();
        assert_eq!(done.len(), 3);
        assert!(done.contains("a/errored"));
    }

    #[test]
    fn test_retry_failed_excludes_errored_units() {
        let dir = tempfile::tempdir().unwrap();
        let log = CheckpointLog::open(dir.path().join("checkpoint.jsonl")).unwrap();

        log.append(&CheckpointRecord::done("a/done".to_string(), bundle("a/done"))).unwrap();
        log.append(&CheckpointRecord::errored("a/errored".to_string(), "boom".to_string())).unwrap();

        let done = log.load_done_ids(true).unwrap();
        assert!(done.contains("a/done"));
        assert!(!done.contains("a/errored"));
    }

    #[test]
    fn test_malformed_trailing_line_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("checkpoint.jsonl");
        let log = CheckpointLog::open(&path).unwrap();

        log.append(&CheckpointRecord::done("a/one".to_string(), bundle("a/one"))).unwrap();

        // Simulate a crash mid-write: a truncated record on the last line.
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        write!(file, "{{\"repo_full_name\": \"a/tw").unwrap();
        drop(file);

        let records = log.load_all().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].repo_full_name, "a/one");

        // Reopening repairs the torn line so new appends land on a fresh line.
        let log = CheckpointLog::open(&path).unwrap();
        log.append(&CheckpointRecord::errored("a/three".to_string(), "x".to_string())).unwrap();
        let done = log.load_done_ids(false).unwrap();
        assert!(done.contains("a/one"));
        assert!(done.contains("a/three"));
    }

    #[test]
    fn test_load_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("checkpoint.jsonl");
        let log = CheckpointLog::open(&path).unwrap();

        std::fs::remove_file(&path).unwrap();
        assert!(log.load_all().unwrap().is_empty());
        assert!(log.load_done_ids(false).unwrap().is_empty());
    }

    #[test]
    fn test_open_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("deep").join("nested").join("checkpoint.jsonl");
        let _ = CheckpointLog::open(&path).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_record_serializes_compact_single_line() {
        let record = CheckpointRecord::done("a/one".to_string(), bundle("a/one"));
        let line = serde_json::to_string(&record).unwrap();
        assert!(!line.contains('\n'));
    }
}
