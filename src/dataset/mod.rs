//! Aggregate dataset rebuild
//!
//! The output tables are always reconstructed from the complete checkpoint
//! log, never from in-memory accumulation of the current run's results, so a
//! resumed run produces a dataset identical in content to a single
//! uninterrupted pass.

use crate::Result;
use crate::collect::github::{BugIssueRow, ContributorRow, PullRequestRow, RecordBundle, RepoMetaRow};
use crate::collect::{CheckpointRecord, RecordStatus};
use ohno::IntoAppError;
use serde::Serialize;
use std::fs;
use std::path::Path;

const LOG_TARGET: &str = "   dataset";

pub const REPO_META_FILE: &str = "repo_meta.csv";
pub const PULL_REQUESTS_FILE: &str = "pull_requests.csv";
pub const BUG_ISSUES_FILE: &str = "bug_issues.csv";
pub const CONTRIBUTORS_FILE: &str = "contributors.csv";

/// The full rebuilt set of flat records, in checkpoint-log order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    pub meta: Vec<RepoMetaRow>,
    pub pulls: Vec<PullRequestRow>,
    pub bugs: Vec<BugIssueRow>,
    pub contributors: Vec<ContributorRow>,
}

impl Dataset {
    /// Rebuild the aggregate output from checkpoint records.
    ///
    /// Done units contribute their bundles; errored units contribute one
    /// inspectable metadata row carrying the recorded reason; skipped units
    /// contribute no rows to any table.
    #[must_use]
    pub fn rebuild(records: impl IntoIterator<Item = CheckpointRecord>) -> Self {
        let mut dataset = Self::default();

        for record in records {
            match record.status {
                RecordStatus::Done => {
                    if let Some(bundle) = record.records {
                        dataset.push_bundle(bundle);
                    }
                }
                RecordStatus::Errored => {
                    dataset
                        .meta
                        .push(RepoMetaRow::errored(record.repo_full_name, record.error.unwrap_or_default()));
                }
                RecordStatus::Skipped => {}
            }
        }

        dataset
    }

    fn push_bundle(&mut self, bundle: RecordBundle) {
        self.meta.push(bundle.meta);
        self.pulls.extend(bundle.pulls);
        self.bugs.extend(bundle.bugs);
        self.contributors.extend(bundle.contributors);
    }

    /// Write the output tables under `outdir`.
    ///
    /// The metadata table is always written; child tables only when they
    /// have rows.
    pub fn write_csv(&self, outdir: impl AsRef<Path>) -> Result<()> {
        let outdir = outdir.as_ref();

        write_table(&self.meta, &outdir.join(REPO_META_FILE))?;
        log::info!(target: LOG_TARGET, "{}: {} row(s)", REPO_META_FILE, self.meta.len());

        for (rows_written, name) in [
            (write_table_if_nonempty(&self.pulls, &outdir.join(PULL_REQUESTS_FILE))?, PULL_REQUESTS_FILE),
            (write_table_if_nonempty(&self.bugs, &outdir.join(BUG_ISSUES_FILE))?, BUG_ISSUES_FILE),
            (
                write_table_if_nonempty(&self.contributors, &outdir.join(CONTRIBUTORS_FILE))?,
                CONTRIBUTORS_FILE,
            ),
        ] {
            if rows_written > 0 {
                log::info!(target: LOG_TARGET, "{name}: {rows_written} row(s)");
            }
        }

        Ok(())
    }
}

/// Serialize rows into one CSV file, creating parent directories as needed.
pub fn write_table<T: Serialize>(rows: &[T], path: &Path) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).into_app_err_with(|| format!("unable to create output directory '{}'", parent.display()))?;
    }

    let file = fs::File::create(path).into_app_err_with(|| format!("unable to create output file '{}'", path.display()))?;
    let mut writer = csv::Writer::from_writer(file);

    for row in rows {
        writer
            .serialize(row)
            .into_app_err_with(|| format!("unable to write row to '{}'", path.display()))?;
    }

    writer
        .flush()
        .into_app_err_with(|| format!("unable to flush output file '{}'", path.display()))
}

fn write_table_if_nonempty<T: Serialize>(rows: &[T], path: &Path) -> Result<usize> {
    if rows.is_empty() {
        return Ok(0);
    }
    write_table(rows, path)?;
    Ok(rows.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn done_record(name: &str, pulls: usize) -> CheckpointRecord {
        let bundle = RecordBundle {
            meta: RepoMetaRow {
                repo_full_name: name.to_string(),
                stars: Some(1),
                ..RepoMetaRow::default()
            },
            pulls: (0..pulls)
                .map(|i| PullRequestRow {
                    repo_full_name: name.to_string(),
                    pr_number: Some(i64::try_from(i).unwrap()),
                    pr_created_at: None,
                    pr_closed_at: None,
                    pr_merged_at: None,
                    first_review_at: None,
                    review_count: 0,
                    author_association: None,
                    latency_first_review_hours: None,
                    latency_merge_hours: None,
                })
                .collect(),
            bugs: Vec::new(),
            contributors: Vec::new(),
        };
        CheckpointRecord::done(name.to_string(), bundle)
    }

    #[test]
    fn test_rebuild_from_mixed_records() {
        let records = vec![
            done_record("a/one", 2),
            CheckpointRecord::skipped("a/two".to_string(), "archived_or_fork".to_string()),
            CheckpointRecord::errored("a/three".to_string(), "repository not found".to_string()),
        ];

        let dataset = Dataset::rebuild(records);

        // One collected metadata row plus one inspectable error row.
        assert_eq!(dataset.meta.len(), 2);
        assert_eq!(dataset.pulls.len(), 2);
        assert!(dataset.bugs.is_empty());

        let errored = &dataset.meta[1];
        assert_eq!(errored.repo_full_name, "a/three");
        assert_eq!(errored.error.as_deref(), Some("repository not found"));
        assert!(errored.stars.is_none());
    }

    #[test]
    fn test_skipped_units_contribute_no_rows() {
        let records = vec![CheckpointRecord::skipped("a/two".to_string(), "archived_or_fork".to_string())];
        let dataset = Dataset::rebuild(records);
        assert!(dataset.meta.is_empty());
        assert!(dataset.pulls.is_empty());
        assert!(dataset.contributors.is_empty());
    }

    #[test]
    fn test_rebuild_is_idempotent() {
        let records = vec![done_record("a/one", 3), done_record("b/two", 1)];
        let first = Dataset::rebuild(records.clone());
        let second = Dataset::rebuild(records);
        assert_eq!(first, second);
    }

    #[test]
    fn test_write_csv_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let dataset = Dataset::rebuild(vec![done_record("a/one", 1)]);

        dataset.write_csv(dir.path()).unwrap();

        let meta = fs::read_to_string(dir.path().join(REPO_META_FILE)).unwrap();
        assert!(meta.starts_with("repo_full_name,"));
        assert!(meta.contains("a/one"));

        let pulls = fs::read_to_string(dir.path().join(PULL_REQUESTS_FILE)).unwrap();
        assert!(pulls.contains("a/one"));

        // Empty child tables are not written at all.
        assert!(!dir.path().join(BUG_ISSUES_FILE).exists());
    }

    #[test]
    fn test_write_csv_identical_for_identical_datasets() {
        let records = vec![done_record("a/one", 2), done_record("b/two", 0)];
        let dataset = Dataset::rebuild(records);

        let dir1 = tempfile::tempdir().unwrap();
        let dir2 = tempfile::tempdir().unwrap();
        dataset.write_csv(dir1.path()).unwrap();
        dataset.write_csv(dir2.path()).unwrap();

        let a = fs::read_to_string(dir1.path().join(REPO_META_FILE)).unwrap();
        let b = fs::read_to_string(dir2.path().join(REPO_META_FILE)).unwrap();
        assert_eq!(a, b);
    }
}
