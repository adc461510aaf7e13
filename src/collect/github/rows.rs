//! Flat relational rows extracted from one repository's responses.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One repository's worth of extracted rows, owned by the checkpoint record
/// that carries it until dataset rebuild copies it into the output tables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordBundle {
    pub meta: RepoMetaRow,
    #[serde(default)]
    pub pulls: Vec<PullRequestRow>,
    #[serde(default)]
    pub bugs: Vec<BugIssueRow>,
    #[serde(default)]
    pub contributors: Vec<ContributorRow>,
}

/// One row of repository metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RepoMetaRow {
    pub repo_full_name: String,
    pub repo_id: Option<i64>,
    pub default_branch: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub pushed_at: Option<DateTime<Utc>>,
    pub stars: Option<i64>,
    pub forks: Option<i64>,
    pub open_issues: Option<i64>,
    pub language: Option<String>,
    pub archived: Option<bool>,
    pub fork: Option<bool>,
    pub license: Option<String>,
    /// Set only on rows rebuilt from errored checkpoint records, so failed
    /// units remain inspectable in the output table.
    pub error: Option<String>,
}

impl RepoMetaRow {
    /// A metadata row carrying only an error, for units that never yielded data.
    #[must_use]
    pub fn errored(repo_full_name: String, error: String) -> Self {
        Self {
            repo_full_name,
            error: Some(error),
            ..Self::default()
        }
    }
}

/// One pull request, with review/merge latencies derived when both timestamps
/// are present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PullRequestRow {
    pub repo_full_name: String,
    pub pr_number: Option<i64>,
    pub pr_created_at: Option<DateTime<Utc>>,
    pub pr_closed_at: Option<DateTime<Utc>>,
    pub pr_merged_at: Option<DateTime<Utc>>,
    pub first_review_at: Option<DateTime<Utc>>,
    pub review_count: u64,
    pub author_association: Option<String>,
    pub latency_first_review_hours: Option<f64>,
    pub latency_merge_hours: Option<f64>,
}

/// One issue labeled as a bug, with its time-to-close when known.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BugIssueRow {
    pub repo_full_name: String,
    pub issue_number: Option<i64>,
    pub created_at: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,
    pub mttr_days: Option<f64>,
    pub state: Option<String>,
    pub comments: Option<i64>,
}

/// One contributor as reported by the REST contributors endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContributorRow {
    pub repo_full_name: String,
    pub contributor_login: String,
    pub contributions: Option<i64>,
    pub contributor_type: Option<String>,
}
