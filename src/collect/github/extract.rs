//! The extractor contract: typed mappings from one provider response shape to
//! flat output rows.
//!
//! Extractors are total over well-formed responses. Missing or malformed
//! nested fields degrade to null-valued columns; derived fields requiring
//! cross-timestamp arithmetic are null when either input timestamp is absent.

use super::response::{ContributorNode, RepoNode};
use super::rows::{BugIssueRow, ContributorRow, PullRequestRow, RepoMetaRow};
use crate::collect::RepoSpec;
use chrono::{DateTime, Utc};

const SECONDS_PER_HOUR: f64 = 3600.0;
const SECONDS_PER_DAY: f64 = 86400.0;

/// Maps a provider response to a single metadata row.
pub trait MetadataExtractor {
    type Response;

    fn metadata(&self, unit: &RepoSpec, response: &Self::Response) -> RepoMetaRow;
}

/// Maps a provider response to zero-or-more child rows of one category.
pub trait RowExtractor {
    type Response;
    type Row;

    fn rows(&self, unit: &RepoSpec, response: &Self::Response) -> Vec<Self::Row>;
}

/// Repository metadata from the GraphQL repository node.
#[derive(Debug, Clone, Copy, Default)]
pub struct RepoMetadata;

impl MetadataExtractor for RepoMetadata {
    type Response = RepoNode;

    fn metadata(&self, unit: &RepoSpec, response: &RepoNode) -> RepoMetaRow {
        RepoMetaRow {
            repo_full_name: unit.full_name(),
            repo_id: response.database_id,
            default_branch: response.default_branch_ref.as_ref().and_then(|r| r.name.clone()),
            created_at: response.created_at,
            updated_at: response.updated_at,
            pushed_at: response.pushed_at,
            stars: response.stargazer_count,
            forks: response.fork_count,
            open_issues: response.open_issues.as_ref().and_then(|c| c.total_count),
            language: response.primary_language.as_ref().and_then(|l| l.name.clone()),
            archived: Some(response.is_archived),
            fork: Some(response.is_fork),
            license: response.license_info.as_ref().and_then(|l| l.spdx_id.clone()),
            error: None,
        }
    }
}

/// Recent pull requests with first-review and merge latencies.
#[derive(Debug, Clone, Copy, Default)]
pub struct PullRequests;

impl RowExtractor for PullRequests {
    type Response = RepoNode;
    type Row = PullRequestRow;

    fn rows(&self, unit: &RepoSpec, response: &RepoNode) -> Vec<PullRequestRow> {
        let nodes = response.pull_requests.as_ref().map(|c| c.nodes.as_slice()).unwrap_or_default();

        nodes
            .iter()
            .flatten()
            .map(|pr| {
                let reviews: Vec<_> = pr
                    .reviews
                    .as_ref()
                    .map(|c| c.nodes.iter().flatten().collect())
                    .unwrap_or_default();
                let first_review_at = reviews.first().and_then(|r| r.created_at);

                PullRequestRow {
                    repo_full_name: unit.full_name(),
                    pr_number: pr.number,
                    pr_created_at: pr.created_at,
                    pr_closed_at: pr.closed_at,
                    pr_merged_at: pr.merged_at,
                    first_review_at,
                    review_count: reviews.len() as u64,
                    author_association: pr.author_association.clone(),
                    latency_first_review_hours: hours_between(pr.created_at, first_review_at),
                    latency_merge_hours: hours_between(pr.created_at, pr.merged_at),
                }
            })
            .collect()
    }
}

/// Recent issues carrying the bug label, with time-to-close.
#[derive(Debug, Clone, Copy, Default)]
pub struct BugIssues;

impl RowExtractor for BugIssues {
    type Response = RepoNode;
    type Row = BugIssueRow;

    fn rows(&self, unit: &RepoSpec, response: &RepoNode) -> Vec<BugIssueRow> {
        let nodes = response.bug_issues.as_ref().map(|c| c.nodes.as_slice()).unwrap_or_default();

        nodes
            .iter()
            .flatten()
            .map(|issue| BugIssueRow {
                repo_full_name: unit.full_name(),
                issue_number: issue.number,
                created_at: issue.created_at,
                closed_at: issue.closed_at,
                mttr_days: days_between(issue.created_at, issue.closed_at),
                state: issue.state.clone(),
                comments: issue.comments.as_ref().and_then(|c| c.total_count),
            })
            .collect()
    }
}

/// Contributors from the REST endpoint; the login falls back to the display
/// name, then to "unknown" for anonymous entries.
#[derive(Debug, Clone, Copy, Default)]
pub struct Contributors;

impl RowExtractor for Contributors {
    type Response = Vec<ContributorNode>;
    type Row = ContributorRow;

    fn rows(&self, unit: &RepoSpec, response: &Vec<ContributorNode>) -> Vec<ContributorRow> {
        response
            .iter()
            .map(|c| ContributorRow {
                repo_full_name: unit.full_name(),
                contributor_login: c
                    .login
                    .clone()
                    .or_else(|| c.name.clone())
                    .unwrap_or_else(|| "unknown".to_string()),
                contributions: c.contributions,
                contributor_type: c.kind.clone(),
            })
            .collect()
    }
}

#[expect(clippy::cast_precision_loss, reason = "latencies are approximate by nature")]
fn hours_between(start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> Option<f64> {
    match (start, end) {
        (Some(start), Some(end)) => Some((end - start).num_seconds() as f64 / SECONDS_PER_HOUR),
        _ => None,
    }
}

#[expect(clippy::cast_precision_loss, reason = "latencies are approximate by nature")]
fn days_between(start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> Option<f64> {
    match (start, end) {
        (Some(start), Some(end)) => Some((end - start).num_seconds() as f64 / SECONDS_PER_DAY),
        _ => None,
    }
}
