//! Wire shapes of the GitHub responses we consume.
//!
//! Every field is optional or defaulted so a sparse or partially malformed
//! response deserializes rather than failing the whole unit.

use chrono::{DateTime, Utc};
use serde::Deserialize;

/// Payload of the per-repository GraphQL query.
#[derive(Debug, Deserialize)]
pub struct RepoQueryData {
    pub repository: Option<RepoNode>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RepoNode {
    pub database_id: Option<i64>,
    pub name_with_owner: Option<String>,
    pub default_branch_ref: Option<NamedRef>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub pushed_at: Option<DateTime<Utc>>,
    pub stargazer_count: Option<i64>,
    pub fork_count: Option<i64>,
    pub primary_language: Option<NamedRef>,
    pub is_archived: bool,
    pub is_fork: bool,
    pub license_info: Option<LicenseInfo>,
    pub open_issues: Option<TotalCount>,
    pub pull_requests: Option<Connection<PullRequestNode>>,
    pub bug_issues: Option<Connection<IssueNode>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct NamedRef {
    pub name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LicenseInfo {
    pub spdx_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TotalCount {
    pub total_count: Option<i64>,
}

/// A GraphQL connection; nodes may individually be null.
#[derive(Debug, Deserialize)]
pub struct Connection<T> {
    #[serde(default = "Vec::new")]
    pub nodes: Vec<Option<T>>,
}

impl<T> Default for Connection<T> {
    fn default() -> Self {
        Self { nodes: Vec::new() }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PullRequestNode {
    pub number: Option<i64>,
    pub created_at: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,
    pub merged_at: Option<DateTime<Utc>>,
    pub author_association: Option<String>,
    pub reviews: Option<Connection<ReviewNode>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReviewNode {
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IssueNode {
    pub number: Option<i64>,
    pub created_at: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,
    pub state: Option<String>,
    pub comments: Option<TotalCount>,
}

/// One entry of the REST contributors endpoint.
#[derive(Debug, Default, Deserialize)]
pub struct ContributorNode {
    pub login: Option<String>,
    pub name: Option<String>,
    pub contributions: Option<i64>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
}
