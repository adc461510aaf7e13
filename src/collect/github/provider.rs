use super::extract::{BugIssues, Contributors, MetadataExtractor, PullRequests, RepoMetadata, RowExtractor};
use super::response::{ContributorNode, RepoQueryData};
use super::rows::{ContributorRow, RecordBundle};
use crate::Result;
use crate::collect::outcome::CallOutcome;
use crate::collect::repo_spec::RepoSpec;
use crate::collect::request_tracker::{RequestTracker, TrackedTopic};
use crate::collect::resilient_http::ApiClient;
use crate::collect::token_pool::TokenPool;
use std::sync::Arc;

const LOG_TARGET: &str = "    github";

pub const GITHUB_GRAPHQL_URL: &str = "https://api.github.com/graphql";
pub const GITHUB_REST_URL: &str = "https://api.github.com";

const CONTRIBUTOR_PAGE_SIZE: u32 = 100;

/// Single GraphQL query fetching repository metadata, the most recent pull
/// requests (with their first review), and the most recent bug-labeled
/// issues. Contributors stay on REST, which has no GraphQL equivalent.
const REPO_QUERY: &str = r#"
query($owner: String!, $name: String!) {
  repository(owner: $owner, name: $name) {
    databaseId
    nameWithOwner
    defaultBranchRef { name }
    createdAt
    updatedAt
    pushedAt
    stargazerCount
    forkCount
    primaryLanguage { name }
    isArchived
    isFork
    licenseInfo { spdxId }
    openIssues: issues(states: OPEN) { totalCount }

    pullRequests(last: 100, orderBy: {field: UPDATED_AT, direction: DESC}) {
      nodes {
        number
        createdAt
        closedAt
        mergedAt
        authorAssociation
        reviews(first: 1) {
          nodes { createdAt }
        }
      }
    }

    bugIssues: issues(last: 100, labels: ["bug"], orderBy: {field: UPDATED_AT, direction: DESC}) {
      nodes {
        number
        createdAt
        closedAt
        state
        comments { totalCount }
      }
    }
  }
}
"#;

/// Outcome of collecting one repository, consumed by the dispatcher.
#[derive(Debug)]
pub enum UnitReport {
    /// Collection succeeded; the bundle holds every extracted row.
    Collected(Box<RecordBundle>),

    /// The repository is excluded from analysis (archived or a fork).
    Skipped { reason: String },

    /// The unit failed; the run continues without it.
    Failed { error: String },
}

/// Collects one repository's activity signals from GitHub.
#[derive(Debug, Clone)]
pub struct Provider {
    api: ApiClient,
    graphql_url: String,
    rest_url: String,
}

impl Provider {
    /// Create a provider talking to the public GitHub API, or to `base_url`
    /// when overridden (tests point this at a local mock server).
    pub fn new(pool: Arc<TokenPool>, base_url: Option<&str>) -> Result<Self> {
        let api = ApiClient::new(Some(pool))?;

        let (graphql_url, rest_url) = match base_url {
            Some(base) => {
                let base = base.trim_end_matches('/');
                (format!("{base}/graphql"), base.to_string())
            }
            None => (GITHUB_GRAPHQL_URL.to_string(), GITHUB_REST_URL.to_string()),
        };

        Ok(Self { api, graphql_url, rest_url })
    }

    /// Collect all data for a single repository.
    ///
    /// Never returns an error: every per-unit failure is folded into the
    /// report so the dispatcher can record it and move on.
    pub async fn collect_repo(&self, unit: &RepoSpec, tracker: &RequestTracker) -> UnitReport {
        let variables = serde_json::json!({ "owner": unit.owner(), "name": unit.name() });

        log::info!(target: LOG_TARGET, "querying repository '{unit}'");

        let data = match self.api.graphql::<RepoQueryData>(&self.graphql_url, REPO_QUERY, variables).await {
            CallOutcome::Success(data) => data,
            CallOutcome::NotFound => {
                return UnitReport::Failed {
                    error: "repository not found".to_string(),
                };
            }
            CallOutcome::RetryableFailure(e) | CallOutcome::FatalFailure(e) => {
                return UnitReport::Failed { error: format!("{e:#}") };
            }
        };

        let Some(node) = data.repository else {
            return UnitReport::Failed {
                error: "repository not found".to_string(),
            };
        };

        if node.is_archived || node.is_fork {
            return UnitReport::Skipped {
                reason: "archived_or_fork".to_string(),
            };
        }

        let meta = RepoMetadata.metadata(unit, &node);
        let pulls = PullRequests.rows(unit, &node);
        let bugs = BugIssues.rows(unit, &node);
        let contributors = self.fetch_contributors(unit, tracker).await;

        log::debug!(
            target: LOG_TARGET,
            "collected '{unit}': {} pull request(s), {} bug issue(s), {} contributor(s)",
            pulls.len(),
            bugs.len(),
            contributors.len()
        );

        UnitReport::Collected(Box::new(RecordBundle {
            meta,
            pulls,
            bugs,
            contributors,
        }))
    }

    /// Fetch the first page of contributors over REST.
    ///
    /// Contributor data is best-effort: any failure degrades to an empty list
    /// rather than failing the unit.
    async fn fetch_contributors(&self, unit: &RepoSpec, tracker: &RequestTracker) -> Vec<ContributorRow> {
        let url = format!(
            "{}/repos/{}/{}/contributors?per_page={CONTRIBUTOR_PAGE_SIZE}&anon=true",
            self.rest_url,
            unit.owner(),
            unit.name()
        );

        tracker.add_requests(TrackedTopic::Contributors, 1);
        let outcome = self.api.get_json::<Vec<ContributorNode>>(&url).await;
        tracker.complete_request(TrackedTopic::Contributors);

        match outcome {
            CallOutcome::Success(contributors) => Contributors.rows(unit, &contributors),
            CallOutcome::NotFound => {
                log::debug!(target: LOG_TARGET, "no contributors found for '{unit}'");
                Vec::new()
            }
            CallOutcome::RetryableFailure(e) | CallOutcome::FatalFailure(e) => {
                log::warn!(target: LOG_TARGET, "could not fetch contributors for '{unit}': {e:#}");
                Vec::new()
            }
        }
    }
}
