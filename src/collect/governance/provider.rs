use super::governance_data::GovernanceRow;
use crate::Result;
use crate::collect::github::GITHUB_GRAPHQL_URL;
use crate::collect::outcome::CallOutcome;
use crate::collect::repo_spec::RepoSpec;
use crate::collect::request_tracker::{RequestTracker, TrackedTopic};
use crate::collect::resilient_http::ApiClient;
use crate::collect::throttler::Throttler;
use crate::collect::token_pool::TokenPool;
use futures_util::future::join_all;
use serde::Deserialize;
use std::sync::Arc;

const LOG_TARGET: &str = "governance";

const MAX_CONCURRENT_REQUESTS: usize = 3;

/// Number of artifact groups probed; the score denominator.
const ARTIFACT_GROUP_COUNT: usize = 5;

/// Checks all governance file paths in a single call per repository. Each
/// aliased `object` field is non-null when the file exists at HEAD.
const GOVERNANCE_QUERY: &str = r#"
query($owner: String!, $name: String!) {
  repository(owner: $owner, name: $name) {
    security_root: object(expression: "HEAD:SECURITY.md") { __typename }
    security_gh: object(expression: "HEAD:.github/SECURITY.md") { __typename }
    coc_root: object(expression: "HEAD:CODE_OF_CONDUCT.md") { __typename }
    coc_gh: object(expression: "HEAD:.github/CODE_OF_CONDUCT.md") { __typename }
    contributing_root: object(expression: "HEAD:CONTRIBUTING.md") { __typename }
    contributing_gh: object(expression: "HEAD:.github/CONTRIBUTING.md") { __typename }
    codeowners_root: object(expression: "HEAD:CODEOWNERS") { __typename }
    codeowners_gh: object(expression: "HEAD:.github/CODEOWNERS") { __typename }
    funding: object(expression: "HEAD:.github/FUNDING.yml") { __typename }
  }
}
"#;

#[derive(Debug, Deserialize)]
struct GovernanceQueryData {
    repository: Option<GovernanceNode>,
}

/// Any JSON object; presence is all that matters.
#[derive(Debug, Deserialize)]
struct GitObject {}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct GovernanceNode {
    security_root: Option<GitObject>,
    security_gh: Option<GitObject>,
    coc_root: Option<GitObject>,
    coc_gh: Option<GitObject>,
    contributing_root: Option<GitObject>,
    contributing_gh: Option<GitObject>,
    codeowners_root: Option<GitObject>,
    codeowners_gh: Option<GitObject>,
    funding: Option<GitObject>,
}

/// Detects governance artifacts for a set of repositories.
#[derive(Debug)]
pub struct Provider {
    api: ApiClient,
    graphql_url: String,
    throttler: Arc<Throttler>,
}

impl Provider {
    pub fn new(pool: Arc<TokenPool>, base_url: Option<&str>) -> Result<Self> {
        let graphql_url = match base_url {
            Some(base) => format!("{}/graphql", base.trim_end_matches('/')),
            None => GITHUB_GRAPHQL_URL.to_string(),
        };

        Ok(Self {
            api: ApiClient::new(Some(pool))?,
            graphql_url,
            throttler: Throttler::new(MAX_CONCURRENT_REQUESTS),
        })
    }

    /// Check governance artifacts for every repository, one row per unit.
    pub async fn check_repos(&self, units: &[RepoSpec], tracker: &RequestTracker) -> Vec<GovernanceRow> {
        tracker.add_requests(TrackedTopic::Governance, units.len() as u64);

        join_all(units.iter().map(|unit| async {
            let _permit = self.throttler.acquire().await;
            let row = self.check_repo(unit).await;
            tracker.complete_request(TrackedTopic::Governance);
            row
        }))
        .await
    }

    async fn check_repo(&self, unit: &RepoSpec) -> GovernanceRow {
        let variables = serde_json::json!({ "owner": unit.owner(), "name": unit.name() });

        let data = match self.api.graphql::<GovernanceQueryData>(&self.graphql_url, GOVERNANCE_QUERY, variables).await {
            CallOutcome::Success(data) => data,
            CallOutcome::NotFound => {
                log::info!(target: LOG_TARGET, "repository '{unit}' not found");
                return GovernanceRow::unscored(unit.full_name());
            }
            CallOutcome::RetryableFailure(e) | CallOutcome::FatalFailure(e) => {
                log::warn!(target: LOG_TARGET, "could not check governance artifacts for '{unit}': {e:#}");
                return GovernanceRow::unscored(unit.full_name());
            }
        };

        let Some(node) = data.repository else {
            return GovernanceRow::unscored(unit.full_name());
        };

        Self::score(unit, &node)
    }

    /// One artifact group counts as present when any of its paths exists.
    fn score(unit: &RepoSpec, node: &GovernanceNode) -> GovernanceRow {
        let has_security = node.security_root.is_some() || node.security_gh.is_some();
        let has_code_of_conduct = node.coc_root.is_some() || node.coc_gh.is_some();
        let has_contributing = node.contributing_root.is_some() || node.contributing_gh.is_some();
        let has_codeowners = node.codeowners_root.is_some() || node.codeowners_gh.is_some();
        let has_funding = node.funding.is_some();

        let present = usize::from(has_security)
            + usize::from(has_code_of_conduct)
            + usize::from(has_contributing)
            + usize::from(has_codeowners)
            + usize::from(has_funding);

        #[expect(clippy::cast_precision_loss, reason = "both values are tiny")]
        let artifact_score = Some(present as f64 / ARTIFACT_GROUP_COUNT as f64);

        GovernanceRow {
            repo_full_name: unit.full_name(),
            has_security,
            has_code_of_conduct,
            has_contributing,
            has_codeowners,
            has_funding,
            artifact_score,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit() -> RepoSpec {
        RepoSpec::parse("alpha/one").unwrap()
    }

    #[test]
    fn test_score_counts_artifact_groups_once() {
        // Both SECURITY.md paths present still count as one group.
        let node: GovernanceNode = serde_json::from_str(
            r#"{
                "security_root": {"__typename": "Blob"},
                "security_gh": {"__typename": "Blob"},
                "contributing_root": {"__typename": "Blob"}
            }"#,
        )
        .unwrap();

        let row = Provider::score(&unit(), &node);
        assert!(row.has_security);
        assert!(row.has_contributing);
        assert!(!row.has_code_of_conduct);
        assert_eq!(row.artifact_score, Some(0.4));
    }

    #[test]
    fn test_score_all_absent() {
        let node: GovernanceNode = serde_json::from_str("{}").unwrap();
        let row = Provider::score(&unit(), &node);
        assert_eq!(row.artifact_score, Some(0.0));
    }

    #[test]
    fn test_unscored_row_has_null_score() {
        let row = GovernanceRow::unscored("alpha/one".to_string());
        assert!(row.artifact_score.is_none());
        assert!(!row.has_security);
    }
}
