//! Integration tests for the governance provider using wiremock.

use chrono::Utc;
use repo_harvest::collect::governance::Provider;
use repo_harvest::collect::{Progress, RepoSpec, RequestTracker, TokenPool};
use serde_json::json;
use std::sync::Arc;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[derive(Debug)]
struct NoOpProgress;

impl Progress for NoOpProgress {
    fn set_phase(&self, _phase: &str) {}
    fn set_determinate(&self, _callback: Box<dyn Fn() -> (u64, u64, String) + Send + Sync + 'static>) {}
    fn set_indeterminate(&self, _callback: Box<dyn Fn() -> String + Send + Sync + 'static>) {}
    fn println(&self, _msg: &str) {}
    fn done(&self) {}
}

fn tracker() -> RequestTracker {
    RequestTracker::new(&(Arc::new(NoOpProgress) as Arc<dyn Progress>))
}

fn provider(server: &MockServer) -> Provider {
    let pool = Arc::new(TokenPool::new(vec!["ghp_test_token".to_string()], Utc::now()).unwrap());
    Provider::new(pool, Some(&server.uri())).unwrap()
}

#[tokio::test]
async fn governance_artifacts_are_scored_per_group() {
    let server = MockServer::start().await;

    // Security present at both paths (counts once), contributing at one path,
    // everything else absent: 2 of 5 groups.
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .and(body_partial_json(json!({"variables": {"owner": "alpha", "name": "one"}})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"repository": {
                "security_root": {"__typename": "Blob"},
                "security_gh": {"__typename": "Blob"},
                "coc_root": null,
                "coc_gh": null,
                "contributing_root": null,
                "contributing_gh": {"__typename": "Blob"},
                "codeowners_root": null,
                "codeowners_gh": null,
                "funding": null
            }}
        })))
        .mount(&server)
        .await;

    let units = vec![RepoSpec::parse("alpha/one").unwrap()];
    let rows = provider(&server).check_repos(&units, &tracker()).await;

    assert_eq!(rows.len(), 1);
    let row = &rows[0];
    assert_eq!(row.repo_full_name, "alpha/one");
    assert!(row.has_security);
    assert!(row.has_contributing);
    assert!(!row.has_code_of_conduct);
    assert!(!row.has_codeowners);
    assert!(!row.has_funding);
    assert_eq!(row.artifact_score, Some(0.4));
}

#[tokio::test]
async fn missing_repository_yields_unscored_row() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/graphql"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {"repository": null}})))
        .mount(&server)
        .await;

    let units = vec![RepoSpec::parse("gone/repo").unwrap()];
    let rows = provider(&server).check_repos(&units, &tracker()).await;

    assert_eq!(rows.len(), 1);
    assert!(rows[0].artifact_score.is_none());
    assert!(!rows[0].has_security);
}

#[tokio::test]
async fn every_unit_yields_exactly_one_row() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/graphql"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {"repository": {}}})))
        .mount(&server)
        .await;

    let units: Vec<RepoSpec> = ["a/one", "b/two", "c/three"]
        .iter()
        .map(|n| RepoSpec::parse(n).unwrap())
        .collect();
    let rows = provider(&server).check_repos(&units, &tracker()).await;

    assert_eq!(rows.len(), 3);
    let mut names: Vec<_> = rows.iter().map(|r| r.repo_full_name.clone()).collect();
    names.sort();
    assert_eq!(names, vec!["a/one", "b/two", "c/three"]);
    assert!(rows.iter().all(|r| r.artifact_score == Some(0.0)));
}
