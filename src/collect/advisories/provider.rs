use super::advisory_data::AdvisoryRow;
use crate::Result;
use crate::collect::outcome::CallOutcome;
use crate::collect::request_tracker::{RequestTracker, TrackedTopic};
use crate::collect::resilient_http::ApiClient;
use crate::collect::throttler::Throttler;
use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use serde::Deserialize;
use std::sync::Arc;

const LOG_TARGET: &str = "advisories";

pub const OSV_QUERY_URL: &str = "https://api.osv.dev/v1/query";

const MAX_CONCURRENT_REQUESTS: usize = 5;

/// Advisory details are free text and occasionally enormous; keep a bounded
/// prefix for the output table.
const MAX_DETAIL_CHARS: usize = 5000;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct OsvQueryResponse {
    vulns: Vec<OsvVuln>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct OsvVuln {
    id: Option<String>,
    published: Option<DateTime<Utc>>,
    modified: Option<DateTime<Utc>>,
    summary: Option<String>,
    details: Option<String>,
    severity: Vec<OsvSeverity>,
    references: Vec<OsvReference>,
    aliases: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct OsvSeverity {
    score: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct OsvReference {
    url: Option<String>,
}

/// Queries the OSV database for known vulnerabilities per package.
#[derive(Debug)]
pub struct Provider {
    api: ApiClient,
    query_url: String,
    ecosystem: String,
    throttler: Arc<Throttler>,
}

impl Provider {
    pub fn new(ecosystem: impl Into<String>, base_url: Option<&str>) -> Result<Self> {
        Ok(Self {
            api: ApiClient::new(None)?,
            query_url: base_url.map_or_else(|| OSV_QUERY_URL.to_string(), |base| format!("{}/v1/query", base.trim_end_matches('/'))),
            ecosystem: ecosystem.into(),
            throttler: Throttler::new(MAX_CONCURRENT_REQUESTS),
        })
    }

    /// Query every package, yielding zero-or-more advisory rows per package
    /// and an error row for packages whose query failed.
    pub async fn query_packages(&self, packages: &[String], tracker: &RequestTracker) -> Vec<AdvisoryRow> {
        tracker.add_requests(TrackedTopic::Advisories, packages.len() as u64);

        let per_package = join_all(packages.iter().map(|package| async {
            let _permit = self.throttler.acquire().await;
            let rows = self.query_package(package).await;
            tracker.complete_request(TrackedTopic::Advisories);
            rows
        }))
        .await;

        per_package.into_iter().flatten().collect()
    }

    async fn query_package(&self, package: &str) -> Vec<AdvisoryRow> {
        let body = serde_json::json!({
            "package": { "name": package, "ecosystem": self.ecosystem }
        });

        let response = match self.api.post_json::<OsvQueryResponse>(&self.query_url, &body).await {
            CallOutcome::Success(response) => response,
            CallOutcome::NotFound => {
                return vec![AdvisoryRow::errored(package.to_string(), "package not found".to_string())];
            }
            CallOutcome::RetryableFailure(e) | CallOutcome::FatalFailure(e) => {
                log::warn!(target: LOG_TARGET, "OSV query failed for package '{package}': {e:#}");
                return vec![AdvisoryRow::errored(package.to_string(), format!("{e:#}"))];
            }
        };

        response
            .vulns
            .into_iter()
            .map(|vuln| flatten_vuln(package, vuln))
            .collect()
    }
}

fn flatten_vuln(package: &str, vuln: OsvVuln) -> AdvisoryRow {
    let severity_raw = vuln.severity.first().and_then(|s| s.score.clone().or_else(|| s.kind.clone()));

    let references = join_nonempty(vuln.references.iter().filter_map(|r| r.url.as_deref()));
    let aliases = join_nonempty(vuln.aliases.iter().map(String::as_str));

    AdvisoryRow {
        package_name: package.to_string(),
        osv_id: vuln.id,
        published: vuln.published,
        modified: vuln.modified,
        summary: vuln.summary,
        details: vuln.details.map(|d| truncate_chars(d, MAX_DETAIL_CHARS)),
        severity_raw,
        references,
        aliases,
        error: None,
    }
}

/// Join with `;`, or `None` when there is nothing to join.
fn join_nonempty<'a>(items: impl Iterator<Item = &'a str>) -> Option<String> {
    let joined = items.collect::<Vec<_>>().join(";");
    (!joined.is_empty()).then_some(joined)
}

fn truncate_chars(s: String, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((byte_index, _)) => s[..byte_index].to_string(),
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flatten_full_vuln() {
        let vuln: OsvVuln = serde_json::from_str(
            r#"{
                "id": "GHSA-xxxx-yyyy-zzzz",
                "published": "2023-05-01T00:00:00Z",
                "modified": "2023-06-01T00:00:00Z",
                "summary": "Something bad",
                "details": "Long explanation",
                "severity": [{"type": "CVSS_V3", "score": "CVSS:3.1/AV:N/AC:L"}],
                "references": [{"url": "https://example.com/a"}, {"url": "https://example.com/b"}],
                "aliases": ["CVE-2023-0001"]
            }"#,
        )
        .unwrap();

        let row = flatten_vuln("requests", vuln);
        assert_eq!(row.package_name, "requests");
        assert_eq!(row.osv_id.as_deref(), Some("GHSA-xxxx-yyyy-zzzz"));
        assert_eq!(row.severity_raw.as_deref(), Some("CVSS:3.1/AV:N/AC:L"));
        assert_eq!(row.references.as_deref(), Some("https://example.com/a;https://example.com/b"));
        assert_eq!(row.aliases.as_deref(), Some("CVE-2023-0001"));
        assert!(row.error.is_none());
    }

    #[test]
    fn test_flatten_severity_falls_back_to_type() {
        let vuln: OsvVuln = serde_json::from_str(r#"{"id": "X", "severity": [{"type": "CVSS_V3"}]}"#).unwrap();
        let row = flatten_vuln("pkg", vuln);
        assert_eq!(row.severity_raw.as_deref(), Some("CVSS_V3"));
    }

    #[test]
    fn test_flatten_sparse_vuln() {
        let vuln: OsvVuln = serde_json::from_str("{}").unwrap();
        let row = flatten_vuln("pkg", vuln);
        assert!(row.osv_id.is_none());
        assert!(row.severity_raw.is_none());
        assert!(row.references.is_none());
        assert!(row.aliases.is_none());
    }

    #[test]
    fn test_details_truncated() {
        let long = "x".repeat(MAX_DETAIL_CHARS + 100);
        let vuln = OsvVuln {
            details: Some(long),
            ..OsvVuln::default()
        };
        let row = flatten_vuln("pkg", vuln);
        assert_eq!(row.details.unwrap().chars().count(), MAX_DETAIL_CHARS);
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        let s = "é".repeat(10);
        assert_eq!(truncate_chars(s, 3), "ééé");
    }

    #[test]
    fn test_errored_row() {
        let row = AdvisoryRow::errored("pkg".to_string(), "HTTP 500".to_string());
        assert_eq!(row.error.as_deref(), Some("HTTP 500"));
        assert!(row.osv_id.is_none());
    }
}
