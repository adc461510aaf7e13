//! Resilient HTTP request layer.
//!
//! Wraps each outbound request with bounded retry, exponential backoff, and
//! provider error classification, and reports quota metadata back to the
//! token pool on every completed attempt so subsequent acquisitions see fresh
//! state.

use super::outcome::CallOutcome;
use super::token_pool::{Lease, TokenPool};
use chrono::{DateTime, Utc};
use core::time::Duration;
use ohno::{AppError, app_err};
use regex::Regex;
use reqwest::header::HeaderMap;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::sync::{Arc, LazyLock};

const LOG_TARGET: &str = " resilient";

/// Total attempts per call, including the first.
const MAX_ATTEMPTS: u32 = 6;

/// Base delay for exponential backoff between retries.
const BASE_DELAY: Duration = Duration::from_secs(1);

/// Backoff cap for plain fetches.
const MAX_DELAY: Duration = Duration::from_secs(60);

/// Backoff cap for structured (GraphQL) queries.
const MAX_GRAPHQL_DELAY: Duration = Duration::from_secs(120);

/// Fixed cooldown applied when a structured query reports a rate limit in its
/// application-level error list rather than via HTTP status.
const GRAPHQL_RATE_LIMIT_COOLDOWN: Duration = Duration::from_secs(30);

/// Fallback when a 429 carries no `Retry-After` hint.
const DEFAULT_RETRY_AFTER_SECS: u64 = 5;

const USER_AGENT: &str = "repo-harvest";

/// Application-level error messages that indicate rate limiting.
static RATE_LIMIT_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)rate.?limit").expect("invalid regex"));

/// Application-level error messages that indicate a missing resource.
static NOT_FOUND_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)could not resolve|does not exist").expect("invalid regex"));

/// Envelope of a structured-query response: a nested payload plus an optional
/// top-level error list.
#[derive(Debug, Deserialize)]
pub struct GraphQlResponse<T> {
    pub data: Option<T>,
    #[serde(default)]
    pub errors: Vec<GraphQlError>,
}

#[derive(Debug, Default, Deserialize)]
pub struct GraphQlError {
    #[serde(default)]
    pub message: String,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
}

impl GraphQlError {
    fn is_rate_limited(&self) -> bool {
        self.kind.as_deref() == Some("RATE_LIMITED") || RATE_LIMIT_PATTERN.is_match(&self.message)
    }

    fn is_not_found(&self) -> bool {
        self.kind.as_deref() == Some("NOT_FOUND") || NOT_FOUND_PATTERN.is_match(&self.message)
    }
}

/// Per-attempt classification of a completed request.
enum Classified {
    Ok(reqwest::Response),
    /// Transient failure: consume an attempt, back off, try again.
    Retry(AppError),
    /// Transient failure with a provider-supplied delay hint.
    RetryAfter(Duration, AppError),
    /// Primary quota exhausted: the pool has been told; re-acquiring blocks
    /// until the reset, so no attempt is consumed.
    Blocked,
    NotFound,
    Fatal(AppError),
}

/// HTTP client wrapping every request with retry, backoff, and quota
/// reporting.
///
/// Constructed with a token pool for authenticated providers, or without one
/// for anonymous endpoints (the pool-blocking path is then skipped).
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: reqwest::Client,
    pool: Option<Arc<TokenPool>>,
}

impl ApiClient {
    pub fn new(pool: Option<Arc<TokenPool>>) -> crate::Result<Self> {
        let client = reqwest::Client::builder().user_agent(USER_AGENT).build()?;
        Ok(Self { client, pool })
    }

    /// Simple parameterized fetch: GET a URL and decode the JSON body.
    pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> CallOutcome<T> {
        let outcome = self.request_with_retry(MAX_DELAY, url, |client| client.get(url)).await;
        decode_json(outcome).await
    }

    /// POST a JSON body and decode the JSON response.
    pub async fn post_json<T: DeserializeOwned>(&self, url: &str, body: &serde_json::Value) -> CallOutcome<T> {
        let outcome = self
            .request_with_retry(MAX_DELAY, url, |client| client.post(url).json(body))
            .await;
        decode_json(outcome).await
    }

    /// Structured query: POST a GraphQL document and classify the
    /// application-level error list in addition to the HTTP status.
    pub async fn graphql<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        query: &str,
        variables: serde_json::Value,
    ) -> CallOutcome<T> {
        let body = serde_json::json!({ "query": query, "variables": variables });
        let mut attempt: u32 = 0;

        loop {
            let response = match self
                .request_with_retry(MAX_GRAPHQL_DELAY, endpoint, |client| client.post(endpoint).json(&body))
                .await
            {
                CallOutcome::Success(response) => response,
                CallOutcome::RetryableFailure(e) => return CallOutcome::RetryableFailure(e),
                CallOutcome::FatalFailure(e) => return CallOutcome::FatalFailure(e),
                CallOutcome::NotFound => return CallOutcome::NotFound,
            };

            let envelope: GraphQlResponse<T> = match response.json().await {
                Ok(envelope) => envelope,
                Err(e) => return CallOutcome::FatalFailure(app_err!("malformed structured-query response: {e}")),
            };

            if let Some(data) = envelope.data {
                // Partial errors alongside data are the caller's policy call.
                if !envelope.errors.is_empty() {
                    log::debug!(target: LOG_TARGET, "structured query returned data with {} error(s): {}",
                        envelope.errors.len(), join_messages(&envelope.errors));
                }
                return CallOutcome::Success(data);
            }

            if envelope.errors.is_empty() {
                return CallOutcome::FatalFailure(app_err!("structured-query response carried neither data nor errors"));
            }

            if envelope.errors.iter().any(GraphQlError::is_not_found) {
                return CallOutcome::NotFound;
            }

            if envelope.errors.iter().any(GraphQlError::is_rate_limited) {
                attempt += 1;
                if attempt >= MAX_ATTEMPTS {
                    return CallOutcome::RetryableFailure(app_err!(
                        "structured-query rate limit persisted across {MAX_ATTEMPTS} attempts: {}",
                        join_messages(&envelope.errors)
                    ));
                }
                log::debug!(target: LOG_TARGET,
                    "structured query rate limited (attempt {attempt}), cooling down {}s",
                    GRAPHQL_RATE_LIMIT_COOLDOWN.as_secs());
                tokio::time::sleep(GRAPHQL_RATE_LIMIT_COOLDOWN).await;
                continue;
            }

            // Any other application error is returned as-is, not retried.
            return CallOutcome::FatalFailure(app_err!("structured-query errors: {}", join_messages(&envelope.errors)));
        }
    }

    /// Drive one request through the retry loop.
    async fn request_with_retry<F>(&self, cap: Duration, describe: &str, build: F) -> CallOutcome<reqwest::Response>
    where
        F: Fn(&reqwest::Client) -> reqwest::RequestBuilder,
    {
        let mut attempt: u32 = 0;

        loop {
            match self.send_classified(&build).await {
                Classified::Ok(response) => return CallOutcome::Success(response),
                Classified::NotFound => return CallOutcome::NotFound,
                Classified::Fatal(e) => return CallOutcome::FatalFailure(e),

                Classified::Blocked => {
                    if self.pool.is_some() {
                        // The next lease acquisition blocks until the reset.
                        log::debug!(target: LOG_TARGET, "quota exhausted for '{describe}', waiting on token pool");
                        continue;
                    }
                    attempt += 1;
                    if attempt >= MAX_ATTEMPTS {
                        return CallOutcome::RetryableFailure(app_err!("rate limited: {describe}"));
                    }
                    tokio::time::sleep(backoff_delay(attempt, cap)).await;
                }

                Classified::RetryAfter(hint, e) => {
                    attempt += 1;
                    if attempt >= MAX_ATTEMPTS {
                        return CallOutcome::RetryableFailure(e);
                    }
                    log::debug!(target: LOG_TARGET,
                        "retrying '{describe}' after provider hint of {}s (attempt {attempt}): {e:#}",
                        hint.as_secs());
                    tokio::time::sleep(hint.min(cap)).await;
                }

                Classified::Retry(e) => {
                    attempt += 1;
                    if attempt >= MAX_ATTEMPTS {
                        return CallOutcome::RetryableFailure(e);
                    }
                    let delay = backoff_delay(attempt, cap);
                    log::debug!(target: LOG_TARGET,
                        "retrying '{describe}' (attempt {attempt}, delay {}ms): {e:#}",
                        delay.as_millis());
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    /// Send one attempt and classify the result, reporting quota metadata to
    /// the pool as a side effect.
    async fn send_classified<F>(&self, build: &F) -> Classified
    where
        F: Fn(&reqwest::Client) -> reqwest::RequestBuilder,
    {
        let lease = match &self.pool {
            Some(pool) => Some(pool.acquire().await),
            None => None,
        };

        let mut request = build(&self.client);
        if let Some(lease) = &lease {
            request = request.bearer_auth(lease.secret());
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => return Classified::Retry(app_err!("transport error: {e}")),
        };

        self.report_quota(lease.as_ref(), response.headers());
        classify_status(response)
    }

    fn report_quota(&self, lease: Option<&Lease>, headers: &HeaderMap) {
        if let (Some(pool), Some(lease)) = (&self.pool, lease) {
            let (remaining, reset_at) = parse_quota_headers(headers);
            pool.report(lease, remaining, reset_at);
        }
    }
}

/// Classify an HTTP response for retry purposes.
fn classify_status(response: reqwest::Response) -> Classified {
    let status = response.status();
    if status.is_success() {
        return Classified::Ok(response);
    }

    let retry_after = parse_retry_after(response.headers());
    let (remaining, _) = parse_quota_headers(response.headers());

    match status.as_u16() {
        // Primary rate limit: the quota header says we are out.
        403 | 429 if remaining == Some(0) => Classified::Blocked,

        // Secondary rate limit: wait the hinted duration, then retry.
        403 => retry_after.map_or_else(
            || Classified::Fatal(app_err!("HTTP 403 forbidden")),
            |hint| Classified::RetryAfter(hint, app_err!("secondary rate limit (HTTP 403)")),
        ),

        429 => Classified::RetryAfter(
            retry_after.unwrap_or(Duration::from_secs(DEFAULT_RETRY_AFTER_SECS)),
            app_err!("HTTP 429 too many requests"),
        ),

        404 => Classified::NotFound,

        500 | 502 | 503 | 504 => Classified::Retry(app_err!("server error (HTTP {})", status.as_u16())),

        _ => Classified::Fatal(app_err!("unexpected HTTP status {status}")),
    }
}

/// Delay before retry attempt `attempt` (1-based): base delay doubling each
/// attempt, capped.
pub(crate) fn backoff_delay(attempt: u32, cap: Duration) -> Duration {
    let exponent = attempt.saturating_sub(1).min(31);
    BASE_DELAY.saturating_mul(1_u32 << exponent).min(cap)
}

/// Parse the `Retry-After` header value as seconds.
fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    let seconds = headers
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|h| h.to_str().ok())?
        .parse::<u64>()
        .ok()?;
    Some(Duration::from_secs(seconds))
}

/// Parse generic quota metadata (remaining count + reset deadline) from
/// response headers.
fn parse_quota_headers(headers: &HeaderMap) -> (Option<usize>, Option<DateTime<Utc>>) {
    let remaining = headers
        .get("x-ratelimit-remaining")
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.parse::<usize>().ok());

    let reset_at = headers
        .get("x-ratelimit-reset")
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.parse::<i64>().ok())
        .and_then(|ts| DateTime::from_timestamp(ts, 0));

    (remaining, reset_at)
}

fn join_messages(errors: &[GraphQlError]) -> String {
    errors.iter().map(|e| e.message.as_str()).collect::<Vec<_>>().join("; ")
}

async fn decode_json<T: DeserializeOwned>(outcome: CallOutcome<reqwest::Response>) -> CallOutcome<T> {
    match outcome {
        CallOutcome::Success(response) => match response.json::<T>().await {
            Ok(value) => CallOutcome::Success(value),
            Err(e) => CallOutcome::FatalFailure(app_err!("malformed JSON response: {e}")),
        },
        CallOutcome::RetryableFailure(e) => CallOutcome::RetryableFailure(e),
        CallOutcome::FatalFailure(e) => CallOutcome::FatalFailure(e),
        CallOutcome::NotFound => CallOutcome::NotFound,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    #[test]
    fn test_backoff_is_monotonic_and_capped() {
        let mut previous = Duration::ZERO;
        for attempt in 1..=MAX_ATTEMPTS {
            let delay = backoff_delay(attempt, MAX_DELAY);
            assert!(delay >= previous, "delay shrank at attempt {attempt}");
            assert!(delay <= MAX_DELAY);
            previous = delay;
        }
    }

    #[test]
    fn test_backoff_doubles_from_base() {
        assert_eq!(backoff_delay(1, MAX_DELAY), Duration::from_secs(1));
        assert_eq!(backoff_delay(2, MAX_DELAY), Duration::from_secs(2));
        assert_eq!(backoff_delay(3, MAX_DELAY), Duration::from_secs(4));
        assert_eq!(backoff_delay(4, MAX_DELAY), Duration::from_secs(8));
    }

    #[test]
    fn test_backoff_hits_cap() {
        assert_eq!(backoff_delay(30, MAX_DELAY), MAX_DELAY);
        assert_eq!(backoff_delay(30, MAX_GRAPHQL_DELAY), MAX_GRAPHQL_DELAY);
    }

    #[test]
    fn test_parse_retry_after() {
        let mut headers = HeaderMap::new();
        let _ = headers.insert(reqwest::header::RETRY_AFTER, HeaderValue::from_static("17"));
        assert_eq!(parse_retry_after(&headers), Some(Duration::from_secs(17)));
    }

    #[test]
    fn test_parse_retry_after_missing_or_invalid() {
        assert_eq!(parse_retry_after(&HeaderMap::new()), None);

        let mut headers = HeaderMap::new();
        let _ = headers.insert(reqwest::header::RETRY_AFTER, HeaderValue::from_static("soon"));
        assert_eq!(parse_retry_after(&headers), None);
    }

    #[test]
    fn test_parse_quota_headers() {
        let mut headers = HeaderMap::new();
        let _ = headers.insert("x-ratelimit-remaining", HeaderValue::from_static("4999"));
        let _ = headers.insert("x-ratelimit-reset", HeaderValue::from_static("1704067200"));

        let (remaining, reset_at) = parse_quota_headers(&headers);
        assert_eq!(remaining, Some(4999));
        assert_eq!(reset_at.unwrap().timestamp(), 1_704_067_200);
    }

    #[test]
    fn test_parse_quota_headers_partial() {
        let mut headers = HeaderMap::new();
        let _ = headers.insert("x-ratelimit-remaining", HeaderValue::from_static("12"));

        let (remaining, reset_at) = parse_quota_headers(&headers);
        assert_eq!(remaining, Some(12));
        assert!(reset_at.is_none());
    }

    #[test]
    fn test_graphql_error_rate_limit_detection() {
        let by_kind = GraphQlError {
            message: "whatever".to_string(),
            kind: Some("RATE_LIMITED".to_string()),
        };
        assert!(by_kind.is_rate_limited());

        let by_message = GraphQlError {
            message: "API rate limit exceeded for installation".to_string(),
            kind: None,
        };
        assert!(by_message.is_rate_limited());

        let unrelated = GraphQlError {
            message: "Field 'foo' doesn't exist".to_string(),
            kind: None,
        };
        assert!(!unrelated.is_rate_limited());
    }

    #[test]
    fn test_graphql_error_not_found_detection() {
        let by_kind = GraphQlError {
            message: String::new(),
            kind: Some("NOT_FOUND".to_string()),
        };
        assert!(by_kind.is_not_found());

        let by_message = GraphQlError {
            message: "Could not resolve to a Repository with the name 'a/b'.".to_string(),
            kind: None,
        };
        assert!(by_message.is_not_found());
    }

    #[test]
    fn test_graphql_envelope_deserializes() {
        let json = r#"{
            "data": null,
            "errors": [{"type": "NOT_FOUND", "message": "Could not resolve to a Repository"}]
        }"#;

        let envelope: GraphQlResponse<serde_json::Value> = serde_json::from_str(json).unwrap();
        assert!(envelope.data.is_none());
        assert_eq!(envelope.errors.len(), 1);
        assert!(envelope.errors[0].is_not_found());
    }
}
