//! Shared quota tracking for a set of interchangeable API credentials.

use crate::Result;
use chrono::{DateTime, Utc};
use core::time::Duration;
use ohno::bail;
use std::sync::{Arc, Mutex};

const LOG_TARGET: &str = "token_pool";

/// Quota assumed for a credential before its first live report.
const INITIAL_QUOTA: usize = 5000;

/// Quota granted when a reset deadline passes without a live report.
/// Deliberately far below the real post-reset allowance; the next response's
/// headers correct it.
const QUOTA_AFTER_RESET: usize = 100;

/// Extra sleep past a reset deadline to absorb provider clock skew.
const RESET_SAFETY_MARGIN: Duration = Duration::from_secs(1);

/// Upper bound on a single wait for a quota reset.
const MAX_RESET_WAIT: Duration = Duration::from_secs(3600);

#[derive(Debug, Clone)]
struct TokenState {
    secret: Arc<str>,
    remaining: usize,
    reset_at: DateTime<Utc>,
}

/// A credential handed out by [`TokenPool::acquire`].
///
/// Carries the slot index so call outcomes can be reported back against the
/// credential that produced them.
#[derive(Debug, Clone)]
pub struct Lease {
    secret: Arc<str>,
    slot: usize,
}

impl Lease {
    #[must_use]
    pub fn secret(&self) -> &str {
        &self.secret
    }
}

/// Tracks quota state for a set of interchangeable API credentials.
///
/// The pool is constructed once per run and passed explicitly to everything
/// that makes authenticated calls; credential state is mutated only through
/// [`TokenPool::report`] and the heuristic reset applied when a known reset
/// deadline passes.
#[derive(Debug)]
pub struct TokenPool {
    tokens: Mutex<Vec<TokenState>>,
}

impl TokenPool {
    /// Create a pool from the configured secrets.
    ///
    /// Fails when no secrets are configured: with nothing to rotate the run
    /// cannot make a single authenticated call.
    pub fn new(secrets: impl IntoIterator<Item = String>, now: DateTime<Utc>) -> Result<Self> {
        let tokens: Vec<TokenState> = secrets
            .into_iter()
            .filter(|s| !s.trim().is_empty())
            .map(|s| TokenState {
                secret: Arc::from(s.trim()),
                remaining: INITIAL_QUOTA,
                reset_at: now + chrono::Duration::hours(1),
            })
            .collect();

        if tokens.is_empty() {
            bail!("no API tokens configured; set GITHUB_TOKENS or pass --github-token");
        }

        Ok(Self {
            tokens: Mutex::new(tokens),
        })
    }

    /// Number of credentials in the pool.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tokens.lock().expect("lock not poisoned").len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Acquire the credential with the most remaining quota.
    ///
    /// When every credential is exhausted, sleeps (without holding the pool
    /// lock) until the earliest known reset deadline plus a small safety
    /// margin, applies the heuristic quota reset, and tries again. The
    /// returned lease always had positive remaining quota at selection time.
    pub async fn acquire(&self) -> Lease {
        loop {
            let earliest_reset = {
                let mut tokens = self.tokens.lock().expect("lock not poisoned");
                let now = Utc::now();
                reset_expired(&mut tokens, now);

                let best = tokens
                    .iter()
                    .enumerate()
                    .max_by_key(|(_, t)| t.remaining)
                    .map(|(i, _)| i)
                    .expect("pool is never empty");

                if tokens[best].remaining > 0 {
                    return Lease {
                        secret: Arc::clone(&tokens[best].secret),
                        slot: best,
                    };
                }

                tokens.iter().map(|t| t.reset_at).min().expect("pool is never empty")
            };

            let now = Utc::now();
            let until_reset = (earliest_reset - now).to_std().unwrap_or(Duration::ZERO);
            let wait = until_reset.min(MAX_RESET_WAIT) + RESET_SAFETY_MARGIN;

            log::warn!(
                target: LOG_TARGET,
                "all tokens exhausted, sleeping until {} (+{}s margin)",
                earliest_reset.with_timezone(&chrono::Local).format("%T"),
                RESET_SAFETY_MARGIN.as_secs()
            );

            tokio::time::sleep(wait).await;
        }
    }

    /// Update a credential's quota state from a call's response metadata.
    ///
    /// A no-op when the response carried no quota information.
    pub fn report(&self, lease: &Lease, remaining: Option<usize>, reset_at: Option<DateTime<Utc>>) {
        if remaining.is_none() && reset_at.is_none() {
            return;
        }

        let mut tokens = self.tokens.lock().expect("lock not poisoned");
        let Some(token) = tokens.get_mut(lease.slot) else {
            return;
        };

        if let Some(remaining) = remaining {
            token.remaining = remaining;
        }
        if let Some(reset_at) = reset_at {
            token.reset_at = reset_at;
        }
    }

    /// One-line quota snapshot for progress reporting.
    #[must_use]
    pub fn status(&self) -> String {
        let tokens = self.tokens.lock().expect("lock not poisoned");
        tokens
            .iter()
            .map(|t| {
                format!(
                    "…{}: {} remaining, resets {}",
                    tail(&t.secret),
                    t.remaining,
                    t.reset_at.with_timezone(&chrono::Local).format("%T")
                )
            })
            .collect::<Vec<_>>()
            .join(" | ")
    }
}

/// Apply the heuristic quota reset to every credential whose deadline passed.
///
/// The deadline is pushed an hour forward so that concurrent wakers do not
/// re-grant quota a second time.
fn reset_expired(tokens: &mut [TokenState], now: DateTime<Utc>) {
    for token in tokens {
        if token.reset_at <= now {
            token.remaining = token.remaining.max(QUOTA_AFTER_RESET);
            token.reset_at = now + chrono::Duration::hours(1);
        }
    }
}

/// Last four characters of a secret, for log-safe identification.
fn tail(secret: &str) -> &str {
    let n = secret.len();
    &secret[n.saturating_sub(4)..]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    fn pool(n: usize) -> TokenPool {
        TokenPool::new((0..n).map(|i| format!("ghp_test_token_{i}")), Utc::now()).unwrap()
    }

    #[test]
    fn test_zero_tokens_is_fatal() {
        let _ = TokenPool::new(Vec::new(), Utc::now()).unwrap_err();
    }

    #[test]
    fn test_blank_tokens_are_ignored() {
        let _ = TokenPool::new(vec![String::new(), "  ".to_string()], Utc::now()).unwrap_err();
    }

    #[tokio::test]
    async fn test_acquire_prefers_highest_quota() {
        let pool = pool(2);

        let first = pool.acquire().await;
        pool.report(&first, Some(10), None);

        // The other token still has its initial quota and must win now.
        let second = pool.acquire().await;
        assert_ne!(first.secret(), second.secret());
    }

    #[tokio::test]
    async fn test_report_without_quota_info_is_noop() {
        let pool = pool(1);
        let lease = pool.acquire().await;

        let before = pool.status();
        pool.report(&lease, None, None);
        assert_eq!(pool.status(), before);
    }

    #[tokio::test]
    async fn test_exhausted_pool_blocks_until_reset() {
        let pool = pool(2);
        let reset_at = Utc::now() + chrono::Duration::milliseconds(300);

        let lease_a = pool.acquire().await;
        pool.report(&lease_a, Some(0), Some(reset_at));
        let lease_b = pool.acquire().await;
        pool.report(&lease_b, Some(0), Some(reset_at));

        let start = Instant::now();
        let lease = pool.acquire().await;
        let elapsed = start.elapsed();

        // Slept past the reset deadline plus the safety margin, then handed
        // out a token with the heuristically restored quota.
        assert!(elapsed >= Duration::from_millis(300) + RESET_SAFETY_MARGIN - Duration::from_millis(50));
        assert!(!lease.secret().is_empty());
    }

    #[tokio::test]
    async fn test_status_reflects_reported_quota() {
        let pool = pool(1);
        let lease = pool.acquire().await;
        pool.report(&lease, Some(4999), None);

        assert!(pool.status().contains("4999 remaining"));
    }
}
