//! Bounded-concurrency fan-out over the remaining work units.

use super::checkpoint::{CheckpointLog, CheckpointRecord, RecordStatus};
use super::github::{Provider, UnitReport};
use super::repo_spec::RepoSpec;
use super::request_tracker::{RequestTracker, TrackedTopic};
use super::throttler::Throttler;
use super::token_pool::TokenPool;
use crate::Result;
use core::sync::atomic::{AtomicUsize, Ordering};
use futures_util::future::join_all;
use std::sync::Arc;

const LOG_TARGET: &str = "dispatcher";

/// How many completed units between quota snapshots in the progress output.
const QUOTA_SNAPSHOT_INTERVAL: usize = 20;

/// Counts of unit outcomes for one run.
///
/// Individual unit failures never surface here as errors; only conditions
/// that make the whole run impossible abort it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Units supplied for this run, including ones recorded by earlier runs.
    pub total: usize,
    /// Units skipped up front because the checkpoint log already had a record.
    pub already_done: usize,
    pub done: usize,
    pub skipped: usize,
    pub errored: usize,
}

impl RunSummary {
    /// Units never attempted this run (nonzero only when a run aborts).
    #[must_use]
    pub const fn remaining(&self) -> usize {
        self.total
            .saturating_sub(self.already_done)
            .saturating_sub(self.done)
            .saturating_sub(self.skipped)
            .saturating_sub(self.errored)
    }
}

/// Fans out one collection task per work unit under a concurrency bound and
/// records every unit's terminal outcome in the checkpoint log.
#[derive(Debug)]
pub struct Dispatcher {
    provider: Provider,
    checkpoint: Arc<CheckpointLog>,
    pool: Arc<TokenPool>,
    throttler: Arc<Throttler>,
}

impl Dispatcher {
    #[must_use]
    pub fn new(provider: Provider, checkpoint: Arc<CheckpointLog>, pool: Arc<TokenPool>, concurrency: usize) -> Self {
        Self {
            provider,
            checkpoint,
            pool,
            throttler: Throttler::new(concurrency.max(1)),
        }
    }

    /// Run collection over `units`, skipping everything the checkpoint log
    /// already has a record for.
    ///
    /// Per unit the lifecycle is strictly pending → in-flight → one terminal
    /// record; a unit never re-enters flight within a run. Unit failures are
    /// contained: the only errors returned here are run-level ones (the
    /// checkpoint log became unwritable).
    pub async fn run(&self, units: &[RepoSpec], retry_failed: bool, tracker: &RequestTracker) -> Result<RunSummary> {
        let done_ids = self.checkpoint.load_done_ids(retry_failed)?;

        let remaining: Vec<&RepoSpec> = units.iter().filter(|unit| !done_ids.contains(&unit.full_name())).collect();

        let mut summary = RunSummary {
            total: units.len(),
            already_done: units.len() - remaining.len(),
            ..RunSummary::default()
        };

        log::info!(
            target: LOG_TARGET,
            "{} unit(s) total, {} already recorded, {} remaining",
            summary.total,
            summary.already_done,
            remaining.len()
        );

        tracker.add_requests(TrackedTopic::Repos, remaining.len() as u64);

        let completed = AtomicUsize::new(0);
        let outcomes = join_all(
            remaining
                .iter()
                .map(|unit| self.collect_one(unit, tracker, &completed)),
        )
        .await;

        for outcome in outcomes {
            match outcome? {
                RecordStatus::Done => summary.done += 1,
                RecordStatus::Skipped => summary.skipped += 1,
                RecordStatus::Errored => summary.errored += 1,
            }
        }

        Ok(summary)
    }

    /// Process a single unit: call, extract, checkpoint — strictly in order.
    async fn collect_one(&self, unit: &RepoSpec, tracker: &RequestTracker, completed: &AtomicUsize) -> Result<RecordStatus> {
        let _permit = self.throttler.acquire().await;

        let record = match self.provider.collect_repo(unit, tracker).await {
            UnitReport::Collected(bundle) => CheckpointRecord::done(unit.full_name(), *bundle),
            UnitReport::Skipped { reason } => {
                log::info!(target: LOG_TARGET, "skipping '{unit}': {reason}");
                CheckpointRecord::skipped(unit.full_name(), reason)
            }
            UnitReport::Failed { error } => {
                log::warn!(target: LOG_TARGET, "unit '{unit}' failed: {error}");
                CheckpointRecord::errored(unit.full_name(), error)
            }
        };

        let status = record.status;
        self.checkpoint.append(&record)?;
        tracker.complete_request(TrackedTopic::Repos);

        let finished = completed.fetch_add(1, Ordering::Relaxed) + 1;
        if finished % QUOTA_SNAPSHOT_INTERVAL == 0 {
            tracker.println(&format!("[quota] {}", self.pool.status()));
        }

        Ok(status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_remaining() {
        let summary = RunSummary {
            total: 10,
            already_done: 4,
            done: 3,
            skipped: 1,
            errored: 1,
        };
        assert_eq!(summary.remaining(), 1);
    }

    #[test]
    fn test_summary_remaining_never_underflows() {
        let summary = RunSummary {
            total: 1,
            already_done: 1,
            done: 1,
            skipped: 0,
            errored: 0,
        };
        assert_eq!(summary.remaining(), 0);
    }
}
