//! Request tracking for monitoring outstanding HTTP requests.

use super::progress::Progress;
use core::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use owo_colors::OwoColorize;
use std::sync::Arc;
use strum::{EnumIter, IntoEnumIterator};

/// Topics that can be tracked for progress reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter)]
pub enum TrackedTopic {
    Repos,
    Contributors,
    Governance,
    Advisories,
}

const TOPIC_COUNT: usize = 4;

impl TrackedTopic {
    /// Get the display name for this topic.
    const fn name(self) -> &'static str {
        match self {
            Self::Repos => "repos",
            Self::Contributors => "contributors",
            Self::Governance => "governance",
            Self::Advisories => "advisories",
        }
    }

    /// Convert to array index.
    const fn index(self) -> usize {
        self as usize
    }
}

/// Counter for a specific tracked topic.
#[derive(Debug, Default)]
struct RequestCounter {
    issued: AtomicU64,
    completed: AtomicU64,
    finished: AtomicBool,
}

/// Tracks outstanding requests and updates progress reporting.
///
/// Requests are tracked by topic, with separate counters for the different
/// request types a run issues (repository queries, contributor pages, etc.).
/// Topics whose requests have all completed render green.
#[derive(Clone)]
pub struct RequestTracker {
    counters: Arc<[RequestCounter; TOPIC_COUNT]>,
    progress: Arc<dyn Progress>,
}

impl core::fmt::Debug for RequestTracker {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RequestTracker")
            .field("counters", &self.counters)
            .field("progress", &"<dyn Progress>")
            .finish()
    }
}

impl RequestTracker {
    /// Create a new request tracker with the given progress reporter.
    #[must_use]
    pub fn new(progress: &Arc<dyn Progress>) -> Self {
        let counters: Arc<[RequestCounter; TOPIC_COUNT]> = Arc::default();

        let counters_clone = Arc::clone(&counters);
        let use_colors = progress.use_colors();
        progress.set_determinate(Box::new(move || Self::progress_callback(&counters_clone, use_colors)));

        Self {
            counters,
            progress: Arc::clone(progress),
        }
    }

    /// Print a message line without disrupting the progress indicator.
    pub fn println(&self, msg: &str) {
        self.progress.println(msg);
    }

    /// Mark that `count` new requests have been issued for the given topic.
    pub fn add_requests(&self, topic: TrackedTopic, count: u64) {
        let counter = &self.counters[topic.index()];
        let _ = counter.issued.fetch_add(count, Ordering::Relaxed);
    }

    /// Mark that a request has completed for the given topic.
    ///
    /// The topic renders as finished once all issued requests have completed.
    pub fn complete_request(&self, topic: TrackedTopic) {
        let counter = &self.counters[topic.index()];
        let completed = counter.completed.fetch_add(1, Ordering::Relaxed) + 1;
        let issued = counter.issued.load(Ordering::Relaxed);
        if completed >= issued && issued > 0 {
            counter.finished.store(true, Ordering::Relaxed);
        }
    }

    /// Compute current progress state from counters.
    ///
    /// Returns (`total_length`, `current_position`, `message_string`).
    fn progress_callback(counters: &[RequestCounter; TOPIC_COUNT], use_colors: bool) -> (u64, u64, String) {
        let mut total_issued = 0u64;
        let mut total_completed = 0u64;
        let mut parts = Vec::with_capacity(TOPIC_COUNT);

        for topic in TrackedTopic::iter() {
            let counter = &counters[topic.index()];
            let issued = counter.issued.load(Ordering::Relaxed);
            let completed = counter.completed.load(Ordering::Relaxed);

            if issued > 0 {
                total_issued += issued;
                total_completed += completed;

                let text = format!("{completed}/{issued} {}", topic.name());
                let styled = if use_colors && counter.finished.load(Ordering::Relaxed) {
                    format!("{}", text.green())
                } else {
                    text
                };

                parts.push(styled);
            }
        }

        let message = if parts.is_empty() {
            "No requests".to_string()
        } else {
            parts.join(", ")
        };

        (total_issued, total_completed, message)
    }
}
