//! The resilient collection engine
//!
//! This module talks to quota-limited, intermittently failing remote APIs on
//! behalf of thousands of independent repositories, and records per-repository
//! outcomes in a crash-safe checkpoint log so that interrupted runs can be
//! resumed without losing completed work.
//!
//! # Implementation Model
//!
//! The engine is layered bottom-up:
//!
//! - [`TokenPool`] tracks per-credential quota state and always hands out the
//!   credential with the most remaining quota, blocking callers until the
//!   earliest known reset when every credential is exhausted.
//! - [`ApiClient`] wraps each outbound request with bounded retry, exponential
//!   backoff, and provider error classification, reporting quota metadata back
//!   to the pool on every response.
//! - [`CheckpointLog`] is an append-only JSONL record store keyed by
//!   repository; a unit with any record is never reattempted on resume.
//! - [`Dispatcher`] fans out one task per repository under a concurrency
//!   bound, contains each unit's failures at the unit boundary, and reports
//!   progress and quota snapshots while the run proceeds.
//! - The extractors in [`github`] map one raw provider response to flat
//!   relational rows; they are total over well-formed responses and degrade
//!   missing fields to nulls instead of failing the unit.
//!
//! The [`governance`] and [`advisories`] providers are additional collection
//! passes built on the same call layer and throttling machinery.

pub mod advisories;
mod checkpoint;
mod dispatcher;
pub mod github;
pub mod governance;
mod outcome;
mod progress;
mod repo_spec;
mod request_tracker;
mod resilient_http;
mod throttler;
mod token_pool;

pub use checkpoint::{CheckpointLog, CheckpointRecord, RecordStatus};
pub use dispatcher::{Dispatcher, RunSummary};
pub use outcome::CallOutcome;
pub use progress::Progress;
pub use repo_spec::RepoSpec;
pub use request_tracker::{RequestTracker, TrackedTopic};
pub use resilient_http::ApiClient;
pub use throttler::Throttler;
pub use token_pool::TokenPool;
