//! Vulnerability advisory collection
//!
//! Queries the OSV database for every package name and flattens each
//! advisory into one row. OSV is unauthenticated, so this pass runs without
//! the token pool.

mod advisory_data;
mod provider;

pub use advisory_data::AdvisoryRow;
pub use provider::{OSV_QUERY_URL, Provider};
