//! GitHub collection provider
//!
//! Fetches one repository's metadata, recent pull requests, and recent bug
//! issues in a single GraphQL call, plus contributors over REST, and maps the
//! responses to flat rows through the extractor contract.

mod extract;
mod provider;
mod response;
mod rows;

pub use extract::{BugIssues, Contributors, MetadataExtractor, PullRequests, RepoMetadata, RowExtractor};
pub use provider::{GITHUB_GRAPHQL_URL, GITHUB_REST_URL, Provider, UnitReport};
pub use response::{ContributorNode, RepoNode, RepoQueryData};
pub use rows::{BugIssueRow, ContributorRow, PullRequestRow, RecordBundle, RepoMetaRow};
