use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One known vulnerability affecting one package.
///
/// Severity and fix information in OSV entries is messy; the raw severity
/// score and semicolon-joined references are kept for downstream parsing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AdvisoryRow {
    pub package_name: String,
    pub osv_id: Option<String>,
    pub published: Option<DateTime<Utc>>,
    pub modified: Option<DateTime<Utc>>,
    pub summary: Option<String>,
    pub details: Option<String>,
    pub severity_raw: Option<String>,
    pub references: Option<String>,
    pub aliases: Option<String>,
    /// Set when the package's query failed; the row then carries no advisory.
    pub error: Option<String>,
}

impl AdvisoryRow {
    /// A row recording that a package's query failed.
    #[must_use]
    pub fn errored(package_name: String, error: String) -> Self {
        Self {
            package_name,
            error: Some(error),
            ..Self::default()
        }
    }
}
