use serde::{Deserialize, Serialize};

/// Presence of key governance artifacts in one repository.
///
/// `artifact_score` is the fraction of artifact groups present, in [0, 1];
/// null when the repository could not be inspected at all.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GovernanceRow {
    pub repo_full_name: String,
    pub has_security: bool,
    pub has_code_of_conduct: bool,
    pub has_contributing: bool,
    pub has_codeowners: bool,
    pub has_funding: bool,
    pub artifact_score: Option<f64>,
}

impl GovernanceRow {
    /// A row for a repository that could not be inspected.
    #[must_use]
    pub fn unscored(repo_full_name: String) -> Self {
        Self {
            repo_full_name,
            ..Self::default()
        }
    }
}
