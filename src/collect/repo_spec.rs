use crate::Result;
use core::fmt::{Display, Formatter};
use ohno::{IntoAppError, bail};
use std::sync::Arc;
use url::Url;

/// Identity of one repository to collect: an `owner/name` pair.
///
/// This is the unit of work for the whole engine. Two specs parsed from
/// different spellings of the same repository (bare full name, clone URL,
/// URL with a trailing path) compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RepoSpec {
    owner: Arc<str>,
    name: Arc<str>,
}

impl RepoSpec {
    /// Parse a repository identifier from an `owner/name` string or a repository URL.
    pub fn parse(input: &str) -> Result<Self> {
        let input = input.trim();

        if input.contains("://") {
            return Self::from_url(input);
        }

        let mut segments = input.split('/');
        let (owner, name) = match (segments.next(), segments.next(), segments.next()) {
            (Some(owner), Some(name), None) if !owner.is_empty() && !name.is_empty() => (owner, name),
            _ => bail!("invalid repository identifier '{input}': expected owner/name or a repository URL"),
        };

        Ok(Self {
            owner: Arc::from(owner),
            name: Arc::from(name.trim_end_matches(".git")),
        })
    }

    fn from_url(input: &str) -> Result<Self> {
        let url = Url::parse(input).into_app_err_with(|| format!("invalid repository URL '{input}'"))?;

        let segments: Vec<_> = url.path_segments().map(Iterator::collect).unwrap_or_default();
        if segments.len() < 2 || segments[0].is_empty() || segments[1].is_empty() {
            bail!("invalid repository URL '{input}': missing owner or repository name");
        }

        Ok(Self {
            owner: Arc::from(segments[0]),
            name: Arc::from(segments[1].trim_end_matches(".git")),
        })
    }

    #[must_use]
    pub fn owner(&self) -> &str {
        &self.owner
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The canonical `owner/name` form used as the checkpoint key.
    #[must_use]
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }
}

impl Display for RepoSpec {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}
