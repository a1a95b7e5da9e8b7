//! Release source abstraction
//!
//! The reconciliation logic only needs two read-only questions answered by the
//! hosting provider: "what is the latest release of this repository?" and
//! "does this repository exist, and under which canonical name?". Implementors
//! must never touch local state.

use async_trait::async_trait;

use crate::error::Result;
use crate::identity::RepoIdentity;
use crate::model::ReleaseSnapshot;

/// Repository as known to the upstream provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamRepository {
    /// Owner and name with the provider's canonical spelling
    pub identity: RepoIdentity,
    /// Web URL reported by the provider
    pub html_url: Option<String>,
}

/// Upstream provider of release information
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ReleaseSource: Send + Sync {
    /// Latest published release, or `None` when the repository has no release.
    ///
    /// Transport and provider failures are `TrackerError::UpstreamUnavailable`.
    async fn fetch_latest_release(&self, identity: &RepoIdentity)
        -> Result<Option<ReleaseSnapshot>>;

    /// Existence check used when a repository is added.
    async fn lookup_repository(&self, identity: &RepoIdentity)
        -> Result<Option<UpstreamRepository>>;

    /// Provider name for display/logging
    fn provider_name(&self) -> &'static str;
}
