//! Error taxonomy for tracking operations

use thiserror::Error;

/// Errors surfaced by the tracker, store and release source.
#[derive(Debug, Error)]
pub enum TrackerError {
    /// The repository reference could not be parsed into an owner/name pair
    #[error("invalid repository reference '{0}': expected a GitHub URL or owner/name")]
    InvalidReference(String),

    /// A repository with the same owner/name is already tracked
    #[error("repository '{0}' is already tracked")]
    DuplicateName(String),

    /// A repository with the same URL is already tracked
    #[error("repository URL '{0}' is already tracked")]
    DuplicateUrl(String),

    /// No tracked repository has this id
    #[error("no tracked repository with id {0}")]
    NotFound(i64),

    /// The upstream provider could not be reached or returned an error
    #[error("upstream unavailable for {repository}: {reason}")]
    UpstreamUnavailable { repository: String, reason: String },

    /// The repository exists but has no published release yet
    #[error("no release found for {0}")]
    NoReleaseFound(String),

    /// The upstream provider does not know this repository
    #[error("repository '{0}' does not exist upstream")]
    UnknownRepository(String),

    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl TrackerError {
    /// Whether retrying the same call later may succeed.
    ///
    /// Only upstream failures qualify; `NoReleaseFound` is a terminal status and
    /// everything else is a caller or storage error.
    pub fn is_retryable(&self) -> bool {
        matches!(self, TrackerError::UpstreamUnavailable { .. })
    }

    pub(crate) fn upstream(repository: impl Into<String>, reason: impl ToString) -> Self {
        TrackerError::UpstreamUnavailable {
            repository: repository.into(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, TrackerError>;
