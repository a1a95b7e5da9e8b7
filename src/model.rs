//! Tracked repository records and their external representation

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::identity::RepoIdentity;

/// Latest published release as reported by the upstream provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseSnapshot {
    /// Stable provider identifier of the release; the change-detection key
    pub release_id: String,
    pub tag: String,
    pub display_name: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub release_url: String,
}

/// A repository the user follows, with its cached release state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedRepository {
    pub id: i64,
    pub owner: String,
    pub name: String,
    pub url: String,
    pub latest_release: Option<ReleaseSnapshot>,
    pub seen_by_user: bool,
}

impl TrackedRepository {
    pub fn identity(&self) -> RepoIdentity {
        RepoIdentity::new(&self.owner, &self.name)
    }

    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }

    /// A release is cached that the user has not acknowledged yet
    pub fn has_unseen_release(&self) -> bool {
        self.latest_release.is_some() && !self.seen_by_user
    }
}

/// Externally exposed shape of a tracked repository
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepositoryView {
    pub id: String,
    pub owner: String,
    pub name: String,
    pub url: String,
    pub latest_release: Option<ReleaseView>,
    pub seen_by_user: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseView {
    pub release_id: String,
    pub tag: String,
    pub name: Option<String>,
    pub published_at: Option<String>,
    pub url: String,
}

impl From<&ReleaseSnapshot> for ReleaseView {
    fn from(release: &ReleaseSnapshot) -> Self {
        let ReleaseSnapshot {
            release_id,
            tag,
            display_name,
            published_at,
            release_url,
        } = release;

        Self {
            release_id: release_id.clone(),
            tag: tag.clone(),
            name: display_name.clone(),
            published_at: published_at.as_ref().map(|ts| ts.to_rfc3339()),
            url: release_url.clone(),
        }
    }
}

impl From<&TrackedRepository> for RepositoryView {
    fn from(repo: &TrackedRepository) -> Self {
        // Destructure so a new record field cannot be silently left unmapped
        let TrackedRepository {
            id,
            owner,
            name,
            url,
            latest_release,
            seen_by_user,
        } = repo;

        Self {
            id: id.to_string(),
            owner: owner.clone(),
            name: name.clone(),
            url: url.clone(),
            latest_release: latest_release.as_ref().map(ReleaseView::from),
            seen_by_user: *seen_by_user,
        }
    }
}
