//! Sync Engine - Reconciles cached release snapshots with the upstream provider
//!
//! A sync is split into two independent steps: a read-only fetch through the
//! [`ReleaseSource`] and a conditional write through the [`RepoStore`]. The
//! decision between them is made by [`detect_change`], which compares release
//! ids only. Tags can be reused and releases can be renamed, so neither the tag
//! nor the timestamp is a reliable key.

use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::error::{Result, TrackerError};
use crate::model::{ReleaseSnapshot, TrackedRepository};
use crate::source::ReleaseSource;
use crate::store::RepoStore;

/// How a fetched release relates to the cached one
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReleaseChange {
    /// Nothing was cached before
    First,
    /// A different release replaced the cached one
    Updated { previous_release_id: String },
    /// The cached release is still the latest
    Unchanged,
}

impl ReleaseChange {
    pub fn is_change(&self) -> bool {
        !matches!(self, ReleaseChange::Unchanged)
    }
}

/// Compare a fetched release with the cached snapshot by release id
pub fn detect_change(cached: Option<&ReleaseSnapshot>, fetched: &ReleaseSnapshot) -> ReleaseChange {
    match cached {
        None => ReleaseChange::First,
        Some(cached) if cached.release_id == fetched.release_id => ReleaseChange::Unchanged,
        Some(cached) => ReleaseChange::Updated {
            previous_release_id: cached.release_id.clone(),
        },
    }
}

/// Result of syncing a single repository
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOutcome {
    pub repository: TrackedRepository,
    pub change: ReleaseChange,
}

/// Per-repository status within a sync-all run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepoSyncStatus {
    Updated { tag: String },
    Unchanged,
    NoRelease,
    Failed { error: String, retryable: bool },
}

#[derive(Debug, Clone)]
pub struct RepoSyncResult {
    pub id: i64,
    pub full_name: String,
    pub status: RepoSyncStatus,
}

/// Results from syncing every tracked repository
#[derive(Debug, Clone)]
pub struct SyncSummary {
    pub total_repositories: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub no_release: usize,
    pub failed: usize,
    pub duration: Duration,
    pub results: Vec<RepoSyncResult>,
}

/// Reconciliation engine for tracked repositories
#[derive(Clone)]
pub struct SyncEngine {
    store: Arc<RepoStore>,
    source: Arc<dyn ReleaseSource>,
    max_parallel: usize,
}

impl SyncEngine {
    pub fn new(store: Arc<RepoStore>, source: Arc<dyn ReleaseSource>, max_parallel: usize) -> Self {
        Self {
            store,
            source,
            max_parallel: max_parallel.max(1),
        }
    }

    /// Bring one repository's cached release up to date.
    ///
    /// Fails with `NotFound` for an unknown id, `UpstreamUnavailable` when the
    /// provider cannot be reached and `NoReleaseFound` when the repository has
    /// no release. None of these failures write anything.
    pub async fn sync_repository(&self, id: i64) -> Result<SyncOutcome> {
        let repo = self.store.get_by_id(id)?.ok_or(TrackerError::NotFound(id))?;
        let identity = repo.identity();

        let fetched = self
            .source
            .fetch_latest_release(&identity)
            .await?
            .ok_or_else(|| TrackerError::NoReleaseFound(identity.full_name()))?;

        let change = detect_change(repo.latest_release.as_ref(), &fetched);
        if !change.is_change() {
            debug!("{} is still at {}", identity, fetched.tag);
            return Ok(SyncOutcome {
                repository: repo,
                change,
            });
        }

        let (repository, written) = self.store.update_release_if_changed(id, &fetched)?;
        if !written {
            // A concurrent sync stored the same release first
            debug!("{} was already updated to {}", identity, fetched.tag);
            return Ok(SyncOutcome {
                repository,
                change: ReleaseChange::Unchanged,
            });
        }

        info!("New release for {}: {}", identity, fetched.tag);
        Ok(SyncOutcome { repository, change })
    }

    /// Sync every tracked repository, at most `max_parallel` at a time.
    ///
    /// Failures are recorded per repository and do not stop the run.
    pub async fn sync_all(&self) -> Result<SyncSummary> {
        let start_time = Instant::now();
        let repos = self.store.list_all()?;

        info!(
            "Syncing {} repositories with {} (max {} parallel)",
            repos.len(),
            self.source.provider_name(),
            self.max_parallel
        );

        let mut results: Vec<RepoSyncResult> = stream::iter(repos)
            .map(|repo| async move {
                let status = match self.sync_repository(repo.id).await {
                    Ok(outcome) if outcome.change.is_change() => RepoSyncStatus::Updated {
                        tag: outcome
                            .repository
                            .latest_release
                            .map(|release| release.tag)
                            .unwrap_or_default(),
                    },
                    Ok(_) => RepoSyncStatus::Unchanged,
                    Err(TrackerError::NoReleaseFound(_)) => RepoSyncStatus::NoRelease,
                    Err(e) => {
                        warn!("Failed to sync {}: {}", repo.full_name(), e);
                        RepoSyncStatus::Failed {
                            retryable: e.is_retryable(),
                            error: e.to_string(),
                        }
                    }
                };

                RepoSyncResult {
                    id: repo.id,
                    full_name: repo.full_name(),
                    status,
                }
            })
            .buffer_unordered(self.max_parallel)
            .collect()
            .await;

        results.sort_by_key(|result| result.id);

        let summary = compile_summary(results, start_time.elapsed());

        info!(
            "Sync completed in {:.2}s: {} updated, {} unchanged, {} without release, {} failed",
            summary.duration.as_secs_f64(),
            summary.updated,
            summary.unchanged,
            summary.no_release,
            summary.failed
        );

        Ok(summary)
    }
}

fn compile_summary(results: Vec<RepoSyncResult>, duration: Duration) -> SyncSummary {
    let count = |pred: fn(&RepoSyncStatus) -> bool| results.iter().filter(|r| pred(&r.status)).count();

    SyncSummary {
        total_repositories: results.len(),
        updated: count(|s| matches!(s, RepoSyncStatus::Updated { .. })),
        unchanged: count(|s| matches!(s, RepoSyncStatus::Unchanged)),
        no_release: count(|s| matches!(s, RepoSyncStatus::NoRelease)),
        failed: count(|s| matches!(s, RepoSyncStatus::Failed { .. })),
        duration,
        results,
    }
}
