//! Tracking façade
//!
//! The operations exposed to callers. Each one is a thin composition of the
//! identity resolver, the release source, the store and the sync engine;
//! errors from those layers are passed through unchanged.

use std::sync::Arc;
use tracing::{debug, info};

use crate::config::Config;
use crate::error::{Result, TrackerError};
use crate::identity::IdentityResolver;
use crate::model::TrackedRepository;
use crate::source::ReleaseSource;
use crate::store::RepoStore;
use crate::sync::{SyncEngine, SyncOutcome, SyncSummary};

/// Options controlling how [`Tracker::add`] validates a reference
#[derive(Debug, Clone)]
pub struct TrackerOptions {
    /// Host accepted in repository URLs and used for canonical URLs
    pub host: String,
    /// Ask the release source whether the repository exists before inserting
    pub verify_on_add: bool,
    /// Concurrency bound for [`Tracker::sync_all`]
    pub max_parallel: usize,
}

impl Default for TrackerOptions {
    fn default() -> Self {
        Self {
            host: "github.com".to_string(),
            verify_on_add: true,
            max_parallel: 4,
        }
    }
}

impl From<&Config> for TrackerOptions {
    fn from(config: &Config) -> Self {
        Self {
            host: config.github.host.clone(),
            verify_on_add: config.github.verify_on_add,
            max_parallel: config.sync.max_parallel,
        }
    }
}

pub struct Tracker {
    store: Arc<RepoStore>,
    source: Arc<dyn ReleaseSource>,
    resolver: IdentityResolver,
    engine: SyncEngine,
    verify_on_add: bool,
}

impl Tracker {
    pub fn new(store: Arc<RepoStore>, source: Arc<dyn ReleaseSource>, options: TrackerOptions) -> Self {
        let engine = SyncEngine::new(store.clone(), source.clone(), options.max_parallel);

        Self {
            store,
            source,
            resolver: IdentityResolver::new(options.host),
            engine,
            verify_on_add: options.verify_on_add,
        }
    }

    /// Start tracking the repository named by a URL or owner/name reference.
    pub async fn add(&self, reference: &str) -> Result<TrackedRepository> {
        let mut identity = self.resolver.resolve(reference)?;
        let mut url = identity.canonical_url(self.resolver.host());

        if self.verify_on_add {
            let upstream = self
                .source
                .lookup_repository(&identity)
                .await?
                .ok_or_else(|| TrackerError::UnknownRepository(identity.full_name()))?;

            if upstream.identity != identity {
                debug!("{} is canonically {}", identity, upstream.identity);
            }
            identity = upstream.identity;
            url = upstream
                .html_url
                .unwrap_or_else(|| identity.canonical_url(self.resolver.host()));
        }

        let repo = self.store.insert(&identity, &url)?;
        info!("Tracking {} (id {})", repo.full_name(), repo.id);
        Ok(repo)
    }

    /// Stop tracking a repository. Returns whether it was tracked.
    pub fn remove(&self, id: i64) -> Result<bool> {
        let removed = self.store.remove(id)?;
        if removed {
            info!("Stopped tracking repository {}", id);
        }
        Ok(removed)
    }

    pub fn list(&self) -> Result<Vec<TrackedRepository>> {
        self.store.list_all()
    }

    pub fn get(&self, id: i64) -> Result<Option<TrackedRepository>> {
        self.store.get_by_id(id)
    }

    /// Refresh the cached latest release of one repository
    pub async fn sync(&self, id: i64) -> Result<SyncOutcome> {
        self.engine.sync_repository(id).await
    }

    /// Refresh every tracked repository
    pub async fn sync_all(&self) -> Result<SyncSummary> {
        self.engine.sync_all().await
    }

    /// Mark the cached release of a repository as seen by the user
    pub fn acknowledge(&self, id: i64) -> Result<()> {
        if self.store.mark_seen(id)? {
            debug!("Repository {} marked as seen", id);
            Ok(())
        } else {
            Err(TrackerError::NotFound(id))
        }
    }
}
