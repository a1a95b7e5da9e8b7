//! Common test utilities and helpers for reltrack tests
#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use reltrack::error::Result;
use reltrack::{
    ReleaseSnapshot, ReleaseSource, RepoIdentity, RepoStore, Tracker, TrackerError,
    TrackerOptions, UpstreamRepository,
};

/// What the stubbed provider answers for a latest-release request
#[derive(Debug, Clone)]
pub enum Upstream {
    Release(ReleaseSnapshot),
    NoRelease,
    Down,
}

/// Scriptable release source standing in for GitHub
pub struct StubSource {
    latest: Mutex<Upstream>,
    known: Mutex<Vec<UpstreamRepository>>,
    lookup_down: Mutex<bool>,
    fetches: AtomicUsize,
}

impl StubSource {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            latest: Mutex::new(Upstream::NoRelease),
            known: Mutex::new(Vec::new()),
            lookup_down: Mutex::new(false),
            fetches: AtomicUsize::new(0),
        })
    }

    pub fn set_latest(&self, upstream: Upstream) {
        *self.latest.lock().unwrap() = upstream;
    }

    /// Make a repository known to the existence check, under its canonical spelling
    pub fn add_known(&self, owner: &str, name: &str) {
        self.known.lock().unwrap().push(UpstreamRepository {
            identity: RepoIdentity::new(owner, name),
            html_url: Some(format!("https://github.com/{}/{}", owner, name)),
        });
    }

    pub fn set_lookup_down(&self, down: bool) {
        *self.lookup_down.lock().unwrap() = down;
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ReleaseSource for StubSource {
    async fn fetch_latest_release(
        &self,
        identity: &RepoIdentity,
    ) -> Result<Option<ReleaseSnapshot>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        match self.latest.lock().unwrap().clone() {
            Upstream::Release(release) => Ok(Some(release)),
            Upstream::NoRelease => Ok(None),
            Upstream::Down => Err(TrackerError::UpstreamUnavailable {
                repository: identity.full_name(),
                reason: "503 Service Unavailable".to_string(),
            }),
        }
    }

    async fn lookup_repository(
        &self,
        identity: &RepoIdentity,
    ) -> Result<Option<UpstreamRepository>> {
        if *self.lookup_down.lock().unwrap() {
            return Err(TrackerError::UpstreamUnavailable {
                repository: identity.full_name(),
                reason: "connection refused".to_string(),
            });
        }

        Ok(self
            .known
            .lock()
            .unwrap()
            .iter()
            .find(|repo| {
                repo.identity.owner.eq_ignore_ascii_case(&identity.owner)
                    && repo.identity.name.eq_ignore_ascii_case(&identity.name)
            })
            .cloned())
    }

    fn provider_name(&self) -> &'static str {
        "stub"
    }
}

/// Release snapshot with predictable URLs
pub fn release(release_id: &str, tag: &str) -> ReleaseSnapshot {
    ReleaseSnapshot {
        release_id: release_id.to_string(),
        tag: tag.to_string(),
        display_name: Some(format!("Release {}", tag)),
        published_at: None,
        release_url: format!("https://github.com/acme/widget/releases/tag/{}", tag),
    }
}

/// Tracker over an in-memory store; existence checks disabled
pub fn offline_tracker(source: Arc<StubSource>) -> (Tracker, Arc<RepoStore>) {
    tracker_with(source, false)
}

/// Tracker over an in-memory store that verifies repositories on add
pub fn verifying_tracker(source: Arc<StubSource>) -> (Tracker, Arc<RepoStore>) {
    tracker_with(source, true)
}

fn tracker_with(source: Arc<StubSource>, verify_on_add: bool) -> (Tracker, Arc<RepoStore>) {
    let store = Arc::new(RepoStore::open_in_memory().expect("Failed to open in-memory store"));
    let options = TrackerOptions {
        verify_on_add,
        ..TrackerOptions::default()
    };
    (Tracker::new(store.clone(), source, options), store)
}
