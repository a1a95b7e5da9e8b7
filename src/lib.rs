//! reltrack - Track GitHub repositories and their latest releases
//!
//! reltrack keeps a local SQLite record of the repositories a user follows and
//! the latest release each one has published. Releases are refreshed on demand,
//! and every newly detected release is flagged as unseen until the user
//! acknowledges it.
//!
//! ## Modules
//!
//! - [`identity`]: Parsing repository URLs and owner/name references
//! - [`source`]: The release source trait; [`github`] implements it with octocrab
//! - [`store`]: SQLite persistence of tracked repositories
//! - [`sync`]: Release change detection and reconciliation
//! - [`tracker`]: The operations exposed to callers
//! - [`config`]: YAML configuration with XDG locations

pub mod config;
pub mod error;
pub mod github;
pub mod identity;
pub mod model;
pub mod source;
pub mod store;
pub mod sync;
pub mod tracker;

pub use config::Config;
pub use error::TrackerError;
pub use github::GitHubClient;
pub use identity::{IdentityResolver, RepoIdentity};
pub use model::{ReleaseSnapshot, RepositoryView, TrackedRepository};
pub use source::{ReleaseSource, UpstreamRepository};
pub use store::RepoStore;
pub use sync::{ReleaseChange, SyncEngine, SyncOutcome, SyncSummary};
pub use tracker::{Tracker, TrackerOptions};
