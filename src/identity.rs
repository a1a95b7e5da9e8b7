//! Repository identity resolution
//!
//! Turns the free-form references users type (`https://github.com/acme/widget`,
//! `git@github.com:acme/widget.git`, `acme/widget`, ...) into a canonical
//! owner/name pair. Resolution is purely local: whether the repository really
//! exists is checked by the release source.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;

use crate::error::{Result, TrackerError};

static SHORTHAND: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<owner>[A-Za-z0-9-]+)/(?P<name>[A-Za-z0-9._-]+)$")
        .expect("shorthand pattern is valid")
});

// scheme, userinfo, host, separator, owner, name, then any trailing path/query/fragment
static URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?:[A-Za-z][A-Za-z0-9+.-]*://)?(?:[^@/\s]+@)?(?P<host>[A-Za-z0-9.-]+(?::\d+)?)[/:](?P<owner>[A-Za-z0-9-]+)/(?P<name>[A-Za-z0-9._-]+)(?:[/?#]\S*)?$",
    )
    .expect("url pattern is valid")
});

/// Canonical repository identity as understood by the upstream provider
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepoIdentity {
    pub owner: String,
    pub name: String,
}

impl RepoIdentity {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
        }
    }

    /// Display name in owner/name format
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }

    /// Canonical web URL of the repository on `host`
    pub fn canonical_url(&self, host: &str) -> String {
        format!("https://{}/{}/{}", host, self.owner, self.name)
    }
}

impl fmt::Display for RepoIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// Resolves references for a single hosting provider
#[derive(Debug, Clone)]
pub struct IdentityResolver {
    host: String,
}

impl IdentityResolver {
    pub fn new(host: impl Into<String>) -> Self {
        Self { host: host.into() }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// Resolve a URL or owner/name reference into a canonical identity.
    pub fn resolve(&self, reference: &str) -> Result<RepoIdentity> {
        let reference = reference.trim();
        let invalid = || TrackerError::InvalidReference(reference.to_string());

        let captures = if let Some(caps) = SHORTHAND.captures(reference) {
            caps
        } else {
            let caps = URL.captures(reference).ok_or_else(invalid)?;
            if !self.is_own_host(&caps["host"]) {
                return Err(invalid());
            }
            caps
        };

        let owner = &captures["owner"];
        let raw_name = &captures["name"];
        let name = raw_name.strip_suffix(".git").unwrap_or(raw_name);

        if name.is_empty() || name == "." || name == ".." {
            return Err(invalid());
        }

        Ok(RepoIdentity::new(owner, name))
    }

    fn is_own_host(&self, host: &str) -> bool {
        let host = host.split(':').next().unwrap_or(host);
        let host = host.strip_prefix("www.").unwrap_or(host);
        host.eq_ignore_ascii_case(&self.host)
    }
}

impl Default for IdentityResolver {
    fn default() -> Self {
        Self::new("github.com")
    }
}
