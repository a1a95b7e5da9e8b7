use anyhow::{anyhow, Context};
use async_trait::async_trait;
use octocrab::models::repos::Release;
use octocrab::Octocrab;
use std::env;
use std::process::Command;
use tracing::{debug, info, warn};

use crate::config::GitHubConfig;
use crate::error::{Result, TrackerError};
use crate::identity::RepoIdentity;
use crate::model::ReleaseSnapshot;
use crate::source::{ReleaseSource, UpstreamRepository};

/// GitHub client wrapper with authentication management
pub struct GitHubClient {
    client: Octocrab,
    auth_strategy: AuthStrategy,
}

/// GitHub authentication strategies
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthStrategy {
    /// Use GitHub CLI authentication
    GitHubCLI,
    /// Use environment variable token
    EnvironmentToken,
    /// Unauthenticated requests (public repositories, lower rate limit)
    Anonymous,
}

impl GitHubClient {
    /// Create a new GitHub client according to the configured auth method
    pub fn new(config: &GitHubConfig) -> anyhow::Result<Self> {
        let (auth_strategy, token) = Self::detect_authentication(config)?;

        info!("Using authentication strategy: {:?}", auth_strategy);

        let mut builder = Octocrab::builder();
        if let Some(token) = token {
            builder = builder.personal_token(token);
        }
        if let Some(api_base) = &config.api_base {
            builder = builder
                .base_uri(api_base.as_str())
                .with_context(|| format!("Invalid GitHub API base URL: {}", api_base))?;
        }

        let client = builder.build().context("Failed to create GitHub client")?;

        Ok(Self {
            client,
            auth_strategy,
        })
    }

    /// Wrap an already configured octocrab instance
    pub fn with_octocrab(client: Octocrab) -> Self {
        Self {
            client,
            auth_strategy: AuthStrategy::Anonymous,
        }
    }

    pub fn auth_strategy(&self) -> &AuthStrategy {
        &self.auth_strategy
    }

    /// Detect and obtain GitHub authentication
    fn detect_authentication(config: &GitHubConfig) -> anyhow::Result<(AuthStrategy, Option<String>)> {
        match config.auth_method.as_str() {
            "auto" => {
                // Try GitHub CLI first, then environment token, then go without
                if let Ok(token) = Self::try_github_cli() {
                    Ok((AuthStrategy::GitHubCLI, Some(token)))
                } else if let Ok(token) = Self::try_environment_token() {
                    Ok((AuthStrategy::EnvironmentToken, Some(token)))
                } else {
                    info!("No GitHub credentials found, using unauthenticated requests");
                    Ok((AuthStrategy::Anonymous, None))
                }
            }
            "gh_cli" => {
                let token = Self::try_github_cli()
                    .context("GitHub CLI authentication failed. Run: gh auth login")?;
                Ok((AuthStrategy::GitHubCLI, Some(token)))
            }
            "token" => {
                let token = Self::try_environment_token()
                    .context("GITHUB_TOKEN environment variable not found or invalid")?;
                Ok((AuthStrategy::EnvironmentToken, Some(token)))
            }
            "none" => Ok((AuthStrategy::Anonymous, None)),
            other => Err(anyhow!("Unknown auth method: {}", other)),
        }
    }

    /// Try to get token from GitHub CLI
    fn try_github_cli() -> anyhow::Result<String> {
        debug!("Attempting GitHub CLI authentication");

        if !Self::is_command_available("gh") {
            return Err(anyhow!("GitHub CLI (gh) is not installed"));
        }

        let token_output = Command::new("gh")
            .args(["auth", "token"])
            .output()
            .context("Failed to get GitHub CLI token")?;

        if !token_output.status.success() {
            return Err(anyhow!(
                "GitHub CLI is not authenticated: {}",
                String::from_utf8_lossy(&token_output.stderr).trim()
            ));
        }

        let token = String::from_utf8(token_output.stdout)
            .context("GitHub CLI token is not valid UTF-8")?
            .trim()
            .to_string();

        if token.is_empty() {
            return Err(anyhow!("GitHub CLI returned empty token"));
        }

        debug!("Successfully obtained token from GitHub CLI");
        Ok(token)
    }

    /// Try to get token from environment variable
    fn try_environment_token() -> anyhow::Result<String> {
        debug!("Attempting environment variable authentication");

        let token =
            env::var("GITHUB_TOKEN").context("GITHUB_TOKEN environment variable not set")?;

        if token.is_empty() {
            return Err(anyhow!("GITHUB_TOKEN is empty"));
        }

        if !["ghp_", "gho_", "ghs_", "github_pat_"]
            .iter()
            .any(|prefix| token.starts_with(prefix))
        {
            warn!("GITHUB_TOKEN doesn't look like a GitHub token");
        }

        Ok(token)
    }

    /// Check if a command is available in PATH
    fn is_command_available(command: &str) -> bool {
        Command::new("which")
            .arg(command)
            .output()
            .map(|output| output.status.success())
            .unwrap_or(false)
    }
}

#[async_trait]
impl ReleaseSource for GitHubClient {
    async fn fetch_latest_release(
        &self,
        identity: &RepoIdentity,
    ) -> Result<Option<ReleaseSnapshot>> {
        debug!("Fetching latest release for {}", identity);

        match self
            .client
            .repos(&identity.owner, &identity.name)
            .releases()
            .get_latest()
            .await
        {
            Ok(release) => Ok(Some(release_to_snapshot(release))),
            // GitHub answers 404 both for "no release yet" and for a missing repo
            Err(e) if is_not_found(&e) => {
                debug!("No published release for {}", identity);
                Ok(None)
            }
            Err(e) => {
                warn!("Failed to fetch latest release for {}: {}", identity, e);
                Err(TrackerError::upstream(identity.full_name(), e))
            }
        }
    }

    async fn lookup_repository(
        &self,
        identity: &RepoIdentity,
    ) -> Result<Option<UpstreamRepository>> {
        debug!("Looking up repository {}", identity);

        match self
            .client
            .repos(&identity.owner, &identity.name)
            .get()
            .await
        {
            Ok(repo) => {
                let owner = repo
                    .owner
                    .as_ref()
                    .map(|o| o.login.clone())
                    .unwrap_or_else(|| identity.owner.clone());

                Ok(Some(UpstreamRepository {
                    identity: RepoIdentity::new(owner, repo.name.clone()),
                    html_url: repo.html_url.as_ref().map(|u| u.to_string()),
                }))
            }
            Err(e) if is_not_found(&e) => Ok(None),
            Err(e) => {
                warn!("Failed to look up {}: {}", identity, e);
                Err(TrackerError::upstream(identity.full_name(), e))
            }
        }
    }

    fn provider_name(&self) -> &'static str {
        "GitHub"
    }
}

fn release_to_snapshot(release: Release) -> ReleaseSnapshot {
    ReleaseSnapshot {
        release_id: release.id.to_string(),
        tag: release.tag_name,
        display_name: release.name.filter(|name| !name.is_empty()),
        published_at: release.published_at,
        release_url: release.html_url.to_string(),
    }
}

fn is_not_found(err: &octocrab::Error) -> bool {
    matches!(
        err,
        octocrab::Error::GitHub { source, .. } if source.status_code.as_u16() == 404
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn config(auth_method: &str) -> GitHubConfig {
        GitHubConfig {
            auth_method: auth_method.to_string(),
            ..GitHubConfig::default()
        }
    }

    #[test]
    fn test_unknown_auth_method() {
        let err = GitHubClient::detect_authentication(&config("oauth")).unwrap_err();
        assert!(err.to_string().contains("Unknown auth method"));
    }

    #[test]
    fn test_auth_method_none_is_anonymous() {
        let (strategy, token) = GitHubClient::detect_authentication(&config("none")).unwrap();
        assert_eq!(strategy, AuthStrategy::Anonymous);
        assert!(token.is_none());
    }

    #[test]
    #[serial]
    fn test_environment_token() {
        let previous = env::var("GITHUB_TOKEN").ok();
        env::set_var("GITHUB_TOKEN", "ghp_testtoken");

        let (strategy, token) = GitHubClient::detect_authentication(&config("token")).unwrap();
        assert_eq!(strategy, AuthStrategy::EnvironmentToken);
        assert_eq!(token.as_deref(), Some("ghp_testtoken"));

        match previous {
            Some(value) => env::set_var("GITHUB_TOKEN", value),
            None => env::remove_var("GITHUB_TOKEN"),
        }
    }

    #[test]
    #[serial]
    fn test_token_method_requires_variable() {
        let previous = env::var("GITHUB_TOKEN").ok();
        env::remove_var("GITHUB_TOKEN");

        assert!(GitHubClient::detect_authentication(&config("token")).is_err());

        if let Some(value) = previous {
            env::set_var("GITHUB_TOKEN", value);
        }
    }
}
