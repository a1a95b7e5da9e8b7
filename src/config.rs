use anyhow::{anyhow, Context, Result};
use dirs::{config_dir, data_dir};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration structure for reltrack
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct Config {
    /// Tracked repository database
    #[serde(default)]
    pub database: DatabaseConfig,

    /// GitHub authentication and lookup settings
    #[serde(default)]
    pub github: GitHubConfig,

    /// Release synchronization settings
    #[serde(default)]
    pub sync: SyncConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Database configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DatabaseConfig {
    /// SQLite file location (environment variables and ~ are expanded)
    #[serde(default = "default_database_path")]
    pub path: String,
}

/// GitHub configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct GitHubConfig {
    /// Authentication method
    #[serde(default = "default_auth_method")]
    pub auth_method: String, // "auto", "gh_cli", "token", "none"

    /// Host name accepted in repository URLs
    #[serde(default = "default_host")]
    pub host: String,

    /// REST API base URL, for GitHub Enterprise (defaults to api.github.com)
    #[serde(default)]
    pub api_base: Option<String>,

    /// Check that a repository exists upstream before tracking it
    #[serde(default = "default_true")]
    pub verify_on_add: bool,
}

/// Synchronization configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SyncConfig {
    /// Maximum concurrent upstream requests when syncing all repositories
    #[serde(default = "default_max_parallel")]
    pub max_parallel: usize,
}

/// Logging configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String, // "info"

    /// Log format
    #[serde(default = "default_log_format")]
    pub format: String, // "compact", "pretty", "full"
}

// Default value functions
fn default_database_path() -> String {
    match data_dir() {
        Some(dir) => dir.join("reltrack").join("tracker.db").display().to_string(),
        None => "~/.local/share/reltrack/tracker.db".to_string(),
    }
}
fn default_auth_method() -> String {
    "auto".to_string()
}
fn default_host() -> String {
    "github.com".to_string()
}
fn default_true() -> bool {
    true
}
fn default_max_parallel() -> usize {
    4
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_format() -> String {
    "compact".to_string()
}

// Default implementations
impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
        }
    }
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            auth_method: default_auth_method(),
            host: default_host(),
            api_base: None,
            verify_on_add: default_true(),
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            max_parallel: default_max_parallel(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Config {
    /// Load configuration from the default location or create a default config
    pub fn load_or_default() -> Result<Self> {
        let config_path = Self::default_config_path()?;

        if config_path.exists() {
            Self::load(&config_path)
        } else {
            let config = Self::default();

            if let Some(parent) = config_path.parent() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
            }

            config.save(&config_path)?;

            tracing::info!("Created default configuration at: {:?}", config_path);
            Ok(config)
        }
    }

    /// Load configuration from a specific file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        let mut config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;

        config.expand_paths()?;
        config.validate()?;

        Ok(config)
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_yaml::to_string(self).context("Failed to serialize configuration")?;

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {:?}", path))?;

        Ok(())
    }

    /// Get the default configuration file path (XDG compliant)
    pub fn default_config_path() -> Result<PathBuf> {
        let config_dir = config_dir().context("Failed to get user config directory")?;

        Ok(config_dir.join("reltrack").join("config.yml"))
    }

    /// Expand environment variables and ~ in configuration paths
    pub fn expand_paths(&mut self) -> Result<()> {
        self.database.path = shellexpand::full(&self.database.path)
            .context("Failed to expand database path")?
            .into_owned();

        Ok(())
    }

    /// Reject settings that would only fail later
    pub fn validate(&self) -> Result<()> {
        if self.sync.max_parallel == 0 {
            return Err(anyhow!("sync.max_parallel must be at least 1"));
        }
        if self.github.host.trim().is_empty() {
            return Err(anyhow!("github.host must not be empty"));
        }
        Ok(())
    }

    /// Database location with paths expanded
    pub fn database_path(&self) -> Result<PathBuf> {
        let expanded = shellexpand::full(&self.database.path)
            .context("Failed to expand database path")?;
        Ok(PathBuf::from(expanded.as_ref()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;
    use tempfile::TempDir;

    #[test]
    fn test_config_default_values() {
        let config = Config::default();

        assert_eq!(config.github.auth_method, "auto");
        assert_eq!(config.github.host, "github.com");
        assert!(config.github.api_base.is_none());
        assert!(config.github.verify_on_add);
        assert_eq!(config.sync.max_parallel, 4);
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.logging.format, "compact");
        assert!(config.database.path.ends_with("tracker.db"));
    }

    #[test]
    #[serial]
    fn test_expand_paths() {
        env::set_var("TEST_RELTRACK_HOME", "/test/home");

        let mut config = Config::default();
        config.database.path = "${TEST_RELTRACK_HOME}/tracker.db".to_string();

        config.expand_paths().expect("Failed to expand paths");

        assert_eq!(config.database.path, "/test/home/tracker.db");
        assert_eq!(
            config.database_path().unwrap(),
            PathBuf::from("/test/home/tracker.db")
        );

        env::remove_var("TEST_RELTRACK_HOME");
    }

    #[test]
    fn test_config_load_nonexistent_file() {
        let result = Config::load(Path::new("/nonexistent/path/config.yml"));
        assert!(result.is_err());
    }

    #[test]
    fn test_config_save_and_load() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let config_path = temp_dir.path().join("config.yml");

        let mut config = Config::default();
        config.database.path = "/custom/tracker.db".to_string();
        config.github.auth_method = "none".to_string();
        config.sync.max_parallel = 8;

        config.save(&config_path).expect("Failed to save config");
        let loaded = Config::load(&config_path).expect("Failed to load config");

        assert_eq!(loaded.database.path, "/custom/tracker.db");
        assert_eq!(loaded.github.auth_method, "none");
        assert_eq!(loaded.sync.max_parallel, 8);
    }

    #[test]
    fn test_yaml_parsing_with_partial_sections() {
        let yaml_content = r#"
database:
  path: "/var/lib/reltrack/tracker.db"
github:
  auth_method: "token"
  api_base: "https://github.example.com/api/v3"
  host: "github.example.com"
  verify_on_add: false
logging:
  level: "debug"
"#;

        let config: Config = serde_yaml::from_str(yaml_content).expect("Failed to parse YAML");

        assert_eq!(config.database.path, "/var/lib/reltrack/tracker.db");
        assert_eq!(config.github.auth_method, "token");
        assert_eq!(
            config.github.api_base.as_deref(),
            Some("https://github.example.com/api/v3")
        );
        assert_eq!(config.github.host, "github.example.com");
        assert!(!config.github.verify_on_add);
        assert_eq!(config.sync.max_parallel, 4);
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, "compact");
    }

    #[test]
    fn test_validate_rejects_zero_parallelism() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.yml");
        std::fs::write(&config_path, "sync:\n  max_parallel: 0\n").unwrap();

        let err = Config::load(&config_path).unwrap_err();
        assert!(err.to_string().contains("max_parallel"));
    }

    #[test]
    fn test_config_default_path_xdg() {
        let default_path = Config::default_config_path().expect("Failed to get default path");
        assert!(default_path.to_string_lossy().contains("reltrack"));
        assert!(default_path.to_string_lossy().ends_with("config.yml"));
    }
}
