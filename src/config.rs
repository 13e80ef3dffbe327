use anyhow::{Context, Result};
use dirs::config_dir;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::upload::{DEFAULT_BRANCH, DEFAULT_COMMIT_MESSAGE};

/// Main configuration structure for repo-upload
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct Config {
    /// GitHub endpoint, authentication and target repository
    #[serde(default)]
    pub github: GitHubConfig,

    /// Upload behavior settings
    #[serde(default)]
    pub upload: UploadConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// GitHub configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct GitHubConfig {
    /// REST API base URL (change for GitHub Enterprise)
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Authentication method
    #[serde(default = "default_auth_method")]
    pub auth_method: String, // "auto", "gh_cli", "token"

    /// Default repository owner (user or organization)
    #[serde(default)]
    pub owner: Option<String>,

    /// Default repository name
    #[serde(default)]
    pub repo: Option<String>,
}

/// Upload configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct UploadConfig {
    /// Branch the files are committed to
    #[serde(default = "default_branch")]
    pub branch: String,

    /// Commit message used for every file
    #[serde(default = "default_commit_message")]
    pub commit_message: String,

    /// Directory inside the repository that uploads land in
    #[serde(default)]
    pub remote_prefix: String,

    /// Glob patterns for files and directories skipped by the scanner
    #[serde(default)]
    pub exclude_patterns: Vec<String>,

    /// Descend into symlinked directories while scanning
    #[serde(default)]
    pub follow_symlinks: bool,

    /// Per-request HTTP timeout in seconds
    #[serde(default)]
    pub timeout_secs: Option<u64>,
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
fn default_api_url() -> String {
    "https://api.github.com".to_string()
}
fn default_auth_method() -> String {
    "auto".to_string()
}
fn default_branch() -> String {
    DEFAULT_BRANCH.to_string()
}
fn default_commit_message() -> String {
    DEFAULT_COMMIT_MESSAGE.to_string()
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_format() -> String {
    "compact".to_string()
}

// Default implementations
impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            auth_method: default_auth_method(),
            owner: None,
            repo: None,
        }
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            branch: default_branch(),
            commit_message: default_commit_message(),
            remote_prefix: String::new(),
            exclude_patterns: Vec::new(),
            follow_symlinks: false,
            timeout_secs: None,
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
    /// Load configuration from the default location, falling back to defaults
    pub fn load_or_default() -> Result<Self> {
        let config_path = Self::default_config_path()?;

        if config_path.exists() {
            Self::load(&config_path)
        } else {
            tracing::debug!("No configuration at {:?}, using defaults", config_path);
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        let mut config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;

        config.expand_paths()?;

        Ok(config)
    }

    /// Save configuration to a file, creating parent directories as needed
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }

        let content = serde_yaml::to_string(self).context("Failed to serialize configuration")?;

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {:?}", path))?;

        Ok(())
    }

    /// Get the default configuration file path (XDG compliant)
    pub fn default_config_path() -> Result<PathBuf> {
        let config_dir = config_dir().context("Failed to get user config directory")?;

        Ok(config_dir.join("repo-upload").join("config.yml"))
    }

    /// Expand environment variables in values that may reference them
    pub fn expand_paths(&mut self) -> Result<()> {
        self.github.api_url = shellexpand::env(&self.github.api_url)
            .context("Failed to expand github.api_url")?
            .into_owned();

        self.upload.remote_prefix = shellexpand::env(&self.upload.remote_prefix)
            .context("Failed to expand upload.remote_prefix")?
            .into_owned();

        Ok(())
    }

    /// Request timeout as a `Duration`, if one is configured
    pub fn request_timeout(&self) -> Option<std::time::Duration> {
        self.upload
            .timeout_secs
            .filter(|secs| *secs > 0)
            .map(std::time::Duration::from_secs)
    }
}
