//! Configuration loading and management
//!
//! Handles parsing of the optional `.gi.toml` file at the repository root.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::git::DEFAULT_BRANCH;
use crate::issue::STATUS_OPTIONS;

/// Name of the configuration file at the repository root
pub const CONFIG_FILE: &str = ".gi.toml";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Backing store settings
    #[serde(default)]
    pub store: StoreConfig,

    /// Identifier generation settings
    #[serde(default)]
    pub ids: IdsConfig,

    /// Index cache settings
    #[serde(default)]
    pub cache: CacheConfig,

    /// User identity fallback
    #[serde(default)]
    pub user: UserConfig,

    /// Listing defaults
    #[serde(default)]
    pub list: ListConfig,
}

/// Backing store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Branch that holds the issue tree
    #[serde(default = "default_branch")]
    pub branch: String,
}

fn default_branch() -> String {
    DEFAULT_BRANCH.to_string()
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            branch: default_branch(),
        }
    }
}

/// Identifier generation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdsConfig {
    /// Attempts before identifier generation gives up
    #[serde(default = "default_max_attempts")]
    pub max_attempts: usize,
}

fn default_max_attempts() -> usize {
    crate::property::DEFAULT_ID_ATTEMPTS
}

impl Default for IdsConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
        }
    }
}

/// Index cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Persist the issue index between runs
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_true() -> bool {
    true
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// User identity configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserConfig {
    /// Identity used when git has no user configured
    #[serde(default = "default_user")]
    pub default: String,
}

fn default_user() -> String {
    "unknown".to_string()
}

impl Default for UserConfig {
    fn default() -> Self {
        Self {
            default: default_user(),
        }
    }
}

/// Listing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListConfig {
    /// Statuses hidden from `list` and `my` unless `--all` is given
    #[serde(default = "default_hidden_statuses")]
    pub hidden_statuses: Vec<String>,
}

fn default_hidden_statuses() -> Vec<String> {
    vec!["closed".to_string(), "invalid".to_string()]
}

impl Default for ListConfig {
    fn default() -> Self {
        Self {
            hidden_statuses: default_hidden_statuses(),
        }
    }
}

impl Config {
    /// Load configuration from a `.gi.toml` file
    pub fn load(path: &Path) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from repo root, or return defaults
    pub fn load_from_repo(repo_root: &Path) -> Self {
        let config_path = repo_root.join(CONFIG_FILE);
        if config_path.exists() {
            match Self::load(&config_path) {
                Ok(config) => config,
                Err(err) => {
                    tracing::warn!(path = %config_path.display(), error = %err, "ignoring invalid config");
                    Self::default()
                }
            }
        } else {
            Self::default()
        }
    }

    /// Save configuration to a file
    pub fn save(&self, path: &PathBuf) -> crate::error::Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    fn validate(&self) -> crate::error::Result<()> {
        let branch = self.store.branch.trim();
        if branch.is_empty() {
            return Err(crate::error::Error::InvalidConfig(
                "store.branch cannot be empty".to_string(),
            ));
        }
        if branch.contains(char::is_whitespace) || branch.starts_with('-') {
            return Err(crate::error::Error::InvalidConfig(format!(
                "store.branch '{branch}' is not a valid branch name"
            )));
        }

        if self.ids.max_attempts == 0 {
            return Err(crate::error::Error::InvalidConfig(
                "ids.max_attempts must be > 0".to_string(),
            ));
        }

        for status in &self.list.hidden_statuses {
            let known = STATUS_OPTIONS.iter().any(|option| option.key == status.trim());
            if !known {
                return Err(crate::error::Error::InvalidConfig(format!(
                    "list.hidden_statuses has unknown status '{status}'"
                )));
            }
        }

        Ok(())
    }
}
