//! Configuration management with layered hierarchy

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

/// Firestore's name for the default database
pub const DEFAULT_DATABASE: &str = "(default)";

/// Admin CLI configuration with layered hierarchy
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Firebase project id
    pub project_id: Option<String>,

    /// Web API key used for sign-in
    pub api_key: Option<String>,

    /// Firestore database id
    pub database: Option<String>,

    /// Default output format
    pub default_format: Option<String>,

    /// Per-request timeout; absent means wait indefinitely
    pub timeout_secs: Option<u64>,
}

/// Errors raised when configuration is missing or unusable
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("'{key}' is not configured. Run 'lfa config set {key} <value>' or set {env}")]
    Missing { key: &'static str, env: &'static str },

    #[error("Could not determine a configuration directory; set LFA_CONFIG_DIR")]
    NoConfigDir,

    #[error("Invalid value for '{key}': {message}")]
    Invalid { key: String, message: String },
}

impl Config {
    /// Load configuration from all sources, merging in priority order
    pub fn load() -> Self {
        let mut config = Config::default();

        // 1. Built-in defaults (already in Default impl)

        // 2. User config file
        if let Some(path) = Self::config_path() {
            if path.exists() {
                match std::fs::read_to_string(&path) {
                    Ok(contents) => match serde_yml::from_str::<Config>(&contents) {
                        Ok(file) => config.merge(file),
                        Err(e) => warn!(path = %path.display(), error = %e, "ignoring unreadable config"),
                    },
                    Err(e) => warn!(path = %path.display(), error = %e, "ignoring unreadable config"),
                }
            }
        }

        // 3. Environment variables
        config.merge(Self::from_env());

        config
    }

    fn from_env() -> Self {
        Config {
            project_id: std::env::var("LFA_PROJECT_ID").ok(),
            api_key: std::env::var("LFA_API_KEY").ok(),
            database: std::env::var("LFA_DATABASE").ok(),
            default_format: None,
            timeout_secs: std::env::var("LFA_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok()),
        }
    }

    /// Directory holding the config file and the saved session
    pub fn config_dir() -> Option<PathBuf> {
        if let Ok(dir) = std::env::var("LFA_CONFIG_DIR") {
            return Some(PathBuf::from(dir));
        }
        directories::ProjectDirs::from("", "", "lfa").map(|dirs| dirs.config_dir().to_path_buf())
    }

    /// Get the path to the config file
    pub fn config_path() -> Option<PathBuf> {
        Self::config_dir().map(|dir| dir.join("config.yaml"))
    }

    /// Merge another config into this one (other takes precedence)
    fn merge(&mut self, other: Config) {
        if other.project_id.is_some() {
            self.project_id = other.project_id;
        }
        if other.api_key.is_some() {
            self.api_key = other.api_key;
        }
        if other.database.is_some() {
            self.database = other.database;
        }
        if other.default_format.is_some() {
            self.default_format = other.default_format;
        }
        if other.timeout_secs.is_some() {
            self.timeout_secs = other.timeout_secs;
        }
    }

    pub fn project_id(&self) -> Result<&str, ConfigError> {
        self.project_id.as_deref().ok_or(ConfigError::Missing {
            key: "project_id",
            env: "LFA_PROJECT_ID",
        })
    }

    pub fn api_key(&self) -> Result<&str, ConfigError> {
        self.api_key.as_deref().ok_or(ConfigError::Missing {
            key: "api_key",
            env: "LFA_API_KEY",
        })
    }

    pub fn database(&self) -> &str {
        self.database.as_deref().unwrap_or(DEFAULT_DATABASE)
    }

    /// HTTP agent honoring the configured timeout
    pub fn http_agent(&self) -> ureq::Agent {
        let mut builder = ureq::AgentBuilder::new();
        if let Some(secs) = self.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        builder.build()
    }
}
