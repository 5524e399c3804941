//! Configuration
//!
//! Settings are layered: built-in defaults, then the YAML config file, then
//! environment variables. Front ends apply their own overrides last.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;
use url::Url;

/// Environment variable holding the generation service base URL
pub const API_URL_ENV: &str = "STORYFORGE_API_URL";

/// Environment variable holding the request timeout in seconds
pub const TIMEOUT_ENV: &str = "STORYFORGE_TIMEOUT_SECS";

/// Environment variable overriding the config file location
pub const CONFIG_PATH_ENV: &str = "STORYFORGE_CONFIG";

/// Errors raised while loading or saving configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path:?}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_yaml::Error,
    },

    #[error("Failed to serialize config: {0}")]
    Serialize(#[source] serde_yaml::Error),

    #[error("Failed to write config file {path:?}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid API URL '{value}': {source}")]
    InvalidUrl {
        value: String,
        source: url::ParseError,
    },

    #[error("Invalid timeout '{0}': expected a whole number of seconds")]
    InvalidTimeout(String),

    #[error("No API URL configured. Set {} or api_url in the config file", API_URL_ENV)]
    MissingApiUrl,
}

/// StoryForge settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Base URL of the generation service
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<Url>,

    /// Request timeout; no timeout when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

impl Config {
    /// Load the config file (if present) and apply environment overrides
    pub fn load() -> Result<Self, ConfigError> {
        let config = match get_config_path() {
            Some(path) => Self::load_file(&path)?,
            None => Self::default(),
        };
        config.apply_vars(|key| std::env::var(key).ok())
    }

    /// Load settings from a YAML file. A missing file yields the defaults.
    pub fn load_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        serde_yaml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Apply overrides from a variable lookup (normally the process environment)
    pub fn apply_vars<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(API_URL_ENV).filter(|v| !v.trim().is_empty()) {
            self = self.with_api_url(&value)?;
        }

        if let Some(value) = lookup(TIMEOUT_ENV).filter(|v| !v.trim().is_empty()) {
            let secs = value
                .trim()
                .parse::<u64>()
                .map_err(|_| ConfigError::InvalidTimeout(value.clone()))?;
            self.timeout_secs = Some(secs);
        }

        Ok(self)
    }

    /// Override the base URL
    pub fn with_api_url(mut self, value: &str) -> Result<Self, ConfigError> {
        let url = Url::parse(value.trim()).map_err(|source| ConfigError::InvalidUrl {
            value: value.to_string(),
            source,
        })?;
        self.api_url = Some(url);
        Ok(self)
    }

    /// The configured base URL
    pub fn api_url(&self) -> Result<&Url, ConfigError> {
        self.api_url.as_ref().ok_or(ConfigError::MissingApiUrl)
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }

    /// Save the settings as YAML, creating parent directories
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let content = serde_yaml::to_string(self).map_err(ConfigError::Serialize)?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| ConfigError::Write {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        fs::write(path, content).map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Gets the path to the config file
pub fn get_config_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
        return Some(PathBuf::from(path));
    }

    dirs::config_dir().map(|dir| dir.join("storyforge").join("config.yaml"))
}
