mod arbiter;
mod store;

pub use arbiter::*;
pub use store::*;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

use crate::error::{Error, Result};

/// Environment variable overriding `arbiter.url`.
pub const ENV_ARBITER_ENDPOINT: &str = "DATABOX_ARBITER_ENDPOINT";
/// Environment variable overriding `store.endpoint`.
pub const ENV_STORE_ENDPOINT: &str = "DATABOX_STORE_ENDPOINT";

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Top-level config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub arbiter: ArbiterConfig,
    #[serde(default)]
    pub store: StoreConfig,
}

impl Config {
    /// Load from a TOML file, falling back to defaults when it does not exist.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::debug!(path = %path.display(), "config file not found, using defaults");
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)?;
        toml::from_str(&raw)
            .map_err(|e| Error::Config(format!("parsing {}: {e}", path.display())))
    }

    /// Override endpoints from the container environment, when set.
    pub fn apply_env(&mut self) {
        if let Ok(url) = std::env::var(ENV_ARBITER_ENDPOINT) {
            if !url.is_empty() {
                self.arbiter.url = url;
            }
        }
        if let Ok(endpoint) = std::env::var(ENV_STORE_ENDPOINT) {
            if !endpoint.is_empty() {
                self.store.endpoint = endpoint;
            }
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Config validation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Severity level for a configuration issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSeverity {
    Error,
    Warning,
}

/// A single configuration validation issue.
#[derive(Debug, Clone)]
pub struct ConfigError {
    pub severity: ConfigSeverity,
    pub field: String,
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            ConfigSeverity::Error => "ERROR",
            ConfigSeverity::Warning => "WARN",
        };
        write!(f, "[{tag}] {}: {}", self.field, self.message)
    }
}

impl Config {
    /// Validate the configuration and return a list of issues.
    ///
    /// Returns an empty vec when everything looks good.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        if self.arbiter.url.is_empty() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "arbiter.url".into(),
                message: "url must not be empty".into(),
            });
        } else if !self.arbiter.url.starts_with("https://") {
            errors.push(ConfigError {
                severity: ConfigSeverity::Warning,
                field: "arbiter.url".into(),
                message: "arbiter is not reached over https; tokens travel in clear text".into(),
            });
        }

        if self.arbiter.timeout_ms == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "arbiter.timeout_ms".into(),
                message: "timeout must be greater than 0".into(),
            });
        }

        if self.store.endpoint.is_empty() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "store.endpoint".into(),
                message: "endpoint must not be empty".into(),
            });
        }

        if self.store.channel_capacity == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "store.channel_capacity".into(),
                message: "channel capacity must be greater than 0".into(),
            });
        }

        errors
    }
}
