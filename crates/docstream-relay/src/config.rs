//! Configuration file parsing for the relay.
//!
//! Loads the bind address, the generation service settings and the task-id
//! registry bound from TOML. The API key may come from the environment.

use docstream_llm::GenerationConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Environment variable that overrides `upstream.api_key`
pub const API_KEY_ENV: &str = "DOCSTREAM_API_KEY";

/// Relay configuration error
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    /// Failed to parse TOML
    #[error("Failed to parse config TOML: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// Missing required field
    #[error("Missing required configuration field: {0}")]
    MissingField(String),

    /// Field present but unusable
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Relay configuration loaded from TOML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Bind address (e.g., "127.0.0.1")
    pub bind_address: String,

    /// Bind port (e.g., 8090)
    pub bind_port: u16,

    /// Generation service settings
    #[serde(default)]
    pub upstream: GenerationConfig,

    /// User id sent upstream when the caller supplies none
    #[serde(default = "default_user")]
    pub default_user: String,

    /// Upper bound on remembered upstream task ids
    #[serde(default = "default_max_tracked_tasks")]
    pub max_tracked_tasks: usize,
}

fn default_user() -> String {
    "docstream".to_string()
}

fn default_max_tracked_tasks() -> usize {
    1024
}

impl RelayConfig {
    /// Load configuration from a TOML file
    ///
    /// `DOCSTREAM_API_KEY`, when set, replaces `upstream.api_key`.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let config: RelayConfig = toml::from_str(&contents)?;
        let config = config.with_api_key_override(std::env::var(API_KEY_ENV).ok());
        config.validate()?;
        Ok(config)
    }

    /// Replace the API key when an override is present and non-blank
    pub fn with_api_key_override(mut self, key: Option<String>) -> Self {
        if let Some(key) = key.filter(|k| !k.trim().is_empty()) {
            self.upstream.api_key = key;
        }
        self
    }

    /// Check required fields
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.upstream.api_key.is_empty() {
            return Err(ConfigError::MissingField("upstream.api_key".to_string()));
        }
        if self.default_user.trim().is_empty() {
            return Err(ConfigError::MissingField("default_user".to_string()));
        }
        if self.max_tracked_tasks == 0 {
            return Err(ConfigError::Invalid(
                "max_tracked_tasks must be greater than 0".to_string(),
            ));
        }
        self.upstream.validate().map_err(ConfigError::Invalid)
    }

    /// Create a default configuration for testing
    pub fn default_test_config() -> Self {
        RelayConfig {
            bind_address: "127.0.0.1".to_string(),
            bind_port: 8090,
            upstream: GenerationConfig {
                api_key: "test-key-do-not-use-in-production".to_string(),
                ..GenerationConfig::default()
            },
            default_user: default_user(),
            max_tracked_tasks: default_max_tracked_tasks(),
        }
    }

    /// Get the full bind address (address:port)
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.bind_address, self.bind_port)
    }
}
