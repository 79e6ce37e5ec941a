//! Configuration for the analysis manager
//!
//! Bounds frame waits, sizes the update channel and names the caller.

use docstream_extractor::ExtractorConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for [`AnalysisManager`](crate::AnalysisManager)
///
/// # Examples
///
/// ```
/// use docstream_orchestrator::OrchestratorConfig;
///
/// let config = OrchestratorConfig::default();
/// assert_eq!(config.idle_timeout_secs, 120);
///
/// let config = OrchestratorConfig::interactive();
/// assert_eq!(config.idle_timeout_secs, 30);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Inactivity window in seconds; bounds the connection open and every
    /// frame wait. Default: 120
    pub idle_timeout_secs: u64,

    /// Buffered updates per subscriber before slow subscribers lag
    /// Default: 256
    pub event_capacity: usize,

    /// User id forwarded with every request
    /// Default: "docstream"
    pub user: String,

    /// Fenced-block extraction settings
    #[serde(default)]
    pub extractor: ExtractorConfig,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            idle_timeout_secs: 120,
            event_capacity: 256,
            user: "docstream".to_string(),
            extractor: ExtractorConfig::default(),
        }
    }
}

impl OrchestratorConfig {
    /// Short inactivity window for interactive sessions
    pub fn interactive() -> Self {
        Self {
            idle_timeout_secs: 30,
            event_capacity: 256,
            ..Self::default()
        }
    }

    /// Long inactivity window for large unattended batches
    pub fn batch() -> Self {
        Self {
            idle_timeout_secs: 600,
            event_capacity: 1024,
            ..Self::default()
        }
    }

    /// Inactivity window as Duration
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), String> {
        if self.idle_timeout_secs == 0 {
            return Err("idle_timeout_secs must be greater than 0".to_string());
        }
        if self.event_capacity == 0 {
            return Err("event_capacity must be greater than 0".to_string());
        }
        if self.user.trim().is_empty() {
            return Err("user cannot be empty".to_string());
        }
        self.extractor.validate()
    }

    /// Load configuration from TOML string
    pub fn from_toml(toml_str: &str) -> Result<Self, String> {
        let config: Self =
            toml::from_str(toml_str).map_err(|e| format!("Failed to parse TOML: {}", e))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize configuration to TOML string
    pub fn to_toml(&self) -> Result<String, String> {
        toml::to_string(self).map_err(|e| format!("Failed to serialize to TOML: {}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = OrchestratorConfig::default();
        assert_eq!(config.idle_timeout_secs, 120);
        assert_eq!(config.event_capacity, 256);
        assert_eq!(config.user, "docstream");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_presets() {
        assert!(OrchestratorConfig::interactive().idle_timeout_secs < OrchestratorConfig::default().idle_timeout_secs);
        assert!(OrchestratorConfig::batch().idle_timeout_secs > OrchestratorConfig::default().idle_timeout_secs);
        assert!(OrchestratorConfig::batch().validate().is_ok());
    }

    #[test]
    fn test_validation() {
        let mut config = OrchestratorConfig::default();
        config.idle_timeout_secs = 0;
        assert!(config.validate().is_err());

        let mut config = OrchestratorConfig::default();
        config.user = " ".to_string();
        assert!(config.validate().is_err());

        let mut config = OrchestratorConfig::default();
        config.extractor.fence_language = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_idle_timeout_duration() {
        assert_eq!(OrchestratorConfig::interactive().idle_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_toml_round_trip() {
        let config = OrchestratorConfig::batch();
        let text = config.to_toml().unwrap();
        assert_eq!(OrchestratorConfig::from_toml(&text).unwrap(), config);
    }

    #[test]
    fn test_from_toml_without_extractor_section() {
        let config = OrchestratorConfig::from_toml(
            "idle_timeout_secs = 5\nevent_capacity = 8\nuser = \"ana\"\n",
        )
        .unwrap();
        assert_eq!(config.user, "ana");
        assert_eq!(config.extractor, ExtractorConfig::default());
    }
}
