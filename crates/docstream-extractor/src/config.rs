//! Configuration for the Extractor

use serde::{Deserialize, Serialize};

/// Configuration for the incremental extractor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractorConfig {
    /// Language tag that follows the opening backticks (`json` → "```json")
    pub fence_language: String,

    /// Run the tolerant repair pass when strict parsing fails
    ///
    /// Applied at the final flush and at close fences that start a line.
    /// A close fence in the middle of a line only ends the block when the
    /// text before it is already valid JSON.
    pub repair: bool,
}

impl ExtractorConfig {
    /// Opening fence marker, e.g. "```json"
    pub fn open_marker(&self) -> String {
        format!("```{}", self.fence_language)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.fence_language.is_empty() {
            return Err("fence_language must not be empty".to_string());
        }
        if self
            .fence_language
            .chars()
            .any(|c| c.is_whitespace() || c == '`')
        {
            return Err("fence_language must not contain whitespace or backticks".to_string());
        }
        Ok(())
    }

    /// Strict preset: no repair, only well-formed blocks are decoded
    pub fn strict() -> Self {
        Self {
            repair: false,
            ..Self::default()
        }
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
        toml::to_string_pretty(self).map_err(|e| format!("Failed to serialize to TOML: {}", e))
    }
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            fence_language: "json".to_string(),
            repair: true,
        }
    }
}
