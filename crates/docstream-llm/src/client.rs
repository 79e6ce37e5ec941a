//! Generation service client
//!
//! One streaming completion per document, plus the stop call keyed by the
//! upstream task id.
//!
//! # Examples
//!
//! ```no_run
//! use docstream_llm::{GenerationClient, GenerationConfig, PayloadFormat};
//! use docstream_domain::DocumentId;
//!
//! # async fn run() -> Result<(), docstream_llm::LlmError> {
//! let client = GenerationClient::new(GenerationConfig::default())?;
//! let mut frames = client.stream_document(&DocumentId::new("doc-1"), "analyst").await?;
//! while let Some(frame) = frames.next_frame().await {
//!     println!("{:?}", frame?);
//! }
//! # Ok(())
//! # }
//! ```

use crate::sse::{FrameReader, PayloadFormat};
use crate::LlmError;
use docstream_domain::{DocumentId, UpstreamTaskId};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Default generation service endpoint
pub const DEFAULT_BASE_URL: &str = "http://localhost:5001/v1";

/// Default instruction sent with every document
pub const DEFAULT_QUERY: &str = "Analyze the document and answer with one ```json fenced object.";

/// Default connect timeout (10 seconds)
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Default timeout for non-streaming requests such as stop (30 seconds)
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Connection settings for the generation service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Base URL, e.g. `https://api.example.com/v1`
    pub base_url: String,

    /// Bearer API key
    pub api_key: String,

    /// Instruction sent alongside each document reference
    pub query: String,

    /// TCP connect timeout in seconds
    pub connect_timeout_secs: u64,

    /// Total timeout for stop requests in seconds
    pub request_timeout_secs: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: String::new(),
            query: DEFAULT_QUERY.to_string(),
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

impl GenerationConfig {
    /// Validate the settings
    pub fn validate(&self) -> Result<(), String> {
        if self.base_url.trim().is_empty() {
            return Err("base_url cannot be empty".to_string());
        }
        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(format!("base_url must be an http(s) URL, got {}", self.base_url));
        }
        if self.query.trim().is_empty() {
            return Err("query cannot be empty".to_string());
        }
        if self.connect_timeout_secs == 0 || self.request_timeout_secs == 0 {
            return Err("timeouts must be greater than 0".to_string());
        }
        Ok(())
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }
}

/// Client for the external generation service
#[derive(Debug, Clone)]
pub struct GenerationClient {
    config: GenerationConfig,
    http: reqwest::Client,
}

impl GenerationClient {
    /// Build a client from validated settings
    pub fn new(config: GenerationConfig) -> Result<Self, LlmError> {
        config.validate().map_err(LlmError::Config)?;

        // No total timeout: streams live as long as generation does
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .build()
            .map_err(|e| LlmError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { config, http })
    }

    /// Settings this client was built with
    pub fn config(&self) -> &GenerationConfig {
        &self.config
    }

    /// Open one streaming completion for a document
    ///
    /// # Errors
    ///
    /// - [`LlmError::Communication`] when the connection cannot be made
    /// - [`LlmError::Status`] when the service answers with a non-success
    ///   status; the body is carried verbatim
    pub async fn stream_document(
        &self,
        document_id: &DocumentId,
        user: &str,
    ) -> Result<FrameReader, LlmError> {
        let url = self.config.endpoint("chat-messages");
        let body = json!({
            "inputs": { "document_id": document_id.as_str() },
            "query": self.config.query,
            "response_mode": "streaming",
            "user": user,
        });

        debug!("Opening upstream stream for {} at {}", document_id, url);
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::Communication(format!("Request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            warn!("Upstream rejected {}: HTTP {}", document_id, status.as_u16());
            return Err(LlmError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let bytes = response
            .bytes_stream()
            .map(|chunk| chunk.map(|b| b.to_vec()).map_err(LlmError::from))
            .boxed();
        Ok(FrameReader::new(bytes, PayloadFormat::Upstream))
    }

    /// Ask the service to stop a running generation
    pub async fn stop(&self, task_id: &UpstreamTaskId, user: &str) -> Result<(), LlmError> {
        let url = self
            .config
            .endpoint(&format!("chat-messages/{}/stop", task_id.as_str()));

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .timeout(Duration::from_secs(self.config.request_timeout_secs))
            .json(&json!({ "user": user }))
            .send()
            .await
            .map_err(|e| LlmError::Communication(format!("Stop request failed: {}", e)))?;

        let status = response.status();
        if status.is_success() {
            info!("Upstream task {} stopped", task_id);
            Ok(())
        } else {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            Err(LlmError::Status {
                status: status.as_u16(),
                body,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(GenerationConfig::default().validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = GenerationConfig::default();
        config.base_url = "ftp://example".to_string();
        assert!(config.validate().is_err());

        let mut config = GenerationConfig::default();
        config.query = "  ".to_string();
        assert!(config.validate().is_err());

        let mut config = GenerationConfig::default();
        config.connect_timeout_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let config = GenerationConfig {
            base_url: String::new(),
            ..GenerationConfig::default()
        };
        assert!(matches!(GenerationClient::new(config), Err(LlmError::Config(_))));
    }

    #[test]
    fn test_endpoint_joins_without_double_slash() {
        let config = GenerationConfig {
            base_url: "http://host/v1/".to_string(),
            ..GenerationConfig::default()
        };
        assert_eq!(config.endpoint("chat-messages"), "http://host/v1/chat-messages");
    }

    #[test]
    fn test_config_partial_uses_defaults() {
        let config: GenerationConfig = serde_json::from_str(r#"{"base_url": "http://x"}"#).unwrap();
        assert_eq!(config.base_url, "http://x");
        assert_eq!(config.connect_timeout_secs, DEFAULT_CONNECT_TIMEOUT_SECS);
    }

    #[tokio::test]
    async fn test_connection_error() {
        // Port 1 is reserved and nothing listens there
        let client = GenerationClient::new(GenerationConfig {
            base_url: "http://127.0.0.1:1".to_string(),
            connect_timeout_secs: 1,
            ..GenerationConfig::default()
        })
        .unwrap();

        let result = client.stream_document(&DocumentId::new("doc"), "u").await;
        assert!(matches!(result, Err(LlmError::Communication(_))));

        let task = UpstreamTaskId::parse("t1").unwrap();
        assert!(matches!(client.stop(&task, "u").await, Err(LlmError::Communication(_))));
    }
}
