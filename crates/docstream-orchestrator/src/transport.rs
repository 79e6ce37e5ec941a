//! Connection seam between the manager and the relay
//!
//! The manager only needs an ordered stream of frames per document and a
//! way to stop an upstream run. [`RelayTransport`] provides both over HTTP.

use crate::config::OrchestratorConfig;
use crate::error::TransportError;
use async_trait::async_trait;
use docstream_domain::{DocumentId, UpstreamTaskId};
use docstream_llm::{FrameReader, FrameStream, LlmError, PayloadFormat};
use futures::StreamExt;
use serde_json::json;
use std::time::Duration;
use tracing::debug;

/// Opens per-document frame streams and stops upstream runs
#[async_trait]
pub trait AnalysisTransport: Send + Sync + 'static {
    /// Open the stream for one document
    ///
    /// Dropping the returned stream releases the connection.
    async fn open(&self, document_id: &DocumentId) -> Result<FrameStream, TransportError>;

    /// Ask the upstream to stop a run
    async fn stop(&self, task_id: &UpstreamTaskId) -> Result<(), TransportError>;
}

/// Talks to a `docstream-relay` instance
#[derive(Debug, Clone)]
pub struct RelayTransport {
    base_url: reqwest::Url,
    user: String,
    http: reqwest::Client,
}

impl RelayTransport {
    /// Connect timeout for every request
    pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

    /// Total timeout for stop requests
    pub const STOP_TIMEOUT: Duration = Duration::from_secs(30);

    /// Create a transport for the relay at `relay_url`, acting as `config.user`
    pub fn new(relay_url: &str, config: &OrchestratorConfig) -> Result<Self, TransportError> {
        if config.user.trim().is_empty() {
            return Err(TransportError::Config("user cannot be empty".to_string()));
        }

        let base_url = reqwest::Url::parse(relay_url)
            .map_err(|e| TransportError::Config(format!("Invalid relay URL {}: {}", relay_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(TransportError::Config(format!(
                "Relay URL cannot be a base: {}",
                relay_url
            )));
        }

        let http = reqwest::Client::builder()
            .connect_timeout(Self::CONNECT_TIMEOUT)
            .build()
            .map_err(|e| TransportError::Config(e.to_string()))?;

        Ok(Self {
            base_url,
            user: config.user.clone(),
            http,
        })
    }

    fn url(&self, segments: &[&str]) -> Result<reqwest::Url, TransportError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| TransportError::Config("Relay URL cannot be a base".to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn error_for(response: reqwest::Response) -> TransportError {
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        TransportError::Status { status, body }
    }
}

#[async_trait]
impl AnalysisTransport for RelayTransport {
    async fn open(&self, document_id: &DocumentId) -> Result<FrameStream, TransportError> {
        let url = self.url(&["analysis", "stream", document_id.as_str()])?;
        debug!("Opening {}", url);

        let response = self
            .http
            .get(url)
            .query(&[("user", self.user.as_str())])
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(Self::error_for(response).await);
        }

        let bytes = response
            .bytes_stream()
            .map(|chunk| chunk.map(|b| b.to_vec()).map_err(LlmError::from))
            .boxed();
        Ok(FrameReader::new(bytes, PayloadFormat::Relay).into_stream())
    }

    async fn stop(&self, task_id: &UpstreamTaskId) -> Result<(), TransportError> {
        let url = self.url(&["analysis", "stop"])?;
        let response = self
            .http
            .post(url)
            .timeout(Self::STOP_TIMEOUT)
            .json(&json!({ "task_id": task_id.as_str(), "user": self.user }))
            .send()
            .await?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(Self::error_for(response).await)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_urls_are_segment_encoded() {
        let transport = RelayTransport::new("http://relay:8090/api/", &OrchestratorConfig::default()).unwrap();
        let url = transport.url(&["analysis", "stream", "reports/2024 q1"]).unwrap();
        assert_eq!(url.as_str(), "http://relay:8090/api/analysis/stream/reports%2F2024%20q1");
    }

    #[test]
    fn test_invalid_relay_url() {
        assert!(matches!(RelayTransport::new("not a url", &OrchestratorConfig::default()), Err(TransportError::Config(_))));
        assert!(matches!(RelayTransport::new("mailto:a@b", &OrchestratorConfig::default()), Err(TransportError::Config(_))));
    }

    #[test]
    fn test_blank_user_rejected() {
        let config = OrchestratorConfig {
            user: "  ".to_string(),
            ..OrchestratorConfig::default()
        };
        assert!(matches!(RelayTransport::new("http://relay:8090", &config), Err(TransportError::Config(_))));
    }

    #[tokio::test]
    async fn test_unreachable_relay() {
        let transport = RelayTransport::new("http://127.0.0.1:1", &OrchestratorConfig::default()).unwrap();
        let result = transport.open(&DocumentId::new("doc")).await;
        assert!(matches!(result, Err(TransportError::Connection(_))));
    }
}
