//! Error types for orchestration

use crate::task::TaskError;
use docstream_llm::LlmError;
use thiserror::Error;

/// Errors raised by an [`AnalysisTransport`](crate::AnalysisTransport)
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransportError {
    /// The far end answered with a non-success status
    #[error("HTTP {status}: {body}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Response body, verbatim
        body: String,
    },

    /// Connection could not be made or broke
    #[error("Connection error: {0}")]
    Connection(String),

    /// Transport misconfigured
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<LlmError> for TransportError {
    fn from(e: LlmError) -> Self {
        match e {
            LlmError::Status { status, body } => TransportError::Status { status, body },
            LlmError::Config(msg) => TransportError::Config(msg),
            other => TransportError::Connection(other.to_string()),
        }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        TransportError::Connection(e.to_string())
    }
}

/// Errors that can occur while setting up orchestration
#[derive(Error, Debug)]
pub enum OrchestratorError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Transport error
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
}

impl From<TransportError> for TaskError {
    fn from(e: TransportError) -> Self {
        match e {
            TransportError::Status { status, body } => TaskError::Upstream {
                status: Some(status),
                body,
            },
            other => TaskError::Transport {
                message: other.to_string(),
            },
        }
    }
}
