//! Error types for the CLI application.

use docstream_orchestrator::{OrchestratorError, TransportError};
use thiserror::Error;

/// Result type alias for CLI operations.
pub type Result<T> = std::result::Result<T, CliError>;

/// CLI-specific errors.
#[derive(Debug, Error)]
pub enum CliError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Relay request failed
    #[error("Relay error: {0}")]
    Transport(#[from] TransportError),

    /// Orchestrator setup failed
    #[error("{0}")]
    Orchestrator(#[from] OrchestratorError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Operation not permitted
    #[error("Operation not permitted: {0}")]
    NotPermitted(String),

    /// Some analyses did not complete
    #[error("{failed} of {total} analyses failed")]
    AnalysisFailed {
        /// Failed tasks
        failed: usize,
        /// All tasks in the batch
        total: usize,
    },
}
