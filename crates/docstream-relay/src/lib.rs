//! docstream Relay
//!
//! Sits between callers and the external generation service. Each document
//! gets its own upstream streaming connection; frames are normalized and
//! forwarded as server-push events tagged with the document id. Stop requests
//! are forwarded upstream for task ids this relay has seen.

#![warn(missing_docs)]

pub mod config;
pub mod handlers;
pub mod pump;
pub mod registry;

use config::RelayConfig;
use docstream_llm::{GenerationClient, LlmError};
use handlers::{create_router, AppState};
use registry::TaskRegistry;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Relay error
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    /// Upstream client could not be built
    #[error("Upstream client error: {0}")]
    Client(#[from] LlmError),

    /// Server binding error
    #[error("Failed to bind server: {0}")]
    Bind(#[from] std::io::Error),

    /// Server error
    #[error("Server error: {0}")]
    Server(String),
}

/// Install the stderr log subscriber (`RUST_LOG`, default `info`)
///
/// Safe to call more than once; later calls are ignored.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Build the shared handler state from configuration
pub fn build_state(config: &RelayConfig) -> Result<AppState, RelayError> {
    Ok(AppState {
        client: GenerationClient::new(config.upstream.clone())?,
        registry: Arc::new(TaskRegistry::new(config.max_tracked_tasks)),
        default_user: config.default_user.clone(),
    })
}

/// Serve the relay on an already bound listener
pub async fn serve(listener: TcpListener, state: AppState) -> Result<(), RelayError> {
    axum::serve(listener, create_router(state))
        .await
        .map_err(|e| RelayError::Server(e.to_string()))
}

/// Start the relay HTTP server
///
/// Initializes logging, builds the upstream client and serves until the
/// process is stopped.
pub async fn start_server(config: RelayConfig) -> Result<(), RelayError> {
    init_tracing();

    info!("Starting docstream relay");
    info!("Bind address: {}", config.bind_addr());
    info!("Upstream: {}", config.upstream.base_url);
    info!("Tracked task ids: up to {}", config.max_tracked_tasks);

    let state = build_state(&config)?;

    let listener = TcpListener::bind(&config.bind_addr()).await?;
    info!("Relay listening on {}", config.bind_addr());

    serve(listener, state).await
}
