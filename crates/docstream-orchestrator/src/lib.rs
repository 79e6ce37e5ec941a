//! docstream orchestrator
//!
//! Runs one streaming analysis per document, concurrently, and lets the
//! caller observe or cancel any subset at any time.
//!
//! # Modules
//!
//! - [`task`]: the per-task state machine and the snapshots observers see
//! - [`manager`]: the task map, workers, cancellation and observer registration
//! - [`transport`]: the connection seam and its relay-backed implementation
//! - [`sink`]: destinations for completed results
//!
//! # Lifecycle
//!
//! ```text
//! queued -> connecting -> streaming -> completed
//!               |             |
//!               +-------------+----> failed
//! any non-terminal stage ----------> cancelled
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod manager;
pub mod sink;
pub mod task;
pub mod transport;

pub use config::OrchestratorConfig;
pub use error::{OrchestratorError, TransportError};
pub use manager::{AnalysisManager, CancelReport, TaskUpdate};
pub use sink::{JsonLinesSink, MemorySink};
pub use task::{TaskError, TaskSnapshot, TaskState};
pub use transport::{AnalysisTransport, RelayTransport};
