//! docstream Domain Layer
//!
//! Core vocabulary shared by every other docstream crate. Like any domain
//! layer it carries no I/O and almost no dependencies: identifiers, the task
//! lifecycle, the normalized frame model, and the traits implemented by
//! infrastructure collaborators.
//!
//! ## Key Concepts
//!
//! - **Document**: a caller-supplied unit of work, identified by [`DocumentId`]
//! - **Task**: one streaming analysis run for one document
//! - **Upstream task id**: the id the generation service announces, needed to stop a run
//! - **Frame**: one normalized unit of push-delivered data ([`StreamFrame`])
//! - **Status**: `queued → connecting → streaming → completed|failed|cancelled`

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod frame;
pub mod ids;
pub mod status;
pub mod traits;

// Re-exports for convenience
pub use frame::StreamFrame;
pub use ids::{DocumentId, UpstreamTaskId};
pub use status::TaskStatus;
pub use traits::{CompletedAnalysis, ResultSink};
