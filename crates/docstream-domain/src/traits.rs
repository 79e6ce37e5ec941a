//! Trait definitions for external interactions
//!
//! Infrastructure implementations live in other crates (or in the host
//! application, for persistence).

use crate::{DocumentId, UpstreamTaskId};

/// Final outcome of a task that reached `completed`
#[derive(Debug, Clone, PartialEq)]
pub struct CompletedAnalysis {
    /// Document the analysis belongs to
    pub document_id: DocumentId,

    /// Upstream run identifier, if one was announced
    pub upstream_task_id: Option<UpstreamTaskId>,

    /// Full accumulated answer text
    pub text: String,

    /// Last decoded structured object, serialized as JSON text
    pub parsed_json: Option<String>,
}

/// Receives final results once a task completes
///
/// Implemented by the persistence layer. The orchestrator calls it off the
/// frame loop and never waits on it.
pub trait ResultSink {
    /// Error type for sink operations
    type Error;

    /// Store the outcome of one completed analysis
    fn store_result(&self, result: &CompletedAnalysis) -> Result<(), Self::Error>;
}
