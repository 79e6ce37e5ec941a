//! Normalized frames delivered by a push stream
//!
//! Whatever the transport (relay SSE, direct upstream, test script), the
//! orchestrator only ever sees these four shapes.

/// One normalized unit of push-delivered data for a single document
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamFrame {
    /// Generation started
    Start {
        /// Upstream task id, if the service announced it already
        task_id: Option<String>,
    },

    /// Incremental answer text
    Content {
        /// Text fragment to append
        answer: String,
        /// Upstream task id, once known
        task_id: Option<String>,
    },

    /// End of stream (explicit sentinel or connection close)
    Done,

    /// Upstream reported an error
    Error {
        /// Upstream HTTP status, when the error came from a status code
        status: Option<u16>,
        /// Upstream body or message
        message: String,
    },
}

impl StreamFrame {
    /// Upstream task id carried by this frame, if any
    pub fn task_id(&self) -> Option<&str> {
        match self {
            StreamFrame::Start { task_id } | StreamFrame::Content { task_id, .. } => {
                task_id.as_deref().filter(|id| !id.trim().is_empty())
            }
            StreamFrame::Done | StreamFrame::Error { .. } => None,
        }
    }

    /// Whether this frame ends the stream
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamFrame::Done | StreamFrame::Error { .. })
    }
}
