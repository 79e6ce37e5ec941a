//! Downstream wire format of the relay
//!
//! Every server-push event the relay emits carries one [`RelayEvent`] as its
//! `data:` payload. Consumers also accept the literal `[DONE]` sentinel.

use crate::upstream::DONE_SENTINEL;
use crate::LlmError;
use docstream_domain::StreamFrame;
use serde::{Deserialize, Serialize};

/// Event discriminator on the relay wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelayEventKind {
    /// Generation started
    Start,
    /// Incremental answer text and/or task id announcement
    Message,
    /// End of stream
    Done,
    /// Upstream or relay error
    Error,
}

/// One normalized event, tagged with the document it belongs to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayEvent {
    /// Discriminator
    pub event: RelayEventKind,

    /// Document the event belongs to
    pub document_id: String,

    /// Upstream task id, once known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,

    /// Answer fragment (message events)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,

    /// Upstream HTTP status (error events)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,

    /// Error message or upstream body (error events)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl RelayEvent {
    /// Tag a normalized frame with its document
    pub fn from_frame(document_id: impl Into<String>, frame: StreamFrame) -> Self {
        let mut event = Self {
            event: RelayEventKind::Done,
            document_id: document_id.into(),
            task_id: None,
            answer: None,
            status: None,
            message: None,
        };
        match frame {
            StreamFrame::Start { task_id } => {
                event.event = RelayEventKind::Start;
                event.task_id = task_id;
            }
            StreamFrame::Content { answer, task_id } => {
                event.event = RelayEventKind::Message;
                event.answer = Some(answer);
                event.task_id = task_id;
            }
            StreamFrame::Done => {}
            StreamFrame::Error { status, message } => {
                event.event = RelayEventKind::Error;
                event.status = status;
                event.message = Some(message);
            }
        }
        event
    }

    /// Strip the document tag
    pub fn into_frame(self) -> StreamFrame {
        match self.event {
            RelayEventKind::Start => StreamFrame::Start { task_id: self.task_id },
            RelayEventKind::Message => StreamFrame::Content {
                answer: self.answer.unwrap_or_default(),
                task_id: self.task_id,
            },
            RelayEventKind::Done => StreamFrame::Done,
            RelayEventKind::Error => StreamFrame::Error {
                status: self.status,
                message: self.message.unwrap_or_else(|| "relay error".to_string()),
            },
        }
    }

    /// JSON text for a `data:` line
    pub fn to_json(&self) -> Result<String, LlmError> {
        serde_json::to_string(self).map_err(|e| LlmError::InvalidResponse(e.to_string()))
    }
}

/// A decoded relay payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayPayload {
    /// A tagged event
    Event(RelayEvent),
    /// The literal end-of-stream sentinel
    EndOfStream,
}

impl RelayPayload {
    /// Parse one `data:` payload from the relay
    pub fn parse(payload: &str) -> Result<Self, LlmError> {
        let payload = payload.trim();
        if payload == DONE_SENTINEL {
            return Ok(RelayPayload::EndOfStream);
        }
        serde_json::from_str(payload)
            .map(RelayPayload::Event)
            .map_err(|e| LlmError::InvalidResponse(format!("Malformed relay event: {}", e)))
    }
}
