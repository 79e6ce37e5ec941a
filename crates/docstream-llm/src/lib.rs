//! docstream generation-service layer
//!
//! Everything that speaks HTTP to the external generation service, plus the
//! framing shared by the relay and its clients.
//!
//! # Modules
//!
//! - [`client`]: `GenerationClient`, one streaming completion per document and the stop call
//! - [`sse`]: server-push line decoding and the [`FrameReader`] that turns a body into frames
//! - [`upstream`]: decoding of the generation service's own event payloads
//! - [`wire`]: the relay's downstream event format
//!
//! # Examples
//!
//! ```
//! use docstream_llm::upstream::decode_upstream_payload;
//! use docstream_domain::StreamFrame;
//!
//! let frame = decode_upstream_payload(r#"{"event": "message", "answer": "Hi", "task_id": "t1"}"#)
//!     .unwrap()
//!     .unwrap();
//! assert_eq!(frame, StreamFrame::Content { answer: "Hi".into(), task_id: Some("t1".into()) });
//! ```

#![warn(missing_docs)]

pub mod client;
pub mod sse;
pub mod upstream;
pub mod wire;

use thiserror::Error;

pub use client::{GenerationClient, GenerationConfig};
pub use sse::{FrameReader, FrameStream, PayloadFormat, SseLineDecoder};
pub use wire::{RelayEvent, RelayEventKind, RelayPayload};

/// Errors that can occur while talking to the generation service
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LlmError {
    /// Network or transport failure (connect, reset, body read)
    #[error("Communication error: {0}")]
    Communication(String),

    /// The service answered with a non-success status
    #[error("Upstream returned HTTP {status}: {body}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Response body, verbatim
        body: String,
    },

    /// Response payload could not be understood
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Client configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<reqwest::Error> for LlmError {
    fn from(e: reqwest::Error) -> Self {
        match e.status() {
            Some(status) if e.is_status() => LlmError::Status {
                status: status.as_u16(),
                body: e.to_string(),
            },
            _ => LlmError::Communication(e.to_string()),
        }
    }
}
