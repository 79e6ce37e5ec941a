//! Server-push line decoding
//!
//! Both the generation service and the relay deliver frames as lines of the
//! form `data: {json}`. Byte chunks from the network split lines (and UTF-8
//! sequences) arbitrarily, so lines are reassembled before decoding.

use crate::{upstream, wire, LlmError};
use docstream_domain::StreamFrame;
use futures::stream::{self, BoxStream, StreamExt};
use std::collections::VecDeque;
use tracing::warn;

/// Stream of decoded frames for one document
pub type FrameStream = BoxStream<'static, Result<StreamFrame, LlmError>>;

/// Raw body chunks as delivered by the HTTP client
pub type ByteStream = BoxStream<'static, Result<Vec<u8>, LlmError>>;

/// Reassembles complete lines from arbitrary byte chunks
#[derive(Debug, Default)]
pub struct SseLineDecoder {
    buf: Vec<u8>,
}

impl SseLineDecoder {
    /// Create an empty decoder
    pub fn new() -> Self {
        Self::default()
    }

    /// Append bytes and return every line completed by them
    ///
    /// Line terminators (`\n` or `\r\n`) are stripped.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(bytes);

        let mut lines = Vec::new();
        while let Some(pos) = self.buf.iter().position(|b| *b == b'\n') {
            let mut line: Vec<u8> = self.buf.drain(..=pos).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            lines.push(String::from_utf8_lossy(&line).into_owned());
        }
        lines
    }

    /// Flush a final line that was not newline-terminated
    pub fn finish(&mut self) -> Option<String> {
        if self.buf.is_empty() {
            return None;
        }
        let line = String::from_utf8_lossy(&self.buf).trim_end().to_string();
        self.buf.clear();
        (!line.is_empty()).then_some(line)
    }
}

/// Extract the payload of one server-push line
///
/// Accepts `data:` lines and bare JSON lines; skips comments, blank lines and
/// the other SSE fields (`event:`, `id:`, `retry:`).
///
/// # Examples
///
/// ```
/// use docstream_llm::sse::data_payload;
///
/// assert_eq!(data_payload("data: {\"a\":1}"), Some("{\"a\":1}"));
/// assert_eq!(data_payload(": keep-alive"), None);
/// assert_eq!(data_payload("event: ping"), None);
/// ```
pub fn data_payload(line: &str) -> Option<&str> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with(':') {
        return None;
    }
    if let Some(rest) = trimmed.strip_prefix("data:") {
        let rest = rest.trim();
        return (!rest.is_empty()).then_some(rest);
    }
    if ["event:", "id:", "retry:"].iter().any(|field| trimmed.starts_with(field)) {
        return None;
    }
    Some(trimmed)
}

/// Which payload vocabulary a stream speaks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadFormat {
    /// The generation service's own events
    Upstream,
    /// The relay's normalized `RelayEvent`s
    Relay,
}

impl PayloadFormat {
    fn decode(&self, payload: &str) -> Result<Option<StreamFrame>, LlmError> {
        match self {
            PayloadFormat::Upstream => upstream::decode_upstream_payload(payload),
            PayloadFormat::Relay => Ok(Some(match wire::RelayPayload::parse(payload)? {
                wire::RelayPayload::Event(event) => event.into_frame(),
                wire::RelayPayload::EndOfStream => StreamFrame::Done,
            })),
        }
    }
}

/// Turns a streamed HTTP body into ordered frames
///
/// Owns the body: dropping the reader releases the connection.
pub struct FrameReader {
    body: ByteStream,
    decoder: SseLineDecoder,
    pending: VecDeque<String>,
    format: PayloadFormat,
    finished: bool,
}

impl FrameReader {
    /// Wrap a body stream
    pub fn new(body: ByteStream, format: PayloadFormat) -> Self {
        Self {
            body,
            decoder: SseLineDecoder::new(),
            pending: VecDeque::new(),
            format,
            finished: false,
        }
    }

    /// Next decoded frame; `None` once the body is exhausted
    ///
    /// Lines that fail to decode are logged and skipped. A transport error
    /// is returned once and ends the stream.
    pub async fn next_frame(&mut self) -> Option<Result<StreamFrame, LlmError>> {
        loop {
            while let Some(line) = self.pending.pop_front() {
                let Some(payload) = data_payload(&line) else {
                    continue;
                };
                match self.format.decode(payload) {
                    Ok(Some(frame)) => return Some(Ok(frame)),
                    Ok(None) => continue,
                    Err(e) => warn!("Skipping undecodable frame: {}", e),
                }
            }

            if self.finished {
                return None;
            }

            match self.body.next().await {
                Some(Ok(bytes)) => self.pending.extend(self.decoder.push(&bytes)),
                Some(Err(e)) => {
                    self.finished = true;
                    return Some(Err(e));
                }
                None => {
                    self.finished = true;
                    self.pending.extend(self.decoder.finish());
                }
            }
        }
    }

    /// Convert into a boxed stream of frames
    pub fn into_stream(self) -> FrameStream {
        stream::unfold(self, |mut reader| async move {
            reader.next_frame().await.map(|item| (item, reader))
        })
        .boxed()
    }
}
