//! Decoding of the generation service's event payloads
//!
//! The service emits one JSON object per `data:` line with an `event`
//! discriminator. Several spellings exist across service versions; they all
//! collapse onto the four [`StreamFrame`] shapes here.

use crate::LlmError;
use docstream_domain::StreamFrame;
use serde_json::Value;

/// Literal end-of-stream sentinel some services send instead of an event
pub const DONE_SENTINEL: &str = "[DONE]";

/// Decode one upstream payload
///
/// Returns `Ok(None)` for keep-alives and events that carry nothing the
/// orchestrator needs.
pub fn decode_upstream_payload(payload: &str) -> Result<Option<StreamFrame>, LlmError> {
    let payload = payload.trim();
    if payload == DONE_SENTINEL {
        return Ok(Some(StreamFrame::Done));
    }

    let value: Value = serde_json::from_str(payload)
        .map_err(|e| LlmError::InvalidResponse(format!("Malformed frame: {}", e)))?;

    let event = value.get("event").and_then(Value::as_str).unwrap_or_default();
    let task_id = value
        .get("task_id")
        .and_then(Value::as_str)
        .filter(|id| !id.trim().is_empty())
        .map(str::to_string);
    let answer = value.get("answer").and_then(Value::as_str).map(str::to_string);

    let frame = match event {
        "workflow_started" | "message_start" | "start" => StreamFrame::Start { task_id },
        "message" | "agent_message" => StreamFrame::Content {
            answer: answer.unwrap_or_default(),
            task_id,
        },
        "message_end" | "workflow_finished" | "done" => StreamFrame::Done,
        "error" => StreamFrame::Error {
            status: value
                .get("status")
                .and_then(Value::as_u64)
                .and_then(|s| u16::try_from(s).ok()),
            message: value
                .get("message")
                .or_else(|| value.get("code"))
                .and_then(Value::as_str)
                .unwrap_or("upstream error")
                .to_string(),
        },
        "ping" => return Ok(None),
        // Unknown events still matter when they carry text or announce the task id
        _ => match (answer, task_id) {
            (Some(answer), task_id) => StreamFrame::Content { answer, task_id },
            (None, Some(task_id)) => StreamFrame::Content {
                answer: String::new(),
                task_id: Some(task_id),
            },
            (None, None) => return Ok(None),
        },
    };

    Ok(Some(frame))
}
