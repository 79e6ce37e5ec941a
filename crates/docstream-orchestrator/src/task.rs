//! Per-task state machine
//!
//! A [`TaskState`] is owned by exactly one worker and mutated only there.
//! Observers receive immutable [`TaskSnapshot`]s.

use docstream_domain::{CompletedAnalysis, DocumentId, StreamFrame, TaskStatus, UpstreamTaskId};
use docstream_extractor::{ExtractorConfig, IncrementalExtractor};
use serde_json::Value;
use std::fmt;
use tracing::{debug, warn};

/// Note appended to the text of a cancelled task by [`TaskSnapshot::rendered_text`]
pub const CANCELLED_NOTE: &str = "[analysis cancelled]";

/// Soft diagnostic for a completed task whose text held no decodable block
pub const NO_OBJECT_WARNING: &str = "completed without a parsed JSON object";

/// Why a task failed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskError {
    /// The generation service reported an error; body carried verbatim
    Upstream {
        /// HTTP status, when the error came with one
        status: Option<u16>,
        /// Upstream message or response body
        body: String,
    },
    /// The connection could not be made or broke mid-stream
    Transport {
        /// Transport diagnostic
        message: String,
    },
    /// No frame arrived within the inactivity window
    Timeout {
        /// Window that elapsed
        idle_secs: u64,
    },
}

impl fmt::Display for TaskError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskError::Upstream { status: Some(status), body } => {
                write!(f, "upstream error (HTTP {}): {}", status, body)
            }
            TaskError::Upstream { status: None, body } => write!(f, "upstream error: {}", body),
            TaskError::Transport { message } => write!(f, "transport error: {}", message),
            TaskError::Timeout { idle_secs } => {
                write!(f, "no data received for {} seconds", idle_secs)
            }
        }
    }
}

/// Immutable view of one task at a point in time
#[derive(Debug, Clone, PartialEq)]
pub struct TaskSnapshot {
    /// Document the task analyzes
    pub document_id: DocumentId,
    /// Upstream run id, once announced
    pub upstream_task_id: Option<UpstreamTaskId>,
    /// Lifecycle stage
    pub status: TaskStatus,
    /// Accumulated answer text
    pub text: String,
    /// Last decoded object
    pub parsed: Option<Value>,
    /// Raw text inside a fence that has not closed yet
    pub block_preview: Option<String>,
    /// Failure detail, present only when failed
    pub error: Option<TaskError>,
    /// Soft diagnostic (extraction problems never fail a task)
    pub warning: Option<String>,
    /// Frames applied so far
    pub frames_received: u64,
}

impl TaskSnapshot {
    /// Text for display; a cancelled task gets a trailing note
    pub fn rendered_text(&self) -> String {
        if self.status != TaskStatus::Cancelled {
            return self.text.clone();
        }
        if self.text.is_empty() {
            CANCELLED_NOTE.to_string()
        } else {
            format!("{}\n\n{}", self.text, CANCELLED_NOTE)
        }
    }
}

/// Mutable state of one analysis task
#[derive(Debug)]
pub struct TaskState {
    document_id: DocumentId,
    upstream_task_id: Option<UpstreamTaskId>,
    status: TaskStatus,
    text: String,
    extractor: IncrementalExtractor,
    parsed: Option<Value>,
    error: Option<TaskError>,
    warning: Option<String>,
    frames_received: u64,
}

impl TaskState {
    /// Fresh task in `queued`
    pub fn new(document_id: DocumentId, extractor: ExtractorConfig) -> Self {
        Self {
            document_id,
            upstream_task_id: None,
            status: TaskStatus::Queued,
            text: String::new(),
            extractor: IncrementalExtractor::new(extractor),
            parsed: None,
            error: None,
            warning: None,
            frames_received: 0,
        }
    }

    /// Document this task analyzes
    pub fn document_id(&self) -> &DocumentId {
        &self.document_id
    }

    /// Current status
    pub fn status(&self) -> TaskStatus {
        self.status
    }

    /// Whether the task has reached a terminal status
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Upstream run id, if known
    pub fn upstream_task_id(&self) -> Option<&UpstreamTaskId> {
        self.upstream_task_id.as_ref()
    }

    fn transition(&mut self, next: TaskStatus) -> bool {
        if !self.status.can_transition_to(next) {
            debug!(
                "Ignoring transition {} -> {} for {}",
                self.status, next, self.document_id
            );
            return false;
        }
        self.status = next;
        true
    }

    /// `queued -> connecting`
    pub fn begin_connecting(&mut self) -> bool {
        self.transition(TaskStatus::Connecting)
    }

    /// Apply one inbound frame, in order
    ///
    /// Returns `false` when the task was already terminal and the frame was
    /// dropped.
    pub fn apply_frame(&mut self, frame: StreamFrame) -> bool {
        if self.is_terminal() {
            return false;
        }
        self.frames_received += 1;

        if self.upstream_task_id.is_none() {
            self.upstream_task_id = frame.task_id().and_then(UpstreamTaskId::parse);
        }
        self.transition(TaskStatus::Streaming);

        match frame {
            StreamFrame::Start { .. } => {}
            StreamFrame::Content { answer, .. } => {
                if !answer.is_empty() {
                    self.text.push_str(&answer);
                    if let Some(object) = self.extractor.process_chunk(&answer).object {
                        self.parsed = Some(object);
                    }
                }
            }
            StreamFrame::Done => self.complete(),
            StreamFrame::Error { status, message } => self.fail(TaskError::Upstream {
                status,
                body: message,
            }),
        }
        true
    }

    /// The stream ended without a terminal frame; treated as done
    pub fn finish_stream(&mut self) {
        if self.is_terminal() {
            return;
        }
        self.transition(TaskStatus::Streaming);
        self.complete();
    }

    fn complete(&mut self) {
        match self.extractor.finish() {
            Ok(Some(object)) => self.parsed = Some(object),
            Ok(None) => {}
            Err(e) => {
                debug!("Final flush for {} failed: {}", self.document_id, e);
                self.warning = Some(e.to_string());
            }
        }
        if self.parsed.is_none() && self.warning.is_none() && !self.text.trim().is_empty() {
            self.warning = Some(NO_OBJECT_WARNING.to_string());
        }
        self.transition(TaskStatus::Completed);
    }

    /// Fail the task; a no-op once terminal
    pub fn fail(&mut self, error: TaskError) {
        if self.transition(TaskStatus::Failed) {
            warn!("Task {} failed: {}", self.document_id, error);
            self.error = Some(error);
        }
    }

    /// Cancel the task; accumulated text is kept
    ///
    /// Returns `true` if the task was still active.
    pub fn cancel(&mut self) -> bool {
        self.transition(TaskStatus::Cancelled)
    }

    /// Immutable view for observers
    pub fn snapshot(&self) -> TaskSnapshot {
        TaskSnapshot {
            document_id: self.document_id.clone(),
            upstream_task_id: self.upstream_task_id.clone(),
            status: self.status,
            text: self.text.clone(),
            parsed: self.parsed.clone(),
            block_preview: self.extractor.partial().map(str::to_string),
            error: self.error.clone(),
            warning: self.warning.clone(),
            frames_received: self.frames_received,
        }
    }

    /// Final result, once completed
    pub fn completed_analysis(&self) -> Option<CompletedAnalysis> {
        (self.status == TaskStatus::Completed).then(|| CompletedAnalysis {
            document_id: self.document_id.clone(),
            upstream_task_id: self.upstream_task_id.clone(),
            text: self.text.clone(),
            parsed_json: self.parsed.as_ref().map(Value::to_string),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn task() -> TaskState {
        let mut state = TaskState::new(DocumentId::new("doc-1"), ExtractorConfig::default());
        state.begin_connecting();
        state
    }

    fn content(answer: &str) -> StreamFrame {
        StreamFrame::Content {
            answer: answer.to_string(),
            task_id: Some("t-1".to_string()),
        }
    }

    #[test]
    fn test_happy_path() {
        let mut state = task();
        assert_eq!(state.status(), TaskStatus::Connecting);

        state.apply_frame(StreamFrame::Start { task_id: None });
        assert_eq!(state.status(), TaskStatus::Streaming);
        assert!(state.upstream_task_id().is_none());

        state.apply_frame(content("Summary.\n```json\n{\"a\": 1, \"b\": [1,2"));
        let snap = state.snapshot();
        assert_eq!(snap.upstream_task_id.as_ref().map(|t| t.as_str()), Some("t-1"));
        assert!(snap.parsed.is_none());
        assert_eq!(snap.block_preview.as_deref(), Some("\n{\"a\": 1, \"b\": [1,2"));

        state.apply_frame(content(",3]}\n```"));
        assert_eq!(state.snapshot().parsed, Some(json!({"a": 1, "b": [1, 2, 3]})));

        state.apply_frame(StreamFrame::Done);
        let snap = state.snapshot();
        assert_eq!(snap.status, TaskStatus::Completed);
        assert_eq!(snap.frames_received, 4);
        assert!(snap.warning.is_none());
        assert!(snap.error.is_none());
    }

    #[test]
    fn test_first_task_id_wins() {
        let mut state = task();
        state.apply_frame(StreamFrame::Start { task_id: Some("first".to_string()) });
        state.apply_frame(StreamFrame::Content {
            answer: String::new(),
            task_id: Some("second".to_string()),
        });
        assert_eq!(state.upstream_task_id().map(|t| t.as_str()), Some("first"));
    }

    #[test]
    fn test_final_flush_repairs_open_block() {
        let mut state = task();
        state.apply_frame(content("```json\n{\"a\": 1"));
        state.apply_frame(StreamFrame::Done);

        let snap = state.snapshot();
        assert_eq!(snap.status, TaskStatus::Completed);
        assert_eq!(snap.parsed, Some(json!({"a": 1})));
        assert!(snap.block_preview.is_none());
    }

    #[test]
    fn test_final_flush_failure_still_completes() {
        let mut state = task();
        state.apply_frame(content("```json\n{\"a\": 1 \"b\""));
        state.apply_frame(StreamFrame::Done);

        let snap = state.snapshot();
        assert_eq!(snap.status, TaskStatus::Completed);
        assert!(snap.parsed.is_none());
        assert_eq!(snap.text, "```json\n{\"a\": 1 \"b\"");
        assert!(snap.warning.is_some());
    }

    #[test]
    fn test_text_only_completes_with_warning() {
        let mut state = task();
        state.apply_frame(content("No structured data in this one."));
        state.finish_stream();

        let snap = state.snapshot();
        assert_eq!(snap.status, TaskStatus::Completed);
        assert_eq!(snap.warning.as_deref(), Some(NO_OBJECT_WARNING));
    }

    #[test]
    fn test_close_without_frames_is_done() {
        let mut state = task();
        state.finish_stream();
        let snap = state.snapshot();
        assert_eq!(snap.status, TaskStatus::Completed);
        assert!(snap.warning.is_none());
        assert_eq!(snap.frames_received, 0);
    }

    #[test]
    fn test_error_frame_fails_with_verbatim_body() {
        let mut state = task();
        state.apply_frame(content("partial"));
        state.apply_frame(StreamFrame::Error {
            status: Some(500),
            message: "{\"message\":\"boom\"}".to_string(),
        });

        let snap = state.snapshot();
        assert_eq!(snap.status, TaskStatus::Failed);
        assert_eq!(
            snap.error,
            Some(TaskError::Upstream {
                status: Some(500),
                body: "{\"message\":\"boom\"}".to_string()
            })
        );
        assert_eq!(snap.text, "partial");
    }

    #[test]
    fn test_fail_while_connecting() {
        let mut state = task();
        state.fail(TaskError::Transport { message: "refused".to_string() });
        assert_eq!(state.status(), TaskStatus::Failed);
    }

    #[test]
    fn test_terminal_state_never_regresses() {
        let mut state = task();
        state.apply_frame(StreamFrame::Done);
        assert!(!state.apply_frame(content("late")));
        assert!(!state.cancel());
        state.fail(TaskError::Timeout { idle_secs: 1 });

        let snap = state.snapshot();
        assert_eq!(snap.status, TaskStatus::Completed);
        assert!(snap.error.is_none());
        assert_eq!(snap.text, "");
    }

    #[test]
    fn test_cancel_preserves_text() {
        let mut state = task();
        state.apply_frame(content("half an answer"));
        assert!(state.cancel());
        assert!(!state.cancel());

        let snap = state.snapshot();
        assert_eq!(snap.status, TaskStatus::Cancelled);
        assert_eq!(snap.text, "half an answer");
        assert_eq!(snap.rendered_text(), format!("half an answer\n\n{}", CANCELLED_NOTE));
        assert!(state.completed_analysis().is_none());
    }

    #[test]
    fn test_parsed_result_never_reverts() {
        let mut state = task();
        state.apply_frame(content("```json\n{\"v\": 1}\n```\nthen ```json\n{\"v\": "));
        assert_eq!(state.snapshot().parsed, Some(json!({"v": 1})));

        state.apply_frame(content("2}\n```"));
        assert_eq!(state.snapshot().parsed, Some(json!({"v": 2})));
    }

    #[test]
    fn test_completed_analysis() {
        let mut state = task();
        state.apply_frame(content("```json\n{\"ok\": true}\n```"));
        assert!(state.completed_analysis().is_none());
        state.apply_frame(StreamFrame::Done);

        let result = state.completed_analysis().unwrap();
        assert_eq!(result.document_id.as_str(), "doc-1");
        assert_eq!(result.parsed_json.as_deref(), Some("{\"ok\":true}"));
        assert_eq!(result.upstream_task_id.unwrap().as_str(), "t-1");
    }

    #[test]
    fn test_timeout_display() {
        let error = TaskError::Timeout { idle_secs: 30 };
        assert_eq!(error.to_string(), "no data received for 30 seconds");
    }
}
