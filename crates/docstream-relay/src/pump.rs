//! Per-document upstream pump.
//!
//! One pump owns one upstream connection and forwards its normalized frames,
//! tagged with the document id, into a channel feeding the SSE response. The
//! connection is dropped on every exit path: end of stream, upstream error,
//! read failure and downstream disconnect (the channel closing).

use crate::registry::TaskRegistry;
use docstream_domain::{DocumentId, StreamFrame, UpstreamTaskId};
use docstream_llm::{GenerationClient, LlmError, RelayEvent};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Message sent downstream when reading the upstream fails mid-stream
pub const STREAM_FAILURE_MESSAGE: &str = "Upstream stream failed";

/// How a pump ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PumpOutcome {
    /// Upstream finished (sentinel or close)
    Completed,
    /// Upstream reported an error or the read failed
    Failed,
    /// The downstream consumer went away
    Disconnected,
}

/// Spawn a pump for one document
pub fn spawn_pump(
    client: GenerationClient,
    registry: Arc<TaskRegistry>,
    document_id: DocumentId,
    user: String,
    tx: mpsc::Sender<RelayEvent>,
) -> JoinHandle<PumpOutcome> {
    tokio::spawn(async move { pump_document(&client, &registry, &document_id, &user, &tx).await })
}

/// Forward one document's upstream stream into `tx`
pub async fn pump_document(
    client: &GenerationClient,
    registry: &TaskRegistry,
    document_id: &DocumentId,
    user: &str,
    tx: &mpsc::Sender<RelayEvent>,
) -> PumpOutcome {
    let mut reader = tokio::select! {
        _ = tx.closed() => return PumpOutcome::Disconnected,
        opened = client.stream_document(document_id, user) => match opened {
            Ok(reader) => reader,
            Err(LlmError::Status { status, body }) => {
                let frame = StreamFrame::Error { status: Some(status), message: body };
                return send_final(tx, document_id, frame).await;
            }
            Err(e) => {
                warn!("Upstream connection for {} failed: {}", document_id, e);
                return send_final(tx, document_id, failure_frame()).await;
            }
        },
    };

    info!("Relaying {}", document_id);
    let mut observed: Vec<UpstreamTaskId> = Vec::new();

    let outcome = loop {
        let next = tokio::select! {
            _ = tx.closed() => {
                debug!("Downstream for {} disconnected", document_id);
                break PumpOutcome::Disconnected;
            }
            next = reader.next_frame() => next,
        };

        let frame = match next {
            Some(Ok(frame)) => frame,
            Some(Err(e)) => {
                warn!("Reading upstream for {} failed: {}", document_id, e);
                break send_final(tx, document_id, failure_frame()).await;
            }
            // Connection close without sentinel counts as done
            None => break send_final(tx, document_id, StreamFrame::Done).await,
        };

        if let Some(task_id) = frame.task_id().and_then(UpstreamTaskId::parse) {
            if registry.observe(&task_id, document_id) {
                debug!("Document {} runs as upstream task {}", document_id, task_id);
                observed.push(task_id);
            }
        }

        let terminal = frame.is_terminal();
        let failed = matches!(frame, StreamFrame::Error { .. });
        if tx.send(RelayEvent::from_frame(document_id.as_str(), frame)).await.is_err() {
            break PumpOutcome::Disconnected;
        }
        if terminal {
            break if failed { PumpOutcome::Failed } else { PumpOutcome::Completed };
        }
    };

    drop(reader);
    for task_id in &observed {
        registry.forget(task_id);
    }
    debug!("Pump for {} ended: {:?}", document_id, outcome);
    outcome
}

fn failure_frame() -> StreamFrame {
    StreamFrame::Error {
        status: None,
        message: STREAM_FAILURE_MESSAGE.to_string(),
    }
}

async fn send_final(
    tx: &mpsc::Sender<RelayEvent>,
    document_id: &DocumentId,
    frame: StreamFrame,
) -> PumpOutcome {
    let outcome = match frame {
        StreamFrame::Error { .. } => PumpOutcome::Failed,
        _ => PumpOutcome::Completed,
    };
    match tx.send(RelayEvent::from_frame(document_id.as_str(), frame)).await {
        Ok(()) => outcome,
        Err(_) => PumpOutcome::Disconnected,
    }
}
