//! Concurrency and cancellation manager
//!
//! One tokio task per document owns that document's [`TaskState`] and its
//! frame stream. The manager keeps a single task map behind one lock, never
//! held across an `.await`; observers get snapshots through `watch` (per
//! task) and `broadcast` (all tasks) channels.

use crate::config::OrchestratorConfig;
use crate::error::OrchestratorError;
use crate::task::{TaskError, TaskSnapshot, TaskState};
use crate::transport::AnalysisTransport;
use docstream_domain::{CompletedAnalysis, DocumentId, ResultSink, TaskStatus};
use docstream_llm::FrameStream;
use futures::future::join_all;
use futures::StreamExt;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// A snapshot published for one task
#[derive(Debug, Clone)]
pub struct TaskUpdate {
    /// Task the snapshot belongs to
    pub document_id: DocumentId,
    /// State after the change
    pub snapshot: TaskSnapshot,
}

/// Outcome of cancelling one task
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CancelReport {
    /// Task the report is about
    pub document_id: DocumentId,
    /// Whether this call moved the task to `cancelled`
    pub was_active: bool,
    /// Upstream stop result; `None` when no stop was attempted
    pub upstream_stopped: Option<Result<(), String>>,
}

impl CancelReport {
    fn inactive(document_id: &DocumentId) -> Self {
        Self {
            document_id: document_id.clone(),
            was_active: false,
            upstream_stopped: None,
        }
    }
}

trait StoreCompleted: Send + Sync {
    fn store(&self, result: &CompletedAnalysis) -> Result<(), String>;
}

impl<S> StoreCompleted for S
where
    S: ResultSink + Send + Sync,
    S::Error: Display,
{
    fn store(&self, result: &CompletedAnalysis) -> Result<(), String> {
        self.store_result(result).map_err(|e| e.to_string())
    }
}

struct TaskEntry {
    snapshot: watch::Receiver<TaskSnapshot>,
    /// Ends the frame loop
    cancel: CancellationToken,
    /// Lets a cancelled worker drop its connection
    release: CancellationToken,
    /// Set by the one `cancel` call that owns this task's cancellation
    cancel_claimed: bool,
}

impl TaskEntry {
    fn is_terminal(&self) -> bool {
        self.snapshot.borrow().status.is_terminal()
    }

    fn abort(&self) {
        self.cancel.cancel();
        self.release.cancel();
    }
}

#[derive(Default)]
struct TaskTable {
    entries: HashMap<DocumentId, TaskEntry>,
    /// Submission order
    order: Vec<DocumentId>,
}

impl TaskTable {
    fn remove_where(&mut self, mut evict: impl FnMut(&TaskEntry) -> bool) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| !evict(entry));
        let entries = &self.entries;
        self.order.retain(|id| entries.contains_key(id));
        before - self.entries.len()
    }
}

/// Runs one analysis task per document and cancels any subset of them
///
/// # Examples
///
/// ```no_run
/// use docstream_orchestrator::{AnalysisManager, OrchestratorConfig, RelayTransport};
///
/// # async fn run() -> Result<(), Box<dyn std::error::Error>> {
/// let config = OrchestratorConfig {
///     user: "analyst".to_string(),
///     ..OrchestratorConfig::default()
/// };
/// let transport = RelayTransport::new("http://127.0.0.1:8090", &config)?;
/// let manager = AnalysisManager::new(transport, config)?;
///
/// manager.submit(["lease-2024", "nda-17"]);
/// manager.wait_all().await;
/// for snapshot in manager.statuses() {
///     println!("{}: {}", snapshot.document_id, snapshot.status);
/// }
/// # Ok(())
/// # }
/// ```
pub struct AnalysisManager {
    transport: Arc<dyn AnalysisTransport>,
    config: OrchestratorConfig,
    tasks: Mutex<TaskTable>,
    updates: broadcast::Sender<TaskUpdate>,
    sink: Option<Arc<dyn StoreCompleted>>,
}

impl AnalysisManager {
    /// Create a manager over a transport
    pub fn new<T>(transport: T, config: OrchestratorConfig) -> Result<Self, OrchestratorError>
    where
        T: AnalysisTransport,
    {
        config.validate().map_err(OrchestratorError::Config)?;
        let (updates, _) = broadcast::channel(config.event_capacity);

        Ok(Self {
            transport: Arc::new(transport),
            config,
            tasks: Mutex::new(TaskTable::default()),
            updates,
            sink: None,
        })
    }

    /// Hand every completed task to `sink`
    ///
    /// The sink runs on the blocking pool; failures are logged only.
    pub fn with_sink<S>(mut self, sink: S) -> Self
    where
        S: ResultSink + Send + Sync + 'static,
        S::Error: Display,
    {
        self.sink = Some(Arc::new(sink));
        self
    }

    /// Configuration in use
    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Start a task for every document not already active
    ///
    /// A document whose task is terminal gets a fresh task. Blank ids are
    /// skipped. Returns the documents that were started.
    pub fn submit<I>(&self, document_ids: I) -> Vec<DocumentId>
    where
        I: IntoIterator,
        I::Item: Into<DocumentId>,
    {
        let mut started = Vec::new();
        let mut table = self.tasks.lock();

        for raw in document_ids {
            let document_id: DocumentId = raw.into();
            if document_id.is_blank() {
                warn!("Skipping blank document id");
                continue;
            }
            match table.entries.get(&document_id) {
                Some(entry) if !entry.is_terminal() => {
                    debug!("{} is already active", document_id);
                    continue;
                }
                Some(_) => debug!("Replacing finished task for {}", document_id),
                None => table.order.push(document_id.clone()),
            }

            let entry = self.spawn_task(document_id.clone());
            table.entries.insert(document_id.clone(), entry);
            started.push(document_id);
        }

        if !started.is_empty() {
            info!("Submitted {} analysis task(s)", started.len());
        }
        started
    }

    fn spawn_task(&self, document_id: DocumentId) -> TaskEntry {
        let state = TaskState::new(document_id.clone(), self.config.extractor.clone());
        let snapshot = state.snapshot();
        let (publisher, receiver) = watch::channel(snapshot.clone());
        let _ = self.updates.send(TaskUpdate {
            document_id,
            snapshot,
        });

        let cancel = CancellationToken::new();
        let release = CancellationToken::new();
        let worker = Worker {
            state,
            transport: Arc::clone(&self.transport),
            publisher,
            updates: self.updates.clone(),
            cancel: cancel.clone(),
            release: release.clone(),
            idle: self.config.idle_timeout(),
            sink: self.sink.clone(),
        };
        tokio::spawn(worker.run());

        TaskEntry {
            snapshot: receiver,
            cancel,
            release,
            cancel_claimed: false,
        }
    }

    /// Cancel one task
    ///
    /// The task is marked `cancelled` and stops publishing immediately. If
    /// the upstream run id is known, one stop request is sent; the local
    /// connection is closed whatever its outcome. Cancelling an unknown or
    /// finished task is a no-op.
    ///
    /// The connection is held until the stop returns (at most one idle
    /// window): the relay forgets a task id once its stream closes.
    ///
    /// Overlapping calls on one task are resolved under the table lock: the
    /// first call owns the cancellation, the others wait for the terminal
    /// state and report an inactive task.
    pub async fn cancel(&self, document_id: &DocumentId) -> CancelReport {
        let claim = {
            let mut table = self.tasks.lock();
            match table.entries.get_mut(document_id) {
                Some(entry) if !entry.is_terminal() => {
                    let owner = !entry.cancel_claimed;
                    entry.cancel_claimed = true;
                    Some((owner, entry.snapshot.clone(), entry.cancel.clone(), entry.release.clone()))
                }
                _ => None,
            }
        };
        let Some((owner, mut snapshot, cancel, release)) = claim else {
            return CancelReport::inactive(document_id);
        };
        if !owner {
            let _ = snapshot.wait_for(|s| s.status.is_terminal()).await;
            return CancelReport::inactive(document_id);
        }

        cancel.cancel();
        // Err only if the worker is gone, in which case the last value stands
        let _ = snapshot.wait_for(|s| s.status.is_terminal()).await;

        let (status, upstream_task_id) = {
            let current = snapshot.borrow();
            (current.status, current.upstream_task_id.clone())
        };
        if status != TaskStatus::Cancelled {
            // Finished on its own before the cancel landed
            release.cancel();
            return CancelReport::inactive(document_id);
        }

        let upstream_stopped = match upstream_task_id {
            Some(task_id) => {
                let result = self.transport.stop(&task_id).await.map_err(|e| e.to_string());
                match &result {
                    Ok(()) => info!("Stopped upstream task {} for {}", task_id, document_id),
                    Err(e) => warn!("Upstream stop for {} failed: {}", document_id, e),
                }
                Some(result)
            }
            None => None,
        };
        release.cancel();

        CancelReport {
            document_id: document_id.clone(),
            was_active: true,
            upstream_stopped,
        }
    }

    /// Cancel every active task, independently and concurrently
    pub async fn cancel_all(&self) -> Vec<CancelReport> {
        let active: Vec<DocumentId> = {
            let table = self.tasks.lock();
            table
                .order
                .iter()
                .filter(|id| table.entries.get(*id).is_some_and(|e| !e.is_terminal()))
                .cloned()
                .collect()
        };
        if !active.is_empty() {
            info!("Cancelling {} active task(s)", active.len());
        }
        join_all(active.iter().map(|id| self.cancel(id))).await
    }

    /// Teardown: the full cancel path for every task
    pub async fn shutdown(&self) -> Vec<CancelReport> {
        self.cancel_all().await
    }

    /// Latest snapshot of one task
    pub fn status(&self, document_id: &DocumentId) -> Option<TaskSnapshot> {
        self.tasks
            .lock()
            .entries
            .get(document_id)
            .map(|e| e.snapshot.borrow().clone())
    }

    /// Latest snapshots of all tasks, in submission order
    pub fn statuses(&self) -> Vec<TaskSnapshot> {
        let table = self.tasks.lock();
        table
            .order
            .iter()
            .filter_map(|id| table.entries.get(id))
            .map(|e| e.snapshot.borrow().clone())
            .collect()
    }

    /// Receive every snapshot published from now on
    pub fn subscribe(&self) -> broadcast::Receiver<TaskUpdate> {
        self.updates.subscribe()
    }

    /// Follow one task's latest snapshot
    pub fn watch_task(&self, document_id: &DocumentId) -> Option<watch::Receiver<TaskSnapshot>> {
        self.tasks
            .lock()
            .entries
            .get(document_id)
            .map(|e| e.snapshot.clone())
    }

    /// Evict finished tasks; active ones are kept. Returns the number evicted.
    pub fn clear(&self) -> usize {
        self.tasks.lock().remove_where(TaskEntry::is_terminal)
    }

    /// Cancel everything, evict everything, then submit a fresh batch
    pub async fn start_batch<I>(&self, document_ids: I) -> Vec<DocumentId>
    where
        I: IntoIterator,
        I::Item: Into<DocumentId>,
    {
        self.cancel_all().await;
        {
            let mut table = self.tasks.lock();
            for entry in table.entries.values() {
                entry.abort();
            }
            table.entries.clear();
            table.order.clear();
        }
        self.submit(document_ids)
    }

    /// Resolve once every current task is terminal
    pub async fn wait_all(&self) {
        let receivers: Vec<watch::Receiver<TaskSnapshot>> = {
            let table = self.tasks.lock();
            table.entries.values().map(|e| e.snapshot.clone()).collect()
        };
        for mut receiver in receivers {
            let _ = receiver.wait_for(|s| s.status.is_terminal()).await;
        }
    }

    /// Number of tasks that are not terminal yet
    pub fn active_count(&self) -> usize {
        self.tasks
            .lock()
            .entries
            .values()
            .filter(|e| !e.is_terminal())
            .count()
    }
}

impl Drop for AnalysisManager {
    fn drop(&mut self) {
        let table = self.tasks.get_mut();
        for entry in table.entries.values() {
            entry.abort();
        }
    }
}

/// Owns one task's state and connection
struct Worker {
    state: TaskState,
    transport: Arc<dyn AnalysisTransport>,
    publisher: watch::Sender<TaskSnapshot>,
    updates: broadcast::Sender<TaskUpdate>,
    cancel: CancellationToken,
    release: CancellationToken,
    idle: Duration,
    sink: Option<Arc<dyn StoreCompleted>>,
}

impl Worker {
    fn publish(&self) {
        let snapshot = self.state.snapshot();
        self.publisher.send_replace(snapshot.clone());
        // No subscribers is fine
        let _ = self.updates.send(TaskUpdate {
            document_id: self.state.document_id().clone(),
            snapshot,
        });
    }

    fn timeout_error(&self) -> TaskError {
        TaskError::Timeout {
            idle_secs: self.idle.as_secs(),
        }
    }

    async fn run(mut self) {
        self.state.begin_connecting();
        self.publish();
        let document_id = self.state.document_id().clone();

        let transport = Arc::clone(&self.transport);
        let opened = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            opened = timeout(self.idle, transport.open(&document_id)) => Some(opened),
        };

        let frames = match opened {
            None => {
                self.state.cancel();
                self.publish();
                return;
            }
            Some(Err(_)) => {
                let error = self.timeout_error();
                self.state.fail(error);
                self.publish();
                return;
            }
            Some(Ok(Err(e))) => {
                self.state.fail(e.into());
                self.publish();
                return;
            }
            Some(Ok(Ok(frames))) => frames,
        };

        debug!("Stream open for {}", document_id);
        self.stream(frames).await;

        if let Some(result) = self.state.completed_analysis() {
            info!("Analysis of {} completed", document_id);
            self.store(result).await;
        }
    }

    async fn stream(&mut self, mut frames: FrameStream) {
        loop {
            let next = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    self.state.cancel();
                    self.publish();
                    info!("Task {} cancelled", self.state.document_id());
                    // Keep the connection until the upstream stop has been sent
                    tokio::select! {
                        _ = self.release.cancelled() => {}
                        _ = tokio::time::sleep(self.idle) => {}
                    }
                    return;
                }
                next = timeout(self.idle, frames.next()) => next,
            };

            match next {
                Err(_) => {
                    let error = self.timeout_error();
                    self.state.fail(error);
                }
                Ok(None) => self.state.finish_stream(),
                Ok(Some(Err(e))) => self.state.fail(TaskError::Transport {
                    message: e.to_string(),
                }),
                Ok(Some(Ok(frame))) => {
                    self.state.apply_frame(frame);
                }
            }
            self.publish();

            if self.state.is_terminal() {
                return;
            }
        }
    }

    async fn store(&self, result: CompletedAnalysis) {
        let Some(sink) = self.sink.clone() else {
            return;
        };
        let document_id = result.document_id.clone();
        match tokio::task::spawn_blocking(move || sink.store(&result)).await {
            Ok(Ok(())) => debug!("Stored result for {}", document_id),
            Ok(Err(e)) => error!("Storing result for {} failed: {}", document_id, e),
            Err(e) => error!("Result sink for {} panicked: {}", document_id, e),
        }
    }
}
