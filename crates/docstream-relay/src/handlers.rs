//! HTTP request handlers for the relay.
//!
//! Streams analysis events as server-push responses and forwards stop
//! requests to the generation service.

use crate::pump::spawn_pump;
use crate::registry::TaskRegistry;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Json, Response,
    },
    routing::{get, post},
    Router as AxumRouter,
};
use docstream_domain::{DocumentId, UpstreamTaskId};
use docstream_llm::{GenerationClient, LlmError, RelayEvent};
use futures::stream::Stream;
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::{wrappers::ReceiverStream, StreamExt};
use tracing::{info, warn};

/// Buffered events per response before pumps wait on the client
const EVENT_BUFFER: usize = 64;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Generation service client
    pub client: GenerationClient,
    /// Upstream task ids seen on live streams
    pub registry: Arc<TaskRegistry>,
    /// User id used when a request names none
    pub default_user: String,
}

impl AppState {
    fn user_or_default(&self, user: Option<String>) -> String {
        user.filter(|u| !u.trim().is_empty())
            .unwrap_or_else(|| self.default_user.clone())
    }
}

/// Query string of the single-document stream
#[derive(Debug, Default, Deserialize)]
pub struct StreamQuery {
    /// Caller's user id
    pub user: Option<String>,
}

/// Multi-document stream request
#[derive(Debug, Deserialize)]
pub struct BatchStreamRequest {
    /// Documents to analyze, each on its own upstream connection
    pub document_ids: Vec<String>,
    /// Caller's user id
    #[serde(default)]
    pub user: Option<String>,
}

/// Stop request
#[derive(Debug, Deserialize)]
pub struct StopRequest {
    /// Upstream task id announced on the stream
    #[serde(default)]
    pub task_id: String,
    /// Caller's user id
    #[serde(default)]
    pub user: Option<String>,
}

/// Stop response
#[derive(Debug, Serialize, Deserialize)]
pub struct StopResponse {
    /// Always "success"
    pub result: String,
}

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthCheckResponse {
    /// Overall health status
    pub status: String,
    /// Configured generation service
    pub upstream: String,
    /// Upstream task ids on live streams
    pub active_tasks: usize,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error message
    pub error: String,
}

/// Application error type
#[derive(Debug)]
pub enum AppError {
    /// Malformed or empty request
    BadRequest(String),
    /// Task id this relay never forwarded
    UnknownTask(String),
    /// Generation service call failed
    Upstream(LlmError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::UnknownTask(id) => (StatusCode::NOT_FOUND, format!("Unknown task id: {}", id)),
            AppError::Upstream(e) => (StatusCode::BAD_GATEWAY, e.to_string()),
        };

        let body = Json(ErrorResponse { error: message });
        (status, body).into_response()
    }
}

impl From<LlmError> for AppError {
    fn from(e: LlmError) -> Self {
        AppError::Upstream(e)
    }
}

type EventStream = Sse<Pin<Box<dyn Stream<Item = Result<Event, axum::Error>> + Send>>>;

fn sse_response(rx: mpsc::Receiver<RelayEvent>) -> EventStream {
    let events: Pin<Box<dyn Stream<Item = Result<Event, axum::Error>> + Send>> =
        Box::pin(ReceiverStream::new(rx).map(|event| Event::default().json_data(event)));
    Sse::new(events).keep_alive(KeepAlive::default())
}

/// GET /analysis/stream/:document_id - Stream one document
async fn stream_document(
    State(state): State<AppState>,
    Path(document_id): Path<String>,
    Query(query): Query<StreamQuery>,
) -> Result<EventStream, AppError> {
    let document_id = DocumentId::new(document_id.trim());
    if document_id.is_blank() {
        return Err(AppError::BadRequest("document_id cannot be empty".to_string()));
    }

    let (tx, rx) = mpsc::channel(EVENT_BUFFER);
    let user = state.user_or_default(query.user);
    spawn_pump(state.client.clone(), state.registry.clone(), document_id, user, tx);
    Ok(sse_response(rx))
}

/// POST /analysis/stream - Stream several documents over one response
async fn stream_batch(
    State(state): State<AppState>,
    Json(request): Json<BatchStreamRequest>,
) -> Result<EventStream, AppError> {
    let mut documents: Vec<DocumentId> = Vec::new();
    for raw in &request.document_ids {
        let id = DocumentId::new(raw.trim());
        if !id.is_blank() && !documents.contains(&id) {
            documents.push(id);
        }
    }
    if documents.is_empty() {
        return Err(AppError::BadRequest("document_ids cannot be empty".to_string()));
    }

    info!("Streaming batch of {} documents", documents.len());
    let (tx, rx) = mpsc::channel(EVENT_BUFFER);
    let user = state.user_or_default(request.user);
    for document_id in documents {
        spawn_pump(
            state.client.clone(),
            state.registry.clone(),
            document_id,
            user.clone(),
            tx.clone(),
        );
    }
    Ok(sse_response(rx))
}

/// POST /analysis/stop - Stop one upstream generation
async fn stop_task(
    State(state): State<AppState>,
    Json(request): Json<StopRequest>,
) -> Result<Json<StopResponse>, AppError> {
    let task_id = UpstreamTaskId::parse(&request.task_id)
        .ok_or_else(|| AppError::BadRequest("task_id cannot be empty".to_string()))?;

    let Some(document_id) = state.registry.lookup(&task_id) else {
        return Err(AppError::UnknownTask(task_id.to_string()));
    };

    let user = state.user_or_default(request.user);
    info!("Stopping upstream task {} ({})", task_id, document_id);
    state.client.stop(&task_id, &user).await.map_err(|e| {
        warn!("Stop for {} failed: {}", task_id, e);
        AppError::from(e)
    })?;

    Ok(Json(StopResponse {
        result: "success".to_string(),
    }))
}

/// GET /health - Liveness
async fn health_check(State(state): State<AppState>) -> Json<HealthCheckResponse> {
    Json(HealthCheckResponse {
        status: "healthy".to_string(),
        upstream: state.client.config().base_url.clone(),
        active_tasks: state.registry.len(),
    })
}

/// Create the axum router with all routes
pub fn create_router(state: AppState) -> AxumRouter {
    AxumRouter::new()
        .route("/analysis/stream", post(stream_batch))
        .route("/analysis/stream/:document_id", get(stream_document))
        .route("/analysis/stop", post(stop_task))
        .route("/health", get(health_check))
        .with_state(state)
}
