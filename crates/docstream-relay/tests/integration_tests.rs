//! Integration tests for the relay against a fake generation service

use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use docstream_llm::{RelayEvent, RelayEventKind};
use docstream_relay::{
    build_state,
    config::RelayConfig,
    handlers::{HealthCheckResponse, StopResponse},
    serve,
};
use futures::StreamExt;
use serde_json::{json, Value};
use std::convert::Infallible;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;

const API_KEY: &str = "fake-upstream-key";

#[derive(Clone, Default)]
struct FakeUpstream {
    stops: Arc<Mutex<Vec<(String, String)>>>,
    requests: Arc<Mutex<Vec<Value>>>,
}

fn sse(lines: &[Value]) -> String {
    lines.iter().map(|v| format!("data: {}\n\n", v)).collect()
}

async fn fake_chat(
    State(fake): State<FakeUpstream>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if headers.get(header::AUTHORIZATION).and_then(|v| v.to_str().ok())
        != Some(&format!("Bearer {}", API_KEY)[..])
    {
        return (StatusCode::UNAUTHORIZED, "missing key").into_response();
    }
    fake.requests.lock().unwrap().push(body.clone());

    let document_id = body["inputs"]["document_id"].as_str().unwrap_or_default().to_string();
    let event_stream = [(header::CONTENT_TYPE, "text/event-stream")];

    match document_id.as_str() {
        "doc-fail" => (StatusCode::INTERNAL_SERVER_ERROR, r#"{"message":"boom"}"#).into_response(),
        "doc-slow" | "doc-badstop" => {
            let task_id = if document_id == "doc-slow" { "t-slow" } else { "t-badstop" };
            let first = sse(&[json!({"event": "message_start", "task_id": task_id})]);
            let body = futures::stream::iter(vec![Ok::<_, Infallible>(first)])
                .chain(futures::stream::pending());
            (event_stream, Body::from_stream(body)).into_response()
        }
        other => {
            let task_id = format!("t-{}", other);
            let text = sse(&[
                json!({"event": "ping"}),
                json!({"event": "message_start", "task_id": task_id}),
                json!({"event": "message", "task_id": task_id, "answer": "```json\n{\"doc\": "}),
                json!({"event": "message", "task_id": task_id, "answer": format!("\"{}\"}}\n```", other)}),
                json!({"event": "message_end", "task_id": task_id}),
            ]);
            (event_stream, text).into_response()
        }
    }
}

async fn fake_stop(
    State(fake): State<FakeUpstream>,
    Path(task_id): Path<String>,
    Json(body): Json<Value>,
) -> Response {
    let user = body["user"].as_str().unwrap_or_default().to_string();
    fake.stops.lock().unwrap().push((task_id.clone(), user));
    if task_id == "t-badstop" {
        return (StatusCode::INTERNAL_SERVER_ERROR, "stop failed").into_response();
    }
    Json(json!({"result": "success"})).into_response()
}

async fn spawn_fake_upstream() -> (String, FakeUpstream) {
    let fake = FakeUpstream::default();
    let app = Router::new()
        .route("/v1/chat-messages", post(fake_chat))
        .route("/v1/chat-messages/:task_id/stop", post(fake_stop))
        .with_state(fake.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{}/v1", addr), fake)
}

async fn spawn_relay(upstream: &str) -> String {
    let mut config = RelayConfig::default_test_config();
    config.upstream.base_url = upstream.to_string();
    config.upstream.api_key = API_KEY.to_string();
    let state = build_state(&config).unwrap();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        serve(listener, state).await.unwrap();
    });
    format!("http://{}", addr)
}

fn parse_events(text: &str) -> Vec<RelayEvent> {
    text.lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(|payload| serde_json::from_str(payload.trim()).unwrap())
        .collect()
}

/// Read a streaming response until an event for `document_id` announces a task id
async fn read_until_task_id(response: &mut reqwest::Response) -> String {
    let mut text = String::new();
    loop {
        let chunk = tokio::time::timeout(Duration::from_secs(5), response.chunk())
            .await
            .expect("timed out waiting for start event")
            .unwrap()
            .expect("stream ended before start event");
        text.push_str(&String::from_utf8_lossy(&chunk));
        if let Some(task_id) = parse_events(&text).into_iter().find_map(|e| e.task_id) {
            return task_id;
        }
    }
}

#[tokio::test]
async fn test_health_check_endpoint() {
    let (upstream, _fake) = spawn_fake_upstream().await;
    let relay = spawn_relay(&upstream).await;

    let health: HealthCheckResponse = reqwest::get(format!("{}/health", relay))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(health.status, "healthy");
    assert_eq!(health.upstream, upstream);
    assert_eq!(health.active_tasks, 0);
}

#[tokio::test]
async fn test_single_document_stream() {
    let (upstream, fake) = spawn_fake_upstream().await;
    let relay = spawn_relay(&upstream).await;

    let response = reqwest::get(format!("{}/analysis/stream/doc-a?user=ana", relay))
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let events = parse_events(&response.text().await.unwrap());

    let kinds: Vec<RelayEventKind> = events.iter().map(|e| e.event).collect();
    assert_eq!(
        kinds,
        vec![
            RelayEventKind::Start,
            RelayEventKind::Message,
            RelayEventKind::Message,
            RelayEventKind::Done
        ]
    );
    assert!(events.iter().all(|e| e.document_id == "doc-a"));
    assert_eq!(events[0].task_id.as_deref(), Some("t-doc-a"));

    let answer: String = events.iter().filter_map(|e| e.answer.clone()).collect();
    assert_eq!(answer, "```json\n{\"doc\": \"doc-a\"}\n```");

    let requests = fake.requests.lock().unwrap();
    assert_eq!(requests[0]["user"], "ana");
    assert_eq!(requests[0]["response_mode"], "streaming");
    assert_eq!(requests[0]["inputs"]["document_id"], "doc-a");
}

#[tokio::test]
async fn test_batch_stream_isolates_upstream_failure() {
    let (upstream, _fake) = spawn_fake_upstream().await;
    let relay = spawn_relay(&upstream).await;

    let response = reqwest::Client::new()
        .post(format!("{}/analysis/stream", relay))
        .json(&json!({"document_ids": ["doc-1", "doc-fail", "doc-3", "doc-1"]}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let events = parse_events(&response.text().await.unwrap());

    for doc in ["doc-1", "doc-3"] {
        let mine: Vec<&RelayEvent> = events.iter().filter(|e| e.document_id == doc).collect();
        assert_eq!(mine.first().map(|e| e.event), Some(RelayEventKind::Start));
        assert_eq!(mine.last().map(|e| e.event), Some(RelayEventKind::Done));
        // Duplicate ids share one upstream connection
        assert_eq!(mine.iter().filter(|e| e.event == RelayEventKind::Done).count(), 1);
    }

    let failed: Vec<&RelayEvent> = events.iter().filter(|e| e.document_id == "doc-fail").collect();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].event, RelayEventKind::Error);
    assert_eq!(failed[0].status, Some(500));
    assert_eq!(failed[0].message.as_deref(), Some(r#"{"message":"boom"}"#));
}

#[tokio::test]
async fn test_unreachable_upstream_reports_generic_error() {
    let relay = spawn_relay("http://127.0.0.1:1/v1").await;

    let response = reqwest::get(format!("{}/analysis/stream/doc-x", relay)).await.unwrap();
    let events = parse_events(&response.text().await.unwrap());

    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event, RelayEventKind::Error);
    assert_eq!(events[0].status, None);
    assert_eq!(
        events[0].message.as_deref(),
        Some(docstream_relay::pump::STREAM_FAILURE_MESSAGE)
    );
}

#[tokio::test]
async fn test_stop_running_task() {
    let (upstream, fake) = spawn_fake_upstream().await;
    let relay = spawn_relay(&upstream).await;
    let client = reqwest::Client::new();

    let mut stream = client
        .get(format!("{}/analysis/stream/doc-slow", relay))
        .send()
        .await
        .unwrap();
    let task_id = read_until_task_id(&mut stream).await;
    assert_eq!(task_id, "t-slow");

    let response = client
        .post(format!("{}/analysis/stop", relay))
        .json(&json!({"task_id": task_id, "user": "ana"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let body: StopResponse = response.json().await.unwrap();
    assert_eq!(body.result, "success");

    // Exactly one upstream stop call, original stream left open
    assert_eq!(
        *fake.stops.lock().unwrap(),
        vec![("t-slow".to_string(), "ana".to_string())]
    );
}

#[tokio::test]
async fn test_stop_upstream_failure_is_bad_gateway() {
    let (upstream, _fake) = spawn_fake_upstream().await;
    let relay = spawn_relay(&upstream).await;
    let client = reqwest::Client::new();

    let mut stream = client
        .get(format!("{}/analysis/stream/doc-badstop", relay))
        .send()
        .await
        .unwrap();
    let task_id = read_until_task_id(&mut stream).await;

    let response = client
        .post(format!("{}/analysis/stop", relay))
        .json(&json!({"task_id": task_id}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 502);
    let body: Value = response.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("500"));
}

#[tokio::test]
async fn test_stop_rejects_empty_and_finished_ids() {
    let (upstream, fake) = spawn_fake_upstream().await;
    let relay = spawn_relay(&upstream).await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{}/analysis/stop", relay))
        .json(&json!({"task_id": ""}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);

    // Ids are forgotten once their stream has finished
    let finished = reqwest::get(format!("{}/analysis/stream/doc-done", relay)).await.unwrap();
    finished.text().await.unwrap();

    let response = client
        .post(format!("{}/analysis/stop", relay))
        .json(&json!({"task_id": "t-doc-done"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 404);
    assert!(fake.stops.lock().unwrap().is_empty());
}

async fn active_tasks(relay: &str) -> usize {
    let health: HealthCheckResponse = reqwest::get(format!("{}/health", relay))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    health.active_tasks
}

#[tokio::test]
async fn test_downstream_disconnect_releases_upstream() {
    let (upstream, fake) = spawn_fake_upstream().await;
    let relay = spawn_relay(&upstream).await;

    let mut stream = reqwest::get(format!("{}/analysis/stream/doc-slow", relay))
        .await
        .unwrap();
    assert_eq!(read_until_task_id(&mut stream).await, "t-slow");
    assert_eq!(active_tasks(&relay).await, 1);

    drop(stream);

    let mut remaining = 1;
    for _ in 0..100 {
        remaining = active_tasks(&relay).await;
        if remaining == 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(remaining, 0);

    // The id is forgotten, so a late stop is refused without an upstream call
    let response = reqwest::Client::new()
        .post(format!("{}/analysis/stop", relay))
        .json(&json!({"task_id": "t-slow"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 404);
    assert!(fake.stops.lock().unwrap().is_empty());
}
