use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tracing::Level;
use uuid::Uuid;

use conductor_automation::{click_sync, ocr_sync, screenshot_sync};
use conductor_gateway::EndpointRole;
use conductor_observability::{emit_event, redact_text, ObservabilityEvent, ProcessKind};
use conductor_types::{
    AgentRole, ChatMessage, ChatRequest, ChatResponse, HealthResponse, Session,
    SessionListResponse, SubmitTaskRequest, SubmitTaskResponse,
};

use crate::screenshots::ScreenshotEntry;
use crate::AppState;

type ApiError = (StatusCode, Json<Value>);

fn not_found(detail: impl Into<String>) -> ApiError {
    (
        StatusCode::NOT_FOUND,
        Json(json!({"error": {"message": detail.into()}})),
    )
}

fn bad_gateway(detail: impl Into<String>) -> ApiError {
    (
        StatusCode::BAD_GATEWAY,
        Json(json!({"error": {"message": detail.into()}})),
    )
}

fn internal(detail: impl Into<String>) -> ApiError {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({"error": {"message": detail.into()}})),
    )
}

pub fn app_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/tasks/submit", post(submit_task))
        .route("/tasks", get(list_tasks))
        .route("/tasks/{id}/status", get(task_status))
        .route("/tasks/{id}/cancel", post(cancel_task))
        .route("/v1/chat/completions", post(chat_completions))
        .route("/automation/screenshot", post(automation_screenshot))
        .route("/automation/ocr", post(automation_ocr))
        .route("/automation/click", post(automation_click))
        .route("/screenshots", post(capture_screenshot))
        .route("/screenshots/queue", get(screenshot_queue))
        .route("/screenshots/queue/clear", post(clear_screenshot_queue))
        .route("/screenshots/queue/{id}", delete(delete_screenshot))
        .route(
            "/screenshots/queue/{id}/move-to-extra",
            post(move_screenshot_to_extra),
        )
        .layer(cors)
        .with_state(state)
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        agents_available: AgentRole::ALL
            .iter()
            .map(|role| role.as_str().to_string())
            .collect(),
        tools_available: vec![
            "screenshot".to_string(),
            "ocr".to_string(),
            "click".to_string(),
        ],
    })
}

async fn submit_task(
    State(state): State<AppState>,
    Json(input): Json<SubmitTaskRequest>,
) -> (StatusCode, Json<SubmitTaskResponse>) {
    let session_id = state.registry.submit(input.objective, input.priority).await;
    emit_event(
        Level::INFO,
        ProcessKind::Engine,
        ObservabilityEvent {
            event: "session_submitted",
            component: "server",
            session_id: Some(&session_id),
            status: Some("pending"),
            ..Default::default()
        },
    );
    (StatusCode::ACCEPTED, Json(SubmitTaskResponse { session_id }))
}

async fn task_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Session>, ApiError> {
    state
        .registry
        .snapshot(&id)
        .await
        .map(Json)
        .map_err(|err| not_found(err.to_string()))
}

async fn list_tasks(State(state): State<AppState>) -> Json<SessionListResponse> {
    let sessions = state.registry.list().await;
    let active_sessions = sessions.iter().filter(|s| !s.status.is_terminal()).count();
    let total_sessions = sessions.len();
    Json(SessionListResponse {
        sessions,
        active_sessions,
        total_sessions,
    })
}

async fn cancel_task(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    state
        .registry
        .cancel(&id)
        .await
        .map_err(|err| not_found(err.to_string()))?;
    emit_event(
        Level::INFO,
        ProcessKind::Engine,
        ObservabilityEvent {
            event: "session_cancelled",
            component: "server",
            session_id: Some(&id),
            status: Some("cancelled"),
            ..Default::default()
        },
    );
    Ok(Json(json!({"ok": true})))
}

/// OpenAI-compatible single completion, enriched with memory context. The
/// last user message is the retrieval query.
async fn chat_completions(
    State(state): State<AppState>,
    Json(input): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    let query = input
        .messages
        .iter()
        .rev()
        .find(|m| m.role == "user")
        .map(|m| m.content.clone())
        .unwrap_or_default();
    tracing::debug!(
        target: "conductor.server",
        query = %redact_text(&query),
        "chat completion requested"
    );

    let context = match state.memory.retrieve(&query, 5).await {
        Ok(documents) => documents.join("\n"),
        Err(err) => {
            tracing::warn!(target: "conductor.server", error = %err, "memory retrieval failed open");
            String::new()
        }
    };

    let mut messages = Vec::with_capacity(input.messages.len() + 1);
    if !context.is_empty() {
        messages.push(ChatMessage::system(format!(
            "Relevant context from memory:\n{context}"
        )));
    }
    messages.extend(input.messages);

    state
        .gateway
        .complete(
            EndpointRole::Control,
            &messages,
            None,
            &CancellationToken::new(),
        )
        .await
        .map(|text| Json(ChatResponse::assistant(text)))
        .map_err(|err| bad_gateway(err.to_string()))
}

#[derive(Debug, Deserialize)]
struct ScreenshotInput {
    url: String,
}

#[derive(Debug, Deserialize)]
struct OcrInput {
    input: String,
}

#[derive(Debug, Deserialize)]
struct ClickInput {
    selector: String,
}

// The automation handlers cross the sync bridge deliberately: they exercise
// the same path as out-of-runtime automation callers.
async fn automation_screenshot(
    State(state): State<AppState>,
    Json(input): Json<ScreenshotInput>,
) -> Result<Json<Value>, ApiError> {
    let automation = Arc::clone(&state.automation);
    let url = input.url.clone();
    let png = tokio::task::spawn_blocking(move || screenshot_sync(automation, &url))
        .await
        .map_err(|err| internal(err.to_string()))?
        .map_err(|err| bad_gateway(err.to_string()))?;
    Ok(Json(json!({
        "url": input.url,
        "image_base64": BASE64.encode(png),
    })))
}

async fn automation_ocr(
    State(state): State<AppState>,
    Json(input): Json<OcrInput>,
) -> Result<Json<Value>, ApiError> {
    let automation = Arc::clone(&state.automation);
    let target = input.input.clone();
    let text = tokio::task::spawn_blocking(move || ocr_sync(automation, &target))
        .await
        .map_err(|err| internal(err.to_string()))?
        .map_err(|err| bad_gateway(err.to_string()))?;
    Ok(Json(json!({"input": input.input, "text": text})))
}

async fn automation_click(
    State(state): State<AppState>,
    Json(input): Json<ClickInput>,
) -> Result<Json<Value>, ApiError> {
    let automation = Arc::clone(&state.automation);
    let selector = input.selector;
    let outcome = tokio::task::spawn_blocking(move || click_sync(automation, &selector))
        .await
        .map_err(|err| internal(err.to_string()))?
        .map_err(|err| bad_gateway(err.to_string()))?;
    Ok(Json(serde_json::to_value(outcome).unwrap_or_default()))
}

/// Capture, OCR, remember, enqueue.
async fn capture_screenshot(
    State(state): State<AppState>,
    Json(input): Json<ScreenshotInput>,
) -> Result<(StatusCode, Json<ScreenshotEntry>), ApiError> {
    let png = state
        .automation
        .screenshot(&input.url)
        .await
        .map_err(|err| bad_gateway(err.to_string()))?;
    let ocr_text = state
        .automation
        .ocr(&input.url)
        .await
        .unwrap_or_default();

    let entry = ScreenshotEntry {
        id: Uuid::new_v4().to_string(),
        url: input.url,
        image_base64: BASE64.encode(&png),
        ocr_text: ocr_text.clone(),
        captured_at: Utc::now(),
    };

    // Memory is enrichment, not a precondition for the capture.
    if let Err(err) = state
        .memory
        .store(
            &entry.id,
            &ocr_text,
            json!({"url": entry.url, "kind": "screenshot"}),
        )
        .await
    {
        tracing::warn!(target: "conductor.server", error = %err, "screenshot memory store failed");
    }

    state.screenshots.write().await.push(entry.clone());
    Ok((StatusCode::CREATED, Json(entry)))
}

async fn screenshot_queue(State(state): State<AppState>) -> Json<Value> {
    let queues = state.screenshots.read().await;
    Json(json!({
        "queue": queues.main().cloned().collect::<Vec<_>>(),
        "extra_queue": queues.extra().cloned().collect::<Vec<_>>(),
    }))
}

async fn delete_screenshot(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    if state.screenshots.write().await.remove(&id) {
        Ok(Json(json!({"ok": true})))
    } else {
        Err(not_found(format!("screenshot `{id}` not found")))
    }
}

async fn clear_screenshot_queue(State(state): State<AppState>) -> Json<Value> {
    state.screenshots.write().await.clear();
    Json(json!({"ok": true}))
}

async fn move_screenshot_to_extra(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    if state.screenshots.write().await.move_to_extra(&id) {
        Ok(Json(json!({"ok": true})))
    } else {
        Err(not_found(format!("screenshot `{id}` not found")))
    }
}
