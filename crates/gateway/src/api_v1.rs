//! HTTP API v1: research sessions.
//!
//! Endpoints:
//!
//! - `POST /v1/sessions`  Create a session
//! - `GET  /v1/sessions/{id}`  Inspect a session
//! - `POST /v1/sessions/{id}/clarify`  Generate clarifying questions
//! - `POST /v1/sessions/{id}/research`  Run research, streamed as SSE
//! - `POST /v1/sessions/{id}/reset`  Clear the session
//! - `GET  /v1/status`  Runtime status

use axum::{
    Router,
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    response::sse::{Event as SseEvent, KeepAlive, Sse},
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;
use tokio_stream::StreamExt;
use tracing::{info, warn};

use deepresearch_agent::{ClarifyOutcome, ResearchAssistant};
use deepresearch_core::session::{Controls, SessionState};

// ── State ─────────────────────────────────────────────────────────────────

/// One browser tab (or API client) working through clarify → research.
pub struct Session {
    pub state: SessionState,
    pub created_at: DateTime<Utc>,
    running: Arc<AtomicBool>,
}

impl Session {
    fn new() -> Self {
        Self {
            state: SessionState::default(),
            created_at: Utc::now(),
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

/// Shared state for the v1 API.
pub struct ApiV1State {
    pub assistant: ResearchAssistant,
    pub sessions: RwLock<HashMap<String, Session>>,
    /// Oldest sessions are evicted beyond this
    pub max_sessions: usize,
    pub provider: String,
    pub start_time: DateTime<Utc>,
}

impl ApiV1State {
    pub fn new(assistant: ResearchAssistant, max_sessions: usize, provider: impl Into<String>) -> Self {
        Self {
            assistant,
            sessions: RwLock::new(HashMap::new()),
            max_sessions: max_sessions.max(1),
            provider: provider.into(),
            start_time: Utc::now(),
        }
    }
}

pub type SharedApiState = Arc<ApiV1State>;

// ── Router ────────────────────────────────────────────────────────────────

/// Build the v1 API router. Nest this under "/v1" in the main router.
pub fn v1_router(state: SharedApiState) -> Router {
    Router::new()
        .route("/sessions", post(create_session_handler))
        .route("/sessions/{id}", get(get_session_handler))
        .route("/sessions/{id}/clarify", post(clarify_handler))
        .route("/sessions/{id}/research", post(research_handler))
        .route("/sessions/{id}/reset", post(reset_handler))
        .route("/status", get(status_handler))
        .with_state(state)
}

// ── DTOs ──────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (status, Json(ErrorResponse { error: message.into() }))
}

fn not_found(id: &str) -> ApiError {
    api_error(StatusCode::NOT_FOUND, format!("session '{id}' not found"))
}

fn busy() -> ApiError {
    api_error(StatusCode::CONFLICT, "a research run is already in progress for this session")
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateSessionResponse {
    pub id: String,
    pub created_at: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionResponse {
    pub id: String,
    pub state: SessionState,
    pub controls: Controls,
    pub running: bool,
    pub created_at: String,
}

#[derive(Debug, Deserialize)]
pub struct ClarifyRequest {
    pub query: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct ResearchRequest {
    #[serde(default)]
    pub answers: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ResetResponse {
    pub controls: Controls,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    pub active_sessions: usize,
    pub running_sessions: usize,
    pub provider: String,
    pub send_email: bool,
}

// ── Sessions ──────────────────────────────────────────────────────────────

async fn create_session_handler(
    State(state): State<SharedApiState>,
) -> (StatusCode, Json<CreateSessionResponse>) {
    let session = Session::new();
    let id = uuid::Uuid::new_v4().to_string();
    let created_at = session.created_at.to_rfc3339();

    let mut sessions = state.sessions.write().await;

    // Evict oldest if at capacity
    if sessions.len() >= state.max_sessions {
        if let Some(oldest_key) = sessions
            .iter()
            .min_by_key(|(_, s)| s.created_at)
            .map(|(k, _)| k.clone())
        {
            sessions.remove(&oldest_key);
        }
    }

    sessions.insert(id.clone(), session);
    info!(session = %id, "Session created");

    (StatusCode::CREATED, Json(CreateSessionResponse { id, created_at }))
}

async fn get_session_handler(
    State(state): State<SharedApiState>,
    Path(id): Path<String>,
) -> Result<Json<SessionResponse>, ApiError> {
    let sessions = state.sessions.read().await;
    let session = sessions.get(&id).ok_or_else(|| not_found(&id))?;

    Ok(Json(SessionResponse {
        id: id.clone(),
        state: session.state.clone(),
        controls: session.state.controls(),
        running: session.is_running(),
        created_at: session.created_at.to_rfc3339(),
    }))
}

/// `POST /v1/sessions/{id}/clarify`. The session lock is not held while the
/// clarifier runs; its questions are applied to the live session only if it
/// is still waiting on the same query.
async fn clarify_handler(
    State(state): State<SharedApiState>,
    Path(id): Path<String>,
    Json(payload): Json<ClarifyRequest>,
) -> Result<Json<ClarifyOutcome>, ApiError> {
    let query = {
        let mut sessions = state.sessions.write().await;
        let session = sessions.get_mut(&id).ok_or_else(|| not_found(&id))?;
        if session.is_running() {
            return Err(busy());
        }
        match state.assistant.start_clarify(&mut session.state, &payload.query) {
            Ok(query) => query,
            Err(outcome) => return Ok(Json(outcome)),
        }
    };

    let questions = state.assistant.clarify(&query).await;

    let mut sessions = state.sessions.write().await;
    let session = sessions.get_mut(&id).ok_or_else(|| not_found(&id))?;
    let outcome = state
        .assistant
        .complete_clarify(&mut session.state, &query, questions);

    Ok(Json(outcome))
}

/// Clears the session's running flag when the SSE stream ends or the client
/// disconnects.
struct RunGuard(Arc<AtomicBool>);

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// `POST /v1/sessions/{id}/research`: stream the run as server-sent events.
///
/// Each event is named after the chunk kind (`status`, `warning`, `error`,
/// `report`) and carries the chunk as JSON.
async fn research_handler(
    State(state): State<SharedApiState>,
    Path(id): Path<String>,
    Json(payload): Json<ResearchRequest>,
) -> Result<Sse<impl futures::Stream<Item = Result<SseEvent, Infallible>>>, ApiError> {
    let (session_state, guard) = {
        let sessions = state.sessions.read().await;
        let session = sessions.get(&id).ok_or_else(|| not_found(&id))?;
        if session
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            warn!(session = %id, "Rejected concurrent research run");
            return Err(busy());
        }
        (session.state.clone(), RunGuard(session.running.clone()))
    };

    info!(session = %id, "Research run requested");
    let run = state.assistant.run_research(&session_state, &payload.answers);

    let stream = run.map(move |event| {
        let _running = &guard;
        let data = serde_json::to_string(&event).unwrap_or_default();
        Ok(SseEvent::default().event(event.event_type()).data(data))
    });

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

async fn reset_handler(
    State(state): State<SharedApiState>,
    Path(id): Path<String>,
) -> Result<Json<ResetResponse>, ApiError> {
    let mut sessions = state.sessions.write().await;
    let session = sessions.get_mut(&id).ok_or_else(|| not_found(&id))?;
    let controls = state.assistant.reset(&mut session.state);
    Ok(Json(ResetResponse { controls }))
}

async fn status_handler(State(state): State<SharedApiState>) -> Json<StatusResponse> {
    let sessions = state.sessions.read().await;

    let uptime = Utc::now()
        .signed_duration_since(state.start_time)
        .num_seconds() as u64;

    Json(StatusResponse {
        status: "healthy".into(),
        version: env!("CARGO_PKG_VERSION").into(),
        uptime_secs: uptime,
        active_sessions: sessions.len(),
        running_sessions: sessions.values().filter(|s| s.is_running()).count(),
        provider: state.provider.clone(),
        send_email: state.assistant.options().send_email,
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────
