//! HTTP gateway for deepresearch.
//!
//! A thin presentation adapter: sessions, clarify, streamed research, and
//! reset over HTTP, all delegating to [`ResearchAssistant`]. Research runs
//! are streamed as server-sent events.
//!
//! Built on Axum.

pub mod api_v1;

use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderValue, Method, header};
use axum::{Router, response::Json, routing::get};
use serde::Serialize;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::{debug, info, warn};

use deepresearch_agent::{LlmInvoker, ResearchAssistant, ResearchOptions};
use deepresearch_core::event::{DomainEvent, EventBus};

/// Build the full router: health check plus the v1 API.
///
/// Layers applied:
/// - CORS for local browser front ends
/// - Request body size limit (1 MB)
/// - HTTP trace logging
pub fn build_router(api_state: api_v1::SharedApiState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list([
            HeaderValue::from_static("http://localhost:7860"),
            HeaderValue::from_static("http://127.0.0.1:7860"),
        ]))
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE])
        .max_age(std::time::Duration::from_secs(3600));

    Router::new()
        .route("/health", get(health_handler))
        .nest("/v1", api_v1::v1_router(api_state))
        .layer(DefaultBodyLimit::max(1024 * 1024))
        .layer(cors)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

/// Build the provider, agents, and session store once, then serve.
pub async fn start(config: deepresearch_config::AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);

    let provider = deepresearch_providers::build_from_config(&config)?;
    let event_bus = Arc::new(EventBus::default());
    spawn_event_logger(&event_bus);

    let invoker = LlmInvoker::from_config(&config, provider.clone(), event_bus.clone())?;
    let assistant = ResearchAssistant::new(
        Arc::new(invoker),
        ResearchOptions::from(&config.research),
        event_bus,
    );
    let api_state = Arc::new(api_v1::ApiV1State::new(
        assistant,
        config.gateway.max_sessions,
        provider.name(),
    ));

    let app = build_router(api_state);

    info!(addr = %addr, provider = provider.name(), model = %config.model, "Gateway starting");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Log every domain event at debug level until the bus closes.
pub fn spawn_event_logger(bus: &EventBus) -> JoinHandle<()> {
    let mut rx = bus.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => log_event(&event),
                Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Event logger lagged");
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}

fn log_event(event: &DomainEvent) {
    match event {
        DomainEvent::AgentInvoked {
            role,
            model,
            tokens_used,
            duration_ms,
            ..
        } => debug!(%role, %model, tokens_used, duration_ms, "agent invoked"),
        DomainEvent::ToolExecuted {
            tool_name,
            success,
            duration_ms,
            ..
        } => debug!(tool = %tool_name, success, duration_ms, "tool executed"),
        DomainEvent::StageCompleted { stage, duration_ms, .. } => {
            debug!(%stage, duration_ms, "stage completed")
        }
        DomainEvent::ErrorOccurred {
            context,
            error_message,
            ..
        } => debug!(%context, error = %error_message, "error occurred"),
    }
}

// --- Handlers ---

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}
