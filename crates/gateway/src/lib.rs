//! HTTP gateway for Repobot.
//!
//! Receives GitHub webhook deliveries, validates their signature, decides
//! which ones start an agent run and hands those to the [`Pipeline`]. Also
//! serves `/health` and `/status`.
//!
//! Built on Axum.

pub mod events;
pub mod pipeline;
pub mod signature;
pub mod stats;

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderMap, StatusCode};
use axum::{
    Router,
    extract::State,
    response::Json,
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use repobot_agent::AgentLoop;
use repobot_config::{AppConfig, TriggerConfig};
use repobot_core::event::{DomainEvent, EventBus};
use repobot_github::GithubClient;
use serde::Serialize;
use tracing::{debug, info, warn};

pub use events::{Decision, Trigger, WebhookEvent, gate};
pub use pipeline::{Dispatcher, Pipeline, Registries};
pub use stats::{Stats, StatsSnapshot, StatusResponse};

/// Shared application state for the gateway.
pub struct GatewayState {
    pub triggers: TriggerConfig,
    pub bot_name: String,
    pub webhook_secret: Option<String>,
    pub dispatcher: Arc<dyn Dispatcher>,
    pub event_bus: Arc<EventBus>,
    pub stats: Arc<Stats>,
    pub started_at: DateTime<Utc>,
}

impl GatewayState {
    pub fn new(config: &AppConfig, dispatcher: Arc<dyn Dispatcher>, event_bus: Arc<EventBus>) -> Self {
        Self {
            triggers: config.triggers.clone(),
            bot_name: config.github.bot_name.clone(),
            webhook_secret: config.github.webhook_secret.clone(),
            dispatcher,
            event_bus,
            stats: Arc::new(Stats::default()),
            started_at: Utc::now(),
        }
    }
}

type SharedState = Arc<GatewayState>;

/// Build the Axum router with all gateway routes.
pub fn build_router(state: SharedState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/status", get(status_handler))
        .route("/webhook", post(webhook_handler))
        // GitHub caps deliveries at 25 MB
        .layer(DefaultBodyLimit::max(25 * 1024 * 1024))
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the gateway HTTP server.
///
/// Builds the provider, GitHub client, registries and event bus once and
/// shares them across every event.
pub async fn start(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);

    let event_bus = Arc::new(EventBus::default());
    let pipeline = Arc::new(build_pipeline(&config, event_bus.clone())?);

    let dispatcher: Arc<dyn Dispatcher> = Arc::new(pipeline);
    let state = Arc::new(GatewayState::new(&config, dispatcher, event_bus.clone()));
    Stats::track(state.stats.clone(), &event_bus);

    if state.webhook_secret.is_none() {
        warn!("No webhook secret configured; deliveries are not authenticated");
    }

    let app = build_router(state);

    info!(addr = %addr, bot = %config.github.bot_name, "Gateway starting");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Wire provider, GitHub client and agent loop from configuration.
pub fn build_pipeline(config: &AppConfig, event_bus: Arc<EventBus>) -> Result<Pipeline, repobot_core::Error> {
    let provider = repobot_providers::from_config(&config.model)?;
    let client = GithubClient::from_config(&config.github)?;
    let agent = Arc::new(AgentLoop::from_config(provider, event_bus, &config.agent));
    Ok(Pipeline::new(agent, client, config.github.bot_name.clone())?)
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

async fn status_handler(State(state): State<SharedState>) -> Json<StatusResponse> {
    let now = Utc::now();
    Json(StatusResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        started_at: state.started_at,
        uptime_secs: (now - state.started_at).num_seconds(),
        counters: state.stats.snapshot(),
    })
}

#[derive(Debug, Serialize)]
struct WebhookResponse {
    status: &'static str,
    event: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<String>,
}

async fn webhook_handler(
    State(state): State<SharedState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<WebhookResponse>), StatusCode> {
    let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());

    if !signature::verify(
        state.webhook_secret.as_deref(),
        &body,
        header("X-Hub-Signature-256"),
    ) {
        warn!(delivery = ?header("X-GitHub-Delivery"), "Rejected webhook with invalid signature");
        return Err(StatusCode::UNAUTHORIZED);
    }

    let Some(event_name) = header("X-GitHub-Event") else {
        warn!("Webhook without X-GitHub-Event header");
        return Err(StatusCode::BAD_REQUEST);
    };

    let event = WebhookEvent::parse(event_name, &body).map_err(|e| {
        warn!(event = event_name, error = %e, "Malformed webhook payload");
        StatusCode::BAD_REQUEST
    })?;

    let kind = event.kind();
    let repo = event.repo().map(|r| r.to_string()).unwrap_or_default();
    info!(event = %kind, repo = %repo, delivery = ?header("X-GitHub-Delivery"), "Webhook received");

    let decision = gate(event, &state.triggers, &state.bot_name);
    state.event_bus.publish(DomainEvent::EventReceived {
        kind: kind.clone(),
        repo,
        accepted: decision.is_run(),
        timestamp: Utc::now(),
    });

    let response = match decision {
        Decision::Run(trigger) => {
            state.dispatcher.dispatch(trigger);
            WebhookResponse {
                status: "accepted",
                event: kind,
                reason: None,
            }
        }
        Decision::Ignore(reason) => {
            debug!(event = %kind, reason = %reason, "Webhook ignored");
            WebhookResponse {
                status: "ignored",
                event: kind,
                reason: Some(reason),
            }
        }
    };
    Ok((StatusCode::ACCEPTED, Json(response)))
}
