//! HTTP gateway for the website chat widget.
//!
//! Serves `POST /api/chat` plus a few operator endpoints, and owns the
//! process-lifetime session store.

pub mod api;

use crate::chat::{create_orchestrator, ChatOrchestrator, ChatSettings};
use crate::config::{Config, GatewayConfig};
use crate::infra::create_usage_tracker;
use crate::observability::create_observer;
use crate::sessions::{create_session_store, SessionStore};
use anyhow::{Context, Result};
use axum::{
    http::{header, HeaderValue, Method, StatusCode},
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;

/// Shared state for all handlers.
#[derive(Clone)]
pub struct AppState {
    pub chat: Arc<ChatOrchestrator>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(chat: Arc<ChatOrchestrator>) -> Self {
        Self {
            chat,
            started_at: Instant::now(),
        }
    }
}

fn cors_layer(config: &GatewayConfig) -> Result<CorsLayer> {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    if config.allowed_origins.is_empty() {
        return Ok(layer.allow_origin(Any));
    }

    let origins = config
        .allowed_origins
        .iter()
        .map(|origin| {
            HeaderValue::from_str(origin.trim())
                .with_context(|| format!("Invalid origin in gateway.allowed_origins: {origin}"))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(layer.allow_origin(origins))
}

/// Outer request deadline. Never shorter than one full chat turn, so the
/// per-call deadlines inside the orchestrator always fire first.
fn request_backstop(config: &GatewayConfig, settings: &ChatSettings) -> Duration {
    Duration::from_secs(config.request_timeout_secs).max(settings.turn_budget())
}

/// Build the router with all routes and middleware.
pub fn build_router(state: AppState, config: &GatewayConfig) -> Result<Router> {
    let backstop = request_backstop(config, state.chat.settings());
    if backstop.as_secs() > config.request_timeout_secs {
        tracing::debug!(
            configured_secs = config.request_timeout_secs,
            effective_secs = backstop.as_secs(),
            "Raised gateway timeout to cover a compacting turn"
        );
    }
    let router = Router::new()
        .route("/api/chat", post(api::handle_chat))
        .route("/api/usage", get(api::handle_usage))
        .route("/health", get(api::handle_health))
        .route("/metrics", get(api::handle_metrics))
        .with_state(state)
        .layer(RequestBodyLimitLayer::new(config.max_body_bytes))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::INTERNAL_SERVER_ERROR,
            backstop,
        ))
        .layer(cors_layer(config)?);
    Ok(router)
}

/// Periodically drop sessions idle for longer than `max_idle`.
pub fn spawn_idle_sweeper(
    store: Arc<dyn SessionStore>,
    max_idle: chrono::Duration,
    every: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        // The first tick completes immediately.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let removed = store.sweep_idle(max_idle);
            if removed > 0 {
                tracing::info!(removed, remaining = store.len(), "Swept idle sessions");
            }
        }
    })
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    tracing::info!("Shutdown signal received");
}

/// Run the HTTP gateway until Ctrl+C or SIGTERM.
pub async fn run_gateway(host: &str, port: u16, config: Config) -> Result<()> {
    let store = create_session_store();
    let observer = create_observer(&config.observability);
    let tracker = create_usage_tracker();
    let chat = Arc::new(create_orchestrator(
        &config,
        store.clone(),
        observer.clone(),
        tracker,
    )?);

    let router = build_router(AppState::new(chat.clone()), &config.gateway)?;

    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind gateway to {addr}"))?;
    let actual = listener.local_addr()?;

    tracing::info!(
        address = %actual,
        provider = chat.provider_name(),
        model = %chat.settings().model,
        observer = observer.name(),
        "Chat gateway listening"
    );
    println!("💬 Chat gateway listening on http://{actual}");
    println!("  POST /api/chat  - {{\"message\": ..., \"sessionId\": ...}}");
    println!("  GET  /health    - liveness");
    println!("  GET  /api/usage - token and cost totals");
    if observer.render_metrics().is_some() {
        println!("  GET  /metrics   - Prometheus metrics");
    }

    let sweeper = if config.sessions.idle_ttl_secs > 0 {
        let max_idle =
            chrono::Duration::from_std(Duration::from_secs(config.sessions.idle_ttl_secs))
                .context("sessions.idle_ttl_secs is out of range")?;
        let every = Duration::from_secs(config.sessions.sweep_interval_secs.max(1));
        Some(spawn_idle_sweeper(store.clone(), max_idle, every))
    } else {
        None
    };

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Gateway server error")?;

    if let Some(handle) = sweeper {
        handle.abort();
    }
    let dropped = store.len();
    store.clear();
    tracing::info!(sessions_dropped = dropped, "Gateway stopped");
    Ok(())
}
