//! HTTP handlers for the chat widget and operator endpoints.

use super::AppState;
use crate::chat::ChatError;
use crate::infra::UsagePeriod;
use axum::{
    extract::{rejection::JsonRejection, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
};
use serde::Deserialize;

// ── Request bodies ──────────────────────────────────────────────

/// Body of `POST /api/chat`. Both fields are optional at the JSON level so a
/// missing field reaches the orchestrator and is reported as a 400.
#[derive(Debug, Deserialize)]
pub struct ChatBody {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default, rename = "sessionId")]
    pub session_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UsageQuery {
    pub period: Option<UsagePeriod>,
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(serde_json::json!({ "error": message }))).into_response()
}

// ── Handlers ────────────────────────────────────────────────────

/// POST /api/chat - one visitor turn
pub async fn handle_chat(
    State(state): State<AppState>,
    payload: Result<Json<ChatBody>, JsonRejection>,
) -> Response {
    let body = match payload {
        Ok(Json(body)) => body,
        Err(rejection) => {
            let status = if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
                StatusCode::PAYLOAD_TOO_LARGE
            } else {
                StatusCode::BAD_REQUEST
            };
            tracing::debug!(error = %rejection.body_text(), "Rejected chat body");
            return error_response(status, "Request body must be JSON with message and sessionId");
        }
    };

    let session_id = body.session_id.unwrap_or_default();
    let message = body.message.unwrap_or_default();

    match state.chat.handle_chat_request(&session_id, &message).await {
        Ok(reply) => Json(serde_json::json!({ "reply": reply.reply })).into_response(),
        Err(ChatError::InvalidRequest(reason)) => {
            error_response(StatusCode::BAD_REQUEST, reason)
        }
        Err(ChatError::Completion(_)) => error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            &state.chat.settings().failure_reply,
        ),
    }
}

/// GET /health - liveness plus session count
pub async fn handle_health(State(state): State<AppState>) -> impl IntoResponse {
    let store = state.chat.store();
    Json(serde_json::json!({
        "status": "ok",
        "sessions": store.len(),
        "session_store": store.name(),
        "uptime_seconds": state.started_at.elapsed().as_secs(),
    }))
}

/// GET /api/usage - token and cost totals for a period
pub async fn handle_usage(
    State(state): State<AppState>,
    Query(params): Query<UsageQuery>,
) -> Response {
    let period = params.period.unwrap_or_default();
    let tracker = state.chat.usage_tracker();

    let summary = match tracker.summary(period).await {
        Ok(summary) => summary,
        Err(e) => {
            tracing::warn!(error = %e, "Usage summary failed");
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, "Usage data unavailable");
        }
    };
    let breakdown = match tracker.breakdown(period).await {
        Ok(breakdown) => breakdown,
        Err(e) => {
            tracing::warn!(error = %e, "Usage breakdown failed");
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, "Usage data unavailable");
        }
    };

    Json(serde_json::json!({
        "summary": summary,
        "breakdown": breakdown,
    }))
    .into_response()
}

/// GET /metrics - Prometheus text exposition, when that backend is active
pub async fn handle_metrics(State(state): State<AppState>) -> Response {
    match state.chat.observer().render_metrics() {
        Some(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, prometheus::TEXT_FORMAT)],
            body,
        )
            .into_response(),
        None => error_response(StatusCode::NOT_FOUND, "Metrics are not enabled"),
    }
}
