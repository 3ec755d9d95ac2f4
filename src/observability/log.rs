use super::traits::{Observer, ObserverEvent, ObserverMetric};
use crate::security::redact;

/// Observer that writes every event and metric through `tracing`.
#[derive(Debug, Clone, Default)]
pub struct LogObserver;

impl Observer for LogObserver {
    fn record_event(&self, event: &ObserverEvent) {
        match event {
            ObserverEvent::SecurityAlert {
                session_id,
                text,
                phrase,
            } => {
                tracing::warn!(
                    session = %redact(session_id),
                    phrase,
                    text = %text,
                    "Blocked prompt injection attempt"
                );
            }
            ObserverEvent::Exception {
                component,
                session_id,
                message,
            } => {
                tracing::error!(
                    component = %component,
                    session = %redact(session_id),
                    error = %message,
                    "Collaborator failure"
                );
            }
            ObserverEvent::MemoryCompacted {
                session_id,
                messages_before,
            } => {
                tracing::info!(
                    session = %redact(session_id),
                    messages_before,
                    "Memory compacted"
                );
            }
        }
    }

    fn record_metric(&self, metric: &ObserverMetric) {
        match metric {
            ObserverMetric::ChatTurn(outcome) => {
                tracing::debug!(outcome = outcome.as_str(), "chat turn");
            }
            ObserverMetric::TokenUsage {
                prompt_tokens,
                completion_tokens,
                total_tokens,
            } => {
                tracing::info!(
                    prompt_tokens,
                    completion_tokens,
                    total_tokens,
                    "token usage"
                );
            }
            ObserverMetric::RequestCost(cost) => {
                tracing::info!(cost_usd = cost, "request cost");
            }
        }
    }

    fn name(&self) -> &str {
        "log"
    }
}
