//! Telemetry capability consumed by the chat orchestrator.

use std::fmt;

/// Discrete, fire-and-forget telemetry events.
#[derive(Debug, Clone, PartialEq)]
pub enum ObserverEvent {
    /// A visitor message matched the injection blocklist.
    SecurityAlert {
        session_id: String,
        text: String,
        phrase: &'static str,
    },
    /// A collaborator failed; the message is already scrubbed of secrets.
    Exception {
        component: Component,
        session_id: String,
        message: String,
    },
    /// A session's history was replaced by a summary.
    MemoryCompacted {
        session_id: String,
        messages_before: usize,
    },
}

/// Which collaborator an [`ObserverEvent::Exception`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Component {
    Completion,
    Summarization,
    UsageTracker,
}

impl Component {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Completion => "completion",
            Self::Summarization => "summarization",
            Self::UsageTracker => "usage_tracker",
        }
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a chat turn ended, for the turn counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnOutcome {
    Replied,
    Blocked,
    Failed,
}

impl TurnOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Replied => "replied",
            Self::Blocked => "blocked",
            Self::Failed => "failed",
        }
    }
}

/// Numeric metric samples.
#[derive(Debug, Clone, PartialEq)]
pub enum ObserverMetric {
    /// Counter increment, one per handled turn.
    ChatTurn(TurnOutcome),
    /// Token distribution for one completion call.
    TokenUsage {
        prompt_tokens: u64,
        completion_tokens: u64,
        total_tokens: u64,
    },
    /// Estimated cost in USD for one completion call.
    RequestCost(f64),
}

/// Observability sink.
///
/// Calls never fail from the caller's point of view: implementations swallow
/// their own errors so telemetry can never change a chat response.
pub trait Observer: Send + Sync {
    fn record_event(&self, event: &ObserverEvent);

    fn record_metric(&self, metric: &ObserverMetric);

    /// Text exposition of collected metrics, for backends that keep them.
    fn render_metrics(&self) -> Option<String> {
        None
    }

    fn name(&self) -> &str;
}
