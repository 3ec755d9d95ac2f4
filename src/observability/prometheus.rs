use super::traits::{Observer, ObserverEvent, ObserverMetric};
use anyhow::Result;
use prometheus::{
    Histogram, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry,
    TextEncoder,
};

/// Observer that keeps Prometheus collectors in a private registry.
///
/// The gateway exposes [`Observer::render_metrics`] at `GET /metrics`.
pub struct PrometheusObserver {
    registry: Registry,
    chat_turns: IntCounterVec,
    security_alerts: IntCounter,
    errors: IntCounterVec,
    compactions: IntCounter,
    tokens: HistogramVec,
    request_cost: Histogram,
}

const TOKEN_BUCKETS: &[f64] = &[50.0, 100.0, 250.0, 500.0, 1000.0, 2000.0, 4000.0, 8000.0];
const COST_BUCKETS: &[f64] = &[0.0001, 0.0005, 0.001, 0.002, 0.005, 0.01, 0.05];

impl PrometheusObserver {
    pub fn new() -> Result<Self> {
        let registry = Registry::new_custom(Some("practice_chat".into()), None)?;

        let chat_turns = IntCounterVec::new(
            Opts::new("chat_turns_total", "Chat turns handled, by outcome"),
            &["outcome"],
        )?;
        let security_alerts = IntCounter::new(
            "security_alerts_total",
            "Messages blocked by the injection filter",
        )?;
        let errors = IntCounterVec::new(
            Opts::new("collaborator_errors_total", "Collaborator failures, by component"),
            &["component"],
        )?;
        let compactions = IntCounter::new(
            "memory_compactions_total",
            "Session histories replaced by a summary",
        )?;
        let tokens = HistogramVec::new(
            HistogramOpts::new("completion_tokens", "Tokens per completion call")
                .buckets(TOKEN_BUCKETS.to_vec()),
            &["kind"],
        )?;
        let request_cost = Histogram::with_opts(
            HistogramOpts::new("request_cost_usd", "Estimated cost per completion call")
                .buckets(COST_BUCKETS.to_vec()),
        )?;

        registry.register(Box::new(chat_turns.clone()))?;
        registry.register(Box::new(security_alerts.clone()))?;
        registry.register(Box::new(errors.clone()))?;
        registry.register(Box::new(compactions.clone()))?;
        registry.register(Box::new(tokens.clone()))?;
        registry.register(Box::new(request_cost.clone()))?;

        Ok(Self {
            registry,
            chat_turns,
            security_alerts,
            errors,
            compactions,
            tokens,
            request_cost,
        })
    }
}

impl Observer for PrometheusObserver {
    fn record_event(&self, event: &ObserverEvent) {
        match event {
            ObserverEvent::SecurityAlert { .. } => self.security_alerts.inc(),
            ObserverEvent::Exception { component, .. } => {
                self.errors.with_label_values(&[component.as_str()]).inc();
            }
            ObserverEvent::MemoryCompacted { .. } => self.compactions.inc(),
        }
    }

    #[allow(clippy::cast_precision_loss)]
    fn record_metric(&self, metric: &ObserverMetric) {
        match metric {
            ObserverMetric::ChatTurn(outcome) => {
                self.chat_turns.with_label_values(&[outcome.as_str()]).inc();
            }
            ObserverMetric::TokenUsage {
                prompt_tokens,
                completion_tokens,
                total_tokens,
            } => {
                self.tokens
                    .with_label_values(&["prompt"])
                    .observe(*prompt_tokens as f64);
                self.tokens
                    .with_label_values(&["completion"])
                    .observe(*completion_tokens as f64);
                self.tokens
                    .with_label_values(&["total"])
                    .observe(*total_tokens as f64);
            }
            ObserverMetric::RequestCost(cost) => self.request_cost.observe(*cost),
        }
    }

    fn render_metrics(&self) -> Option<String> {
        match TextEncoder::new().encode_to_string(&self.registry.gather()) {
            Ok(text) => Some(text),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to encode Prometheus metrics");
                None
            }
        }
    }

    fn name(&self) -> &str {
        "prometheus"
    }
}
