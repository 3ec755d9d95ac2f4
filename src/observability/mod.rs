//! Telemetry for the chat service.
//!
//! The orchestrator reports security alerts, collaborator failures, token
//! usage and cost through the [`Observer`] trait. The backend is selected by
//! `[observability] backend` in config: `"none"`, `"log"` or `"prometheus"`.

pub mod log;
pub mod prometheus;
pub mod traits;

pub use self::log::LogObserver;
pub use self::prometheus::PrometheusObserver;
pub use traits::{Component, Observer, ObserverEvent, ObserverMetric, TurnOutcome};

use crate::config::ObservabilityConfig;
use std::sync::Arc;

/// Observer that discards everything.
#[derive(Debug, Clone, Default)]
pub struct NoopObserver;

impl Observer for NoopObserver {
    fn record_event(&self, _event: &ObserverEvent) {}

    fn record_metric(&self, _metric: &ObserverMetric) {}

    fn name(&self) -> &str {
        "none"
    }
}

/// Factory: build the observer named by `config.backend`.
///
/// Falls back to [`NoopObserver`] if the Prometheus registry cannot be built,
/// since telemetry must never stop the service from starting.
pub fn create_observer(config: &ObservabilityConfig) -> Arc<dyn Observer> {
    match config.backend.as_str() {
        "log" => Arc::new(LogObserver),
        "prometheus" => match PrometheusObserver::new() {
            Ok(observer) => Arc::new(observer),
            Err(e) => {
                tracing::warn!(error = %e, "Prometheus observer unavailable; telemetry disabled");
                Arc::new(NoopObserver)
            }
        },
        _ => Arc::new(NoopObserver),
    }
}
