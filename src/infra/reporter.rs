//! Per-call cost accounting: estimate, emit metrics, and record to the tracker.

use std::sync::Arc;

use chrono::Utc;

use super::cost::estimate_cost;
use super::traits::{UsageEvent, UsagePurpose, UsageTracker};
use crate::config::PricingConfig;
use crate::observability::{Component, Observer, ObserverEvent, ObserverMetric};
use crate::providers::TokenUsage;

/// Turns the token usage of one completion call into a cost sample.
///
/// Reporting never fails: a tracker error is logged and surfaced to the
/// observer as an exception, and the estimated cost is still returned.
pub struct UsageReporter {
    observer: Arc<dyn Observer>,
    tracker: Arc<dyn UsageTracker>,
    pricing: PricingConfig,
    provider: String,
    model: String,
}

impl UsageReporter {
    pub fn new(
        observer: Arc<dyn Observer>,
        tracker: Arc<dyn UsageTracker>,
        pricing: PricingConfig,
        provider: &str,
        model: &str,
    ) -> Self {
        Self {
            observer,
            tracker,
            pricing,
            provider: provider.to_string(),
            model: model.to_string(),
        }
    }

    pub fn tracker(&self) -> &Arc<dyn UsageTracker> {
        &self.tracker
    }

    /// Report one call and return its estimated cost in USD.
    pub async fn report(
        &self,
        session_id: &str,
        purpose: UsagePurpose,
        usage: Option<&TokenUsage>,
    ) -> f64 {
        let cost = estimate_cost(usage, &self.pricing);

        if let Some(u) = usage {
            self.observer.record_metric(&ObserverMetric::TokenUsage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
                total_tokens: u.total_tokens,
            });
        }
        self.observer
            .record_metric(&ObserverMetric::RequestCost(cost));

        let event = UsageEvent {
            provider: self.provider.clone(),
            model: self.model.clone(),
            purpose,
            input_tokens: usage.map_or(0, |u| u.prompt_tokens),
            output_tokens: usage.map_or(0, |u| u.completion_tokens),
            cost_usd: cost,
            timestamp: Utc::now(),
        };
        if let Err(e) = self.tracker.record(event).await {
            tracing::warn!(error = %e, tracker = self.tracker.name(), "Failed to record usage");
            self.observer.record_event(&ObserverEvent::Exception {
                component: Component::UsageTracker,
                session_id: session_id.to_string(),
                message: e.to_string(),
            });
        }

        cost
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::{InMemoryUsageTracker, UsageBreakdown, UsagePeriod, UsageSummary};
    use crate::observability::NoopObserver;
    use async_trait::async_trait;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct CapturingObserver {
        metrics: Mutex<Vec<ObserverMetric>>,
        events: Mutex<Vec<ObserverEvent>>,
    }

    impl Observer for CapturingObserver {
        fn record_event(&self, event: &ObserverEvent) {
            self.events.lock().push(event.clone());
        }
        fn record_metric(&self, metric: &ObserverMetric) {
            self.metrics.lock().push(metric.clone());
        }
        fn name(&self) -> &str {
            "capturing"
        }
    }

    struct BrokenTracker;

    #[async_trait]
    impl UsageTracker for BrokenTracker {
        async fn record(&self, _event: UsageEvent) -> anyhow::Result<()> {
            anyhow::bail!("disk full")
        }
        async fn summary(&self, _period: UsagePeriod) -> anyhow::Result<UsageSummary> {
            anyhow::bail!("disk full")
        }
        async fn breakdown(&self, _period: UsagePeriod) -> anyhow::Result<Vec<UsageBreakdown>> {
            anyhow::bail!("disk full")
        }
        fn name(&self) -> &str {
            "broken"
        }
    }

    fn usage() -> TokenUsage {
        TokenUsage {
            prompt_tokens: 1000,
            completion_tokens: 1000,
            total_tokens: 2000,
        }
    }

    #[tokio::test]
    async fn report_emits_tokens_and_cost_then_records() {
        let observer = Arc::new(CapturingObserver::default());
        let tracker = Arc::new(InMemoryUsageTracker::new());
        let reporter = UsageReporter::new(
            observer.clone(),
            tracker.clone(),
            PricingConfig::default(),
            "openai",
            "gpt-3.5-turbo",
        );

        let cost = reporter
            .report("sess_1", UsagePurpose::Reply, Some(&usage()))
            .await;
        assert!((cost - 0.002).abs() < 1e-12);

        let metrics = observer.metrics.lock();
        assert_eq!(metrics.len(), 2);
        assert!(matches!(
            metrics[0],
            ObserverMetric::TokenUsage { total_tokens: 2000, .. }
        ));
        assert!(matches!(metrics[1], ObserverMetric::RequestCost(c) if (c - 0.002).abs() < 1e-12));

        let summary = tracker.summary(UsagePeriod::All).await.unwrap();
        assert_eq!(summary.total_requests, 1);
        assert_eq!(summary.total_input_tokens, 1000);
    }

    #[tokio::test]
    async fn missing_usage_reports_zero_cost_without_token_metric() {
        let observer = Arc::new(CapturingObserver::default());
        let reporter = UsageReporter::new(
            observer.clone(),
            Arc::new(InMemoryUsageTracker::new()),
            PricingConfig::default(),
            "openai",
            "gpt-3.5-turbo",
        );

        let cost = reporter.report("sess_1", UsagePurpose::Summary, None).await;
        assert_eq!(cost, 0.0);
        assert_eq!(
            *observer.metrics.lock(),
            vec![ObserverMetric::RequestCost(0.0)]
        );
    }

    #[tokio::test]
    async fn tracker_failure_is_swallowed_and_reported() {
        let observer = Arc::new(CapturingObserver::default());
        let reporter = UsageReporter::new(
            observer.clone(),
            Arc::new(BrokenTracker),
            PricingConfig::default(),
            "openai",
            "gpt-3.5-turbo",
        );

        let cost = reporter
            .report("sess_1", UsagePurpose::Reply, Some(&usage()))
            .await;
        assert!(cost > 0.0);

        let events = observer.events.lock();
        assert!(matches!(
            &events[0],
            ObserverEvent::Exception { component: Component::UsageTracker, message, .. }
                if message.contains("disk full")
        ));
    }

    #[tokio::test]
    async fn noop_observer_is_accepted() {
        let reporter = UsageReporter::new(
            Arc::new(NoopObserver),
            Arc::new(InMemoryUsageTracker::new()),
            PricingConfig::default(),
            "openai",
            "gpt-3.5-turbo",
        );
        assert_eq!(reporter.tracker().name(), "in_memory");
    }
}
