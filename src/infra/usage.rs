use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};

use super::traits::{
    UsageBreakdown, UsageEvent, UsagePeriod, UsagePurpose, UsageSummary, UsageTracker,
};

const RETENTION_DAYS: i64 = 30;
const MAX_EVENTS: usize = 100_000;

/// In-memory usage tracker backed by a `parking_lot::Mutex<VecDeque<UsageEvent>>`.
///
/// Events older than the retention window (the longest named period) are
/// evicted on record, and the log never holds more than `max_events`.
pub struct InMemoryUsageTracker {
    events: Mutex<VecDeque<UsageEvent>>,
    retention: chrono::Duration,
    max_events: usize,
}

impl InMemoryUsageTracker {
    pub fn new() -> Self {
        Self::with_limits(chrono::Duration::days(RETENTION_DAYS), MAX_EVENTS)
    }

    pub fn with_limits(retention: chrono::Duration, max_events: usize) -> Self {
        Self {
            events: Mutex::new(VecDeque::new()),
            retention,
            max_events: max_events.max(1),
        }
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }

    /// Return the cutoff timestamp for the given period, or `None` for `All`.
    fn cutoff(period: UsagePeriod) -> Option<chrono::DateTime<Utc>> {
        let now = Utc::now();
        match period {
            UsagePeriod::Hour => Some(now - chrono::Duration::hours(1)),
            UsagePeriod::Day => Some(now - chrono::Duration::days(1)),
            UsagePeriod::Week => Some(now - chrono::Duration::weeks(1)),
            UsagePeriod::Month => Some(now - chrono::Duration::days(30)),
            UsagePeriod::All => None,
        }
    }
}

impl Default for InMemoryUsageTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl UsageTracker for InMemoryUsageTracker {
    async fn record(&self, event: UsageEvent) -> anyhow::Result<()> {
        let cutoff = Utc::now() - self.retention;
        let mut events = self.events.lock();
        // Events arrive in time order, so stale ones sit at the front.
        while events.front().is_some_and(|e| e.timestamp < cutoff) {
            events.pop_front();
        }
        if event.timestamp < cutoff {
            return Ok(());
        }
        if events.len() >= self.max_events {
            events.pop_front();
        }
        events.push_back(event);
        Ok(())
    }

    async fn summary(&self, period: UsagePeriod) -> anyhow::Result<UsageSummary> {
        let cutoff = Self::cutoff(period);
        let events = self.events.lock();
        let mut total_requests: u64 = 0;
        let mut total_input: u64 = 0;
        let mut total_output: u64 = 0;
        let mut total_cost: f64 = 0.0;

        for e in events.iter() {
            if let Some(c) = cutoff {
                if e.timestamp < c {
                    continue;
                }
            }
            total_requests += 1;
            total_input += e.input_tokens;
            total_output += e.output_tokens;
            total_cost += e.cost_usd;
        }

        Ok(UsageSummary {
            total_requests,
            total_input_tokens: total_input,
            total_output_tokens: total_output,
            total_cost_usd: total_cost,
            period,
        })
    }

    async fn breakdown(&self, period: UsagePeriod) -> anyhow::Result<Vec<UsageBreakdown>> {
        let cutoff = Self::cutoff(period);
        let events = self.events.lock();

        // Aggregate by (model, purpose)
        let mut map: HashMap<(String, UsagePurpose), (u64, u64, u64, f64)> = HashMap::new();

        for e in events.iter() {
            if let Some(c) = cutoff {
                if e.timestamp < c {
                    continue;
                }
            }
            let entry = map
                .entry((e.model.clone(), e.purpose))
                .or_insert((0, 0, 0, 0.0));
            entry.0 += 1;
            entry.1 += e.input_tokens;
            entry.2 += e.output_tokens;
            entry.3 += e.cost_usd;
        }

        let mut results: Vec<UsageBreakdown> = map
            .into_iter()
            .map(
                |((model, purpose), (requests, input_tokens, output_tokens, cost_usd))| {
                    UsageBreakdown {
                        model,
                        purpose,
                        requests,
                        input_tokens,
                        output_tokens,
                        cost_usd,
                    }
                },
            )
            .collect();
        results.sort_by(|a, b| b.requests.cmp(&a.requests).then_with(|| a.model.cmp(&b.model)));

        Ok(results)
    }

    fn name(&self) -> &str {
        "in_memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_event(model: &str, purpose: UsagePurpose, input: u64, output: u64) -> UsageEvent {
        UsageEvent {
            provider: "openai".to_string(),
            model: model.to_string(),
            purpose,
            input_tokens: input,
            output_tokens: output,
            cost_usd: 0.01,
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn record_and_summary() {
        let tracker = InMemoryUsageTracker::new();
        tracker
            .record(sample_event("gpt-3.5-turbo", UsagePurpose::Reply, 100, 50))
            .await
            .unwrap();
        tracker
            .record(sample_event("gpt-3.5-turbo", UsagePurpose::Reply, 200, 100))
            .await
            .unwrap();

        let summary = tracker.summary(UsagePeriod::All).await.unwrap();
        assert_eq!(summary.total_requests, 2);
        assert_eq!(summary.total_input_tokens, 300);
        assert_eq!(summary.total_output_tokens, 150);
        assert!((summary.total_cost_usd - 0.02).abs() < 1e-9);
    }

    #[tokio::test]
    async fn breakdown_groups_by_model_and_purpose() {
        let tracker = InMemoryUsageTracker::new();
        tracker
            .record(sample_event("gpt-3.5-turbo", UsagePurpose::Reply, 100, 50))
            .await
            .unwrap();
        tracker
            .record(sample_event("gpt-3.5-turbo", UsagePurpose::Reply, 100, 50))
            .await
            .unwrap();
        tracker
            .record(sample_event("gpt-3.5-turbo", UsagePurpose::Summary, 900, 60))
            .await
            .unwrap();

        let bd = tracker.breakdown(UsagePeriod::All).await.unwrap();
        assert_eq!(bd.len(), 2);
        assert_eq!(bd[0].purpose, UsagePurpose::Reply);
        assert_eq!(bd[0].requests, 2);
        assert_eq!(bd[1].purpose, UsagePurpose::Summary);
    }

    #[tokio::test]
    async fn old_events_fall_outside_period() {
        let tracker = InMemoryUsageTracker::new();
        let mut old = sample_event("gpt-3.5-turbo", UsagePurpose::Reply, 10, 10);
        old.timestamp = Utc::now() - chrono::Duration::days(3);
        tracker.record(old).await.unwrap();
        tracker
            .record(sample_event("gpt-3.5-turbo", UsagePurpose::Reply, 10, 10))
            .await
            .unwrap();

        assert_eq!(tracker.summary(UsagePeriod::Day).await.unwrap().total_requests, 1);
        assert_eq!(tracker.summary(UsagePeriod::All).await.unwrap().total_requests, 2);
    }

    #[tokio::test]
    async fn empty_tracker_returns_zero_summary() {
        let tracker = InMemoryUsageTracker::new();
        let summary = tracker.summary(UsagePeriod::All).await.unwrap();
        assert_eq!(summary.total_requests, 0);
    }

    #[tokio::test]
    async fn events_past_retention_are_dropped() {
        let tracker = InMemoryUsageTracker::new();
        let mut ancient = sample_event("gpt-3.5-turbo", UsagePurpose::Reply, 10, 10);
        ancient.timestamp = Utc::now() - chrono::Duration::days(45);
        tracker.record(ancient).await.unwrap();
        tracker
            .record(sample_event("gpt-3.5-turbo", UsagePurpose::Reply, 10, 10))
            .await
            .unwrap();

        assert_eq!(tracker.len(), 1);
        assert_eq!(tracker.summary(UsagePeriod::All).await.unwrap().total_requests, 1);
    }

    #[tokio::test]
    async fn stale_front_is_evicted_on_record() {
        let tracker = InMemoryUsageTracker::with_limits(chrono::Duration::hours(1), 100);
        {
            // Simulate an entry that aged past the window while stored.
            let mut aged = sample_event("gpt-3.5-turbo", UsagePurpose::Summary, 10, 10);
            aged.timestamp = Utc::now() - chrono::Duration::hours(2);
            tracker.events.lock().push_back(aged);
        }
        tracker
            .record(sample_event("gpt-3.5-turbo", UsagePurpose::Reply, 10, 10))
            .await
            .unwrap();

        assert_eq!(tracker.len(), 1);
        let bd = tracker.breakdown(UsagePeriod::All).await.unwrap();
        assert_eq!(bd[0].purpose, UsagePurpose::Reply);
    }

    #[tokio::test]
    async fn log_is_capped_oldest_first() {
        let tracker = InMemoryUsageTracker::with_limits(chrono::Duration::days(30), 3);
        for input in 1..=5 {
            tracker
                .record(sample_event("gpt-3.5-turbo", UsagePurpose::Reply, input, 0))
                .await
                .unwrap();
        }

        assert_eq!(tracker.len(), 3);
        let summary = tracker.summary(UsagePeriod::All).await.unwrap();
        assert_eq!(summary.total_input_tokens, 3 + 4 + 5);
    }
}
