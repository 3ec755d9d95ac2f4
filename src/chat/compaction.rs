//! History compaction: fold a long conversation into a model-written summary.

use std::sync::Arc;
use std::time::Duration;

use super::prompt::SUMMARY_REQUEST;
use crate::infra::{UsagePurpose, UsageReporter};
use crate::observability::{Component, Observer, ObserverEvent};
use crate::providers::{complete_within, sanitize_api_error, ChatMessage, Provider};
use crate::sessions::Session;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompactionOutcome {
    /// Below the threshold; nothing happened.
    Skipped,
    /// History is now `[system prompt, summary]`.
    Compacted,
    /// Summarization failed; the session is untouched.
    Failed,
}

pub struct MemoryCompactor {
    provider: Arc<dyn Provider>,
    observer: Arc<dyn Observer>,
    reporter: Arc<UsageReporter>,
    model: String,
    temperature: f64,
    threshold: u32,
    system_prompt: String,
    call_timeout: Duration,
}

impl MemoryCompactor {
    pub fn new(
        provider: Arc<dyn Provider>,
        observer: Arc<dyn Observer>,
        reporter: Arc<UsageReporter>,
        model: &str,
        temperature: f64,
        threshold: u32,
        system_prompt: &str,
    ) -> Self {
        Self {
            provider,
            observer,
            reporter,
            model: model.to_string(),
            temperature,
            threshold,
            system_prompt: system_prompt.to_string(),
            call_timeout: Duration::from_secs(60),
        }
    }

    /// Deadline for the summary call. A summary that misses it counts as failed.
    pub fn with_call_timeout(mut self, call_timeout: Duration) -> Self {
        self.call_timeout = call_timeout;
        self
    }

    /// Summarize and reset `session` once it has reached the turn threshold.
    ///
    /// The summary request is sent over a copy of the history; the session is
    /// only modified after a non-blank summary comes back.
    pub async fn compact_if_needed(&self, session: &mut Session) -> CompactionOutcome {
        if !session.needs_compaction(self.threshold) {
            return CompactionOutcome::Skipped;
        }

        let mut request = session.messages.clone();
        request.push(ChatMessage::user(SUMMARY_REQUEST));

        let completion = match complete_within(
            self.provider.as_ref(),
            &request,
            &self.model,
            self.temperature,
            self.call_timeout,
        )
        .await
        {
            Ok(completion) => completion,
            Err(e) => {
                self.report_failure(&session.id, &sanitize_api_error(&e.to_string()));
                return CompactionOutcome::Failed;
            }
        };

        let summary = completion.content.trim();
        if summary.is_empty() {
            self.report_failure(&session.id, "model returned an empty summary");
            return CompactionOutcome::Failed;
        }

        let messages_before = session.messages.len();
        session.replace_with_summary(&self.system_prompt, summary);
        self.reporter
            .report(&session.id, UsagePurpose::Summary, completion.usage.as_ref())
            .await;

        tracing::info!(
            session = %crate::security::redact(&session.id),
            messages_before,
            "Conversation compacted"
        );
        self.observer.record_event(&ObserverEvent::MemoryCompacted {
            session_id: session.id.clone(),
            messages_before,
        });

        CompactionOutcome::Compacted
    }

    fn report_failure(&self, session_id: &str, message: &str) {
        tracing::warn!(
            session = %crate::security::redact(session_id),
            error = message,
            "Summarization failed; keeping full history"
        );
        self.observer.record_event(&ObserverEvent::Exception {
            component: Component::Summarization,
            session_id: session_id.to_string(),
            message: message.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::testing::{RecordingObserver, ScriptedProvider};
    use crate::config::PricingConfig;
    use crate::infra::{InMemoryUsageTracker, UsagePeriod, UsageTracker};
    use crate::providers::Role;
    use crate::sessions::SUMMARY_PREFIX;

    struct Harness {
        provider: Arc<ScriptedProvider>,
        observer: Arc<RecordingObserver>,
        tracker: Arc<InMemoryUsageTracker>,
        compactor: MemoryCompactor,
    }

    fn harness(threshold: u32) -> Harness {
        let provider = Arc::new(ScriptedProvider::new());
        let observer = Arc::new(RecordingObserver::default());
        let tracker = Arc::new(InMemoryUsageTracker::new());
        let reporter = Arc::new(UsageReporter::new(
            observer.clone(),
            tracker.clone(),
            PricingConfig::default(),
            "scripted",
            "test-model",
        ));
        let compactor = MemoryCompactor::new(
            provider.clone(),
            observer.clone(),
            reporter,
            "test-model",
            0.7,
            threshold,
            "be helpful",
        );
        Harness {
            provider,
            observer,
            tracker,
            compactor,
        }
    }

    fn session_with_turns(turns: u32) -> Session {
        let mut session = Session::new("sess_1", "be helpful");
        for i in 0..turns {
            session.push_user(format!("question {i}"));
            session.push_assistant(format!("answer {i}"));
        }
        session
    }

    #[tokio::test]
    async fn below_threshold_is_skipped_without_model_call() {
        let h = harness(10);
        let mut session = session_with_turns(9);
        let before = session.clone();

        assert_eq!(
            h.compactor.compact_if_needed(&mut session).await,
            CompactionOutcome::Skipped
        );
        assert_eq!(session, before);
        assert_eq!(h.provider.call_count(), 0);
    }

    #[tokio::test]
    async fn at_threshold_history_becomes_prompt_plus_summary() {
        let h = harness(10);
        h.provider.push_reply("  They asked about fees and Tuesday slots.  ");
        let mut session = session_with_turns(10);

        assert_eq!(
            h.compactor.compact_if_needed(&mut session).await,
            CompactionOutcome::Compacted
        );
        assert_eq!(session.messages.len(), 2);
        assert!(session.messages.iter().all(|m| m.role == Role::System));
        assert_eq!(session.messages[0].content, "be helpful");
        assert_eq!(
            session.messages[1].content,
            format!("{SUMMARY_PREFIX}They asked about fees and Tuesday slots.")
        );
        assert_eq!(session.interaction_count, 0);
    }

    #[tokio::test]
    async fn summary_request_is_full_history_plus_instruction() {
        let h = harness(2);
        h.provider.push_reply("short summary");
        let mut session = session_with_turns(2);
        let history = session.messages.clone();

        h.compactor.compact_if_needed(&mut session).await;

        let calls = h.provider.calls();
        assert_eq!(calls.len(), 1);
        let sent = &calls[0];
        assert_eq!(&sent[..history.len()], history.as_slice());
        assert_eq!(sent.last(), Some(&ChatMessage::user(SUMMARY_REQUEST)));
    }

    #[tokio::test]
    async fn successful_compaction_records_summary_usage_and_event() {
        let h = harness(1);
        h.provider.push_reply("summary");
        let mut session = session_with_turns(1);

        h.compactor.compact_if_needed(&mut session).await;

        let breakdown = h.tracker.breakdown(UsagePeriod::All).await.unwrap();
        assert_eq!(breakdown.len(), 1);
        assert_eq!(breakdown[0].purpose, UsagePurpose::Summary);
        assert!(h.observer.events().contains(&ObserverEvent::MemoryCompacted {
            session_id: "sess_1".into(),
            messages_before: 3,
        }));
    }

    #[tokio::test]
    async fn model_error_leaves_session_unchanged() {
        let h = harness(10);
        h.provider.push_error("upstream 503");
        let mut session = session_with_turns(10);
        let before = session.clone();

        assert_eq!(
            h.compactor.compact_if_needed(&mut session).await,
            CompactionOutcome::Failed
        );
        assert_eq!(session, before);
        assert_eq!(session.interaction_count, 10);
        assert!(matches!(
            h.observer.events().as_slice(),
            [ObserverEvent::Exception { component: Component::Summarization, .. }]
        ));
        assert_eq!(
            h.tracker.summary(UsagePeriod::All).await.unwrap().total_requests,
            0
        );
    }

    #[tokio::test]
    async fn blank_summary_counts_as_failure() {
        let h = harness(3);
        h.provider.push_reply("   \n");
        let mut session = session_with_turns(3);
        let before = session.clone();

        assert_eq!(
            h.compactor.compact_if_needed(&mut session).await,
            CompactionOutcome::Failed
        );
        assert_eq!(session, before);
    }

    #[tokio::test]
    async fn stalled_summary_is_a_failure_and_keeps_history() {
        let mut h = harness(2);
        h.compactor = h.compactor.with_call_timeout(Duration::from_millis(50));
        h.provider.set_delay(Duration::from_secs(5));
        let mut session = session_with_turns(2);
        let before = session.clone();

        assert_eq!(
            h.compactor.compact_if_needed(&mut session).await,
            CompactionOutcome::Failed
        );
        assert_eq!(session, before);
        assert!(matches!(
            h.observer.events().as_slice(),
            [ObserverEvent::Exception { component: Component::Summarization, message, .. }]
                if message.contains("did not respond")
        ));
    }
}
