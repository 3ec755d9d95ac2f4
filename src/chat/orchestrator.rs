use std::sync::Arc;
use std::time::Duration;

use super::compaction::{CompactionOutcome, MemoryCompactor};
use crate::config::{Config, PricingConfig};
use crate::infra::{UsagePurpose, UsageReporter, UsageTracker};
use crate::observability::{Component, Observer, ObserverEvent, ObserverMetric, TurnOutcome};
use crate::providers::{complete_within, sanitize_api_error, Provider};
use crate::security::{matched_phrase, redact, sanitize, wrap_user_content};
use crate::sessions::SessionStore;

const DEFAULT_MODEL: &str = "gpt-3.5-turbo";

/// Headroom on top of the model calls for sanitizing, locking and accounting.
const TURN_OVERHEAD: Duration = Duration::from_secs(5);

/// Errors surfaced to the HTTP layer.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    /// The request is missing a required field; nothing was changed.
    #[error("invalid request: {0}")]
    InvalidRequest(&'static str),
    /// The completion call failed. Carries the scrubbed upstream message,
    /// which is logged but never sent to the visitor.
    #[error("completion failed: {0}")]
    Completion(String),
}

/// Whether the visitor got a model answer or the canned refusal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyKind {
    Answered,
    Refused,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatReply {
    pub reply: String,
    pub kind: ReplyKind,
}

/// Conversation policy resolved from config.
#[derive(Debug, Clone)]
pub struct ChatSettings {
    pub model: String,
    pub temperature: f64,
    pub system_prompt: String,
    pub compaction_threshold: u32,
    pub refusal_reply: String,
    pub failure_reply: String,
    pub pricing: PricingConfig,
    /// Deadline for each model call (summary or reply).
    pub call_timeout: Duration,
}

impl ChatSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            model: config
                .default_model
                .clone()
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            temperature: config.default_temperature,
            system_prompt: config.chat.effective_system_prompt().to_string(),
            compaction_threshold: config.chat.compaction_threshold,
            refusal_reply: config.chat.refusal_reply.clone(),
            failure_reply: config.chat.failure_reply.clone(),
            pricing: config.pricing,
            call_timeout: Duration::from_secs(config.provider.request_timeout_secs),
        }
    }

    /// Longest a single turn can legitimately run: a summary call followed
    /// by a reply call, plus overhead.
    pub fn turn_budget(&self) -> Duration {
        self.call_timeout * 2 + TURN_OVERHEAD
    }
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Runs one visitor turn end to end: sanitize, filter, compact, complete, account.
pub struct ChatOrchestrator {
    provider: Arc<dyn Provider>,
    store: Arc<dyn SessionStore>,
    observer: Arc<dyn Observer>,
    reporter: Arc<UsageReporter>,
    compactor: MemoryCompactor,
    settings: ChatSettings,
}

impl ChatOrchestrator {
    pub fn new(
        provider: Arc<dyn Provider>,
        store: Arc<dyn SessionStore>,
        observer: Arc<dyn Observer>,
        tracker: Arc<dyn UsageTracker>,
        settings: ChatSettings,
    ) -> Self {
        let reporter = Arc::new(UsageReporter::new(
            observer.clone(),
            tracker,
            settings.pricing,
            provider.name(),
            &settings.model,
        ));
        let compactor = MemoryCompactor::new(
            provider.clone(),
            observer.clone(),
            reporter.clone(),
            &settings.model,
            settings.temperature,
            settings.compaction_threshold,
            &settings.system_prompt,
        )
        .with_call_timeout(settings.call_timeout);
        Self {
            provider,
            store,
            observer,
            reporter,
            compactor,
            settings,
        }
    }

    pub fn settings(&self) -> &ChatSettings {
        &self.settings
    }

    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }

    pub fn observer(&self) -> &Arc<dyn Observer> {
        &self.observer
    }

    pub fn usage_tracker(&self) -> &Arc<dyn UsageTracker> {
        self.reporter.tracker()
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Handle one visitor message for `session_id`.
    ///
    /// Blocked messages get the refusal reply without touching the store or
    /// the model. The session snapshot is written back after every mutation,
    /// so a failed completion still leaves the user turn in history.
    pub async fn handle_chat_request(
        &self,
        session_id: &str,
        raw_message: &str,
    ) -> Result<ChatReply, ChatError> {
        if session_id.trim().is_empty() {
            return Err(ChatError::InvalidRequest("sessionId is required"));
        }
        if raw_message.trim().is_empty() {
            return Err(ChatError::InvalidRequest("message is required"));
        }

        let clean = sanitize(raw_message);

        if let Some(phrase) = matched_phrase(&clean) {
            self.observer.record_event(&ObserverEvent::SecurityAlert {
                session_id: session_id.to_string(),
                text: clean,
                phrase,
            });
            self.observer
                .record_metric(&ObserverMetric::ChatTurn(TurnOutcome::Blocked));
            return Ok(ChatReply {
                reply: self.settings.refusal_reply.clone(),
                kind: ReplyKind::Refused,
            });
        }

        let mut session = self
            .store
            .get_or_create(session_id, &self.settings.system_prompt);

        if self.compactor.compact_if_needed(&mut session).await == CompactionOutcome::Compacted {
            self.store.put(session.clone());
        }

        session.push_user(wrap_user_content(&clean));
        self.store.put(session.clone());

        match complete_within(
            self.provider.as_ref(),
            &session.messages,
            &self.settings.model,
            self.settings.temperature,
            self.settings.call_timeout,
        )
        .await
        {
            Ok(completion) => {
                session.push_assistant(completion.content.clone());
                self.store.put(session);
                self.reporter
                    .report(session_id, UsagePurpose::Reply, completion.usage.as_ref())
                    .await;
                self.observer
                    .record_metric(&ObserverMetric::ChatTurn(TurnOutcome::Replied));
                Ok(ChatReply {
                    reply: completion.content,
                    kind: ReplyKind::Answered,
                })
            }
            Err(e) => {
                let message = sanitize_api_error(&e.to_string());
                tracing::error!(
                    session = %redact(session_id),
                    provider = self.provider.name(),
                    error = %message,
                    "Completion failed"
                );
                self.observer.record_event(&ObserverEvent::Exception {
                    component: Component::Completion,
                    session_id: session_id.to_string(),
                    message: message.clone(),
                });
                self.observer
                    .record_metric(&ObserverMetric::ChatTurn(TurnOutcome::Failed));
                Err(ChatError::Completion(message))
            }
        }
    }
}
