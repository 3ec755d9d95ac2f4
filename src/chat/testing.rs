//! Test doubles shared by the chat and gateway tests.

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::observability::{Observer, ObserverEvent, ObserverMetric};
use crate::providers::{ChatCompletion, ChatMessage, Provider, TokenUsage};

pub const DEFAULT_REPLY: &str = "Happy to help with scheduling.";

/// Provider that replays a script of outcomes, then falls back to a fixed reply.
#[derive(Default)]
pub struct ScriptedProvider {
    script: Mutex<VecDeque<Result<String, String>>>,
    calls: Mutex<Vec<Vec<ChatMessage>>>,
    delay: Mutex<Option<Duration>>,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_reply(&self, content: &str) {
        self.script.lock().push_back(Ok(content.to_string()));
    }

    pub fn push_error(&self, message: &str) {
        self.script.lock().push_back(Err(message.to_string()));
    }

    /// Make every later call stall for `delay` before answering.
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = Some(delay);
    }

    pub fn calls(&self) -> Vec<Vec<ChatMessage>> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    async fn chat_with_history(
        &self,
        messages: &[ChatMessage],
        _model: &str,
        _temperature: f64,
    ) -> anyhow::Result<ChatCompletion> {
        self.calls.lock().push(messages.to_vec());
        let delay = *self.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let next = self
            .script
            .lock()
            .pop_front()
            .unwrap_or_else(|| Ok(DEFAULT_REPLY.to_string()));
        match next {
            Ok(content) => Ok(ChatCompletion {
                content,
                usage: Some(TokenUsage {
                    prompt_tokens: 100,
                    completion_tokens: 20,
                    total_tokens: 120,
                }),
            }),
            Err(message) => anyhow::bail!(message),
        }
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// Observer that keeps everything it is given.
#[derive(Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<ObserverEvent>>,
    metrics: Mutex<Vec<ObserverMetric>>,
}

impl RecordingObserver {
    pub fn events(&self) -> Vec<ObserverEvent> {
        self.events.lock().clone()
    }

    pub fn metrics(&self) -> Vec<ObserverMetric> {
        self.metrics.lock().clone()
    }
}

impl Observer for RecordingObserver {
    fn record_event(&self, event: &ObserverEvent) {
        self.events.lock().push(event.clone());
    }

    fn record_metric(&self, metric: &ObserverMetric) {
        self.metrics.lock().push(metric.clone());
    }

    fn name(&self) -> &str {
        "recording"
    }
}
