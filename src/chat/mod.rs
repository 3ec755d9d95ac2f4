//! Session-scoped conversation handling for the website assistant.
//!
//! [`ChatOrchestrator`] is the entry point: it strips markup, refuses
//! injection attempts, compacts long histories with [`MemoryCompactor`], calls
//! the model and reports usage.

pub mod compaction;
pub mod orchestrator;
pub mod prompt;
#[cfg(test)]
pub(crate) mod testing;

pub use compaction::{CompactionOutcome, MemoryCompactor};
pub use orchestrator::{ChatError, ChatOrchestrator, ChatReply, ChatSettings, ReplyKind};

use std::sync::Arc;

use crate::config::Config;
use crate::infra::UsageTracker;
use crate::observability::Observer;
use crate::providers::{create_provider, ProviderTimeouts};
use crate::sessions::SessionStore;

/// Build an orchestrator with the provider described by `config`.
pub fn create_orchestrator(
    config: &Config,
    store: Arc<dyn SessionStore>,
    observer: Arc<dyn Observer>,
    tracker: Arc<dyn UsageTracker>,
) -> anyhow::Result<ChatOrchestrator> {
    let provider_name = config.default_provider.as_deref().unwrap_or("openai");
    let timeouts = ProviderTimeouts::from_config(&config.provider);
    let provider = create_provider(
        provider_name,
        config.api_key.as_deref(),
        config.api_url.as_deref(),
        timeouts,
    )?;
    Ok(ChatOrchestrator::new(
        Arc::from(provider),
        store,
        observer,
        tracker,
        ChatSettings::from_config(config),
    ))
}
