//! Provider subsystem for model inference backends.
//!
//! Every backend implements [`Provider`] and is constructed through
//! [`create_provider`] by its canonical string key. The chat orchestrator only
//! ever sees `Arc<dyn Provider>`, so tests substitute scripted providers.

pub mod compatible;
pub mod traits;

pub use compatible::{OpenAiCompatibleProvider, ProviderTimeouts};
pub use traits::{ChatCompletion, ChatMessage, Provider, Role, TokenUsage};

use std::time::Duration;

const MAX_API_ERROR_CHARS: usize = 200;

const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

fn is_secret_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | ':')
}

fn token_end(input: &str, from: usize) -> usize {
    let mut end = from;
    for (i, c) in input[from..].char_indices() {
        if is_secret_char(c) {
            end = from + i + c.len_utf8();
        } else {
            break;
        }
    }
    end
}

/// Scrub known secret-like token prefixes from provider error strings.
pub fn scrub_secret_patterns(input: &str) -> String {
    const PREFIXES: [&str; 4] = ["sk-", "sk_", "Bearer ", "org-"];

    let mut scrubbed = input.to_string();

    for prefix in PREFIXES {
        let mut search_from = 0;
        loop {
            let Some(rel) = scrubbed[search_from..].find(prefix) else {
                break;
            };

            let start = search_from + rel;
            let content_start = start + prefix.len();
            let end = token_end(&scrubbed, content_start);

            if end == content_start {
                search_from = content_start;
                continue;
            }

            scrubbed.replace_range(start..end, "[REDACTED]");
            search_from = start + "[REDACTED]".len();
        }
    }

    scrubbed
}

/// Sanitize API error text by scrubbing secrets and truncating length.
pub fn sanitize_api_error(input: &str) -> String {
    let scrubbed = scrub_secret_patterns(input);

    if scrubbed.chars().count() <= MAX_API_ERROR_CHARS {
        return scrubbed;
    }

    let mut end = MAX_API_ERROR_CHARS;
    while end > 0 && !scrubbed.is_char_boundary(end) {
        end -= 1;
    }

    format!("{}...", &scrubbed[..end])
}

/// Build a sanitized provider error from a failed HTTP response.
pub async fn api_error(provider: &str, response: reqwest::Response) -> anyhow::Error {
    let status = response.status();
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "<failed to read provider error body>".to_string());
    let sanitized = sanitize_api_error(&body);
    anyhow::anyhow!("{provider} API error ({status}): {sanitized}")
}

/// Run one completion under a hard deadline. An elapsed deadline comes back
/// as an ordinary provider error, so callers keep a single failure path.
pub async fn complete_within(
    provider: &dyn Provider,
    messages: &[ChatMessage],
    model: &str,
    temperature: f64,
    limit: Duration,
) -> anyhow::Result<ChatCompletion> {
    match tokio::time::timeout(limit, provider.chat_with_history(messages, model, temperature))
        .await
    {
        Ok(result) => result,
        Err(_) => anyhow::bail!(
            "{} did not respond within {}ms",
            provider.name(),
            limit.as_millis()
        ),
    }
}

/// Resolve API key for a provider from config and environment variables.
fn resolve_provider_credential(name: &str, credential_override: Option<&str>) -> Option<String> {
    if let Some(raw_override) = credential_override {
        let trimmed_override = raw_override.trim();
        if !trimmed_override.is_empty() {
            return Some(trimmed_override.to_owned());
        }
    }

    let provider_env_candidates: Vec<&str> = match name {
        "openai" => vec!["OPENAI_API_KEY"],
        _ => vec![],
    };

    for env_var in provider_env_candidates
        .into_iter()
        .chain(["PRACTICE_CHAT_API_KEY", "API_KEY"])
    {
        if let Ok(value) = std::env::var(env_var) {
            let value = value.trim();
            if !value.is_empty() {
                return Some(value.to_string());
            }
        }
    }

    None
}

/// Factory: create the provider named in config, with optional base URL override.
pub fn create_provider(
    name: &str,
    api_key: Option<&str>,
    api_url: Option<&str>,
    timeouts: ProviderTimeouts,
) -> anyhow::Result<Box<dyn Provider>> {
    let resolved_credential = resolve_provider_credential(name, api_key);
    let key = resolved_credential.as_deref();

    match name {
        "openai" => Ok(Box::new(OpenAiCompatibleProvider::with_timeouts(
            "openai",
            api_url.unwrap_or(OPENAI_BASE_URL),
            key,
            timeouts,
        ))),
        "openai-compatible" => {
            let Some(url) = api_url else {
                anyhow::bail!("Provider \"openai-compatible\" requires api_url to be set");
            };
            Ok(Box::new(OpenAiCompatibleProvider::with_timeouts(
                "openai-compatible",
                url,
                key,
                timeouts,
            )))
        }
        _ => anyhow::bail!(
            "Unknown provider: {name}. Supported: \"openai\", \"openai-compatible\"."
        ),
    }
}

/// Information about a supported provider for display purposes.
pub struct ProviderInfo {
    /// Canonical name used in config (e.g. `"openai"`)
    pub name: &'static str,
    /// Human-readable display name
    pub display_name: &'static str,
    /// Whether an `api_url` must be configured
    pub requires_url: bool,
}

/// Return the list of all known providers.
pub fn list_providers() -> Vec<ProviderInfo> {
    vec![
        ProviderInfo {
            name: "openai",
            display_name: "OpenAI",
            requires_url: false,
        },
        ProviderInfo {
            name: "openai-compatible",
            display_name: "Any OpenAI-compatible endpoint",
            requires_url: true,
        },
    ]
}
