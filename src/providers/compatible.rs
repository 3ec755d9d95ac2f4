//! Generic OpenAI-compatible provider.
//! Speaks the `/v1/chat/completions` format and reports token usage.

use crate::providers::traits::{ChatCompletion, ChatMessage, Provider, TokenUsage};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A provider that speaks the OpenAI-compatible chat completions API.
pub struct OpenAiCompatibleProvider {
    pub(crate) name: String,
    pub(crate) base_url: String,
    pub(crate) api_key: Option<String>,
    client: Client,
}

/// Transport timeouts applied to every outbound request.
#[derive(Debug, Clone, Copy)]
pub struct ProviderTimeouts {
    pub request: Duration,
    pub connect: Duration,
}

impl Default for ProviderTimeouts {
    fn default() -> Self {
        Self {
            request: Duration::from_secs(60),
            connect: Duration::from_secs(10),
        }
    }
}

impl ProviderTimeouts {
    pub fn from_config(config: &crate::config::ProviderConfig) -> Self {
        Self {
            request: Duration::from_secs(config.request_timeout_secs),
            connect: Duration::from_secs(config.connect_timeout_secs),
        }
    }
}

impl OpenAiCompatibleProvider {
    pub fn new(name: &str, base_url: &str, api_key: Option<&str>) -> Self {
        Self::with_timeouts(name, base_url, api_key, ProviderTimeouts::default())
    }

    pub fn with_timeouts(
        name: &str,
        base_url: &str,
        api_key: Option<&str>,
        timeouts: ProviderTimeouts,
    ) -> Self {
        Self {
            name: name.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.map(ToString::to_string),
            client: Client::builder()
                .timeout(timeouts.request)
                .connect_timeout(timeouts.connect)
                .build()
                .unwrap_or_else(|_| Client::new()),
        }
    }

    /// Build the full URL for chat completions, detecting if base_url already includes the path.
    fn chat_completions_url(&self) -> String {
        let has_full_endpoint = reqwest::Url::parse(&self.base_url)
            .map(|url| {
                url.path()
                    .trim_end_matches('/')
                    .ends_with("/chat/completions")
            })
            .unwrap_or_else(|_| self.base_url.ends_with("/chat/completions"));

        if has_full_endpoint {
            self.base_url.clone()
        } else {
            format!("{}/chat/completions", self.base_url)
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f64,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct ApiChatResponse {
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<TokenUsage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

fn into_completion(response: ApiChatResponse) -> Option<ChatCompletion> {
    let usage = response.usage;
    response.choices.into_iter().next().map(|c| ChatCompletion {
        content: c.message.content.unwrap_or_default(),
        usage,
    })
}

#[async_trait]
impl Provider for OpenAiCompatibleProvider {
    async fn chat_with_history(
        &self,
        messages: &[ChatMessage],
        model: &str,
        temperature: f64,
    ) -> anyhow::Result<ChatCompletion> {
        let api_key = self.api_key.as_ref().ok_or_else(|| {
            anyhow::anyhow!(
                "{} API key not set. Set OPENAI_API_KEY or api_key in config.toml.",
                self.name
            )
        })?;

        let request = ChatRequest {
            model,
            messages,
            temperature,
            stream: false,
        };

        let url = self.chat_completions_url();
        let response = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(super::api_error(&self.name, response).await);
        }

        let chat_response: ApiChatResponse = response.json().await?;

        into_completion(chat_response)
            .ok_or_else(|| anyhow::anyhow!("No response from {}", self.name))
    }

    fn name(&self) -> &str {
        &self.name
    }
}
