use anyhow::{Context, Result};
use directories::UserDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;

const CONFIG_DIR_ENV: &str = "PRACTICE_CHAT_CONFIG_DIR";

const SUPPORTED_OBSERVABILITY_BACKENDS: &[&str] = &["none", "log", "prometheus"];

// ── Top-level config ──────────────────────────────────────────────

/// Top-level service configuration, loaded from `config.toml`.
///
/// Resolution order: `PRACTICE_CHAT_CONFIG_DIR` env → `~/.practice-chat/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Path to config.toml - computed at load time, not serialized
    #[serde(skip)]
    pub config_path: PathBuf,
    /// API key for the model provider. Overridden by `OPENAI_API_KEY`,
    /// `PRACTICE_CHAT_API_KEY` or `API_KEY` env vars.
    pub api_key: Option<String>,
    /// Base URL override for the provider API (e.g. a local OpenAI-compatible server).
    pub api_url: Option<String>,
    /// Provider ID (`"openai"` or `"openai-compatible"`). Default: `"openai"`.
    pub default_provider: Option<String>,
    /// Model used for replies and summaries. Default: `"gpt-3.5-turbo"`.
    pub default_model: Option<String>,
    /// Model temperature (0.0–2.0). Default: `0.7`.
    pub default_temperature: f64,

    /// HTTP server configuration (`[gateway]`).
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Outbound provider transport settings (`[provider]`).
    #[serde(default)]
    pub provider: ProviderConfig,

    /// Conversation policy (`[chat]`).
    #[serde(default)]
    pub chat: ChatConfig,

    /// Token pricing used for cost estimates (`[pricing]`).
    #[serde(default)]
    pub pricing: PricingConfig,

    /// Session lifecycle (`[sessions]`).
    #[serde(default)]
    pub sessions: SessionsConfig,

    /// Observability backend configuration (`[observability]`).
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

// ── Gateway ──────────────────────────────────────────────────────

/// Gateway server configuration (`[gateway]` section).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Gateway port (default: 3000)
    #[serde(default = "default_gateway_port")]
    pub port: u16,
    /// Gateway host (default: 127.0.0.1)
    #[serde(default = "default_gateway_host")]
    pub host: String,
    /// Maximum accepted request body size in bytes.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
    /// Outer request timeout. Raised at startup if shorter than two provider
    /// calls (summary plus reply), so the per-call deadline fires first.
    #[serde(default = "default_gateway_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Origins allowed to call the API from a browser. Empty allows any origin.
    #[serde(default)]
    pub allowed_origins: Vec<String>,
}

fn default_gateway_port() -> u16 {
    3000
}

fn default_gateway_host() -> String {
    "127.0.0.1".into()
}

fn default_max_body_bytes() -> usize {
    16 * 1024
}

fn default_gateway_timeout_secs() -> u64 {
    150
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_gateway_port(),
            host: default_gateway_host(),
            max_body_bytes: default_max_body_bytes(),
            request_timeout_secs: default_gateway_timeout_secs(),
            allowed_origins: Vec::new(),
        }
    }
}

// ── Provider transport ───────────────────────────────────────────

/// Outbound HTTP settings for the model provider (`[provider]` section).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default = "default_provider_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_provider_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

fn default_provider_timeout_secs() -> u64 {
    60
}

fn default_provider_connect_timeout_secs() -> u64 {
    10
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: default_provider_timeout_secs(),
            connect_timeout_secs: default_provider_connect_timeout_secs(),
        }
    }
}

// ── Chat policy ──────────────────────────────────────────────────

/// Conversation policy (`[chat]` section).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    /// User turns before history is compacted into a summary. Default: `10`.
    #[serde(default = "default_compaction_threshold")]
    pub compaction_threshold: u32,
    /// Replaces the built-in system prompt when set.
    #[serde(default)]
    pub system_prompt: Option<String>,
    /// Reply sent when a message trips the injection filter.
    #[serde(default = "default_refusal_reply")]
    pub refusal_reply: String,
    /// Error text returned when the completion call fails.
    #[serde(default = "default_failure_reply")]
    pub failure_reply: String,
}

fn default_compaction_threshold() -> u32 {
    10
}

fn default_refusal_reply() -> String {
    crate::chat::prompt::DEFAULT_REFUSAL_REPLY.to_string()
}

fn default_failure_reply() -> String {
    crate::chat::prompt::DEFAULT_FAILURE_REPLY.to_string()
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            compaction_threshold: default_compaction_threshold(),
            system_prompt: None,
            refusal_reply: default_refusal_reply(),
            failure_reply: default_failure_reply(),
        }
    }
}

impl ChatConfig {
    /// The system prompt in effect: the configured override or the built-in one.
    pub fn effective_system_prompt(&self) -> &str {
        self.system_prompt
            .as_deref()
            .filter(|p| !p.trim().is_empty())
            .unwrap_or(crate::chat::prompt::SYSTEM_PROMPT)
    }
}

// ── Pricing ──────────────────────────────────────────────────────

/// USD per 1K tokens (`[pricing]` section).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct PricingConfig {
    #[serde(default = "default_input_per_1k")]
    pub input_per_1k: f64,
    #[serde(default = "default_output_per_1k")]
    pub output_per_1k: f64,
}

fn default_input_per_1k() -> f64 {
    0.0005
}

fn default_output_per_1k() -> f64 {
    0.0015
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            input_per_1k: default_input_per_1k(),
            output_per_1k: default_output_per_1k(),
        }
    }
}

// ── Sessions ─────────────────────────────────────────────────────

/// Session lifecycle (`[sessions]` section).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionsConfig {
    /// Drop sessions idle longer than this. `0` keeps sessions for the life of the process.
    #[serde(default)]
    pub idle_ttl_secs: u64,
    /// How often the idle sweep runs when enabled.
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

fn default_sweep_interval_secs() -> u64 {
    300
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            idle_ttl_secs: 0,
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

// ── Observability ─────────────────────────────────────────────────

/// Observability backend configuration (`[observability]` section).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// "none" | "log" | "prometheus"
    #[serde(default = "default_observability_backend")]
    pub backend: String,
}

fn default_observability_backend() -> String {
    "log".into()
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            backend: default_observability_backend(),
        }
    }
}

// ── Config impl ──────────────────────────────────────────────────

impl Default for Config {
    fn default() -> Self {
        let home =
            UserDirs::new().map_or_else(|| PathBuf::from("."), |u| u.home_dir().to_path_buf());

        Self {
            config_path: home.join(".practice-chat").join("config.toml"),
            api_key: None,
            api_url: None,
            default_provider: Some("openai".to_string()),
            default_model: Some("gpt-3.5-turbo".to_string()),
            default_temperature: 0.7,
            gateway: GatewayConfig::default(),
            provider: ProviderConfig::default(),
            chat: ChatConfig::default(),
            pricing: PricingConfig::default(),
            sessions: SessionsConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

fn default_config_dir() -> Result<PathBuf> {
    let home = UserDirs::new()
        .map(|u| u.home_dir().to_path_buf())
        .context("Could not find home directory")?;
    Ok(home.join(".practice-chat"))
}

fn resolve_config_dir() -> Result<PathBuf> {
    if let Ok(custom) = std::env::var(CONFIG_DIR_ENV) {
        let custom = custom.trim();
        if !custom.is_empty() {
            return Ok(PathBuf::from(custom));
        }
    }
    default_config_dir()
}

impl Config {
    /// Load `config.toml` from the resolved config directory, writing a default
    /// file on first run, then apply env overrides and validate.
    pub async fn load_or_init() -> Result<Self> {
        let config_dir = resolve_config_dir()?;
        fs::create_dir_all(&config_dir).await.with_context(|| {
            format!("Failed to create config directory: {}", config_dir.display())
        })?;
        Self::load_or_init_at(&config_dir.join("config.toml")).await
    }

    pub async fn load_or_init_at(config_path: &Path) -> Result<Self> {
        let initialized = !config_path.exists();
        let mut config = if initialized {
            let mut config = Config::default();
            config.config_path = config_path.to_path_buf();
            config.save().await?;

            // Restrict permissions on newly created config file (may contain API keys)
            #[cfg(unix)]
            {
                use std::{fs::Permissions, os::unix::fs::PermissionsExt};
                let _ = fs::set_permissions(config_path, Permissions::from_mode(0o600)).await;
            }
            config
        } else {
            let contents = fs::read_to_string(config_path)
                .await
                .context("Failed to read config file")?;
            let mut config: Config =
                toml::from_str(&contents).context("Failed to parse config file")?;
            config.config_path = config_path.to_path_buf();
            config
        };

        config.apply_env_overrides();
        config.validate()?;
        tracing::info!(
            path = %config.config_path.display(),
            initialized,
            "Config loaded"
        );
        Ok(config)
    }

    /// Validate configuration values that would cause runtime failures.
    pub fn validate(&self) -> Result<()> {
        if self.gateway.host.trim().is_empty() {
            anyhow::bail!("gateway.host must not be empty");
        }
        if self.gateway.max_body_bytes == 0 {
            anyhow::bail!("gateway.max_body_bytes must be greater than 0");
        }
        if self.provider.request_timeout_secs == 0 {
            anyhow::bail!("provider.request_timeout_secs must be greater than 0");
        }
        if !(0.0..=2.0).contains(&self.default_temperature) {
            anyhow::bail!("default_temperature must be between 0.0 and 2.0");
        }
        if self.chat.compaction_threshold == 0 {
            anyhow::bail!("chat.compaction_threshold must be greater than 0");
        }
        if self.pricing.input_per_1k < 0.0 || self.pricing.output_per_1k < 0.0 {
            anyhow::bail!("pricing rates must not be negative");
        }
        if self.sessions.idle_ttl_secs > 0 && self.sessions.sweep_interval_secs == 0 {
            anyhow::bail!("sessions.sweep_interval_secs must be greater than 0 when idle_ttl_secs is set");
        }
        if !SUPPORTED_OBSERVABILITY_BACKENDS.contains(&self.observability.backend.as_str()) {
            anyhow::bail!(
                "observability.backend must be one of {:?}, got {:?}",
                SUPPORTED_OBSERVABILITY_BACKENDS,
                self.observability.backend
            );
        }
        Ok(())
    }

    /// Apply environment variable overrides to config
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|name| std::env::var(name).ok());
    }

    /// Apply overrides from an arbitrary variable lookup. Empty values are ignored.
    pub fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let first = |names: &[&str]| {
            names
                .iter()
                .find_map(|name| lookup(name).filter(|v| !v.trim().is_empty()))
        };

        if let Some(key) = first(&["OPENAI_API_KEY", "PRACTICE_CHAT_API_KEY", "API_KEY"]) {
            self.api_key = Some(key.trim().to_string());
        }

        if let Some(url) = first(&["PRACTICE_CHAT_API_URL"]) {
            self.api_url = Some(url.trim().to_string());
        }

        if let Some(provider) = first(&["PRACTICE_CHAT_PROVIDER"]) {
            self.default_provider = Some(provider.trim().to_string());
        }

        if let Some(model) = first(&["PRACTICE_CHAT_MODEL", "MODEL"]) {
            self.default_model = Some(model.trim().to_string());
        }

        if let Some(port_str) = first(&["PRACTICE_CHAT_GATEWAY_PORT", "PORT"]) {
            match port_str.trim().parse::<u16>() {
                Ok(port) => self.gateway.port = port,
                Err(_) => tracing::warn!(value = %port_str, "Ignoring invalid gateway port override"),
            }
        }

        if let Some(host) = first(&["PRACTICE_CHAT_GATEWAY_HOST", "HOST"]) {
            self.gateway.host = host.trim().to_string();
        }

        if let Some(temp_str) = first(&["PRACTICE_CHAT_TEMPERATURE"]) {
            match temp_str.trim().parse::<f64>() {
                Ok(temp) if (0.0..=2.0).contains(&temp) => self.default_temperature = temp,
                _ => tracing::warn!(value = %temp_str, "Ignoring invalid temperature override"),
            }
        }

        if let Some(backend) = first(&["PRACTICE_CHAT_OBSERVABILITY"]) {
            self.observability.backend = backend.trim().to_ascii_lowercase();
        }

        if let Some(ttl_str) = first(&["PRACTICE_CHAT_SESSION_TTL_SECS"]) {
            match ttl_str.trim().parse::<u64>() {
                Ok(ttl) => self.sessions.idle_ttl_secs = ttl,
                Err(_) => tracing::warn!(value = %ttl_str, "Ignoring invalid session TTL override"),
            }
        }
    }

    /// Atomically write the config as TOML (temp file + rename).
    pub async fn save(&self) -> Result<()> {
        let toml_str = toml::to_string_pretty(self).context("Failed to serialize config")?;

        let parent_dir = self
            .config_path
            .parent()
            .context("Config path must have a parent directory")?;

        fs::create_dir_all(parent_dir).await.with_context(|| {
            format!(
                "Failed to create config directory: {}",
                parent_dir.display()
            )
        })?;

        let file_name = self
            .config_path
            .file_name()
            .and_then(|v| v.to_str())
            .unwrap_or("config.toml");
        let temp_path = parent_dir.join(format!(".{file_name}.tmp-{}", uuid::Uuid::new_v4()));

        let mut temp_file = OpenOptions::new()
            .create_new(true)
            .write(true)
            .open(&temp_path)
            .await
            .with_context(|| {
                format!(
                    "Failed to create temporary config file: {}",
                    temp_path.display()
                )
            })?;
        temp_file
            .write_all(toml_str.as_bytes())
            .await
            .context("Failed to write temporary config contents")?;
        temp_file
            .sync_all()
            .await
            .context("Failed to fsync temporary config file")?;
        drop(temp_file);

        if let Err(e) = fs::rename(&temp_path, &self.config_path).await {
            let _ = fs::remove_file(&temp_path).await;
            anyhow::bail!("Failed to atomically replace config file: {e}");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    // ── Defaults ─────────────────────────────────────────────

    #[test]
    fn config_default_has_sane_values() {
        let c = Config::default();
        assert_eq!(c.default_provider.as_deref(), Some("openai"));
        assert_eq!(c.default_model.as_deref(), Some("gpt-3.5-turbo"));
        assert!((c.default_temperature - 0.7).abs() < f64::EPSILON);
        assert!(c.api_key.is_none());
        assert_eq!(c.gateway.port, 3000);
        assert_eq!(c.chat.compaction_threshold, 10);
        assert_eq!(c.sessions.idle_ttl_secs, 0);
        assert_eq!(c.observability.backend, "log");
        assert!(c.config_path.to_string_lossy().contains("config.toml"));
        assert!(c.validate().is_ok());
    }

    #[test]
    fn pricing_defaults_match_gpt35_rates() {
        let p = PricingConfig::default();
        assert!((p.input_per_1k - 0.0005).abs() < f64::EPSILON);
        assert!((p.output_per_1k - 0.0015).abs() < f64::EPSILON);
    }

    #[test]
    fn effective_system_prompt_prefers_non_blank_override() {
        let mut chat = ChatConfig::default();
        assert_eq!(chat.effective_system_prompt(), crate::chat::prompt::SYSTEM_PROMPT);

        chat.system_prompt = Some("   ".into());
        assert_eq!(chat.effective_system_prompt(), crate::chat::prompt::SYSTEM_PROMPT);

        chat.system_prompt = Some("You are a test assistant.".into());
        assert_eq!(chat.effective_system_prompt(), "You are a test assistant.");
    }

    // ── Parsing ──────────────────────────────────────────────

    #[test]
    fn minimal_toml_fills_section_defaults() {
        let toml_str = r#"
default_temperature = 0.3

[chat]
compaction_threshold = 4
"#;
        let c: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(c.chat.compaction_threshold, 4);
        assert_eq!(c.chat.refusal_reply, crate::chat::prompt::DEFAULT_REFUSAL_REPLY);
        assert_eq!(c.gateway.port, 3000);
        assert_eq!(c.pricing, PricingConfig::default());
        assert!(c.default_provider.is_none());
    }

    #[test]
    fn config_toml_roundtrip_keeps_fields() {
        let mut c = Config::default();
        c.gateway.allowed_origins = vec!["https://example.org".into()];
        c.sessions.idle_ttl_secs = 3600;
        let toml_str = toml::to_string_pretty(&c).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.gateway.allowed_origins, vec!["https://example.org"]);
        assert_eq!(parsed.sessions.idle_ttl_secs, 3600);
    }

    // ── Validation ───────────────────────────────────────────

    #[test]
    fn validate_rejects_zero_threshold() {
        let mut c = Config::default();
        c.chat.compaction_threshold = 0;
        assert!(c.validate().is_err());
    }

    #[test]
    fn validate_rejects_unknown_backend() {
        let mut c = Config::default();
        c.observability.backend = "statsd".into();
        let err = c.validate().unwrap_err().to_string();
        assert!(err.contains("observability.backend"));
    }

    #[test]
    fn validate_rejects_negative_rates_and_bad_temperature() {
        let mut c = Config::default();
        c.pricing.output_per_1k = -1.0;
        assert!(c.validate().is_err());

        let mut c = Config::default();
        c.default_temperature = 2.5;
        assert!(c.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_provider_timeout() {
        let mut c = Config::default();
        c.provider.request_timeout_secs = 0;
        let err = c.validate().unwrap_err().to_string();
        assert!(err.contains("provider.request_timeout_secs"));
    }

    #[test]
    fn validate_rejects_empty_host() {
        let mut c = Config::default();
        c.gateway.host = "  ".into();
        assert!(c.validate().is_err());
    }

    // ── Env overrides ────────────────────────────────────────

    #[test]
    fn overrides_apply_api_key_port_and_model() {
        let mut c = Config::default();
        c.apply_overrides_from(lookup_from(&[
            ("OPENAI_API_KEY", " sk-live "),
            ("PORT", "8080"),
            ("MODEL", "gpt-4o-mini"),
        ]));
        assert_eq!(c.api_key.as_deref(), Some("sk-live"));
        assert_eq!(c.gateway.port, 8080);
        assert_eq!(c.default_model.as_deref(), Some("gpt-4o-mini"));
    }

    #[test]
    fn prefixed_override_wins_over_generic() {
        let mut c = Config::default();
        c.apply_overrides_from(lookup_from(&[
            ("PRACTICE_CHAT_GATEWAY_PORT", "4000"),
            ("PORT", "8080"),
        ]));
        assert_eq!(c.gateway.port, 4000);
    }

    #[test]
    fn invalid_and_empty_overrides_are_ignored() {
        let mut c = Config::default();
        c.apply_overrides_from(lookup_from(&[
            ("PORT", "not-a-port"),
            ("PRACTICE_CHAT_TEMPERATURE", "9.0"),
            ("OPENAI_API_KEY", "   "),
        ]));
        assert_eq!(c.gateway.port, 3000);
        assert!((c.default_temperature - 0.7).abs() < f64::EPSILON);
        assert!(c.api_key.is_none());
    }

    #[test]
    fn observability_override_is_lowercased() {
        let mut c = Config::default();
        c.apply_overrides_from(lookup_from(&[("PRACTICE_CHAT_OBSERVABILITY", "Prometheus")]));
        assert_eq!(c.observability.backend, "prometheus");
    }

    // ── Load / save ──────────────────────────────────────────

    #[tokio::test]
    async fn save_then_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut c = Config::default();
        c.config_path = path.clone();
        c.chat.compaction_threshold = 6;
        c.save().await.unwrap();

        let contents = tokio::fs::read_to_string(&path).await.unwrap();
        let loaded: Config = toml::from_str(&contents).unwrap();
        assert_eq!(loaded.chat.compaction_threshold, 6);
    }

    #[tokio::test]
    async fn load_or_init_writes_default_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let c = Config::load_or_init_at(&path).await.unwrap();
        assert!(path.exists());
        assert_eq!(c.config_path, path);
        assert_eq!(c.chat.compaction_threshold, 10);
    }

    #[tokio::test]
    async fn load_or_init_rejects_invalid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        tokio::fs::write(&path, "default_temperature = 0.5\n[chat]\ncompaction_threshold = 0\n")
            .await
            .unwrap();

        assert!(Config::load_or_init_at(&path).await.is_err());
    }
}
