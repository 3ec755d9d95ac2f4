use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Why a completion call was made.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum UsagePurpose {
    /// A reply to a visitor message.
    Reply,
    /// A compaction summary.
    Summary,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageEvent {
    pub provider: String,
    pub model: String,
    pub purpose: UsagePurpose,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cost_usd: f64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum UsagePeriod {
    Hour,
    #[default]
    Day,
    Week,
    Month,
    All,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageSummary {
    pub total_requests: u64,
    pub total_input_tokens: u64,
    pub total_output_tokens: u64,
    pub total_cost_usd: f64,
    pub period: UsagePeriod,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageBreakdown {
    pub model: String,
    pub purpose: UsagePurpose,
    pub requests: u64,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cost_usd: f64,
}

#[async_trait]
pub trait UsageTracker: Send + Sync {
    async fn record(&self, event: UsageEvent) -> anyhow::Result<()>;
    async fn summary(&self, period: UsagePeriod) -> anyhow::Result<UsageSummary>;
    async fn breakdown(&self, period: UsagePeriod) -> anyhow::Result<Vec<UsageBreakdown>>;
    fn name(&self) -> &str;
}
