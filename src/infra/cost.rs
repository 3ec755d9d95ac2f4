//! Cost estimation from token usage.

use crate::config::PricingConfig;
use crate::providers::TokenUsage;

/// Approximate USD cost of one call, rounded to 6 decimal places.
///
/// `(prompt / 1000) * input_rate + (completion / 1000) * output_rate`.
/// Returns `0.0` when the backend reported no usage.
#[allow(clippy::cast_precision_loss)]
pub fn estimate_cost(usage: Option<&TokenUsage>, pricing: &PricingConfig) -> f64 {
    let Some(usage) = usage else {
        return 0.0;
    };
    let cost = (usage.prompt_tokens as f64 / 1000.0) * pricing.input_per_1k
        + (usage.completion_tokens as f64 / 1000.0) * pricing.output_per_1k;
    round_micros(cost)
}

fn round_micros(value: f64) -> f64 {
    (value * 1_000_000.0).round() / 1_000_000.0
}
