pub mod cost;
pub mod reporter;
pub mod traits;
pub mod usage;

pub use cost::estimate_cost;
pub use reporter::UsageReporter;
pub use traits::{
    UsageBreakdown, UsageEvent, UsagePeriod, UsagePurpose, UsageSummary, UsageTracker,
};
pub use usage::InMemoryUsageTracker;

use std::sync::Arc;

pub fn create_usage_tracker() -> Arc<dyn UsageTracker> {
    Arc::new(InMemoryUsageTracker::new())
}
