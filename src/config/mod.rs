pub mod schema;

pub use schema::{
    ChatConfig, Config, GatewayConfig, ObservabilityConfig, PricingConfig, ProviderConfig,
    SessionsConfig,
};
