use std::time::Duration;

use duka_common::Secret;
use log::*;

pub const DEFAULT_API_BASE: &str = "https://api.stripe.com";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20);

#[derive(Debug, Clone)]
pub struct StripeConfig {
    /// An empty key means card payments are disabled.
    pub secret_key: Secret<String>,
    pub api_base: String,
    pub timeout: Duration,
}

impl Default for StripeConfig {
    fn default() -> Self {
        Self { secret_key: Secret::default(), api_base: DEFAULT_API_BASE.to_string(), timeout: DEFAULT_TIMEOUT }
    }
}

impl StripeConfig {
    pub fn new_from_env_or_default() -> Self {
        let secret_key = Secret::new(std::env::var("DUKA_STRIPE_SECRET_KEY").unwrap_or_else(|_| {
            warn!("🪛️ DUKA_STRIPE_SECRET_KEY not set. Card payments are disabled.");
            String::default()
        }));
        let api_base = std::env::var("DUKA_STRIPE_API_BASE").unwrap_or_else(|_| DEFAULT_API_BASE.to_string());
        let timeout = std::env::var("DUKA_STRIPE_TIMEOUT")
            .ok()
            .and_then(|s| {
                s.parse::<u64>()
                    .map_err(|e| error!("🪛️ Invalid DUKA_STRIPE_TIMEOUT: {e}. Using the default instead."))
                    .ok()
            })
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_TIMEOUT);
        Self { secret_key, api_base, timeout }
    }

    pub fn is_configured(&self) -> bool {
        !self.secret_key.is_empty()
    }
}
