use std::{fmt::Display, str::FromStr, time::Duration};

use duka_common::{Kes, Secret};
use log::*;

pub const SANDBOX_BASE_URL: &str = "https://sandbox.safaricom.co.ke";
pub const PRODUCTION_BASE_URL: &str = "https://api.safaricom.co.ke";
pub const DEFAULT_MAX_AMOUNT: i64 = 250_000;
pub const DEFAULT_PUSH_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_TRANSACTION_TYPE: &str = "CustomerPayBillOnline";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MpesaEnvironment {
    #[default]
    Sandbox,
    Production,
}

impl MpesaEnvironment {
    pub fn base_url(&self) -> &'static str {
        match self {
            Self::Sandbox => SANDBOX_BASE_URL,
            Self::Production => PRODUCTION_BASE_URL,
        }
    }
}

impl FromStr for MpesaEnvironment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sandbox" => Ok(Self::Sandbox),
            "production" | "live" => Ok(Self::Production),
            _ => Err(format!("Unknown M-Pesa environment: {s}")),
        }
    }
}

impl Display for MpesaEnvironment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sandbox => write!(f, "sandbox"),
            Self::Production => write!(f, "production"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MpesaConfig {
    pub environment: MpesaEnvironment,
    /// Overrides the environment's base URL. Only used for tests and local gateway simulators.
    pub base_url: Option<String>,
    pub consumer_key: Secret<String>,
    pub consumer_secret: Secret<String>,
    pub short_code: String,
    pub passkey: Secret<String>,
    pub callback_url: String,
    pub transaction_type: String,
    pub max_amount: Kes,
    pub push_timeout: Duration,
    pub query_timeout: Duration,
}

impl Default for MpesaConfig {
    fn default() -> Self {
        Self {
            environment: MpesaEnvironment::default(),
            base_url: None,
            consumer_key: Secret::default(),
            consumer_secret: Secret::default(),
            short_code: String::default(),
            passkey: Secret::default(),
            callback_url: String::default(),
            transaction_type: DEFAULT_TRANSACTION_TYPE.to_string(),
            max_amount: Kes::from(DEFAULT_MAX_AMOUNT),
            push_timeout: DEFAULT_PUSH_TIMEOUT,
            query_timeout: DEFAULT_QUERY_TIMEOUT,
        }
    }
}

impl MpesaConfig {
    pub fn new_from_env_or_default() -> Self {
        let environment = std::env::var("DUKA_MPESA_ENVIRONMENT")
            .ok()
            .and_then(|s| {
                s.parse::<MpesaEnvironment>()
                    .map_err(|e| warn!("🪛️ {e}. Falling back to the sandbox environment."))
                    .ok()
            })
            .unwrap_or_default();
        let base_url = std::env::var("DUKA_MPESA_BASE_URL").ok();
        let consumer_key = Secret::new(std::env::var("DUKA_MPESA_CONSUMER_KEY").unwrap_or_else(|_| {
            warn!("🪛️ DUKA_MPESA_CONSUMER_KEY not set. Mobile money payments will not work.");
            String::default()
        }));
        let consumer_secret = Secret::new(std::env::var("DUKA_MPESA_CONSUMER_SECRET").unwrap_or_else(|_| {
            warn!("🪛️ DUKA_MPESA_CONSUMER_SECRET not set. Mobile money payments will not work.");
            String::default()
        }));
        let short_code = std::env::var("DUKA_MPESA_SHORT_CODE").unwrap_or_else(|_| {
            warn!("🪛️ DUKA_MPESA_SHORT_CODE not set, using the sandbox short code 174379.");
            "174379".to_string()
        });
        let passkey = Secret::new(std::env::var("DUKA_MPESA_PASSKEY").unwrap_or_else(|_| {
            warn!("🪛️ DUKA_MPESA_PASSKEY not set. Mobile money payments will not work.");
            String::default()
        }));
        let callback_url = std::env::var("DUKA_MPESA_CALLBACK_URL").unwrap_or_else(|_| {
            warn!("🪛️ DUKA_MPESA_CALLBACK_URL not set. The network will not be able to deliver payment results.");
            String::default()
        });
        let transaction_type =
            std::env::var("DUKA_MPESA_TRANSACTION_TYPE").unwrap_or_else(|_| DEFAULT_TRANSACTION_TYPE.to_string());
        let max_amount = std::env::var("DUKA_MPESA_MAX_AMOUNT")
            .ok()
            .and_then(|s| {
                s.parse::<Kes>()
                    .map_err(|e| error!("🪛️ Invalid DUKA_MPESA_MAX_AMOUNT: {e}. Using the default instead."))
                    .ok()
            })
            .unwrap_or(Kes::from(DEFAULT_MAX_AMOUNT));
        let push_timeout = duration_from_env("DUKA_MPESA_PUSH_TIMEOUT", DEFAULT_PUSH_TIMEOUT);
        let query_timeout = duration_from_env("DUKA_MPESA_QUERY_TIMEOUT", DEFAULT_QUERY_TIMEOUT);
        Self {
            environment,
            base_url,
            consumer_key,
            consumer_secret,
            short_code,
            passkey,
            callback_url,
            transaction_type,
            max_amount,
            push_timeout,
            query_timeout,
        }
    }

    /// True if every credential needed to send a push request is present.
    pub fn is_configured(&self) -> bool {
        !self.consumer_key.is_empty() &&
            !self.consumer_secret.is_empty() &&
            !self.passkey.is_empty() &&
            !self.short_code.is_empty() &&
            !self.callback_url.is_empty()
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_deref().unwrap_or_else(|| self.environment.base_url())
    }
}

fn duration_from_env(var: &str, default: Duration) -> Duration {
    std::env::var(var)
        .ok()
        .and_then(|s| {
            s.parse::<u64>()
                .map_err(|e| error!("🪛️ Invalid value for {var}: {e}. Using {}s instead.", default.as_secs()))
                .ok()
        })
        .map(Duration::from_secs)
        .unwrap_or(default)
}
