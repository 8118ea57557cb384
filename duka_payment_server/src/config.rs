use std::{env, time::Duration};

use duka_common::{parse_boolean_flag, Secret};
use duka_payment_engine::rate_limit::{RateLimitConfig, DEFAULT_MAX_ATTEMPTS, DEFAULT_WINDOW};
use log::*;
use mpesa_tools::MpesaConfig;
use stripe_tools::StripeConfig;

const DEFAULT_DUKA_HOST: &str = "127.0.0.1";
const DEFAULT_DUKA_PORT: u16 = 8370;
const DEFAULT_DATABASE_URL: &str = "sqlite://data/duka_store.db";

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    /// If true, the X-Forwarded-For header will be used to determine the client's IP address, rather than the
    /// connection's remote address.
    pub use_x_forwarded_for: bool,
    /// If true, the `for=` field of the Forwarded header will be used to determine the client's IP address.
    pub use_forwarded: bool,
    /// Limits how often a single client may start or resend push payments.
    pub rate_limit: RateLimitConfig,
    pub callback_auth: CallbackAuthConfig,
    pub mpesa: MpesaConfig,
    pub stripe: StripeConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_DUKA_HOST.to_string(),
            port: DEFAULT_DUKA_PORT,
            database_url: DEFAULT_DATABASE_URL.to_string(),
            use_x_forwarded_for: false,
            use_forwarded: false,
            rate_limit: RateLimitConfig::default(),
            callback_auth: CallbackAuthConfig::default(),
            mpesa: MpesaConfig::default(),
            stripe: StripeConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("DUKA_HOST").ok().unwrap_or_else(|| DEFAULT_DUKA_HOST.into());
        let port = env::var("DUKA_PORT")
            .map(|s| {
                s.parse::<u16>().unwrap_or_else(|e| {
                    error!(
                        "🪛️ {s} is not a valid port for DUKA_PORT. {e} Using the default, {DEFAULT_DUKA_PORT}, \
                         instead."
                    );
                    DEFAULT_DUKA_PORT
                })
            })
            .ok()
            .unwrap_or(DEFAULT_DUKA_PORT);
        let database_url = env::var("DUKA_DATABASE_URL").ok().unwrap_or_else(|| {
            warn!("🪛️ DUKA_DATABASE_URL is not set. Using {DEFAULT_DATABASE_URL}.");
            DEFAULT_DATABASE_URL.to_string()
        });
        let use_x_forwarded_for = parse_boolean_flag(env::var("DUKA_USE_X_FORWARDED_FOR").ok(), false);
        let use_forwarded = parse_boolean_flag(env::var("DUKA_USE_FORWARDED").ok(), false);
        let rate_limit = configure_rate_limit();
        let callback_auth = CallbackAuthConfig::from_env_or_default();
        let mpesa = MpesaConfig::new_from_env_or_default();
        let stripe = StripeConfig::new_from_env_or_default();
        Self {
            host,
            port,
            database_url,
            use_x_forwarded_for,
            use_forwarded,
            rate_limit,
            callback_auth,
            mpesa,
            stripe,
        }
    }
}

fn configure_rate_limit() -> RateLimitConfig {
    let max_attempts = env::var("DUKA_RATE_LIMIT_MAX_ATTEMPTS")
        .map_err(|_| {
            info!("🪛️ DUKA_RATE_LIMIT_MAX_ATTEMPTS is not set. Using the default value of {DEFAULT_MAX_ATTEMPTS}.")
        })
        .and_then(|s| {
            s.parse::<u32>()
                .map_err(|e| warn!("🪛️ Invalid configuration value for DUKA_RATE_LIMIT_MAX_ATTEMPTS. {e}"))
        })
        .ok()
        .unwrap_or(DEFAULT_MAX_ATTEMPTS);
    let window = env::var("DUKA_RATE_LIMIT_WINDOW")
        .map_err(|_| {
            info!(
                "🪛️ DUKA_RATE_LIMIT_WINDOW is not set. Using the default value of {} s.",
                DEFAULT_WINDOW.as_secs()
            )
        })
        .and_then(|s| {
            s.parse::<u64>()
                .map(Duration::from_secs)
                .map_err(|e| warn!("🪛️ Invalid configuration value for DUKA_RATE_LIMIT_WINDOW. {e}"))
        })
        .ok()
        .unwrap_or(DEFAULT_WINDOW);
    RateLimitConfig { max_attempts, window }
}

//-------------------------------------------------  CallbackAuthConfig  -----------------------------------------------
/// Controls how result notifications from the push payment network are authenticated.
///
/// A callback token is `HMAC-SHA256(secret, checkout_request_id)`, url-safe base64 encoded without padding.
#[derive(Clone, Debug, Default)]
pub struct CallbackAuthConfig {
    /// `None` disables token verification.
    pub secret: Option<Secret<String>>,
    /// If true, callbacks without a token are rejected.
    pub require_token: bool,
}

impl CallbackAuthConfig {
    pub fn new(secret: &str, require_token: bool) -> Self {
        Self { secret: Some(Secret::new(secret.to_string())), require_token }
    }

    pub fn from_env_or_default() -> Self {
        let secret = env::var("DUKA_CALLBACK_SECRET").ok().filter(|s| !s.is_empty()).map(Secret::new);
        let require_token = parse_boolean_flag(env::var("DUKA_REQUIRE_CALLBACK_TOKEN").ok(), false);
        match (&secret, require_token) {
            (None, true) => {
                error!(
                    "🪛️ DUKA_REQUIRE_CALLBACK_TOKEN is set but DUKA_CALLBACK_SECRET is not. Every payment callback \
                     will be rejected until a secret is configured."
                );
            },
            (None, false) => {
                warn!("🪛️ DUKA_CALLBACK_SECRET is not set. Payment callbacks will not be authenticated.");
            },
            (Some(_), false) => {
                info!("🪛️ Callback tokens will be checked when present, but are not required.");
            },
            (Some(_), true) => {
                info!("🪛️ Callback tokens are required on every payment callback.");
            },
        }
        Self { secret, require_token }
    }
}

//-------------------------------------------------  ServerOptions  ----------------------------------------------------
/// A subset of the server configuration that is used to configure the server's behaviour. Generally we try to keep this
/// as small as possible, and exclude secrets to avoid passing sensitive information around the system.
#[derive(Clone, Copy, Debug, Default)]
pub struct ServerOptions {
    pub use_x_forwarded_for: bool,
    pub use_forwarded: bool,
}

impl ServerOptions {
    pub fn from_config(config: &ServerConfig) -> Self {
        Self { use_x_forwarded_for: config.use_x_forwarded_for, use_forwarded: config.use_forwarded }
    }
}
