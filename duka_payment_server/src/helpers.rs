use std::{net::IpAddr, str::FromStr};

use actix_web::HttpRequest;
use hmac::{Hmac, Mac};
use log::*;
use regex::Regex;
use sha2::Sha256;

use crate::{config::CallbackAuthConfig, errors::ServerError};

type HmacSha256 = Hmac<Sha256>;

/// Get the remote IP address from the request. It uses 3 sources to determine the IP address, in decreasing order
/// of preference:
/// 1. The `X-Forwarded-For` header, iif `use_x_forwarded_for` is set to true in the configuration.
/// 2. The `Forwarded` header, iif `use_forwarded` is set to true in the configuration.
/// 3. The peer address from the connection info.
pub fn get_remote_ip(req: &HttpRequest, use_x_forwarded_for: bool, use_forwarded: bool) -> Option<IpAddr> {
    let mut result = None;
    if use_x_forwarded_for {
        trace!("Checking X-Forwarded-For header");
        // Proxies append to the list, so the first entry is the original client
        result = req
            .headers()
            .get("X-Forwarded-For")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.split(',').next())
            .and_then(|s| IpAddr::from_str(s.trim()).ok());
        if let Some(ip) = result {
            debug!("Using X-Forwarded-For header for remote address: {ip}");
        }
    }
    if use_forwarded && result.is_none() {
        trace!("Checking Forwarded header");
        result = Regex::new(r#"for="?(?P<ip>[^;,"]+)"#).ok().and_then(|re| {
            req.headers()
                .get("Forwarded")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| re.captures(v))
                .and_then(|caps| caps.name("ip"))
                .and_then(|m| IpAddr::from_str(m.as_str()).ok())
        });
        if let Some(ip) = result {
            debug!("Using Forwarded header for remote address: {ip}");
        }
    }
    result.or_else(|| {
        let peer_addr = req.connection_info().peer_addr().map(|a| a.to_string());
        trace!("Using Peer address for remote address: {:?}", peer_addr);
        peer_addr.and_then(|s| IpAddr::from_str(&s).ok())
    })
}

/// The key the rate limiter uses for `action` by the client that sent `req`.
pub fn rate_limit_key(action: &str, req: &HttpRequest, use_x_forwarded_for: bool, use_forwarded: bool) -> String {
    match get_remote_ip(req, use_x_forwarded_for, use_forwarded) {
        Some(ip) => format!("{action}:{ip}"),
        None => {
            warn!("🚦️ Could not determine the remote address for a {action} request. Using a shared bucket.");
            format!("{action}:unknown")
        },
    }
}

fn new_mac(secret: &str, data: &[u8]) -> Result<HmacSha256, ServerError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| ServerError::ConfigurationError(format!("Invalid callback secret. {e}")))?;
    mac.update(data);
    Ok(mac)
}

/// Calculates the callback token for a checkout request id: `HMAC-SHA256(secret, checkout_request_id)`, encoded as
/// url-safe base64 without padding.
pub fn calculate_callback_token(secret: &str, checkout_request_id: &str) -> Result<String, ServerError> {
    let mac = new_mac(secret, checkout_request_id.as_bytes())?;
    Ok(base64::encode_config(mac.finalize().into_bytes(), base64::URL_SAFE_NO_PAD))
}

/// Checks the token supplied with a callback for `checkout_request_id` against the configured secret.
///
/// A token that does not match is always rejected. A missing token is only rejected if tokens are required. If tokens
/// are required but there is no secret to check them against, every callback is rejected.
pub fn verify_callback_token(
    auth: &CallbackAuthConfig,
    checkout_request_id: &str,
    token: Option<&str>,
) -> Result<(), ServerError> {
    let token = token.map(str::trim).filter(|t| !t.is_empty());
    match (&auth.secret, token) {
        (Some(secret), Some(token)) => {
            let supplied = base64::decode_config(token, base64::URL_SAFE_NO_PAD).map_err(|_| {
                warn!("🔐️ Malformed callback token for checkout request {checkout_request_id}");
                ServerError::CallbackRejected("Invalid callback token".into())
            })?;
            new_mac(secret.reveal(), checkout_request_id.as_bytes())?.verify_slice(&supplied).map_err(|_| {
                warn!("🔐️ Callback token mismatch for checkout request {checkout_request_id}");
                ServerError::CallbackRejected("Invalid callback token".into())
            })?;
            trace!("🔐️ Callback token for {checkout_request_id} is valid");
            Ok(())
        },
        (None, _) if auth.require_token => {
            error!("🔐️ Callback tokens are required, but no secret is configured. Rejecting {checkout_request_id}.");
            Err(ServerError::CallbackRejected("Callback tokens cannot be verified".into()))
        },
        (_, None) if auth.require_token => {
            warn!("🔐️ Callback for checkout request {checkout_request_id} has no token. Rejecting it.");
            Err(ServerError::CallbackRejected("A callback token is required".into()))
        },
        (None, Some(_)) => {
            warn!("🔐️ Callback for {checkout_request_id} carries a token, but no callback secret is configured");
            Ok(())
        },
        (_, None) => {
            debug!("🔐️ Callback for checkout request {checkout_request_id} has no token");
            Ok(())
        },
    }
}
