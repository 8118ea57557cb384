use std::{sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use duka_common::{normalize_phone, phone::mask_phone, Kes, Secret};
use log::*;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use tokio::sync::RwLock;

use crate::{
    config::MpesaConfig,
    data_objects::{value_as_i64, AccessTokenResponse, StkPushResponse, StkQueryResponse},
    helpers::{daraja_timestamp, stk_password},
    DeclineReason,
    MpesaApiError,
    StkPushAccepted,
    StkPushRequest,
    StkQueryRequest,
    StkQueryResult,
};

/// Daraja truncates longer account references, so we do it ourselves to keep them predictable.
const MAX_ACCOUNT_REFERENCE_LEN: usize = 12;
const MAX_DESCRIPTION_LEN: usize = 13;
/// Tokens are refreshed this long before the expiry the network advertises.
const TOKEN_EXPIRY_MARGIN_SECS: u64 = 60;
const DEFAULT_TOKEN_LIFETIME_SECS: u64 = 3599;

#[derive(Clone)]
struct CachedToken {
    token: Secret<String>,
    expires_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct MpesaApi {
    config: MpesaConfig,
    client: Arc<Client>,
    token: Arc<RwLock<Option<CachedToken>>>,
}

impl MpesaApi {
    pub fn new(config: MpesaConfig) -> Result<Self, MpesaApiError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| MpesaApiError::Initialization(e.to_string()))?;
        Ok(Self { config, client: Arc::new(client), token: Arc::new(RwLock::new(None)) })
    }

    pub fn config(&self) -> &MpesaConfig {
        &self.config
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.base_url().trim_end_matches('/'))
    }

    /// Returns a valid OAuth access token, fetching a new one if the cached token is missing or about to expire.
    pub async fn access_token(&self) -> Result<Secret<String>, MpesaApiError> {
        if self.config.consumer_key.is_empty() || self.config.consumer_secret.is_empty() {
            return Err(MpesaApiError::Unconfigured("Consumer key and secret are required".into()));
        }
        if let Some(cached) = self.token.read().await.as_ref() {
            if cached.expires_at > Utc::now() {
                trace!("📲️ Using cached access token");
                return Ok(cached.token.clone());
            }
        }
        let mut guard = self.token.write().await;
        // Another task may have refreshed the token while we waited for the lock
        if let Some(cached) = guard.as_ref() {
            if cached.expires_at > Utc::now() {
                return Ok(cached.token.clone());
            }
        }
        debug!("📲️ Requesting a new access token");
        let response = self
            .client
            .get(self.url("/oauth/v1/generate"))
            .query(&[("grant_type", "client_credentials")])
            .basic_auth(self.config.consumer_key.reveal(), Some(self.config.consumer_secret.reveal()))
            .timeout(self.config.query_timeout)
            .send()
            .await
            .map_err(MpesaApiError::network)?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            warn!("📲️ Access token request failed with status {status}: {message}");
            return Err(MpesaApiError::AuthError(format!("Status {status}. {message}")));
        }
        let body = response.json::<AccessTokenResponse>().await.map_err(|e| MpesaApiError::AuthError(e.to_string()))?;
        let token = body
            .access_token
            .clone()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| MpesaApiError::AuthError("Token response did not contain an access token".into()))?;
        let lifetime = body.expires_in_secs().unwrap_or(DEFAULT_TOKEN_LIFETIME_SECS);
        let valid_for = lifetime.saturating_sub(TOKEN_EXPIRY_MARGIN_SECS);
        #[allow(clippy::cast_possible_wrap)]
        let expires_at = Utc::now() + chrono::Duration::seconds(valid_for as i64);
        let token = Secret::new(token);
        *guard = Some(CachedToken { token: token.clone(), expires_at });
        info!("📲️ Obtained a new access token, valid for {valid_for}s");
        Ok(token)
    }

    async fn invalidate_token(&self) {
        *self.token.write().await = None;
    }

    /// Sends an STK push request to the customer's handset.
    ///
    /// The amount must be positive and no more than the configured ceiling, and the phone number must normalize to a
    /// supported carrier. Only a response carrying a zero `ResponseCode` and *both* request identifiers counts as
    /// accepted; anything else is an error.
    pub async fn stk_push(
        &self,
        phone: &str,
        amount: Kes,
        account_reference: &str,
        description: &str,
    ) -> Result<StkPushAccepted, MpesaApiError> {
        if !self.config.is_configured() {
            return Err(MpesaApiError::Unconfigured("M-Pesa credentials or callback URL are missing".into()));
        }
        if !amount.is_positive() || amount > self.config.max_amount {
            return Err(MpesaApiError::InvalidAmount(format!(
                "{amount} is outside the allowed range (1 to {})",
                self.config.max_amount
            )));
        }
        let phone = normalize_phone(phone).map_err(|e| MpesaApiError::InvalidPhone(e.to_string()))?;
        let token = self.access_token().await?;
        let timestamp = daraja_timestamp(Utc::now());
        let password = stk_password(&self.config.short_code, self.config.passkey.reveal(), &timestamp);
        let request = StkPushRequest {
            business_short_code: self.config.short_code.clone(),
            password,
            timestamp,
            transaction_type: self.config.transaction_type.clone(),
            amount: amount.value(),
            party_a: phone.clone(),
            party_b: self.config.short_code.clone(),
            phone_number: phone.clone(),
            callback_url: self.config.callback_url.clone(),
            account_reference: truncate(account_reference, MAX_ACCOUNT_REFERENCE_LEN),
            transaction_desc: truncate(description, MAX_DESCRIPTION_LEN),
        };
        debug!("📲️ Sending STK push of {amount} to {} for {account_reference}", mask_phone(&phone));
        let (status, text) =
            self.post_json("/mpesa/stkpush/v1/processrequest", &token, &request, self.config.push_timeout).await?;
        let response = serde_json::from_str::<StkPushResponse>(&text).ok();
        if status == StatusCode::UNAUTHORIZED {
            self.invalidate_token().await;
            return Err(MpesaApiError::AuthError(format!("Push request was not authorized. {text}")));
        }
        if !status.is_success() {
            let message = response
                .as_ref()
                .and_then(|r| r.error_message.clone().or_else(|| r.response_description.clone()))
                .unwrap_or(text);
            warn!("📲️ STK push for {account_reference} was rejected with status {status}: {message}");
            return Err(MpesaApiError::Declined { reason: DeclineReason::from_message(&message), message });
        }
        let response = response.ok_or_else(|| {
            MpesaApiError::IncompleteResponse(format!("Push response could not be parsed: {text}"))
        })?;
        let code = response
            .response_code
            .as_ref()
            .and_then(value_as_i64)
            .ok_or_else(|| MpesaApiError::IncompleteResponse("Push response has no ResponseCode".into()))?;
        if code != 0 {
            let message = response.response_description.clone().unwrap_or_else(|| format!("ResponseCode {code}"));
            warn!("📲️ STK push for {account_reference} was declined: {message}");
            return Err(MpesaApiError::Declined { reason: DeclineReason::from_message(&message), message });
        }
        match (response.merchant_request_id, response.checkout_request_id) {
            (Some(m), Some(c)) if !m.is_empty() && !c.is_empty() => {
                info!("📲️ STK push for {account_reference} accepted. Checkout request id: {c}");
                Ok(StkPushAccepted {
                    merchant_request_id: m,
                    checkout_request_id: c,
                    customer_message: response.customer_message.unwrap_or_default(),
                })
            },
            _ => {
                error!("📲️ STK push for {account_reference} was accepted without request identifiers: {text}");
                Err(MpesaApiError::IncompleteResponse("Push response is missing a request identifier".into()))
            },
        }
    }

    /// Asks the network for the outcome of an earlier push request.
    ///
    /// A response that lacks the result code or either request identifier is an [`MpesaApiError::IncompleteResponse`]
    /// and must not be interpreted as success.
    pub async fn stk_query(&self, checkout_request_id: &str) -> Result<StkQueryResult, MpesaApiError> {
        if !self.config.is_configured() {
            return Err(MpesaApiError::Unconfigured("M-Pesa credentials or callback URL are missing".into()));
        }
        let token = self.access_token().await?;
        let timestamp = daraja_timestamp(Utc::now());
        let password = stk_password(&self.config.short_code, self.config.passkey.reveal(), &timestamp);
        let request = StkQueryRequest {
            business_short_code: self.config.short_code.clone(),
            password,
            timestamp,
            checkout_request_id: checkout_request_id.to_string(),
        };
        debug!("📲️ Querying status of checkout request {checkout_request_id}");
        let (status, text) =
            self.post_json("/mpesa/stkpushquery/v1/query", &token, &request, self.config.query_timeout).await?;
        let response = serde_json::from_str::<StkQueryResponse>(&text).ok();
        if status == StatusCode::UNAUTHORIZED {
            self.invalidate_token().await;
            return Err(MpesaApiError::AuthError(format!("Status query was not authorized. {text}")));
        }
        if !status.is_success() {
            let message = response
                .as_ref()
                .and_then(|r| r.error_message.clone().or_else(|| r.response_description.clone()))
                .unwrap_or(text);
            if message.to_ascii_lowercase().contains("being processed") {
                debug!("📲️ Checkout request {checkout_request_id} is still being processed");
                return Err(MpesaApiError::StillProcessing(message));
            }
            warn!("📲️ Status query for {checkout_request_id} failed with status {status}: {message}");
            return Err(MpesaApiError::Declined { reason: DeclineReason::from_message(&message), message });
        }
        let response = response.ok_or_else(|| {
            MpesaApiError::IncompleteResponse(format!("Query response could not be parsed: {text}"))
        })?;
        let result_code = response
            .result_code
            .as_ref()
            .and_then(value_as_i64)
            .ok_or_else(|| MpesaApiError::IncompleteResponse("Query response has no ResultCode".into()))?;
        let merchant_request_id = response
            .merchant_request_id
            .filter(|s| !s.is_empty())
            .ok_or_else(|| MpesaApiError::IncompleteResponse("Query response has no MerchantRequestID".into()))?;
        let checkout_request_id = response
            .checkout_request_id
            .filter(|s| !s.is_empty())
            .ok_or_else(|| MpesaApiError::IncompleteResponse("Query response has no CheckoutRequestID".into()))?;
        let result_desc = response.result_desc.unwrap_or_default();
        info!("📲️ Checkout request {checkout_request_id} has result code {result_code}: {result_desc}");
        Ok(StkQueryResult { result_code, result_desc, merchant_request_id, checkout_request_id })
    }

    async fn post_json<B: Serialize>(
        &self,
        path: &str,
        token: &Secret<String>,
        body: &B,
        timeout: Duration,
    ) -> Result<(StatusCode, String), MpesaApiError> {
        let url = self.url(path);
        trace!("📲️ POST {url}");
        let response = self
            .client
            .post(url)
            .bearer_auth(token.reveal())
            .json(body)
            .timeout(timeout)
            .send()
            .await
            .map_err(MpesaApiError::network)?;
        let status = response.status();
        let text = response.text().await.map_err(MpesaApiError::network)?;
        trace!("📲️ {path} responded with {status}: {text}");
        Ok((status, text))
    }
}

fn truncate(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}
