use std::sync::Arc;

use log::*;
use reqwest::{Client, Method};
use serde::de::DeserializeOwned;

use crate::{config::StripeConfig, data_objects::StripeErrorBody, PaymentIntent, StripeApiError};

#[derive(Clone)]
pub struct StripeApi {
    config: StripeConfig,
    client: Arc<Client>,
}

impl StripeApi {
    pub fn new(config: StripeConfig) -> Result<Self, StripeApiError> {
        let client = Client::builder().build().map_err(|e| StripeApiError::Initialization(e.to_string()))?;
        Ok(Self { config, client: Arc::new(client) })
    }

    pub fn is_configured(&self) -> bool {
        self.config.is_configured()
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}/v1{path}", self.config.api_base.trim_end_matches('/'))
    }

    async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        form: Option<&[(&str, String)]>,
    ) -> Result<T, StripeApiError> {
        if !self.config.is_configured() {
            return Err(StripeApiError::Unconfigured);
        }
        let url = self.url(path);
        trace!("💳️ {method} {url}");
        let mut req = self
            .client
            .request(method, url)
            .bearer_auth(self.config.secret_key.reveal())
            .timeout(self.config.timeout);
        if let Some(form) = form {
            req = req.form(form);
        }
        let response = req.send().await.map_err(StripeApiError::request)?;
        let status = response.status();
        if status.is_success() {
            response.json::<T>().await.map_err(|e| StripeApiError::JsonError(e.to_string()))
        } else {
            let text = response.text().await.map_err(StripeApiError::request)?;
            let detail = serde_json::from_str::<StripeErrorBody>(&text).ok().and_then(|b| b.error);
            let code = detail.as_ref().and_then(|d| d.decline_code.clone().or_else(|| d.code.clone()));
            let message = detail.and_then(|d| d.message).unwrap_or(text);
            Err(StripeApiError::Api { status: status.as_u16(), code, message })
        }
    }

    /// Creates a payment intent for `amount_minor` (in cents) tagged with the order id.
    pub async fn create_payment_intent(
        &self,
        amount_minor: i64,
        currency: &str,
        order_id: &str,
    ) -> Result<PaymentIntent, StripeApiError> {
        let form = [
            ("amount", amount_minor.to_string()),
            ("currency", currency.to_ascii_lowercase()),
            ("metadata[order_id]", order_id.to_string()),
            ("automatic_payment_methods[enabled]", "true".to_string()),
        ];
        debug!("💳️ Creating payment intent of {amount_minor} {currency} (minor units) for order {order_id}");
        let intent = self.request::<PaymentIntent>(Method::POST, "/payment_intents", Some(&form)).await?;
        info!("💳️ Created payment intent {} for order {order_id}", intent.id);
        Ok(intent)
    }

    pub async fn retrieve_payment_intent(&self, intent_id: &str) -> Result<PaymentIntent, StripeApiError> {
        if intent_id.is_empty() || intent_id.contains('/') {
            return Err(StripeApiError::Api {
                status: 400,
                code: None,
                message: format!("Invalid payment intent id: {intent_id}"),
            });
        }
        let path = format!("/payment_intents/{intent_id}");
        let intent = self.request::<PaymentIntent>(Method::GET, &path, None).await?;
        debug!("💳️ Payment intent {intent_id} has status {}", intent.status);
        Ok(intent)
    }
}
