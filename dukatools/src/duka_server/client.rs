use std::fmt::Display;

use anyhow::{anyhow, Result};
use duka_payment_engine::{
    db_types::{OrderId, PaymentAttempt},
    payment_objects::PaymentStatusRecord,
};
use duka_payment_server::data_objects::{InitiatePushRequest, JsonResponse, OrderRequest, PushInitiated};
use log::*;
use reqwest::{
    header::{HeaderMap, HeaderValue},
    Client,
    Response,
    StatusCode,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use url::Url;

use crate::poller::StatusSource;

/// The error body the server sends with every non-success response.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
    #[serde(rename = "resetAt")]
    reset_at: Option<String>,
}

pub struct DukaServerClient {
    client: Client,
    server: Url,
}

impl DukaServerClient {
    pub fn new(server: &str) -> Result<Self> {
        let server = Url::parse(server).map_err(|e| anyhow!("Invalid server URL {server}. {e}"))?;
        let mut headers = HeaderMap::new();
        headers.insert("Accept", HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .user_agent("Duka Payment Server Client")
            .default_headers(headers)
            .build()
            .map_err(|e| anyhow!("Failed to create HTTP client. {e}"))?;
        Ok(Self { client, server })
    }

    pub fn server(&self) -> &str {
        self.server.as_str()
    }

    pub fn url(&self, path: &str) -> Result<Url> {
        self.server.join(path).map_err(|e| anyhow!("Failed to join URL: {}", e))
    }

    pub async fn health(&self) -> Result<String> {
        let url = self.url("/health")?;
        let res = self.client.get(url).send().await?;
        let response = res.text().await?;
        Ok(response)
    }

    pub async fn payment_status(&self, order_id: &OrderId) -> Result<PaymentStatusRecord> {
        let id = urlencoding::encode(order_id.as_str());
        self.get_request(&format!("/orders/{id}/payment-status")).await
    }

    pub async fn payment_attempts(&self, order_id: &OrderId) -> Result<Vec<PaymentAttempt>> {
        let id = urlencoding::encode(order_id.as_str());
        self.get_request(&format!("/orders/{id}/payment-attempts")).await
    }

    /// Sends a payment prompt for the order to `phone`.
    pub async fn initiate_push(&self, order_id: &OrderId, phone: &str) -> Result<PushInitiated> {
        let req = InitiatePushRequest { order_id: order_id.clone(), phone: phone.to_string() };
        self.post_request("/payments/push/initiate", &req).await
    }

    pub async fn resend_push(&self, order_id: &OrderId) -> Result<PushInitiated> {
        self.post_request("/payments/push/resend", &OrderRequest { order_id: order_id.clone() }).await
    }

    pub async fn cancel_push(&self, order_id: &OrderId) -> Result<JsonResponse> {
        self.post_request("/payments/push/cancel", &OrderRequest { order_id: order_id.clone() }).await
    }

    /// Asks the server to check the order's outstanding payment request with the network.
    pub async fn query_push(&self, order_id: &OrderId) -> Result<PaymentStatusRecord> {
        self.post_request("/payments/push/query", &OrderRequest { order_id: order_id.clone() }).await
    }

    async fn get_request<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.url(path)?;
        trace!("GET {url}");
        let res = self.client.get(url).send().await?;
        parse_response(path, res).await
    }

    async fn post_request<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T> {
        let url = self.url(path)?;
        trace!("POST {url}");
        let res = self.client.post(url).json(body).send().await?;
        parse_response(path, res).await
    }
}

async fn parse_response<T: DeserializeOwned>(path: &str, res: Response) -> Result<T> {
    let code = res.status();
    if code.is_success() {
        return Ok(res.json().await?);
    }
    let text = res.text().await?;
    let msg = match serde_json::from_str::<ErrorBody>(&text) {
        Ok(ErrorBody { error, reset_at: Some(reset_at) }) if code == StatusCode::TOO_MANY_REQUESTS => {
            format!("{error} (try again after {reset_at})")
        },
        Ok(body) => body.error,
        Err(_) => text,
    };
    Err(anyhow!("Error {code} from {path}. {msg}"))
}

impl StatusSource for DukaServerClient {
    async fn payment_status(&self, order_id: &OrderId) -> Result<PaymentStatusRecord> {
        DukaServerClient::payment_status(self, order_id).await
    }
}

impl Display for DukaServerClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Duka payment server ({})", self.server())
    }
}
