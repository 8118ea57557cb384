use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum StripeApiError {
    #[error("Could not initialize client: {0}")]
    Initialization(String),
    #[error("Card payments are not configured")]
    Unconfigured,
    #[error("Could not reach the card gateway (timeout: {timeout}): {message}")]
    Request { timeout: bool, message: String },
    #[error("Card gateway error {status}. {message}")]
    Api { status: u16, code: Option<String>, message: String },
    #[error("Could not deserialize JSON: {0}")]
    JsonError(String),
}

impl StripeApiError {
    pub fn request(e: reqwest::Error) -> Self {
        Self::Request { timeout: e.is_timeout(), message: e.to_string() }
    }
}
