use thiserror::Error;

use crate::DeclineReason;

#[derive(Debug, Clone, Error)]
pub enum MpesaApiError {
    #[error("Could not initialize client: {0}")]
    Initialization(String),
    #[error("The M-Pesa client is not configured: {0}")]
    Unconfigured(String),
    #[error("Could not obtain an access token: {0}")]
    AuthError(String),
    #[error("Network error communicating with M-Pesa (timeout: {timeout}): {message}")]
    NetworkError { timeout: bool, message: String },
    #[error("M-Pesa declined the request ({reason}): {message}")]
    Declined { reason: DeclineReason, message: String },
    #[error("M-Pesa returned an incomplete response: {0}")]
    IncompleteResponse(String),
    #[error("The payment request is still being processed: {0}")]
    StillProcessing(String),
    #[error("Invalid phone number: {0}")]
    InvalidPhone(String),
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
    #[error("Could not deserialize JSON: {0}")]
    JsonError(String),
}

impl MpesaApiError {
    pub fn network(e: reqwest::Error) -> Self {
        Self::NetworkError { timeout: e.is_timeout(), message: e.to_string() }
    }
}
