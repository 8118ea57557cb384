use thiserror::Error;

use crate::{
    db_types::{Kes, OrderId},
    traits::{CardIntent, PushAccepted, PushQueryResult},
};

/// Failures reported by payment gateways, independent of the provider.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    #[error("The payment gateway is not configured. {0}")]
    Unconfigured(String),
    #[error("The payment gateway rejected our credentials. {0}")]
    Auth(String),
    #[error("Could not reach the payment gateway (timeout: {timeout}). {message}")]
    Network { timeout: bool, message: String },
    #[error("The payment was declined. {reason}")]
    Declined {
        /// A message that can be shown to the customer
        reason: String,
        /// The raw gateway message, for the logs
        detail: String,
    },
    #[error("The payment gateway returned an incomplete response. {0}")]
    IncompleteResponse(String),
    #[error("Invalid phone number. {0}")]
    InvalidPhone(String),
    #[error("Invalid amount. {0}")]
    InvalidAmount(String),
}

/// A mobile-money network that can prompt a customer's handset to approve a payment.
#[allow(async_fn_in_trait)]
pub trait PushPaymentGateway: Clone {
    /// Sends a payment prompt for `amount` to `phone`.
    ///
    /// Implementations must return an error, never a partially filled [`PushAccepted`], if the network response lacks
    /// either request identifier.
    async fn request_payment(
        &self,
        phone: &str,
        amount: Kes,
        account_reference: &str,
        description: &str,
    ) -> Result<PushAccepted, GatewayError>;

    /// Queries the outcome of an earlier request. A response missing its result code is an
    /// [`GatewayError::IncompleteResponse`], not a success.
    async fn query_payment(&self, checkout_request_id: &str) -> Result<PushQueryResult, GatewayError>;
}

/// A card processor using the payment-intent model.
#[allow(async_fn_in_trait)]
pub trait CardPaymentGateway: Clone {
    fn is_configured(&self) -> bool;

    async fn create_intent(&self, amount: Kes, currency: &str, order_id: &OrderId) -> Result<CardIntent, GatewayError>;

    async fn fetch_intent(&self, intent_id: &str) -> Result<CardIntent, GatewayError>;
}
