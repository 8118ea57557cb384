use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::db_types::Kes;

/// A push request that the network accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushAccepted {
    pub merchant_request_id: String,
    pub checkout_request_id: String,
    pub customer_message: String,
}

/// What the network says about an earlier push request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PushQueryResult {
    /// The customer has not responded yet.
    Processing,
    /// The request has reached a final result. A zero `result_code` means the customer paid.
    Completed { result_code: i64, result_desc: String },
}

/// A structurally valid result notification from the push payment network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushCallback {
    pub merchant_request_id: String,
    pub checkout_request_id: String,
    pub result_code: i64,
    pub result_desc: String,
    /// Present iff the payment succeeded.
    pub details: Option<PushPaymentDetails>,
}

impl PushCallback {
    pub fn is_success(&self) -> bool {
        self.result_code == 0 && self.details.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushPaymentDetails {
    pub amount: Kes,
    pub receipt_number: String,
    pub transaction_date: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CardIntentStatus {
    Succeeded,
    Processing,
    RequiresAction,
    RequiresPaymentMethod,
    Canceled,
    Other,
}

impl Display for CardIntentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CardIntentStatus::Succeeded => write!(f, "succeeded"),
            CardIntentStatus::Processing => write!(f, "processing"),
            CardIntentStatus::RequiresAction => write!(f, "requires_action"),
            CardIntentStatus::RequiresPaymentMethod => write!(f, "requires_payment_method"),
            CardIntentStatus::Canceled => write!(f, "canceled"),
            CardIntentStatus::Other => write!(f, "other"),
        }
    }
}

/// A card payment intent, as reported by the card gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardIntent {
    pub id: String,
    /// The intent amount in the currency's minor unit (cents)
    pub amount_minor: i64,
    pub currency: String,
    pub status: CardIntentStatus,
    pub client_secret: Option<String>,
    /// The order id the intent was created for, if the gateway echoes it back
    pub order_id: Option<String>,
}
