use std::fmt::Display;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Result codes reported by the network in callbacks and status queries.
pub mod result_codes {
    pub const SUCCESS: i64 = 0;
    pub const INSUFFICIENT_FUNDS: i64 = 1;
    pub const CANCELLED_BY_USER: i64 = 1032;
    pub const UNREACHABLE: i64 = 1037;
    pub const WRONG_PIN: i64 = 2001;
}

//--------------------------------------   Access tokens    ---------------------------------------------------------
#[derive(Debug, Clone, Deserialize)]
pub struct AccessTokenResponse {
    pub access_token: Option<String>,
    /// Daraja sends this as a string, but some simulators send a number.
    pub expires_in: Option<Value>,
}

impl AccessTokenResponse {
    pub fn expires_in_secs(&self) -> Option<u64> {
        self.expires_in.as_ref().and_then(value_as_i64).and_then(|v| u64::try_from(v).ok())
    }
}

//--------------------------------------      STK push      ---------------------------------------------------------
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct StkPushRequest {
    pub business_short_code: String,
    pub password: String,
    pub timestamp: String,
    pub transaction_type: String,
    pub amount: i64,
    pub party_a: String,
    pub party_b: String,
    pub phone_number: String,
    #[serde(rename = "CallBackURL")]
    pub callback_url: String,
    pub account_reference: String,
    pub transaction_desc: String,
}

/// The raw body of a push request response. Every field is optional, since the network omits fields on failure
/// and we must never assume their presence.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StkPushResponse {
    #[serde(rename = "MerchantRequestID")]
    pub merchant_request_id: Option<String>,
    #[serde(rename = "CheckoutRequestID")]
    pub checkout_request_id: Option<String>,
    #[serde(rename = "ResponseCode")]
    pub response_code: Option<Value>,
    #[serde(rename = "ResponseDescription")]
    pub response_description: Option<String>,
    #[serde(rename = "CustomerMessage")]
    pub customer_message: Option<String>,
    #[serde(rename = "errorCode")]
    pub error_code: Option<String>,
    #[serde(rename = "errorMessage")]
    pub error_message: Option<String>,
}

/// A push request that the network accepted for delivery to the customer's handset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StkPushAccepted {
    pub merchant_request_id: String,
    pub checkout_request_id: String,
    pub customer_message: String,
}

//--------------------------------------     STK query      ---------------------------------------------------------
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StkQueryRequest {
    #[serde(rename = "BusinessShortCode")]
    pub business_short_code: String,
    #[serde(rename = "Password")]
    pub password: String,
    #[serde(rename = "Timestamp")]
    pub timestamp: String,
    #[serde(rename = "CheckoutRequestID")]
    pub checkout_request_id: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StkQueryResponse {
    #[serde(rename = "ResponseCode")]
    pub response_code: Option<Value>,
    #[serde(rename = "ResponseDescription")]
    pub response_description: Option<String>,
    #[serde(rename = "MerchantRequestID")]
    pub merchant_request_id: Option<String>,
    #[serde(rename = "CheckoutRequestID")]
    pub checkout_request_id: Option<String>,
    #[serde(rename = "ResultCode")]
    pub result_code: Option<Value>,
    #[serde(rename = "ResultDesc")]
    pub result_desc: Option<String>,
    #[serde(rename = "errorCode")]
    pub error_code: Option<String>,
    #[serde(rename = "errorMessage")]
    pub error_message: Option<String>,
}

/// A fully populated status query result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StkQueryResult {
    pub result_code: i64,
    pub result_desc: String,
    pub merchant_request_id: String,
    pub checkout_request_id: String,
}

impl StkQueryResult {
    pub fn is_success(&self) -> bool {
        self.result_code == result_codes::SUCCESS
    }
}

//--------------------------------------   Decline reasons  ---------------------------------------------------------
/// Why the network refused or failed a payment request, in terms a customer can act on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeclineReason {
    InsufficientFunds,
    InvalidPhone,
    DuplicateRequest,
    CancelledByUser,
    Unreachable,
    WrongPin,
    Other,
}

impl DeclineReason {
    /// Classifies a free-text error message from the network.
    pub fn from_message(message: &str) -> Self {
        let m = message.to_ascii_lowercase();
        if m.contains("insufficient") {
            Self::InsufficientFunds
        } else if m.contains("invalid phone") || m.contains("invalid msisdn") || m.contains("invalid phonenumber") {
            Self::InvalidPhone
        } else if m.contains("duplicate") || m.contains("in progress") || m.contains("already being processed") {
            Self::DuplicateRequest
        } else if m.contains("cancelled by user") || m.contains("canceled by user") {
            Self::CancelledByUser
        } else if m.contains("wrong pin") || m.contains("initiator information is invalid") {
            Self::WrongPin
        } else {
            Self::Other
        }
    }

    /// Classifies a callback or query result code, falling back to the description for unknown codes.
    pub fn from_result(code: i64, description: &str) -> Self {
        match code {
            result_codes::INSUFFICIENT_FUNDS => Self::InsufficientFunds,
            result_codes::CANCELLED_BY_USER => Self::CancelledByUser,
            result_codes::UNREACHABLE => Self::Unreachable,
            result_codes::WRONG_PIN => Self::WrongPin,
            _ => Self::from_message(description),
        }
    }

    pub fn user_message(&self) -> &'static str {
        match self {
            Self::InsufficientFunds => "Insufficient M-Pesa balance. Please top up and try again.",
            Self::InvalidPhone => "The phone number is not registered for M-Pesa.",
            Self::DuplicateRequest => "A payment request is already in progress for this number. Please wait.",
            Self::CancelledByUser => "The payment request was cancelled on the phone.",
            Self::Unreachable => "The phone could not be reached. Check that it is on and has signal.",
            Self::WrongPin => "An incorrect M-Pesa PIN was entered.",
            Self::Other => "The payment request was declined. Please try again.",
        }
    }
}

impl Display for DeclineReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::InsufficientFunds => "insufficient funds",
            Self::InvalidPhone => "invalid phone",
            Self::DuplicateRequest => "duplicate request",
            Self::CancelledByUser => "cancelled by user",
            Self::Unreachable => "unreachable",
            Self::WrongPin => "wrong pin",
            Self::Other => "declined",
        };
        f.write_str(s)
    }
}

/// Reads an integer that the network may send either as a JSON number or as a numeric string. A number with a
/// fractional part is not an integer, so `0.4` is rejected rather than read as `0`.
pub(crate) fn value_as_i64(v: &Value) -> Option<i64> {
    match v {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64().filter(|f| f.fract() == 0.0 && f.abs() < i64::MAX as f64).map(|f| f as i64)
        }),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}
