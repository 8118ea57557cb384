use duka_common::Kes;
use log::*;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    data_objects::{result_codes, value_as_i64},
    MpesaApiError,
};

/// The JSON document the network POSTs to the callback URL once a push request completes.
///
/// All fields are optional at the parsing stage so that a malformed payload can be reported precisely rather than
/// failing deserialization with an opaque message. Call [`StkCallbackEnvelope::validate`] before acting on it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StkCallbackEnvelope {
    #[serde(rename = "Body")]
    pub body: Option<StkCallbackBody>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StkCallbackBody {
    #[serde(rename = "stkCallback")]
    pub stk_callback: Option<StkCallback>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StkCallback {
    #[serde(rename = "MerchantRequestID")]
    pub merchant_request_id: Option<String>,
    #[serde(rename = "CheckoutRequestID")]
    pub checkout_request_id: Option<String>,
    #[serde(rename = "ResultCode")]
    pub result_code: Option<Value>,
    #[serde(rename = "ResultDesc")]
    pub result_desc: Option<String>,
    #[serde(rename = "CallbackMetadata")]
    pub callback_metadata: Option<CallbackMetadata>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CallbackMetadata {
    #[serde(rename = "Item", default)]
    pub items: Vec<CallbackItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallbackItem {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Value", default)]
    pub value: Option<Value>,
}

impl CallbackMetadata {
    fn get(&self, name: &str) -> Option<&Value> {
        self.items.iter().find(|i| i.name == name).and_then(|i| i.value.as_ref())
    }
}

/// Payment details that are only present on a successful result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallbackDetails {
    pub amount: Kes,
    pub receipt_number: String,
    pub transaction_date: Option<String>,
    pub phone: Option<String>,
}

/// A callback that passed structural validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatedCallback {
    pub merchant_request_id: String,
    pub checkout_request_id: String,
    pub result_code: i64,
    pub result_desc: String,
    /// `Some` iff `result_code` is zero.
    pub details: Option<CallbackDetails>,
}

impl ValidatedCallback {
    pub fn is_success(&self) -> bool {
        self.details.is_some()
    }
}

impl StkCallbackEnvelope {
    /// The checkout request id, if the payload carries one. Used to verify callback tokens before full validation.
    pub fn checkout_request_id(&self) -> Option<&str> {
        self.body.as_ref()?.stk_callback.as_ref()?.checkout_request_id.as_deref()
    }

    /// Checks that the callback carries both request identifiers and a result code, and, for successful results, the
    /// amount and receipt number.
    ///
    /// A successful result that lacks payment details is rejected outright. It is never read as a payment.
    pub fn validate(&self) -> Result<ValidatedCallback, MpesaApiError> {
        let cb = self
            .body
            .as_ref()
            .and_then(|b| b.stk_callback.as_ref())
            .ok_or_else(|| MpesaApiError::IncompleteResponse("Callback has no Body.stkCallback".into()))?;
        let merchant_request_id = non_empty(cb.merchant_request_id.as_deref())
            .ok_or_else(|| MpesaApiError::IncompleteResponse("Callback has no MerchantRequestID".into()))?;
        let checkout_request_id = non_empty(cb.checkout_request_id.as_deref())
            .ok_or_else(|| MpesaApiError::IncompleteResponse("Callback has no CheckoutRequestID".into()))?;
        let result_code = cb
            .result_code
            .as_ref()
            .and_then(value_as_i64)
            .ok_or_else(|| MpesaApiError::IncompleteResponse("Callback has no valid ResultCode".into()))?;
        let result_desc = cb.result_desc.clone().unwrap_or_default();
        let details = if result_code == result_codes::SUCCESS {
            let meta = cb.callback_metadata.as_ref().ok_or_else(|| {
                MpesaApiError::IncompleteResponse("Successful callback has no CallbackMetadata".into())
            })?;
            Some(extract_details(meta)?)
        } else {
            None
        };
        trace!("Validated callback for checkout request {checkout_request_id} with result code {result_code}");
        Ok(ValidatedCallback { merchant_request_id, checkout_request_id, result_code, result_desc, details })
    }
}

fn extract_details(meta: &CallbackMetadata) -> Result<CallbackDetails, MpesaApiError> {
    let amount = meta
        .get("Amount")
        .and_then(|v| match v {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        })
        .ok_or_else(|| MpesaApiError::IncompleteResponse("Successful callback has no Amount".into()))?;
    let amount = Kes::try_from(amount).map_err(|e| MpesaApiError::IncompleteResponse(e.to_string()))?;
    if !amount.is_positive() {
        let msg = format!("Successful callback has a non-positive Amount ({amount})");
        return Err(MpesaApiError::IncompleteResponse(msg));
    }
    let receipt_number = meta
        .get("MpesaReceiptNumber")
        .and_then(value_as_string)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| MpesaApiError::IncompleteResponse("Successful callback has no MpesaReceiptNumber".into()))?;
    let transaction_date = meta.get("TransactionDate").and_then(value_as_string);
    let phone = meta.get("PhoneNumber").and_then(value_as_string);
    Ok(CallbackDetails { amount, receipt_number, transaction_date, phone })
}

fn value_as_string(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn non_empty(s: Option<&str>) -> Option<String> {
    s.map(str::trim).filter(|s| !s.is_empty()).map(String::from)
}
