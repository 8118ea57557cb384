use std::fmt::Display;

use duka_payment_engine::{
    db_types::{Kes, NewOrder, NewOrderItem, OrderId},
    payment_objects::PushRequested,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonResponse {
    pub success: bool,
    pub message: String,
}

impl JsonResponse {
    pub fn success<S: Display>(message: S) -> Self {
        Self { success: true, message: message.to_string() }
    }
}

//--------------------------------------   Push payments    ---------------------------------------------------------
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitiatePushRequest {
    pub order_id: OrderId,
    pub phone: String,
}

/// Used by the resend, cancel and query endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderRequest {
    pub order_id: OrderId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushInitiated {
    pub checkout_request_id: String,
    pub merchant_request_id: String,
    pub customer_message: String,
}

impl From<PushRequested> for PushInitiated {
    fn from(value: PushRequested) -> Self {
        Self {
            checkout_request_id: value.checkout_request_id,
            merchant_request_id: value.merchant_request_id,
            customer_message: value.customer_message,
        }
    }
}

/// An optional token that authenticates a network callback. See [`crate::helpers::verify_callback_token`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CallbackTokenParam {
    pub token: Option<String>,
}

/// The answer sent back to the network for every callback it delivers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallbackAck {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl CallbackAck {
    pub fn ok() -> Self {
        Self { status: "OK".into(), message: None }
    }

    pub fn error<S: Display>(message: S) -> Self {
        Self { status: "ERROR".into(), message: Some(message.to_string()) }
    }
}

//--------------------------------------   Card payments    ---------------------------------------------------------
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateIntentRequest {
    pub order_id: OrderId,
    pub amount: Kes,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntentCreated {
    pub intent_id: String,
    pub client_secret: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmCardRequest {
    pub order_id: OrderId,
    pub intent_id: String,
}

//--------------------------------------       Orders        ---------------------------------------------------------
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewOrderRequest {
    pub order_id: OrderId,
    pub customer_id: String,
    pub total: Kes,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub items: Vec<NewOrderItemRequest>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewOrderItemRequest {
    pub product_id: String,
    pub quantity: i64,
    pub unit_price: Kes,
}

impl From<NewOrderRequest> for NewOrder {
    fn from(req: NewOrderRequest) -> Self {
        let mut order = NewOrder::new(req.order_id, req.customer_id, req.total);
        if let Some(currency) = req.currency {
            order.currency = currency;
        }
        req.items.into_iter().fold(order, |order, item| {
            order.with_item(NewOrderItem::new(item.product_id, item.quantity, item.unit_price))
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderPlaced {
    pub order_id: OrderId,
    /// False if the order already existed, in which case nothing was changed.
    pub created: bool,
    pub total: Kes,
    pub currency: String,
}
