use std::fmt::Display;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db_types::{Kes, MobileMoneyStatus, Order, OrderId, OrderStatusType, PaymentMethod};

/// The payment view of an order, as polled by clients waiting for a payment to complete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentStatusRecord {
    pub order_id: OrderId,
    pub status: OrderStatusType,
    pub payment_method: Option<PaymentMethod>,
    pub mobile_money_status: Option<MobileMoneyStatus>,
    pub paid_at: Option<DateTime<Utc>>,
    pub receipt_number: Option<String>,
    pub total: Kes,
    pub currency: String,
    pub failure_reason: Option<String>,
    pub retry_count: i64,
}

impl PaymentStatusRecord {
    pub fn is_paid(&self) -> bool {
        self.paid_at.is_some() || self.mobile_money_status == Some(MobileMoneyStatus::Paid)
    }

    pub fn is_failed(&self) -> bool {
        !self.is_paid() && self.mobile_money_status == Some(MobileMoneyStatus::Failed)
    }
}

impl From<&Order> for PaymentStatusRecord {
    fn from(order: &Order) -> Self {
        let receipt_number = match order.payment_method {
            Some(PaymentMethod::Card) if order.paid_at.is_some() => order.card_transaction_ref.clone(),
            _ => order.mpesa_receipt_number.clone(),
        };
        Self {
            order_id: order.order_id.clone(),
            status: order.status,
            payment_method: order.payment_method,
            mobile_money_status: order.mpesa_status,
            paid_at: order.paid_at,
            receipt_number,
            total: order.total_price,
            currency: order.currency.clone(),
            failure_reason: order.payment_failure_reason.clone(),
            retry_count: order.payment_retry_count,
        }
    }
}

impl From<Order> for PaymentStatusRecord {
    fn from(order: Order) -> Self {
        Self::from(&order)
    }
}

/// A push request that was sent to the customer's handset and recorded against the order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushRequested {
    pub order: Order,
    pub merchant_request_id: String,
    pub checkout_request_id: String,
    pub customer_message: String,
}

/// What a result notification did to its order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackOutcome {
    /// The order is now paid.
    Paid(Order),
    /// The order was already paid. Nothing changed, apart from possibly replacing a provisional receipt.
    AlreadyPaid(Order),
    /// The payment failed and the order was marked as such.
    Failed(Order),
    /// The customer paid a different amount to the order total. The order was marked as failed.
    AmountMismatch { order: Order, expected: Kes, received: Kes },
    /// A failure for a request that has since been replaced. Only the attempt history was updated.
    Superseded { order_id: OrderId, checkout_request_id: String },
}

impl CallbackOutcome {
    pub fn order_id(&self) -> &OrderId {
        match self {
            CallbackOutcome::Paid(o) | CallbackOutcome::AlreadyPaid(o) | CallbackOutcome::Failed(o) => &o.order_id,
            CallbackOutcome::AmountMismatch { order, .. } => &order.order_id,
            CallbackOutcome::Superseded { order_id, .. } => order_id,
        }
    }
}

impl Display for CallbackOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CallbackOutcome::Paid(o) => write!(f, "Order {} is paid", o.order_id),
            CallbackOutcome::AlreadyPaid(o) => write!(f, "Order {} was already paid", o.order_id),
            CallbackOutcome::Failed(o) => write!(f, "Payment for order {} failed", o.order_id),
            CallbackOutcome::AmountMismatch { order, expected, received } => {
                write!(f, "Order {} expected {expected} but received {received}", order.order_id)
            },
            CallbackOutcome::Superseded { order_id, checkout_request_id } => {
                write!(f, "Request {checkout_request_id} for order {order_id} has been superseded")
            },
        }
    }
}
