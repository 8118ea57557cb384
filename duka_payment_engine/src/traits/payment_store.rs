use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::db_types::{
    AttemptStatus,
    MobileMoneyStatus,
    NewOrder,
    NewPaymentAttempt,
    Order,
    OrderId,
    OrderItem,
    PaymentAttempt,
};

/// The fields that accompany a push status change.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MobileMoneyUpdate {
    /// Required, and non-empty, when moving to `Paid`.
    pub receipt_number: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    /// Stored when moving to `Failed`. Cleared on any other transition.
    pub failure_reason: Option<String>,
}

impl MobileMoneyUpdate {
    pub fn paid<S: Into<String>>(receipt_number: S, paid_at: DateTime<Utc>) -> Self {
        Self { receipt_number: Some(receipt_number.into()), paid_at: Some(paid_at), failure_reason: None }
    }

    pub fn failed<S: Into<String>>(reason: S) -> Self {
        Self { failure_reason: Some(reason.into()), ..Default::default() }
    }
}

/// Persistence for orders and their payment state.
///
/// This is the *only* write path for payment fields. Implementations must guarantee that:
/// * every push status change respects [`MobileMoneyStatus::can_transition`],
/// * a change is applied only if the stored status still equals the status the caller read (compare-and-set). If it
///   does not, [`PaymentStoreError::StatusChanged`] is returned and nothing is written,
/// * `Paid` is never written without a non-empty receipt number and a payment timestamp,
/// * a paid order is never modified again.
#[allow(async_fn_in_trait)]
pub trait PaymentStore: Clone {
    /// The URL of the database
    fn url(&self) -> &str;

    /// Stores a new order along with its line items in a single atomic transaction.
    ///
    /// This call is idempotent. Returns `false` in the second field if the order already existed, in which case the
    /// stored order is returned unchanged.
    async fn insert_order(&self, order: NewOrder) -> Result<(Order, bool), PaymentStoreError>;

    async fn fetch_order(&self, order_id: &OrderId) -> Result<Option<Order>, PaymentStoreError>;

    async fn fetch_order_items(&self, order_id: &OrderId) -> Result<Vec<OrderItem>, PaymentStoreError>;

    /// Finds the order that a push request belongs to, whether the request is the order's active one or an older,
    /// superseded one.
    async fn fetch_order_by_checkout_request_id(
        &self,
        checkout_request_id: &str,
    ) -> Result<Option<Order>, PaymentStoreError>;

    async fn fetch_attempt(&self, checkout_request_id: &str) -> Result<Option<PaymentAttempt>, PaymentStoreError>;

    /// All push requests sent for the order, oldest first.
    async fn fetch_attempts_for_order(&self, order_id: &OrderId) -> Result<Vec<PaymentAttempt>, PaymentStoreError>;

    /// Records a newly accepted push request in a single atomic transaction:
    /// * the order's push status moves from `expected` to `Initiated`, and the order's active request identifiers and
    ///   phone are overwritten with the new ones,
    /// * if the order already had an active request, its attempt is marked `Superseded` and the retry count is
    ///   incremented,
    /// * a new attempt row is inserted.
    async fn record_push_initiated(
        &self,
        expected: Option<MobileMoneyStatus>,
        attempt: NewPaymentAttempt,
    ) -> Result<Order, PaymentStoreError>;

    /// Moves the order's push status from `expected` to `new`, as a compare-and-set.
    ///
    /// Moving to `Paid` also sets `paid_at`, the receipt number, and advances the order to `processing`.
    async fn update_mobile_money_status(
        &self,
        order_id: &OrderId,
        expected: Option<MobileMoneyStatus>,
        new: MobileMoneyStatus,
        update: MobileMoneyUpdate,
    ) -> Result<Order, PaymentStoreError>;

    /// Replaces a provisional receipt number on a paid order with the real one. Returns `None` if the stored receipt
    /// did not match `provisional`.
    async fn replace_receipt_number(
        &self,
        order_id: &OrderId,
        provisional: &str,
        receipt_number: &str,
    ) -> Result<Option<Order>, PaymentStoreError>;

    /// Records the network's result for a single push request. Returns `None` if there is no such attempt, or if it
    /// has already been paid (a paid attempt is never changed).
    async fn update_attempt_status(
        &self,
        checkout_request_id: &str,
        status: AttemptStatus,
        result_code: Option<i64>,
        result_desc: Option<String>,
    ) -> Result<Option<PaymentAttempt>, PaymentStoreError>;

    /// Links a card payment intent to an unpaid order and sets the payment method to `card`.
    async fn record_card_intent(&self, order_id: &OrderId, intent_id: &str) -> Result<Order, PaymentStoreError>;

    /// Marks the order as paid by card. Compare-and-set on the order not being paid yet.
    async fn mark_card_paid(
        &self,
        order_id: &OrderId,
        intent_id: &str,
        paid_at: DateTime<Utc>,
    ) -> Result<Order, PaymentStoreError>;
}

#[derive(Debug, Clone, Error)]
pub enum PaymentStoreError {
    #[error("We have an internal database engine (configuration/uptime etc.) : {0}")]
    DatabaseError(String),
    #[error("The requested order {0} does not exist")]
    OrderNotFound(OrderId),
    #[error("Order {0} is invalid. {1}")]
    InvalidOrder(OrderId, String),
    #[error("Illegal payment status change for order {order_id}: {from} -> {to}")]
    IllegalTransition { order_id: OrderId, from: String, to: MobileMoneyStatus },
    #[error("The payment status of order {0} changed while it was being updated")]
    StatusChanged(OrderId),
    #[error("Cannot mark order {0} as paid without a receipt number")]
    MissingReceipt(OrderId),
    #[error("Order {0} has already been paid")]
    AlreadyPaid(OrderId),
}

impl From<sqlx::Error> for PaymentStoreError {
    fn from(e: sqlx::Error) -> Self {
        PaymentStoreError::DatabaseError(e.to_string())
    }
}
