use serde::{Deserialize, Serialize};

use crate::{
    db_types::{Order, OrderId, PaymentMethod},
    events::PaymentEvent,
};

/// Emitted exactly once per order, when either rail confirms payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderPaidEvent {
    pub order: Order,
    pub method: PaymentMethod,
}

impl OrderPaidEvent {
    pub fn new(order: Order, method: PaymentMethod) -> Self {
        Self { order, method }
    }
}

impl PaymentEvent for OrderPaidEvent {
    const NAME: &'static str = "order paid";

    fn order_id(&self) -> &OrderId {
        &self.order.order_id
    }
}

/// Emitted when a push payment for an order fails or is cancelled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentFailedEvent {
    pub order: Order,
    pub reason: String,
}

impl PaymentFailedEvent {
    pub fn new<S: Into<String>>(order: Order, reason: S) -> Self {
        Self { order, reason: reason.into() }
    }
}

impl PaymentEvent for PaymentFailedEvent {
    const NAME: &'static str = "payment failed";

    fn order_id(&self) -> &OrderId {
        &self.order.order_id
    }
}
