use std::fmt::Debug;

use log::*;

use crate::{
    db_types::{NewOrder, Order, OrderId, OrderItem},
    tpe_api::{errors::PaymentFlowError, payment_objects::PaymentStatusRecord},
    traits::PaymentStore,
};

/// `OrderFlowApi` is how orders enter the payment engine, and how clients follow their payment progress.
pub struct OrderFlowApi<B> {
    db: B,
}

impl<B> Debug for OrderFlowApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OrderFlowApi")
    }
}

impl<B> OrderFlowApi<B> {
    pub fn new(db: B) -> Self {
        Self { db }
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}

impl<B> OrderFlowApi<B>
where B: PaymentStore
{
    /// Stores a newly placed order and its items. The header and the items are written together or not at all.
    ///
    /// Placing the same order twice is harmless: the stored order is returned, and the second field is `false`.
    pub async fn place_order(&self, order: NewOrder) -> Result<(Order, bool), PaymentFlowError> {
        if order.order_id.as_str().trim().is_empty() {
            return Err(PaymentFlowError::Validation("An order id is required".into()));
        }
        if order.customer_id.trim().is_empty() {
            return Err(PaymentFlowError::Validation("A customer id is required".into()));
        }
        let (stored, inserted) = self.db.insert_order(order).await?;
        if inserted {
            info!("🔄️📦️ Order {} for {} placed by customer {}", stored.order_id, stored.total_price, stored.customer_id);
        }
        Ok((stored, inserted))
    }

    pub async fn fetch_order(&self, order_id: &OrderId) -> Result<Order, PaymentFlowError> {
        self.db.fetch_order(order_id).await?.ok_or_else(|| PaymentFlowError::OrderNotFound(order_id.clone()))
    }

    pub async fn order_items(&self, order_id: &OrderId) -> Result<Vec<OrderItem>, PaymentFlowError> {
        let _ = self.fetch_order(order_id).await?;
        let items = self.db.fetch_order_items(order_id).await?;
        Ok(items)
    }

    /// The current payment view of the order. This is a read-only call, and is what payment pollers hit.
    pub async fn payment_status(&self, order_id: &OrderId) -> Result<PaymentStatusRecord, PaymentFlowError> {
        let order = self.fetch_order(order_id).await?;
        trace!("🔄️📦️ Payment status for {order_id}: {:?}", order.mpesa_status);
        Ok(PaymentStatusRecord::from(order))
    }
}
