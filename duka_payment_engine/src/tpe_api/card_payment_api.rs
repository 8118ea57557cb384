use std::fmt::Debug;

use chrono::Utc;
use log::*;

use crate::{
    db_types::{Kes, Order, OrderId, PaymentMethod},
    events::{EventProducers, OrderPaidEvent},
    tpe_api::errors::PaymentFlowError,
    traits::{CardIntent, CardIntentStatus, CardPaymentGateway, GatewayError, PaymentStore, PaymentStoreError},
};

/// `CardPaymentApi` handles card payments. The browser completes the payment directly with the card processor, so the
/// only job here is to create the intent and, when the browser says it is done, to check with the processor that the
/// intent really succeeded for the right amount before marking the order paid.
pub struct CardPaymentApi<B, C> {
    db: B,
    gateway: C,
    producers: EventProducers,
}

impl<B, C> Debug for CardPaymentApi<B, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CardPaymentApi")
    }
}

impl<B, C> CardPaymentApi<B, C> {
    pub fn new(db: B, gateway: C, producers: EventProducers) -> Self {
        Self { db, gateway, producers }
    }
}

impl<B, C> CardPaymentApi<B, C>
where
    B: PaymentStore,
    C: CardPaymentGateway,
{
    pub fn is_configured(&self) -> bool {
        self.gateway.is_configured()
    }

    /// Creates a payment intent for the order total. `amount` is what the client believes it is paying and must equal
    /// the order total.
    pub async fn create_intent(&self, order_id: &OrderId, amount: Kes) -> Result<CardIntent, PaymentFlowError> {
        if !self.gateway.is_configured() {
            error!("💳️ A card payment was requested for order {order_id}, but card payments are not configured");
            return Err(GatewayError::Unconfigured("Card payments are not enabled".into()).into());
        }
        let order = self.fetch_order(order_id).await?;
        if order.is_paid() {
            return Err(PaymentFlowError::AlreadyPaid(order_id.clone()));
        }
        if amount != order.total_price {
            return Err(PaymentFlowError::InvalidAmount(format!(
                "The requested amount ({amount}) does not match the order total ({})",
                order.total_price
            )));
        }
        let intent = self.gateway.create_intent(order.total_price, &order.currency, order_id).await.map_err(|e| {
            warn!("💳️ Could not create a card payment intent for order {order_id}. {e}");
            e
        })?;
        self.db.record_card_intent(order_id, &intent.id).await?;
        info!("💳️ Card payment intent {} created for order {order_id} ({})", intent.id, order.total_price);
        Ok(intent)
    }

    /// Marks the order as paid, once the card processor confirms the intent succeeded.
    ///
    /// The intent is fetched from the processor rather than trusting the client. It must have succeeded, for exactly
    /// the order total and currency, and (if the processor echoes it) for this order. Confirming an order that was
    /// already paid with the same intent returns the order unchanged.
    pub async fn confirm(&self, order_id: &OrderId, intent_id: &str) -> Result<Order, PaymentFlowError> {
        let order = self.fetch_order(order_id).await?;
        if order.is_paid() {
            return paid_with_intent(order, intent_id);
        }
        let intent = self.gateway.fetch_intent(intent_id).await.map_err(|e| {
            warn!("💳️ Could not retrieve card payment intent {intent_id} for order {order_id}. {e}");
            e
        })?;
        if intent.status != CardIntentStatus::Succeeded {
            info!("💳️ Card payment {intent_id} for order {order_id} has not succeeded. Status: {}", intent.status);
            return Err(PaymentFlowError::CardNotSucceeded(intent.status.to_string()));
        }
        let expected = order.total_price;
        if intent.amount_minor != expected.to_minor_units() {
            let received = Kes::from(intent.amount_minor / duka_common::MINOR_UNITS_PER_KES);
            warn!(
                "💳️ Card payment {intent_id} was for {} cents, but order {order_id} totals {expected}",
                intent.amount_minor
            );
            return Err(PaymentFlowError::AmountMismatch { expected, received });
        }
        if !intent.currency.eq_ignore_ascii_case(&order.currency) {
            warn!("💳️ Card payment {intent_id} is in {}, but order {order_id} is in {}", intent.currency, order.currency);
            return Err(PaymentFlowError::Validation(format!(
                "The payment currency ({}) does not match the order currency ({})",
                intent.currency, order.currency
            )));
        }
        if let Some(intent_order) = intent.order_id.as_deref() {
            if intent_order != order_id.as_str() {
                warn!("💳️ Card payment {intent_id} was made for order {intent_order}, not {order_id}");
                return Err(PaymentFlowError::Validation(format!(
                    "Payment {intent_id} does not belong to order {order_id}"
                )));
            }
        }
        match self.db.mark_card_paid(order_id, intent_id, Utc::now()).await {
            Ok(order) => {
                info!("💳️ Order {order_id} has been paid by card ({intent_id})");
                self.call_order_paid_hook(&order).await;
                Ok(order)
            },
            Err(PaymentStoreError::AlreadyPaid(_)) => {
                let order = self.fetch_order(order_id).await?;
                paid_with_intent(order, intent_id)
            },
            Err(e) => Err(e.into()),
        }
    }

    async fn fetch_order(&self, order_id: &OrderId) -> Result<Order, PaymentFlowError> {
        self.db.fetch_order(order_id).await?.ok_or_else(|| PaymentFlowError::OrderNotFound(order_id.clone()))
    }

    async fn call_order_paid_hook(&self, order: &Order) {
        for emitter in &self.producers.order_paid_producer {
            debug!("💳️ Notifying order paid hook subscribers");
            let event = OrderPaidEvent::new(order.clone(), PaymentMethod::Card);
            emitter.publish(event).await;
        }
    }
}

fn paid_with_intent(order: Order, intent_id: &str) -> Result<Order, PaymentFlowError> {
    let same_intent = order.payment_method == Some(PaymentMethod::Card) &&
        order.card_transaction_ref.as_deref() == Some(intent_id);
    if same_intent {
        debug!("💳️ Order {} was already confirmed with {intent_id}", order.order_id);
        Ok(order)
    } else {
        Err(PaymentFlowError::AlreadyPaid(order.order_id))
    }
}
