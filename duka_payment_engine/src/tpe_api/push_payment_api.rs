use std::fmt::Debug;

use chrono::Utc;
use duka_common::{normalize_phone, phone::mask_phone};
use log::*;

use crate::{
    db_types::{
        AttemptStatus,
        Kes,
        MobileMoneyStatus,
        NewPaymentAttempt,
        Order,
        OrderId,
        PaymentAttempt,
        PaymentMethod,
    },
    events::{EventProducers, OrderPaidEvent, PaymentFailedEvent},
    tpe_api::{
        errors::PaymentFlowError,
        payment_objects::{CallbackOutcome, PaymentStatusRecord, PushRequested},
    },
    traits::{MobileMoneyUpdate, PaymentStore, PaymentStoreError, PushCallback, PushPaymentGateway, PushQueryResult},
};

/// Receipt numbers stored for payments confirmed by a status query rather than a callback start with this prefix. The
/// real receipt replaces it when the callback arrives.
pub const QUERY_RECEIPT_PREFIX: &str = "query:";
pub const CANCELLED_BY_USER: &str = "cancelled by user";
/// The largest difference between the amount paid and the order total that still counts as a full payment.
pub const AMOUNT_TOLERANCE: u64 = 1;
/// How often a compare-and-set is retried after losing a race before giving up.
const MAX_STATUS_RETRIES: usize = 3;

/// `PushPaymentApi` drives mobile-money push payments: sending prompts to the customer's handset, resending and
/// cancelling them, and applying the results the network reports back.
///
/// The network reports results asynchronously and at least once, and may report results for requests that have since
/// been replaced by a resend. Every state change therefore goes through a compare-and-set on the order's current push
/// status, and a paid order is never touched again.
pub struct PushPaymentApi<B, G> {
    db: B,
    gateway: G,
    producers: EventProducers,
}

impl<B, G> Debug for PushPaymentApi<B, G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PushPaymentApi")
    }
}

impl<B, G> PushPaymentApi<B, G> {
    pub fn new(db: B, gateway: G, producers: EventProducers) -> Self {
        Self { db, gateway, producers }
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}

impl<B, G> PushPaymentApi<B, G>
where
    B: PaymentStore,
    G: PushPaymentGateway,
{
    /// Sends the first push request for an order, or a fresh one after an earlier request failed.
    ///
    /// The phone number is normalized before anything else happens, and the amount requested is always the order total.
    pub async fn initiate(&self, order_id: &OrderId, phone: &str) -> Result<PushRequested, PaymentFlowError> {
        let phone = normalize_phone(phone)?;
        let order = self.fetch_order(order_id).await?;
        if order.is_paid() {
            return Err(PaymentFlowError::AlreadyPaid(order_id.clone()));
        }
        match order.mpesa_status {
            None | Some(MobileMoneyStatus::Failed) => {},
            Some(status) => {
                return Err(PaymentFlowError::Validation(format!(
                    "A payment request for order {order_id} is already {status}. Resend it instead of starting a new \
                     one."
                )))
            },
        }
        self.send_request(order, phone).await
    }

    /// Sends a new push request to the phone used for the previous one. The previous request is superseded.
    pub async fn resend(&self, order_id: &OrderId) -> Result<PushRequested, PaymentFlowError> {
        let order = self.fetch_order(order_id).await?;
        if order.is_paid() {
            return Err(PaymentFlowError::AlreadyPaid(order_id.clone()));
        }
        match order.mpesa_status {
            Some(status) if status.is_resendable() => {},
            status => {
                return Err(PaymentFlowError::NotResendable { order_id: order_id.clone(), status: status_name(status) })
            },
        }
        let phone = order
            .mpesa_phone
            .clone()
            .filter(|p| !p.trim().is_empty())
            .ok_or_else(|| PaymentFlowError::MissingPhone(order_id.clone()))?;
        debug!("📲️ Resending payment request for order {order_id} (retry #{})", order.payment_retry_count + 1);
        self.send_request(order, phone).await
    }

    /// Stops tracking the order's push request and marks the payment as failed. The network is not contacted, so if
    /// the customer approves the prompt anyway, the result will still be applied when it arrives.
    pub async fn cancel(&self, order_id: &OrderId) -> Result<Order, PaymentFlowError> {
        let order = self.fetch_order(order_id).await?;
        let status = match order.mpesa_status {
            Some(s) if s.is_resendable() && !order.is_paid() => s,
            s => {
                let status = if order.is_paid() { "paid".to_string() } else { status_name(s) };
                return Err(PaymentFlowError::NotCancellable { order_id: order_id.clone(), status });
            },
        };
        let updated = self
            .db
            .update_mobile_money_status(
                order_id,
                Some(status),
                MobileMoneyStatus::Failed,
                MobileMoneyUpdate::failed(CANCELLED_BY_USER),
            )
            .await?;
        if let Some(checkout_request_id) = &order.mpesa_checkout_request_id {
            let open = self.db.fetch_attempt(checkout_request_id).await?.map(|a| a.status.is_open()).unwrap_or(false);
            if open {
                self.db
                    .update_attempt_status(
                        checkout_request_id,
                        AttemptStatus::Failed,
                        None,
                        Some(CANCELLED_BY_USER.to_string()),
                    )
                    .await?;
            }
        }
        info!("📲️ Payment request for order {order_id} cancelled by the customer");
        self.call_payment_failed_hook(&updated, CANCELLED_BY_USER).await;
        Ok(updated)
    }

    /// Applies a result notification from the network to its order.
    ///
    /// The order is found by its active request id, or failing that, by the attempt history. Then:
    /// * if the order is already paid, nothing changes (apart from swapping a provisional receipt for the real one),
    /// * a success whose amount differs from the order total by more than [`AMOUNT_TOLERANCE`] fails the order,
    /// * a success marks the order paid, even if it arrives for a superseded request or after the order was cancelled,
    /// * a failure marks the order failed, unless it is for a superseded request or the order has already failed (for
    ///   example because the customer cancelled it), in which case only the attempt history is updated.
    ///
    /// Delivering the same notification more than once is harmless.
    pub async fn process_callback(&self, callback: PushCallback) -> Result<CallbackOutcome, PaymentFlowError> {
        let checkout_request_id = callback.checkout_request_id.as_str();
        if callback.result_code == 0 && callback.details.is_none() {
            return Err(PaymentFlowError::Validation(format!(
                "Successful result for {checkout_request_id} carries no payment details"
            )));
        }
        let mut order = self
            .db
            .fetch_order_by_checkout_request_id(checkout_request_id)
            .await?
            .ok_or_else(|| PaymentFlowError::UnknownCheckoutRequest(checkout_request_id.to_string()))?;
        let order_id = order.order_id.clone();
        let mismatch = callback
            .details
            .as_ref()
            .filter(|d| callback.is_success() && d.amount.abs_diff(order.total_price) > AMOUNT_TOLERANCE)
            .map(|d| d.amount);
        let attempt_status =
            if callback.is_success() && mismatch.is_none() { AttemptStatus::Paid } else { AttemptStatus::Failed };
        self.db
            .update_attempt_status(
                checkout_request_id,
                attempt_status,
                Some(callback.result_code),
                Some(callback.result_desc.clone()),
            )
            .await?;

        for _ in 0..MAX_STATUS_RETRIES {
            if order.is_paid() {
                debug!("📲️ Order {order_id} is already paid. Result for {checkout_request_id} acknowledged.");
                let order = self.backfill_receipt(order, &callback).await?;
                return Ok(CallbackOutcome::AlreadyPaid(order));
            }
            let is_active = order.mpesa_checkout_request_id.as_deref() == Some(checkout_request_id);
            let result = match (&callback.details, mismatch) {
                (Some(_), Some(received)) if callback.is_success() => {
                    if !is_active {
                        warn!(
                            "📲️ Superseded request {checkout_request_id} for order {order_id} paid {received}, but \
                             the order total is {}. Leaving the order alone.",
                            order.total_price
                        );
                        return Ok(CallbackOutcome::Superseded {
                            order_id,
                            checkout_request_id: checkout_request_id.to_string(),
                        });
                    }
                    self.apply_amount_mismatch(&order, received).await
                },
                (Some(details), None) if callback.is_success() => {
                    if !is_active {
                        info!(
                            "📲️ Request {checkout_request_id} for order {order_id} was superseded, but the customer \
                             paid it. Applying the payment."
                        );
                    }
                    self.apply_payment(&order, &details.receipt_number).await.map(CallbackOutcome::Paid)
                },
                _ => {
                    if !is_active {
                        debug!(
                            "📲️ Ignoring failure of superseded request {checkout_request_id} for order {order_id}: {}",
                            callback.result_desc
                        );
                        return Ok(CallbackOutcome::Superseded {
                            order_id,
                            checkout_request_id: checkout_request_id.to_string(),
                        });
                    }
                    if order.mpesa_status == Some(MobileMoneyStatus::Failed) {
                        debug!(
                            "📲️ Order {order_id} has already failed. Keeping its failure reason over: {}",
                            callback.result_desc
                        );
                        return Ok(CallbackOutcome::Failed(order));
                    }
                    self.apply_failure(&order, &callback.result_desc).await.map(CallbackOutcome::Failed)
                },
            };
            match result {
                Ok(outcome) => return Ok(outcome),
                Err(PaymentStoreError::StatusChanged(_)) | Err(PaymentStoreError::AlreadyPaid(_)) => {
                    debug!("📲️ Payment status of order {order_id} changed under us. Re-reading it.");
                    order = self.fetch_order(&order_id).await?;
                },
                Err(e) => return Err(e.into()),
            }
        }
        warn!("📲️ Gave up applying result for {checkout_request_id} after {MAX_STATUS_RETRIES} attempts");
        Err(PaymentFlowError::Store(PaymentStoreError::StatusChanged(order_id)))
    }

    /// Asks the network about the order's active request, and applies the answer as if it were a callback.
    ///
    /// A successful query carries no receipt, so the order is marked paid with a provisional receipt
    /// (`query:<checkout request id>`) that the real callback replaces later. A request that is still being processed
    /// is only marked `pending` in the attempt history.
    pub async fn reconcile_status(&self, order_id: &OrderId) -> Result<PaymentStatusRecord, PaymentFlowError> {
        let order = self.fetch_order(order_id).await?;
        if order.is_paid() {
            return Ok(PaymentStatusRecord::from(order));
        }
        let (status, checkout_request_id) = match (order.mpesa_status, order.mpesa_checkout_request_id.clone()) {
            (Some(status), Some(id)) => (status, id),
            _ => return Err(PaymentFlowError::NoActiveRequest(order_id.clone())),
        };
        let result = self.gateway.query_payment(&checkout_request_id).await.map_err(|e| {
            warn!("📲️ Status query for order {order_id} (request {checkout_request_id}) failed. {e}");
            e
        })?;
        trace!("📲️ Status query for {checkout_request_id}: {result:?}");
        let updated = match result {
            PushQueryResult::Processing => {
                // The order stays `initiated`, so the customer can still resend or cancel if no result ever arrives
                if status == MobileMoneyStatus::Initiated {
                    self.db
                        .update_attempt_status(&checkout_request_id, AttemptStatus::Pending, None, None)
                        .await?;
                    debug!("📲️ Request {checkout_request_id} for order {order_id} is still being processed");
                }
                order
            },
            PushQueryResult::Completed { result_code: 0, result_desc } => {
                self.db
                    .update_attempt_status(&checkout_request_id, AttemptStatus::Paid, Some(0), Some(result_desc))
                    .await?;
                let receipt = format!("{QUERY_RECEIPT_PREFIX}{checkout_request_id}");
                match self.apply_payment(&order, &receipt).await {
                    Ok(order) => order,
                    Err(PaymentStoreError::StatusChanged(_)) | Err(PaymentStoreError::AlreadyPaid(_)) => {
                        self.fetch_order(order_id).await?
                    },
                    Err(e) => return Err(e.into()),
                }
            },
            PushQueryResult::Completed { result_code, result_desc } => {
                self.db
                    .update_attempt_status(
                        &checkout_request_id,
                        AttemptStatus::Failed,
                        Some(result_code),
                        Some(result_desc.clone()),
                    )
                    .await?;
                if status == MobileMoneyStatus::Failed {
                    order
                } else {
                    match self.apply_failure(&order, &result_desc).await {
                        Ok(order) => order,
                        Err(PaymentStoreError::StatusChanged(_)) | Err(PaymentStoreError::AlreadyPaid(_)) => {
                            self.fetch_order(order_id).await?
                        },
                        Err(e) => return Err(e.into()),
                    }
                }
            },
        };
        Ok(PaymentStatusRecord::from(updated))
    }

    /// Every push request sent for the order, oldest first.
    pub async fn payment_attempts(&self, order_id: &OrderId) -> Result<Vec<PaymentAttempt>, PaymentFlowError> {
        let _ = self.fetch_order(order_id).await?;
        let attempts = self.db.fetch_attempts_for_order(order_id).await?;
        Ok(attempts)
    }

    async fn send_request(&self, order: Order, phone: String) -> Result<PushRequested, PaymentFlowError> {
        let order_id = order.order_id.clone();
        let description = format!("Payment for order {order_id}");
        let accepted = self
            .gateway
            .request_payment(&phone, order.total_price, order_id.as_str(), &description)
            .await
            .map_err(|e| {
                warn!("📲️ Payment request for order {order_id} to {} failed. {e}", mask_phone(&phone));
                e
            })?;
        let attempt = NewPaymentAttempt {
            order_id: order_id.clone(),
            checkout_request_id: accepted.checkout_request_id.clone(),
            merchant_request_id: accepted.merchant_request_id.clone(),
            phone: phone.clone(),
            amount: order.total_price,
        };
        let updated = self.db.record_push_initiated(order.mpesa_status, attempt).await.map_err(|e| {
            error!(
                "📲️ Payment request {} for order {order_id} was sent, but could not be recorded. {e}",
                accepted.checkout_request_id
            );
            e
        })?;
        info!(
            "📲️ Payment request {} for {} sent to {} for order {order_id}",
            accepted.checkout_request_id,
            order.total_price,
            mask_phone(&phone)
        );
        Ok(PushRequested {
            order: updated,
            merchant_request_id: accepted.merchant_request_id,
            checkout_request_id: accepted.checkout_request_id,
            customer_message: accepted.customer_message,
        })
    }

    async fn apply_payment(&self, order: &Order, receipt_number: &str) -> Result<Order, PaymentStoreError> {
        let update = MobileMoneyUpdate::paid(receipt_number, Utc::now());
        let paid = self
            .db
            .update_mobile_money_status(&order.order_id, order.mpesa_status, MobileMoneyStatus::Paid, update)
            .await?;
        info!("📲️ Order {} has been paid. Receipt: {receipt_number}", paid.order_id);
        self.call_order_paid_hook(&paid).await;
        Ok(paid)
    }

    async fn apply_failure(&self, order: &Order, reason: &str) -> Result<Order, PaymentStoreError> {
        let failed = self
            .db
            .update_mobile_money_status(
                &order.order_id,
                order.mpesa_status,
                MobileMoneyStatus::Failed,
                MobileMoneyUpdate::failed(reason),
            )
            .await?;
        info!("📲️ Payment for order {} failed. {reason}", failed.order_id);
        self.call_payment_failed_hook(&failed, reason).await;
        Ok(failed)
    }

    async fn apply_amount_mismatch(&self, order: &Order, received: Kes) -> Result<CallbackOutcome, PaymentStoreError> {
        let expected = order.total_price;
        warn!(
            "📲️ Amount mismatch for order {}: expected {expected}, but the customer paid {received}. Marking the \
             payment as failed.",
            order.order_id
        );
        let reason = format!("amount mismatch: expected {expected}, received {received}");
        let order = self.apply_failure(order, &reason).await?;
        Ok(CallbackOutcome::AmountMismatch { order, expected, received })
    }

    /// Replaces a provisional receipt, stored when a status query confirmed the payment, with the real one.
    async fn backfill_receipt(&self, order: Order, callback: &PushCallback) -> Result<Order, PaymentFlowError> {
        let provisional = match &order.mpesa_receipt_number {
            Some(r) if r.starts_with(QUERY_RECEIPT_PREFIX) => r.clone(),
            _ => return Ok(order),
        };
        let receipt = match callback.details.as_ref().filter(|_| callback.is_success()) {
            Some(details) => details.receipt_number.as_str(),
            None => return Ok(order),
        };
        let updated = self.db.replace_receipt_number(&order.order_id, &provisional, receipt).await?;
        Ok(updated.unwrap_or(order))
    }

    async fn fetch_order(&self, order_id: &OrderId) -> Result<Order, PaymentFlowError> {
        self.db.fetch_order(order_id).await?.ok_or_else(|| PaymentFlowError::OrderNotFound(order_id.clone()))
    }

    async fn call_order_paid_hook(&self, order: &Order) {
        for emitter in &self.producers.order_paid_producer {
            debug!("📲️ Notifying order paid hook subscribers");
            let event = OrderPaidEvent::new(order.clone(), PaymentMethod::MobileMoney);
            emitter.publish(event).await;
        }
    }

    async fn call_payment_failed_hook(&self, order: &Order, reason: &str) {
        for emitter in &self.producers.payment_failed_producer {
            debug!("📲️ Notifying payment failed hook subscribers");
            let event = PaymentFailedEvent::new(order.clone(), reason);
            emitter.publish(event).await;
        }
    }
}

fn status_name(status: Option<MobileMoneyStatus>) -> String {
    status.map(|s| s.to_string()).unwrap_or_else(|| "none".into())
}
