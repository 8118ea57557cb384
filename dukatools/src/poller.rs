//! Waits for a payment to settle by polling the order's payment status.
//!
//! The poller only ever reads. Terminal states are written by the server, when the network's callback arrives or a
//! status query succeeds, so an order that times out here can still be paid later.
use std::time::Duration;

use anyhow::Result;
use duka_payment_engine::{db_types::OrderId, payment_objects::PaymentStatusRecord};
use log::*;
use tokio::time::{sleep, Instant};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(300);

/// Anything that can report an order's payment status.
#[allow(async_fn_in_trait)]
pub trait StatusSource {
    async fn payment_status(&self, order_id: &OrderId) -> Result<PaymentStatusRecord>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollerConfig {
    pub interval: Duration,
    pub timeout: Duration,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self { interval: DEFAULT_POLL_INTERVAL, timeout: DEFAULT_POLL_TIMEOUT }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    Paid(PaymentStatusRecord),
    /// The payment failed. It can be resent or cancelled.
    Failed(PaymentStatusRecord),
    /// No result arrived in time. Carries the last status seen, if any poll succeeded.
    TimedOut(Option<PaymentStatusRecord>),
}

/// Polls `source` every `config.interval` until the order is paid or failed, or `config.timeout` has passed.
///
/// Errors from individual polls are logged and polling carries on. `on_update` is called with every status read.
pub async fn poll_until_settled<S, F>(
    source: &S,
    order_id: &OrderId,
    config: PollerConfig,
    mut on_update: F,
) -> PollOutcome
where
    S: StatusSource,
    F: FnMut(&PaymentStatusRecord),
{
    let deadline = Instant::now() + config.timeout;
    let mut last_seen = None;
    loop {
        match source.payment_status(order_id).await {
            Ok(record) => {
                on_update(&record);
                if record.is_paid() {
                    debug!("Order {order_id} is paid");
                    return PollOutcome::Paid(record);
                }
                if record.is_failed() {
                    debug!("Payment for order {order_id} failed. {:?}", record.failure_reason);
                    return PollOutcome::Failed(record);
                }
                trace!("Order {order_id} payment status: {:?}", record.mobile_money_status);
                last_seen = Some(record);
            },
            Err(e) => warn!("Could not fetch the payment status of order {order_id}. Will retry. {e}"),
        }
        let now = Instant::now();
        if now >= deadline {
            info!("Gave up waiting for order {order_id} after {:?}", config.timeout);
            return PollOutcome::TimedOut(last_seen);
        }
        sleep(config.interval.min(deadline - now)).await;
    }
}
