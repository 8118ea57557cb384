//! `SqliteDatabase` is a concrete implementation of a Duka payment engine backend.
//!
//! Unsurprisingly, it uses SQLite as the backend and implements [`PaymentStore`].
use std::fmt::Debug;

use chrono::{DateTime, Utc};
use log::*;
use sqlx::{migrate::MigrateError, SqliteConnection, SqlitePool};

use super::db::{attempts, db_url, new_pool, orders, run_migrations};
use crate::{
    db_types::{
        AttemptStatus,
        MobileMoneyStatus,
        NewOrder,
        NewPaymentAttempt,
        Order,
        OrderId,
        OrderItem,
        PaymentAttempt,
    },
    traits::{MobileMoneyUpdate, PaymentStore, PaymentStoreError},
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl PaymentStore for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }

    async fn insert_order(&self, order: NewOrder) -> Result<(Order, bool), PaymentStoreError> {
        let mut tx = self.pool.begin().await?;
        let order_id = order.order_id.clone();
        let (order, inserted) = orders::idempotent_insert(order, &mut tx).await?;
        tx.commit().await?;
        if inserted {
            debug!("🗃️ Order {order_id} has been saved in the DB with id {}", order.id);
        } else {
            debug!("🗃️ Order {order_id} already exists. Nothing was changed.");
        }
        Ok((order, inserted))
    }

    async fn fetch_order(&self, order_id: &OrderId) -> Result<Option<Order>, PaymentStoreError> {
        let mut conn = self.pool.acquire().await?;
        let order = orders::fetch_order_by_order_id(order_id, &mut conn).await?;
        Ok(order)
    }

    async fn fetch_order_items(&self, order_id: &OrderId) -> Result<Vec<OrderItem>, PaymentStoreError> {
        let mut conn = self.pool.acquire().await?;
        let items = orders::fetch_order_items(order_id, &mut conn).await?;
        Ok(items)
    }

    async fn fetch_order_by_checkout_request_id(
        &self,
        checkout_request_id: &str,
    ) -> Result<Option<Order>, PaymentStoreError> {
        let mut conn = self.pool.acquire().await?;
        let order = orders::fetch_order_by_checkout_request_id(checkout_request_id, &mut conn).await?;
        Ok(order)
    }

    async fn fetch_attempt(&self, checkout_request_id: &str) -> Result<Option<PaymentAttempt>, PaymentStoreError> {
        let mut conn = self.pool.acquire().await?;
        let attempt = attempts::fetch_attempt(checkout_request_id, &mut conn).await?;
        Ok(attempt)
    }

    async fn fetch_attempts_for_order(&self, order_id: &OrderId) -> Result<Vec<PaymentAttempt>, PaymentStoreError> {
        let mut conn = self.pool.acquire().await?;
        let attempts = attempts::fetch_attempts_for_order(order_id, &mut conn).await?;
        Ok(attempts)
    }

    /// Takes a newly accepted push request, and in a single atomic transaction,
    /// * moves the order to `Initiated` (compare-and-set against `expected`) with the new request identifiers,
    /// * supersedes any open attempts for the order,
    /// * stores the new attempt.
    async fn record_push_initiated(
        &self,
        expected: Option<MobileMoneyStatus>,
        attempt: NewPaymentAttempt,
    ) -> Result<Order, PaymentStoreError> {
        let order_id = attempt.order_id.clone();
        check_transition(&order_id, expected, MobileMoneyStatus::Initiated)?;
        let mut tx = self.pool.begin().await?;
        let updated = orders::set_push_initiated(
            &order_id,
            expected,
            &attempt.merchant_request_id,
            &attempt.checkout_request_id,
            &attempt.phone,
            expected.is_some(),
            &mut tx,
        )
        .await?;
        let order = match updated {
            Some(order) => order,
            None => return Err(explain_failed_update(&order_id, &mut tx).await),
        };
        let superseded = attempts::supersede_open_attempts(&order_id, &mut tx).await?;
        let attempt = attempts::insert_attempt(attempt, &mut tx).await?;
        tx.commit().await?;
        debug!(
            "🗃️ Push request {} recorded for order {order_id}. {superseded} earlier request(s) superseded. Retry count: \
             {}",
            attempt.checkout_request_id, order.payment_retry_count
        );
        Ok(order)
    }

    async fn update_mobile_money_status(
        &self,
        order_id: &OrderId,
        expected: Option<MobileMoneyStatus>,
        new: MobileMoneyStatus,
        update: MobileMoneyUpdate,
    ) -> Result<Order, PaymentStoreError> {
        check_transition(order_id, expected, new)?;
        if new == MobileMoneyStatus::Paid {
            let has_receipt = update.receipt_number.as_ref().map(|r| !r.trim().is_empty()).unwrap_or(false);
            if !has_receipt || update.paid_at.is_none() {
                return Err(PaymentStoreError::MissingReceipt(order_id.clone()));
            }
        }
        let mut conn = self.pool.acquire().await?;
        match orders::update_push_status(order_id, expected, new, update, &mut conn).await? {
            Some(order) => {
                let from = expected.map(|s| s.to_string()).unwrap_or_else(|| "none".into());
                debug!("🗃️ Push status of order {order_id} changed from {from} to {new}");
                Ok(order)
            },
            None => Err(explain_failed_update(order_id, &mut conn).await),
        }
    }

    async fn replace_receipt_number(
        &self,
        order_id: &OrderId,
        provisional: &str,
        receipt_number: &str,
    ) -> Result<Option<Order>, PaymentStoreError> {
        let mut conn = self.pool.acquire().await?;
        let order = orders::replace_receipt_number(order_id, provisional, receipt_number, &mut conn).await?;
        if order.is_some() {
            debug!("🗃️ Provisional receipt {provisional} for order {order_id} replaced with {receipt_number}");
        }
        Ok(order)
    }

    async fn update_attempt_status(
        &self,
        checkout_request_id: &str,
        status: AttemptStatus,
        result_code: Option<i64>,
        result_desc: Option<String>,
    ) -> Result<Option<PaymentAttempt>, PaymentStoreError> {
        let mut conn = self.pool.acquire().await?;
        let attempt =
            attempts::update_attempt_status(checkout_request_id, status, result_code, result_desc, &mut conn).await?;
        if attempt.is_none() {
            debug!("🗃️ Checkout request {checkout_request_id} has no attempt that can still change");
        }
        Ok(attempt)
    }

    async fn record_card_intent(&self, order_id: &OrderId, intent_id: &str) -> Result<Order, PaymentStoreError> {
        let mut conn = self.pool.acquire().await?;
        match orders::set_card_intent(order_id, intent_id, &mut conn).await? {
            Some(order) => {
                debug!("🗃️ Card intent {intent_id} linked to order {order_id}");
                Ok(order)
            },
            None => Err(explain_failed_update(order_id, &mut conn).await),
        }
    }

    async fn mark_card_paid(
        &self,
        order_id: &OrderId,
        intent_id: &str,
        paid_at: DateTime<Utc>,
    ) -> Result<Order, PaymentStoreError> {
        let mut conn = self.pool.acquire().await?;
        match orders::set_card_paid(order_id, intent_id, paid_at, &mut conn).await? {
            Some(order) => {
                debug!("🗃️ Order {order_id} marked as paid by card ({intent_id})");
                Ok(order)
            },
            None => Err(explain_failed_update(order_id, &mut conn).await),
        }
    }
}

fn check_transition(
    order_id: &OrderId,
    from: Option<MobileMoneyStatus>,
    to: MobileMoneyStatus,
) -> Result<(), PaymentStoreError> {
    if MobileMoneyStatus::can_transition(from, to) {
        Ok(())
    } else {
        let from = from.map(|s| s.to_string()).unwrap_or_else(|| "none".into());
        Err(PaymentStoreError::IllegalTransition { order_id: order_id.clone(), from, to })
    }
}

/// A compare-and-set update matched no rows. Work out why.
async fn explain_failed_update(order_id: &OrderId, conn: &mut SqliteConnection) -> PaymentStoreError {
    match orders::fetch_order_by_order_id(order_id, conn).await {
        Ok(None) => PaymentStoreError::OrderNotFound(order_id.clone()),
        Ok(Some(order)) if order.is_paid() => PaymentStoreError::AlreadyPaid(order_id.clone()),
        Ok(Some(_)) => PaymentStoreError::StatusChanged(order_id.clone()),
        Err(e) => PaymentStoreError::from(e),
    }
}

impl SqliteDatabase {
    /// Creates a new database API object
    pub async fn new(max_connections: u32) -> Result<Self, sqlx::Error> {
        let url = db_url();
        SqliteDatabase::new_with_url(url.as_str(), max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        trace!("🗃️ Creating new database connection pool with url {url}");
        let pool = new_pool(url, max_connections).await?;
        let url = url.to_string();
        Ok(Self { url, pool })
    }

    /// Returns a reference to the database connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn migrate(&self) -> Result<(), MigrateError> {
        run_migrations(&self.pool).await
    }

    pub async fn close(&mut self) -> Result<(), sqlx::Error> {
        self.pool.close().await;
        Ok(())
    }
}
