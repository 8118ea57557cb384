//! Duka Payment Engine
//!
//! The Duka Payment Engine turns a placed order into a confirmed, paid one. It supports two independent and
//! asynchronous payment rails: mobile-money push payments, where the customer approves a prompt on their handset and
//! the network reports the result via a callback, and card payments using the payment-intent model.
//!
//! Whatever happens on either rail, an order is marked paid at most once, and a payment that the network reports is
//! never silently dropped.
//!
//! The library is divided into these sections:
//! 1. Backend contracts ([`mod@traits`]). The payment flows depend only on [`PaymentStore`], [`PushPaymentGateway`]
//!    and [`CardPaymentGateway`]. [`SqliteDatabase`] is the production store. The gateway implementations live with the
//!    server.
//! 2. The payment flows ([`OrderFlowApi`], [`PushPaymentApi`] and [`CardPaymentApi`]).
//! 3. Rate limiting for payment initiation ([`mod@rate_limit`]).
//! 4. Events ([`mod@events`]) emitted when orders are paid or payments fail, which other components can hook into.
mod sqlite;
mod tpe_api;

pub mod db_types;
pub mod events;
pub mod rate_limit;
pub mod traits;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDatabase;
pub use tpe_api::{
    card_payment_api::CardPaymentApi,
    errors::PaymentFlowError,
    order_flow_api::OrderFlowApi,
    payment_objects,
    push_payment_api::{PushPaymentApi, AMOUNT_TOLERANCE, CANCELLED_BY_USER, QUERY_RECEIPT_PREFIX},
};
pub use traits::{CardPaymentGateway, PaymentStore, PushPaymentGateway};
