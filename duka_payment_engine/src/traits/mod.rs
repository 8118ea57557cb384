//! # Backend contracts
//!
//! This module defines the interfaces that the payment engine depends on. None of the flows in [`crate::tpe_api`]
//! know which database, mobile-money network or card processor sits behind them.
//!
//! * [`PaymentStore`] is the only write path to order payment state. Implementations must enforce the
//!   [`crate::db_types::MobileMoneyStatus`] transition table and perform terminal transitions as compare-and-set
//!   operations.
//! * [`PushPaymentGateway`] sends push payment prompts to a customer's handset and queries their outcome.
//! * [`CardPaymentGateway`] creates and retrieves card payment intents.
mod data_objects;
mod gateways;
mod payment_store;

pub use data_objects::{CardIntent, CardIntentStatus, PushAccepted, PushCallback, PushPaymentDetails, PushQueryResult};
pub use gateways::{CardPaymentGateway, GatewayError, PushPaymentGateway};
pub use payment_store::{MobileMoneyUpdate, PaymentStore, PaymentStoreError};
