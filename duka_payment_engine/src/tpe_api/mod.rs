//! # Duka payment engine public API
//!
//! The `tpe_api` module exposes the programmatic API for the payment engine. Each API is generic over the backends it
//! needs, so the server wires in SQLite and the real gateways, while tests can wire in anything that implements the
//! traits in [`crate::traits`].
//!
//! * [`order_flow_api`] accepts new orders and reports their payment status.
//! * [`push_payment_api`] drives mobile-money push payments: initiate, resend, cancel, status queries and the
//!   network's result callbacks.
//! * [`card_payment_api`] creates card payment intents and confirms them against the card processor.
//!
//! # API usage
//!
//! ```rust,ignore
//! use duka_payment_engine::{events::EventProducers, PushPaymentApi, SqliteDatabase};
//! let db = SqliteDatabase::new_with_url(...).await?;
//! let api = PushPaymentApi::new(db, my_gateway, EventProducers::default());
//! let request = api.initiate(&"1001".into(), "0712345678").await?;
//! ```

pub mod card_payment_api;
pub mod errors;
pub mod order_flow_api;
pub mod payment_objects;
pub mod push_payment_api;
