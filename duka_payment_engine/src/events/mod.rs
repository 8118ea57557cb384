//! Payment events.
//!
//! The payment flows publish an event whenever an order is paid or a push payment fails. Anything that needs to react
//! (receipts, stock reservation, audit logs) subscribes via [`EventHooks`] without the flows knowing about it.
mod channel;
mod event_types;
mod hooks;

pub use channel::{EventPublisher, Handler, HookDispatcher, PaymentEvent};
pub use event_types::*;
pub use hooks::{EventHandlers, EventHooks, EventProducers};
