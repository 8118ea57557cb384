//! # Duka payment server
//! This crate hosts the HTTP server for Duka payments. It is responsible for:
//! * Accepting orders from the storefront.
//! * Starting, resending and cancelling M-Pesa push payment requests, with per-client rate limiting.
//! * Receiving payment results from the M-Pesa network, and querying it on demand when a result goes missing.
//! * Creating and confirming Stripe card payment intents.
//! * Reporting the payment status of orders to clients that are waiting for a payment to complete.
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more information.
//!
//! ## Routes
//! * `GET  /health`
//! * `POST /orders`
//! * `GET  /orders/{order_id}/payment-status`
//! * `GET  /orders/{order_id}/payment-attempts`
//! * `POST /payments/push/initiate`, `/payments/push/resend`, `/payments/push/cancel`, `/payments/push/query`
//! * `POST /payments/push/callback`
//! * `POST /payments/card/create-intent`, `/payments/card/confirm`
pub mod cli;
pub mod config;
pub mod data_objects;
pub mod errors;
pub mod expiry_worker;
pub mod helpers;
pub mod integrations;
pub mod routes;
pub mod server;

#[cfg(test)]
mod endpoint_tests;
