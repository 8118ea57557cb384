//! # M-Pesa tools
//!
//! A thin, strongly typed client for the parts of the Safaricom Daraja API that a storefront needs to take
//! mobile-money payments:
//!
//! * OAuth access tokens ([`MpesaApi::access_token`]), cached until shortly before they expire.
//! * STK push requests ([`MpesaApi::stk_push`]), which prompt the customer's handset for their PIN.
//! * STK push status queries ([`MpesaApi::stk_query`]).
//! * Parsing and validation of the asynchronous result callbacks ([`StkCallbackEnvelope`]).
//!
//! The client never changes any order state. It reports what the network said, and refuses to interpret a partial
//! or malformed response as a success.
mod api;
mod callback;
mod config;
mod data_objects;
mod error;

pub mod helpers;

pub use api::MpesaApi;
pub use callback::{CallbackDetails, StkCallback, StkCallbackEnvelope, ValidatedCallback};
pub use config::{MpesaConfig, MpesaEnvironment};
pub use data_objects::{
    result_codes,
    AccessTokenResponse,
    DeclineReason,
    StkPushAccepted,
    StkPushRequest,
    StkPushResponse,
    StkQueryRequest,
    StkQueryResponse,
    StkQueryResult,
};
pub use error::MpesaApiError;
