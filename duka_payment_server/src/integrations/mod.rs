//! Adapters that plug the provider clients into the payment engine's gateway traits.
pub mod mpesa;
pub mod stripe;
