mod api;
mod config;
mod data_objects;
mod error;

pub use api::StripeApi;
pub use config::StripeConfig;
pub use data_objects::{PaymentIntent, PaymentIntentStatus, StripeErrorBody, StripeErrorDetail};
pub use error::StripeApiError;
