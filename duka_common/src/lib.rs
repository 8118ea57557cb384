mod helpers;
mod kes;
mod secret;

pub mod op;
pub mod phone;

pub use helpers::parse_boolean_flag;
pub use kes::{Kes, KesConversionError, KES_CURRENCY_CODE, KES_CURRENCY_CODE_LOWER, MINOR_UNITS_PER_KES};
pub use phone::{normalize_phone, PhoneError};
pub use secret::Secret;
