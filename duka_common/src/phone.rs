//! Mobile number normalization for the push-payment network.
//!
//! The network only accepts subscriber numbers in international format without a leading `+`, e.g.
//! `254712345678`. Customers type numbers in all sorts of shapes, so [`normalize_phone`] accepts the common local
//! and international forms and rejects everything else before a payment request is ever sent.
use thiserror::Error;

pub const COUNTRY_CODE: &str = "254";

/// Network prefixes (the two digits following the country code) that can receive push-payment prompts.
pub const CARRIER_PREFIXES: [&str; 8] = ["70", "71", "72", "74", "75", "76", "79", "11"];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PhoneError {
    #[error("Invalid phone number: {0}")]
    InvalidPhone(String),
}

/// Normalizes a user-supplied phone number to the 12-digit `2547XXXXXXXX` / `2541XXXXXXXX` form.
///
/// All non-digit characters are removed first. Then:
/// * 10 digits with a leading `0` have the zero replaced by the country code,
/// * 9 digits starting with `7` or `1` are prefixed with the country code,
/// * 12 digits starting with the country code are kept as they are.
///
/// The result must carry a known carrier prefix. The function is idempotent.
pub fn normalize_phone(raw: &str) -> Result<String, PhoneError> {
    let digits = raw.chars().filter(char::is_ascii_digit).collect::<String>();
    let normalized = match digits.len() {
        10 if digits.starts_with('0') => format!("{COUNTRY_CODE}{}", &digits[1..]),
        9 if digits.starts_with('7') || digits.starts_with('1') => format!("{COUNTRY_CODE}{digits}"),
        12 if digits.starts_with(COUNTRY_CODE) => digits,
        _ => return Err(PhoneError::InvalidPhone(raw.to_string())),
    };
    let prefix = &normalized[3..5];
    if !CARRIER_PREFIXES.contains(&prefix) {
        return Err(PhoneError::InvalidPhone(raw.to_string()));
    }
    Ok(normalized)
}

/// Masks all but the last three digits of a number, for logging.
pub fn mask_phone(phone: &str) -> String {
    let n = phone.len();
    if n <= 3 {
        return "*".repeat(n);
    }
    format!("{}{}", "*".repeat(n - 3), &phone[n - 3..])
}
