use chrono::{DateTime, FixedOffset, Utc};

/// East Africa Time, UTC+3. Daraja expects timestamps in local time.
const EAT_OFFSET_SECS: i32 = 3 * 3600;

/// Formats `now` as the `YYYYMMDDHHmmss` timestamp in East Africa Time that push and query requests carry.
pub fn daraja_timestamp(now: DateTime<Utc>) -> String {
    match FixedOffset::east_opt(EAT_OFFSET_SECS) {
        Some(eat) => now.with_timezone(&eat).format("%Y%m%d%H%M%S").to_string(),
        None => now.format("%Y%m%d%H%M%S").to_string(),
    }
}

/// The request password is `base64(short_code + passkey + timestamp)`.
pub fn stk_password(short_code: &str, passkey: &str, timestamp: &str) -> String {
    base64::encode(format!("{short_code}{passkey}{timestamp}"))
}
