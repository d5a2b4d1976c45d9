//! Timestamp utilities

use chrono::{DateTime, TimeZone, Utc};

/// Seconds between 1601-01-01 (WebKit/Windows FILETIME epoch) and 1970-01-01
const WEBKIT_EPOCH_OFFSET_SECS: i64 = 11_644_473_600;

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Convert Unix epoch milliseconds to a UTC timestamp
///
/// Returns `None` for values chrono cannot represent.
pub fn from_unix_millis(millis: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(millis).single()
}

/// Convert a WebKit timestamp (microseconds since 1601-01-01) to UTC
///
/// Browsers store bookmark `date_added` this way, as a decimal string.
/// Zero means "unknown" and yields `None`.
pub fn from_webkit_micros(micros: i64) -> Option<DateTime<Utc>> {
    if micros <= 0 {
        return None;
    }
    let unix_micros = micros.checked_sub(WEBKIT_EPOCH_OFFSET_SECS.checked_mul(1_000_000)?)?;
    let secs = unix_micros.div_euclid(1_000_000);
    let nanos = (unix_micros.rem_euclid(1_000_000) * 1_000) as u32;
    Utc.timestamp_opt(secs, nanos).single()
}
