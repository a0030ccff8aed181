//! Wall-clock helpers expressed in milliseconds since the Unix epoch.

use std::time::{SystemTime, UNIX_EPOCH};

/// Milliseconds in one day.
pub const DAY_MS: u128 = 86_400_000;

/// Current time in milliseconds since epoch. Returns 0 if the system clock is
/// set before the epoch.
#[must_use]
pub fn now_ms() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0)
}

/// Absolute expiry timestamp `days` from `from_ms`.
#[must_use]
pub const fn expiry_after_days(from_ms: u128, days: u32) -> u128 {
    from_ms + (days as u128) * DAY_MS
}
