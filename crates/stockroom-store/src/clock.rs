//! Wall-clock helpers shared by the store backends.

use std::time::Duration;

/// Current time as unix milliseconds.
pub(crate) fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Expiry of a lease taken at `now` for `ttl`, saturating at `i64::MAX`.
pub(crate) fn lease_expiry(now: i64, ttl: Duration) -> i64 {
    now.saturating_add(i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX))
}
