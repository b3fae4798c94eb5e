//! Transaction-time and valid-time clock helpers.
//!
//! All timestamps in the store are epoch milliseconds (`i64`). Open-ended
//! times (`deletedAt` of a live version, `validTo` of an open interval) use
//! the [`INFINITY_TIME`] sentinel rather than an `Option`, matching the
//! on-disk envelope format.

use chrono::Utc;

/// Sentinel for an open-ended `deletedAt` / `validTo`.
pub const INFINITY_TIME: i64 = -1;

/// Current wall-clock time in epoch milliseconds.
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Treat the infinity sentinel as +∞ when comparing valid-time bounds.
///
/// Returns true if `at < bound`, where `bound == INFINITY_TIME` means the
/// bound is never reached.
pub fn before_bound(at: i64, bound: i64) -> bool {
    bound == INFINITY_TIME || at < bound
}
