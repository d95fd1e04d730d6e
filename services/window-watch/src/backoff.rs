//! Exponential backoff after consecutive failed cycles

use std::time::Duration;

/// Seconds to back off after `error_count` consecutive failures.
///
/// 0 for no errors, otherwise `base * 2^(error_count - 1)` capped at `max`.
pub fn backoff_seconds(error_count: u32, base: u64, max: u64) -> u64 {
    if error_count == 0 {
        return 0;
    }
    let factor = 1u64.checked_shl(error_count - 1).unwrap_or(u64::MAX);
    base.saturating_mul(factor).min(max)
}

/// Wait before the next cycle: the poll interval or the backoff, whichever is longer
pub fn next_wait(poll_interval_seconds: u64, error_count: u32, base: u64, max: u64) -> Duration {
    Duration::from_secs(poll_interval_seconds.max(backoff_seconds(error_count, base, max)))
}
