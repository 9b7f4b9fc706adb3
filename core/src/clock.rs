//! Fire-time arithmetic for the auto-clear schedule.

use std::time::{Duration, Instant};

use crate::error::ClearError;

/// Delay before the repeating timer first fires.
///
/// The repeating timer starts the countdown, so it fires `countdown_lead`
/// seconds ahead of the sweep. A lead that does not fit inside the interval
/// defers by a whole interval instead of firing immediately.
pub fn first_fire_delay(interval_secs: u64, countdown_lead_secs: u64) -> u64 {
    if countdown_lead_secs >= interval_secs {
        interval_secs
    } else {
        interval_secs - countdown_lead_secs
    }
}

/// Reported instant of the next sweep, one interval after `now`.
///
/// Fails with `HostScheduling` when the instant is not representable.
pub fn next_fire_at(now: Instant, interval_secs: u64) -> Result<Instant, ClearError> {
    now.checked_add(Duration::from_secs(interval_secs))
        .ok_or_else(|| ClearError::HostScheduling(format!("next fire {interval_secs}s ahead is out of range")))
}

/// Whole seconds left until `next_fire_at`, or `None` when nothing is armed.
pub fn time_remaining(next_fire_at: Option<Instant>, now: Instant) -> Option<u64> {
    next_fire_at.map(|at| at.saturating_duration_since(now).as_secs())
}
