//! Interval strings of the form `[Nd][Nh][Nm]`.
//!
//! Components are optional but their order is fixed; letters are matched
//! case-insensitively and whitespace between components is ignored so that
//! [`format`] output parses back to the same value.

use crate::error::ClearError;

/// Seconds in a minute.
pub const SECS_PER_MINUTE: u64 = 60;
/// Seconds in an hour.
pub const SECS_PER_HOUR: u64 = 60 * SECS_PER_MINUTE;
/// Seconds in a day.
pub const SECS_PER_DAY: u64 = 24 * SECS_PER_HOUR;
/// Shortest interval auto-clear accepts.
pub const MIN_INTERVAL_SECS: u64 = SECS_PER_MINUTE;
/// Longest interval `parse` accepts, 100 years. Longer totals cannot be
/// added to an `Instant` on every platform.
pub const MAX_INTERVAL_SECS: u64 = 36_500 * SECS_PER_DAY;

/// Rendering of a zero, negative or unknown duration.
pub const ZERO_DISPLAY: &str = "0m";

const UNITS: [(char, u64); 3] = [('d', SECS_PER_DAY), ('h', SECS_PER_HOUR), ('m', SECS_PER_MINUTE)];

/// Parse `text` into whole seconds.
///
/// Empty input, unknown units, out-of-order or repeated units and totals
/// above [`MAX_INTERVAL_SECS`] are `InvalidIntervalFormat`. A well-formed
/// string that adds up to zero is `IntervalTooShort { seconds: 0 }`.
pub fn parse(text: &str) -> Result<u64, ClearError> {
    let invalid = || ClearError::InvalidIntervalFormat(text.to_string());

    let mut rest = text.trim();
    if rest.is_empty() {
        return Err(invalid());
    }

    let mut total: u64 = 0;
    let mut next_unit = 0usize;
    while !rest.is_empty() {
        let digits_len = rest.bytes().take_while(u8::is_ascii_digit).count();
        if digits_len == 0 {
            return Err(invalid());
        }
        let (digits, tail) = rest.split_at(digits_len);

        let mut chars = tail.chars();
        let unit = chars.next().ok_or_else(invalid)?.to_ascii_lowercase();
        let idx = UNITS[next_unit..]
            .iter()
            .position(|(u, _)| *u == unit)
            .map(|p| p + next_unit)
            .ok_or_else(invalid)?;

        let value: u64 = digits.parse().map_err(|_| invalid())?;
        total = value
            .checked_mul(UNITS[idx].1)
            .and_then(|secs| total.checked_add(secs))
            .filter(|&sum| sum <= MAX_INTERVAL_SECS)
            .ok_or_else(invalid)?;

        next_unit = idx + 1;
        rest = chars.as_str().trim_start();
    }

    if total == 0 {
        return Err(ClearError::IntervalTooShort { seconds: 0 });
    }
    Ok(total)
}

/// Reject intervals below [`MIN_INTERVAL_SECS`].
pub fn check_minimum(seconds: u64) -> Result<u64, ClearError> {
    if seconds < MIN_INTERVAL_SECS {
        return Err(ClearError::IntervalTooShort { seconds });
    }
    Ok(seconds)
}

/// Parse and enforce the one-minute floor.
pub fn validate(text: &str) -> Result<u64, ClearError> {
    parse(text).and_then(check_minimum)
}

/// `true` when `text` parses and is at least one minute long.
pub fn is_valid_interval(text: &str) -> bool {
    validate(text).is_ok()
}

/// Render `total` seconds as e.g. `"1d 2h 30m"`.
///
/// Only nonzero units are listed. Seconds are shown only when there are no
/// days or hours. Zero renders as [`ZERO_DISPLAY`].
pub fn format(total: u64) -> String {
    let days = total / SECS_PER_DAY;
    let hours = (total % SECS_PER_DAY) / SECS_PER_HOUR;
    let minutes = (total % SECS_PER_HOUR) / SECS_PER_MINUTE;
    let seconds = total % SECS_PER_MINUTE;

    let mut parts = Vec::with_capacity(4);
    if days > 0 {
        parts.push(format!("{days}d"));
    }
    if hours > 0 {
        parts.push(format!("{hours}h"));
    }
    if minutes > 0 {
        parts.push(format!("{minutes}m"));
    }
    if seconds > 0 && days == 0 && hours == 0 {
        parts.push(format!("{seconds}s"));
    }

    if parts.is_empty() {
        ZERO_DISPLAY.to_string()
    } else {
        parts.join(" ")
    }
}

/// Like [`format`], with `None` (unknown/disabled) rendered as zero.
pub fn format_remaining(remaining: Option<u64>) -> String {
    remaining.map(format).unwrap_or_else(|| ZERO_DISPLAY.to_string())
}
