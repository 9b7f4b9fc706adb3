use thiserror::Error;

/// Errors reported by interval parsing, configuration and scheduling.
///
/// None of these are fatal: the worst outcome is that auto-clear stays
/// stopped until the next explicit `start()`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClearError {
    /// Text does not match `[Nd][Nh][Nm]`, is empty, or a component overflows.
    #[error("invalid interval format: {0:?}")]
    InvalidIntervalFormat(String),
    /// Interval parsed but is shorter than one minute.
    #[error("interval too short: {seconds}s (minimum 60s)")]
    IntervalTooShort {
        /// Parsed length in seconds.
        seconds: u64,
    },
    /// Countdown length is negative or does not fit in seconds.
    #[error("invalid countdown length: {0}")]
    InvalidCountdown(i64),
    /// Host scheduler refused to arm a timer.
    #[error("host scheduling failure: {0}")]
    HostScheduling(String),
    /// The host sweep returned an error.
    #[error("sweep failed: {0}")]
    SweepFailed(String),
    /// Settings could not be read or written.
    #[error("settings persistence failure: {0}")]
    Persistence(String),
}

/// Outcome of an administrative toggle that is not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminOutcome {
    /// The request changed state.
    Applied,
    /// `enable()` while already enabled; nothing changed.
    AlreadyEnabled,
    /// `disable()` while already disabled; nothing changed.
    AlreadyDisabled,
}
