use serde::Serialize;

/// Snapshot returned by `AutoClearScheduler::status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusReport {
    /// Persisted `auto-clear.enabled` flag.
    pub enabled: bool,
    /// Whether the repeating timer is armed.
    pub running: bool,
    /// Configured interval in seconds; 0 when no valid interval is set.
    pub interval_secs: u64,
    /// Configured countdown length in seconds.
    pub countdown_lead_secs: u32,
    /// Seconds until the next sweep, `None` when disabled or not armed.
    pub next_fire_in_secs: Option<u64>,
}

/// Something observers are told about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// A sweep is `seconds_remaining` seconds away.
    CountdownTick {
        /// Seconds until the sweep.
        seconds_remaining: u32,
    },
    /// A sweep finished.
    SweepComplete {
        /// Objects removed.
        removed: usize,
    },
    /// Current schedule status.
    Status(StatusReport),
}

impl Notice {
    /// Message catalog key used to render this notice.
    pub fn message_key(&self) -> &'static str {
        match self {
            Notice::CountdownTick { .. } => "clear-countdown",
            Notice::SweepComplete { .. } => "clear-success",
            Notice::Status(report) if report.next_fire_in_secs.is_some() => "status-enabled",
            Notice::Status(_) => "status-disabled",
        }
    }

    /// Placeholder values substituted into the message template.
    pub fn placeholders(&self) -> Vec<(&'static str, String)> {
        match self {
            Notice::CountdownTick { seconds_remaining } => vec![("seconds", seconds_remaining.to_string())],
            Notice::SweepComplete { removed } => vec![("count", removed.to_string())],
            Notice::Status(report) => vec![(
                "time",
                crate::interval::format_remaining(report.next_fire_in_secs),
            )],
        }
    }
}
