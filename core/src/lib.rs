#![deny(missing_docs)]
//! sweep_core: periodic dropped-item sweeps with a warning countdown.
//!
//! The scheduling core talks to its environment only through the traits in
//! [`host`], so it runs the same under the tokio daemon and the hand-driven
//! [`manual::ManualHost`] used by tests and dry runs.

/// Settings, their TOML persistence and per-app directories.
pub mod cfg;
/// Fire-time arithmetic.
pub mod clock;
/// Per-second countdown state machine.
pub mod countdown;
/// Error taxonomy and informational outcomes.
pub mod error;
/// Seams to the hosting environment (clock, timers, sweep, notices).
pub mod host;
/// `[Nd][Nh][Nm]` interval parsing and formatting.
pub mod interval;
/// Tracing/log initialization helpers.
pub mod logx;
/// Hand-driven clock and timer host.
pub mod manual;
/// Message catalog for rendering notices and replies.
pub mod messages;
/// Notices delivered to observers and the status snapshot.
pub mod notice;
/// The auto-clear scheduler.
pub mod scheduler;

pub use error::{AdminOutcome, ClearError};
pub use scheduler::{AutoClearScheduler, Host, ScheduleConfig};
