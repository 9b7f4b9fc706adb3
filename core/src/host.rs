use std::time::{Duration, Instant};

use crate::error::ClearError;
use crate::notice::Notice;

/// Callback run by the host each time a timer fires.
pub type TimerCallback = Box<dyn FnMut() + Send + 'static>;

/// Handle to an armed timer.
pub type TimerHandle = Box<dyn Cancellable>;

/// Time source used for fire-time estimates.
pub trait Clock: Send + Sync + 'static {
    /// Current instant.
    fn now(&self) -> Instant;
}

/// A timer that can be cancelled.
///
/// After `cancel` returns no further callback starts from this handle; a
/// callback already running finishes. Cancelling twice is a no-op.
pub trait Cancellable: Send {
    /// Stop the timer.
    fn cancel(&self);
}

/// Host scheduler that timer callbacks run on.
pub trait TimerHost: Send + Sync + 'static {
    /// Fire `callback` after `initial_delay`, then every `period`.
    fn schedule_repeating(
        &self,
        initial_delay: Duration,
        period: Duration,
        callback: TimerCallback,
    ) -> Result<TimerHandle, ClearError>;

    /// Fire `callback` once after `delay`.
    fn schedule_once(&self, delay: Duration, callback: TimerCallback) -> Result<TimerHandle, ClearError>;
}

/// Removes eligible objects from the world and reports how many went.
///
/// Must return `Ok(0)` when nothing is eligible.
pub trait Sweeper: Send + Sync + 'static {
    /// Run one sweep.
    fn sweep(&self) -> anyhow::Result<usize>;
}

/// Delivers notices to observers. Fire-and-forget.
pub trait Notifier: Send + Sync + 'static {
    /// Deliver `notice`.
    fn notify(&self, notice: &Notice);
}

impl<F> Sweeper for F
where
    F: Fn() -> anyhow::Result<usize> + Send + Sync + 'static,
{
    fn sweep(&self) -> anyhow::Result<usize> {
        self()
    }
}

impl<F> Notifier for F
where
    F: Fn(&Notice) + Send + Sync + 'static,
{
    fn notify(&self, notice: &Notice) {
        self(notice)
    }
}
