use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use sweep_core::host::{Cancellable, Clock, TimerCallback, TimerHandle, TimerHost};
use sweep_core::ClearError;
use tokio::runtime::Handle;
use tokio::task::AbortHandle;
use tokio::time::{interval_at, sleep_until, Instant, MissedTickBehavior};
use tracing::trace;

/// Clock reading tokio's time source (pausable in tests).
pub struct TokioClock;

impl Clock for TokioClock {
    fn now(&self) -> std::time::Instant {
        Instant::now().into_std()
    }
}

/// Timer host that runs each timer as a tokio task.
pub struct TokioTimers {
    handle: Handle,
}

struct TokioTimer {
    cancelled: Arc<AtomicBool>,
    task: AbortHandle,
}

impl Cancellable for TokioTimer {
    fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        self.task.abort();
    }
}

impl TokioTimers {
    /// Bind to the runtime of the calling context.
    pub fn current() -> Result<Self, ClearError> {
        let handle = Handle::try_current().map_err(|e| ClearError::HostScheduling(e.to_string()))?;
        Ok(Self { handle })
    }

    fn arm(&self, delay: Duration, period: Option<Duration>, mut callback: TimerCallback) -> Result<TimerHandle, ClearError> {
        if period.is_some_and(|p| p.is_zero()) {
            return Err(ClearError::HostScheduling("timer period must be non-zero".to_string()));
        }

        let cancelled = Arc::new(AtomicBool::new(false));
        let flag = cancelled.clone();
        let start = Instant::now()
            .checked_add(delay)
            .ok_or_else(|| ClearError::HostScheduling(format!("timer delay {delay:?} out of range")))?;

        let task = self.handle.spawn(async move {
            match period {
                Some(period) => {
                    let mut ticker = interval_at(start, period);
                    // A late tick shifts the cadence; it is never dropped or doubled.
                    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                    loop {
                        ticker.tick().await;
                        if flag.load(Ordering::SeqCst) {
                            break;
                        }
                        callback();
                    }
                }
                None => {
                    sleep_until(start).await;
                    if !flag.load(Ordering::SeqCst) {
                        callback();
                    }
                }
            }
            trace!("timer task finished");
        });

        Ok(Box::new(TokioTimer { cancelled, task: task.abort_handle() }))
    }
}

impl TimerHost for TokioTimers {
    fn schedule_repeating(
        &self,
        initial_delay: Duration,
        period: Duration,
        callback: TimerCallback,
    ) -> Result<TimerHandle, ClearError> {
        self.arm(initial_delay, Some(period), callback)
    }

    fn schedule_once(&self, delay: Duration, callback: TimerCallback) -> Result<TimerHandle, ClearError> {
        self.arm(delay, None, callback)
    }
}
