//! In-process host with a hand-driven clock.
//!
//! Timers only fire inside [`ManualHost::advance`], in due-time order, with
//! the clock set to each timer's due instant while its callback runs. Used by
//! the tests and by `sweepctl simulate`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use crate::error::ClearError;
use crate::host::{Cancellable, Clock, TimerCallback, TimerHandle, TimerHost};

struct Entry {
    id: u64,
    due: Instant,
    period: Option<Duration>,
    callback: Arc<Mutex<TimerCallback>>,
    cancelled: Arc<AtomicBool>,
}

struct Inner {
    now: Instant,
    next_id: u64,
    entries: Vec<Entry>,
    refuse_next: bool,
    armed_total: u64,
}

/// Manually advanced clock and timer host.
#[derive(Clone)]
pub struct ManualHost {
    inner: Arc<Mutex<Inner>>,
    origin: Instant,
}

struct ManualHandle(Arc<AtomicBool>);

impl Cancellable for ManualHandle {
    fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

impl Default for ManualHost {
    fn default() -> Self {
        Self::new()
    }
}

impl ManualHost {
    /// Host whose clock starts at the current instant.
    pub fn new() -> Self {
        let origin = Instant::now();
        let inner = Inner { now: origin, next_id: 0, entries: Vec::new(), refuse_next: false, armed_total: 0 };
        Self { inner: Arc::new(Mutex::new(inner)), origin }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Time elapsed since the host was created.
    pub fn elapsed(&self) -> Duration {
        self.lock().now.duration_since(self.origin)
    }

    /// Make the next `schedule_*` call fail.
    pub fn refuse_next_schedule(&self) {
        self.lock().refuse_next = true;
    }

    /// Timers armed and not cancelled.
    pub fn live_timers(&self) -> usize {
        self.lock().entries.iter().filter(|e| !e.cancelled.load(Ordering::SeqCst)).count()
    }

    /// Timers armed since creation, cancelled or not.
    pub fn armed_total(&self) -> u64 {
        self.lock().armed_total
    }

    /// Advance by whole seconds.
    pub fn advance_secs(&self, secs: u64) {
        self.advance(Duration::from_secs(secs));
    }

    /// Move the clock forward by `by`, firing every timer that falls due.
    pub fn advance(&self, by: Duration) {
        let target = self.lock().now + by;
        loop {
            let callback = {
                let mut inner = self.lock();
                inner.entries.retain(|e| !e.cancelled.load(Ordering::SeqCst));
                let Some(idx) = inner
                    .entries
                    .iter()
                    .enumerate()
                    .filter(|(_, e)| e.due <= target)
                    .min_by_key(|(_, e)| (e.due, e.id))
                    .map(|(idx, _)| idx)
                else {
                    break;
                };

                let due = inner.entries[idx].due;
                inner.now = inner.now.max(due);
                let fired = (inner.entries[idx].callback.clone(), inner.entries[idx].cancelled.clone());
                let period = inner.entries[idx].period;
                // A repeat past the representable range never falls due.
                match period.and_then(|p| due.checked_add(p)) {
                    Some(next) => inner.entries[idx].due = next,
                    None => {
                        inner.entries.remove(idx);
                    }
                }
                fired
            };

            let (callback, cancelled) = callback;
            // A callback that ran earlier in this pass may have cancelled it.
            if cancelled.load(Ordering::SeqCst) {
                continue;
            }
            let mut f = callback.lock().unwrap_or_else(PoisonError::into_inner);
            (*f)();
        }
        let mut inner = self.lock();
        inner.now = inner.now.max(target);
    }

    fn arm(&self, delay: Duration, period: Option<Duration>, callback: TimerCallback) -> Result<TimerHandle, ClearError> {
        let mut inner = self.lock();
        if std::mem::take(&mut inner.refuse_next) {
            return Err(ClearError::HostScheduling("manual host refused timer".to_string()));
        }
        if period == Some(Duration::ZERO) {
            return Err(ClearError::HostScheduling("zero timer period".to_string()));
        }
        let due = inner
            .now
            .checked_add(delay)
            .ok_or_else(|| ClearError::HostScheduling(format!("timer delay {delay:?} out of range")))?;
        let id = inner.next_id;
        inner.next_id += 1;
        inner.armed_total += 1;
        let cancelled = Arc::new(AtomicBool::new(false));
        inner.entries.push(Entry {
            id,
            due,
            period,
            callback: Arc::new(Mutex::new(callback)),
            cancelled: cancelled.clone(),
        });
        Ok(Box::new(ManualHandle(cancelled)))
    }
}

impl Clock for ManualHost {
    fn now(&self) -> Instant {
        self.lock().now
    }
}

impl TimerHost for ManualHost {
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
