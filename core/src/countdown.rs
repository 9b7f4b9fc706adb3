//! Per-second countdown ending in a sweep.
//!
//! [`CountdownState::advance`] is the pure transition function. The
//! [`CountdownEngine`] wraps it with the side effects: notices, the sweep
//! call and the per-second timer handle.

use tracing::{info, warn};

use crate::host::{Notifier, Sweeper, TimerHandle};
use crate::notice::Notice;

/// Countdown lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountdownState {
    /// Ticking; the value is the seconds left before the sweep.
    Running(u32),
    /// Reached zero and ran the sweep.
    Fired,
    /// Stopped before reaching zero.
    Cancelled,
}

/// Side effect requested by a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Announce `n` seconds remaining.
    Announce(u32),
    /// Run the sweep.
    Sweep,
    /// Terminal state; nothing to do.
    Ignore,
}

impl CountdownState {
    /// Next state and the effect to perform for one tick.
    pub fn advance(self) -> (CountdownState, Transition) {
        match self {
            CountdownState::Running(0) => (CountdownState::Fired, Transition::Sweep),
            CountdownState::Running(n) => (CountdownState::Running(n - 1), Transition::Announce(n)),
            terminal => (terminal, Transition::Ignore),
        }
    }

    /// `true` for `Fired` and `Cancelled`.
    pub fn is_terminal(self) -> bool {
        !matches!(self, CountdownState::Running(_))
    }
}

/// What a call to [`CountdownEngine::tick`] did.
#[derive(Debug, PartialEq, Eq)]
pub enum TickOutcome {
    /// Emitted a countdown notice for `n`.
    Announced(u32),
    /// Ran the sweep; `Some(count)` on success, `None` if the sweep failed.
    Swept(Option<usize>),
    /// Engine was already finished.
    Inert,
}

/// One countdown run. Owns its per-second timer.
pub struct CountdownEngine {
    id: u64,
    state: CountdownState,
    timer: Option<TimerHandle>,
}

impl CountdownEngine {
    /// New engine at `Running(start)`, not yet attached to a timer.
    pub fn new(id: u64, start: u32) -> Self {
        Self { id, state: CountdownState::Running(start), timer: None }
    }

    /// Identifier used by timer callbacks to find their engine.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Current state.
    pub fn state(&self) -> CountdownState {
        self.state
    }

    /// Take ownership of the per-second timer driving this engine.
    pub fn attach(&mut self, timer: TimerHandle) {
        if self.state.is_terminal() {
            timer.cancel();
            return;
        }
        if let Some(old) = self.timer.replace(timer) {
            old.cancel();
        }
    }

    /// Handle one per-second tick.
    pub fn tick(&mut self, sweeper: &dyn Sweeper, notifier: &dyn Notifier) -> TickOutcome {
        let (next, transition) = self.state.advance();
        self.state = next;
        match transition {
            Transition::Announce(n) => {
                notifier.notify(&Notice::CountdownTick { seconds_remaining: n });
                TickOutcome::Announced(n)
            }
            Transition::Sweep => {
                self.release_timer();
                match sweeper.sweep() {
                    Ok(removed) => {
                        info!(countdown = self.id, removed, "sweep complete");
                        notifier.notify(&Notice::SweepComplete { removed });
                        TickOutcome::Swept(Some(removed))
                    }
                    Err(e) => {
                        warn!(countdown = self.id, "sweep failed: {e:#}");
                        TickOutcome::Swept(None)
                    }
                }
            }
            Transition::Ignore => TickOutcome::Inert,
        }
    }

    /// Stop a running countdown. Returns `false` if it had already finished.
    pub fn cancel(&mut self) -> bool {
        if self.state.is_terminal() {
            return false;
        }
        self.state = CountdownState::Cancelled;
        self.release_timer();
        true
    }

    fn release_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.cancel();
        }
    }
}

impl Drop for CountdownEngine {
    fn drop(&mut self) {
        self.release_timer();
    }
}
