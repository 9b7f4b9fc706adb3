//! Auto-clear orchestration.
//!
//! One [`AutoClearScheduler`] owns the schedule state behind a single mutex.
//! Administrative calls and every timer callback take that lock, so arming,
//! cancelling and replacing the countdown are atomic with respect to each
//! other even on a multi-threaded host.
//!
//! Timer callbacks carry a token. A callback whose token no longer matches
//! the armed timer or the active countdown does nothing, which covers a
//! callback that was already waiting on the lock when its timer was
//! cancelled.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};

use crate::cfg::{Settings, SettingsStore};
use crate::clock;
use crate::countdown::{CountdownEngine, CountdownState, TickOutcome};
use crate::error::{AdminOutcome, ClearError};
use crate::host::{Clock, Notifier, Sweeper, TimerCallback, TimerHandle, TimerHost};
use crate::interval;
use crate::notice::{Notice, StatusReport};

/// Collaborators supplied by the hosting environment.
///
/// The sweeper and notifier run while the schedule lock is held and must not
/// call back into the scheduler.
#[derive(Clone)]
pub struct Host {
    /// Time source.
    pub clock: Arc<dyn Clock>,
    /// Timer scheduler.
    pub timers: Arc<dyn TimerHost>,
    /// Removes dropped items.
    pub sweeper: Arc<dyn Sweeper>,
    /// Delivers notices.
    pub notifier: Arc<dyn Notifier>,
    /// Persisted settings.
    pub store: Arc<dyn SettingsStore>,
}

/// Validated view of the persisted settings the scheduler acts on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleConfig {
    /// `auto-clear.enabled`.
    pub enabled: bool,
    /// `auto-clear.interval` as written.
    pub interval_text: String,
    /// Parsed interval; 0 when the text does not parse.
    pub interval_secs: u64,
    /// `countdown.start-at`.
    pub countdown_lead: u32,
}

impl ScheduleConfig {
    /// Validate `settings`.
    ///
    /// A negative countdown is rejected. An unparsable interval is kept as 0
    /// so that `start()` refuses it with a warning.
    pub fn from_settings(settings: &Settings) -> Result<Self, ClearError> {
        let start_at = settings.countdown.start_at;
        let countdown_lead = u32::try_from(start_at).map_err(|_| ClearError::InvalidCountdown(start_at))?;
        let interval_secs = match interval::parse(&settings.auto_clear.interval) {
            Ok(secs) => secs,
            Err(e) => {
                warn!("configured interval {:?} unusable: {e}", settings.auto_clear.interval);
                0
            }
        };
        Ok(Self {
            enabled: settings.auto_clear.enabled,
            interval_text: settings.auto_clear.interval.clone(),
            interval_secs,
            countdown_lead,
        })
    }
}

struct ArmedTimer {
    token: u64,
    handle: TimerHandle,
}

struct ScheduleState {
    config: ScheduleConfig,
    next_fire_at: Option<Instant>,
    repeating: Option<ArmedTimer>,
    active_countdown: Option<CountdownEngine>,
    next_token: u64,
}

impl ScheduleState {
    fn issue_token(&mut self) -> u64 {
        self.next_token += 1;
        self.next_token
    }

    fn is_running(&self) -> bool {
        self.repeating.is_some()
    }

    /// Cancel everything armed. Returns `true` if anything was.
    fn halt(&mut self) -> bool {
        let mut was_active = false;
        if let Some(armed) = self.repeating.take() {
            armed.handle.cancel();
            was_active = true;
        }
        if let Some(mut countdown) = self.active_countdown.take() {
            was_active |= countdown.cancel();
        }
        self.next_fire_at = None;
        was_active
    }

    fn restart_wanted(&self) -> bool {
        self.config.enabled || self.is_running()
    }
}

struct Shared {
    host: Host,
    state: Mutex<ScheduleState>,
}

impl Drop for Shared {
    fn drop(&mut self) {
        let state = self.state.get_mut().unwrap_or_else(PoisonError::into_inner);
        state.halt();
    }
}

/// Periodic sweep scheduler with a warning countdown.
///
/// Clones share the same state. Dropping the last clone cancels every
/// outstanding timer.
#[derive(Clone)]
pub struct AutoClearScheduler {
    shared: Arc<Shared>,
}

impl AutoClearScheduler {
    /// Build from the settings currently in `host.store`. Nothing is armed.
    pub fn new(host: Host) -> Result<Self, ClearError> {
        let settings = host.store.load().map_err(persistence)?;
        let config = ScheduleConfig::from_settings(&settings)?;
        Ok(Self::with_config(host, config))
    }

    /// Build from an already validated config. Nothing is armed.
    pub fn with_config(host: Host, config: ScheduleConfig) -> Self {
        let state = ScheduleState {
            config,
            next_fire_at: None,
            repeating: None,
            active_countdown: None,
            next_token: 0,
        };
        Self { shared: Arc::new(Shared { host, state: Mutex::new(state) }) }
    }

    fn lock(&self) -> MutexGuard<'_, ScheduleState> {
        self.shared.lock()
    }

    /// Start the schedule if the settings have it enabled.
    pub fn boot(&self) -> Result<(), ClearError> {
        let mut state = self.lock();
        if !state.config.enabled {
            info!("auto-clear disabled in settings");
            return Ok(());
        }
        self.shared.start_locked(&mut state)
    }

    /// Arm the repeating timer, replacing any previous one.
    ///
    /// Refuses intervals under a minute and leaves the scheduler stopped.
    pub fn start(&self) -> Result<(), ClearError> {
        let mut state = self.lock();
        self.shared.start_locked(&mut state)
    }

    /// Cancel the repeating timer and any running countdown.
    ///
    /// Returns `false` if nothing was armed.
    pub fn stop(&self) -> bool {
        let stopped = self.lock().halt();
        if stopped {
            info!("auto-clear stopped");
        } else {
            debug!("auto-clear already stopped");
        }
        stopped
    }

    /// Tear down for shutdown; no callback fires afterwards.
    pub fn shutdown(&self) {
        self.lock().halt();
        info!("auto-clear shut down");
    }

    /// Persist `enabled = true` and start.
    pub fn enable(&self) -> Result<AdminOutcome, ClearError> {
        let mut state = self.lock();
        if state.config.enabled && state.is_running() {
            return Ok(AdminOutcome::AlreadyEnabled);
        }
        if !state.config.enabled {
            self.shared.persist(|s| s.auto_clear.enabled = true)?;
            state.config.enabled = true;
        }
        self.shared.start_locked(&mut state)?;
        Ok(AdminOutcome::Applied)
    }

    /// Persist `enabled = false` and stop.
    pub fn disable(&self) -> Result<AdminOutcome, ClearError> {
        let mut state = self.lock();
        if !state.config.enabled {
            return Ok(AdminOutcome::AlreadyDisabled);
        }
        self.shared.persist(|s| s.auto_clear.enabled = false)?;
        state.config.enabled = false;
        state.halt();
        info!("auto-clear disabled");
        Ok(AdminOutcome::Applied)
    }

    /// Validate, persist and apply a new interval. Returns its length in seconds.
    ///
    /// Invalid text leaves state and settings untouched.
    pub fn set_interval(&self, text: &str) -> Result<u64, ClearError> {
        let secs = interval::validate(text).inspect_err(|e| debug!("set_interval rejected: {e}"))?;
        let canonical = text.trim().to_ascii_lowercase();

        let mut state = self.lock();
        self.shared.persist(|s| s.auto_clear.interval = canonical.clone())?;
        state.config.interval_text = canonical;
        state.config.interval_secs = secs;
        info!(interval = %interval::format(secs), "interval updated");

        if state.restart_wanted() {
            self.shared.start_locked(&mut state)?;
        }
        Ok(secs)
    }

    /// Validate, persist and apply a new countdown length.
    pub fn set_countdown_lead(&self, seconds: i64) -> Result<u32, ClearError> {
        let lead = u32::try_from(seconds).map_err(|_| ClearError::InvalidCountdown(seconds))?;

        let mut state = self.lock();
        self.shared.persist(|s| s.countdown.start_at = i64::from(lead))?;
        state.config.countdown_lead = lead;
        info!(countdown = lead, "countdown updated");

        if state.restart_wanted() {
            self.shared.start_locked(&mut state)?;
        }
        Ok(lead)
    }

    /// Re-read settings and restart the schedule from them.
    ///
    /// Invalid settings leave the current schedule untouched. A schedule that
    /// cannot be started after a successful reload is logged, not returned.
    pub fn reload(&self) -> Result<(), ClearError> {
        let settings = self.shared.host.store.load().map_err(persistence)?;
        let config = ScheduleConfig::from_settings(&settings)?;

        let mut state = self.lock();
        state.halt();
        state.config = config;
        if state.config.enabled {
            // start_locked already logs why it refused.
            let _ = self.shared.start_locked(&mut state);
        }
        info!("settings reloaded");
        Ok(())
    }

    /// Start a countdown now without touching the repeating cadence.
    pub fn execute_manual_clear(&self) -> Result<(), ClearError> {
        let mut state = self.lock();
        info!("manual clear with countdown requested");
        self.shared.start_countdown_locked(&mut state)
    }

    /// Cancel a running countdown, leaving the repeating timer armed.
    pub fn cancel_countdown(&self) -> bool {
        let mut state = self.lock();
        match state.active_countdown.take() {
            Some(mut countdown) => {
                let cancelled = countdown.cancel();
                info!(countdown = countdown.id(), "countdown cancelled");
                cancelled
            }
            None => false,
        }
    }

    /// Sweep now, skipping the countdown. Returns the number removed.
    pub fn execute_immediate_clear(&self) -> Result<usize, ClearError> {
        let mut state = self.lock();
        let host = &self.shared.host;
        match host.sweeper.sweep() {
            Ok(removed) => {
                info!(removed, "immediate clear complete");
                host.notifier.notify(&Notice::SweepComplete { removed });
                self.shared.refresh_next_fire_locked(&mut state);
                Ok(removed)
            }
            Err(e) => {
                warn!("immediate clear failed: {e:#}");
                Err(ClearError::SweepFailed(format!("{e:#}")))
            }
        }
    }

    /// Seconds until the next sweep, `None` when disabled or not armed.
    pub fn time_until_next_clear(&self) -> Option<u64> {
        let state = self.lock();
        self.shared.remaining_locked(&state)
    }

    /// Current status snapshot.
    pub fn status(&self) -> StatusReport {
        let state = self.lock();
        StatusReport {
            enabled: state.config.enabled,
            running: state.is_running(),
            interval_secs: state.config.interval_secs,
            countdown_lead_secs: state.config.countdown_lead,
            next_fire_in_secs: self.shared.remaining_locked(&state),
        }
    }

    /// Send the current status to observers and return it.
    pub fn broadcast_status(&self) -> StatusReport {
        let report = self.status();
        self.shared.host.notifier.notify(&Notice::Status(report.clone()));
        report
    }

    /// Whether the repeating timer is armed.
    pub fn is_running(&self) -> bool {
        self.lock().is_running()
    }

    /// State of the active countdown, if any.
    pub fn countdown_state(&self) -> Option<CountdownState> {
        self.lock().active_countdown.as_ref().map(CountdownEngine::state)
    }

    /// Copy of the config currently applied.
    pub fn config(&self) -> ScheduleConfig {
        self.lock().config.clone()
    }
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, ScheduleState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn start_locked(self: &Arc<Self>, state: &mut ScheduleState) -> Result<(), ClearError> {
        if state.halt() {
            debug!("restarting auto-clear");
        }

        let interval_secs = state.config.interval_secs;
        if let Err(e) = interval::check_minimum(interval_secs) {
            warn!(interval = %state.config.interval_text, "invalid interval, auto-clear not started");
            return Err(e);
        }
        let delay = clock::first_fire_delay(interval_secs, u64::from(state.config.countdown_lead));
        let next_fire_at = clock::next_fire_at(self.host.clock.now(), interval_secs)
            .inspect_err(|e| error!("could not arm auto-clear timer: {e}"))?;

        let token = state.issue_token();
        let weak = Arc::downgrade(self);
        let callback: TimerCallback = Box::new(move || {
            if let Some(shared) = Weak::upgrade(&weak) {
                shared.on_repeating_fire(token);
            }
        });

        let handle = self
            .host
            .timers
            .schedule_repeating(Duration::from_secs(delay), Duration::from_secs(interval_secs), callback)
            .inspect_err(|e| error!("could not arm auto-clear timer: {e}"))?;

        state.repeating = Some(ArmedTimer { token, handle });
        state.next_fire_at = Some(next_fire_at);
        info!(
            interval = %interval::format(interval_secs),
            first_countdown_in = delay,
            "auto-clear started"
        );
        Ok(())
    }

    fn on_repeating_fire(self: &Arc<Self>, token: u64) {
        let mut state = self.lock();
        if state.repeating.as_ref().map(|t| t.token) != Some(token) {
            debug!(token, "stale auto-clear timer fired, ignoring");
            return;
        }
        // Errors are logged inside; the cadence continues regardless.
        let _ = self.start_countdown_locked(&mut state);
    }

    fn start_countdown_locked(self: &Arc<Self>, state: &mut ScheduleState) -> Result<(), ClearError> {
        if let Some(mut previous) = state.active_countdown.take() {
            if previous.cancel() {
                debug!(countdown = previous.id(), "replacing running countdown");
            }
        }

        let id = state.issue_token();
        let lead = state.config.countdown_lead;
        let mut engine = CountdownEngine::new(id, lead);

        let weak = Arc::downgrade(self);
        let callback: TimerCallback = Box::new(move || {
            if let Some(shared) = Weak::upgrade(&weak) {
                shared.on_countdown_tick(id);
            }
        });
        let handle = self
            .host
            .timers
            .schedule_repeating(Duration::ZERO, Duration::from_secs(1), callback)
            .inspect_err(|e| error!("could not arm countdown timer: {e}"))?;
        engine.attach(handle);

        debug!(countdown = id, seconds = lead, "countdown started");
        state.active_countdown = Some(engine);
        Ok(())
    }

    fn on_countdown_tick(&self, id: u64) {
        let mut state = self.lock();
        let Some(engine) = state.active_countdown.as_mut().filter(|e| e.id() == id) else {
            debug!(countdown = id, "stale countdown tick, ignoring");
            return;
        };

        match engine.tick(self.host.sweeper.as_ref(), self.host.notifier.as_ref()) {
            TickOutcome::Announced(_) | TickOutcome::Inert => {}
            TickOutcome::Swept(removed) => {
                state.active_countdown = None;
                if removed.is_some() {
                    self.refresh_next_fire_locked(&mut state);
                }
            }
        }
    }

    fn refresh_next_fire_locked(&self, state: &mut ScheduleState) {
        if state.config.enabled && state.is_running() {
            match clock::next_fire_at(self.host.clock.now(), state.config.interval_secs) {
                Ok(at) => state.next_fire_at = Some(at),
                Err(e) => warn!("next clear time not refreshed: {e}"),
            }
        }
    }

    fn remaining_locked(&self, state: &ScheduleState) -> Option<u64> {
        if !state.config.enabled || !state.is_running() {
            return None;
        }
        clock::time_remaining(state.next_fire_at, self.host.clock.now())
    }

    fn persist(&self, apply: impl FnOnce(&mut Settings)) -> Result<(), ClearError> {
        let store = &self.host.store;
        let mut settings = store.load().map_err(persistence)?;
        apply(&mut settings);
        store.save(&settings).map_err(persistence)
    }
}

fn persistence(e: anyhow::Error) -> ClearError {
    ClearError::Persistence(format!("{e:#}"))
}
