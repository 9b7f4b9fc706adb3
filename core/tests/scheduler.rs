use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

use sweep_core::cfg::{MemoryStore, Settings, SettingsStore};
use sweep_core::countdown::CountdownState;
use sweep_core::manual::ManualHost;
use sweep_core::notice::Notice;
use sweep_core::{interval, AdminOutcome, AutoClearScheduler, ClearError, Host, ScheduleConfig};

const ITEMS_PER_SWEEP: usize = 4;

struct Harness {
    host: ManualHost,
    store: Arc<MemoryStore>,
    log: Arc<Mutex<Vec<(u64, Notice)>>>,
    sweeps: Arc<AtomicUsize>,
    fail_next_sweep: Arc<AtomicBool>,
    scheduler: AutoClearScheduler,
}

impl Harness {
    fn new(interval: &str, countdown: i64, enabled: bool) -> Self {
        let mut settings = Settings::default();
        settings.auto_clear.interval = interval.to_string();
        settings.auto_clear.enabled = enabled;
        settings.countdown.start_at = countdown;
        let store = Arc::new(MemoryStore::new(settings));

        let host = ManualHost::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let sweeps = Arc::new(AtomicUsize::new(0));
        let fail_next_sweep = Arc::new(AtomicBool::new(false));

        let notifier = {
            let (host, log) = (host.clone(), log.clone());
            move |notice: &Notice| log.lock().unwrap().push((host.elapsed().as_secs(), notice.clone()))
        };
        let sweeper = {
            let (sweeps, fail) = (sweeps.clone(), fail_next_sweep.clone());
            move || -> anyhow::Result<usize> {
                if fail.swap(false, Ordering::SeqCst) {
                    anyhow::bail!("world unloaded");
                }
                sweeps.fetch_add(1, Ordering::SeqCst);
                Ok(ITEMS_PER_SWEEP)
            }
        };

        let scheduler = AutoClearScheduler::new(Host {
            clock: Arc::new(host.clone()),
            timers: Arc::new(host.clone()),
            sweeper: Arc::new(sweeper),
            notifier: Arc::new(notifier),
            store: store.clone(),
        })
        .unwrap();

        Self { host, store, log, sweeps, fail_next_sweep, scheduler }
    }

    fn booted(interval: &str, countdown: i64) -> Self {
        let h = Self::new(interval, countdown, true);
        h.scheduler.boot().unwrap();
        h
    }

    fn take_log(&self) -> Vec<(u64, Notice)> {
        std::mem::take(&mut *self.log.lock().unwrap())
    }

    fn sweep_times(&self) -> Vec<u64> {
        self.log
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, n)| matches!(n, Notice::SweepComplete { .. }))
            .map(|(t, _)| *t)
            .collect()
    }
}

fn tick(at: u64, seconds_remaining: u32) -> (u64, Notice) {
    (at, Notice::CountdownTick { seconds_remaining })
}

fn swept(at: u64) -> (u64, Notice) {
    (at, Notice::SweepComplete { removed: ITEMS_PER_SWEEP })
}

#[test]
fn boot_arms_one_timer_and_reports_full_interval() {
    let h = Harness::booted("10m", 10);
    assert!(h.scheduler.is_running());
    assert_eq!(h.host.live_timers(), 1);
    assert_eq!(h.scheduler.time_until_next_clear(), Some(600));
}

#[test]
fn countdown_leads_into_sweep_on_cadence() {
    let h = Harness::booted("1m", 3);

    h.host.advance_secs(56);
    assert!(h.take_log().is_empty());

    h.host.advance_secs(4);
    assert_eq!(h.take_log(), vec![tick(57, 3), tick(58, 2), tick(59, 1), swept(60)]);
    assert_eq!(h.scheduler.time_until_next_clear(), Some(60));
    assert_eq!(h.scheduler.countdown_state(), None);

    h.host.advance_secs(60);
    assert_eq!(h.take_log(), vec![tick(117, 3), tick(118, 2), tick(119, 1), swept(120)]);
    assert_eq!(h.sweeps.load(Ordering::SeqCst), 2);
}

#[test]
fn zero_countdown_sweeps_silently_at_the_interval() {
    let h = Harness::booted("1m", 0);
    h.host.advance_secs(180);
    assert_eq!(h.take_log(), vec![swept(60), swept(120), swept(180)]);
}

#[test]
fn oversized_countdown_defers_first_fire_by_a_full_interval() {
    let h = Harness::booted("1m", 90);
    h.host.advance_secs(59);
    assert!(h.take_log().is_empty());
    h.host.advance_secs(1);
    assert_eq!(h.take_log(), vec![tick(60, 90)]);
}

#[test]
fn restarting_replaces_the_timer_exactly_once() {
    let h = Harness::booted("1m", 2);
    h.scheduler.start().unwrap();
    h.scheduler.start().unwrap();
    assert_eq!(h.host.live_timers(), 1);
    assert_eq!(h.host.armed_total(), 3);

    h.host.advance_secs(180);
    assert_eq!(h.sweep_times(), vec![60, 120, 180]);
}

#[test]
fn stop_clears_remaining_and_silences_timers() {
    let h = Harness::booted("1m", 5);
    h.host.advance_secs(57);
    assert_eq!(h.scheduler.countdown_state(), Some(CountdownState::Running(2)));

    assert!(h.scheduler.stop());
    assert_eq!(h.scheduler.time_until_next_clear(), None);
    assert_eq!(h.scheduler.countdown_state(), None);
    let before = h.take_log().len();
    assert_eq!(before, 3);

    h.host.advance_secs(600);
    assert!(h.take_log().is_empty());
    assert_eq!(h.host.live_timers(), 0);
    assert!(!h.scheduler.stop());
}

#[test]
fn short_or_missing_interval_is_refused() {
    let h = Harness::new("30s", 10, true);
    assert_eq!(h.scheduler.config().interval_secs, 0);
    assert_eq!(h.scheduler.boot(), Err(ClearError::IntervalTooShort { seconds: 0 }));
    assert!(!h.scheduler.is_running());

    let h = Harness::new("1m", 10, true);
    let scheduler = AutoClearScheduler::with_config(
        Host {
            clock: Arc::new(h.host.clone()),
            timers: Arc::new(h.host.clone()),
            sweeper: Arc::new(|| -> anyhow::Result<usize> { Ok(0) }),
            notifier: Arc::new(|_: &Notice| {}),
            store: h.store.clone(),
        },
        ScheduleConfig { enabled: true, interval_text: "59s".into(), interval_secs: 59, countdown_lead: 10 },
    );
    assert_eq!(scheduler.start(), Err(ClearError::IntervalTooShort { seconds: 59 }));
    assert_eq!(h.host.live_timers(), 0);
}

#[test]
fn host_refusal_leaves_scheduler_stopped_until_next_start() {
    let h = Harness::new("1m", 3, true);
    h.host.refuse_next_schedule();
    assert!(matches!(h.scheduler.boot(), Err(ClearError::HostScheduling(_))));

    let status = h.scheduler.status();
    assert!(status.enabled);
    assert!(!status.running);
    assert_eq!(status.next_fire_in_secs, None);

    h.scheduler.start().unwrap();
    assert!(h.scheduler.is_running());
    h.host.advance_secs(60);
    assert_eq!(h.sweep_times(), vec![60]);
}

#[test]
fn disable_mid_countdown_cancels_it() {
    let h = Harness::booted("1m", 3);
    h.host.advance_secs(58);
    assert_eq!(h.take_log(), vec![tick(57, 3), tick(58, 2)]);

    assert_eq!(h.scheduler.disable(), Ok(AdminOutcome::Applied));
    assert!(!h.store.load().unwrap().auto_clear.enabled);
    h.host.advance_secs(300);
    assert!(h.take_log().is_empty());
    assert_eq!(h.sweeps.load(Ordering::SeqCst), 0);
}

#[test]
fn cancelled_countdown_is_never_resumed() {
    let h = Harness::booted("1m", 3);
    h.host.advance_secs(58);
    assert!(h.scheduler.cancel_countdown());
    assert!(!h.scheduler.cancel_countdown());
    assert!(h.scheduler.is_running());
    h.take_log();

    h.host.advance_secs(62);
    assert_eq!(h.take_log(), vec![tick(117, 3), tick(118, 2), tick(119, 1), swept(120)]);
}

#[test]
fn remaining_time_counts_down_while_running() {
    let h = Harness::booted("10m", 10);
    let mut last = h.scheduler.time_until_next_clear().unwrap();
    for _ in 0..25 {
        h.host.advance_secs(23);
        let now = h.scheduler.time_until_next_clear().unwrap();
        assert!(now <= last, "{now} > {last}");
        last = now;
    }
    assert_eq!(last, 25);
}

#[test]
fn new_interval_rearms_from_now() {
    let h = Harness::booted("10m", 10);
    h.host.advance_secs(100);

    assert_eq!(h.scheduler.set_interval("1H"), Ok(3600));
    assert_eq!(h.scheduler.time_until_next_clear(), Some(3600));
    assert_eq!(h.store.load().unwrap().auto_clear.interval, "1h");
    assert_eq!(h.host.live_timers(), 1);

    h.host.advance_secs(3589);
    assert!(h.take_log().is_empty());
    h.host.advance_secs(11);
    assert_eq!(h.sweep_times(), vec![3700]);
}

#[test]
fn invalid_interval_changes_nothing() {
    let h = Harness::booted("10m", 10);
    let before = h.store.load().unwrap();

    assert!(matches!(h.scheduler.set_interval("45s"), Err(ClearError::InvalidIntervalFormat(_))));
    assert!(matches!(h.scheduler.set_interval(""), Err(ClearError::InvalidIntervalFormat(_))));
    assert_eq!(h.scheduler.set_interval("0m"), Err(ClearError::IntervalTooShort { seconds: 0 }));

    assert_eq!(h.store.load().unwrap(), before);
    assert_eq!(h.scheduler.config().interval_secs, 600);
    assert_eq!(h.host.armed_total(), 1);
}

#[test]
fn enormous_interval_is_rejected_without_disturbing_the_schedule() {
    let h = Harness::booted("10m", 10);

    assert!(matches!(
        h.scheduler.set_interval("200000000000000d"),
        Err(ClearError::InvalidIntervalFormat(_))
    ));
    assert_eq!(h.scheduler.config().interval_secs, 600);
    assert!(h.scheduler.is_running());
    assert_eq!(h.scheduler.time_until_next_clear(), Some(600));

    assert_eq!(h.scheduler.set_interval("36500d"), Ok(interval::MAX_INTERVAL_SECS));
    assert_eq!(h.scheduler.time_until_next_clear(), Some(interval::MAX_INTERVAL_SECS));
}

#[test]
fn enormous_interval_in_settings_boots_stopped() {
    let h = Harness::new("200000000000000d", 10, true);
    assert!(matches!(h.scheduler.boot(), Err(ClearError::IntervalTooShort { seconds: 0 })));
    assert!(!h.scheduler.is_running());

    let mut settings = h.store.load().unwrap();
    settings.auto_clear.interval = "999999999999999999d".into();
    h.store.save(&settings).unwrap();
    h.scheduler.reload().unwrap();
    assert!(!h.scheduler.is_running());
    assert_eq!(h.host.armed_total(), 0);
}

#[test]
fn countdown_length_is_validated_and_applied() {
    let h = Harness::booted("1m", 10);
    assert_eq!(h.scheduler.set_countdown_lead(-1), Err(ClearError::InvalidCountdown(-1)));
    assert_eq!(h.store.load().unwrap().countdown.start_at, 10);

    assert_eq!(h.scheduler.set_countdown_lead(2), Ok(2));
    assert_eq!(h.store.load().unwrap().countdown.start_at, 2);
    h.host.advance_secs(60);
    assert_eq!(h.take_log(), vec![tick(58, 2), tick(59, 1), swept(60)]);
}

#[test]
fn immediate_clear_refreshes_estimate_but_not_cadence() {
    let h = Harness::booted("10m", 10);
    h.host.advance_secs(300);

    assert_eq!(h.scheduler.execute_immediate_clear(), Ok(ITEMS_PER_SWEEP));
    assert_eq!(h.take_log(), vec![swept(300)]);
    assert_eq!(h.scheduler.time_until_next_clear(), Some(600));

    h.host.advance_secs(300);
    assert_eq!(h.sweep_times(), vec![600]);
}

#[test]
fn manual_countdown_runs_without_touching_the_timer() {
    let h = Harness::booted("10m", 3);
    h.host.advance_secs(100);

    h.scheduler.execute_manual_clear().unwrap();
    assert_eq!(h.scheduler.time_until_next_clear(), Some(500));
    assert_eq!(h.scheduler.countdown_state(), Some(CountdownState::Running(3)));

    h.host.advance_secs(3);
    assert_eq!(h.take_log(), vec![tick(100, 3), tick(101, 2), tick(102, 1), swept(103)]);
    assert_eq!(h.scheduler.time_until_next_clear(), Some(600));

    h.host.advance_secs(497);
    assert_eq!(h.sweep_times(), vec![600]);
}

#[test]
fn manual_countdown_works_while_disabled() {
    let h = Harness::new("10m", 1, false);
    h.scheduler.boot().unwrap();
    assert!(!h.scheduler.is_running());

    h.scheduler.execute_manual_clear().unwrap();
    h.host.advance_secs(1);
    assert_eq!(h.take_log(), vec![tick(0, 1), swept(1)]);
    assert_eq!(h.scheduler.time_until_next_clear(), None);
}

#[test]
fn second_manual_clear_restarts_the_countdown() {
    let h = Harness::new("10m", 3, false);
    h.scheduler.execute_manual_clear().unwrap();
    h.host.advance_secs(1);
    h.scheduler.execute_manual_clear().unwrap();
    h.host.advance_secs(10);
    assert_eq!(
        h.take_log(),
        vec![tick(0, 3), tick(1, 2), tick(1, 3), tick(2, 2), tick(3, 1), swept(4)]
    );
}

#[test]
fn enable_and_disable_are_idempotent() {
    let h = Harness::new("1m", 3, false);
    h.scheduler.boot().unwrap();
    assert_eq!(h.scheduler.disable(), Ok(AdminOutcome::AlreadyDisabled));

    assert_eq!(h.scheduler.enable(), Ok(AdminOutcome::Applied));
    assert!(h.store.load().unwrap().auto_clear.enabled);
    assert_eq!(h.scheduler.enable(), Ok(AdminOutcome::AlreadyEnabled));
    assert_eq!(h.host.live_timers(), 1);

    assert_eq!(h.scheduler.disable(), Ok(AdminOutcome::Applied));
    assert_eq!(h.scheduler.disable(), Ok(AdminOutcome::AlreadyDisabled));
    assert_eq!(h.host.live_timers(), 0);
}

#[test]
fn reload_applies_new_settings_and_rejects_bad_ones() {
    let h = Harness::booted("10m", 10);
    let mut settings = h.store.load().unwrap();
    settings.auto_clear.interval = "1h".into();
    h.store.save(&settings).unwrap();

    h.scheduler.reload().unwrap();
    assert_eq!(h.scheduler.time_until_next_clear(), Some(3600));

    settings.countdown.start_at = -5;
    h.store.save(&settings).unwrap();
    assert_eq!(h.scheduler.reload(), Err(ClearError::InvalidCountdown(-5)));
    assert!(h.scheduler.is_running());
    assert_eq!(h.scheduler.config().countdown_lead, 10);
}

#[test]
fn failed_sweep_does_not_break_the_schedule() {
    let h = Harness::booted("1m", 0);
    h.fail_next_sweep.store(true, Ordering::SeqCst);
    h.host.advance_secs(120);
    assert_eq!(h.sweep_times(), vec![120]);

    h.fail_next_sweep.store(true, Ordering::SeqCst);
    assert!(matches!(h.scheduler.execute_immediate_clear(), Err(ClearError::SweepFailed(_))));
}

#[test]
fn status_is_broadcast_to_observers() {
    let h = Harness::booted("1h", 10);
    h.host.advance_secs(60);
    let report = h.scheduler.broadcast_status();
    assert_eq!(report.next_fire_in_secs, Some(3540));
    assert_eq!(report.interval_secs, 3600);
    assert_eq!(h.take_log(), vec![(60, Notice::Status(report))]);
}

#[test]
fn dropping_the_scheduler_cancels_everything() {
    let h = Harness::booted("1m", 5);
    h.host.advance_secs(56);
    assert_eq!(h.host.live_timers(), 2);

    let Harness { host, scheduler, log, .. } = h;
    drop(scheduler);
    assert_eq!(host.live_timers(), 0);
    log.lock().unwrap().clear();
    host.advance_secs(600);
    assert!(log.lock().unwrap().is_empty());
}

#[test]
fn concurrent_admin_calls_keep_at_most_one_timer_and_countdown() {
    let h = Harness::booted("1m", 5);
    let scheduler = h.scheduler.clone();

    let workers: Vec<_> = (0..4)
        .map(|i| {
            let scheduler = scheduler.clone();
            thread::spawn(move || {
                for round in 0..200 {
                    match (i + round) % 4 {
                        0 => {
                            let _ = scheduler.start();
                        }
                        1 => {
                            let _ = scheduler.execute_manual_clear();
                        }
                        2 => {
                            let _ = scheduler.status();
                        }
                        _ => {
                            scheduler.stop();
                        }
                    }
                }
            })
        })
        .collect();

    for _ in 0..200 {
        h.host.advance_secs(1);
        assert!(h.host.live_timers() <= 2);
    }
    for w in workers {
        w.join().unwrap();
    }

    scheduler.stop();
    assert_eq!(h.host.live_timers(), 0);
    h.scheduler.start().unwrap();
    assert_eq!(h.host.live_timers(), 1);
}
