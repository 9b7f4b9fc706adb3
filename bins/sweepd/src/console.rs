use std::path::PathBuf;
use std::sync::{Arc, PoisonError};

use sweep_core::cfg::SettingsStore;
use sweep_core::messages::MessageCatalog;
use sweep_core::{interval, AdminOutcome, AutoClearScheduler, ClearError};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::broadcast::{write_line, SharedCatalog, Sink};
use crate::module::{stopped, Module, ModuleCtx};

/// Operator command handling, independent of where the lines come from.
pub struct Commands {
    scheduler: AutoClearScheduler,
    catalog: SharedCatalog,
    store: Arc<dyn SettingsStore>,
    messages_dir: PathBuf,
    sink: Sink,
}

impl Commands {
    pub fn new(
        scheduler: AutoClearScheduler,
        catalog: SharedCatalog,
        store: Arc<dyn SettingsStore>,
        messages_dir: PathBuf,
        sink: Sink,
    ) -> Self {
        Self { scheduler, catalog, store, messages_dir, sink }
    }

    fn say(&self, key: &str, placeholders: &[(&str, String)]) {
        let line = self.catalog.read().unwrap_or_else(PoisonError::into_inner).render(key, placeholders);
        write_line(&self.sink, &line);
    }

    fn say_error(&self, err: &ClearError) {
        match err {
            ClearError::InvalidIntervalFormat(_) => self.say("set-invalid-format", &[]),
            ClearError::IntervalTooShort { .. } => self.say("set-invalid-value", &[]),
            ClearError::InvalidCountdown(_) => self.say("countdown-invalid", &[]),
            ClearError::SweepFailed(reason) => self.say("clear-failed", &[("reason", reason.clone())]),
            other => self.say("schedule-failed", &[("reason", other.to_string())]),
        }
    }

    /// Run one command line. Replies go to the sink.
    pub fn execute(&self, line: &str) {
        let mut words = line.split_whitespace();
        let Some(cmd) = words.next() else { return };
        let arg = words.next();
        debug!(cmd, ?arg, "console command");

        match (cmd.to_ascii_lowercase().as_str(), arg) {
            ("clear", None) => {
                if let Err(e) = self.scheduler.execute_manual_clear() {
                    self.say_error(&e);
                }
            }
            ("clear", Some(a)) if a.eq_ignore_ascii_case("now") => {
                self.say("clear-now", &[]);
                if let Err(e) = self.scheduler.execute_immediate_clear() {
                    self.say_error(&e);
                }
            }
            ("on", None) => match self.scheduler.enable() {
                Ok(AdminOutcome::AlreadyEnabled) => self.say("already-enabled", &[]),
                Ok(_) => self.say("enabled", &[]),
                Err(e) => self.say_error(&e),
            },
            ("off", None) => match self.scheduler.disable() {
                Ok(AdminOutcome::AlreadyDisabled) => self.say("already-disabled", &[]),
                Ok(_) => self.say("disabled", &[]),
                Err(e) => self.say_error(&e),
            },
            ("set", None) => self.say("set-usage", &[]),
            ("set", Some(text)) => match self.scheduler.set_interval(text) {
                Ok(secs) => self.say("set-success", &[("interval", interval::format(secs))]),
                Err(e) => self.say_error(&e),
            },
            ("countdown", Some(text)) => match text.parse::<i64>() {
                Ok(seconds) => match self.scheduler.set_countdown_lead(seconds) {
                    Ok(lead) => self.say("countdown-success", &[("seconds", lead.to_string())]),
                    Err(e) => self.say_error(&e),
                },
                Err(_) => self.say("countdown-invalid", &[]),
            },
            ("countdown", None) => self.say("countdown-invalid", &[]),
            ("reload", None) => match self.reload() {
                Ok(()) => self.say("reload-success", &[]),
                Err(e) => self.say("reload-failed", &[("reason", format!("{e:#}"))]),
            },
            ("info", None) => {
                self.scheduler.broadcast_status();
            }
            ("help", _) => self.say("usage", &[]),
            _ => self.say("unknown-command", &[]),
        }
    }

    fn reload(&self) -> anyhow::Result<()> {
        self.scheduler.reload()?;
        let settings = self.store.load()?;
        let catalog = MessageCatalog::load(&self.messages_dir, &settings.language)?;
        *self.catalog.write().unwrap_or_else(PoisonError::into_inner) = catalog;
        info!(language = %settings.language, "messages reloaded");
        Ok(())
    }
}

/// Reads operator commands from stdin.
pub struct Console {
    catalog: SharedCatalog,
    store: Arc<dyn SettingsStore>,
    messages_dir: PathBuf,
    sink: Sink,
    exit_on_eof: bool,
}

impl Console {
    pub fn new(
        catalog: SharedCatalog,
        store: Arc<dyn SettingsStore>,
        messages_dir: PathBuf,
        sink: Sink,
        exit_on_eof: bool,
    ) -> Self {
        Self { catalog, store, messages_dir, sink, exit_on_eof }
    }
}

impl Module for Console {
    fn name(&self) -> &'static str { "console" }

    fn spawn(self: Box<Self>, mut ctx: ModuleCtx) -> JoinHandle<anyhow::Result<()>> {
        tokio::spawn(async move {
            let Console { catalog, store, messages_dir, sink, exit_on_eof } = *self;
            let commands = Commands::new(ctx.scheduler.clone(), catalog, store, messages_dir, sink);
            let mut lines = BufReader::new(tokio::io::stdin()).lines();
            loop {
                tokio::select! {
                    line = lines.next_line() => match line {
                        Ok(Some(line)) => commands.execute(&line),
                        Ok(None) => {
                            info!("console input closed");
                            if exit_on_eof {
                                let _ = ctx.stop.send(true);
                            }
                            break;
                        }
                        Err(e) => {
                            warn!("console read failed: {e}");
                            break;
                        }
                    },
                    _ = stopped(&mut ctx.shutdown) => break,
                }
            }
            Ok(())
        })
    }
}
