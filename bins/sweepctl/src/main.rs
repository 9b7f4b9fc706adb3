use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use sweep_core::cfg::{Settings, SettingsStore, TomlFileStore, APP};
use sweep_core::manual::ManualHost;
use sweep_core::messages::MessageCatalog;
use sweep_core::notice::Notice;
use sweep_core::{interval, logx, AutoClearScheduler, ClearError, Host, ScheduleConfig};
use tracing::{debug, info};

#[derive(Parser)]
#[command(name = env!("CARGO_PKG_NAME"), version, about = "Inspect and edit auto-clear settings offline")]
struct Cli {
    /// Settings file; defaults to config.toml in the per-user config dir.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Validate an interval such as 1h30m.
    Check { interval: String },
    /// Render a number of seconds the way notices do.
    Format { seconds: u64 },
    /// Print the persisted settings.
    Show {
        #[arg(long)]
        json: bool,
    },
    /// Persist a new interval.
    SetInterval { interval: String },
    /// Persist a new countdown length in seconds.
    SetCountdown {
        #[arg(allow_hyphen_values = true)]
        seconds: i64,
    },
    /// Persist auto-clear as enabled.
    Enable,
    /// Persist auto-clear as disabled.
    Disable,
    /// Dry-run the schedule on a simulated clock and print every notice.
    Simulate {
        /// Interval to use instead of the persisted one.
        #[arg(long)]
        interval: Option<String>,
        /// Countdown length to use instead of the persisted one.
        #[arg(long, allow_hyphen_values = true)]
        countdown: Option<i64>,
        /// How much simulated time to run.
        #[arg(long = "for", default_value = "1h")]
        duration: String,
    },
}

#[derive(Serialize)]
struct SettingsView<'a> {
    #[serde(flatten)]
    settings: &'a Settings,
    interval_secs: Option<u64>,
    interval_display: Option<String>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let level = match cli.verbose { 0 => "warn", 1 => "info", 2 => "debug", _ => "trace" };
    logx::init(level);

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn open_store(config: Option<PathBuf>) -> Result<TomlFileStore> {
    match config {
        Some(path) => Ok(TomlFileStore::new(path)),
        None => TomlFileStore::for_app(&APP),
    }
}

fn edit(store: &TomlFileStore, apply: impl FnOnce(&mut Settings)) -> Result<()> {
    let mut settings = store.load_or_init()?;
    apply(&mut settings);
    store.save(&settings)?;
    info!("saved {}", store.path().display());
    Ok(())
}

fn run(cli: Cli) -> Result<ExitCode> {
    match cli.cmd {
        Command::Check { interval: text } => match interval::validate(&text) {
            Ok(secs) => {
                println!("{} = {secs}s", interval::format(secs));
                Ok(ExitCode::SUCCESS)
            }
            Err(e) => {
                println!("invalid: {e}");
                Ok(ExitCode::FAILURE)
            }
        },
        Command::Format { seconds } => {
            println!("{}", interval::format(seconds));
            Ok(ExitCode::SUCCESS)
        }
        Command::Show { json } => {
            let store = open_store(cli.config)?;
            let settings = store.load_or_init()?;
            if json {
                let parsed = interval::validate(&settings.auto_clear.interval).ok();
                let view = SettingsView {
                    settings: &settings,
                    interval_secs: parsed,
                    interval_display: parsed.map(interval::format),
                };
                println!("{}", serde_json::to_string_pretty(&view)?);
            } else {
                println!("# {}", store.path().display());
                print!("{}", toml::to_string_pretty(&settings)?);
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::SetInterval { interval: text } => {
            let secs = interval::validate(&text)?;
            let canonical = text.trim().to_ascii_lowercase();
            edit(&open_store(cli.config)?, |s| s.auto_clear.interval = canonical)?;
            println!("interval set to {}", interval::format(secs));
            Ok(ExitCode::SUCCESS)
        }
        Command::SetCountdown { seconds } => {
            let lead = u32::try_from(seconds).map_err(|_| ClearError::InvalidCountdown(seconds))?;
            edit(&open_store(cli.config)?, |s| s.countdown.start_at = i64::from(lead))?;
            println!("countdown set to {lead}s");
            Ok(ExitCode::SUCCESS)
        }
        Command::Enable => {
            edit(&open_store(cli.config)?, |s| s.auto_clear.enabled = true)?;
            println!("auto-clear enabled");
            Ok(ExitCode::SUCCESS)
        }
        Command::Disable => {
            edit(&open_store(cli.config)?, |s| s.auto_clear.enabled = false)?;
            println!("auto-clear disabled");
            Ok(ExitCode::SUCCESS)
        }
        Command::Simulate { interval: interval_override, countdown, duration } => {
            let store = open_store(cli.config)?;
            let mut settings = store.load_or_init()?;
            if let Some(text) = interval_override {
                settings.auto_clear.interval = text;
            }
            if let Some(lead) = countdown {
                settings.countdown.start_at = lead;
            }
            let run_for = interval::parse(&duration).context("--for")?;
            let dir = store.path().parent().map(|p| p.to_path_buf()).unwrap_or_default();
            let catalog = MessageCatalog::load(&dir, &settings.language)?;
            simulate(settings, catalog, run_for)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Run the scheduler on a manual clock and print its timeline.
fn simulate(settings: Settings, catalog: MessageCatalog, run_for: u64) -> Result<()> {
    let config = ScheduleConfig { enabled: true, ..ScheduleConfig::from_settings(&settings)? };
    interval::check_minimum(config.interval_secs)?;
    println!(
        "simulating {} with interval {} and a {}s countdown",
        interval::format(run_for),
        interval::format(config.interval_secs),
        config.countdown_lead
    );

    let host = ManualHost::new();
    let clock = host.clone();
    let scheduler = AutoClearScheduler::with_config(
        Host {
            clock: Arc::new(host.clone()),
            timers: Arc::new(host.clone()),
            sweeper: Arc::new(|| -> anyhow::Result<usize> { Ok(0) }),
            notifier: Arc::new(move |notice: &Notice| {
                println!("[{:>8}] {}", offset(clock.elapsed()), catalog.render_notice(notice));
            }),
            store: Arc::new(sweep_core::cfg::MemoryStore::new(settings)),
        },
        config,
    );
    scheduler.start()?;
    host.advance_secs(run_for);
    debug!(timers_armed = host.armed_total(), "simulation finished");
    scheduler.shutdown();
    Ok(())
}

fn offset(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    format!("{}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
}
