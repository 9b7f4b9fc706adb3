mod broadcast;
mod console;
mod dropper;
mod module;
#[cfg(feature = "web-api")]
mod status;
mod timers;
mod world;

use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use sweep_core::cfg::{Settings, SettingsStore, TomlFileStore, APP};
use sweep_core::messages::MessageCatalog;
use sweep_core::{logx, AutoClearScheduler, Host, ScheduleConfig};
use tokio::runtime::Runtime;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::broadcast::{stdout_sink, Broadcaster, SharedCatalog};
use crate::console::Console;
use crate::dropper::Dropper;
use crate::module::{stopped, Module, ModuleCtx};
use crate::timers::{TokioClock, TokioTimers};
use crate::world::World;

#[derive(Parser)]
#[command(name = env!("CARGO_PKG_NAME"), version, about = "Periodic dropped-item sweeper")]
struct Cli {
    /// Settings file; defaults to config.toml in the per-user config dir.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Log level when RUST_LOG is unset; overrides the settings file.
    #[arg(long)]
    log: Option<String>,
    /// Seconds between simulated item drops, 0 to disable.
    #[arg(long, default_value_t = 20)]
    drop_every: u64,
    /// Items per simulated drop.
    #[arg(long, default_value_t = 8)]
    drop_batch: u32,
    /// Stop the daemon when stdin closes.
    #[arg(long)]
    exit_on_eof: bool,
    /// Serve GET /status on this address.
    #[cfg(feature = "web-api")]
    #[arg(long)]
    status_addr: Option<std::net::SocketAddr>,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let store = match &cli.config {
        Some(path) => TomlFileStore::new(path),
        None => TomlFileStore::for_app(&APP)?,
    };
    let settings = store.load_or_init()?;
    logx::init(cli.log.as_deref().unwrap_or(&settings.log_level));
    info!("{} boot, settings at {}", env!("CARGO_PKG_NAME"), store.path().display());

    let rt = build_runtime().context("build tokio runtime")?;
    let result = rt.block_on(run(cli, store, settings));
    // stdin reads sit on a blocking thread that never returns on its own.
    rt.shutdown_timeout(Duration::from_secs(1));
    result
}

#[cfg(feature = "rt-single")]
fn build_runtime() -> std::io::Result<Runtime> {
    tokio::runtime::Builder::new_current_thread().enable_all().build()
}

#[cfg(not(feature = "rt-single"))]
fn build_runtime() -> std::io::Result<Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(num_cpus::get().clamp(1, 4))
        .enable_all()
        .build()
}

async fn run(cli: Cli, store: TomlFileStore, settings: Settings) -> anyhow::Result<()> {
    let messages_dir = store.path().parent().map(Path::to_path_buf).unwrap_or_default();
    let catalog: SharedCatalog = Arc::new(RwLock::new(MessageCatalog::load(&messages_dir, &settings.language)?));
    let sink = stdout_sink();
    let store: Arc<dyn SettingsStore> = Arc::new(store);
    let world = World::default();

    let config = ScheduleConfig::from_settings(&settings).context("invalid settings")?;
    let scheduler = AutoClearScheduler::with_config(
        Host {
            clock: Arc::new(TokioClock),
            timers: Arc::new(TokioTimers::current()?),
            sweeper: Arc::new(world.clone()),
            notifier: Arc::new(Broadcaster::new(catalog.clone(), sink.clone())),
            store: store.clone(),
        },
        config,
    );
    if let Err(e) = scheduler.boot() {
        warn!("auto-clear not started: {e}");
    }

    let (tx, rx) = watch::channel(false);
    let stop = Arc::new(tx);
    let ctx = ModuleCtx { scheduler: scheduler.clone(), world, shutdown: rx, stop: stop.clone() };

    let mut modules: Vec<Box<dyn Module>> =
        vec![Box::new(Console::new(catalog, store, messages_dir, sink, cli.exit_on_eof))];
    if cli.drop_every > 0 {
        modules.push(Box::new(Dropper::new(Duration::from_secs(cli.drop_every), cli.drop_batch)));
    }
    #[cfg(feature = "web-api")]
    if let Some(addr) = cli.status_addr {
        modules.push(Box::new(status::StatusServer::new(addr)));
    }

    let mut handles = Vec::with_capacity(modules.len());
    for module in modules {
        let name = module.name();
        info!("starting module {name}");
        handles.push((name, module.spawn(ctx.clone())));
    }

    let mut stop_rx = ctx.shutdown.clone();
    tokio::select! {
        r = tokio::signal::ctrl_c() => {
            r.context("listen for ctrl-c")?;
            info!("ctrl-c received");
        }
        _ = stopped(&mut stop_rx) => info!("stop requested"),
    }

    let _ = stop.send(true);
    scheduler.shutdown();
    for (name, handle) in handles {
        match handle.await {
            Ok(Ok(())) => debug!("module {name} finished"),
            Ok(Err(e)) => warn!("module {name} failed: {e:#}"),
            Err(e) => warn!("module {name} did not finish: {e}"),
        }
    }
    info!("{} stopped", env!("CARGO_PKG_NAME"));
    Ok(())
}
