#![cfg(feature = "web-api")]

use std::net::SocketAddr;
use std::time::Instant;

use axum::{extract::State, response::IntoResponse, routing::get, Json, Router};
use serde::Serialize;
use sweep_core::notice::StatusReport;
use sweep_core::{interval, AutoClearScheduler};
use tokio::task::JoinHandle;
use tracing::info;

use crate::module::{stopped, Module, ModuleCtx};
use crate::world::World;

#[derive(Clone)]
struct AppState {
    scheduler: AutoClearScheduler,
    world: World,
    started: Instant,
}

#[derive(Serialize)]
struct Status {
    #[serde(flatten)]
    schedule: StatusReport,
    interval: String,
    next_clear_in: String,
    dropped_items: usize,
    uptime_ms: u64,
}

/// Read-only `GET /status` endpoint.
pub struct StatusServer {
    addr: SocketAddr,
}

impl StatusServer {
    pub fn new(addr: SocketAddr) -> Self { Self { addr } }
}

impl Module for StatusServer {
    fn name(&self) -> &'static str { "status" }

    fn spawn(self: Box<Self>, ctx: ModuleCtx) -> JoinHandle<anyhow::Result<()>> {
        tokio::spawn(async move {
            let state = AppState { scheduler: ctx.scheduler.clone(), world: ctx.world.clone(), started: Instant::now() };

            let app = Router::new()
                .route("/status", get(status))
                .with_state(state);

            let listener = tokio::net::TcpListener::bind(self.addr).await?;
            info!("status server listening on http://{}", self.addr);

            let mut shutdown = ctx.shutdown.clone();
            axum::serve(listener, app)
                .with_graceful_shutdown(async move { stopped(&mut shutdown).await })
                .await?;

            Ok(())
        })
    }
}

async fn status(State(state): State<AppState>) -> impl IntoResponse {
    let schedule = state.scheduler.status();
    Json(Status {
        interval: interval::format(schedule.interval_secs),
        next_clear_in: interval::format_remaining(schedule.next_fire_in_secs),
        schedule,
        dropped_items: state.world.dropped_items(),
        uptime_ms: state.started.elapsed().as_millis() as u64,
    })
}
