use std::sync::Arc;

use sweep_core::AutoClearScheduler;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::world::World;

#[derive(Clone)]
pub struct ModuleCtx {
    pub scheduler: AutoClearScheduler,
    pub world: World,
    pub shutdown: watch::Receiver<bool>,
    /// Lets a module ask the whole daemon to stop.
    pub stop: Arc<watch::Sender<bool>>,
}

/// Resolves once shutdown has been signalled or the sender is gone.
pub async fn stopped(shutdown: &mut watch::Receiver<bool>) {
    while !*shutdown.borrow_and_update() {
        if shutdown.changed().await.is_err() {
            return;
        }
    }
}

pub trait Module: Send + 'static {
    fn name(&self) -> &'static str;
    fn spawn(self: Box<Self>, ctx: ModuleCtx) -> JoinHandle<anyhow::Result<()>>;
}
