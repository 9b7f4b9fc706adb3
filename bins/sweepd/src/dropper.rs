use crate::module::{stopped, Module, ModuleCtx};
use crate::world::EntityKind;
use tokio::time::{interval, Duration};
use tracing::{debug, info};

const MATERIALS: [&str; 6] = ["cobblestone", "dirt", "oak_log", "rotten_flesh", "bone", "arrow"];

/// Drops a batch of items into the world every `period`, plus a mob now and then.
pub struct Dropper {
    period: Duration,
    batch: u32,
}

impl Dropper {
    pub fn new(period: Duration, batch: u32) -> Self {
        Self { period, batch }
    }
}

impl Module for Dropper {
    fn name(&self) -> &'static str { "dropper" }

    fn spawn(self: Box<Self>, mut ctx: ModuleCtx) -> tokio::task::JoinHandle<anyhow::Result<()>> {
        tokio::spawn(async move {
            let mut tick = interval(self.period);
            let mut round: usize = 0;
            loop {
                tokio::select! {
                    _ = tick.tick() => {
                        for i in 0..self.batch as usize {
                            let material = MATERIALS[(round + i) % MATERIALS.len()];
                            let amount = ((round + i) % 64 + 1) as u32;
                            ctx.world.spawn(EntityKind::DroppedItem { material, amount });
                        }
                        if round % 5 == 0 {
                            ctx.world.spawn(EntityKind::Mob("zombie"));
                        }
                        round += 1;
                        debug!(dropped = ctx.world.dropped_items(), total = ctx.world.len(), "items dropped");
                    }
                    _ = stopped(&mut ctx.shutdown) => {
                        info!("dropper stopping after {} rounds", round);
                        break;
                    }
                }
            }
            Ok(())
        })
    }
}
