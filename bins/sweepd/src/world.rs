use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use sweep_core::host::Sweeper;

/// What an entity in the world is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntityKind {
    /// An item stack lying on the ground.
    DroppedItem { material: &'static str, amount: u32 },
    /// Anything else; never swept.
    Mob(&'static str),
}

#[derive(Debug, Clone)]
pub struct Entity {
    pub id: u64,
    pub kind: EntityKind,
}

impl Entity {
    /// Sweep eligibility.
    pub fn is_dropped_item(&self) -> bool {
        matches!(self.kind, EntityKind::DroppedItem { .. })
    }
}

#[derive(Default)]
struct Inner {
    next_id: u64,
    entities: Vec<Entity>,
}

/// In-memory entity list standing in for the live world.
#[derive(Clone, Default)]
pub struct World {
    inner: Arc<Mutex<Inner>>,
}

impl World {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn spawn(&self, kind: EntityKind) -> u64 {
        let mut inner = self.lock();
        inner.next_id += 1;
        let id = inner.next_id;
        inner.entities.push(Entity { id, kind });
        id
    }

    pub fn len(&self) -> usize {
        self.lock().entities.len()
    }

    pub fn dropped_items(&self) -> usize {
        self.lock().entities.iter().filter(|e| e.is_dropped_item()).count()
    }

    /// Remove every entity matching `eligible`; returns how many went.
    pub fn remove_where(&self, eligible: impl Fn(&Entity) -> bool) -> usize {
        let mut inner = self.lock();
        let before = inner.entities.len();
        inner.entities.retain(|e| !eligible(e));
        before - inner.entities.len()
    }
}

impl Sweeper for World {
    fn sweep(&self) -> anyhow::Result<usize> {
        Ok(self.remove_where(Entity::is_dropped_item))
    }
}
