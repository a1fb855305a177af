//! Holder of the latest validated snapshot.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::graph::model::WorldState;

#[derive(Default)]
struct Slot {
    current: Option<Arc<WorldState>>,
    generation: u64,
}

/// Single current [`WorldState`], swapped whole on each accepted update.
///
/// Share it as `Arc<WorldStore>` between the update adapter (the only writer) and render
/// consumers. A reader gets an `Arc` to one snapshot and keeps seeing exactly that snapshot
/// regardless of later replaces.
#[derive(Default)]
pub struct WorldStore {
    slot: RwLock<Slot>,
}

impl WorldStore {
    /// Empty store; [`WorldStore::current`] returns `None` until the first replace.
    pub fn new() -> Self {
        Self::default()
    }

    /// Swap in `next` as the current snapshot. Returns the new generation.
    pub fn replace(&self, next: WorldState) -> u64 {
        let next = Arc::new(next);
        let mut slot = self.slot.write();
        slot.current = Some(next);
        slot.generation += 1;
        slot.generation
    }

    /// Current snapshot, if any valid snapshot has been received.
    pub fn current(&self) -> Option<Arc<WorldState>> {
        self.slot.read().current.clone()
    }

    /// Current snapshot together with its generation, read under one lock.
    pub fn current_with_generation(&self) -> (Option<Arc<WorldState>>, u64) {
        let slot = self.slot.read();
        (slot.current.clone(), slot.generation)
    }

    /// Number of successful replaces so far.
    pub fn generation(&self) -> u64 {
        self.slot.read().generation
    }

    /// Drop the current snapshot on consumer teardown. The generation is kept.
    pub fn clear(&self) {
        self.slot.write().current = None;
    }
}

impl std::fmt::Debug for WorldStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let slot = self.slot.read();
        f.debug_struct("WorldStore")
            .field("has_snapshot", &slot.current.is_some())
            .field("generation", &slot.generation)
            .finish()
    }
}

#[cfg(test)]
#[path = "../tests/unit/store/store.rs"]
mod tests;
