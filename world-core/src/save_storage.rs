//! `SaveStorage` contract (§6): an async key-value upsert of change-form
//! blobs. The backend itself - its I/O, its worker threads - is out of
//! scope (§1); only the interface and an in-memory test double live here.

use crate::change_journal::ChangeForm;

/// `tick()` drains any completed upserts (posted back from worker threads,
/// per §5) and runs their `on_done` callbacks; `upsert` starts a new batch.
/// At most one call to `upsert` may be outstanding at a time (I8).
pub trait SaveStorage {
    fn tick(&mut self);
    fn upsert(&mut self, batch: Vec<ChangeForm>, on_done: Box<dyn FnOnce()>);
}

/// Synchronous in-memory stand-in used by `world_state`'s own tests and by
/// anything embedding `world-core` without a real backend.
#[derive(Default)]
pub struct InMemorySaveStorage {
    pub saved: Vec<ChangeForm>,
    pending_completion: Option<Box<dyn FnOnce()>>,
}

impl InMemorySaveStorage {
    pub fn new() -> Self {
        InMemorySaveStorage {
            saved: Vec::new(),
            pending_completion: None,
        }
    }
}

impl SaveStorage for InMemorySaveStorage {
    /// Resolves the in-flight upsert immediately - there is no real I/O to
    /// wait on, so "posted back from a worker thread" collapses to "ready
    /// on the very next tick".
    fn tick(&mut self) {
        if let Some(on_done) = self.pending_completion.take() {
            on_done();
        }
    }

    fn upsert(&mut self, batch: Vec<ChangeForm>, on_done: Box<dyn FnOnce()>) {
        self.saved.extend(batch);
        self.pending_completion = Some(on_done);
    }
}
