//! The overall update request shared by all workers of a run

use std::sync::atomic::{AtomicBool, Ordering};

/// Tracks whether any task of the run changed data.
///
/// The owner of the request decides what "dirty" triggers (recomputing
/// valuations, saving the file, ...); workers only raise the flag.
#[derive(Debug, Default)]
pub struct UpdateRequest {
    dirty: AtomicBool,
}

impl UpdateRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_dirty(&self) {
        self.dirty.store(true, Ordering::SeqCst);
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::SeqCst)
    }
}
