use crate::snapshot::IndexSnapshot;
use std::sync::{Arc, RwLock};

/// Shared handle to the current index snapshot.
///
/// Readers clone the inner `Arc` once at the start of a prediction and work
/// against that snapshot end-to-end; the refresh job publishes a replacement
/// with a single pointer swap. An in-flight call never observes a torn
/// update.
pub struct IndexHandle {
    current: RwLock<Arc<IndexSnapshot>>,
}

impl IndexHandle {
    pub fn new(snapshot: IndexSnapshot) -> Self {
        Self {
            current: RwLock::new(Arc::new(snapshot)),
        }
    }

    /// Snapshot reference for one prediction call.
    pub fn snapshot(&self) -> Arc<IndexSnapshot> {
        // Snapshots are immutable, so a poisoned lock still guards a valid
        // Arc; recover it rather than propagating a panic across calls.
        match self.current.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    /// Atomically publish a refreshed snapshot.
    pub fn publish(&self, snapshot: IndexSnapshot) {
        let snapshot = Arc::new(snapshot);
        log::info!(
            "Publishing index snapshot {} ({} projects)",
            snapshot.index_version(),
            snapshot.len()
        );
        match self.current.write() {
            Ok(mut guard) => *guard = snapshot,
            Err(poisoned) => *poisoned.into_inner() = snapshot,
        }
    }
}
