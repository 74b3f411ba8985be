//! Statistics view: read-only aggregate, recomputed on every call.

use serde::Serialize;

use crate::store::OperationStore;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Statistics {
    pub total: usize,
    pub pending: usize,
    pub saving: usize,
    pub saved: usize,
    pub error: usize,
    /// Ids waiting in the pending queue.
    pub queue_length: usize,
    /// A scheduling cycle is running.
    pub busy: bool,
    /// Scheduling cycles completed since the queue started.
    pub cycles: u64,
}

impl Statistics {
    pub(crate) fn collect(store: &OperationStore, busy: bool, cycles: u64) -> Self {
        let counts = store.counts();
        Self {
            total: counts.total(),
            pending: counts.pending,
            saving: counts.saving,
            saved: counts.saved,
            error: counts.error,
            queue_length: store.queue_len(),
            busy,
            cycles,
        }
    }
}
