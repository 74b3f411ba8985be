//! Operation Store and Pending Queue.
//!
//! The store is the system of record for status queries; the pending queue
//! holds the ids awaiting a scheduling cycle. Both live in one struct so a
//! single lock covers "update the record and (re-)enqueue its id".

use std::collections::{BTreeMap, HashMap, VecDeque};

use crate::error::DispatchError;
use crate::operation::{OperationId, OperationKind, OperationRecord, OperationStatus, SavePayload};
use crate::retry::{self, RetryDecision, RetryPolicy};

/// Per-status record counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusCounts {
    pub pending: usize,
    pub saving: usize,
    pub saved: usize,
    pub error: usize,
}

impl StatusCounts {
    pub fn total(&self) -> usize {
        self.pending + self.saving + self.saved + self.error
    }
}

/// In-memory operation store plus FIFO pending queue.
///
/// Records are kept in insertion order.
#[derive(Debug, Default)]
pub struct OperationStore {
    records: BTreeMap<u64, OperationRecord>,
    index: HashMap<OperationId, u64>,
    pending: VecDeque<OperationId>,
    next_seq: u64,
}

impl OperationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new record and append its id to the pending queue.
    pub fn insert(&mut self, record: OperationRecord) {
        let seq = self.next_seq;
        self.next_seq += 1;

        self.pending.push_back(record.id.clone());
        self.index.insert(record.id.clone(), seq);
        self.records.insert(seq, record);
    }

    pub fn get(&self, id: &OperationId) -> Option<&OperationRecord> {
        self.index.get(id).and_then(|seq| self.records.get(seq))
    }

    fn get_mut(&mut self, id: &OperationId) -> Option<&mut OperationRecord> {
        let seq = self.index.get(id)?;
        self.records.get_mut(seq)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn queue_len(&self) -> usize {
        self.pending.len()
    }

    /// Fresh copy of every record.
    pub fn snapshot(&self) -> Vec<OperationRecord> {
        self.records.values().cloned().collect()
    }

    pub fn filtered(&self, pred: impl Fn(&OperationRecord) -> bool) -> Vec<OperationRecord> {
        self.records.values().filter(|r| pred(r)).cloned().collect()
    }

    pub fn counts(&self) -> StatusCounts {
        let mut counts = StatusCounts::default();
        for record in self.records.values() {
            match record.status {
                OperationStatus::Pending => counts.pending += 1,
                OperationStatus::Saving => counts.saving += 1,
                OperationStatus::Saved => counts.saved += 1,
                OperationStatus::Error => counts.error += 1,
            }
        }
        counts
    }

    /// Remove up to `limit` ids from the head of the pending queue.
    ///
    /// Ids whose record was removed, or is no longer `pending` (settled by
    /// a force-save), are dropped silently.
    pub fn take_batch(&mut self, limit: usize) -> Vec<(OperationId, OperationKind)> {
        let take = limit.min(self.pending.len());
        let ids: Vec<_> = self.pending.drain(..take).collect();

        ids.into_iter()
            .filter_map(|id| {
                let record = self.get(&id)?;
                let kind = record.kind;
                (record.status == OperationStatus::Pending).then_some((id, kind))
            })
            .collect()
    }

    /// Move a `pending` record to `saving` and hand out its payload.
    pub fn begin_save(&mut self, id: &OperationId) -> Option<SavePayload> {
        self.start_saving(id, |status| status == OperationStatus::Pending)
    }

    /// Like [`begin_save`](Self::begin_save), but also takes a record that
    /// is already `saving`.
    pub fn begin_forced_save(&mut self, id: &OperationId) -> Option<SavePayload> {
        self.start_saving(id, |status| status.is_in_flight())
    }

    fn start_saving(
        &mut self,
        id: &OperationId,
        allowed: impl Fn(OperationStatus) -> bool,
    ) -> Option<SavePayload> {
        let record = self.get_mut(id)?;
        if !allowed(record.status) {
            return None;
        }
        record.mark_saving();
        Some(record.payload.clone())
    }

    /// Append `id` unless it is already waiting.
    fn requeue(&mut self, id: &OperationId) {
        if !self.pending.contains(id) {
            self.pending.push_back(id.clone());
        }
    }

    pub fn complete(&mut self, id: &OperationId) -> bool {
        match self.get_mut(id) {
            Some(record) => {
                record.mark_saved();
                true
            }
            None => false,
        }
    }

    /// Apply a dispatch failure; re-enqueues at the tail when retrying and
    /// the id is not queued already.
    pub fn fail(
        &mut self,
        id: &OperationId,
        error: &DispatchError,
        policy: &RetryPolicy,
    ) -> Option<RetryDecision> {
        let record = self.get_mut(id)?;
        let decision = retry::record_failure(record, error, policy);

        if matches!(decision, RetryDecision::Retry { .. }) {
            self.requeue(id);
        }
        Some(decision)
    }

    /// Reset every `error` record to a fresh `pending` one and re-enqueue it.
    pub fn requeue_failed(&mut self) -> Vec<OperationId> {
        let mut requeued = Vec::new();
        for record in self.records.values_mut() {
            if record.status == OperationStatus::Error {
                record.reset_for_retry();
                requeued.push(record.id.clone());
            }
        }
        for id in &requeued {
            self.requeue(id);
        }
        requeued
    }

    /// Drop every `saved` record. Returns how many were removed.
    pub fn remove_saved(&mut self) -> usize {
        let before = self.records.len();
        let index = &mut self.index;
        self.records.retain(|_, record| {
            let keep = record.status != OperationStatus::Saved;
            if !keep {
                index.remove(&record.id);
            }
            keep
        });
        before - self.records.len()
    }
}

/// Split a dequeued batch into per-kind sub-batches.
///
/// Sub-batches appear in order of their first operation; each keeps the
/// dequeue order of its ids.
pub fn partition_by_kind(
    batch: Vec<(OperationId, OperationKind)>,
) -> Vec<(OperationKind, Vec<OperationId>)> {
    let mut groups: Vec<(OperationKind, Vec<OperationId>)> = Vec::new();
    for (id, kind) in batch {
        match groups.iter_mut().find(|(k, _)| *k == kind) {
            Some((_, ids)) => ids.push(id),
            None => groups.push((kind, vec![id])),
        }
    }
    groups
}
