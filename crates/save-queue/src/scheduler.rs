//! Batch scheduler: the worker task that drains the pending queue.
//!
//! One worker per queue, so cycles never overlap. Inside a cycle the
//! dequeued ids are grouped by kind; groups run concurrently, operations
//! within a group run one after the other. A failed operation's backoff
//! wait holds up the rest of its group.

use std::sync::Arc;
use std::sync::atomic::Ordering;

use futures::future::join_all;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

use crate::operation::{OperationId, OperationKind};
use crate::queue::QueueCore;
use crate::retry::RetryDecision;
use crate::store::partition_by_kind;

#[derive(Debug)]
pub(crate) enum WorkerCommand {
    /// New work may be queued.
    Trigger,
    /// Reply once the queue is drained.
    Flush(oneshot::Sender<()>),
    /// Drain, then exit.
    Shutdown,
}

pub(crate) async fn run_worker(
    core: Arc<QueueCore>,
    mut commands: mpsc::UnboundedReceiver<WorkerCommand>,
) {
    info!(
        batch_size = core.config.batch_size,
        batching = core.config.enable_batching,
        max_retries = core.config.max_retries,
        "save queue worker started"
    );

    while let Some(command) = commands.recv().await {
        match command {
            WorkerCommand::Trigger => core.drain().await,
            WorkerCommand::Flush(done) => {
                core.drain().await;
                let _ = done.send(());
            }
            WorkerCommand::Shutdown => {
                core.drain().await;
                break;
            }
        }
    }

    info!("save queue worker stopped");
}

impl QueueCore {
    /// Run cycles until the pending queue is empty.
    async fn drain(&self) {
        loop {
            let queued = self.store().queue_len();
            if queued == 0 {
                return;
            }

            self.run_cycle().await;

            let remaining = self.store().queue_len();
            if remaining == 0 {
                return;
            }
            tokio::time::sleep(self.config.cycle_pause).await;
        }
    }

    async fn run_cycle(&self) {
        self.busy.store(true, Ordering::SeqCst);

        let batch = self.store().take_batch(self.config.batch_limit());
        let operations = batch.len();
        let groups = partition_by_kind(batch);
        debug!(operations, sub_batches = groups.len(), "save cycle started");

        join_all(
            groups
                .into_iter()
                .map(|(kind, ids)| self.run_sub_batch(kind, ids)),
        )
        .await;

        let cycle = self.cycles.fetch_add(1, Ordering::SeqCst) + 1;
        self.busy.store(false, Ordering::SeqCst);
        debug!(cycle, operations, "save cycle finished");
    }

    async fn run_sub_batch(&self, kind: OperationKind, ids: Vec<OperationId>) {
        for id in ids {
            self.process(kind, &id).await;
        }
    }

    async fn process(&self, kind: OperationKind, id: &OperationId) {
        let payload = self.store().begin_save(id);
        let Some(payload) = payload else {
            debug!(operation_id = %id, "operation no longer pending; skipped");
            return;
        };
        self.notify();

        let result = self.dispatcher.dispatch(&payload).await;
        let err = match result {
            Ok(()) => {
                self.store().complete(id);
                debug!(operation_id = %id, kind = %kind, "operation saved");
                self.notify();
                return;
            }
            Err(err) => err,
        };

        let decision = self.store().fail(id, &err, &self.retry);
        self.notify();

        match decision {
            Some(RetryDecision::Retry { retry_count, delay }) => {
                warn!(
                    operation_id = %id,
                    kind = %kind,
                    retry_count,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "save failed; retrying"
                );
                tokio::time::sleep(delay).await;
            }
            Some(RetryDecision::GiveUp { retry_count }) => {
                error!(
                    operation_id = %id,
                    kind = %kind,
                    retry_count,
                    error = %err,
                    "save failed permanently"
                );
            }
            None => debug!(operation_id = %id, "operation removed during dispatch"),
        }
    }
}
