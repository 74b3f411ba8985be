//! Public handle to a running save queue.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::SaveQueueConfig;
use crate::dispatcher::{Persistence, TypeDispatcher};
use crate::error::{ConfigError, QueueError};
use crate::hub::{ListenerError, ListenerId, NotificationHub};
use crate::operation::{OperationId, OperationRecord, OperationStatus, SavePayload};
use crate::retry::{RetryDecision, RetryPolicy};
use crate::scheduler::{self, WorkerCommand};
use crate::stats::Statistics;
use crate::store::OperationStore;

/// State shared by the handle(s) and the worker task.
pub(crate) struct QueueCore {
    pub(crate) config: SaveQueueConfig,
    pub(crate) dispatcher: TypeDispatcher,
    pub(crate) retry: RetryPolicy,
    pub(crate) busy: AtomicBool,
    pub(crate) cycles: AtomicU64,
    store: Mutex<OperationStore>,
    hub: NotificationHub,
}

impl QueueCore {
    /// Never hold the guard across an `.await` or while listeners run.
    pub(crate) fn store(&self) -> MutexGuard<'_, OperationStore> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Push the current snapshot to every listener.
    pub(crate) fn notify(&self) {
        if self.hub.is_empty() {
            return;
        }
        let snapshot = self.store().snapshot();
        self.hub.publish(&snapshot);
    }

    fn statistics(&self) -> Statistics {
        let store = self.store();
        Statistics::collect(
            &store,
            self.busy.load(Ordering::SeqCst),
            self.cycles.load(Ordering::SeqCst),
        )
    }
}

/// Asynchronous write-back queue for documents, characters, projects and
/// settings.
///
/// `enqueue` records the operation and returns immediately; a dedicated
/// worker task persists queued operations in batches, retries failures with
/// linear backoff and reports every status change to subscribers.
///
/// The handle is cheap to clone; all clones drive the same queue.
#[derive(Clone)]
pub struct SaveQueue {
    core: Arc<QueueCore>,
    commands: mpsc::UnboundedSender<WorkerCommand>,
    worker: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl std::fmt::Debug for SaveQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SaveQueue")
            .field("config", &self.core.config)
            .field("statistics", &self.core.statistics())
            .finish()
    }
}

impl SaveQueue {
    /// Start a queue and its worker task.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start<P>(config: SaveQueueConfig, persistence: P) -> Result<Self, ConfigError>
    where
        P: Persistence + 'static,
    {
        config.validate()?;

        let core = Arc::new(QueueCore {
            dispatcher: TypeDispatcher::new(Arc::new(persistence), config.dispatch_timeout),
            retry: RetryPolicy::from(&config),
            busy: AtomicBool::new(false),
            cycles: AtomicU64::new(0),
            store: Mutex::new(OperationStore::new()),
            hub: NotificationHub::new(),
            config,
        });

        let (commands, receiver) = mpsc::unbounded_channel();
        let worker = tokio::spawn(scheduler::run_worker(core.clone(), receiver));

        Ok(Self {
            core,
            commands,
            worker: Arc::new(Mutex::new(Some(worker))),
        })
    }

    pub fn config(&self) -> &SaveQueueConfig {
        &self.core.config
    }

    /// Record a save request and schedule it. Never fails.
    ///
    /// The payload is not validated or copied: the entity is read when the
    /// operation is dispatched.
    pub fn enqueue(&self, payload: impl Into<SavePayload>) -> OperationId {
        let record = OperationRecord::new(payload.into());
        let id = record.id.clone();
        debug!(operation_id = %id, kind = %record.kind, "operation enqueued");

        self.core.store().insert(record);
        self.core.notify();
        self.trigger();
        id
    }

    /// Snapshot of every operation, in insertion order.
    pub fn operations(&self) -> Vec<OperationRecord> {
        self.core.store().snapshot()
    }

    pub fn operation(&self, id: &OperationId) -> Option<OperationRecord> {
        self.core.store().get(id).cloned()
    }

    /// Operations that are `pending` or `saving`.
    pub fn pending_operations(&self) -> Vec<OperationRecord> {
        self.core.store().filtered(|r| r.status.is_in_flight())
    }

    /// Operations that exhausted their retries.
    pub fn failed_operations(&self) -> Vec<OperationRecord> {
        self.core
            .store()
            .filtered(|r| r.status == OperationStatus::Error)
    }

    /// Reset every failed operation (`retry_count = 0`, no error) and queue
    /// it again. Returns how many were re-queued.
    pub fn retry_failed_operations(&self) -> usize {
        let requeued = self.core.store().requeue_failed();
        info!(count = requeued.len(), "retrying failed operations");

        if !requeued.is_empty() {
            self.core.notify();
        }
        self.trigger();
        requeued.len()
    }

    /// Drop every `saved` operation. Returns how many were removed.
    pub fn clear_completed_operations(&self) -> usize {
        let removed = self.core.store().remove_saved();
        debug!(count = removed, "cleared completed operations");

        if removed > 0 {
            self.core.notify();
        }
        removed
    }

    /// Persist every `pending`/`saving` operation right now, one after the
    /// other, bypassing batching.
    ///
    /// Failures go through the retry policy like any other dispatch: the
    /// retry count grows and the operation is left `pending` for the worker,
    /// or ends `error` once retries are used up. No backoff is awaited here.
    /// Records the worker is saving at the same moment are dispatched again;
    /// there is no claim between the two paths.
    pub async fn force_save_all(&self) {
        let targets: Vec<OperationId> = self
            .pending_operations()
            .into_iter()
            .map(|r| r.id)
            .collect();
        info!(count = targets.len(), "force-saving in-flight operations");

        for id in targets {
            let payload = self.core.store().begin_forced_save(&id);
            let Some(payload) = payload else {
                continue;
            };
            self.core.notify();

            let result = self.core.dispatcher.dispatch(&payload).await;
            match result {
                Ok(()) => {
                    self.core.store().complete(&id);
                    debug!(operation_id = %id, "operation force-saved");
                }
                Err(err) => {
                    let decision = self.core.store().fail(&id, &err, &self.core.retry);
                    match decision {
                        Some(RetryDecision::Retry { retry_count, .. }) => {
                            warn!(
                                operation_id = %id,
                                retry_count,
                                error = %err,
                                "force-save failed; left for the worker"
                            );
                            self.trigger();
                        }
                        Some(RetryDecision::GiveUp { retry_count }) => {
                            error!(
                                operation_id = %id,
                                retry_count,
                                error = %err,
                                "force-save failed permanently"
                            );
                        }
                        None => {}
                    }
                }
            }
            self.core.notify();
        }
    }

    /// Register a listener. It receives a fresh snapshot of every operation
    /// after each state change.
    pub fn subscribe<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&[OperationRecord]) -> Result<(), ListenerError> + Send + Sync + 'static,
    {
        self.core.hub.subscribe(listener)
    }

    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        self.core.hub.unsubscribe(id)
    }

    pub fn statistics(&self) -> Statistics {
        self.core.statistics()
    }

    /// Resolve once the worker has drained the pending queue, retries
    /// included.
    pub async fn wait_idle(&self) -> Result<(), QueueError> {
        let (done, finished) = oneshot::channel();
        self.commands
            .send(WorkerCommand::Flush(done))
            .map_err(|_| QueueError::WorkerStopped)?;
        finished.await.map_err(|_| QueueError::WorkerStopped)
    }

    /// Drain the queue, stop the worker and wait for it to exit.
    ///
    /// Operations enqueued afterwards are recorded but never dispatched.
    pub async fn shutdown(&self) {
        if self.commands.send(WorkerCommand::Shutdown).is_err() {
            debug!("save queue worker already stopped");
        }

        let worker = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(worker) = worker {
            if let Err(err) = worker.await {
                error!(error = %err, "save queue worker terminated abnormally");
            }
        }
    }

    fn trigger(&self) {
        if self.commands.send(WorkerCommand::Trigger).is_err() {
            warn!("save queue worker is not running; operation stays pending");
        }
    }
}
