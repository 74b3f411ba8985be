//! `inkwell-save-queue`
//!
//! **Responsibility:** in-process, asynchronous write-back of edits made in
//! the writing app (documents, characters, projects, settings).
//!
//! ## Flow
//!
//! ```text
//! enqueue → Operation Store + Pending Queue → worker cycle (batch, group by kind)
//!         → Type Dispatcher → Persistence
//!         → on failure: Retry Controller (re-enqueue + linear backoff, or error)
//!         → on every change: Notification Hub → listeners
//! ```
//!
//! ## Guarantees (and non-guarantees)
//!
//! - In-memory only: a crash loses every operation not yet saved.
//! - At-least-once towards storage at best; no exactly-once, no conflict
//!   resolution between overlapping edits of the same entity.
//! - Failures never surface as errors from the public API; observe them via
//!   [`SaveQueue::failed_operations`], [`SaveQueue::statistics`] or a
//!   listener.
//! - A settings operation is not atomic: keys saved before a failing key
//!   stay saved even though the whole operation ends up `error`.

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod hub;
pub mod in_memory;
pub mod operation;
pub mod queue;
pub mod retry;
mod scheduler;
pub mod stats;
pub mod store;

pub use config::SaveQueueConfig;
pub use dispatcher::{Persistence, TypeDispatcher};
pub use error::{ConfigError, DispatchError, PersistError, QueueError};
pub use hub::{ListenerError, ListenerId, NotificationHub};
pub use in_memory::InMemoryPersistence;
pub use operation::{
    OperationId, OperationKind, OperationRecord, OperationStatus, SavePayload, Shared,
};
pub use queue::SaveQueue;
pub use retry::{RetryDecision, RetryPolicy};
pub use stats::Statistics;
pub use store::OperationStore;
