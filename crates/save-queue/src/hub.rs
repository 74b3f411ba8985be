//! Notification hub: pushes operation snapshots to registered listeners.
//!
//! Delivery is synchronous and in registration order. A listener that
//! returns an error or panics is logged and skipped; the remaining
//! listeners still run.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::warn;

use crate::error::panic_message;
use crate::operation::OperationRecord;

/// What a listener may return instead of panicking.
pub type ListenerError = anyhow::Error;

/// Listener callback. Receives a fresh snapshot of every operation.
pub type Listener = dyn Fn(&[OperationRecord]) -> Result<(), ListenerError> + Send + Sync;

/// Handle returned by [`NotificationHub::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

#[derive(Default)]
pub struct NotificationHub {
    next_id: AtomicU64,
    listeners: Mutex<Vec<(ListenerId, Arc<Listener>)>>,
}

impl std::fmt::Debug for NotificationHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationHub")
            .field("listeners", &self.len())
            .finish()
    }
}

impl NotificationHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&[OperationRecord]) -> Result<(), ListenerError> + Send + Sync + 'static,
    {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let listener: Arc<Listener> = Arc::new(listener);
        self.listeners().push((id, listener));
        id
    }

    /// Returns false when `id` was not registered.
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners();
        let before = listeners.len();
        listeners.retain(|(lid, _)| *lid != id);
        listeners.len() != before
    }

    pub fn len(&self) -> usize {
        self.listeners().len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners().is_empty()
    }

    /// Deliver `snapshot` to every listener. Returns how many succeeded.
    ///
    /// The listener list is copied first, so listeners may subscribe or
    /// unsubscribe from inside a callback.
    pub fn publish(&self, snapshot: &[OperationRecord]) -> usize {
        let listeners: Vec<_> = self.listeners().clone();
        let mut delivered = 0;

        for (id, listener) in listeners {
            match panic::catch_unwind(AssertUnwindSafe(|| listener(snapshot))) {
                Ok(Ok(())) => delivered += 1,
                Ok(Err(err)) => {
                    warn!(listener = id.0, error = %err, "save queue listener failed");
                }
                Err(payload) => {
                    warn!(
                        listener = id.0,
                        panic = panic_message(payload.as_ref()),
                        "save queue listener panicked"
                    );
                }
            }
        }

        delivered
    }

    fn listeners(&self) -> MutexGuard<'_, Vec<(ListenerId, Arc<Listener>)>> {
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
