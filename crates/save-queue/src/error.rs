//! Error types for the save queue.
//!
//! Persistence and listener failures never escape the public API; they end up
//! on operation records (`error`) or in the logs. The types below describe
//! them where they are produced.

use std::time::Duration;

/// Failure reported by a [`Persistence`](crate::Persistence) call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct PersistError {
    message: String,
}

impl PersistError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<String> for PersistError {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

impl From<&str> for PersistError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

/// Failure of one dispatched operation.
///
/// The `Display` output is what lands in `OperationRecord::error`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DispatchError {
    #[error("{0}")]
    Persistence(#[from] PersistError),

    /// A settings operation failed part-way. Keys in `written` are already
    /// persisted and are not rolled back.
    #[error(
        "settings key `{key}` failed after {} key(s) were already saved ({}): {source}",
        .written.len(),
        .written.join(", ")
    )]
    PartialSettings {
        written: Vec<String>,
        key: String,
        #[source]
        source: PersistError,
    },

    #[error("persist call timed out after {0:?}")]
    TimedOut(Duration),

    #[error("persist call panicked: {0}")]
    Panicked(String),
}

/// Best-effort text of a caught panic payload.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "non-string panic payload"
    }
}

/// Configuration error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("malformed value for {key}: {value:?}")]
    Malformed { key: &'static str, value: String },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Error from the queue's control surface.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueueError {
    #[error("save queue worker has stopped")]
    WorkerStopped,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_settings_message_lists_written_keys() {
        let err = DispatchError::PartialSettings {
            written: vec!["autosave".into(), "font_size".into()],
            key: "theme".into(),
            source: PersistError::new("quota exceeded"),
        };

        assert_eq!(
            err.to_string(),
            "settings key `theme` failed after 2 key(s) were already saved (autosave, font_size): quota exceeded"
        );
    }

    #[test]
    fn persistence_error_is_transparent() {
        let err: DispatchError = PersistError::from("network unreachable").into();
        assert_eq!(err.to_string(), "network unreachable");
    }
}
