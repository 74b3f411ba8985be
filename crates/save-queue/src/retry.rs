//! Retry controller: what happens to an operation after a failed dispatch.

use std::time::Duration;

use crate::config::SaveQueueConfig;
use crate::error::DispatchError;
use crate::operation::{OperationRecord, OperationStatus};

/// Linear backoff policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Failed attempts after which the operation is given up.
    pub max_retries: u32,
    /// Backoff unit; attempt `n` waits `base_delay * n`.
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
        }
    }

    /// Delay before the `retry_count`-th retry (1-indexed).
    pub fn delay_for(&self, retry_count: u32) -> Duration {
        self.base_delay.saturating_mul(retry_count)
    }

    pub fn should_retry(&self, retry_count: u32) -> bool {
        retry_count < self.max_retries
    }
}

impl From<&SaveQueueConfig> for RetryPolicy {
    fn from(config: &SaveQueueConfig) -> Self {
        Self::new(config.max_retries, config.retry_delay)
    }
}

/// Outcome of [`record_failure`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Back to `pending`; the caller re-enqueues and then waits `delay`.
    Retry { retry_count: u32, delay: Duration },
    /// Retries exhausted; the record is now `error`.
    GiveUp { retry_count: u32 },
}

/// Apply a dispatch failure to `record` and decide whether to retry.
///
/// Increments `retry_count`, stores the failure message, and moves the
/// record to `pending` or `error`.
pub fn record_failure(
    record: &mut OperationRecord,
    error: &DispatchError,
    policy: &RetryPolicy,
) -> RetryDecision {
    record.retry_count = record.retry_count.saturating_add(1);
    record.error = Some(error.to_string());

    if policy.should_retry(record.retry_count) {
        record.status = OperationStatus::Pending;
        RetryDecision::Retry {
            retry_count: record.retry_count,
            delay: policy.delay_for(record.retry_count),
        }
    } else {
        record.status = OperationStatus::Error;
        RetryDecision::GiveUp {
            retry_count: record.retry_count,
        }
    }
}
