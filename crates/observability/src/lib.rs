//! Tracing/logging setup shared by every binary in the workspace.

pub use crate::tracing::LogFormat;

/// Initialize process-wide observability (tracing/logging).
///
/// Filter from `RUST_LOG` (default `info`), format from
/// `INKWELL_LOG_FORMAT` (default JSON). Safe to call multiple times;
/// subsequent calls become no-ops.
pub fn init() {
    tracing::init("info", LogFormat::from_env());
}

/// Tracing configuration (filters, formats).
pub mod tracing;
