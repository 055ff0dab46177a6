//! Error types for monitor operations.

use thiserror::Error;

/// Errors reported by [`ActivityMonitor`](crate::ActivityMonitor) operations.
///
/// All failures are local and synchronous: they are returned to the caller of
/// the offending operation, and nothing fails asynchronously once a monitor
/// is running.
#[derive(Debug, Error)]
pub enum MonitorError {
    /// A state or elapsed-time query was made before `start`.
    #[error("monitor has not been started")]
    NotStarted,

    /// A configuration was rejected, either at `start` or when loading from
    /// a file.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}
