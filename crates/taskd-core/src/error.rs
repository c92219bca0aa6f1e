//! Domain-specific error types following panic-free policy.

use crate::Pid;
use thiserror::Error;

/// Errors that can occur while taking a snapshot of OS state.
///
/// Most snapshot reads fail soft and never surface an error; only
/// the conditions below are reported to callers.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SnapshotError {
    /// The process exited between enumeration and detail read
    #[error("Process vanished: {pid}")]
    Vanished { pid: Pid },

    /// The process namespace itself could not be enumerated
    #[error("Failed to enumerate {root}: {reason}")]
    Enumeration { root: String, reason: String },
}

/// Result type for snapshot operations.
pub type SnapshotResult<T> = Result<T, SnapshotError>;
