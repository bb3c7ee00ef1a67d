//! Error types for coordination store operations.

use crate::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur during coordination store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The node (or its parent, for creates) does not exist.
    #[error("no node at {0}")]
    NoNode(Path),

    /// A create operation targeted a node that already exists.
    #[error("node already exists at {0}")]
    NodeExists(Path),

    /// A delete operation targeted a node that still has children.
    #[error("node at {0} has children")]
    NotEmpty(Path),

    /// The operation is not valid for the given path.
    #[error("invalid path {path}: {reason}")]
    InvalidPath {
        /// The offending path.
        path: Path,
        /// Why the path was rejected.
        reason: String,
    },

    /// A lock could not be acquired before the deadline.
    #[error("timed out after {timeout:?} acquiring lock {path}")]
    LockTimeout {
        /// The lock path.
        path: Path,
        /// The timeout that elapsed.
        timeout: Duration,
    },

    /// The calling thread tried to release a lock it does not hold.
    #[error("lock {0} is not held by the calling thread")]
    NotLockOwner(Path),

    /// The store cannot be reached.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// A compare-and-set loop gave up after too many conflicting writers.
    #[error("gave up updating {path} after {attempts} conflicting attempts")]
    CasExhausted {
        /// The contended path.
        path: Path,
        /// Number of attempts made.
        attempts: u32,
    },

    /// Stored bytes could not be interpreted.
    #[error("corrupted value at {path}: {reason}")]
    Corrupted {
        /// Where the value was read from.
        path: Path,
        /// What was wrong with it.
        reason: String,
    },
}

impl StoreError {
    /// Creates an invalid path error.
    pub fn invalid_path(path: &Path, reason: impl Into<String>) -> Self {
        Self::InvalidPath {
            path: path.clone(),
            reason: reason.into(),
        }
    }

    /// Creates a corrupted value error.
    pub fn corrupted(path: &Path, reason: impl Into<String>) -> Self {
        Self::Corrupted {
            path: path.clone(),
            reason: reason.into(),
        }
    }

    /// Returns true if retrying the operation later may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::LockTimeout { .. } | Self::Unavailable(_) | Self::CasExhausted { .. }
        )
    }
}
