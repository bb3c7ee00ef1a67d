//! Error types for the node repository core.

use noderepo_store::{Path, StoreError};
use std::time::Duration;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in node repository core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Coordination store error.
    #[error("store error: {0}")]
    Store(#[source] StoreError),

    /// A lock was not acquired before its deadline. Safe to retry.
    #[error("could not acquire lock {path} within {timeout:?}")]
    LockTimeout {
        /// The lock path.
        path: Path,
        /// How long the caller waited.
        timeout: Duration,
    },

    /// Operation not permitted in the current state.
    #[error("invalid operation: {message}")]
    InvalidOperation {
        /// Description of why the operation is invalid.
        message: String,
    },

    /// A transaction failed to commit.
    #[error("transaction failed: {reason}")]
    TransactionFailed {
        /// Reason for the failure.
        reason: String,
    },

    /// The same hostname appeared more than once in a single write.
    #[error("duplicate node: {hostname}")]
    DuplicateNode {
        /// The repeated hostname.
        hostname: String,
    },

    /// A node expected to exist was not found.
    #[error("node not found: {hostname}")]
    NodeNotFound {
        /// The missing hostname.
        hostname: String,
    },
}

impl From<StoreError> for CoreError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::LockTimeout { path, timeout } => Self::LockTimeout { path, timeout },
            other => Self::Store(other),
        }
    }
}

impl CoreError {
    /// Creates an invalid operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }

    /// Creates a transaction failed error.
    pub fn transaction_failed(reason: impl Into<String>) -> Self {
        Self::TransactionFailed {
            reason: reason.into(),
        }
    }

    /// Returns true if the caller may retry the operation later.
    ///
    /// Lock timeouts and store unavailability are retryable; callers
    /// typically turn them into a "try again" response.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::LockTimeout { .. } => true,
            Self::Store(e) => e.is_retryable(),
            _ => false,
        }
    }
}
