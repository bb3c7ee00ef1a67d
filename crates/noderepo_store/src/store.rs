//! Coordination store trait definition.

use crate::error::StoreResult;
use crate::path::Path;
use std::time::Duration;

/// A single operation in an atomic multi-operation commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreOperation {
    /// Create a node. The parent must exist and the node must not.
    Create {
        /// Node to create.
        path: Path,
        /// Initial payload.
        data: Vec<u8>,
    },
    /// Replace the payload of an existing node.
    SetData {
        /// Node to update.
        path: Path,
        /// New payload.
        data: Vec<u8>,
    },
    /// Delete an existing node that has no children.
    Delete {
        /// Node to delete.
        path: Path,
    },
}

impl StoreOperation {
    /// Returns the path this operation targets.
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::Create { path, .. } | Self::SetData { path, .. } | Self::Delete { path } => path,
        }
    }
}

/// A linearizable hierarchical key-value store with locks.
///
/// This is the ZooKeeper-shaped surface the node repository consumes.
/// Implementations own durability, replication and fencing; callers only
/// see the operations below.
///
/// # Invariants
///
/// - `children` is sorted and returns an empty list for a missing node
/// - `data` returns `None` for a missing node and `Some(empty)` for a node
///   created without a payload
/// - `commit` applies all operations or none of them
/// - locks are reentrant for the thread that holds them
/// - implementations must be `Send + Sync`
pub trait CoordinationStore: Send + Sync {
    /// Returns the sorted child names of `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn children(&self, path: &Path) -> StoreResult<Vec<String>>;

    /// Returns the payload stored at `path`, if the node exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn data(&self, path: &Path) -> StoreResult<Option<Vec<u8>>>;

    /// Returns true if a node exists at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn exists(&self, path: &Path) -> StoreResult<bool>;

    /// Creates `path` and any missing ancestors with empty payloads.
    ///
    /// Returns `true` if `path` did not exist before this call.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be written.
    fn create(&self, path: &Path) -> StoreResult<bool>;

    /// Atomically applies all `operations`.
    ///
    /// # Errors
    ///
    /// Returns an error, leaving the store unchanged, if any operation's
    /// precondition fails.
    fn commit(&self, operations: &[StoreOperation]) -> StoreResult<()>;

    /// Replaces the payload at `path` with `new` if it currently equals
    /// `expected`.
    ///
    /// `expected == None` means the node must not exist; it is then created
    /// together with any missing ancestors. Returns `false` on mismatch.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read or written.
    fn compare_and_set(&self, path: &Path, expected: Option<&[u8]>, new: &[u8])
        -> StoreResult<bool>;

    /// Acquires the distributed lock at `path`, blocking up to `timeout`.
    ///
    /// Acquiring a lock the calling thread already holds succeeds at once and
    /// must be matched by an extra `release_lock`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::StoreError::LockTimeout`] if the lock is not acquired
    /// in time.
    fn acquire_lock(&self, path: &Path, timeout: Duration) -> StoreResult<()>;

    /// Releases one hold of the lock at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::StoreError::NotLockOwner`] if the calling thread does
    /// not hold the lock.
    fn release_lock(&self, path: &Path) -> StoreResult<()>;
}
