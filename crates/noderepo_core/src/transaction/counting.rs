//! Transactions that advance the generation counter.
//!
//! Every cache in the fleet treats a generation change as "something may
//! have changed". A commit attempt that fails after the store partially
//! applied it must therefore still advance the counter. Two variants exist:
//!
//! - [`CountingTransaction`] increments after the commit attempt, on every
//!   exit path. This is the default.
//! - [`EagerCountingTransaction`] increments during `prepare`, before any
//!   operation is applied, and again after the commit attempt. The first
//!   increment drops sessions built before the write started. A reader
//!   that builds a session while the commit is in flight may cache the
//!   old state under the new generation, so the second increment is what
//!   makes the committed state visible to every read that starts after
//!   `commit` returns.
//!
//! If the increment itself fails, caches stay stale until the next
//! successful write. That failure is logged and never masks the commit
//! result.

use crate::error::CoreResult;
use crate::transaction::state::TransactionState;
use crate::transaction::store::StoreTransaction;
use crate::transaction::Transaction;
use noderepo_store::{CoordinationStore, Counter, Path, StoreOperation};
use std::any::Any;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// Advances the counter when dropped, whatever happened in between.
struct AdvanceOnDrop<'a> {
    counter: &'a Counter,
}

impl Drop for AdvanceOnDrop<'_> {
    fn drop(&mut self) {
        match self.counter.next() {
            Ok(generation) => debug!(generation, "advanced generation after commit"),
            Err(e) => warn!(
                error = %e,
                counter = %self.counter.path(),
                "failed to advance generation after commit, caches stay stale until the next write"
            ),
        }
    }
}

macro_rules! delegate_operations {
    ($ty:ty) => {
        impl $ty {
            /// Returns the current state.
            #[must_use]
            pub fn state(&self) -> TransactionState {
                self.inner.state()
            }

            /// Returns the queued operations.
            #[must_use]
            pub fn operations(&self) -> &[StoreOperation] {
                self.inner.operations()
            }

            /// Queues an arbitrary operation.
            pub fn add(&mut self, operation: StoreOperation) -> CoreResult<()> {
                self.inner.add(operation)
            }

            /// Queues creation of a node with an empty payload.
            pub fn create(&mut self, path: Path) -> CoreResult<()> {
                self.inner.create(path)
            }

            /// Queues creation of a node with a payload.
            pub fn create_with_data(
                &mut self,
                path: Path,
                data: impl Into<Vec<u8>>,
            ) -> CoreResult<()> {
                self.inner.create_with_data(path, data)
            }

            /// Queues replacement of an existing node's payload.
            pub fn set_data(&mut self, path: Path, data: impl Into<Vec<u8>>) -> CoreResult<()> {
                self.inner.set_data(path, data)
            }

            /// Queues deletion of a childless node.
            pub fn delete(&mut self, path: Path) -> CoreResult<()> {
                self.inner.delete(path)
            }
        }
    };
}

/// A store transaction that advances the generation after every commit
/// attempt, successful or not.
///
/// Obtain one through [`crate::GenerationDatabase::new_transaction_in`] and
/// commit the enclosing [`crate::NestedTransaction`], not this handle.
pub struct CountingTransaction {
    inner: StoreTransaction,
    counter: Counter,
}

impl CountingTransaction {
    /// Creates a counting transaction against `store`, advancing `counter`.
    pub fn new(store: Arc<dyn CoordinationStore>, counter: Counter) -> Self {
        Self {
            inner: StoreTransaction::new(store),
            counter,
        }
    }
}

delegate_operations!(CountingTransaction);

impl Transaction for CountingTransaction {
    fn prepare(&mut self) -> CoreResult<()> {
        // Fails fast when the store is unreachable.
        self.counter.get()?;
        self.inner.prepare()
    }

    fn commit(&mut self) -> CoreResult<()> {
        let _advance = AdvanceOnDrop {
            counter: &self.counter,
        };
        self.inner.commit()
    }

    fn rollback_or_log(&mut self) {
        self.inner.rollback_or_log();
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

impl fmt::Debug for CountingTransaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CountingTransaction")
            .field("inner", &self.inner)
            .field("counter", &self.counter)
            .finish()
    }
}

/// A store transaction that advances the generation while preparing and
/// again after every commit attempt.
pub struct EagerCountingTransaction {
    inner: StoreTransaction,
    counter: Counter,
}

impl EagerCountingTransaction {
    /// Creates an eager counting transaction against `store`.
    pub fn new(store: Arc<dyn CoordinationStore>, counter: Counter) -> Self {
        Self {
            inner: StoreTransaction::new(store),
            counter,
        }
    }
}

delegate_operations!(EagerCountingTransaction);

impl Transaction for EagerCountingTransaction {
    fn prepare(&mut self) -> CoreResult<()> {
        let generation = self.counter.next()?;
        debug!(generation, "advanced generation before commit");
        self.inner.prepare()
    }

    fn commit(&mut self) -> CoreResult<()> {
        let _advance = AdvanceOnDrop {
            counter: &self.counter,
        };
        self.inner.commit()
    }

    fn rollback_or_log(&mut self) {
        self.inner.rollback_or_log();
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

impl fmt::Debug for EagerCountingTransaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EagerCountingTransaction")
            .field("inner", &self.inner)
            .field("counter", &self.counter)
            .finish()
    }
}
