//! A transaction spanning several sub-transactions.

use crate::error::{CoreError, CoreResult};
use crate::transaction::state::TransactionState;
use crate::transaction::Transaction;
use std::fmt;

type Callback = Box<dyn FnOnce() + Send>;

/// An ordered group of sub-transactions committed together.
///
/// `commit` prepares every sub-transaction, then commits them in the order
/// they were added. If any step fails, every sub-transaction is asked to
/// roll back (or log that it cannot) and the first error is returned.
/// Callbacks registered with [`NestedTransaction::on_committed`] run only
/// after every sub-transaction committed.
///
/// A nested transaction commits at most once.
///
/// # Example
///
/// ```rust
/// use noderepo_core::{GenerationDatabase, NestedTransaction};
/// use noderepo_store::{InMemoryStore, Path};
/// use std::sync::Arc;
///
/// let db = GenerationDatabase::new(Arc::new(InMemoryStore::new()), Path::from_string("/gen"), true);
/// let before = db.generation().unwrap();
///
/// let mut nested = NestedTransaction::new();
/// db.new_transaction_in(&mut nested)
///     .create_with_data(Path::from_string("/hello"), b"world".to_vec())
///     .unwrap();
/// nested.commit().unwrap();
///
/// assert!(db.generation().unwrap() > before);
/// ```
#[derive(Default)]
pub struct NestedTransaction {
    transactions: Vec<Box<dyn Transaction>>,
    on_committed: Vec<Callback>,
    state: TransactionState,
}

impl NestedTransaction {
    /// Creates an empty nested transaction.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a sub-transaction and returns a handle to it for adding
    /// operations. Commit the nested transaction, not the handle.
    pub fn add<T: Transaction>(&mut self, transaction: T) -> &mut T {
        self.transactions.push(Box::new(transaction));
        match self
            .transactions
            .last_mut()
            .and_then(|t| t.as_any_mut().downcast_mut::<T>())
        {
            Some(added) => added,
            None => unreachable!("the last sub-transaction is the one just pushed"),
        }
    }

    /// Registers a callback to run after a successful commit.
    pub fn on_committed(&mut self, callback: impl FnOnce() + Send + 'static) {
        self.on_committed.push(Box::new(callback));
    }

    /// Returns the number of sub-transactions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    /// Returns true if there are no sub-transactions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }

    /// Returns the current state.
    #[must_use]
    pub fn state(&self) -> TransactionState {
        self.state
    }

    /// Prepares and commits all sub-transactions.
    ///
    /// # Errors
    ///
    /// Returns the first prepare or commit error, or
    /// [`CoreError::InvalidOperation`] if this transaction already finished.
    pub fn commit(&mut self) -> CoreResult<()> {
        if self.state.is_terminal() {
            return Err(CoreError::invalid_operation(
                "nested transaction already finished",
            ));
        }

        if let Err(e) = self.transactions.iter_mut().try_for_each(|t| t.prepare()) {
            self.fail();
            return Err(e);
        }
        self.state = TransactionState::Prepared;

        if let Err(e) = self.transactions.iter_mut().try_for_each(|t| t.commit()) {
            self.fail();
            return Err(e);
        }
        self.state = TransactionState::Committed;

        for callback in self.on_committed.drain(..) {
            callback();
        }
        Ok(())
    }

    fn fail(&mut self) {
        for transaction in &mut self.transactions {
            transaction.rollback_or_log();
        }
        self.on_committed.clear();
        self.state = TransactionState::Failed;
    }
}

impl fmt::Debug for NestedTransaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NestedTransaction")
            .field("state", &self.state)
            .field("transactions", &self.transactions.len())
            .field("callbacks", &self.on_committed.len())
            .finish()
    }
}
