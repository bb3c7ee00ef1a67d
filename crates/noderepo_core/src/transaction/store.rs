//! Store-level transaction: a list of operations committed atomically.

use crate::error::{CoreError, CoreResult};
use crate::transaction::state::TransactionState;
use crate::transaction::Transaction;
use noderepo_store::{CoordinationStore, Path, StoreOperation};
use std::any::Any;
use std::fmt;
use std::sync::Arc;
use tracing::warn;

/// Operations against one coordination store, applied all-or-nothing.
pub struct StoreTransaction {
    store: Arc<dyn CoordinationStore>,
    operations: Vec<StoreOperation>,
    state: TransactionState,
}

impl StoreTransaction {
    /// Creates an empty transaction against `store`.
    pub fn new(store: Arc<dyn CoordinationStore>) -> Self {
        Self {
            store,
            operations: Vec::new(),
            state: TransactionState::Created,
        }
    }

    /// Returns the current state.
    #[must_use]
    pub fn state(&self) -> TransactionState {
        self.state
    }

    /// Returns the queued operations.
    #[must_use]
    pub fn operations(&self) -> &[StoreOperation] {
        &self.operations
    }

    /// Returns true if no operations are queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Queues an arbitrary operation.
    pub fn add(&mut self, operation: StoreOperation) -> CoreResult<()> {
        self.state.ensure_open()?;
        self.operations.push(operation);
        Ok(())
    }

    /// Queues creation of a node with an empty payload.
    pub fn create(&mut self, path: Path) -> CoreResult<()> {
        self.create_with_data(path, Vec::new())
    }

    /// Queues creation of a node with a payload.
    pub fn create_with_data(&mut self, path: Path, data: impl Into<Vec<u8>>) -> CoreResult<()> {
        self.add(StoreOperation::Create {
            path,
            data: data.into(),
        })
    }

    /// Queues replacement of an existing node's payload.
    pub fn set_data(&mut self, path: Path, data: impl Into<Vec<u8>>) -> CoreResult<()> {
        self.add(StoreOperation::SetData {
            path,
            data: data.into(),
        })
    }

    /// Queues deletion of a childless node.
    pub fn delete(&mut self, path: Path) -> CoreResult<()> {
        self.add(StoreOperation::Delete { path })
    }
}

impl Transaction for StoreTransaction {
    fn prepare(&mut self) -> CoreResult<()> {
        self.state.ensure_open()?;
        self.state = TransactionState::Prepared;
        Ok(())
    }

    fn commit(&mut self) -> CoreResult<()> {
        self.state.ensure_committable()?;
        match self.store.commit(&self.operations) {
            Ok(()) => {
                self.state = TransactionState::Committed;
                Ok(())
            }
            Err(e) => {
                self.state = TransactionState::Failed;
                Err(CoreError::from(e))
            }
        }
    }

    fn rollback_or_log(&mut self) {
        // Store commits are atomic: a failed commit left nothing behind.
        if self.state == TransactionState::Committed {
            warn!(
                operations = self.operations.len(),
                "cannot roll back a committed store transaction"
            );
        }
        self.state = TransactionState::Failed;
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

impl fmt::Debug for StoreTransaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreTransaction")
            .field("state", &self.state)
            .field("operations", &self.operations)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use noderepo_store::InMemoryStore;

    fn create_txn() -> (Arc<InMemoryStore>, StoreTransaction) {
        let store = Arc::new(InMemoryStore::new());
        store.create(&Path::from_string("/r")).unwrap();
        let txn = StoreTransaction::new(store.clone());
        (store, txn)
    }

    #[test]
    fn new_transaction_is_created() {
        let (_, txn) = create_txn();
        assert_eq!(txn.state(), TransactionState::Created);
        assert!(txn.is_empty());
    }

    #[test]
    fn commit_applies_operations() {
        let (store, mut txn) = create_txn();
        txn.create_with_data(Path::from_string("/r/a"), b"1".to_vec()).unwrap();
        txn.create(Path::from_string("/r/b")).unwrap();

        txn.prepare().unwrap();
        txn.commit().unwrap();

        assert_eq!(txn.state(), TransactionState::Committed);
        assert_eq!(store.children(&Path::from_string("/r")).unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn failed_commit_marks_failed() {
        let (store, mut txn) = create_txn();
        txn.create(Path::from_string("/r/a")).unwrap();
        txn.delete(Path::from_string("/r/missing")).unwrap();

        assert!(txn.commit().is_err());
        assert_eq!(txn.state(), TransactionState::Failed);
        assert!(!store.exists(&Path::from_string("/r/a")).unwrap());
    }

    #[test]
    fn cannot_commit_twice() {
        let (_, mut txn) = create_txn();
        txn.commit().unwrap();
        assert!(matches!(txn.commit(), Err(CoreError::InvalidOperation { .. })));
    }

    #[test]
    fn cannot_add_after_prepare() {
        let (_, mut txn) = create_txn();
        txn.prepare().unwrap();
        assert!(txn.create(Path::from_string("/r/late")).is_err());
    }

    #[test]
    fn set_data_replaces_payload() {
        let (store, mut txn) = create_txn();
        txn.set_data(Path::from_string("/r"), b"payload".to_vec()).unwrap();
        txn.commit().unwrap();
        assert_eq!(
            store.data(&Path::from_string("/r")).unwrap(),
            Some(b"payload".to_vec())
        );
    }
}
