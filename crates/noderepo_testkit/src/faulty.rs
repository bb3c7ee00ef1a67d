//! Fault injection for coordination stores.
//!
//! [`FaultyStore`] wraps any store and fails selected calls on demand, so
//! tests can check what happens when a commit or a counter update is lost.
//!
//! ## Usage
//!
//! ```rust
//! use noderepo_testkit::FaultyStore;
//! use noderepo_store::{CoordinationStore, InMemoryStore, Path};
//! use std::sync::Arc;
//!
//! let store = FaultyStore::new(Arc::new(InMemoryStore::new()));
//! store.set_fail_commits(true);
//! assert!(store.commit(&[]).is_err());
//! assert_eq!(store.injected_failures(), 1);
//! ```

use noderepo_store::{CoordinationStore, Path, StoreError, StoreOperation, StoreResult};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// A store wrapper that can fail commits, counter updates or reads.
pub struct FaultyStore {
    inner: Arc<dyn CoordinationStore>,
    fail_commits: AtomicBool,
    fail_compare_and_set: AtomicBool,
    fail_reads: AtomicBool,
    injected: AtomicU64,
}

impl FaultyStore {
    /// Creates a wrapper that forwards everything until told otherwise.
    pub fn new(inner: Arc<dyn CoordinationStore>) -> Self {
        Self {
            inner,
            fail_commits: AtomicBool::new(false),
            fail_compare_and_set: AtomicBool::new(false),
            fail_reads: AtomicBool::new(false),
            injected: AtomicU64::new(0),
        }
    }

    /// Sets whether `commit` fails without touching the inner store.
    pub fn set_fail_commits(&self, fail: bool) {
        self.fail_commits.store(fail, Ordering::SeqCst);
    }

    /// Sets whether `compare_and_set` fails, which breaks counter updates.
    pub fn set_fail_compare_and_set(&self, fail: bool) {
        self.fail_compare_and_set.store(fail, Ordering::SeqCst);
    }

    /// Sets whether `children`, `data` and `exists` fail.
    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Stops injecting failures.
    pub fn reset(&self) {
        self.set_fail_commits(false);
        self.set_fail_compare_and_set(false);
        self.set_fail_reads(false);
    }

    /// Returns how many calls failed because of injection.
    pub fn injected_failures(&self) -> u64 {
        self.injected.load(Ordering::SeqCst)
    }

    /// Returns the wrapped store.
    pub fn inner(&self) -> &Arc<dyn CoordinationStore> {
        &self.inner
    }

    fn check(&self, flag: &AtomicBool, what: &str) -> StoreResult<()> {
        if flag.load(Ordering::SeqCst) {
            self.injected.fetch_add(1, Ordering::SeqCst);
            return Err(StoreError::Unavailable(format!("injected {what} failure")));
        }
        Ok(())
    }
}

impl CoordinationStore for FaultyStore {
    fn children(&self, path: &Path) -> StoreResult<Vec<String>> {
        self.check(&self.fail_reads, "read")?;
        self.inner.children(path)
    }

    fn data(&self, path: &Path) -> StoreResult<Option<Vec<u8>>> {
        self.check(&self.fail_reads, "read")?;
        self.inner.data(path)
    }

    fn exists(&self, path: &Path) -> StoreResult<bool> {
        self.check(&self.fail_reads, "read")?;
        self.inner.exists(path)
    }

    fn create(&self, path: &Path) -> StoreResult<bool> {
        self.check(&self.fail_commits, "create")?;
        self.inner.create(path)
    }

    fn commit(&self, operations: &[StoreOperation]) -> StoreResult<()> {
        self.check(&self.fail_commits, "commit")?;
        self.inner.commit(operations)
    }

    fn compare_and_set(
        &self,
        path: &Path,
        expected: Option<&[u8]>,
        new: &[u8],
    ) -> StoreResult<bool> {
        self.check(&self.fail_compare_and_set, "compare-and-set")?;
        self.inner.compare_and_set(path, expected, new)
    }

    fn acquire_lock(&self, path: &Path, timeout: Duration) -> StoreResult<()> {
        self.inner.acquire_lock(path, timeout)
    }

    fn release_lock(&self, path: &Path) -> StoreResult<()> {
        self.inner.release_lock(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use noderepo_core::{Config, CoreError, DatabaseClient, NestedTransaction, NodeState};
    use noderepo_store::{Counter, InMemoryStore};

    fn setup() -> (Arc<FaultyStore>, DatabaseClient) {
        let store = Arc::new(FaultyStore::new(Arc::new(InMemoryStore::new())));
        let config = Config::new().initial_generation(5);
        let client = DatabaseClient::open(store.clone(), &config).unwrap();
        (store, client)
    }

    #[test]
    fn failed_commit_advances_generation() {
        let (store, client) = setup();
        let before = client.database().generation().unwrap().as_u64();

        store.set_fail_commits(true);
        let mut nested = NestedTransaction::new();
        client
            .write_to(NodeState::Ready, &[crate::json_node("host1", "small")], &mut nested)
            .unwrap();
        let result = nested.commit();

        assert!(matches!(result, Err(CoreError::Store(StoreError::Unavailable(_)))));
        assert!(result.unwrap_err().is_retryable());
        assert_eq!(client.database().generation().unwrap().as_u64(), before + 1);
        assert_eq!(store.injected_failures(), 1);
    }

    #[test]
    fn lost_counter_update_does_not_mask_commit_result() {
        let (store, client) = setup();
        let before = client.database().generation().unwrap().as_u64();

        store.set_fail_compare_and_set(true);
        let mut nested = NestedTransaction::new();
        client
            .write_application(&noderepo_core::ApplicationId::new("t:a:i"), b"x".to_vec(), &mut nested)
            .unwrap();
        nested.commit().unwrap();

        store.reset();
        assert_eq!(client.database().generation().unwrap().as_u64(), before);
        assert!(store.inner().exists(&Path::from_string("/provision/v1/applications/t:a:i")).unwrap());
    }

    #[test]
    fn counter_failure_surfaces_as_retryable() {
        let store = FaultyStore::new(Arc::new(InMemoryStore::new()));
        store.set_fail_compare_and_set(true);
        let counter = Counter::new(Arc::new(store), Path::from_string("/c"));
        let error = counter.next().unwrap_err();
        assert!(error.is_retryable());
    }

    #[test]
    fn read_failure_propagates_from_session() {
        let (store, client) = setup();
        store.set_fail_reads(true);
        assert!(client.read_nodes(&[]).is_err());
        store.reset();
        assert!(client.read_nodes(&[]).unwrap().is_empty());
    }
}
