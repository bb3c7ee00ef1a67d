//! In-memory coordination store for testing.

use crate::error::{StoreError, StoreResult};
use crate::path::Path;
use crate::store::{CoordinationStore, StoreOperation};
use parking_lot::{Condvar, Mutex, RwLock};
use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::{self, ThreadId};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Default)]
struct Node {
    data: Vec<u8>,
    children: BTreeSet<String>,
}

#[derive(Debug)]
struct LockHolder {
    owner: ThreadId,
    depth: usize,
}

/// Reverse of an applied operation, used to undo a partially applied commit.
enum Undo {
    Remove(Path),
    Restore(Path, Vec<u8>),
    Reinsert(Path, Node),
}

/// An in-memory coordination store.
///
/// This store keeps the whole tree in memory and is suitable for:
/// - Unit tests
/// - Integration tests and benchmarks
/// - Single-process deployments that don't need replication
///
/// # Thread Safety
///
/// The store is thread-safe and can be shared across threads. Commits are
/// serialized by a write lock, which makes them linearizable.
///
/// # Example
///
/// ```rust
/// use noderepo_store::{CoordinationStore, InMemoryStore, Path, StoreOperation};
///
/// let store = InMemoryStore::new();
/// assert!(store.create(&Path::from_string("/a")).unwrap());
/// store
///     .commit(&[StoreOperation::Create {
///         path: Path::from_string("/a/b"),
///         data: b"hello".to_vec(),
///     }])
///     .unwrap();
/// assert_eq!(store.children(&Path::from_string("/a")).unwrap(), vec!["b"]);
/// ```
#[derive(Debug)]
pub struct InMemoryStore {
    nodes: RwLock<HashMap<Path, Node>>,
    locks: Mutex<HashMap<Path, LockHolder>>,
    lock_released: Condvar,
    reads: AtomicU64,
    commits: AtomicU64,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        let mut nodes = HashMap::new();
        nodes.insert(Path::root(), Node::default());
        Self {
            nodes: RwLock::new(nodes),
            locks: Mutex::new(HashMap::new()),
            lock_released: Condvar::new(),
            reads: AtomicU64::new(0),
            commits: AtomicU64::new(0),
        }
    }
}

impl InMemoryStore {
    /// Creates a new store holding only the root node.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of `children` and `data` calls served so far.
    ///
    /// Useful for asserting that a cache did not reach the store.
    #[must_use]
    pub fn read_count(&self) -> u64 {
        self.reads.load(Ordering::Relaxed)
    }

    /// Returns the number of successful multi-operation commits.
    #[must_use]
    pub fn commit_count(&self) -> u64 {
        self.commits.load(Ordering::Relaxed)
    }

    /// Returns the number of nodes, including the root.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.read().len()
    }

    fn apply(
        nodes: &mut HashMap<Path, Node>,
        operation: &StoreOperation,
    ) -> StoreResult<Undo> {
        match operation {
            StoreOperation::Create { path, data } => {
                let (parent, name) = split_parent(path)?;
                if nodes.contains_key(path) {
                    return Err(StoreError::NodeExists(path.clone()));
                }
                let parent_node = nodes
                    .get_mut(&parent)
                    .ok_or_else(|| StoreError::NoNode(parent.clone()))?;
                parent_node.children.insert(name);
                nodes.insert(
                    path.clone(),
                    Node {
                        data: data.clone(),
                        children: BTreeSet::new(),
                    },
                );
                Ok(Undo::Remove(path.clone()))
            }
            StoreOperation::SetData { path, data } => {
                let node = nodes
                    .get_mut(path)
                    .ok_or_else(|| StoreError::NoNode(path.clone()))?;
                let previous = std::mem::replace(&mut node.data, data.clone());
                Ok(Undo::Restore(path.clone(), previous))
            }
            StoreOperation::Delete { path } => {
                let (parent, name) = split_parent(path)?;
                match nodes.get(path) {
                    None => return Err(StoreError::NoNode(path.clone())),
                    Some(node) if !node.children.is_empty() => {
                        return Err(StoreError::NotEmpty(path.clone()))
                    }
                    Some(_) => {}
                }
                if let Some(parent_node) = nodes.get_mut(&parent) {
                    parent_node.children.remove(&name);
                }
                let removed = nodes.remove(path).unwrap_or_default();
                Ok(Undo::Reinsert(path.clone(), removed))
            }
        }
    }

    fn revert(nodes: &mut HashMap<Path, Node>, undo: Undo) {
        match undo {
            Undo::Remove(path) => {
                nodes.remove(&path);
                if let (Some(parent), Some(name)) = (path.parent(), path.name()) {
                    if let Some(parent_node) = nodes.get_mut(&parent) {
                        parent_node.children.remove(name);
                    }
                }
            }
            Undo::Restore(path, data) => {
                if let Some(node) = nodes.get_mut(&path) {
                    node.data = data;
                }
            }
            Undo::Reinsert(path, node) => {
                if let (Some(parent), Some(name)) = (path.parent(), path.name()) {
                    if let Some(parent_node) = nodes.get_mut(&parent) {
                        parent_node.children.insert(name.to_owned());
                    }
                }
                nodes.insert(path, node);
            }
        }
    }

    fn create_recursively(nodes: &mut HashMap<Path, Node>, path: &Path, data: &[u8]) -> bool {
        if nodes.contains_key(path) {
            return false;
        }
        if let Some(parent) = path.parent() {
            Self::create_recursively(nodes, &parent, &[]);
            if let (Some(parent_node), Some(name)) = (nodes.get_mut(&parent), path.name()) {
                parent_node.children.insert(name.to_owned());
            }
        }
        nodes.insert(
            path.clone(),
            Node {
                data: data.to_vec(),
                children: BTreeSet::new(),
            },
        );
        true
    }
}

fn split_parent(path: &Path) -> StoreResult<(Path, String)> {
    match (path.parent(), path.name()) {
        (Some(parent), Some(name)) => Ok((parent, name.to_owned())),
        _ => Err(StoreError::invalid_path(path, "operation not allowed on root")),
    }
}

impl CoordinationStore for InMemoryStore {
    fn children(&self, path: &Path) -> StoreResult<Vec<String>> {
        self.reads.fetch_add(1, Ordering::Relaxed);
        Ok(self
            .nodes
            .read()
            .get(path)
            .map(|node| node.children.iter().cloned().collect())
            .unwrap_or_default())
    }

    fn data(&self, path: &Path) -> StoreResult<Option<Vec<u8>>> {
        self.reads.fetch_add(1, Ordering::Relaxed);
        Ok(self.nodes.read().get(path).map(|node| node.data.clone()))
    }

    fn exists(&self, path: &Path) -> StoreResult<bool> {
        Ok(self.nodes.read().contains_key(path))
    }

    fn create(&self, path: &Path) -> StoreResult<bool> {
        Ok(Self::create_recursively(&mut self.nodes.write(), path, &[]))
    }

    fn commit(&self, operations: &[StoreOperation]) -> StoreResult<()> {
        let mut nodes = self.nodes.write();
        let mut applied = Vec::with_capacity(operations.len());

        for operation in operations {
            match Self::apply(&mut nodes, operation) {
                Ok(undo) => applied.push(undo),
                Err(e) => {
                    while let Some(undo) = applied.pop() {
                        Self::revert(&mut nodes, undo);
                    }
                    return Err(e);
                }
            }
        }

        self.commits.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn compare_and_set(
        &self,
        path: &Path,
        expected: Option<&[u8]>,
        new: &[u8],
    ) -> StoreResult<bool> {
        let mut nodes = self.nodes.write();
        let Some(expected) = expected else {
            return Ok(Self::create_recursively(&mut nodes, path, new));
        };
        match nodes.get_mut(path) {
            Some(node) if node.data == expected => {
                node.data = new.to_vec();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn acquire_lock(&self, path: &Path, timeout: Duration) -> StoreResult<()> {
        let me = thread::current().id();
        // A timeout too large to add to the clock means waiting indefinitely.
        let deadline = Instant::now().checked_add(timeout);
        let mut locks = self.locks.lock();

        loop {
            match locks.get_mut(path) {
                None => {
                    locks.insert(path.clone(), LockHolder { owner: me, depth: 1 });
                    return Ok(());
                }
                Some(holder) if holder.owner == me => {
                    holder.depth += 1;
                    return Ok(());
                }
                Some(_) => match deadline {
                    Some(deadline) => {
                        if self.lock_released.wait_until(&mut locks, deadline).timed_out()
                            && locks.contains_key(path)
                        {
                            return Err(StoreError::LockTimeout {
                                path: path.clone(),
                                timeout,
                            });
                        }
                    }
                    None => self.lock_released.wait(&mut locks),
                },
            }
        }
    }

    fn release_lock(&self, path: &Path) -> StoreResult<()> {
        let me = thread::current().id();
        let mut locks = self.locks.lock();

        let holder = match locks.get_mut(path) {
            Some(holder) if holder.owner == me => holder,
            _ => return Err(StoreError::NotLockOwner(path.clone())),
        };
        holder.depth -= 1;
        if holder.depth == 0 {
            locks.remove(path);
            self.lock_released.notify_all();
        }
        Ok(())
    }
}
