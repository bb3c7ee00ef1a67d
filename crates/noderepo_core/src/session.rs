//! Generation-scoped read sessions.
//!
//! A session is a partial mirror of the store, valid for one generation.
//! [`CachingSession`] memoizes every path it resolves for its whole
//! lifetime; [`PassthroughSession`] reads the store on every call and is used
//! when caching is disabled.

use crate::error::CoreResult;
use crate::stats::{CacheCounters, SessionStats};
use crate::types::Generation;
use bytes::Bytes;
use noderepo_store::{CoordinationStore, Path};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Read access to the store as of (at least) one generation.
///
/// # Invariants
///
/// - `children` is sorted
/// - a missing node has no children and no data; this is not an error
/// - returned buffers are immutable, so callers cannot alter cached state
pub trait Session: Send + Sync {
    /// Returns the generation this session was created for.
    fn generation(&self) -> Generation;

    /// Returns the sorted child names of `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn children(&self, path: &Path) -> CoreResult<Arc<[String]>>;

    /// Returns the payload at `path`, or `None` if there is no such node.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn data(&self, path: &Path) -> CoreResult<Option<Bytes>>;

    /// Returns hit and miss counts for children and data lookups.
    fn stats(&self) -> SessionStats;
}

/// A session that remembers every lookup for its lifetime.
///
/// The first value published for a path is the one every later lookup
/// sees, so repeated reads through one session always agree even if the
/// store changes underneath. Concurrent first reads of the same path may
/// both reach the store; only one result is kept.
pub struct CachingSession {
    generation: Generation,
    store: Arc<dyn CoordinationStore>,
    children: RwLock<HashMap<Path, Arc<[String]>>>,
    data: RwLock<HashMap<Path, Option<Bytes>>>,
    children_counters: CacheCounters,
    data_counters: CacheCounters,
}

impl CachingSession {
    /// Creates an empty session. No store reads happen until the first lookup.
    pub fn new(generation: Generation, store: Arc<dyn CoordinationStore>) -> Self {
        Self {
            generation,
            store,
            children: RwLock::new(HashMap::new()),
            data: RwLock::new(HashMap::new()),
            children_counters: CacheCounters::new(),
            data_counters: CacheCounters::new(),
        }
    }
}

fn memoize<V: Clone>(
    map: &RwLock<HashMap<Path, V>>,
    counters: &CacheCounters,
    path: &Path,
    load: impl FnOnce() -> CoreResult<V>,
) -> CoreResult<V> {
    if let Some(value) = map.read().get(path) {
        counters.record_hit();
        return Ok(value.clone());
    }

    counters.record_miss();
    let loaded = load()?;
    Ok(map.write().entry(path.clone()).or_insert(loaded).clone())
}

impl Session for CachingSession {
    fn generation(&self) -> Generation {
        self.generation
    }

    fn children(&self, path: &Path) -> CoreResult<Arc<[String]>> {
        memoize(&self.children, &self.children_counters, path, || {
            Ok(Arc::from(self.store.children(path)?))
        })
    }

    fn data(&self, path: &Path) -> CoreResult<Option<Bytes>> {
        memoize(&self.data, &self.data_counters, path, || {
            Ok(self.store.data(path)?.map(Bytes::from))
        })
    }

    fn stats(&self) -> SessionStats {
        SessionStats {
            children: self
                .children_counters
                .snapshot(self.children.read().len() as u64),
            data: self.data_counters.snapshot(self.data.read().len() as u64),
        }
    }
}

impl fmt::Debug for CachingSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CachingSession")
            .field("generation", &self.generation)
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

/// A session that never retains anything.
///
/// Every lookup counts as a miss. The counters may be shared between
/// sessions, so a database handing out a fresh session per read can still
/// report totals across all of them.
pub struct PassthroughSession {
    generation: Generation,
    store: Arc<dyn CoordinationStore>,
    children_counters: Arc<CacheCounters>,
    data_counters: Arc<CacheCounters>,
}

impl PassthroughSession {
    /// Creates a session that reads through to `store`.
    pub fn new(generation: Generation, store: Arc<dyn CoordinationStore>) -> Self {
        Self::with_counters(
            generation,
            store,
            Arc::new(CacheCounters::new()),
            Arc::new(CacheCounters::new()),
        )
    }

    /// Creates a session that records its lookups into the given counters.
    pub fn with_counters(
        generation: Generation,
        store: Arc<dyn CoordinationStore>,
        children_counters: Arc<CacheCounters>,
        data_counters: Arc<CacheCounters>,
    ) -> Self {
        Self {
            generation,
            store,
            children_counters,
            data_counters,
        }
    }
}

impl Session for PassthroughSession {
    fn generation(&self) -> Generation {
        self.generation
    }

    fn children(&self, path: &Path) -> CoreResult<Arc<[String]>> {
        self.children_counters.record_miss();
        Ok(Arc::from(self.store.children(path)?))
    }

    fn data(&self, path: &Path) -> CoreResult<Option<Bytes>> {
        self.data_counters.record_miss();
        Ok(self.store.data(path)?.map(Bytes::from))
    }

    fn stats(&self) -> SessionStats {
        SessionStats {
            children: self.children_counters.snapshot(0),
            data: self.data_counters.snapshot(0),
        }
    }
}

impl fmt::Debug for PassthroughSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PassthroughSession")
            .field("generation", &self.generation)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use noderepo_store::{InMemoryStore, StoreOperation};

    fn store_with(entries: &[(&str, &[u8])]) -> Arc<InMemoryStore> {
        let store = Arc::new(InMemoryStore::new());
        for (path, data) in entries {
            let path = Path::from_string(path);
            if let Some(parent) = path.parent() {
                store.create(&parent).unwrap();
            }
            store
                .commit(&[StoreOperation::Create {
                    path,
                    data: data.to_vec(),
                }])
                .unwrap();
        }
        store
    }

    fn set(store: &InMemoryStore, path: &str, data: &[u8]) {
        store
            .commit(&[StoreOperation::SetData {
                path: Path::from_string(path),
                data: data.to_vec(),
            }])
            .unwrap();
    }

    #[test]
    fn caching_session_reads_each_path_once() {
        let store = store_with(&[("/r/a", b"1"), ("/r/b", b"2")]);
        let session = CachingSession::new(Generation::new(1), store.clone());
        let reads_before = store.read_count();

        for _ in 0..3 {
            assert_eq!(&*session.children(&Path::from_string("/r")).unwrap(), ["a", "b"]);
            assert_eq!(
                session.data(&Path::from_string("/r/a")).unwrap(),
                Some(Bytes::from_static(b"1"))
            );
        }

        assert_eq!(store.read_count() - reads_before, 2);
        let stats = session.stats();
        assert_eq!(stats.children.misses, 1);
        assert_eq!(stats.children.hits, 2);
        assert_eq!(stats.data.misses, 1);
        assert_eq!(stats.data.hits, 2);
        assert_eq!(stats.total().size, 2);
    }

    #[test]
    fn caching_session_ignores_later_store_changes() {
        let store = store_with(&[("/r/a", b"old")]);
        let session = CachingSession::new(Generation::new(1), store.clone());
        let path = Path::from_string("/r/a");

        let first = session.data(&path).unwrap();
        set(&store, "/r/a", b"new");
        store.create(&Path::from_string("/r/b")).unwrap();

        assert_eq!(session.data(&path).unwrap(), first);
        assert_eq!(&*session.children(&Path::from_string("/r")).unwrap(), ["a", "b"]);
        assert_eq!(&*session.children(&Path::from_string("/r")).unwrap(), ["a", "b"]);
    }

    #[test]
    fn missing_nodes_are_cached_as_absent() {
        let store = Arc::new(InMemoryStore::new());
        let session = CachingSession::new(Generation::new(1), store.clone());
        let path = Path::from_string("/missing");

        assert_eq!(session.data(&path).unwrap(), None);
        assert!(session.children(&path).unwrap().is_empty());

        store.create(&path).unwrap();
        assert_eq!(session.data(&path).unwrap(), None);
    }

    #[test]
    fn empty_payload_is_a_value() {
        let store = store_with(&[("/r/empty", b"")]);
        let session = CachingSession::new(Generation::new(1), store);
        assert_eq!(
            session.data(&Path::from_string("/r/empty")).unwrap(),
            Some(Bytes::new())
        );
    }

    #[test]
    fn passthrough_session_always_reads_store() {
        let store = store_with(&[("/r/a", b"old")]);
        let session = PassthroughSession::new(Generation::new(3), store.clone());
        let path = Path::from_string("/r/a");

        assert_eq!(session.data(&path).unwrap(), Some(Bytes::from_static(b"old")));
        set(&store, "/r/a", b"new");
        assert_eq!(session.data(&path).unwrap(), Some(Bytes::from_static(b"new")));

        let stats = session.stats();
        assert_eq!(stats.data.misses, 2);
        assert_eq!(stats.data.hits, 0);
        assert_eq!(stats.total().size, 0);
        assert_eq!(session.generation(), Generation::new(3));
    }

    #[test]
    fn passthrough_sessions_share_counters() {
        let store = store_with(&[("/r/a", b"v")]);
        let children = Arc::new(CacheCounters::new());
        let data = Arc::new(CacheCounters::new());
        let path = Path::from_string("/r/a");

        for generation in 1..=3 {
            let session = PassthroughSession::with_counters(
                Generation::new(generation),
                store.clone(),
                Arc::clone(&children),
                Arc::clone(&data),
            );
            session.data(&path).unwrap();
        }
        PassthroughSession::with_counters(
            Generation::new(4),
            store,
            Arc::clone(&children),
            Arc::clone(&data),
        )
        .children(&Path::from_string("/r"))
        .unwrap();

        assert_eq!(data.misses(), 3);
        assert_eq!(children.misses(), 1);
    }

    #[test]
    fn concurrent_readers_see_one_value() {
        use std::thread;

        let store = store_with(&[("/r/a", b"v0")]);
        let session = Arc::new(CachingSession::new(Generation::new(1), store.clone()));
        let path = Path::from_string("/r/a");

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let session = Arc::clone(&session);
                let path = path.clone();
                thread::spawn(move || {
                    (0..200)
                        .map(|_| session.data(&path).unwrap())
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        for i in 0..50 {
            set(&store, "/r/a", format!("v{}", i + 1).as_bytes());
        }

        let settled = session.data(&path).unwrap();
        for reader in readers {
            for value in reader.join().unwrap() {
                assert_eq!(value, settled);
            }
        }
    }
}
