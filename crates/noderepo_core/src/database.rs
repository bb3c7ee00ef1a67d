//! Generation-tracking database over a coordination store.

use crate::config::Config;
use crate::error::CoreResult;
use crate::session::{CachingSession, PassthroughSession, Session};
use crate::stats::{CacheCounters, SessionStats};
use crate::transaction::{CountingTransaction, EagerCountingTransaction, NestedTransaction};
use crate::types::Generation;
use noderepo_store::{CoordinationStore, Counter, Path};
use parking_lot::RwLock;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Name of the generation counter node under the database root.
pub const GENERATION_COUNTER: &str = "generation";

/// A database whose reads are cached per generation.
///
/// The generation is a counter in the store shared by every process using
/// it. All writes made through this type advance it, and every read entry
/// point compares it to the generation of the current session:
///
/// - **Valid**: the session is at least as new as the counter; it is reused.
/// - **Stale**: the counter moved on; a fresh, empty session replaces it.
///
/// Nothing inside this type makes a session stale. That only happens when
/// a write, here or in another process, advances the counter; the change is
/// picked up lazily by the next [`GenerationDatabase::session`] call.
///
/// Sessions give eventually consistent reads. Read-modify-write sequences
/// must hold the corresponding [`GenerationDatabase::lock`].
pub struct GenerationDatabase {
    store: Arc<dyn CoordinationStore>,
    generation_counter: Counter,
    use_cache: bool,
    current: RwLock<Arc<dyn Session>>,
    passthrough_children: Arc<CacheCounters>,
    passthrough_data: Arc<CacheCounters>,
}

impl GenerationDatabase {
    /// Creates a database using the counter at `counter_path`.
    ///
    /// No store reads happen here; the first session is built on demand.
    pub fn new(store: Arc<dyn CoordinationStore>, counter_path: Path, use_cache: bool) -> Self {
        let initial: Arc<dyn Session> =
            Arc::new(CachingSession::new(Generation::default(), Arc::clone(&store)));
        Self {
            generation_counter: Counter::new(Arc::clone(&store), counter_path),
            store,
            use_cache,
            current: RwLock::new(initial),
            passthrough_children: Arc::new(CacheCounters::new()),
            passthrough_data: Arc::new(CacheCounters::new()),
        }
    }

    /// Opens a database as described by `config`.
    ///
    /// Seeds the generation counter with `config.initial_generation` if the
    /// counter has never been written.
    ///
    /// # Errors
    ///
    /// Returns an error if the counter cannot be seeded.
    pub fn open(store: Arc<dyn CoordinationStore>, config: &Config) -> CoreResult<Self> {
        let db = Self::new(
            store,
            config.root.append(GENERATION_COUNTER),
            config.use_cache,
        );
        if let Some(seed) = config.initial_generation {
            if db.generation_counter.initialize(seed)? {
                debug!(seed, "seeded generation counter");
            }
        }
        Ok(db)
    }

    /// Returns the live value of the generation counter.
    ///
    /// # Errors
    ///
    /// Returns an error if the counter cannot be read.
    pub fn generation(&self) -> CoreResult<Generation> {
        Ok(Generation::new(self.generation_counter.get()?))
    }

    /// Returns a session no older than the generation read on entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the generation counter cannot be read.
    pub fn session(&self) -> CoreResult<Arc<dyn Session>> {
        let generation = self.generation()?;

        if !self.use_cache {
            let session: Arc<dyn Session> = Arc::new(PassthroughSession::with_counters(
                generation,
                Arc::clone(&self.store),
                Arc::clone(&self.passthrough_children),
                Arc::clone(&self.passthrough_data),
            ));
            return Ok(session);
        }

        {
            let current = self.current.read();
            if current.generation() >= generation {
                return Ok(Arc::clone(&*current));
            }
        }

        let mut current = self.current.write();
        // Another reader may have swapped while we waited for the write lock.
        if current.generation() < generation {
            debug!(
                from = %current.generation(),
                to = %generation,
                "replacing stale session"
            );
            let fresh: Arc<dyn Session> =
                Arc::new(CachingSession::new(generation, Arc::clone(&self.store)));
            *current = fresh;
        }
        Ok(Arc::clone(&*current))
    }

    /// Appends a counting transaction to `nested` and returns it.
    ///
    /// Add operations to the returned transaction, then commit `nested`.
    /// Committing only the returned handle would skip its siblings.
    pub fn new_transaction_in<'a>(
        &self,
        nested: &'a mut NestedTransaction,
    ) -> &'a mut CountingTransaction {
        nested.add(CountingTransaction::new(
            Arc::clone(&self.store),
            self.generation_counter.clone(),
        ))
    }

    /// Appends a transaction that advances the generation while preparing.
    pub fn new_eager_transaction_in<'a>(
        &self,
        nested: &'a mut NestedTransaction,
    ) -> &'a mut EagerCountingTransaction {
        nested.add(EagerCountingTransaction::new(
            Arc::clone(&self.store),
            self.generation_counter.clone(),
        ))
    }

    /// Creates `path` and its ancestors if missing.
    ///
    /// Advances the generation only if something was created, so repeated
    /// "ensure exists" calls at startup do not invalidate every cache.
    ///
    /// # Errors
    ///
    /// Returns an error if the store or counter cannot be written.
    pub fn create(&self, path: &Path) -> CoreResult<bool> {
        let created = self.store.create(path)?;
        if created {
            let generation = self.generation_counter.next()?;
            debug!(%path, generation, "created path");
        }
        Ok(created)
    }

    /// Returns true if a node exists at `path`, bypassing any session.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub fn exists(&self, path: &Path) -> CoreResult<bool> {
        Ok(self.store.exists(path)?)
    }

    /// Acquires the distributed lock at `path`.
    ///
    /// The lock is reentrant for the calling thread and released when the
    /// returned guard is dropped.
    ///
    /// # Errors
    ///
    /// Returns [`crate::CoreError::LockTimeout`] if the lock is not acquired
    /// within `timeout`.
    pub fn lock(&self, path: &Path, timeout: Duration) -> CoreResult<Lock> {
        self.store.acquire_lock(path, timeout)?;
        debug!(%path, "acquired lock");
        Ok(Lock {
            store: Arc::clone(&self.store),
            path: path.clone(),
            _not_send: PhantomData,
        })
    }

    /// Returns statistics of the current session.
    ///
    /// Without caching there is no current session; the result then sums
    /// every lookup made through this database, all of them misses.
    #[must_use]
    pub fn cache_stats(&self) -> SessionStats {
        if !self.use_cache {
            return SessionStats {
                children: self.passthrough_children.snapshot(0),
                data: self.passthrough_data.snapshot(0),
            };
        }
        self.current.read().stats()
    }

    /// Returns whether reads are cached.
    #[must_use]
    pub fn use_cache(&self) -> bool {
        self.use_cache
    }

    /// Returns the underlying store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn CoordinationStore> {
        &self.store
    }

    /// Returns the generation counter.
    #[must_use]
    pub fn generation_counter(&self) -> &Counter {
        &self.generation_counter
    }
}

impl fmt::Debug for GenerationDatabase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GenerationDatabase")
            .field("counter", &self.generation_counter)
            .field("use_cache", &self.use_cache)
            .field("session_generation", &self.current.read().generation())
            .finish_non_exhaustive()
    }
}

/// A held distributed lock, released on drop.
///
/// Locks belong to the thread that acquired them, so the guard cannot be
/// sent to another thread.
#[must_use = "the lock is released as soon as the guard is dropped"]
pub struct Lock {
    store: Arc<dyn CoordinationStore>,
    path: Path,
    _not_send: PhantomData<*const ()>,
}

impl Lock {
    /// Returns the locked path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for Lock {
    fn drop(&mut self) {
        match self.store.release_lock(&self.path) {
            Ok(()) => debug!(path = %self.path, "released lock"),
            Err(e) => warn!(path = %self.path, error = %e, "failed to release lock"),
        }
    }
}

impl fmt::Debug for Lock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lock").field("path", &self.path).finish()
    }
}
