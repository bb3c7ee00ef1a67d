//! Distributed atomic counter.
//!
//! A counter is a single store node holding a `u64` as 8 big-endian bytes.
//! Updates go through [`CoordinationStore::compare_and_set`] in a bounded
//! retry loop, so concurrent processes sharing a store observe one total
//! order of increments.

use crate::error::{StoreError, StoreResult};
use crate::path::Path;
use crate::store::CoordinationStore;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Maximum compare-and-set attempts before giving up.
pub const MAX_CAS_ATTEMPTS: u32 = 100;

/// An atomic `u64` counter stored at a path in a coordination store.
///
/// A counter that was never written reads as 0. Cloning is cheap and clones
/// refer to the same stored value.
///
/// # Example
///
/// ```rust
/// use noderepo_store::{Counter, InMemoryStore, Path};
/// use std::sync::Arc;
///
/// let counter = Counter::new(Arc::new(InMemoryStore::new()), Path::from_string("/generation"));
/// assert_eq!(counter.get().unwrap(), 0);
/// assert!(counter.initialize(100).unwrap());
/// assert_eq!(counter.next().unwrap(), 101);
/// assert_eq!(counter.add(5).unwrap(), 106);
/// ```
#[derive(Clone)]
pub struct Counter {
    store: Arc<dyn CoordinationStore>,
    path: Path,
}

impl Counter {
    /// Creates a counter stored at `path`.
    pub fn new(store: Arc<dyn CoordinationStore>, path: Path) -> Self {
        Self { store, path }
    }

    /// Returns the path holding this counter.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the current value.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read or holds a malformed value.
    pub fn get(&self) -> StoreResult<u64> {
        let raw = self.store.data(&self.path)?;
        decode(&self.path, raw.as_deref())
    }

    /// Increments the counter by one and returns the new value.
    ///
    /// # Errors
    ///
    /// See [`Counter::add`].
    pub fn next(&self) -> StoreResult<u64> {
        self.add(1)
    }

    /// Adds `delta` to the counter and returns the new value.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::CasExhausted`] if too many concurrent writers
    /// won the race, or [`StoreError::Corrupted`] on overflow or a malformed
    /// stored value.
    pub fn add(&self, delta: u64) -> StoreResult<u64> {
        for attempt in 1..=MAX_CAS_ATTEMPTS {
            let raw = self.store.data(&self.path)?;
            let current = decode(&self.path, raw.as_deref())?;
            let updated = current
                .checked_add(delta)
                .ok_or_else(|| StoreError::corrupted(&self.path, "counter overflow"))?;

            if self
                .store
                .compare_and_set(&self.path, raw.as_deref(), &updated.to_be_bytes())?
            {
                return Ok(updated);
            }
            debug!(path = %self.path, attempt, "counter update lost a race, retrying");
        }

        Err(StoreError::CasExhausted {
            path: self.path.clone(),
            attempts: MAX_CAS_ATTEMPTS,
        })
    }

    /// Sets the counter to `seed` if it has never been written.
    ///
    /// Returns `true` if the seed was stored.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read or written.
    pub fn initialize(&self, seed: u64) -> StoreResult<bool> {
        match self.store.data(&self.path)? {
            Some(raw) if !raw.is_empty() => Ok(false),
            raw => self
                .store
                .compare_and_set(&self.path, raw.as_deref(), &seed.to_be_bytes()),
        }
    }
}

impl fmt::Debug for Counter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Counter")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

fn decode(path: &Path, raw: Option<&[u8]>) -> StoreResult<u64> {
    match raw {
        None | Some([]) => Ok(0),
        Some(bytes) => {
            let bytes: [u8; 8] = bytes.try_into().map_err(|_| {
                StoreError::corrupted(path, format!("expected 8 bytes, found {}", bytes.len()))
            })?;
            Ok(u64::from_be_bytes(bytes))
        }
    }
}
