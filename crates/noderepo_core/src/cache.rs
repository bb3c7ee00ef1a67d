//! Size-bounded cache of values tagged with the version that produced them.

use crate::stats::{CacheCounters, CacheStats};
use lru::LruCache;
use noderepo_store::Path;
use parking_lot::Mutex;
use std::fmt;
use std::num::NonZeroUsize;

/// A cached value and the version it was loaded at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionedEntry<T> {
    value: T,
    version: u64,
}

impl<T> VersionedEntry<T> {
    /// Creates an entry.
    pub fn new(value: T, version: u64) -> Self {
        Self { value, version }
    }

    /// Returns the value.
    pub fn value(&self) -> &T {
        &self.value
    }

    /// Returns the version.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Consumes the entry, returning the value.
    pub fn into_value(self) -> T {
        self.value
    }
}

/// An LRU cache keyed by path whose entries are only served at their version.
///
/// A lookup supplies the caller's current version. A cached entry at any
/// other version is dropped and the loader runs exactly once to replace it.
///
/// The loader runs without holding the cache lock, so two threads missing
/// the same key at the same moment may both load it. Loaders are expected
/// to be idempotent.
///
/// # Example
///
/// ```rust
/// use noderepo_core::{VersionedCache, VersionedEntry};
/// use noderepo_store::Path;
///
/// let cache = VersionedCache::new(16);
/// let path = Path::from_string("/provision/v1/ready");
///
/// let v1: Result<_, ()> = cache.get(&path, 1, || Ok(VersionedEntry::new("one", 1)));
/// assert_eq!(v1, Ok("one"));
///
/// // Same version: served from the cache, loader not called.
/// let again: Result<_, ()> = cache.get(&path, 1, || unreachable!());
/// assert_eq!(again, Ok("one"));
///
/// // New version: reloaded.
/// let v2: Result<_, ()> = cache.get(&path, 2, || Ok(VersionedEntry::new("two", 2)));
/// assert_eq!(v2, Ok("two"));
/// ```
pub struct VersionedCache<T> {
    entries: Mutex<LruCache<Path, VersionedEntry<T>>>,
    counters: CacheCounters,
}

impl<T: Clone> VersionedCache<T> {
    /// Creates a cache holding at most `maximum_size` entries (at least one).
    #[must_use]
    pub fn new(maximum_size: usize) -> Self {
        let capacity = NonZeroUsize::new(maximum_size).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            counters: CacheCounters::new(),
        }
    }

    /// Returns the value for `path` at `current_version`, loading it if needed.
    ///
    /// # Errors
    ///
    /// Returns the loader's error unchanged. Nothing is cached for `path`
    /// after a failed load.
    pub fn get<E, F>(&self, path: &Path, current_version: u64, loader: F) -> Result<T, E>
    where
        F: FnOnce() -> Result<VersionedEntry<T>, E>,
    {
        {
            let mut entries = self.entries.lock();
            if let Some(entry) = entries.get(path) {
                if entry.version == current_version {
                    self.counters.record_hit();
                    return Ok(entry.value.clone());
                }
                entries.pop(path);
            }
        }

        self.counters.record_miss();
        let entry = loader()?;
        let value = entry.value.clone();

        let mut entries = self.entries.lock();
        if let Some((evicted, _)) = entries.push(path.clone(), entry) {
            if &evicted != path {
                self.counters.record_eviction();
            }
        }
        Ok(value)
    }

    /// Drops the entry for `path`, if any.
    pub fn invalidate(&self, path: &Path) {
        self.entries.lock().pop(path);
    }

    /// Drops all entries.
    pub fn invalidate_all(&self) {
        self.entries.lock().clear();
    }

    /// Returns the number of cached entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Returns true if nothing is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the configured capacity.
    #[must_use]
    pub fn maximum_size(&self) -> usize {
        self.entries.lock().cap().get()
    }

    /// Returns hit rate, eviction count and current size.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        self.counters.snapshot(self.len() as u64)
    }
}

impl<T> fmt::Debug for VersionedCache<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let entries = self.entries.lock();
        f.debug_struct("VersionedCache")
            .field("size", &entries.len())
            .field("maximum_size", &entries.cap())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;

    fn path(s: &str) -> Path {
        Path::from_string(s)
    }

    fn load<T: Clone>(
        cache: &VersionedCache<T>,
        p: &Path,
        version: u64,
        value: T,
    ) -> T {
        cache
            .get(p, version, || Ok::<_, String>(VersionedEntry::new(value, version)))
            .unwrap()
    }

    #[test]
    fn miss_invokes_loader_once() {
        let cache = VersionedCache::new(4);
        let calls = AtomicUsize::new(0);
        let value = cache
            .get(&path("/a"), 1, || {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, String>(VersionedEntry::new(10, 1))
            })
            .unwrap();
        assert_eq!(value, 10);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.stats().misses, 1);
    }

    #[test]
    fn matching_version_never_invokes_loader() {
        let cache = VersionedCache::new(4);
        load(&cache, &path("/a"), 3, "cached");

        let calls = AtomicUsize::new(0);
        for _ in 0..5 {
            let value = cache
                .get(&path("/a"), 3, || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, String>(VersionedEntry::new("fresh", 3))
                })
                .unwrap();
            assert_eq!(value, "cached");
        }
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(cache.stats().hits, 5);
    }

    #[test]
    fn stale_version_reloads_exactly_once() {
        let cache = VersionedCache::new(4);
        load(&cache, &path("/a"), 1, "old");

        let calls = AtomicUsize::new(0);
        let value = cache
            .get(&path("/a"), 2, || {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, String>(VersionedEntry::new("new", 2))
            })
            .unwrap();

        assert_eq!(value, "new");
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let again = cache
            .get(&path("/a"), 2, || Err("must not reload".to_string()))
            .unwrap();
        assert_eq!(again, "new");
    }

    #[test]
    fn lower_version_also_counts_as_stale() {
        let cache = VersionedCache::new(4);
        load(&cache, &path("/a"), 5, "five");
        assert_eq!(load(&cache, &path("/a"), 4, "four"), "four");
    }

    #[test]
    fn size_bound_evicts_least_recently_used() {
        let cache = VersionedCache::new(2);
        load(&cache, &path("/p1"), 1, 1);
        load(&cache, &path("/p2"), 1, 2);
        load(&cache, &path("/p3"), 1, 3);

        let stats = cache.stats();
        assert_eq!(stats.evictions, 1);
        assert_eq!(stats.size, 2);

        let reloaded = cache
            .get(&path("/p1"), 1, || Ok::<_, String>(VersionedEntry::new(100, 1)))
            .unwrap();
        assert_eq!(reloaded, 100, "p1 should have been evicted");
    }

    #[test]
    fn stale_replacement_is_not_an_eviction() {
        let cache = VersionedCache::new(2);
        load(&cache, &path("/a"), 1, 1);
        load(&cache, &path("/a"), 2, 2);
        assert_eq!(cache.stats().evictions, 0);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn loader_error_propagates_and_caches_nothing() {
        let cache: VersionedCache<i32> = VersionedCache::new(4);
        let result = cache.get(&path("/a"), 1, || Err("boom"));
        assert_eq!(result, Err("boom"));
        assert!(cache.is_empty());
    }

    #[test]
    fn failed_refresh_drops_stale_entry() {
        let cache = VersionedCache::new(4);
        load(&cache, &path("/a"), 1, "old");
        let result = cache.get(&path("/a"), 2, || Err("unavailable"));
        assert_eq!(result, Err("unavailable"));
        assert!(cache.is_empty());
    }

    #[test]
    fn invalidate_forces_reload() {
        let cache = VersionedCache::new(4);
        load(&cache, &path("/a"), 1, "old");
        load(&cache, &path("/b"), 1, "old");
        cache.invalidate(&path("/a"));
        assert_eq!(cache.len(), 1);
        cache.invalidate_all();
        assert!(cache.is_empty());
    }

    #[test]
    fn zero_capacity_is_clamped() {
        let cache: VersionedCache<u8> = VersionedCache::new(0);
        assert_eq!(cache.maximum_size(), 1);
    }

    #[test]
    fn concurrent_gets_agree_on_value() {
        let cache = Arc::new(VersionedCache::new(8));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                thread::spawn(move || {
                    (0..100)
                        .map(|_| load(&cache, &path("/shared"), 7, 42))
                        .all(|v| v == 42)
                })
            })
            .collect();

        for h in handles {
            assert!(h.join().unwrap());
        }
        assert_eq!(cache.len(), 1);
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn served_value_always_matches_requested_version(
                capacity in 1usize..6,
                lookups in prop::collection::vec((0u8..8, 0u64..3), 1..64),
            ) {
                let cache = VersionedCache::new(capacity);
                for (key, version) in lookups {
                    let p = Path::root().append(key.to_string());
                    let value = load(&cache, &p, version, (key, version));
                    prop_assert_eq!(value, (key, version));
                    prop_assert!(cache.len() <= capacity);
                }
                let stats = cache.stats();
                prop_assert!(stats.evictions <= stats.misses);
            }
        }
    }
}
