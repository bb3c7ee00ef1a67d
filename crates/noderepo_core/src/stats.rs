//! Cache statistics.
//!
//! Counters are atomic and can be read while lookups are in progress.
//! Snapshots are plain values handed to an operational metrics collector.
//!
//! # Usage
//!
//! ```rust
//! use noderepo_core::CacheCounters;
//!
//! let counters = CacheCounters::new();
//! counters.record_hit();
//! counters.record_miss();
//!
//! let stats = counters.snapshot(1);
//! assert_eq!(stats.hit_rate(), 0.5);
//! assert_eq!(stats.size, 1);
//! ```

use std::sync::atomic::{AtomicU64, Ordering};

/// Live hit, miss and eviction counters for one cache.
#[derive(Debug, Default)]
pub struct CacheCounters {
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl CacheCounters {
    /// Creates zeroed counters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a lookup served from the cache.
    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a lookup that had to load.
    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    /// Records an entry dropped to respect the size bound.
    pub fn record_eviction(&self) {
        self.evictions.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns the number of hits.
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    /// Returns the number of misses.
    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    /// Returns the number of evictions.
    pub fn evictions(&self) -> u64 {
        self.evictions.load(Ordering::Relaxed)
    }

    /// Returns a snapshot, given the cache's current entry count.
    pub fn snapshot(&self, size: u64) -> CacheStats {
        CacheStats {
            hits: self.hits(),
            misses: self.misses(),
            evictions: self.evictions(),
            size,
        }
    }
}

/// A point-in-time snapshot of one cache's statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStats {
    /// Lookups served from the cache.
    pub hits: u64,
    /// Lookups that had to load.
    pub misses: u64,
    /// Entries dropped to respect the size bound.
    pub evictions: u64,
    /// Entries currently held.
    pub size: u64,
}

impl CacheStats {
    /// Returns the fraction of lookups served from the cache.
    ///
    /// A cache that has seen no lookups reports 1.0.
    #[must_use]
    pub fn hit_rate(&self) -> f64 {
        let requests = self.hits + self.misses;
        if requests == 0 {
            1.0
        } else {
            self.hits as f64 / requests as f64
        }
    }

    /// Returns the element-wise sum of two snapshots.
    #[must_use]
    pub fn merge(&self, other: &CacheStats) -> CacheStats {
        CacheStats {
            hits: self.hits + other.hits,
            misses: self.misses + other.misses,
            evictions: self.evictions + other.evictions,
            size: self.size + other.size,
        }
    }
}

/// Statistics of a session, tracked separately for its two maps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SessionStats {
    /// Children-list lookups.
    pub children: CacheStats,
    /// Payload lookups.
    pub data: CacheStats,
}

impl SessionStats {
    /// Returns both maps' statistics combined.
    #[must_use]
    pub fn total(&self) -> CacheStats {
        self.children.merge(&self.data)
    }
}

/// Statistics exposed by the database client to a metrics collector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ClientStats {
    /// The current session.
    pub session: SessionStats,
    /// The decoded node-list cache.
    pub nodes: CacheStats,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_cache_has_full_hit_rate() {
        let stats = CacheCounters::new().snapshot(0);
        assert_eq!(stats.hit_rate(), 1.0);
        assert_eq!(stats.evictions, 0);
    }

    #[test]
    fn hit_rate_counts_hits_over_requests() {
        let counters = CacheCounters::new();
        counters.record_hit();
        counters.record_hit();
        counters.record_hit();
        counters.record_miss();
        assert_eq!(counters.snapshot(3).hit_rate(), 0.75);
    }

    #[test]
    fn session_total_merges_maps() {
        let stats = SessionStats {
            children: CacheStats {
                hits: 1,
                misses: 2,
                evictions: 0,
                size: 2,
            },
            data: CacheStats {
                hits: 3,
                misses: 4,
                evictions: 0,
                size: 4,
            },
        };
        let total = stats.total();
        assert_eq!(total.hits, 4);
        assert_eq!(total.misses, 6);
        assert_eq!(total.size, 6);
    }

    #[test]
    fn concurrent_updates() {
        use std::sync::Arc;
        use std::thread;

        let counters = Arc::new(CacheCounters::new());
        let mut handles = vec![];

        for _ in 0..10 {
            let c = Arc::clone(&counters);
            handles.push(thread::spawn(move || {
                for _ in 0..100 {
                    c.record_hit();
                    c.record_miss();
                }
            }));
        }

        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(counters.hits(), 1000);
        assert_eq!(counters.misses(), 1000);
    }
}
