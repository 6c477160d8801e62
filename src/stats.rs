//! Cache statistics: lock-free counters and their public snapshot.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::Serialize;

// ---------------------------------------------------------------------------
// CacheStats (snapshot)
// ---------------------------------------------------------------------------

/// Point-in-time statistics snapshot.
///
/// Counters are lifetime totals since the last reset. `hit_count +
/// miss_count == total_count()`, and every counter is monotone
/// non-decreasing between resets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct CacheStats {
    pub hit_count: u64,
    pub miss_count: u64,
    pub load_count: u64,
    /// Total wall time spent inside read-through loaders, in nanoseconds.
    pub load_time_ns: u64,
    pub eviction_count: u64,
    /// Live entry count at snapshot time.
    pub size: u64,
    pub hit_rate: f64,
    pub miss_rate: f64,
    pub average_load_time_ns: f64,
}

impl CacheStats {
    /// All-zero snapshot, reported by closed caches.
    #[inline]
    pub fn empty() -> Self {
        CacheStats::default()
    }

    /// Total lookups observed: hits plus misses.
    #[inline]
    pub fn total_count(&self) -> u64 {
        self.hit_count + self.miss_count
    }
}

// ---------------------------------------------------------------------------
// StatCounters
// ---------------------------------------------------------------------------

/// Lock-free statistics counters shared by every core of a cache instance.
///
/// Recording is gated on the cache's `record_stats` flag; disabled counters
/// stay at zero. Updates use relaxed ordering: statistics are observational
/// and never drive control flow.
#[derive(Debug, Default)]
pub(crate) struct StatCounters {
    enabled: bool,
    hits: AtomicU64,
    misses: AtomicU64,
    loads: AtomicU64,
    load_time_ns: AtomicU64,
    evictions: AtomicU64,
}

impl StatCounters {
    pub fn new(enabled: bool) -> Self {
        StatCounters {
            enabled,
            ..Default::default()
        }
    }

    #[inline]
    pub fn record_hit(&self) {
        if self.enabled {
            self.hits.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[inline]
    pub fn record_miss(&self) {
        if self.enabled {
            self.misses.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[inline]
    pub fn record_eviction(&self) {
        if self.enabled {
            self.evictions.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[inline]
    pub fn record_load(&self, elapsed: Duration) {
        if self.enabled {
            self.loads.fetch_add(1, Ordering::Relaxed);
            self.load_time_ns
                .fetch_add(elapsed.as_nanos() as u64, Ordering::Relaxed);
        }
    }

    pub fn reset(&self) {
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
        self.loads.store(0, Ordering::Relaxed);
        self.load_time_ns.store(0, Ordering::Relaxed);
        self.evictions.store(0, Ordering::Relaxed);
    }

    /// Builds a snapshot with derived rates; `size` is supplied by the cache
    /// because only it knows the live entry count.
    pub fn snapshot(&self, size: u64) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let loads = self.loads.load(Ordering::Relaxed);
        let load_time_ns = self.load_time_ns.load(Ordering::Relaxed);
        let total = hits + misses;
        let hit_rate = if total > 0 {
            hits as f64 / total as f64
        } else {
            0.0
        };
        CacheStats {
            hit_count: hits,
            miss_count: misses,
            load_count: loads,
            load_time_ns,
            eviction_count: self.evictions.load(Ordering::Relaxed),
            size,
            hit_rate,
            miss_rate: if total > 0 { 1.0 - hit_rate } else { 0.0 },
            average_load_time_ns: if loads > 0 {
                load_time_ns as f64 / loads as f64
            } else {
                0.0
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
