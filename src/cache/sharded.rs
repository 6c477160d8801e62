//! Sharded high-performance cache core (`"HighPerf"` provider family).
//!
//! Routes every key to one of `concurrency_level` reference cores through a
//! deterministic seeded hash, so independent keys contend on independent
//! locks. All shards share one statistics context and one listener list, and
//! a single periodic sweep task serves the whole cache.
//!
//! Capacity is partitioned: `max_size` is split across the shards (the
//! remainder spread over the first shards), which keeps the global live
//! count within `max_size`. A heavily skewed key distribution can therefore
//! evict or reject in a hot shard before the global bound is reached.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use crate::config::CacheConfiguration;
use crate::error::{CacheError, Result};
use crate::events::{CacheEvent, CacheEventListener, Listeners};
use crate::stats::{CacheStats, StatCounters};

use super::standard::{StandardCore, CLEANUP_INTERVAL};

// ---------------------------------------------------------------------------
// ShardSelector
// ---------------------------------------------------------------------------

/// Deterministic key-to-shard mapping: the seed is hashed ahead of the key,
/// so distinct caches spread the same keys differently.
pub(crate) struct ShardSelector {
    shards: usize,
    seed: u64,
}

impl ShardSelector {
    pub fn new(shards: usize, seed: u64) -> Self {
        debug_assert!(shards > 0);
        ShardSelector { shards, seed }
    }

    #[inline]
    pub fn shard_for_key<K: Hash>(&self, key: &K) -> usize {
        let mut hasher = DefaultHasher::new();
        self.seed.hash(&mut hasher);
        key.hash(&mut hasher);
        (hasher.finish() % self.shards as u64) as usize
    }
}

// ---------------------------------------------------------------------------
// ShardedCore
// ---------------------------------------------------------------------------

pub(crate) struct ShardedCore<K, V> {
    name: String,
    config: CacheConfiguration,
    shards: Vec<Arc<StandardCore<K, V>>>,
    selector: ShardSelector,
    counters: Arc<StatCounters>,
    listeners: Arc<Listeners<K, V>>,
    closed: AtomicBool,
    cleanup_task: Mutex<Option<JoinHandle<()>>>,
}

impl<K, V> ShardedCore<K, V>
where
    K: Clone + Eq + Hash + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    pub fn new(name: String, config: CacheConfiguration) -> Arc<Self> {
        let shard_count = (config.concurrency_level as u64)
            .min(config.max_size)
            .max(1) as usize;
        let counters = Arc::new(StatCounters::new(config.record_stats));
        let listeners: Arc<Listeners<K, V>> = Arc::new(Listeners::default());

        let base = config.max_size / shard_count as u64;
        let remainder = config.max_size % shard_count as u64;
        let shards = (0..shard_count)
            .map(|index| {
                let mut shard_config = config.clone();
                shard_config.max_size = base + u64::from((index as u64) < remainder);
                StandardCore::with_parts(
                    name.clone(),
                    shard_config,
                    counters.clone(),
                    listeners.clone(),
                    false,
                )
            })
            .collect();

        let core = Arc::new(ShardedCore {
            selector: ShardSelector::new(shard_count, config.max_size ^ shard_count as u64),
            name,
            config,
            shards,
            counters,
            listeners,
            closed: AtomicBool::new(false),
            cleanup_task: Mutex::new(None),
        });
        Self::spawn_cleanup(&core);
        core
    }

    fn spawn_cleanup(core: &Arc<Self>) {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            debug!(
                cache = %core.name,
                "no async runtime at construction, relying on lazy expiration"
            );
            return;
        };
        let weak = Arc::downgrade(core);
        let name = core.name.clone();
        let task = handle.spawn(async move {
            let mut ticker = tokio::time::interval(CLEANUP_INTERVAL);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(core) = weak.upgrade() else { break };
                if core.closed.load(Ordering::SeqCst) {
                    break;
                }
                for shard in &core.shards {
                    shard.clean_up();
                }
            }
            trace!(cache = %name, "cleanup task stopped");
        });
        *core.cleanup_task.lock() = Some(task);
    }

    #[inline]
    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            Err(CacheError::Closed {
                cache: self.name.clone(),
            })
        } else {
            Ok(())
        }
    }

    #[inline]
    fn shard(&self, key: &K) -> &Arc<StandardCore<K, V>> {
        &self.shards[self.selector.shard_for_key(key)]
    }

    pub fn get(&self, key: &K) -> Result<Option<V>> {
        self.ensure_open()?;
        self.shard(key).get(key)
    }

    pub fn put_entry(&self, key: K, value: Option<V>, ttl: Option<Duration>) -> Result<()> {
        self.ensure_open()?;
        self.shard(&key).put_entry(key, value, ttl)
    }

    pub fn put_if_absent(&self, key: K, value: Option<V>) -> Result<Option<V>> {
        self.ensure_open()?;
        self.shard(&key).put_if_absent(key, value)
    }

    pub fn remove(&self, key: &K) -> Result<Option<V>> {
        self.ensure_open()?;
        self.shard(key).remove(key)
    }

    pub fn contains_key(&self, key: &K) -> Result<bool> {
        self.ensure_open()?;
        self.shard(key).contains_key(key)
    }

    pub fn as_map(&self) -> Result<HashMap<K, V>> {
        self.ensure_open()?;
        let mut merged = HashMap::new();
        for shard in &self.shards {
            merged.extend(shard.as_map()?);
        }
        Ok(merged)
    }

    pub fn clear(&self) -> Result<()> {
        self.ensure_open()?;
        for shard in &self.shards {
            shard.clear_inner(false);
        }
        // One clear event for the whole cache, not one per shard.
        self.listeners.notify(&[CacheEvent::Clear]);
        Ok(())
    }

    pub fn size(&self) -> u64 {
        if self.closed.load(Ordering::SeqCst) {
            return 0;
        }
        self.shards.iter().map(|shard| shard.size()).sum()
    }

    pub fn estimated_size(&self) -> u64 {
        if self.closed.load(Ordering::SeqCst) {
            return 0;
        }
        self.shards.iter().map(|shard| shard.estimated_size()).sum()
    }

    pub fn evict_all<F>(&self, predicate: F) -> Result<()>
    where
        F: Fn(&K) -> bool,
    {
        self.ensure_open()?;
        for shard in &self.shards {
            shard.evict_all(&predicate)?;
        }
        Ok(())
    }

    pub fn clean_up(&self) {
        if self.closed.load(Ordering::SeqCst) {
            return;
        }
        for shard in &self.shards {
            shard.clean_up();
        }
    }

    pub fn stats(&self) -> CacheStats {
        if self.closed.load(Ordering::SeqCst) {
            return CacheStats::empty();
        }
        self.counters.snapshot(self.size())
    }

    pub fn reset_stats(&self) {
        self.counters.reset();
    }

    pub(crate) fn counters(&self) -> &StatCounters {
        &self.counters
    }

    pub fn add_listener(&self, listener: Arc<dyn CacheEventListener<K, V>>) {
        self.listeners.add(listener);
    }

    pub fn remove_listener(&self, listener: &Arc<dyn CacheEventListener<K, V>>) {
        self.listeners.remove(listener);
    }

    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Some(task) = self.cleanup_task.lock().take() {
            task.abort();
        }
        for shard in &self.shards {
            shard.close();
        }
        debug!(cache = %self.name, shards = self.shards.len(), "cache closed");
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn configuration(&self) -> &CacheConfiguration {
        &self.config
    }

    #[cfg(test)]
    fn shard_sizes(&self) -> Vec<u64> {
        self.shards.iter().map(|shard| shard.size()).collect()
    }
}

impl<K, V> Drop for ShardedCore<K, V> {
    fn drop(&mut self) {
        if let Some(task) = self.cleanup_task.get_mut().take() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sharded(max_size: u64, shards: u16) -> Arc<ShardedCore<String, i32>> {
        let config = CacheConfiguration::builder()
            .name("sharded")
            .max_size(max_size)
            .no_default_ttl()
            .no_max_idle()
            .concurrency_level(shards)
            .build();
        ShardedCore::new("sharded".to_string(), config)
    }

    #[test]
    fn selector_is_deterministic() {
        let selector = ShardSelector::new(8, 42);
        let a = selector.shard_for_key(&"user:123");
        assert_eq!(selector.shard_for_key(&"user:123"), a);
        assert!(a < 8);
    }

    #[test]
    fn different_seeds_redistribute() {
        let a = ShardSelector::new(16, 1);
        let b = ShardSelector::new(16, 2);
        let moved = (0..64)
            .filter(|i| a.shard_for_key(i) != b.shard_for_key(i))
            .count();
        assert!(moved > 0);
    }

    #[test]
    fn routes_and_round_trips() {
        let cache = sharded(100, 4);
        for i in 0..50 {
            cache.put_entry(format!("k{i}"), Some(i), None).unwrap();
        }
        for i in 0..50 {
            assert_eq!(cache.get(&format!("k{i}")).unwrap(), Some(i));
        }
        assert_eq!(cache.size(), 50);
    }

    #[test]
    fn shard_capacities_sum_to_max_size() {
        let cache = sharded(10, 3);
        assert_eq!(cache.shards.len(), 3);
        let total: u64 = cache
            .shards
            .iter()
            .map(|shard| shard.configuration().max_size)
            .sum();
        assert_eq!(total, 10);
    }

    #[test]
    fn shard_count_never_exceeds_capacity() {
        let cache = sharded(2, 16);
        assert_eq!(cache.shards.len(), 2);
    }

    #[test]
    fn stats_aggregate_across_shards() {
        let cache = sharded(100, 4);
        cache.put_entry("a".into(), Some(1), None).unwrap();
        cache.get(&"a".into()).unwrap();
        cache.get(&"b".into()).unwrap();

        let stats = cache.stats();
        assert_eq!(stats.hit_count, 1);
        assert_eq!(stats.miss_count, 1);
        assert_eq!(stats.size, 1);
    }

    #[test]
    fn clear_empties_every_shard() {
        let cache = sharded(100, 4);
        for i in 0..20 {
            cache.put_entry(format!("k{i}"), Some(i), None).unwrap();
        }
        cache.clear().unwrap();
        assert_eq!(cache.size(), 0);
        assert!(cache.shard_sizes().iter().all(|&len| len == 0));
    }

    #[test]
    fn close_closes_shards() {
        let cache = sharded(100, 4);
        cache.put_entry("a".into(), Some(1), None).unwrap();
        cache.close();
        cache.close();
        assert!(matches!(
            cache.get(&"a".into()),
            Err(CacheError::Closed { .. })
        ));
        assert_eq!(cache.size(), 0);
    }
}
