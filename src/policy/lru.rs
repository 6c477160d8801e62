//! Least Recently Used eviction strategy.
//!
//! Recency is modeled with a monotone tick: every put or access stamps the
//! key with the next tick, and the victim is the key carrying the smallest
//! one. Two maps keep both directions O(log n):
//!
//! ```text
//!   ticks: FxHashMap<K, u64>        order: BTreeMap<u64, K>
//!          key → current tick              tick → key (sorted)
//!
//!   on_access(B):  ticks[B] = 7           order: {3→A, 7→B, 5→C}
//!   select_victim: first of order  ───►   A (tick 3, least recent)
//! ```

use std::collections::BTreeMap;
use std::hash::Hash;

use rustc_hash::FxHashMap;

use super::EvictionStrategy;

/// Recency-ordered eviction bookkeeping.
pub struct LruStrategy<K> {
    ticks: FxHashMap<K, u64>,
    order: BTreeMap<u64, K>,
    next_tick: u64,
}

impl<K> LruStrategy<K>
where
    K: Clone + Eq + Hash,
{
    pub fn new() -> Self {
        LruStrategy {
            ticks: FxHashMap::default(),
            order: BTreeMap::new(),
            next_tick: 0,
        }
    }

    fn stamp(&mut self, key: &K) {
        if let Some(old) = self.ticks.get(key) {
            self.order.remove(old);
        }
        let tick = self.next_tick;
        self.next_tick += 1;
        self.ticks.insert(key.clone(), tick);
        self.order.insert(tick, key.clone());
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        debug_assert_eq!(self.ticks.len(), self.order.len());
        self.ticks.len()
    }
}

impl<K> Default for LruStrategy<K>
where
    K: Clone + Eq + Hash,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K> EvictionStrategy<K> for LruStrategy<K>
where
    K: Clone + Eq + Hash + Send + Sync,
{
    fn on_put(&mut self, key: &K) {
        self.stamp(key);
    }

    fn on_access(&mut self, key: &K) {
        self.stamp(key);
    }

    fn on_remove(&mut self, key: &K) {
        if let Some(tick) = self.ticks.remove(key) {
            self.order.remove(&tick);
        }
    }

    fn select_victim(&mut self) -> Option<K> {
        self.order.values().next().cloned()
    }

    fn clear(&mut self) {
        self.ticks.clear();
        self.order.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn victim_is_least_recent() {
        let mut lru = LruStrategy::new();
        lru.on_put(&"a");
        lru.on_put(&"b");
        lru.on_put(&"c");

        assert_eq!(lru.select_victim(), Some("a"));
    }

    #[test]
    fn access_refreshes_recency() {
        let mut lru = LruStrategy::new();
        lru.on_put(&"a");
        lru.on_put(&"b");
        lru.on_put(&"c");
        lru.on_access(&"a");

        // "a" was refreshed, "b" is now least recent.
        assert_eq!(lru.select_victim(), Some("b"));
    }

    #[test]
    fn remove_forgets_the_key() {
        let mut lru = LruStrategy::new();
        lru.on_put(&"a");
        lru.on_put(&"b");
        lru.on_remove(&"a");

        assert_eq!(lru.select_victim(), Some("b"));
        assert_eq!(lru.len(), 1);
    }

    #[test]
    fn select_does_not_remove() {
        let mut lru = LruStrategy::new();
        lru.on_put(&1);
        assert_eq!(lru.select_victim(), Some(1));
        assert_eq!(lru.select_victim(), Some(1));
    }

    #[test]
    fn clear_empties_everything() {
        let mut lru = LruStrategy::new();
        lru.on_put(&1);
        lru.on_put(&2);
        lru.clear();
        assert!(lru.select_victim().is_none());
        assert_eq!(lru.len(), 0);
    }
}
