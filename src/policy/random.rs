//! Random eviction strategy.
//!
//! Keeps a dense `Vec<K>` for O(1) uniform selection and an index map for
//! O(1) swap-remove. Victims are drawn with an internal XorShift64 PRNG:
//! fast, deterministic for a given seed, and free of system-time or OS
//! entropy dependencies.

use std::hash::Hash;

use rustc_hash::FxHashMap;

use super::EvictionStrategy;

/// Uniform-random eviction bookkeeping.
pub struct RandomStrategy<K> {
    /// key → index into `keys`
    indices: FxHashMap<K, usize>,
    /// Dense key array for O(1) random access.
    keys: Vec<K>,
    /// XorShift64 PRNG state; seeded non-zero.
    rng_state: u64,
}

impl<K> RandomStrategy<K>
where
    K: Clone + Eq + Hash,
{
    pub fn new() -> Self {
        RandomStrategy {
            indices: FxHashMap::default(),
            keys: Vec::new(),
            rng_state: 0x9e37_79b9_7f4a_7c15,
        }
    }

    #[inline]
    fn next_random(&mut self) -> u64 {
        let mut x = self.rng_state;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.rng_state = x;
        x
    }

    fn swap_remove(&mut self, index: usize) {
        let last = self.keys.len() - 1;
        if index != last {
            self.keys.swap(index, last);
            let moved = self.keys[index].clone();
            self.indices.insert(moved, index);
        }
        self.keys.pop();
    }
}

impl<K> Default for RandomStrategy<K>
where
    K: Clone + Eq + Hash,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K> EvictionStrategy<K> for RandomStrategy<K>
where
    K: Clone + Eq + Hash + Send + Sync,
{
    fn on_put(&mut self, key: &K) {
        if self.indices.contains_key(key) {
            return;
        }
        self.indices.insert(key.clone(), self.keys.len());
        self.keys.push(key.clone());
    }

    fn on_access(&mut self, _key: &K) {
        // Access does not change eviction probability.
    }

    fn on_remove(&mut self, key: &K) {
        if let Some(index) = self.indices.remove(key) {
            self.swap_remove(index);
        }
    }

    fn select_victim(&mut self) -> Option<K> {
        if self.keys.is_empty() {
            return None;
        }
        let index = (self.next_random() as usize) % self.keys.len();
        Some(self.keys[index].clone())
    }

    fn clear(&mut self) {
        self.indices.clear();
        self.keys.clear();
    }
}
