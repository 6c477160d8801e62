//! First In First Out eviction strategy.
//!
//! Insertion order lives in a queue of `(key, generation)` pairs. Removal is
//! lazy: `on_remove` only drops the key from the live map, and stale queue
//! entries are skipped when the head is popped during victim selection. A
//! replaced key gets a fresh generation, so its old queue position no longer
//! counts: re-inserting moves it to the back.
//!
//! ```text
//!   queue: [(A,0), (B,1), (A,4)]     live: {B→1, A→4}
//!
//!   select_victim:
//!     pop (A,0) → live[A]=4 ≠ 0 → stale, skip
//!     pop (B,1) → live[B]=1     → victim B
//! ```

use std::collections::VecDeque;
use std::hash::Hash;

use rustc_hash::FxHashMap;

use super::EvictionStrategy;

/// Insertion-ordered eviction bookkeeping with lazy stale-skip.
pub struct FifoStrategy<K> {
    queue: VecDeque<(K, u64)>,
    live: FxHashMap<K, u64>,
    next_generation: u64,
}

impl<K> FifoStrategy<K>
where
    K: Clone + Eq + Hash,
{
    pub fn new() -> Self {
        FifoStrategy {
            queue: VecDeque::new(),
            live: FxHashMap::default(),
            next_generation: 0,
        }
    }
}

impl<K> Default for FifoStrategy<K>
where
    K: Clone + Eq + Hash,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K> EvictionStrategy<K> for FifoStrategy<K>
where
    K: Clone + Eq + Hash + Send + Sync,
{
    fn on_put(&mut self, key: &K) {
        let generation = self.next_generation;
        self.next_generation += 1;
        self.live.insert(key.clone(), generation);
        self.queue.push_back((key.clone(), generation));
    }

    fn on_access(&mut self, _key: &K) {
        // FIFO ignores access.
    }

    fn on_remove(&mut self, key: &K) {
        self.live.remove(key);
    }

    fn select_victim(&mut self) -> Option<K> {
        while let Some((key, generation)) = self.queue.pop_front() {
            match self.live.get(&key) {
                Some(&current) if current == generation => {
                    self.live.remove(&key);
                    return Some(key);
                }
                // Stale: removed or re-inserted since it was queued.
                _ => continue,
            }
        }
        None
    }

    fn clear(&mut self) {
        self.queue.clear();
        self.live.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn victim_follows_insertion_order() {
        let mut fifo = FifoStrategy::new();
        fifo.on_put(&"a");
        fifo.on_put(&"b");
        fifo.on_put(&"c");

        assert_eq!(fifo.select_victim(), Some("a"));
        assert_eq!(fifo.select_victim(), Some("b"));
        assert_eq!(fifo.select_victim(), Some("c"));
        assert_eq!(fifo.select_victim(), None);
    }

    #[test]
    fn access_does_not_reorder() {
        let mut fifo = FifoStrategy::new();
        fifo.on_put(&"a");
        fifo.on_put(&"b");
        fifo.on_access(&"a");
        fifo.on_access(&"a");

        assert_eq!(fifo.select_victim(), Some("a"));
    }

    #[test]
    fn removed_keys_are_skipped() {
        let mut fifo = FifoStrategy::new();
        fifo.on_put(&"a");
        fifo.on_put(&"b");
        fifo.on_remove(&"a");

        assert_eq!(fifo.select_victim(), Some("b"));
    }

    #[test]
    fn reinsertion_moves_to_the_back() {
        let mut fifo = FifoStrategy::new();
        fifo.on_put(&"a");
        fifo.on_put(&"b");
        // Replacement: the cache reports remove + put for the same key.
        fifo.on_remove(&"a");
        fifo.on_put(&"a");

        assert_eq!(fifo.select_victim(), Some("b"));
        assert_eq!(fifo.select_victim(), Some("a"));
    }

    #[test]
    fn clear_resets_queue() {
        let mut fifo = FifoStrategy::new();
        fifo.on_put(&1);
        fifo.clear();
        assert_eq!(fifo.select_victim(), None);
    }
}
