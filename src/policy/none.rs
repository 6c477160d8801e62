//! No-eviction strategy: tracks nothing and never yields a victim, which
//! makes the cache reject new writes once full.

use super::EvictionStrategy;

/// The do-nothing strategy for [`EvictionPolicy::None`](crate::config::EvictionPolicy::None).
pub struct NoneStrategy;

impl<K> EvictionStrategy<K> for NoneStrategy
where
    K: Send + Sync,
{
    fn on_put(&mut self, _key: &K) {}

    fn on_access(&mut self, _key: &K) {}

    fn on_remove(&mut self, _key: &K) {}

    fn select_victim(&mut self) -> Option<K> {
        None
    }

    fn clear(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn never_selects_a_victim() {
        let mut none = NoneStrategy;
        EvictionStrategy::<u32>::on_put(&mut none, &1);
        EvictionStrategy::<u32>::on_put(&mut none, &2);
        assert_eq!(EvictionStrategy::<u32>::select_victim(&mut none), None);
    }
}
