//! The public cache handle.
//!
//! [`Cache`] wraps the known implementation families behind tagged variants:
//! the reference single-lock core and, with the `highperf` feature, the
//! sharded core. Handles are cheap to clone; clones share the same storage.
//!
//! ## Example
//!
//! ```
//! use loadkit::config::CacheConfiguration;
//! use loadkit::provider::CacheProvider;
//!
//! let provider = CacheProvider::standard();
//! let cache = provider
//!     .create_cache::<String, u32>(CacheConfiguration::builder().name("pages").build())
//!     .unwrap();
//!
//! cache.put("home".to_string(), 200).unwrap();
//! assert_eq!(cache.get(&"home".to_string()).unwrap(), Some(200));
//! assert_eq!(cache.size(), 1);
//! ```

pub(crate) mod standard;

#[cfg(feature = "highperf")]
pub(crate) mod sharded;

use std::any::Any;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::task::JoinHandle;

use crate::config::CacheConfiguration;
use crate::error::{BoxError, CacheError, Result};
use crate::events::CacheEventListener;
use crate::stats::CacheStats;

use standard::StandardCore;

#[cfg(feature = "highperf")]
use sharded::ShardedCore;

// ---------------------------------------------------------------------------
// Cache handle
// ---------------------------------------------------------------------------

enum CacheCore<K, V> {
    Standard(Arc<StandardCore<K, V>>),
    #[cfg(feature = "highperf")]
    Sharded(Arc<ShardedCore<K, V>>),
}

/// A named, thread-safe cache with configurable eviction, TTL/idle
/// expiration, statistics, and event notification.
///
/// Obtained from a [`CacheProvider`](crate::provider::CacheProvider) or a
/// [`CacheManager`](crate::manager::CacheManager); cloning shares storage.
pub struct Cache<K, V> {
    core: CacheCore<K, V>,
}

impl<K, V> std::fmt::Debug for Cache<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cache").finish_non_exhaustive()
    }
}

impl<K, V> Clone for Cache<K, V> {
    fn clone(&self) -> Self {
        let core = match &self.core {
            CacheCore::Standard(core) => CacheCore::Standard(core.clone()),
            #[cfg(feature = "highperf")]
            CacheCore::Sharded(core) => CacheCore::Sharded(core.clone()),
        };
        Cache { core }
    }
}

macro_rules! dispatch {
    ($self:expr, $core:ident => $body:expr) => {
        match &$self.core {
            CacheCore::Standard($core) => $body,
            #[cfg(feature = "highperf")]
            CacheCore::Sharded($core) => $body,
        }
    };
}

impl<K, V> Cache<K, V>
where
    K: Clone + Eq + Hash + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    pub(crate) fn standard(name: String, config: CacheConfiguration) -> Self {
        Cache {
            core: CacheCore::Standard(StandardCore::new(name, config)),
        }
    }

    #[cfg(feature = "highperf")]
    pub(crate) fn sharded(name: String, config: CacheConfiguration) -> Self {
        Cache {
            core: CacheCore::Sharded(ShardedCore::new(name, config)),
        }
    }

    /// Implementation family backing this handle.
    pub fn implementation(&self) -> &'static str {
        match &self.core {
            CacheCore::Standard(_) => "Standard",
            #[cfg(feature = "highperf")]
            CacheCore::Sharded(_) => "Sharded",
        }
    }

    // -- lookups ----------------------------------------------------------

    /// Looks up a live entry. Expired entries are removed on sight and count
    /// as misses; a null-entry hit returns `Ok(None)` but counts as a hit.
    pub fn get(&self, key: &K) -> Result<Option<V>> {
        dispatch!(self, core => core.get(key))
    }

    /// Read-through lookup: on a miss the loader runs (unlocked, timed under
    /// the load statistics) and a present result is published before return.
    ///
    /// Concurrent misses on one key may each invoke the loader; whichever
    /// load publishes does so atomically, so readers never observe a
    /// half-written value.
    pub fn get_or_load<F>(&self, key: K, loader: F) -> Result<Option<V>>
    where
        F: FnOnce(&K) -> std::result::Result<Option<V>, BoxError>,
    {
        if let Some(value) = self.get(&key)? {
            return Ok(Some(value));
        }
        let started = Instant::now();
        let loaded = loader(&key).map_err(CacheError::Loader)?;
        dispatch!(self, core => core.counters().record_load(started.elapsed()));
        if let Some(value) = loaded.clone() {
            self.put(key, value)?;
        }
        Ok(loaded)
    }

    /// `true` iff a live entry exists; expired entries are removed and
    /// report `false`. Does not count toward hit/miss statistics and does
    /// not refresh recency.
    pub fn contains_key(&self, key: &K) -> Result<bool> {
        dispatch!(self, core => core.contains_key(key))
    }

    /// Snapshot of all live, non-null entries.
    pub fn as_map(&self) -> Result<HashMap<K, V>> {
        dispatch!(self, core => core.as_map())
    }

    /// The present subset of `keys`, looked up one by one.
    pub fn get_all(&self, keys: &[K]) -> Result<HashMap<K, V>> {
        let mut found = HashMap::new();
        for key in keys {
            if let Some(value) = self.get(key)? {
                found.insert(key.clone(), value);
            }
        }
        Ok(found)
    }

    // -- writes -----------------------------------------------------------

    /// Inserts with the configured default TTL, evicting one victim when a
    /// new key lands in a full cache (policy permitting).
    pub fn put(&self, key: K, value: V) -> Result<()> {
        dispatch!(self, core => core.put_entry(key, Some(value), None))
    }

    /// Inserts with an explicit TTL that overrides the configured default.
    pub fn put_with_ttl(&self, key: K, value: V, ttl: Duration) -> Result<()> {
        dispatch!(self, core => core.put_entry(key, Some(value), Some(ttl)))
    }

    /// Inserts a null entry. Fails with
    /// [`InvalidValue`](crate::error::CacheError::InvalidValue) unless the
    /// configuration allows null values.
    pub fn put_none(&self, key: K) -> Result<()> {
        dispatch!(self, core => core.put_entry(key, None, None))
    }

    /// Atomic insert-if-absent. Returns the existing live value (which is
    /// `None` for a null entry) when the key was already present.
    pub fn put_if_absent(&self, key: K, value: V) -> Result<Option<V>> {
        dispatch!(self, core => core.put_if_absent(key, Some(value)))
    }

    /// Applies the write path per entry; a failure stops the iteration but
    /// never rolls back prior insertions.
    pub fn put_all<I>(&self, entries: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, V)>,
    {
        for (key, value) in entries {
            self.put(key, value)?;
        }
        Ok(())
    }

    pub fn remove(&self, key: &K) -> Result<Option<V>> {
        dispatch!(self, core => core.remove(key))
    }

    pub fn remove_all(&self, keys: &[K]) -> Result<()> {
        for key in keys {
            self.remove(key)?;
        }
        Ok(())
    }

    /// Explicit single-key invalidation; the removed value is discarded.
    pub fn evict(&self, key: &K) -> Result<()> {
        self.remove(key).map(|_| ())
    }

    /// Removes every key matched by the predicate, firing listeners per key.
    pub fn evict_all<F>(&self, predicate: F) -> Result<()>
    where
        F: Fn(&K) -> bool,
    {
        dispatch!(self, core => core.evict_all(&predicate))
    }

    pub fn clear(&self) -> Result<()> {
        dispatch!(self, core => core.clear())
    }

    // -- async variants ---------------------------------------------------

    /// Schedules `get` on the tokio runtime. Aborting the handle never
    /// undoes a storage mutation that already happened.
    ///
    /// Must be called from within a tokio runtime.
    pub fn get_async(&self, key: K) -> JoinHandle<Result<Option<V>>> {
        let cache = self.clone();
        tokio::spawn(async move { cache.get(&key) })
    }

    /// Schedules `put` on the tokio runtime.
    pub fn put_async(&self, key: K, value: V) -> JoinHandle<Result<()>> {
        let cache = self.clone();
        tokio::spawn(async move { cache.put(key, value) })
    }

    /// Schedules `remove` on the tokio runtime.
    pub fn remove_async(&self, key: K) -> JoinHandle<Result<Option<V>>> {
        let cache = self.clone();
        tokio::spawn(async move { cache.remove(&key) })
    }

    // -- introspection ----------------------------------------------------

    /// Current live entry count (expired entries excluded).
    pub fn size(&self) -> u64 {
        dispatch!(self, core => core.size())
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Approximate count: raw storage length without expiry filtering.
    pub fn estimated_size(&self) -> u64 {
        dispatch!(self, core => core.estimated_size())
    }

    pub fn stats(&self) -> CacheStats {
        dispatch!(self, core => core.stats())
    }

    pub fn reset_stats(&self) {
        dispatch!(self, core => core.reset_stats())
    }

    /// Runs the expiration sweep immediately.
    pub fn clean_up(&self) {
        dispatch!(self, core => core.clean_up())
    }

    pub fn add_listener(&self, listener: Arc<dyn CacheEventListener<K, V>>) {
        dispatch!(self, core => core.add_listener(listener))
    }

    pub fn remove_listener(&self, listener: &Arc<dyn CacheEventListener<K, V>>) {
        dispatch!(self, core => core.remove_listener(listener))
    }

    /// Idempotent: stops the cleanup task, drops all entries and listeners,
    /// and fails every further mutating call with `Closed`.
    pub fn close(&self) {
        dispatch!(self, core => core.close())
    }

    pub fn is_closed(&self) -> bool {
        dispatch!(self, core => core.is_closed())
    }

    pub fn name(&self) -> &str {
        dispatch!(self, core => core.name())
    }

    pub fn configuration(&self) -> &CacheConfiguration {
        dispatch!(self, core => core.configuration())
    }
}

// ---------------------------------------------------------------------------
// Type-erased view for registries
// ---------------------------------------------------------------------------

/// Type-erased cache view. Providers and the manager track heterogeneous
/// `Cache<K, V>` instances through this trait and recover the concrete type
/// with an `Any` downcast.
pub(crate) trait ManagedCache: Send + Sync {
    fn cache_name(&self) -> String;
    fn implementation(&self) -> &'static str;
    fn stats(&self) -> CacheStats;
    fn reset_stats(&self);
    fn clean_up(&self);
    fn clear_entries(&self);
    fn close(&self);
    fn configuration(&self) -> CacheConfiguration;
    fn estimated_size(&self) -> u64;
    fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

impl<K, V> ManagedCache for Cache<K, V>
where
    K: Clone + Eq + Hash + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn cache_name(&self) -> String {
        self.name().to_string()
    }

    fn implementation(&self) -> &'static str {
        Cache::implementation(self)
    }

    fn stats(&self) -> CacheStats {
        Cache::stats(self)
    }

    fn reset_stats(&self) {
        Cache::reset_stats(self)
    }

    fn clean_up(&self) {
        Cache::clean_up(self)
    }

    fn clear_entries(&self) {
        // Closed caches have nothing left to clear.
        let _ = Cache::clear(self);
    }

    fn close(&self) {
        Cache::close(self)
    }

    fn configuration(&self) -> CacheConfiguration {
        Cache::configuration(self).clone()
    }

    fn estimated_size(&self) -> u64 {
        Cache::estimated_size(self)
    }

    fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
