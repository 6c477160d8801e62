//! Reference cache core.
//!
//! This is the single-lock implementation behind the `"Standard"` provider
//! family, and the building block the sharded family composes. One
//! `parking_lot::RwLock` guards the storage map together with the eviction
//! strategy, so eviction decisions are atomic with the insertion that
//! triggered them.
//!
//! ## Architecture
//!
//! ```text
//!   ┌───────────────────────────────────────────────────────────────┐
//!   │                     StandardCore<K, V>                        │
//!   │                                                               │
//!   │   ┌───────────────────────────────────────────────────────┐   │
//!   │   │  RwLock<CoreState>                                    │   │
//!   │   │                                                       │   │
//!   │   │   map: FxHashMap<K, CacheEntry<V>>                    │   │
//!   │   │   strategy: Box<dyn EvictionStrategy<K>>              │   │
//!   │   └───────────────────────────────────────────────────────┘   │
//!   │                                                               │
//!   │   counters:  Arc<StatCounters>     (lock-free atomics)        │
//!   │   listeners: Arc<Listeners<K, V>>  (copy-on-write list)       │
//!   │   closed:    AtomicBool                                       │
//!   │   cleanup:   Mutex<Option<JoinHandle>>  (periodic sweep)      │
//!   └───────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Lock discipline
//!
//! | Operation                     | Lock  | Notes                          |
//! |-------------------------------|-------|--------------------------------|
//! | `get`, `put`, `remove`        | Write | Strategy bookkeeping mutates   |
//! | `contains_key`                | Write | Removes the entry when expired |
//! | `as_map`, `size`              | Read  | Expired entries filtered only  |
//! | `estimated_size`              | Read  | Raw map length, no filtering   |
//! | Stats updates                 | None  | Relaxed atomics                |
//!
//! Events are buffered while the lock is held and dispatched after it is
//! released, so listeners can re-enter the cache freely.
//!
//! ## Expiration
//!
//! Two mechanisms run concurrently. Lazily, every lookup checks the touched
//! entry against its TTL deadline and the idle limit. Periodically, a tokio
//! task sweeps the whole map every 30 seconds; it holds only a weak
//! reference, never keeps a dropped cache alive, and is aborted on `close`.
//! Constructing a cache outside a tokio runtime simply skips the periodic
//! task and relies on lazy expiration alone.

use std::hash::Hash;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashMap;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use crate::config::CacheConfiguration;
use crate::entry::CacheEntry;
use crate::error::{CacheError, Result};
use crate::events::{CacheEvent, CacheEventListener, Listeners, RemovalCause};
use crate::policy::{self, EvictionStrategy};
use crate::stats::{CacheStats, StatCounters};

/// Interval of the periodic expired-entry sweep.
pub(crate) const CLEANUP_INTERVAL: Duration = Duration::from_secs(30);

/// Storage map and eviction strategy, guarded by one lock so victim
/// selection stays atomic with the insertion that triggered it.
struct CoreState<K, V> {
    map: FxHashMap<K, CacheEntry<V>>,
    strategy: Box<dyn EvictionStrategy<K>>,
}

enum Lookup<V> {
    Hit(Option<V>),
    Dead,
    Miss,
}

pub(crate) struct StandardCore<K, V> {
    name: String,
    config: CacheConfiguration,
    state: RwLock<CoreState<K, V>>,
    counters: Arc<StatCounters>,
    listeners: Arc<Listeners<K, V>>,
    closed: AtomicBool,
    cleanup_task: Mutex<Option<JoinHandle<()>>>,
}

impl<K, V> StandardCore<K, V>
where
    K: Clone + Eq + Hash + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Creates a core with its own counters and listener list, and starts
    /// the periodic sweep when a runtime is available.
    pub fn new(name: String, config: CacheConfiguration) -> Arc<Self> {
        let counters = Arc::new(StatCounters::new(config.record_stats));
        Self::with_parts(name, config, counters, Arc::new(Listeners::default()), true)
    }

    /// Creates a core wired to shared counters and listeners. The sharded
    /// family uses this to give every shard one stats/listener context and
    /// a single sweep task of its own (`background = false`).
    pub fn with_parts(
        name: String,
        config: CacheConfiguration,
        counters: Arc<StatCounters>,
        listeners: Arc<Listeners<K, V>>,
        background: bool,
    ) -> Arc<Self> {
        let strategy = policy::for_policy::<K>(config.eviction_policy);
        let core = Arc::new(StandardCore {
            name,
            config,
            state: RwLock::new(CoreState {
                map: FxHashMap::default(),
                strategy,
            }),
            counters,
            listeners,
            closed: AtomicBool::new(false),
            cleanup_task: Mutex::new(None),
        });
        if background {
            Self::spawn_cleanup(&core);
        }
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
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(core) = weak.upgrade() else { break };
                if core.closed.load(Ordering::SeqCst) {
                    break;
                }
                core.clean_up();
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

    /// An entry is dead once past its TTL deadline or unread beyond the
    /// idle limit.
    #[inline]
    fn entry_dead(&self, entry: &CacheEntry<V>, now: Instant) -> bool {
        if entry.is_expired(now) {
            return true;
        }
        match self.config.idle_limit() {
            Some(limit) => entry.idle_for(now) > limit,
            None => false,
        }
    }

    fn validate_value(&self, value: &Option<V>) -> Result<()> {
        if value.is_none() && !self.config.allow_null_values {
            return Err(CacheError::InvalidValue(format!(
                "cache `{}` does not allow null values",
                self.name
            )));
        }
        Ok(())
    }

    pub fn get(&self, key: &K) -> Result<Option<V>> {
        self.ensure_open()?;
        let now = Instant::now();
        let mut events = Vec::new();
        let found;
        {
            let mut state = self.state.write();
            let lookup = match state.map.get_mut(key) {
                Some(entry) if self.entry_dead(entry, now) => Lookup::Dead,
                Some(entry) => {
                    entry.touch(now);
                    Lookup::Hit(entry.value.clone())
                }
                None => Lookup::Miss,
            };
            match lookup {
                Lookup::Hit(value) => {
                    state.strategy.on_access(key);
                    self.counters.record_hit();
                    events.push(CacheEvent::Get {
                        key: key.clone(),
                        value: value.clone(),
                        hit: true,
                    });
                    found = value;
                }
                Lookup::Dead => {
                    let entry = state.map.remove(key);
                    state.strategy.on_remove(key);
                    events.push(CacheEvent::Remove {
                        key: key.clone(),
                        value: entry.and_then(|e| e.value),
                        cause: RemovalCause::Expired,
                    });
                    self.counters.record_miss();
                    events.push(CacheEvent::Get {
                        key: key.clone(),
                        value: None,
                        hit: false,
                    });
                    found = None;
                }
                Lookup::Miss => {
                    self.counters.record_miss();
                    events.push(CacheEvent::Get {
                        key: key.clone(),
                        value: None,
                        hit: false,
                    });
                    found = None;
                }
            }
        }
        self.listeners.notify(&events);
        Ok(found)
    }

    pub fn put_entry(&self, key: K, value: Option<V>, ttl: Option<Duration>) -> Result<()> {
        self.ensure_open()?;
        self.validate_value(&value)?;
        let now = Instant::now();
        let mut events = Vec::new();
        {
            let mut state = self.state.write();
            self.insert_locked(&mut state, key, value, ttl, now, &mut events);
        }
        self.listeners.notify(&events);
        Ok(())
    }

    pub fn put_if_absent(&self, key: K, value: Option<V>) -> Result<Option<V>> {
        self.ensure_open()?;
        self.validate_value(&value)?;
        let now = Instant::now();
        let mut events = Vec::new();
        let previous;
        {
            let mut state = self.state.write();
            let lookup = match state.map.get_mut(&key) {
                Some(entry) if self.entry_dead(entry, now) => Lookup::Dead,
                Some(entry) => {
                    entry.touch(now);
                    Lookup::Hit(entry.value.clone())
                }
                None => Lookup::Miss,
            };
            match lookup {
                Lookup::Hit(existing) => {
                    state.strategy.on_access(&key);
                    self.counters.record_hit();
                    events.push(CacheEvent::Get {
                        key: key.clone(),
                        value: existing.clone(),
                        hit: true,
                    });
                    previous = existing;
                }
                dead_or_miss => {
                    if matches!(dead_or_miss, Lookup::Dead) {
                        let entry = state.map.remove(&key);
                        state.strategy.on_remove(&key);
                        events.push(CacheEvent::Remove {
                            key: key.clone(),
                            value: entry.and_then(|e| e.value),
                            cause: RemovalCause::Expired,
                        });
                    }
                    self.counters.record_miss();
                    events.push(CacheEvent::Get {
                        key: key.clone(),
                        value: None,
                        hit: false,
                    });
                    self.insert_locked(&mut state, key, value, None, now, &mut events);
                    previous = None;
                }
            }
        }
        self.listeners.notify(&events);
        Ok(previous)
    }

    /// Write path shared by `put_entry` and `put_if_absent`. Runs with the
    /// state lock held; returns whether the insert actually happened.
    fn insert_locked(
        &self,
        state: &mut CoreState<K, V>,
        key: K,
        value: Option<V>,
        ttl: Option<Duration>,
        now: Instant,
        events: &mut Vec<CacheEvent<K, V>>,
    ) -> bool {
        let exists = state.map.contains_key(&key);
        if !exists && state.map.len() as u64 >= self.config.max_size {
            // Reclaim dead entries before sacrificing a live one.
            self.sweep_locked(state, now, events);
            while state.map.len() as u64 >= self.config.max_size {
                let Some(victim) = state.strategy.select_victim() else {
                    // NONE policy (or nothing tracked): reject the new write.
                    return false;
                };
                state.strategy.on_remove(&victim);
                let Some(entry) = state.map.remove(&victim) else {
                    return false;
                };
                self.counters.record_eviction();
                events.push(CacheEvent::Evict {
                    key: victim,
                    value: entry.value,
                    cause: RemovalCause::Size,
                });
            }
        }
        // Per-entry TTL is authoritative over the configured default.
        let effective_ttl = ttl.or_else(|| self.config.write_ttl());
        let entry = CacheEntry::new(value.clone(), effective_ttl);
        if let Some(old) = state.map.insert(key.clone(), entry) {
            state.strategy.on_remove(&key);
            events.push(CacheEvent::Remove {
                key: key.clone(),
                value: old.value,
                cause: RemovalCause::Replaced,
            });
        }
        state.strategy.on_put(&key);
        events.push(CacheEvent::Put { key, value });
        true
    }

    pub fn remove(&self, key: &K) -> Result<Option<V>> {
        self.ensure_open()?;
        let mut events = Vec::new();
        let removed;
        {
            let mut state = self.state.write();
            match state.map.remove(key) {
                Some(entry) => {
                    state.strategy.on_remove(key);
                    events.push(CacheEvent::Remove {
                        key: key.clone(),
                        value: entry.value.clone(),
                        cause: RemovalCause::Explicit,
                    });
                    removed = entry.value;
                }
                None => removed = None,
            }
        }
        self.listeners.notify(&events);
        Ok(removed)
    }

    pub fn contains_key(&self, key: &K) -> Result<bool> {
        self.ensure_open()?;
        let now = Instant::now();
        let mut events = Vec::new();
        let present;
        {
            let mut state = self.state.write();
            match state.map.get(key) {
                Some(entry) if self.entry_dead(entry, now) => {
                    let entry = state.map.remove(key);
                    state.strategy.on_remove(key);
                    events.push(CacheEvent::Remove {
                        key: key.clone(),
                        value: entry.and_then(|e| e.value),
                        cause: RemovalCause::Expired,
                    });
                    present = false;
                }
                Some(_) => present = true,
                None => present = false,
            }
        }
        self.listeners.notify(&events);
        Ok(present)
    }

    /// Snapshot of the live, non-null entries.
    pub fn as_map(&self) -> Result<std::collections::HashMap<K, V>> {
        self.ensure_open()?;
        let now = Instant::now();
        let state = self.state.read();
        Ok(state
            .map
            .iter()
            .filter(|(_, entry)| !self.entry_dead(entry, now))
            .filter_map(|(key, entry)| entry.value.clone().map(|value| (key.clone(), value)))
            .collect())
    }

    pub fn clear(&self) -> Result<()> {
        self.ensure_open()?;
        self.clear_inner(true);
        Ok(())
    }

    /// Clears storage and strategy state; `emit` controls whether listeners
    /// observe a clear event (close and shard fan-out stay silent).
    pub(crate) fn clear_inner(&self, emit: bool) {
        {
            let mut state = self.state.write();
            state.map.clear();
            state.strategy.clear();
        }
        if emit {
            self.listeners.notify(&[CacheEvent::Clear]);
        }
    }

    /// Live entry count; a closed cache reports zero.
    pub fn size(&self) -> u64 {
        if self.closed.load(Ordering::SeqCst) {
            return 0;
        }
        let now = Instant::now();
        let state = self.state.read();
        state
            .map
            .values()
            .filter(|entry| !self.entry_dead(entry, now))
            .count() as u64
    }

    /// Raw map length without expiry filtering.
    pub fn estimated_size(&self) -> u64 {
        if self.closed.load(Ordering::SeqCst) {
            return 0;
        }
        self.state.read().map.len() as u64
    }

    pub fn evict_all<F>(&self, predicate: F) -> Result<()>
    where
        F: Fn(&K) -> bool,
    {
        self.ensure_open()?;
        let matching: Vec<K> = {
            let state = self.state.read();
            state
                .map
                .keys()
                .filter(|key| predicate(key))
                .cloned()
                .collect()
        };
        for key in matching {
            self.remove(&key)?;
        }
        Ok(())
    }

    /// Removes every dead entry. No-op on a closed cache.
    pub fn clean_up(&self) {
        if self.closed.load(Ordering::SeqCst) {
            return;
        }
        let mut events = Vec::new();
        let swept;
        {
            let mut state = self.state.write();
            swept = self.sweep_locked(&mut state, Instant::now(), &mut events);
        }
        if swept > 0 {
            trace!(cache = %self.name, swept, "expired entries removed");
        }
        self.listeners.notify(&events);
    }

    fn sweep_locked(
        &self,
        state: &mut CoreState<K, V>,
        now: Instant,
        events: &mut Vec<CacheEvent<K, V>>,
    ) -> usize {
        let dead: Vec<K> = state
            .map
            .iter()
            .filter(|(_, entry)| self.entry_dead(entry, now))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &dead {
            if let Some(entry) = state.map.remove(key) {
                state.strategy.on_remove(key);
                events.push(CacheEvent::Remove {
                    key: key.clone(),
                    value: entry.value,
                    cause: RemovalCause::Expired,
                });
            }
        }
        dead.len()
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

    /// Idempotent: the first call cancels the sweep task and drops all
    /// state; later calls return immediately.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Some(task) = self.cleanup_task.lock().take() {
            task.abort();
        }
        self.clear_inner(false);
        self.listeners.clear();
        debug!(cache = %self.name, "cache closed");
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
}

impl<K, V> Drop for StandardCore<K, V> {
    fn drop(&mut self) {
        if let Some(task) = self.cleanup_task.get_mut().take() {
            task.abort();
        }
    }
}
