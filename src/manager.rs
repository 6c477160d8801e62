//! Cache manager: the single entry point through which callers acquire
//! caches by name, with provider selection and global defaults merged in.
//!
//! ## Provider selection
//!
//! Construction probes for the optimized family: with the `highperf` feature
//! the sharded `"HighPerf"` provider becomes the default, otherwise the
//! manager falls back to the reference `"Standard"` family. Both built-in
//! families are registered by name, and callers may register additional
//! provider instances.
//!
//! ## Cache acquisition
//!
//! [`CacheManager::cache`] returns the already-tracked cache for a name or
//! asks the default provider to create one from the configuration merged
//! with the global defaults (see
//! [`CacheConfiguration::merge_with`](crate::config::CacheConfiguration::merge_with)).
//! Provider-scoped acquisition tracks caches under `"provider:name"`.
//!
//! ## Process-wide default
//!
//! An explicit manager passed around is preferred; [`default_manager`]
//! offers the conventional lazily-initialized singleton with
//! [`shutdown_default_manager`] as its documented shutdown path.
//!
//! ## Example
//!
//! ```
//! use loadkit::manager::CacheManager;
//!
//! let manager = CacheManager::new();
//! let cache = manager
//!     .builder("pages")
//!     .max_size(500)
//!     .build::<String, String>()
//!     .unwrap();
//!
//! cache.put("home".into(), "<html>".into()).unwrap();
//! assert_eq!(manager.manager_stats().total_caches, 1);
//! manager.close();
//! ```

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashMap;
use serde::Serialize;
use tracing::debug;

use crate::cache::{Cache, ManagedCache};
use crate::config::{CacheConfiguration, CacheConfigurationBuilder, EvictionPolicy};
use crate::error::{CacheError, Result};
use crate::provider::CacheProvider;
use crate::stats::CacheStats;

// ---------------------------------------------------------------------------
// CacheManager
// ---------------------------------------------------------------------------

/// Registry of providers and named caches with aggregate observability.
pub struct CacheManager {
    providers: Mutex<FxHashMap<String, Arc<CacheProvider>>>,
    caches: Mutex<FxHashMap<String, Arc<dyn ManagedCache>>>,
    default_provider: Arc<CacheProvider>,
    global_config: RwLock<CacheConfiguration>,
    closed: AtomicBool,
}

impl Default for CacheManager {
    fn default() -> Self {
        Self::new()
    }
}

impl CacheManager {
    /// Creates a manager with the best available provider as default.
    pub fn new() -> Self {
        Self::with_provider(Self::detect_best_provider())
    }

    /// Creates a manager with a specific default provider. The built-in
    /// families are registered alongside it.
    pub fn with_provider(default_provider: Arc<CacheProvider>) -> Self {
        let manager = CacheManager {
            providers: Mutex::new(FxHashMap::default()),
            caches: Mutex::new(FxHashMap::default()),
            default_provider,
            global_config: RwLock::new(CacheConfiguration::default()),
            closed: AtomicBool::new(false),
        };
        {
            let mut providers = manager.providers.lock();
            providers.insert("Standard".to_string(), CacheProvider::standard());
            #[cfg(feature = "highperf")]
            providers.insert("HighPerf".to_string(), CacheProvider::high_perf());
            providers.insert(
                manager.default_provider.provider_name().to_string(),
                manager.default_provider.clone(),
            );
        }
        debug!(
            provider = manager.default_provider.provider_name(),
            "cache manager created"
        );
        manager
    }

    fn detect_best_provider() -> Arc<CacheProvider> {
        #[cfg(feature = "highperf")]
        {
            CacheProvider::high_perf()
        }
        #[cfg(not(feature = "highperf"))]
        {
            CacheProvider::standard()
        }
    }

    #[inline]
    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            Err(CacheError::ManagerClosed)
        } else {
            Ok(())
        }
    }

    fn downcast<K, V>(erased: &Arc<dyn ManagedCache>, name: &str) -> Result<Cache<K, V>>
    where
        K: Clone + Eq + Hash + Send + Sync + 'static,
        V: Clone + Send + Sync + 'static,
    {
        erased
            .clone()
            .as_any()
            .downcast::<Cache<K, V>>()
            .map(|arc| (*arc).clone())
            .map_err(|_| CacheError::TypeMismatch {
                cache: name.to_string(),
            })
    }

    // -- acquisition ------------------------------------------------------

    /// Returns the cache tracked under `name`, creating it through the
    /// default provider on first use. The supplied configuration is merged
    /// with the global defaults and renamed to `name`.
    pub fn cache<K, V>(&self, name: &str, config: CacheConfiguration) -> Result<Cache<K, V>>
    where
        K: Clone + Eq + Hash + Send + Sync + 'static,
        V: Clone + Send + Sync + 'static,
    {
        self.ensure_open()?;
        let mut caches = self.caches.lock();
        if let Some(existing) = caches.get(name) {
            return Self::downcast(existing, name);
        }
        let mut merged = config.merge_with(&self.global_config.read());
        merged.name = name.to_string();
        let cache = self.default_provider.create_cache::<K, V>(merged)?;
        caches.insert(name.to_string(), Arc::new(cache.clone()) as Arc<dyn ManagedCache>);
        Ok(cache)
    }

    /// Acquires `name` with the global configuration as the specific one.
    pub fn cache_with_defaults<K, V>(&self, name: &str) -> Result<Cache<K, V>>
    where
        K: Clone + Eq + Hash + Send + Sync + 'static,
        V: Clone + Send + Sync + 'static,
    {
        let global = self.global_config.read().clone();
        self.cache(name, global)
    }

    /// Provider-scoped acquisition: the cache is tracked under the fully
    /// qualified key `provider:name`.
    pub fn cache_with_provider<K, V>(
        &self,
        name: &str,
        provider_name: &str,
        config: CacheConfiguration,
    ) -> Result<Cache<K, V>>
    where
        K: Clone + Eq + Hash + Send + Sync + 'static,
        V: Clone + Send + Sync + 'static,
    {
        self.ensure_open()?;
        let provider = self
            .providers
            .lock()
            .get(provider_name)
            .cloned()
            .ok_or_else(|| CacheError::UnknownProvider(provider_name.to_string()))?;
        let qualified = format!("{provider_name}:{name}");
        let mut caches = self.caches.lock();
        if let Some(existing) = caches.get(&qualified) {
            return Self::downcast(existing, &qualified);
        }
        let mut merged = config.merge_with(&self.global_config.read());
        merged.name = qualified.clone();
        let cache = provider.create_cache::<K, V>(merged)?;
        caches.insert(qualified, Arc::new(cache.clone()) as Arc<dyn ManagedCache>);
        Ok(cache)
    }

    /// Fluent acquisition.
    pub fn builder(&self, name: impl Into<String>) -> CacheBuilder<'_> {
        CacheBuilder {
            manager: self,
            name: name.into(),
            config: CacheConfigurationBuilder::new(),
            provider: None,
        }
    }

    // -- registry ---------------------------------------------------------

    /// Registers an additional provider instance under a name.
    pub fn register_provider(&self, name: impl Into<String>, provider: Arc<CacheProvider>) -> Result<()> {
        self.ensure_open()?;
        self.providers.lock().insert(name.into(), provider);
        Ok(())
    }

    pub fn provider(&self, name: &str) -> Option<Arc<CacheProvider>> {
        self.providers.lock().get(name).cloned()
    }

    pub fn provider_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.providers.lock().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn cache_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.caches.lock().keys().cloned().collect();
        names.sort();
        names
    }

    /// Closes and stops tracking a cache. Unknown names are ignored.
    pub fn remove_cache(&self, name: &str) {
        if let Some(cache) = self.caches.lock().remove(name) {
            cache.close();
        }
    }

    // -- global configuration ---------------------------------------------

    pub fn set_global_configuration(&self, config: CacheConfiguration) {
        *self.global_config.write() = config;
    }

    pub fn global_configuration(&self) -> CacheConfiguration {
        self.global_config.read().clone()
    }

    // -- aggregate observability ------------------------------------------

    /// Per-cache statistics snapshots.
    pub fn all_stats(&self) -> HashMap<String, CacheStats> {
        self.caches
            .lock()
            .iter()
            .map(|(name, cache)| (name.clone(), cache.stats()))
            .collect()
    }

    /// Totals across every tracked cache.
    pub fn manager_stats(&self) -> CacheManagerStats {
        let caches = self.caches.lock();
        let mut total_hits = 0;
        let mut total_misses = 0;
        let mut total_size = 0;
        for cache in caches.values() {
            let stats = cache.stats();
            total_hits += stats.hit_count;
            total_misses += stats.miss_count;
            total_size += stats.size;
        }
        let total_requests = total_hits + total_misses;
        CacheManagerStats {
            total_caches: caches.len(),
            total_providers: self.providers.lock().len(),
            total_hits,
            total_misses,
            total_size,
            overall_hit_rate: if total_requests > 0 {
                total_hits as f64 / total_requests as f64
            } else {
                0.0
            },
            closed: self.closed.load(Ordering::SeqCst),
        }
    }

    /// Detailed per-cache information.
    pub fn cache_info(&self) -> HashMap<String, CacheInfo> {
        self.caches
            .lock()
            .iter()
            .map(|(name, cache)| {
                (
                    name.clone(),
                    CacheInfo {
                        name: cache.cache_name(),
                        implementation: cache.implementation().to_string(),
                        stats: cache.stats(),
                        configuration: cache.configuration(),
                        estimated_size: cache.estimated_size(),
                    },
                )
            })
            .collect()
    }

    /// Resets statistics on every tracked cache.
    pub fn reset_all_stats(&self) {
        for cache in self.caches.lock().values() {
            cache.reset_stats();
        }
    }

    /// Runs the expiration sweep on every tracked cache.
    pub fn cleanup_all(&self) {
        for cache in self.caches.lock().values() {
            cache.clean_up();
        }
    }

    /// Clears the entries of every tracked cache.
    pub fn clear_all(&self) {
        for cache in self.caches.lock().values() {
            cache.clear_entries();
        }
    }

    // -- lifecycle --------------------------------------------------------

    /// Closes every cache, then every provider. Idempotent; mutating calls
    /// afterwards fail with `ManagerClosed`.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        let caches: Vec<_> = self.caches.lock().drain().map(|(_, c)| c).collect();
        for cache in caches {
            cache.close();
        }
        let providers: Vec<_> = self.providers.lock().drain().map(|(_, p)| p).collect();
        for provider in providers {
            provider.close();
        }
        debug!("cache manager closed");
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

// ---------------------------------------------------------------------------
// Aggregate report types
// ---------------------------------------------------------------------------

/// Totals across all caches of a manager.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CacheManagerStats {
    pub total_caches: usize,
    pub total_providers: usize,
    pub total_hits: u64,
    pub total_misses: u64,
    pub total_size: u64,
    pub overall_hit_rate: f64,
    pub closed: bool,
}

/// Detailed information about one tracked cache.
#[derive(Debug, Clone, Serialize)]
pub struct CacheInfo {
    pub name: String,
    pub implementation: String,
    pub stats: CacheStats,
    pub configuration: CacheConfiguration,
    pub estimated_size: u64,
}

// ---------------------------------------------------------------------------
// Fluent builder
// ---------------------------------------------------------------------------

/// Accumulates configuration fields and forwards to
/// [`CacheManager::cache`] (or the provider-scoped variant) on `build`.
pub struct CacheBuilder<'m> {
    manager: &'m CacheManager,
    name: String,
    config: CacheConfigurationBuilder,
    provider: Option<String>,
}

impl<'m> CacheBuilder<'m> {
    pub fn max_size(mut self, max_size: u64) -> Self {
        self.config = self.config.max_size(max_size);
        self
    }

    pub fn default_ttl(mut self, ttl: Duration) -> Self {
        self.config = self.config.default_ttl(ttl);
        self
    }

    pub fn eviction_policy(mut self, policy: EvictionPolicy) -> Self {
        self.config = self.config.eviction_policy(policy);
        self
    }

    pub fn record_stats(mut self, record: bool) -> Self {
        self.config = self.config.record_stats(record);
        self
    }

    pub fn allow_null_values(mut self, allow: bool) -> Self {
        self.config = self.config.allow_null_values(allow);
        self
    }

    pub fn expire_after_write(mut self, d: Duration) -> Self {
        self.config = self.config.expire_after_write(d);
        self
    }

    pub fn expire_after_access(mut self, d: Duration) -> Self {
        self.config = self.config.expire_after_access(d);
        self
    }

    /// Scopes acquisition to a registered provider.
    pub fn provider(mut self, provider_name: impl Into<String>) -> Self {
        self.provider = Some(provider_name.into());
        self
    }

    pub fn build<K, V>(self) -> Result<Cache<K, V>>
    where
        K: Clone + Eq + Hash + Send + Sync + 'static,
        V: Clone + Send + Sync + 'static,
    {
        let config = self.config.name(self.name.clone()).build();
        match &self.provider {
            Some(provider_name) => {
                self.manager
                    .cache_with_provider(&self.name, provider_name, config)
            }
            None => self.manager.cache(&self.name, config),
        }
    }
}

// ---------------------------------------------------------------------------
// Process-wide default manager
// ---------------------------------------------------------------------------

static DEFAULT_MANAGER: Mutex<Option<Arc<CacheManager>>> = Mutex::new(None);

/// The conventional process-wide manager, lazily initialized on first use.
///
/// Prefer building an explicit [`CacheManager`] and passing it around; this
/// exists for call sites that have nowhere to thread one through. Shut it
/// down with [`shutdown_default_manager`].
pub fn default_manager() -> Arc<CacheManager> {
    DEFAULT_MANAGER
        .lock()
        .get_or_insert_with(|| Arc::new(CacheManager::new()))
        .clone()
}

/// Replaces the process-wide manager, closing the previous one.
pub fn set_default_manager(manager: Arc<CacheManager>) {
    let previous = DEFAULT_MANAGER.lock().replace(manager);
    if let Some(previous) = previous {
        previous.close();
    }
}

/// Closes and clears the process-wide manager. The next call to
/// [`default_manager`] initializes a fresh one.
pub fn shutdown_default_manager() {
    let previous = DEFAULT_MANAGER.lock().take();
    if let Some(previous) = previous {
        previous.close();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
