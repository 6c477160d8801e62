//! Cache providers: factories that instantiate caches of one implementation
//! family and own their lifetime.
//!
//! The known families are tagged by [`CacheFamily`]: the reference
//! single-lock implementation (`"Standard"`) and, behind the `highperf`
//! feature, the sharded implementation (`"HighPerf"`). A provider registers
//! every cache it creates under the configured name, closes them all on
//! [`CacheProvider::close`], and refuses creation afterwards.
//!
//! ## Example
//!
//! ```
//! use loadkit::config::CacheConfiguration;
//! use loadkit::provider::CacheProvider;
//!
//! let provider = CacheProvider::standard();
//! assert_eq!(provider.provider_name(), "Standard");
//!
//! let config = CacheConfiguration::builder().name("users").max_size(100).build();
//! let cache = provider.create_cache::<u64, String>(config).unwrap();
//! cache.put(1, "ada".to_string()).unwrap();
//!
//! assert_eq!(provider.cache_names(), vec!["users".to_string()]);
//! provider.destroy_cache("users");
//! assert!(provider.cache_names().is_empty());
//! ```

use std::hash::Hash;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde_json::json;
use tracing::debug;

use crate::cache::{Cache, ManagedCache};
use crate::config::CacheConfiguration;
use crate::error::{CacheError, Result};

// ---------------------------------------------------------------------------
// CacheFamily
// ---------------------------------------------------------------------------

/// Known cache implementation families.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheFamily {
    /// Reference implementation: one lock per cache.
    Standard,
    /// Sharded implementation: one lock per shard.
    #[cfg(feature = "highperf")]
    HighPerf,
}

impl CacheFamily {
    /// Human-readable provider name.
    pub fn provider_name(&self) -> &'static str {
        match self {
            CacheFamily::Standard => "Standard",
            #[cfg(feature = "highperf")]
            CacheFamily::HighPerf => "HighPerf",
        }
    }
}

// ---------------------------------------------------------------------------
// CacheProvider
// ---------------------------------------------------------------------------

/// Factory and registry for caches of a single implementation family.
pub struct CacheProvider {
    family: CacheFamily,
    caches: Mutex<FxHashMap<String, Arc<dyn ManagedCache>>>,
    closed: AtomicBool,
}

impl CacheProvider {
    pub fn new(family: CacheFamily) -> Arc<Self> {
        Arc::new(CacheProvider {
            family,
            caches: Mutex::new(FxHashMap::default()),
            closed: AtomicBool::new(false),
        })
    }

    /// The reference implementation family.
    pub fn standard() -> Arc<Self> {
        Self::new(CacheFamily::Standard)
    }

    /// The sharded high-performance family.
    #[cfg(feature = "highperf")]
    pub fn high_perf() -> Arc<Self> {
        Self::new(CacheFamily::HighPerf)
    }

    pub fn family(&self) -> CacheFamily {
        self.family
    }

    pub fn provider_name(&self) -> &'static str {
        self.family.provider_name()
    }

    /// Creates a cache from the configuration and registers it under its
    /// configured name, replacing any previous cache registered there.
    pub fn create_cache<K, V>(&self, config: CacheConfiguration) -> Result<Cache<K, V>>
    where
        K: Clone + Eq + Hash + Send + Sync + 'static,
        V: Clone + Send + Sync + 'static,
    {
        if self.closed.load(Ordering::SeqCst) {
            return Err(CacheError::ProviderClosed(
                self.provider_name().to_string(),
            ));
        }
        config.validate()?;
        let name = config.name.clone();
        let cache = match self.family {
            CacheFamily::Standard => Cache::standard(name.clone(), config),
            #[cfg(feature = "highperf")]
            CacheFamily::HighPerf => Cache::sharded(name.clone(), config),
        };
        let replaced = self
            .caches
            .lock()
            .insert(name.clone(), Arc::new(cache.clone()) as Arc<dyn ManagedCache>);
        if let Some(previous) = replaced {
            previous.close();
        }
        debug!(provider = self.provider_name(), cache = %name, "cache created");
        Ok(cache)
    }

    /// Fetches a registered cache by name, `None` when absent or when the
    /// key/value types do not match the registration.
    pub fn cache<K, V>(&self, name: &str) -> Option<Cache<K, V>>
    where
        K: Clone + Eq + Hash + Send + Sync + 'static,
        V: Clone + Send + Sync + 'static,
    {
        let erased = self.caches.lock().get(name).cloned()?;
        erased
            .as_any()
            .downcast::<Cache<K, V>>()
            .ok()
            .map(|arc| (*arc).clone())
    }

    pub fn cache_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.caches.lock().keys().cloned().collect();
        names.sort();
        names
    }

    /// Closes and deregisters a cache. Unknown names are ignored.
    pub fn destroy_cache(&self, name: &str) {
        if let Some(cache) = self.caches.lock().remove(name) {
            cache.close();
        }
    }

    /// Closes every owned cache and refuses further creation. Idempotent.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        let caches: Vec<_> = {
            let mut map = self.caches.lock();
            map.drain().map(|(_, cache)| cache).collect()
        };
        for cache in caches {
            cache.close();
        }
        debug!(provider = self.provider_name(), "provider closed");
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Provider-level statistics snapshot.
    pub fn provider_stats(&self) -> serde_json::Value {
        json!({
            "provider": self.provider_name(),
            "cache_count": self.caches.lock().len(),
            "closed": self.is_closed(),
            "caches": self.cache_names(),
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn config(name: &str) -> CacheConfiguration {
        CacheConfiguration::builder().name(name).max_size(10).build()
    }

    #[test]
    fn create_registers_under_configured_name() {
        let provider = CacheProvider::standard();
        provider.create_cache::<u64, u64>(config("a")).unwrap();
        provider.create_cache::<u64, u64>(config("b")).unwrap();

        assert_eq!(provider.cache_names(), vec!["a", "b"]);
        assert!(provider.cache::<u64, u64>("a").is_some());
        assert!(provider.cache::<u64, u64>("missing").is_none());
    }

    #[test]
    fn lookup_with_wrong_types_is_none() {
        let provider = CacheProvider::standard();
        provider.create_cache::<u64, u64>(config("typed")).unwrap();
        assert!(provider.cache::<String, String>("typed").is_none());
    }

    #[test]
    fn invalid_config_is_rejected() {
        let provider = CacheProvider::standard();
        let bad = CacheConfiguration::builder().name("bad").max_size(0).build();
        assert!(matches!(
            provider.create_cache::<u64, u64>(bad),
            Err(CacheError::InvalidConfig(_))
        ));
        assert!(provider.cache_names().is_empty());
    }

    #[test]
    fn destroy_closes_the_cache() {
        let provider = CacheProvider::standard();
        let cache = provider.create_cache::<u64, u64>(config("gone")).unwrap();
        provider.destroy_cache("gone");

        assert!(cache.is_closed());
        assert!(provider.cache_names().is_empty());
    }

    #[test]
    fn close_refuses_further_creation() {
        let provider = CacheProvider::standard();
        let cache = provider.create_cache::<u64, u64>(config("c")).unwrap();
        provider.close();
        provider.close();

        assert!(cache.is_closed());
        assert!(matches!(
            provider.create_cache::<u64, u64>(config("later")),
            Err(CacheError::ProviderClosed(_))
        ));
    }

    #[test]
    fn provider_stats_snapshot() {
        let provider = CacheProvider::standard();
        provider.create_cache::<u64, u64>(config("s")).unwrap();

        let stats = provider.provider_stats();
        assert_eq!(stats["provider"], "Standard");
        assert_eq!(stats["cache_count"], 1);
        assert_eq!(stats["closed"], false);
    }

    #[cfg(feature = "highperf")]
    #[test]
    fn high_perf_family_creates_sharded_caches() {
        let provider = CacheProvider::high_perf();
        let cache = provider.create_cache::<u64, u64>(config("fast")).unwrap();
        assert_eq!(cache.implementation(), "Sharded");
        cache.put(1, 2).unwrap();
        assert_eq!(cache.get(&1).unwrap(), Some(2));
    }
}
