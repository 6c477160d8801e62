//! Transparent caching wrapper over an arbitrary [`Loader`].
//!
//! [`CachedLoader`] composes two tiers: a positive cache (`key → item`) and
//! a negative cache (`key → ()`) recording recent known-absent lookups,
//! sized at roughly a tenth of the positive tier with a shorter TTL.
//!
//! ## Control flow
//!
//! - **Reads** consult the positive cache, then the negative cache, then the
//!   delegate; the result lands in exactly one tier.
//! - **Writes** delegate first, then refresh the positive tier and drop any
//!   stale negative entry.
//! - A cache failure never masks a delegate success: cache mutations on the
//!   result path are logged and swallowed.
//!
//! After any single wrapper operation completes, at most one tier holds a
//! live entry for a key.

use std::fmt;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::warn;

use crate::cache::Cache;
use crate::config::CacheConfiguration;
use crate::error::Result;
use crate::keygen::{DefaultKeyGenerator, KeyGenerator};
use crate::manager::{default_manager, CacheManager};

use super::{BatchOutcome, DebugReport, HealthStatus, Loader, Params};

/// Default TTL for positive entries.
pub const POSITIVE_TTL: Duration = Duration::from_secs(30 * 60);
/// Default TTL for negative (known-absent) entries.
pub const NEGATIVE_TTL: Duration = Duration::from_secs(5 * 60);

const NEGATIVE_SUFFIX: &str = "_negative";
const HEALTH_PROBE_KEY: &str = "health:probe";

// ---------------------------------------------------------------------------
// CachedLoader
// ---------------------------------------------------------------------------

/// A [`Loader`] that interposes read-through, write-through, and
/// negative-result caching over a delegate.
pub struct CachedLoader<T, Id> {
    delegate: Arc<dyn Loader<T, Id>>,
    cache: Cache<String, T>,
    negative: Cache<String, ()>,
    key_gen: Arc<dyn KeyGenerator<T, Id>>,
    negative_caching: bool,
    negative_ttl: Duration,
}

impl<T, Id> CachedLoader<T, Id>
where
    T: Clone + Send + Sync + 'static,
    Id: Send + Sync + 'static,
{
    /// Wraps a delegate with the default cache profile (10k entries, 30
    /// minute TTL, stats on) on the process-wide manager.
    pub fn wrap(delegate: Arc<dyn Loader<T, Id>>, cache_name: &str) -> Result<Self>
    where
        T: Hash,
        Id: fmt::Display,
    {
        Self::wrap_in(&default_manager(), delegate, cache_name)
    }

    /// Like [`wrap`](Self::wrap), on an explicit manager.
    pub fn wrap_in(
        manager: &CacheManager,
        delegate: Arc<dyn Loader<T, Id>>,
        cache_name: &str,
    ) -> Result<Self>
    where
        T: Hash,
        Id: fmt::Display,
    {
        let config = CacheConfiguration::builder()
            .name(cache_name)
            .max_size(10_000)
            .default_ttl(POSITIVE_TTL)
            .record_stats(true)
            .build();
        Self::wrap_with_in(manager, delegate, cache_name, config)
    }

    /// Wraps with a custom positive-cache configuration on the process-wide
    /// manager.
    pub fn wrap_with(
        delegate: Arc<dyn Loader<T, Id>>,
        cache_name: &str,
        config: CacheConfiguration,
    ) -> Result<Self>
    where
        T: Hash,
        Id: fmt::Display,
    {
        Self::wrap_with_in(&default_manager(), delegate, cache_name, config)
    }

    /// Wraps with a custom positive-cache configuration on an explicit
    /// manager. The negative tier is derived from it: a tenth of the size
    /// (at least one entry) and a five minute TTL.
    pub fn wrap_with_in(
        manager: &CacheManager,
        delegate: Arc<dyn Loader<T, Id>>,
        cache_name: &str,
        config: CacheConfiguration,
    ) -> Result<Self>
    where
        T: Hash,
        Id: fmt::Display,
    {
        let negative_name = format!("{cache_name}{NEGATIVE_SUFFIX}");
        let negative_config = CacheConfiguration::builder()
            .name(negative_name.clone())
            .max_size((config.max_size / 10).max(1))
            .default_ttl(NEGATIVE_TTL)
            .record_stats(true)
            .build();

        let cache = manager.cache::<String, T>(cache_name, config)?;
        let negative = manager.cache::<String, ()>(&negative_name, negative_config)?;

        Ok(CachedLoader {
            delegate,
            cache,
            negative,
            key_gen: Arc::new(DefaultKeyGenerator),
            negative_caching: true,
            negative_ttl: NEGATIVE_TTL,
        })
    }

    /// Read-heavy profile: 50k entries, 1 hour TTL, 30 minute idle bound.
    pub fn for_reads(
        manager: &CacheManager,
        delegate: Arc<dyn Loader<T, Id>>,
        cache_name: &str,
    ) -> Result<Self>
    where
        T: Hash,
        Id: fmt::Display,
    {
        let config = CacheConfiguration::builder()
            .name(cache_name)
            .max_size(50_000)
            .default_ttl(Duration::from_secs(3600))
            .expire_after_access(Duration::from_secs(1800))
            .record_stats(true)
            .build();
        Self::wrap_with_in(manager, delegate, cache_name, config)
    }

    /// Write-heavy profile: 10k entries, 15 minute TTL, 30 minute write
    /// bound.
    pub fn for_writes(
        manager: &CacheManager,
        delegate: Arc<dyn Loader<T, Id>>,
        cache_name: &str,
    ) -> Result<Self>
    where
        T: Hash,
        Id: fmt::Display,
    {
        let config = CacheConfiguration::builder()
            .name(cache_name)
            .max_size(10_000)
            .default_ttl(Duration::from_secs(15 * 60))
            .expire_after_write(Duration::from_secs(30 * 60))
            .record_stats(true)
            .build();
        Self::wrap_with_in(manager, delegate, cache_name, config)
    }

    /// Substitutes a custom key generator.
    pub fn with_key_generator(mut self, key_gen: Arc<dyn KeyGenerator<T, Id>>) -> Self {
        self.key_gen = key_gen;
        self
    }

    /// Turns negative-result caching on or off.
    pub fn negative_caching(mut self, enabled: bool) -> Self {
        self.negative_caching = enabled;
        self
    }

    // -- cache-side helpers (never fail the data path) ---------------------

    fn cache_get(&self, key: &String) -> Option<T> {
        match self.cache.get(key) {
            Ok(value) => value,
            Err(err) => {
                warn!(key = %key, %err, "positive cache lookup failed");
                None
            }
        }
    }

    fn negative_contains(&self, key: &String) -> bool {
        match self.negative.contains_key(key) {
            Ok(present) => present,
            Err(err) => {
                warn!(key = %key, %err, "negative cache lookup failed");
                false
            }
        }
    }

    /// Publishes a present result: positive tier gains the entry, negative
    /// tier drops any stale record of absence.
    fn publish_positive(&self, key: &str, value: T) {
        if let Err(err) = self.cache.put(key.to_string(), value) {
            warn!(key, %err, "positive cache update failed");
        }
        if let Err(err) = self.negative.remove(&key.to_string()) {
            warn!(key, %err, "negative cache invalidation failed");
        }
    }

    /// Publishes an absent result: negative tier gains the record, positive
    /// tier drops any stale entry.
    fn publish_negative(&self, key: &str) {
        if let Err(err) =
            self.negative
                .put_with_ttl(key.to_string(), (), self.negative_ttl)
        {
            warn!(key, %err, "negative cache update failed");
        }
        if let Err(err) = self.cache.remove(&key.to_string()) {
            warn!(key, %err, "positive cache invalidation failed");
        }
    }

    // -- cache-scoped operations -------------------------------------------

    /// Drops both tiers' entries for an id.
    pub fn evict_from_cache(&self, id: &Id) {
        let key = self.key_gen.by_id(id);
        if let Err(err) = self.cache.remove(&key) {
            warn!(key = %key, %err, "positive cache eviction failed");
        }
        if let Err(err) = self.negative.remove(&key) {
            warn!(key = %key, %err, "negative cache eviction failed");
        }
    }

    /// Clears both tiers.
    pub fn evict_all_from_cache(&self) {
        if let Err(err) = self.cache.clear() {
            warn!(%err, "positive cache clear failed");
        }
        if let Err(err) = self.negative.clear() {
            warn!(%err, "negative cache clear failed");
        }
    }

    /// Seeds the positive tier with an item ahead of its first lookup.
    pub fn preload_into_cache(&self, item: &T, params: &Params) {
        let key = self.key_gen.for_item(item, params);
        self.publish_positive(&key, item.clone());
    }

    /// Aggregate statistics over both tiers.
    pub fn cache_statistics(&self) -> LoaderCacheStats {
        let main = self.cache.stats();
        let negative = self.negative.stats();
        LoaderCacheStats {
            total_hits: main.hit_count + negative.hit_count,
            total_misses: main.miss_count + negative.miss_count,
            main_cache_size: main.size,
            negative_cache_size: negative.size,
            hit_rate: main.hit_rate,
            total_evictions: main.eviction_count + negative.eviction_count,
        }
    }

    /// The positive tier.
    pub fn cache(&self) -> &Cache<String, T> {
        &self.cache
    }

    /// The negative tier.
    pub fn negative_cache(&self) -> &Cache<String, ()> {
        &self.negative
    }

    /// The wrapped delegate.
    pub fn delegate(&self) -> &Arc<dyn Loader<T, Id>> {
        &self.delegate
    }

    /// Probe put + remove against the negative tier (its value type is
    /// unit, so no item needs fabricating).
    fn cache_healthy(&self) -> bool {
        let key = HEALTH_PROBE_KEY.to_string();
        self.negative
            .put_with_ttl(key.clone(), (), Duration::from_secs(1))
            .and_then(|_| self.negative.remove(&key))
            .is_ok()
    }
}

// ---------------------------------------------------------------------------
// Loader implementation
// ---------------------------------------------------------------------------

#[async_trait]
impl<T, Id> Loader<T, Id> for CachedLoader<T, Id>
where
    T: Clone + Send + Sync + 'static,
    Id: Send + Sync + 'static,
{
    async fn save(&self, item: T, params: &Params) -> Result<T> {
        let saved = self.delegate.save(item, params).await?;
        let key = self.key_gen.for_item(&saved, params);
        self.publish_positive(&key, saved.clone());
        Ok(saved)
    }

    async fn save_batch(&self, items: Vec<T>, params: &Params) -> Result<Vec<T>> {
        let saved = self.delegate.save_batch(items, params).await?;
        let mut updates = Vec::with_capacity(saved.len());
        let mut stale_keys = Vec::with_capacity(saved.len());
        for item in &saved {
            let key = self.key_gen.for_item(item, params);
            stale_keys.push(key.clone());
            updates.push((key, item.clone()));
        }
        if let Err(err) = self.cache.put_all(updates) {
            warn!(%err, "positive cache bulk update failed");
        }
        if let Err(err) = self.negative.remove_all(&stale_keys) {
            warn!(%err, "negative cache bulk invalidation failed");
        }
        Ok(saved)
    }

    async fn save_batch_stream(
        &self,
        items: BoxStream<'static, T>,
        params: &Params,
    ) -> Result<BatchOutcome<T>> {
        let outcome = self.delegate.save_batch_stream(items, params).await?;
        for item in &outcome.items {
            let key = self.key_gen.for_item(item, params);
            self.publish_positive(&key, item.clone());
        }
        Ok(outcome)
    }

    async fn find_by_id(&self, id: &Id) -> Result<Option<T>> {
        let key = self.key_gen.by_id(id);
        if let Some(hit) = self.cache_get(&key) {
            return Ok(Some(hit));
        }
        if self.negative_caching && self.negative_contains(&key) {
            return Ok(None);
        }
        let result = self.delegate.find_by_id(id).await?;
        match &result {
            Some(value) => self.publish_positive(&key, value.clone()),
            None => {
                if self.negative_caching {
                    self.publish_negative(&key);
                }
            }
        }
        Ok(result)
    }

    async fn initialize_storage(&self, params: &Params) -> Result<()> {
        self.delegate.initialize_storage(params).await
    }

    async fn health_check(&self) -> HealthStatus {
        let mut status = self.delegate.health_check().await;
        let cache_ok = self.cache_healthy();
        status
            .metrics
            .insert("cache_healthy".to_string(), json!(cache_ok));
        status.metrics.insert(
            "cache_stats".to_string(),
            serde_json::to_value(self.cache.stats()).unwrap_or_default(),
        );
        status.metrics.insert(
            "negative_cache_stats".to_string(),
            serde_json::to_value(self.negative.stats()).unwrap_or_default(),
        );
        status.healthy = status.healthy && cache_ok;
        status.message = format!(
            "{} [cache: {}]",
            status.message,
            if cache_ok { "ok" } else { "error" }
        );
        status
    }

    fn debug_info(&self) -> DebugReport {
        let mut report = self.delegate.debug_info();
        report.loader_type = format!("Cached{}", report.loader_type);
        report.additional.insert(
            "cache".to_string(),
            json!({
                "name": self.cache.name(),
                "size": self.cache.size(),
                "stats": self.cache.stats(),
                "negative_stats": self.negative.stats(),
                "configuration": self.cache.configuration(),
            }),
        );
        report
    }

    fn configuration(&self) -> Value {
        let delegate_config = self.delegate.configuration();
        let mut merged = match delegate_config {
            Value::Object(map) => map,
            other => {
                let mut map = serde_json::Map::new();
                map.insert("delegate".to_string(), other);
                map
            }
        };
        merged.insert("cache_enabled".to_string(), json!(true));
        merged.insert(
            "cache_configuration".to_string(),
            serde_json::to_value(self.cache.configuration()).unwrap_or_default(),
        );
        merged.insert(
            "negative_result_caching".to_string(),
            json!(self.negative_caching),
        );
        Value::Object(merged)
    }

    async fn shutdown(&self) {
        self.delegate.shutdown().await;
        self.cache.close();
        self.negative.close();
    }
}

// ---------------------------------------------------------------------------
// LoaderCacheStats
// ---------------------------------------------------------------------------

/// Aggregate cache statistics over the positive and negative tiers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LoaderCacheStats {
    pub total_hits: u64,
    pub total_misses: u64,
    pub main_cache_size: u64,
    pub negative_cache_size: u64,
    pub hit_rate: f64,
    pub total_evictions: u64,
}

impl LoaderCacheStats {
    pub fn miss_rate(&self) -> f64 {
        1.0 - self.hit_rate
    }

    pub fn total_requests(&self) -> u64 {
        self.total_hits + self.total_misses
    }
}
