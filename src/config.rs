//! Cache configuration: recognized options, builder, validation, and the
//! defaults-merging rule used by the manager.
//!
//! ## Key Components
//!
//! - [`CacheConfiguration`]: the full option record. Unrecognized options do
//!   not exist at this layer; callers can only set what the cache honors.
//! - [`CacheConfigurationBuilder`]: fluent construction with library defaults.
//! - [`EvictionPolicy`]: the five supported eviction families.
//!
//! ## Defaults Merging
//!
//! [`CacheConfiguration::merge_with`] implements configuration inheritance as
//! a plain merge over the record: a scalar field is inherited from the global
//! configuration iff it equals the type default, boolean flags are OR-merged,
//! and the eviction policy counts as "set" unless it equals
//! [`EvictionPolicy::Lru`]. Inheritance applies only to configurations still
//! carrying the placeholder name `"default"`; an explicitly named
//! configuration is honored verbatim.

use std::time::Duration;

use serde::Serialize;

use crate::error::{CacheError, Result};

/// Name given to configurations whose caller did not pick one explicitly.
/// Only such configurations participate in defaults merging.
pub const DEFAULT_CONFIG_NAME: &str = "default";

// ---------------------------------------------------------------------------
// EvictionPolicy
// ---------------------------------------------------------------------------

/// Available eviction policies.
///
/// | Policy   | Eviction basis     | Notes                                  |
/// |----------|--------------------|----------------------------------------|
/// | `Lru`    | Last access time   | Default; good temporal locality        |
/// | `Lfu`    | Access frequency   | Ties broken by older last access       |
/// | `Fifo`   | Insertion order    | Access has no effect                   |
/// | `Random` | Uniform random     | Minimal bookkeeping                    |
/// | `None`   | Never evicts       | New writes are rejected once full      |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub enum EvictionPolicy {
    /// Least Recently Used.
    #[default]
    Lru,
    /// Least Frequently Used.
    Lfu,
    /// First In First Out.
    Fifo,
    /// Uniformly random victim.
    Random,
    /// No automatic eviction; the cache refuses to exceed capacity.
    None,
}

// ---------------------------------------------------------------------------
// CacheConfiguration
// ---------------------------------------------------------------------------

/// Cache configuration record.
///
/// Build one with [`CacheConfiguration::builder`]; every field has a library
/// default. `weak_keys`, `weak_values`, and `soft_values` are accepted as
/// hints for parity with reference-counted runtimes and are documented
/// no-ops here: entries are owned by the cache until removed.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use loadkit::config::{CacheConfiguration, EvictionPolicy};
///
/// let config = CacheConfiguration::builder()
///     .name("sessions")
///     .max_size(50_000)
///     .default_ttl(Duration::from_secs(600))
///     .eviction_policy(EvictionPolicy::Lfu)
///     .build();
///
/// assert_eq!(config.name, "sessions");
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheConfiguration {
    /// Cache name; `"default"` marks a configuration eligible for merging.
    pub name: String,
    /// Maximum number of live entries. Must be positive.
    pub max_size: u64,
    /// Default time-to-live applied when a put carries no explicit TTL.
    pub default_ttl: Option<Duration>,
    /// Maximum idle time; entries unread for longer are expired.
    pub max_idle: Option<Duration>,
    /// Expire entries this long after creation (fallback for `default_ttl`).
    pub expire_after_write: Option<Duration>,
    /// Expire entries this long after last access (fallback for `max_idle`).
    pub expire_after_access: Option<Duration>,
    /// Refresh-on-read hint for providers that support it; ignored here.
    pub refresh_after_write: Option<Duration>,
    /// Record hit/miss/load/eviction statistics.
    pub record_stats: bool,
    /// Permit null entries (`put_none`).
    pub allow_null_values: bool,
    /// Eviction policy for capacity pressure.
    pub eviction_policy: EvictionPolicy,
    /// Shard count hint for the high-performance family. Must be positive.
    pub concurrency_level: u16,
    /// Weak-key hint; documented no-op.
    pub weak_keys: bool,
    /// Weak-value hint; documented no-op.
    pub weak_values: bool,
    /// Soft-value hint; documented no-op.
    pub soft_values: bool,
}

impl Default for CacheConfiguration {
    fn default() -> Self {
        CacheConfiguration::builder().build()
    }
}

impl CacheConfiguration {
    /// Starts a builder seeded with the library defaults.
    #[inline]
    pub fn builder() -> CacheConfigurationBuilder {
        CacheConfigurationBuilder::new()
    }

    /// Validates the record, returning [`CacheError::InvalidConfig`] on the
    /// first rejected field. Nothing is mutated on failure.
    pub fn validate(&self) -> Result<()> {
        if self.max_size == 0 {
            return Err(CacheError::InvalidConfig(format!(
                "cache `{}`: max_size must be positive",
                self.name
            )));
        }
        if self.concurrency_level == 0 {
            return Err(CacheError::InvalidConfig(format!(
                "cache `{}`: concurrency_level must be positive",
                self.name
            )));
        }
        Ok(())
    }

    /// Effective write-expiry default: `default_ttl`, falling back to
    /// `expire_after_write`.
    #[inline]
    pub(crate) fn write_ttl(&self) -> Option<Duration> {
        self.default_ttl.or(self.expire_after_write)
    }

    /// Effective idle-expiry bound: `max_idle`, falling back to
    /// `expire_after_access`.
    #[inline]
    pub(crate) fn idle_limit(&self) -> Option<Duration> {
        self.max_idle.or(self.expire_after_access)
    }

    /// Merges this configuration with global defaults.
    ///
    /// Returns `self` untouched unless the name is `"default"`. Fields set on
    /// the specific configuration win; a field counts as unset iff it equals
    /// the type default. Boolean flags are OR-merged.
    pub fn merge_with(&self, global: &CacheConfiguration) -> CacheConfiguration {
        if self.name != DEFAULT_CONFIG_NAME {
            return self.clone();
        }
        let default = CacheConfigurationBuilder::new().build();
        let pick_u64 = |specific, fallback| if specific == default.max_size { fallback } else { specific };
        let pick_dur = |specific: Option<Duration>, base: Option<Duration>, fallback: Option<Duration>| {
            if specific == base {
                fallback
            } else {
                specific
            }
        };
        CacheConfiguration {
            name: self.name.clone(),
            max_size: pick_u64(self.max_size, global.max_size),
            default_ttl: pick_dur(self.default_ttl, default.default_ttl, global.default_ttl),
            max_idle: pick_dur(self.max_idle, default.max_idle, global.max_idle),
            expire_after_write: pick_dur(
                self.expire_after_write,
                default.expire_after_write,
                global.expire_after_write,
            ),
            expire_after_access: pick_dur(
                self.expire_after_access,
                default.expire_after_access,
                global.expire_after_access,
            ),
            refresh_after_write: pick_dur(
                self.refresh_after_write,
                default.refresh_after_write,
                global.refresh_after_write,
            ),
            record_stats: self.record_stats || global.record_stats,
            allow_null_values: self.allow_null_values || global.allow_null_values,
            eviction_policy: if self.eviction_policy != EvictionPolicy::Lru {
                self.eviction_policy
            } else {
                global.eviction_policy
            },
            concurrency_level: if self.concurrency_level == default.concurrency_level {
                global.concurrency_level
            } else {
                self.concurrency_level
            },
            weak_keys: self.weak_keys || global.weak_keys,
            weak_values: self.weak_values || global.weak_values,
            soft_values: self.soft_values || global.soft_values,
        }
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Fluent builder for [`CacheConfiguration`].
#[derive(Debug, Clone)]
pub struct CacheConfigurationBuilder {
    config: CacheConfiguration,
}

impl Default for CacheConfigurationBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl CacheConfigurationBuilder {
    /// Library defaults: 1000 entries, 1 hour TTL, 30 minutes idle, LRU,
    /// stats on, nulls off, 16-way concurrency hint.
    pub fn new() -> Self {
        CacheConfigurationBuilder {
            config: CacheConfiguration {
                name: DEFAULT_CONFIG_NAME.to_string(),
                max_size: 1000,
                default_ttl: Some(Duration::from_secs(3600)),
                max_idle: Some(Duration::from_secs(1800)),
                expire_after_write: None,
                expire_after_access: None,
                refresh_after_write: None,
                record_stats: true,
                allow_null_values: false,
                eviction_policy: EvictionPolicy::Lru,
                concurrency_level: 16,
                weak_keys: false,
                weak_values: false,
                soft_values: false,
            },
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.config.name = name.into();
        self
    }

    pub fn max_size(mut self, max_size: u64) -> Self {
        self.config.max_size = max_size;
        self
    }

    pub fn default_ttl(mut self, ttl: Duration) -> Self {
        self.config.default_ttl = Some(ttl);
        self
    }

    /// Disables the default TTL entirely; entries live until evicted.
    pub fn no_default_ttl(mut self) -> Self {
        self.config.default_ttl = None;
        self
    }

    pub fn max_idle(mut self, max_idle: Duration) -> Self {
        self.config.max_idle = Some(max_idle);
        self
    }

    /// Disables idle expiration.
    pub fn no_max_idle(mut self) -> Self {
        self.config.max_idle = None;
        self
    }

    pub fn expire_after_write(mut self, d: Duration) -> Self {
        self.config.expire_after_write = Some(d);
        self
    }

    pub fn expire_after_access(mut self, d: Duration) -> Self {
        self.config.expire_after_access = Some(d);
        self
    }

    pub fn refresh_after_write(mut self, d: Duration) -> Self {
        self.config.refresh_after_write = Some(d);
        self
    }

    pub fn record_stats(mut self, record: bool) -> Self {
        self.config.record_stats = record;
        self
    }

    pub fn allow_null_values(mut self, allow: bool) -> Self {
        self.config.allow_null_values = allow;
        self
    }

    pub fn eviction_policy(mut self, policy: EvictionPolicy) -> Self {
        self.config.eviction_policy = policy;
        self
    }

    pub fn concurrency_level(mut self, level: u16) -> Self {
        self.config.concurrency_level = level;
        self
    }

    pub fn weak_keys(mut self, on: bool) -> Self {
        self.config.weak_keys = on;
        self
    }

    pub fn weak_values(mut self, on: bool) -> Self {
        self.config.weak_values = on;
        self
    }

    pub fn soft_values(mut self, on: bool) -> Self {
        self.config.soft_values = on;
        self
    }

    /// Finishes the builder. Validation happens at cache creation, not here.
    pub fn build(self) -> CacheConfiguration {
        self.config
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_defaults() {
        let config = CacheConfiguration::builder().build();
        assert_eq!(config.name, DEFAULT_CONFIG_NAME);
        assert_eq!(config.max_size, 1000);
        assert_eq!(config.default_ttl, Some(Duration::from_secs(3600)));
        assert_eq!(config.eviction_policy, EvictionPolicy::Lru);
        assert!(config.record_stats);
        assert!(!config.allow_null_values);
        assert_eq!(config.concurrency_level, 16);
    }

    #[test]
    fn zero_max_size_is_rejected() {
        let config = CacheConfiguration::builder().max_size(0).build();
        assert!(matches!(
            config.validate(),
            Err(CacheError::InvalidConfig(_))
        ));
    }

    #[test]
    fn zero_concurrency_is_rejected() {
        let config = CacheConfiguration::builder().concurrency_level(0).build();
        assert!(config.validate().is_err());
    }

    #[test]
    fn merge_inherits_unset_fields_for_default_name() {
        let global = CacheConfiguration::builder()
            .name("global")
            .max_size(9999)
            .default_ttl(Duration::from_secs(120))
            .eviction_policy(EvictionPolicy::Fifo)
            .build();

        let specific = CacheConfiguration::builder().build();
        let merged = specific.merge_with(&global);

        assert_eq!(merged.max_size, 9999);
        assert_eq!(merged.default_ttl, Some(Duration::from_secs(120)));
        assert_eq!(merged.eviction_policy, EvictionPolicy::Fifo);
    }

    #[test]
    fn merge_keeps_explicitly_set_fields() {
        let global = CacheConfiguration::builder()
            .max_size(9999)
            .eviction_policy(EvictionPolicy::Fifo)
            .build();

        let specific = CacheConfiguration::builder()
            .max_size(5)
            .eviction_policy(EvictionPolicy::Random)
            .build();
        let merged = specific.merge_with(&global);

        assert_eq!(merged.max_size, 5);
        assert_eq!(merged.eviction_policy, EvictionPolicy::Random);
    }

    #[test]
    fn merge_skips_named_configurations() {
        let global = CacheConfiguration::builder().max_size(9999).build();
        let specific = CacheConfiguration::builder().name("users").build();
        let merged = specific.merge_with(&global);

        // Named configuration is honored verbatim.
        assert_eq!(merged.max_size, 1000);
    }

    #[test]
    fn merge_ors_boolean_flags() {
        let global = CacheConfiguration::builder()
            .allow_null_values(true)
            .record_stats(false)
            .build();
        let specific = CacheConfiguration::builder().record_stats(true).build();
        let merged = specific.merge_with(&global);

        assert!(merged.allow_null_values);
        assert!(merged.record_stats);
    }

    #[test]
    fn write_ttl_falls_back_to_expire_after_write() {
        let config = CacheConfiguration::builder()
            .no_default_ttl()
            .expire_after_write(Duration::from_secs(42))
            .build();
        assert_eq!(config.write_ttl(), Some(Duration::from_secs(42)));
    }
}
