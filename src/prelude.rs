//! Convenient re-exports of the types most callers need.

pub use crate::cache::Cache;
pub use crate::config::{CacheConfiguration, CacheConfigurationBuilder, EvictionPolicy};
pub use crate::error::{BoxError, CacheError, Result};
pub use crate::events::{CacheEventListener, RemovalCause};
pub use crate::keygen::{DefaultKeyGenerator, KeyGenerator};
pub use crate::loader::wrapper::{CachedLoader, LoaderCacheStats};
pub use crate::loader::{BatchOutcome, DebugReport, HealthStatus, Loader, Params};
pub use crate::manager::{
    default_manager, set_default_manager, shutdown_default_manager, CacheManager,
    CacheManagerStats,
};
pub use crate::provider::{CacheFamily, CacheProvider};
pub use crate::stats::CacheStats;
pub use crate::util::collect::{collect_stream, CollectOutcome, CollectorConfig};
