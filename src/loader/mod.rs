//! The loader contract and its result types.
//!
//! [`Loader`] is the async abstraction over a persistence backend: save,
//! batch save (plain and stream-fed), lookup by id, storage initialization,
//! and the observability surface (health, debug, configuration). Concrete
//! relational or document backends implement it; the
//! [`CachedLoader`](crate::loader::wrapper::CachedLoader) wrapper interposes
//! a transparent cache over any implementation.

pub mod wrapper;

use std::collections::BTreeMap;

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use serde::Serialize;
use serde_json::{json, Map, Value};

use crate::error::Result;
use crate::util::collect::{collect_stream, CollectorConfig};

/// Operation parameters: an ordered string map, so parameter hashes used in
/// cache keys are deterministic.
pub type Params = BTreeMap<String, String>;

// ---------------------------------------------------------------------------
// Result types
// ---------------------------------------------------------------------------

/// Outcome of a batch save: what succeeded, how much was processed, and the
/// errors tolerated along the way.
#[derive(Debug, Clone, Default)]
pub struct BatchOutcome<T> {
    pub items: Vec<T>,
    pub total_processed: usize,
    pub errors: Vec<String>,
}

impl<T> BatchOutcome<T> {
    pub fn is_fully_successful(&self) -> bool {
        self.errors.is_empty()
    }

    /// Fraction of processed items that succeeded.
    pub fn success_rate(&self) -> f64 {
        if self.total_processed > 0 {
            self.items.len() as f64 / self.total_processed as f64
        } else {
            0.0
        }
    }
}

/// Health report with free-form metrics.
#[derive(Debug, Clone, Serialize)]
pub struct HealthStatus {
    pub healthy: bool,
    pub message: String,
    pub metrics: Map<String, Value>,
}

impl HealthStatus {
    pub fn healthy(message: impl Into<String>, metrics: Map<String, Value>) -> Self {
        HealthStatus {
            healthy: true,
            message: message.into(),
            metrics,
        }
    }

    pub fn unhealthy(reason: impl Into<String>, metrics: Map<String, Value>) -> Self {
        HealthStatus {
            healthy: false,
            message: reason.into(),
            metrics,
        }
    }
}

/// Debug information: loader type plus performance, connection, and
/// additional detail maps.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DebugReport {
    pub loader_type: String,
    pub performance: Map<String, Value>,
    pub connection: Map<String, Value>,
    pub additional: Map<String, Value>,
}

impl std::fmt::Display for DebugReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== {} Debug Info ===", self.loader_type)?;
        for (title, map) in [
            ("Performance", &self.performance),
            ("Connection", &self.connection),
            ("Additional", &self.additional),
        ] {
            writeln!(f, "{title}:")?;
            for (key, value) in map {
                writeln!(f, "  {key}: {value}")?;
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Loader
// ---------------------------------------------------------------------------

/// Async data-loading contract over items of type `T` identified by `Id`.
///
/// Implementations must be thread-safe; every method may be called
/// concurrently. Failures surface as
/// [`CacheError::Loader`](crate::error::CacheError::Loader).
#[async_trait]
pub trait Loader<T, Id>: Send + Sync
where
    T: Send + 'static,
    Id: Send + Sync,
{
    /// Persists one item and returns it as saved (ids and timestamps filled
    /// in by the backend).
    async fn save(&self, item: T, params: &Params) -> Result<T>;

    /// Persists a batch, returning the saved items in input order.
    async fn save_batch(&self, items: Vec<T>, params: &Params) -> Result<Vec<T>>;

    /// Persists items arriving on a stream. The default implementation
    /// collects the stream under the bounds read from `params`
    /// (`stream_timeout_ms`, `stream_max_items`, `stream_collect_errors`)
    /// and forwards to [`save_batch`](Self::save_batch).
    async fn save_batch_stream(
        &self,
        items: BoxStream<'static, T>,
        params: &Params,
    ) -> Result<BatchOutcome<T>> {
        let config = CollectorConfig::from_params(params);
        let collected = collect_stream(items.map(Ok), &config).await?;
        let total_processed = collected.items.len() + collected.errors.len();
        let saved = self.save_batch(collected.items, params).await?;
        Ok(BatchOutcome {
            items: saved,
            total_processed,
            errors: collected.errors,
        })
    }

    /// Looks one item up by identifier.
    async fn find_by_id(&self, id: &Id) -> Result<Option<T>>;

    /// Creates backing structures (tables, collections, indexes). Safe to
    /// call repeatedly.
    async fn initialize_storage(&self, _params: &Params) -> Result<()> {
        Ok(())
    }

    /// Connectivity and responsiveness probe.
    async fn health_check(&self) -> HealthStatus;

    /// Performance and state insight for troubleshooting.
    fn debug_info(&self) -> DebugReport;

    /// Current configuration for inspection.
    fn configuration(&self) -> Value {
        json!({})
    }

    /// Releases resources; the loader is unusable afterwards.
    async fn shutdown(&self) {}
}
