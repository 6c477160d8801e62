//! Bounded stream collection for reactive batch operations.
//!
//! [`collect_stream`] drains a fallible stream under three bounds: a
//! deadline, an item limit, and an error-handling mode. Dropping the stream
//! on exit cancels the upstream producer. In error-collecting mode a missed
//! deadline returns the items gathered so far with `timed_out` set; in
//! fail-fast mode it surfaces [`CacheError::Timeout`].

use std::time::Duration;

use futures::{Stream, StreamExt};
use tokio::time::Instant;

use crate::error::{CacheError, Result};
use crate::loader::Params;

/// Collection bounds. Defaults: 30 second deadline, unlimited items,
/// collect errors rather than failing fast.
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    pub timeout: Duration,
    pub max_items: usize,
    pub collect_errors: bool,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        CollectorConfig {
            timeout: Duration::from_secs(30),
            max_items: usize::MAX,
            collect_errors: true,
        }
    }
}

impl CollectorConfig {
    pub fn with_timeout(timeout: Duration) -> Self {
        CollectorConfig {
            timeout,
            ..Default::default()
        }
    }

    pub fn with_limit(max_items: usize) -> Self {
        CollectorConfig {
            max_items,
            ..Default::default()
        }
    }

    /// Fail on the first error instead of collecting it.
    pub fn fail_fast() -> Self {
        CollectorConfig {
            collect_errors: false,
            ..Default::default()
        }
    }

    /// Reads collector bounds from operation parameters:
    /// `stream_timeout_ms`, `stream_max_items`, `stream_collect_errors`.
    /// Unparseable or absent values keep the defaults.
    pub fn from_params(params: &Params) -> Self {
        let mut config = CollectorConfig::default();
        if let Some(timeout_ms) = params
            .get("stream_timeout_ms")
            .and_then(|raw| raw.parse::<u64>().ok())
        {
            config.timeout = Duration::from_millis(timeout_ms);
        }
        if let Some(max_items) = params
            .get("stream_max_items")
            .and_then(|raw| raw.parse::<usize>().ok())
        {
            config.max_items = max_items;
        }
        if let Some(collect) = params
            .get("stream_collect_errors")
            .and_then(|raw| raw.parse::<bool>().ok())
        {
            config.collect_errors = collect;
        }
        config
    }
}

/// What a bounded collection produced.
#[derive(Debug, Clone, Default)]
pub struct CollectOutcome<T> {
    pub items: Vec<T>,
    pub errors: Vec<String>,
    /// The deadline passed before the stream completed.
    pub timed_out: bool,
    /// The item limit stopped collection early.
    pub truncated: bool,
}

/// Drains `stream` under the configured bounds.
pub async fn collect_stream<T, S>(mut stream: S, config: &CollectorConfig) -> Result<CollectOutcome<T>>
where
    S: Stream<Item = std::result::Result<T, CacheError>> + Unpin + Send,
{
    let deadline = Instant::now() + config.timeout;
    let mut outcome = CollectOutcome {
        items: Vec::new(),
        errors: Vec::new(),
        timed_out: false,
        truncated: false,
    };
    loop {
        if outcome.items.len() >= config.max_items {
            outcome.truncated = true;
            break;
        }
        match tokio::time::timeout_at(deadline, stream.next()).await {
            Err(_) => {
                if !config.collect_errors {
                    return Err(CacheError::Timeout {
                        elapsed: config.timeout,
                    });
                }
                outcome.timed_out = true;
                break;
            }
            Ok(None) => break,
            Ok(Some(Ok(item))) => outcome.items.push(item),
            Ok(Some(Err(err))) => {
                if !config.collect_errors {
                    return Err(err);
                }
                outcome.errors.push(err.to_string());
            }
        }
    }
    Ok(outcome)
}
