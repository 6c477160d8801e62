//! Error types for the loadkit library.
//!
//! ## Key Components
//!
//! - [`CacheError`]: Returned by every fallible cache, manager, and loader
//!   operation. Validation failures are raised before any state is touched.
//! - [`Result`]: Crate-wide alias over [`CacheError`].
//!
//! ## Example Usage
//!
//! ```
//! use loadkit::config::CacheConfiguration;
//! use loadkit::error::CacheError;
//!
//! // Invalid configuration is caught without panicking
//! let bad = CacheConfiguration::builder().max_size(0).build().validate();
//! assert!(matches!(bad, Err(CacheError::InvalidConfig(_))));
//! ```

use std::time::Duration;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, CacheError>;

/// Boxed error type carried by [`CacheError::Loader`].
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

// ---------------------------------------------------------------------------
// CacheError
// ---------------------------------------------------------------------------

/// Error returned by cache, provider, manager, and loader operations.
///
/// Listener failures are deliberately absent: they are contained and logged,
/// never surfaced to the operation that triggered the notification.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// Operation attempted on a closed cache.
    #[error("cache `{cache}` is closed")]
    Closed { cache: String },

    /// Operation attempted on a closed cache manager.
    #[error("cache manager is closed")]
    ManagerClosed,

    /// Cache creation attempted on a closed provider.
    #[error("provider `{0}` is closed")]
    ProviderClosed(String),

    /// Null-entry insertion while `allow_null_values` is disabled.
    #[error("invalid value: {0}")]
    InvalidValue(String),

    /// Rejected configuration (zero capacity, zero concurrency level).
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The manager was asked for a provider that is not registered.
    #[error("provider not found: {0}")]
    UnknownProvider(String),

    /// A named cache already exists with different key/value types.
    #[error("cache `{cache}` is registered with a different entry type")]
    TypeMismatch { cache: String },

    /// A read-through loader or delegate loader failed.
    #[error("loader failure: {0}")]
    Loader(#[source] BoxError),

    /// The stream collector exceeded its deadline in fail-fast mode.
    #[error("collection timed out after {elapsed:?}")]
    Timeout { elapsed: Duration },

    /// An asynchronous handle was cancelled before completion.
    #[error("operation cancelled")]
    Cancelled,
}

impl CacheError {
    /// Wraps an arbitrary error as a loader failure.
    #[inline]
    pub fn loader(err: impl Into<BoxError>) -> Self {
        CacheError::Loader(err.into())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
