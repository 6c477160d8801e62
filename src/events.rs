//! Cache event notification.
//!
//! Listeners are held in a copy-on-write list and fired strictly outside the
//! cache's critical section, so user code can re-enter the cache without
//! deadlocking. A panicking listener is contained and reported through
//! `tracing`; it never fails the cache operation that produced the event.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;
use tracing::warn;

// ---------------------------------------------------------------------------
// RemovalCause
// ---------------------------------------------------------------------------

/// Why an entry left the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum RemovalCause {
    /// Manually removed.
    Explicit,
    /// Value was replaced by a newer put.
    Replaced,
    /// Reclaimed by the runtime (reserved; weak/soft hints are no-ops).
    Collected,
    /// TTL or idle deadline passed.
    Expired,
    /// Evicted under capacity pressure.
    Size,
    /// Cause unknown.
    Unknown,
}

// ---------------------------------------------------------------------------
// CacheEventListener
// ---------------------------------------------------------------------------

/// Observer for cache mutations. Every hook has a no-op default, so
/// implementors override only what they care about.
///
/// Hooks receive `Option<&V>` because null entries carry no value.
pub trait CacheEventListener<K, V>: Send + Sync {
    /// An entry was added or replaced.
    fn on_put(&self, _key: &K, _value: Option<&V>) {}

    /// A lookup completed; `hit` distinguishes hits from misses.
    fn on_get(&self, _key: &K, _value: Option<&V>, _hit: bool) {}

    /// An entry was removed (explicitly, by replacement, or by expiry).
    fn on_remove(&self, _key: &K, _value: Option<&V>, _cause: RemovalCause) {}

    /// An entry was evicted under capacity pressure.
    fn on_evict(&self, _key: &K, _value: Option<&V>, _cause: RemovalCause) {}

    /// The cache was cleared.
    fn on_clear(&self) {}
}

// ---------------------------------------------------------------------------
// Event plumbing
// ---------------------------------------------------------------------------

/// A recorded mutation, buffered inside the critical section and dispatched
/// after the lock is released.
#[derive(Debug)]
pub(crate) enum CacheEvent<K, V> {
    Put {
        key: K,
        value: Option<V>,
    },
    Get {
        key: K,
        value: Option<V>,
        hit: bool,
    },
    Remove {
        key: K,
        value: Option<V>,
        cause: RemovalCause,
    },
    Evict {
        key: K,
        value: Option<V>,
        cause: RemovalCause,
    },
    Clear,
}

/// Copy-on-write listener registry shared by every core of a cache.
pub(crate) struct Listeners<K, V> {
    list: RwLock<Vec<Arc<dyn CacheEventListener<K, V>>>>,
}

impl<K, V> Default for Listeners<K, V> {
    fn default() -> Self {
        Listeners {
            list: RwLock::new(Vec::new()),
        }
    }
}

impl<K, V> Listeners<K, V> {
    pub fn add(&self, listener: Arc<dyn CacheEventListener<K, V>>) {
        self.list.write().push(listener);
    }

    /// Removes a listener by identity.
    pub fn remove(&self, listener: &Arc<dyn CacheEventListener<K, V>>) {
        self.list
            .write()
            .retain(|existing| !Arc::ptr_eq(existing, listener));
    }

    pub fn clear(&self) {
        self.list.write().clear();
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.list.read().len()
    }

    /// Dispatches buffered events to a snapshot of the listener list.
    ///
    /// Must be called with no cache lock held. Listener panics are caught and
    /// logged, never propagated.
    pub fn notify(&self, events: &[CacheEvent<K, V>]) {
        if events.is_empty() {
            return;
        }
        let snapshot: Vec<_> = self.list.read().clone();
        if snapshot.is_empty() {
            return;
        }
        for event in events {
            for listener in &snapshot {
                let outcome = catch_unwind(AssertUnwindSafe(|| match event {
                    CacheEvent::Put { key, value } => listener.on_put(key, value.as_ref()),
                    CacheEvent::Get { key, value, hit } => {
                        listener.on_get(key, value.as_ref(), *hit)
                    }
                    CacheEvent::Remove { key, value, cause } => {
                        listener.on_remove(key, value.as_ref(), *cause)
                    }
                    CacheEvent::Evict { key, value, cause } => {
                        listener.on_evict(key, value.as_ref(), *cause)
                    }
                    CacheEvent::Clear => listener.on_clear(),
                }));
                if let Err(payload) = outcome {
                    let detail = payload
                        .downcast_ref::<&str>()
                        .map(|s| s.to_string())
                        .or_else(|| payload.downcast_ref::<String>().cloned())
                        .unwrap_or_else(|| "non-string panic payload".to_string());
                    warn!(target: "loadkit::events", %detail, "cache listener panicked");
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    #[derive(Default)]
    struct Recorder {
        puts: AtomicU64,
        removes: AtomicU64,
        clears: AtomicU64,
    }

    impl CacheEventListener<String, i32> for Recorder {
        fn on_put(&self, _key: &String, _value: Option<&i32>) {
            self.puts.fetch_add(1, Ordering::SeqCst);
        }
        fn on_remove(&self, _key: &String, _value: Option<&i32>, _cause: RemovalCause) {
            self.removes.fetch_add(1, Ordering::SeqCst);
        }
        fn on_clear(&self) {
            self.clears.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct Panicker;

    impl CacheEventListener<String, i32> for Panicker {
        fn on_put(&self, _key: &String, _value: Option<&i32>) {
            panic!("listener bug");
        }
    }

    #[test]
    fn events_reach_every_listener() {
        let listeners: Listeners<String, i32> = Listeners::default();
        let recorder = Arc::new(Recorder::default());
        listeners.add(recorder.clone());

        listeners.notify(&[
            CacheEvent::Put {
                key: "a".into(),
                value: Some(1),
            },
            CacheEvent::Remove {
                key: "a".into(),
                value: Some(1),
                cause: RemovalCause::Explicit,
            },
            CacheEvent::Clear,
        ]);

        assert_eq!(recorder.puts.load(Ordering::SeqCst), 1);
        assert_eq!(recorder.removes.load(Ordering::SeqCst), 1);
        assert_eq!(recorder.clears.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn panicking_listener_does_not_stop_dispatch() {
        let listeners: Listeners<String, i32> = Listeners::default();
        let recorder = Arc::new(Recorder::default());
        listeners.add(Arc::new(Panicker));
        listeners.add(recorder.clone());

        listeners.notify(&[CacheEvent::Put {
            key: "k".into(),
            value: Some(9),
        }]);

        // The panic was contained and the second listener still ran.
        assert_eq!(recorder.puts.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn remove_is_by_identity() {
        let listeners: Listeners<String, i32> = Listeners::default();
        let a: Arc<dyn CacheEventListener<String, i32>> = Arc::new(Recorder::default());
        let b: Arc<dyn CacheEventListener<String, i32>> = Arc::new(Recorder::default());
        listeners.add(a.clone());
        listeners.add(b.clone());
        assert_eq!(listeners.len(), 2);

        listeners.remove(&a);
        assert_eq!(listeners.len(), 1);
    }
}
