// ==============================================
// CACHE OPERATION TESTS (integration)
// ==============================================
//
// Round-trip laws, expiration, null handling, listener notification, and
// statistics behavior of the reference cache family, exercised through the
// public provider surface.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use loadkit::config::{CacheConfiguration, EvictionPolicy};
use loadkit::error::CacheError;
use loadkit::events::{CacheEventListener, RemovalCause};
use loadkit::provider::CacheProvider;

fn standard_cache(config: CacheConfiguration) -> loadkit::cache::Cache<String, i32> {
    CacheProvider::standard().create_cache(config).unwrap()
}

fn no_expiry(name: &str, max_size: u64) -> CacheConfiguration {
    CacheConfiguration::builder()
        .name(name)
        .max_size(max_size)
        .no_default_ttl()
        .no_max_idle()
        .build()
}

// ==============================================
// Round-trip and idempotence laws
// ==============================================

#[test]
fn put_get_round_trip_without_expiry() {
    let cache = standard_cache(no_expiry("roundtrip", 10));
    cache.put("k".into(), 7).unwrap();
    assert_eq!(cache.get(&"k".into()).unwrap(), Some(7));
}

#[test]
fn second_remove_returns_empty() {
    let cache = standard_cache(no_expiry("remove-twice", 10));
    cache.put("k".into(), 7).unwrap();
    assert_eq!(cache.remove(&"k".into()).unwrap(), Some(7));
    assert_eq!(cache.remove(&"k".into()).unwrap(), None);
}

#[test]
fn second_close_is_a_noop() {
    let cache = standard_cache(no_expiry("close-twice", 10));
    cache.close();
    cache.close();
    assert!(cache.is_closed());
}

#[test]
fn closed_cache_rejects_operations() {
    let cache = standard_cache(no_expiry("closed", 10));
    cache.close();

    assert!(matches!(cache.get(&"k".into()), Err(CacheError::Closed { .. })));
    assert!(matches!(cache.put("k".into(), 1), Err(CacheError::Closed { .. })));
    assert!(matches!(cache.remove(&"k".into()), Err(CacheError::Closed { .. })));
    assert!(matches!(cache.clear(), Err(CacheError::Closed { .. })));
    assert!(matches!(cache.as_map(), Err(CacheError::Closed { .. })));
    assert_eq!(cache.size(), 0);
}

// ==============================================
// Expiration
// ==============================================

#[test]
fn ttl_zero_expires_on_first_lookup() {
    let cache = standard_cache(no_expiry("ttl-zero", 10));
    cache.put_with_ttl("k".into(), 1, Duration::ZERO).unwrap();
    std::thread::sleep(Duration::from_millis(5));

    assert_eq!(cache.get(&"k".into()).unwrap(), None);
    assert_eq!(cache.stats().miss_count, 1);
}

#[test]
fn contains_key_never_reports_expired_entries() {
    let cache = standard_cache(no_expiry("contains-expired", 10));
    cache
        .put_with_ttl("k".into(), 1, Duration::from_millis(50))
        .unwrap();
    assert!(cache.contains_key(&"k".into()).unwrap());

    std::thread::sleep(Duration::from_millis(120));
    assert!(!cache.contains_key(&"k".into()).unwrap());
}

#[test]
fn default_ttl_applies_when_no_explicit_ttl() {
    let config = CacheConfiguration::builder()
        .name("default-ttl")
        .max_size(10)
        .default_ttl(Duration::from_millis(20))
        .no_max_idle()
        .build();
    let cache = standard_cache(config);
    cache.put("k".into(), 1).unwrap();
    std::thread::sleep(Duration::from_millis(60));
    assert_eq!(cache.get(&"k".into()).unwrap(), None);
}

// ==============================================
// Null values
// ==============================================

#[test]
fn null_put_fails_without_state_change() {
    let cache = standard_cache(no_expiry("null-reject", 10));
    cache.put("other".into(), 1).unwrap();

    let err = cache.put_none("k".into()).unwrap_err();
    assert!(matches!(err, CacheError::InvalidValue(_)));
    assert_eq!(cache.size(), 1);
    assert!(!cache.contains_key(&"k".into()).unwrap());
}

#[test]
fn null_entries_hit_when_allowed() {
    let config = CacheConfiguration::builder()
        .name("null-allow")
        .max_size(10)
        .no_default_ttl()
        .no_max_idle()
        .allow_null_values(true)
        .build();
    let cache = standard_cache(config);
    cache.put_none("k".into()).unwrap();

    assert!(cache.contains_key(&"k".into()).unwrap());
    assert_eq!(cache.get(&"k".into()).unwrap(), None);
    assert_eq!(cache.stats().hit_count, 1);
    assert_eq!(cache.stats().miss_count, 0);
}

// ==============================================
// Listener notification
// ==============================================

#[derive(Default)]
struct EventLog {
    puts: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
    removals: Mutex<Vec<(String, RemovalCause)>>,
    evictions: Mutex<Vec<(String, RemovalCause)>>,
    clears: AtomicU64,
}

impl CacheEventListener<String, i32> for EventLog {
    fn on_put(&self, _key: &String, _value: Option<&i32>) {
        self.puts.fetch_add(1, Ordering::SeqCst);
    }
    fn on_get(&self, _key: &String, _value: Option<&i32>, hit: bool) {
        if hit {
            self.hits.fetch_add(1, Ordering::SeqCst);
        } else {
            self.misses.fetch_add(1, Ordering::SeqCst);
        }
    }
    fn on_remove(&self, key: &String, _value: Option<&i32>, cause: RemovalCause) {
        self.removals.lock().push((key.clone(), cause));
    }
    fn on_evict(&self, key: &String, _value: Option<&i32>, cause: RemovalCause) {
        self.evictions.lock().push((key.clone(), cause));
    }
    fn on_clear(&self) {
        self.clears.fetch_add(1, Ordering::SeqCst);
    }
}

#[test]
fn listeners_observe_the_entry_lifecycle() {
    let cache = standard_cache(no_expiry("lifecycle", 10));
    let log = Arc::new(EventLog::default());
    cache.add_listener(log.clone());

    cache.put("k".into(), 1).unwrap();
    cache.get(&"k".into()).unwrap();
    cache.get(&"missing".into()).unwrap();
    cache.remove(&"k".into()).unwrap();
    cache.clear().unwrap();

    assert_eq!(log.puts.load(Ordering::SeqCst), 1);
    assert_eq!(log.hits.load(Ordering::SeqCst), 1);
    assert_eq!(log.misses.load(Ordering::SeqCst), 1);
    assert_eq!(
        log.removals.lock().as_slice(),
        &[("k".to_string(), RemovalCause::Explicit)]
    );
    assert_eq!(log.clears.load(Ordering::SeqCst), 1);
}

#[test]
fn replacement_fires_replaced_cause() {
    let cache = standard_cache(no_expiry("replace", 10));
    let log = Arc::new(EventLog::default());
    cache.add_listener(log.clone());

    cache.put("k".into(), 1).unwrap();
    cache.put("k".into(), 2).unwrap();

    assert_eq!(log.puts.load(Ordering::SeqCst), 2);
    assert_eq!(
        log.removals.lock().as_slice(),
        &[("k".to_string(), RemovalCause::Replaced)]
    );
}

#[test]
fn expiry_fires_expired_cause() {
    let cache = standard_cache(no_expiry("expired-cause", 10));
    let log = Arc::new(EventLog::default());
    cache.add_listener(log.clone());

    cache
        .put_with_ttl("k".into(), 1, Duration::from_millis(10))
        .unwrap();
    std::thread::sleep(Duration::from_millis(40));
    assert_eq!(cache.get(&"k".into()).unwrap(), None);

    assert_eq!(
        log.removals.lock().as_slice(),
        &[("k".to_string(), RemovalCause::Expired)]
    );
}

#[test]
fn removed_listener_stops_observing() {
    let cache = standard_cache(no_expiry("unsubscribe", 10));
    let log = Arc::new(EventLog::default());
    let handle: Arc<dyn CacheEventListener<String, i32>> = log.clone();
    cache.add_listener(handle.clone());

    cache.put("a".into(), 1).unwrap();
    cache.remove_listener(&handle);
    cache.put("b".into(), 2).unwrap();

    assert_eq!(log.puts.load(Ordering::SeqCst), 1);
}

// ==============================================
// Statistics
// ==============================================

#[test]
fn counters_are_monotone_between_resets() {
    let cache = standard_cache(no_expiry("monotone", 10));
    let mut last_total = 0;
    for round in 0..5 {
        cache.put(format!("k{round}"), round).unwrap();
        cache.get(&format!("k{round}")).unwrap();
        cache.get(&"missing".into()).unwrap();

        let stats = cache.stats();
        assert!(stats.total_count() > last_total);
        assert_eq!(stats.hit_count + stats.miss_count, stats.total_count());
        last_total = stats.total_count();
    }

    cache.reset_stats();
    let stats = cache.stats();
    assert_eq!(stats.total_count(), 0);
    // Size is unaffected by a stats reset.
    assert_eq!(stats.size, 5);
}

#[test]
fn record_stats_off_keeps_counters_at_zero() {
    let config = CacheConfiguration::builder()
        .name("no-stats")
        .max_size(10)
        .no_default_ttl()
        .no_max_idle()
        .record_stats(false)
        .build();
    let cache = standard_cache(config);
    cache.put("k".into(), 1).unwrap();
    cache.get(&"k".into()).unwrap();
    cache.get(&"missing".into()).unwrap();

    let stats = cache.stats();
    assert_eq!(stats.total_count(), 0);
    assert_eq!(stats.size, 1);
}

// ==============================================
// Bulk operations and eviction helpers
// ==============================================

#[test]
fn get_all_returns_present_unexpired_subset() {
    let cache = standard_cache(no_expiry("bulk", 10));
    cache.put("a".into(), 1).unwrap();
    cache
        .put_with_ttl("b".into(), 2, Duration::ZERO)
        .unwrap();
    std::thread::sleep(Duration::from_millis(5));

    let found = cache
        .get_all(&["a".to_string(), "b".to_string(), "c".to_string()])
        .unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found.get("a"), Some(&1));
}

#[test]
fn evict_all_fires_listeners_per_key() {
    let cache = standard_cache(no_expiry("evict-all", 10));
    let log = Arc::new(EventLog::default());
    cache.add_listener(log.clone());

    for i in 0..4 {
        cache.put(format!("k{i}"), i).unwrap();
    }
    cache.evict_all(|key| key != "k0").unwrap();

    assert_eq!(cache.size(), 1);
    assert_eq!(log.removals.lock().len(), 3);
    assert!(log
        .removals
        .lock()
        .iter()
        .all(|(_, cause)| *cause == RemovalCause::Explicit));
}

#[test]
fn put_if_absent_keeps_first_value() {
    let cache = standard_cache(no_expiry("pia", 10));
    assert_eq!(cache.put_if_absent("k".into(), 1).unwrap(), None);
    assert_eq!(cache.put_if_absent("k".into(), 2).unwrap(), Some(1));
    assert_eq!(cache.get(&"k".into()).unwrap(), Some(1));
}

// ==============================================
// Background cleanup
// ==============================================

#[tokio::test(start_paused = true)]
async fn periodic_sweep_removes_expired_entries_without_lookups() {
    // Created inside a runtime, so the cache owns a periodic sweep task.
    let cache = standard_cache(no_expiry("background", 10));
    cache.put_with_ttl("dead".into(), 1, Duration::ZERO).unwrap();
    cache.put("live".into(), 2).unwrap();
    assert_eq!(cache.estimated_size(), 2);

    // Jump past the 30 second sweep interval; no lazy lookup happens.
    tokio::time::sleep(Duration::from_secs(35)).await;

    assert_eq!(cache.estimated_size(), 1);
    assert!(cache.contains_key(&"live".into()).unwrap());
}

// ==============================================
// Concurrency smoke
// ==============================================

#[test]
fn concurrent_writers_stay_within_capacity() {
    let cache = Arc::new(standard_cache(
        CacheConfiguration::builder()
            .name("hammer")
            .max_size(64)
            .no_default_ttl()
            .no_max_idle()
            .eviction_policy(EvictionPolicy::Lru)
            .build(),
    ));

    let handles: Vec<_> = (0..8)
        .map(|worker| {
            let cache = cache.clone();
            std::thread::spawn(move || {
                for i in 0..500 {
                    let key = format!("w{worker}-k{i}");
                    cache.put(key.clone(), i).unwrap();
                    cache.get(&key).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert!(cache.size() <= 64);
    let stats = cache.stats();
    assert_eq!(stats.hit_count + stats.miss_count, stats.total_count());
}
