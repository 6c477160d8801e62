//! Cache entry: a value plus the metadata every eviction policy and both
//! expiration mechanisms rely on.
//!
//! The entry itself carries no lock; all synchronization happens at the cache
//! level. Invariants: `created_at <= last_access_at`, and when a deadline is
//! present, `expires_at >= created_at`.

use std::time::{Duration, Instant};

/// A cached value with creation/access metadata and an optional absolute
/// expiry deadline.
///
/// `value` is `None` only for null entries, which are insertable solely when
/// the owning cache allows null values.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    pub(crate) value: Option<V>,
    pub(crate) created_at: Instant,
    pub(crate) last_access_at: Instant,
    pub(crate) access_count: u64,
    pub(crate) expires_at: Option<Instant>,
}

impl<V> CacheEntry<V> {
    /// Creates an entry stamped `now`, computing the expiry deadline from the
    /// TTL when one is present. A zero TTL produces an entry that is already
    /// at its deadline and expires on the first later lookup.
    pub fn new(value: Option<V>, ttl: Option<Duration>) -> Self {
        let now = Instant::now();
        CacheEntry {
            value,
            created_at: now,
            last_access_at: now,
            access_count: 0,
            expires_at: ttl.map(|ttl| now + ttl),
        }
    }

    /// Absolute-deadline expiry check: `true` iff a deadline exists and `now`
    /// is strictly past it.
    #[inline]
    pub fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.map(|deadline| now > deadline).unwrap_or(false)
    }

    /// How long the entry has gone unread.
    #[inline]
    pub fn idle_for(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_access_at)
    }

    /// Records a successful lookup: refreshes the access time and bumps the
    /// access count.
    #[inline]
    pub fn touch(&mut self, now: Instant) {
        self.last_access_at = now;
        self.access_count += 1;
    }

    /// The stored value, if this is not a null entry.
    #[inline]
    pub fn value(&self) -> Option<&V> {
        self.value.as_ref()
    }

    #[inline]
    pub fn access_count(&self) -> u64 {
        self.access_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    #[test]
    fn construction_stamps_times() {
        let entry = CacheEntry::new(Some(7), Some(Duration::from_secs(60)));
        assert_eq!(entry.created_at, entry.last_access_at);
        assert_eq!(entry.access_count, 0);
        assert!(entry.expires_at.unwrap() >= entry.created_at);
        assert!(!entry.is_expired(Instant::now()));
    }

    #[test]
    fn no_ttl_never_expires() {
        let entry: CacheEntry<i32> = CacheEntry::new(Some(1), None);
        assert!(!entry.is_expired(Instant::now() + Duration::from_secs(86_400)));
    }

    #[test]
    fn zero_ttl_expires_on_first_later_lookup() {
        let entry = CacheEntry::new(Some(1), Some(Duration::ZERO));
        sleep(Duration::from_millis(2));
        assert!(entry.is_expired(Instant::now()));
    }

    #[test]
    fn touch_updates_access_metadata() {
        let mut entry = CacheEntry::new(Some(1), None);
        let created = entry.created_at;
        sleep(Duration::from_millis(2));
        entry.touch(Instant::now());
        assert_eq!(entry.access_count, 1);
        assert!(entry.last_access_at > created);
        assert!(entry.created_at <= entry.last_access_at);
    }

    #[test]
    fn idle_time_grows_without_access() {
        let entry: CacheEntry<i32> = CacheEntry::new(Some(1), None);
        sleep(Duration::from_millis(5));
        assert!(entry.idle_for(Instant::now()) >= Duration::from_millis(5));
    }

    #[test]
    fn null_entry_has_no_value() {
        let entry: CacheEntry<i32> = CacheEntry::new(None, None);
        assert!(entry.value().is_none());
    }
}
