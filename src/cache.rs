//! Bounded TTL result cache.
//!
//! Resolution runs are expensive (a Chrome launch each), so successful
//! results are kept behind a deterministic fingerprint for their assumed
//! validity window. Capacity eviction is least-recently-used; expiry is
//! checked lazily on read, and an expired entry is treated exactly like a
//! miss. The cache is an optimization, never a source of truth — no
//! in-flight coalescing is attempted.

use std::num::NonZeroUsize;
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};
use lru::LruCache;

/// A cached value with its bookkeeping timestamps.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    pub value: V,
    pub cached_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl<V> CacheEntry<V> {
    fn is_fresh_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

/// Thread-safe bounded LRU cache with per-entry TTL.
#[derive(Debug)]
pub struct TtlCache<V> {
    inner: Mutex<LruCache<String, CacheEntry<V>>>,
}

impl<V: Clone> TtlCache<V> {
    /// Create a cache holding at most `capacity` entries.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).expect("non-zero capacity");
        TtlCache {
            inner: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Fetch a fresh entry; expired entries are evicted and reported absent.
    pub fn get(&self, fingerprint: &str) -> Option<CacheEntry<V>> {
        self.get_at(fingerprint, Utc::now())
    }

    fn get_at(&self, fingerprint: &str, now: DateTime<Utc>) -> Option<CacheEntry<V>> {
        let mut cache = self.inner.lock().expect("cache lock");
        match cache.get(fingerprint) {
            Some(entry) if entry.is_fresh_at(now) => Some(entry.clone()),
            Some(_) => {
                cache.pop(fingerprint);
                None
            }
            None => None,
        }
    }

    /// Store a value valid for `ttl` from now.
    pub fn put(&self, fingerprint: &str, value: V, ttl: Duration) {
        self.put_at(fingerprint, value, ttl, Utc::now());
    }

    fn put_at(&self, fingerprint: &str, value: V, ttl: Duration, now: DateTime<Utc>) {
        let ttl = chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::zero());
        let entry = CacheEntry {
            value,
            cached_at: now,
            expires_at: now + ttl,
        };
        self.inner
            .lock()
            .expect("cache lock")
            .put(fingerprint.to_string(), entry);
    }

    /// Number of live entries, counting not-yet-evicted stale ones.
    pub fn len(&self) -> usize {
        self.inner.lock().expect("cache lock").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hit_within_ttl() {
        let cache: TtlCache<String> = TtlCache::new(10);
        cache.put("k", "v".to_string(), Duration::from_secs(60));
        let entry = cache.get("k").unwrap();
        assert_eq!(entry.value, "v");
        assert!(entry.expires_at > entry.cached_at);
    }

    #[test]
    fn expired_entry_is_treated_as_absent() {
        let cache: TtlCache<String> = TtlCache::new(10);
        let past = Utc::now() - chrono::Duration::minutes(10);
        cache.put_at("k", "v".to_string(), Duration::from_secs(60), past);
        assert!(cache.get("k").is_none());
        // And it was evicted, not just hidden.
        assert!(cache.is_empty());
    }

    #[test]
    fn capacity_evicts_least_recently_used() {
        let cache: TtlCache<u32> = TtlCache::new(2);
        cache.put("a", 1, Duration::from_secs(60));
        cache.put("b", 2, Duration::from_secs(60));
        // Touch "a" so "b" is the LRU victim.
        cache.get("a");
        cache.put("c", 3, Duration::from_secs(60));
        assert!(cache.get("a").is_some());
        assert!(cache.get("b").is_none());
        assert!(cache.get("c").is_some());
    }

    #[test]
    fn overwrite_refreshes_expiry() {
        let cache: TtlCache<u32> = TtlCache::new(4);
        let past = Utc::now() - chrono::Duration::minutes(10);
        cache.put_at("k", 1, Duration::from_secs(60), past);
        cache.put("k", 2, Duration::from_secs(60));
        assert_eq!(cache.get("k").unwrap().value, 2);
    }
}
