//! Per-session TTL cache for reference data.
//!
//! A read is served from the stored value only while its age is strictly
//! below the TTL. Expired or missing entries are refetched and overwritten.
//! A failed fetch propagates to the caller and leaves the cache untouched,
//! so a stale entry is never served as a fallback.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tracing::debug;

/// One cached value and the time it was fetched.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    pub value: V,
    pub fetched_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct SessionCache<V> {
    entries: HashMap<String, CacheEntry<V>>,
}

impl<V> Default for SessionCache<V> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }
}

impl<V: Clone> SessionCache<V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached value for `key` if younger than `ttl_secs`,
    /// otherwise call `fetch` and store its result.
    pub fn get_or_fetch<F, E>(&mut self, key: &str, ttl_secs: u64, fetch: F) -> Result<V, E>
    where
        F: FnOnce() -> Result<V, E>,
    {
        self.get_or_fetch_at(key, ttl_secs, Utc::now(), fetch)
    }

    /// As [`get_or_fetch`](Self::get_or_fetch) with an explicit clock.
    pub fn get_or_fetch_at<F, E>(
        &mut self,
        key: &str,
        ttl_secs: u64,
        now: DateTime<Utc>,
        fetch: F,
    ) -> Result<V, E>
    where
        F: FnOnce() -> Result<V, E>,
    {
        if let Some(entry) = self.entries.get(key) {
            if is_fresh(entry.fetched_at, now, ttl_secs) {
                debug!(key, "Cache hit");
                return Ok(entry.value.clone());
            }
        }

        debug!(key, "Cache miss");
        let value = fetch()?;
        self.entries.insert(
            key.to_string(),
            CacheEntry {
                value: value.clone(),
                fetched_at: now,
            },
        );
        Ok(value)
    }

    pub fn entry(&self, key: &str) -> Option<&CacheEntry<V>> {
        self.entries.get(key)
    }

    pub fn invalidate(&mut self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn is_fresh(fetched_at: DateTime<Utc>, now: DateTime<Utc>, ttl_secs: u64) -> bool {
    let ttl_ms = i64::try_from(ttl_secs.saturating_mul(1000)).unwrap_or(i64::MAX);
    (now - fetched_at).num_milliseconds() < ttl_ms
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use std::cell::Cell;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_within_ttl_fetches_once() {
        let mut cache: SessionCache<Vec<u32>> = SessionCache::new();
        let calls = Cell::new(0);
        let fetch = || {
            calls.set(calls.get() + 1);
            Ok::<_, String>(vec![1, 2, 3])
        };

        let first = cache.get_or_fetch_at("stores", 3600, t0(), fetch).unwrap();
        let second = cache
            .get_or_fetch_at("stores", 3600, t0() + Duration::seconds(3599), fetch)
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_after_ttl_refetches() {
        let mut cache: SessionCache<u32> = SessionCache::new();
        let calls = Cell::new(0);
        let fetch = || {
            calls.set(calls.get() + 1);
            Ok::<_, String>(calls.get())
        };

        assert_eq!(cache.get_or_fetch_at("k", 60, t0(), fetch).unwrap(), 1);
        let later = t0() + Duration::seconds(60);
        assert_eq!(cache.get_or_fetch_at("k", 60, later, fetch).unwrap(), 2);
        assert_eq!(calls.get(), 2);
        assert_eq!(cache.entry("k").unwrap().fetched_at, later);
    }

    #[test]
    fn test_fetch_error_propagates_and_keeps_stale_entry_unserved() {
        let mut cache: SessionCache<u32> = SessionCache::new();
        cache
            .get_or_fetch_at("k", 10, t0(), || Ok::<_, String>(7))
            .unwrap();

        let later = t0() + Duration::seconds(30);
        let err = cache
            .get_or_fetch_at("k", 10, later, || Err::<u32, _>("warehouse down".to_string()))
            .unwrap_err();
        assert_eq!(err, "warehouse down");

        // The stale entry is untouched; the next read refetches.
        assert_eq!(cache.entry("k").unwrap().fetched_at, t0());
        let calls = Cell::new(0);
        let v = cache
            .get_or_fetch_at("k", 10, later, || {
                calls.set(calls.get() + 1);
                Ok::<_, String>(8)
            })
            .unwrap();
        assert_eq!(v, 8);
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_error_on_first_fetch_stores_nothing() {
        let mut cache: SessionCache<u32> = SessionCache::new();
        let result = cache.get_or_fetch("k", 10, || Err::<u32, _>("boom"));
        assert!(result.is_err());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_keys_are_independent() {
        let mut cache: SessionCache<&str> = SessionCache::new();
        cache
            .get_or_fetch_at("stores", 60, t0(), || Ok::<_, ()>("s"))
            .unwrap();
        cache
            .get_or_fetch_at("departments", 60, t0(), || Ok::<_, ()>("d"))
            .unwrap();
        assert_eq!(cache.len(), 2);
        assert!(cache.invalidate("stores"));
        assert!(!cache.invalidate("stores"));
        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_zero_ttl_always_refetches() {
        let mut cache: SessionCache<u32> = SessionCache::new();
        let calls = Cell::new(0);
        let fetch = || {
            calls.set(calls.get() + 1);
            Ok::<_, ()>(1)
        };
        cache.get_or_fetch_at("k", 0, t0(), fetch).unwrap();
        cache.get_or_fetch_at("k", 0, t0(), fetch).unwrap();
        assert_eq!(calls.get(), 2);
    }
}
