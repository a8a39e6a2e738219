//! Bounded, time-aware lookup cache.
//!
//! Backs both the metadata cache and the watch-link cache. Every entry carries
//! an absolute expiry; stale entries are purged lazily on read and eagerly on
//! every write, after which the soonest-to-expire entries are evicted until
//! the map fits its capacity.
//!
//! Negative results are stored as ordinary values (`V = Option<T>`), so
//! `get` returning `Some(None)` means "looked up, found nothing" while `None`
//! means "never looked up" or "expired".

use dashmap::DashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

use crate::error::{CinelinkError, Result};
use crate::metrics;

/// A cached value with its absolute expiry time.
#[derive(Clone, Debug)]
struct CacheEntry<V> {
    value: V,
    expires_at: Instant,
}

/// Thread-safe TTL cache with capacity-bounded eviction.
///
/// Cloning is cheap and yields a handle to the same underlying map.
#[derive(Clone, Debug)]
pub struct TtlCache<V> {
    name: &'static str,
    entries: Arc<DashMap<String, CacheEntry<V>>>,
    /// Serializes insert + eviction so the size bound holds after every write.
    write_lock: Arc<Mutex<()>>,
    ttl: Duration,
    capacity: usize,
}

impl<V: Clone> TtlCache<V> {
    /// Create a cache. `name` labels log lines and metrics.
    ///
    /// # Errors
    /// Returns [`CinelinkError::Config`] when `ttl` or `capacity` is zero.
    pub fn new(name: &'static str, ttl: Duration, capacity: usize) -> Result<Self> {
        if ttl.is_zero() {
            return Err(CinelinkError::Config(format!(
                "{name} cache TTL must be positive"
            )));
        }
        if capacity == 0 {
            return Err(CinelinkError::Config(format!(
                "{name} cache capacity must be positive"
            )));
        }

        Ok(Self {
            name,
            entries: Arc::new(DashMap::new()),
            write_lock: Arc::new(Mutex::new(())),
            ttl,
            capacity,
        })
    }

    /// Return the cached value if present and unexpired.
    ///
    /// A stale entry is removed as a side effect.
    pub fn get(&self, key: &str) -> Option<V> {
        let now = Instant::now();

        if let Some(entry) = self.entries.get(key) {
            if entry.expires_at >= now {
                debug!("{} cache HIT for {}", self.name, key);
                metrics::record_cache_lookup(self.name, true);
                return Some(entry.value.clone());
            }
            // Drop the read guard before removing. A concurrent `set` may have
            // refreshed the key in between, so only remove if still stale.
            drop(entry);
            self.entries.remove_if(key, |_, e| e.expires_at < now);
        }

        debug!("{} cache MISS for {}", self.name, key);
        metrics::record_cache_lookup(self.name, false);
        None
    }

    /// Insert or overwrite `key`, then enforce expiry and capacity.
    pub fn set(&self, key: impl Into<String>, value: V) {
        let _guard = self.write_lock.lock().unwrap_or_else(|p| p.into_inner());
        let now = Instant::now();

        self.entries.insert(
            key.into(),
            CacheEntry {
                value,
                expires_at: now + self.ttl,
            },
        );
        self.evict(now);
    }

    /// Remove every expired entry. Returns how many were dropped.
    pub fn purge_expired(&self) -> usize {
        let _guard = self.write_lock.lock().unwrap_or_else(|p| p.into_inner());
        let before = self.entries.len();
        let now = Instant::now();
        self.entries.retain(|_, e| e.expires_at >= now);
        before.saturating_sub(self.entries.len())
    }

    /// Number of entries currently held (may include not-yet-purged stale ones).
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    // Caller holds `write_lock`.
    fn evict(&self, now: Instant) {
        self.entries.retain(|_, e| e.expires_at >= now);

        let len = self.entries.len();
        if len <= self.capacity {
            return;
        }

        let mut by_expiry: Vec<(String, Instant)> = self
            .entries
            .iter()
            .map(|e| (e.key().clone(), e.expires_at))
            .collect();
        by_expiry.sort_by_key(|(_, expires_at)| *expires_at);

        let excess = len - self.capacity;
        for (key, _) in by_expiry.into_iter().take(excess) {
            self.entries.remove(&key);
        }
        debug!("{} cache evicted {} entries over capacity", self.name, excess);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache(ttl: Duration, capacity: usize) -> TtlCache<String> {
        TtlCache::new("test", ttl, capacity).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn hit_within_ttl() {
        let cache = cache(Duration::from_secs(60), 8);
        cache.set("matrix 1999", "The Matrix".to_string());

        tokio::time::advance(Duration::from_secs(59)).await;
        assert_eq!(cache.get("matrix 1999"), Some("The Matrix".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn miss_after_ttl_removes_entry() {
        let cache = cache(Duration::from_secs(60), 8);
        cache.set("matrix 1999", "The Matrix".to_string());

        tokio::time::advance(Duration::from_secs(61)).await;
        assert_eq!(cache.get("matrix 1999"), None, "entry should be stale");
        assert_eq!(cache.len(), 0, "stale entry should be purged on read");
    }

    #[test]
    fn miss_for_unknown_key() {
        let cache = cache(Duration::from_secs(60), 8);
        assert_eq!(cache.get("never looked up"), None);
    }

    #[test]
    fn negative_value_is_distinct_from_missing() {
        let cache: TtlCache<Option<String>> =
            TtlCache::new("test", Duration::from_secs(60), 8).unwrap();
        cache.set("asdfghjkl", None);

        assert_eq!(cache.get("asdfghjkl"), Some(None));
        assert_eq!(cache.get("other"), None);
    }

    #[test]
    fn overwrite_replaces_value() {
        let cache = cache(Duration::from_secs(60), 8);
        cache.set("k", "old".to_string());
        cache.set("k", "new".to_string());

        assert_eq!(cache.get("k"), Some("new".to_string()));
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn capacity_evicts_earliest_expiry() {
        let cache = cache(Duration::from_secs(60), 3);
        for key in ["a", "b", "c"] {
            cache.set(key, key.to_string());
            tokio::time::advance(Duration::from_millis(10)).await;
        }

        cache.set("d", "d".to_string());

        assert_eq!(cache.len(), 3);
        assert_eq!(cache.get("a"), None, "earliest expiry should be evicted");
        assert!(cache.get("b").is_some());
        assert!(cache.get("c").is_some());
        assert!(cache.get("d").is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn overwrite_refreshes_expiry_for_eviction_order() {
        let cache = cache(Duration::from_secs(60), 2);
        cache.set("a", "a".to_string());
        tokio::time::advance(Duration::from_millis(10)).await;
        cache.set("b", "b".to_string());
        tokio::time::advance(Duration::from_millis(10)).await;
        cache.set("a", "a2".to_string());
        tokio::time::advance(Duration::from_millis(10)).await;

        cache.set("c", "c".to_string());

        assert_eq!(cache.get("b"), None);
        assert_eq!(cache.get("a"), Some("a2".to_string()));
        assert!(cache.get("c").is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn expired_entries_purged_before_capacity_eviction() {
        let cache = cache(Duration::from_secs(10), 2);
        cache.set("old", "old".to_string());
        tokio::time::advance(Duration::from_secs(9)).await;
        cache.set("fresh", "fresh".to_string());
        tokio::time::advance(Duration::from_secs(2)).await;

        // "old" is expired; purging it makes room, so "fresh" survives.
        cache.set("newest", "newest".to_string());

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get("fresh"), Some("fresh".to_string()));
        assert_eq!(cache.get("newest"), Some("newest".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn purge_expired_reports_dropped_count() {
        let cache = cache(Duration::from_secs(5), 8);
        cache.set("x", "x".to_string());
        cache.set("y", "y".to_string());
        tokio::time::advance(Duration::from_secs(6)).await;
        cache.set("z", "z".to_string());

        // "x" and "y" were already dropped by the write above.
        assert_eq!(cache.purge_expired(), 0);
        tokio::time::advance(Duration::from_secs(6)).await;
        assert_eq!(cache.purge_expired(), 1);
        assert!(cache.is_empty());
    }

    #[test]
    fn zero_ttl_rejected() {
        let result: Result<TtlCache<String>> = TtlCache::new("test", Duration::ZERO, 8);
        assert!(matches!(result, Err(CinelinkError::Config(_))));
    }

    #[test]
    fn zero_capacity_rejected() {
        let result: Result<TtlCache<String>> =
            TtlCache::new("test", Duration::from_secs(1), 0);
        assert!(matches!(result, Err(CinelinkError::Config(_))));
    }

    #[test]
    fn concurrent_writers_respect_capacity() {
        let cache = cache(Duration::from_secs(60), 16);

        let handles: Vec<_> = (0..8)
            .map(|t| {
                let cache = cache.clone();
                std::thread::spawn(move || {
                    for i in 0..200 {
                        let key = format!("t{t}-k{i}");
                        cache.set(key.clone(), key.clone());
                        let _ = cache.get(&key);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert!(cache.len() <= cache.capacity());
        assert_eq!(cache.len(), 16);
    }
}
