//! A small TTL-keyed cache on top of `DashMap`, with lazy eviction on read.
//!
//! Used by the identity verifier (introspection results, keyed by a hash of
//! the token) and by the menu read cache (keyed by `tenant_id:catalog_version`).

use dashmap::DashMap;
use std::hash::Hash;
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Clone)]
pub struct TtlCache<K, V> {
    entries: Arc<DashMap<K, (V, Instant)>>,
    ttl: Duration,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            ttl,
        }
    }

    /// Insert a value with this cache's default TTL.
    pub fn insert(&self, key: K, value: V) {
        self.entries.insert(key, (value, Instant::now() + self.ttl));
    }

    /// Insert a value with an explicit TTL, overriding the cache default.
    /// Used by the identity verifier, whose cache entry must expire no
    /// later than the underlying token's own remaining lifetime.
    pub fn insert_with_ttl(&self, key: K, value: V, ttl: Duration) {
        self.entries.insert(key, (value, Instant::now() + ttl));
    }

    /// Returns the cached value if present and not expired, evicting it
    /// lazily if it has expired.
    pub fn get(&self, key: &K) -> Option<V> {
        let expired = match self.entries.get(key) {
            Some(entry) => Instant::now() >= entry.1,
            None => return None,
        };
        if expired {
            self.entries.remove(key);
            None
        } else {
            self.entries.get(key).map(|e| e.0.clone())
        }
    }

    pub fn remove(&self, key: &K) {
        self.entries.remove(key);
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Removes keys matching a predicate, e.g. every entry for a tenant
    /// whose catalog version just changed.
    pub fn remove_matching(&self, mut predicate: impl FnMut(&K) -> bool) {
        self.entries.retain(|k, _| !predicate(k));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn returns_value_before_expiry() {
        let cache = TtlCache::new(Duration::from_secs(60));
        cache.insert("a", 1);
        assert_eq!(cache.get(&"a"), Some(1));
    }

    #[test]
    fn evicts_after_ttl() {
        let cache = TtlCache::new(Duration::from_millis(10));
        cache.insert("a", 1);
        std::thread::sleep(Duration::from_millis(30));
        assert_eq!(cache.get(&"a"), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn per_entry_ttl_overrides_default() {
        let cache = TtlCache::new(Duration::from_secs(60));
        cache.insert_with_ttl("short", 1, Duration::from_millis(5));
        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(cache.get(&"short"), None);
    }

    #[test]
    fn remove_matching_evicts_by_predicate() {
        let cache = TtlCache::new(Duration::from_secs(60));
        cache.insert("tenant-a:1", "menu-a");
        cache.insert("tenant-b:1", "menu-b");
        cache.remove_matching(|k| k.starts_with("tenant-a"));
        assert_eq!(cache.get(&"tenant-a:1"), None);
        assert_eq!(cache.get(&"tenant-b:1"), Some("menu-b"));
    }
}
