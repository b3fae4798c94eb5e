//! Bounded cache of latest values.
//!
//! The cache maps primary keys to the most recent value written or read for
//! that key. Versioned and point-in-time reads bypass it entirely — only
//! the "latest" path may consult or populate it. Capacity zero disables
//! caching altogether.
//!
//! Interior mutability uses a plain `Mutex` that is only ever held for the
//! duration of a map operation, never across an await point.

use std::num::NonZeroUsize;
use std::sync::Mutex;

use lru::LruCache;
use serde_json::Value;

/// Default capacity applied when a partition registration passes none.
pub const DEFAULT_CACHE_CAPACITY: usize = 1000;

/// LRU cache of latest values, keyed by primary key.
#[derive(Debug)]
pub struct ValueCache {
    /// `None` when caching is disabled (capacity 0).
    inner: Option<Mutex<LruCache<String, Value>>>,
}

impl ValueCache {
    /// Create a cache with the given capacity; zero disables caching.
    pub fn new(capacity: usize) -> Self {
        let inner = NonZeroUsize::new(capacity).map(|cap| Mutex::new(LruCache::new(cap)));
        Self { inner }
    }

    /// Look up a key, promoting it to most-recently-used on hit.
    pub fn get(&self, key: &str) -> Option<Value> {
        let inner = self.inner.as_ref()?;
        inner.lock().unwrap().get(key).cloned()
    }

    /// Insert or refresh a key, evicting the least-recently-used entry when
    /// full.
    pub fn put(&self, key: &str, value: Value) {
        if let Some(inner) = &self.inner {
            inner.lock().unwrap().put(key.to_string(), value);
        }
    }

    /// Whether a key is cached, without promoting it.
    pub fn has(&self, key: &str) -> bool {
        match &self.inner {
            Some(inner) => inner.lock().unwrap().contains(key),
            None => false,
        }
    }

    /// Drop a key from the cache.
    pub fn remove(&self, key: &str) {
        if let Some(inner) = &self.inner {
            inner.lock().unwrap().pop(key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn get_put_remove() {
        let cache = ValueCache::new(4);
        assert_eq!(cache.get("k"), None);

        cache.put("k", json!("v"));
        assert_eq!(cache.get("k"), Some(json!("v")));
        assert!(cache.has("k"));

        cache.remove("k");
        assert_eq!(cache.get("k"), None);
        assert!(!cache.has("k"));
    }

    #[test]
    fn put_refreshes_existing_entry() {
        let cache = ValueCache::new(4);
        cache.put("k", json!(1));
        cache.put("k", json!(2));
        assert_eq!(cache.get("k"), Some(json!(2)));
    }

    #[test]
    fn evicts_least_recently_used() {
        let cache = ValueCache::new(2);
        cache.put("a", json!(1));
        cache.put("b", json!(2));

        // Touch "a" so "b" becomes the eviction candidate.
        assert_eq!(cache.get("a"), Some(json!(1)));
        cache.put("c", json!(3));

        assert_eq!(cache.get("a"), Some(json!(1)));
        assert_eq!(cache.get("b"), None);
        assert_eq!(cache.get("c"), Some(json!(3)));
    }

    #[test]
    fn zero_capacity_disables_caching() {
        let cache = ValueCache::new(0);
        cache.put("k", json!("v"));
        assert_eq!(cache.get("k"), None);
        assert!(!cache.has("k"));
        // Remove on a disabled cache is a no-op, not a panic.
        cache.remove("k");
    }
}
