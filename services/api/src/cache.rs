//! services/api/src/cache.rs
//!
//! A small read-through TTL cache, explicitly constructed and owned by
//! `AppState` rather than living in module-global state. One writer per key
//! at a time; readers get a clone of the cached value.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Mutex;
use std::time::{Duration, Instant};

struct Entry<V> {
    value: V,
    stored_at: Instant,
}

/// A TTL cache with `get` / `put` / `invalidate` / `is_stale`.
pub struct TtlCache<K, V> {
    ttl: Duration,
    entries: Mutex<HashMap<K, Entry<V>>>,
}

impl<K: Eq + Hash, V: Clone> TtlCache<K, V> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Returns a fresh value, or `None` when absent or past its TTL.
    pub fn get(&self, key: &K) -> Option<V> {
        let entries = self.entries.lock().unwrap();
        entries
            .get(key)
            .filter(|entry| entry.stored_at.elapsed() < self.ttl)
            .map(|entry| entry.value.clone())
    }

    pub fn put(&self, key: K, value: V) {
        let mut entries = self.entries.lock().unwrap();
        entries.insert(
            key,
            Entry {
                value,
                stored_at: Instant::now(),
            },
        );
    }

    pub fn invalidate(&self, key: &K) {
        let mut entries = self.entries.lock().unwrap();
        entries.remove(key);
    }

    /// True when the key is absent or its entry has outlived the TTL.
    pub fn is_stale(&self, key: &K) -> bool {
        let entries = self.entries.lock().unwrap();
        match entries.get(key) {
            Some(entry) => entry.stored_at.elapsed() >= self.ttl,
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_entries_are_served() {
        let cache: TtlCache<&str, u32> = TtlCache::new(Duration::from_secs(60));
        assert!(cache.is_stale(&"stats"));
        cache.put("stats", 7);
        assert_eq!(cache.get(&"stats"), Some(7));
        assert!(!cache.is_stale(&"stats"));
    }

    #[test]
    fn zero_ttl_entries_are_stale_immediately() {
        let cache: TtlCache<&str, u32> = TtlCache::new(Duration::ZERO);
        cache.put("stats", 7);
        assert_eq!(cache.get(&"stats"), None);
        assert!(cache.is_stale(&"stats"));
    }

    #[test]
    fn invalidate_removes_the_entry() {
        let cache: TtlCache<&str, u32> = TtlCache::new(Duration::from_secs(60));
        cache.put("stats", 7);
        cache.invalidate(&"stats");
        assert_eq!(cache.get(&"stats"), None);
    }
}
