//! Cache Store Module
//!
//! Main cache engine combining HashMap storage with recency tracking, TTL
//! expiration, an entry bound and a byte budget.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};

use crate::cache::{CacheCounters, CacheEntry, CacheStats, EvictionPolicy, LruTracker};
use crate::clock::Clock;
use crate::config::CacheConfig;
use crate::error::Result;

// == Cache Store ==
/// Bounded result cache keyed by a caller-computed fingerprint.
///
/// The store is not synchronized; share it behind a lock.
pub struct CacheStore<V> {
    /// Key-value storage
    entries: HashMap<String, CacheEntry<V>>,
    /// Recency order, maintained for every policy
    lru: LruTracker,
    /// Performance counters
    counters: CacheCounters,
    /// Sum of `size_bytes` over `entries`
    current_bytes: usize,
    /// Maximum number of entries, 0 = unlimited
    max_entries: usize,
    /// Byte budget, 0 = unlimited
    max_bytes: usize,
    /// Default TTL in seconds for `set` calls without one
    default_ttl: u64,
    policy: EvictionPolicy,
    next_sequence: u64,
    clock: Arc<dyn Clock>,
}

impl<V: Clone + Serialize> CacheStore<V> {
    // == Constructor ==
    /// Creates a new CacheStore.
    ///
    /// # Arguments
    /// * `max_entries` - Maximum number of entries, 0 = unlimited
    /// * `max_bytes` - Byte budget, 0 = unlimited
    /// * `default_ttl` - Default TTL in seconds, 0 disables caching
    /// * `policy` - Victim selection when a bound is hit
    /// * `clock` - Time source for creation and expiry stamps
    pub fn new(
        max_entries: usize,
        max_bytes: usize,
        default_ttl: u64,
        policy: EvictionPolicy,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            entries: HashMap::new(),
            lru: LruTracker::new(),
            counters: CacheCounters::default(),
            current_bytes: 0,
            max_entries,
            max_bytes,
            default_ttl,
            policy,
            next_sequence: 0,
            clock,
        }
    }

    /// Creates a store from validated configuration.
    pub fn from_config(config: &CacheConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        config.validate()?;
        Ok(Self::new(
            config.max_entries,
            config.max_bytes(),
            config.ttl_seconds,
            config.eviction_policy,
            clock,
        ))
    }

    // == Get ==
    /// Retrieves a value by key.
    ///
    /// Expired entries are removed and counted as misses. A hit moves the key
    /// to the most recently used end regardless of policy.
    pub fn get(&mut self, key: &str) -> Option<V> {
        let now = self.clock.now_ms();

        let expired = match self.entries.get(key) {
            Some(entry) => entry.is_expired(now),
            None => {
                self.counters.record_miss();
                return None;
            }
        };

        if expired {
            self.remove_entry(key);
            self.counters.record_expired(1);
            self.counters.record_miss();
            debug!(key, "Cache entry expired on read");
            return None;
        }

        let entry = self.entries.get_mut(key)?;
        entry.record_hit(now);
        let value = entry.value.clone();
        self.lru.touch(key);
        self.counters.record_hit();
        Some(value)
    }

    // == Set ==
    /// Stores a value, evicting per policy until the bounds admit it.
    ///
    /// `ttl` of None uses the default TTL. A TTL of 0 leaves the store
    /// untouched and returns false. An existing entry for `key` is replaced.
    /// An entry larger than the whole byte budget is still stored once the
    /// store has been emptied.
    pub fn set(&mut self, key: String, value: V, ttl: Option<u64>) -> bool {
        let ttl = ttl.unwrap_or(self.default_ttl);
        if ttl == 0 {
            return false;
        }

        // Drop the previous version first so its bytes are not counted twice
        self.remove_entry(&key);

        let now = self.clock.now_ms();
        let entry = CacheEntry::new(value, ttl, now, self.next_sequence);
        self.next_sequence += 1;

        self.make_room(entry.size_bytes);

        self.current_bytes += entry.size_bytes;
        self.entries.insert(key.clone(), entry);
        self.lru.touch(&key);
        true
    }

    // == Remove ==
    /// Removes an entry by key. Returns true if it existed.
    pub fn remove(&mut self, key: &str) -> bool {
        self.remove_entry(key).is_some()
    }

    // == Clear ==
    /// Drops every entry. Counters are kept.
    pub fn clear(&mut self) {
        let dropped = self.entries.len();
        self.entries.clear();
        self.lru.clear();
        self.current_bytes = 0;
        info!(dropped, "Cache cleared");
    }

    // == Cleanup Expired ==
    /// Removes all expired entries from the cache.
    ///
    /// Returns the number of entries removed.
    pub fn cleanup_expired(&mut self) -> usize {
        let now = self.clock.now_ms();
        let expired_keys: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired(now))
            .map(|(key, _)| key.clone())
            .collect();

        let count = expired_keys.len();
        for key in expired_keys {
            self.remove_entry(&key);
        }
        self.counters.record_expired(count);

        if count > 0 {
            info!(removed = count, "TTL sweep removed expired entries");
        }
        count
    }

    // == Stats ==
    /// Returns current cache statistics.
    pub fn stats(&self) -> CacheStats {
        CacheStats::new(
            &self.counters,
            self.entries.len(),
            self.max_entries,
            self.current_bytes,
            self.max_bytes,
            self.policy,
            self.default_ttl,
        )
    }

    /// True if a live entry exists. Does not touch recency or counters.
    pub fn contains(&self, key: &str) -> bool {
        let now = self.clock.now_ms();
        self.entries
            .get(key)
            .map(|entry| !entry.is_expired(now))
            .unwrap_or(false)
    }

    // == Length ==
    /// Returns the current number of entries, expired ones included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Current byte estimate of all entries.
    pub fn current_bytes(&self) -> usize {
        self.current_bytes
    }

    pub fn policy(&self) -> EvictionPolicy {
        self.policy
    }

    pub fn default_ttl(&self) -> u64 {
        self.default_ttl
    }

    // == Internals ==
    /// Evicts until one more entry of `incoming_bytes` fits, or the store is empty.
    fn make_room(&mut self, incoming_bytes: usize) {
        loop {
            let over_entries = self.max_entries > 0 && self.entries.len() >= self.max_entries;
            let over_bytes =
                self.max_bytes > 0 && self.current_bytes + incoming_bytes > self.max_bytes;
            if !over_entries && !over_bytes {
                return;
            }

            let Some(victim) = self.policy.select_victim(&self.entries, &self.lru) else {
                return;
            };
            self.remove_entry(&victim);
            self.counters.record_eviction();
            debug!(
                key = %victim,
                policy = %self.policy,
                over_entries,
                over_bytes,
                "Evicted cache entry"
            );
        }
    }

    #[cfg(test)]
    pub(crate) fn summed_entry_bytes(&self) -> usize {
        self.entries.values().map(|entry| entry.size_bytes).sum()
    }

    fn remove_entry(&mut self, key: &str) -> Option<CacheEntry<V>> {
        let entry = self.entries.remove(key)?;
        self.lru.remove(key);
        self.current_bytes -= entry.size_bytes;
        Some(entry)
    }
}

impl<V> std::fmt::Debug for CacheStore<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheStore")
            .field("len", &self.entries.len())
            .field("current_bytes", &self.current_bytes)
            .field("max_entries", &self.max_entries)
            .field("max_bytes", &self.max_bytes)
            .field("default_ttl", &self.default_ttl)
            .field("policy", &self.policy)
            .finish()
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use std::time::Duration;

    fn store_with(
        max_entries: usize,
        max_bytes: usize,
        policy: EvictionPolicy,
    ) -> (CacheStore<String>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(0));
        let store = CacheStore::new(max_entries, max_bytes, 300, policy, clock.clone());
        (store, clock)
    }

    #[test]
    fn test_store_new() {
        let (store, _) = store_with(100, 0, EvictionPolicy::Lru);
        assert_eq!(store.len(), 0);
        assert!(store.is_empty());
        assert_eq!(store.current_bytes(), 0);
    }

    #[test]
    fn test_store_set_and_get() {
        let (mut store, _) = store_with(100, 0, EvictionPolicy::Lru);

        assert!(store.set("key1".to_string(), "value1".to_string(), None));
        assert_eq!(store.get("key1"), Some("value1".to_string()));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_store_get_nonexistent() {
        let (mut store, _) = store_with(100, 0, EvictionPolicy::Lru);
        assert_eq!(store.get("nonexistent"), None);
        assert_eq!(store.stats().misses, 1);
    }

    #[test]
    fn test_store_remove() {
        let (mut store, _) = store_with(100, 0, EvictionPolicy::Lru);

        store.set("key1".to_string(), "value1".to_string(), None);
        assert!(store.remove("key1"));
        assert!(!store.remove("key1"));

        assert!(store.is_empty());
        assert_eq!(store.current_bytes(), 0);
        assert_eq!(store.get("key1"), None);
    }

    #[test]
    fn test_store_overwrite_does_not_double_count_bytes() {
        let (mut store, _) = store_with(100, 0, EvictionPolicy::Lru);

        store.set("key1".to_string(), "aaaa".to_string(), None);
        store.set("key1".to_string(), "bb".to_string(), None);

        assert_eq!(store.get("key1"), Some("bb".to_string()));
        assert_eq!(store.len(), 1);
        assert_eq!(store.current_bytes(), "\"bb\"".len());
    }

    #[test]
    fn test_store_zero_ttl_disables_caching() {
        let clock = Arc::new(ManualClock::new(0));
        let mut store: CacheStore<String> =
            CacheStore::new(10, 0, 0, EvictionPolicy::Lru, clock);

        assert!(!store.set("key1".to_string(), "value1".to_string(), None));
        assert!(store.is_empty());
    }

    #[test]
    fn test_store_zero_ttl_leaves_existing_entry() {
        let (mut store, _) = store_with(10, 0, EvictionPolicy::Lru);

        store.set("key1".to_string(), "old".to_string(), None);
        assert!(!store.set("key1".to_string(), "new".to_string(), Some(0)));
        assert_eq!(store.get("key1"), Some("old".to_string()));
    }

    #[test]
    fn test_store_ttl_expiration() {
        let (mut store, clock) = store_with(100, 0, EvictionPolicy::Lru);

        store.set("key1".to_string(), "value1".to_string(), Some(1));
        assert!(store.get("key1").is_some());

        clock.advance(Duration::from_millis(1100));

        assert_eq!(store.get("key1"), None);
        assert!(store.is_empty());
        let stats = store.stats();
        assert_eq!(stats.expired_removals, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.bytes, 0);
    }

    #[test]
    fn test_store_lru_eviction() {
        let (mut store, _) = store_with(2, 0, EvictionPolicy::Lru);

        store.set("a".to_string(), "1".to_string(), None);
        store.set("b".to_string(), "2".to_string(), None);
        store.set("c".to_string(), "3".to_string(), None);
        // c evicted a; touching c makes b least recent
        store.get("c");
        store.set("d".to_string(), "4".to_string(), None);

        assert_eq!(store.len(), 2);
        assert!(!store.contains("a"));
        assert!(!store.contains("b"));
        assert!(store.contains("c"));
        assert!(store.contains("d"));
        assert_eq!(store.stats().evictions, 2);
    }

    #[test]
    fn test_store_lru_touch_on_get() {
        let (mut store, _) = store_with(3, 0, EvictionPolicy::Lru);

        store.set("a".to_string(), "1".to_string(), None);
        store.set("b".to_string(), "2".to_string(), None);
        store.set("c".to_string(), "3".to_string(), None);
        store.get("a");
        store.set("d".to_string(), "4".to_string(), None);

        assert!(store.contains("a"));
        assert!(!store.contains("b"));
        assert!(store.contains("c"));
        assert!(store.contains("d"));
    }

    #[test]
    fn test_store_lfu_eviction() {
        let (mut store, _) = store_with(3, 0, EvictionPolicy::Lfu);

        store.set("a".to_string(), "1".to_string(), None);
        store.set("b".to_string(), "2".to_string(), None);
        store.set("c".to_string(), "3".to_string(), None);
        store.get("a");
        store.get("a");
        store.get("c");
        store.set("d".to_string(), "4".to_string(), None);

        assert!(store.contains("a"));
        assert!(!store.contains("b"));
        assert!(store.contains("c"));
        assert!(store.contains("d"));
    }

    #[test]
    fn test_store_ttl_oldest_eviction() {
        let (mut store, clock) = store_with(2, 0, EvictionPolicy::TtlOldest);

        store.set("a".to_string(), "1".to_string(), None);
        clock.advance(Duration::from_secs(1));
        store.set("b".to_string(), "2".to_string(), None);
        // Recency does not protect the oldest entry under this policy
        store.get("a");
        store.set("c".to_string(), "3".to_string(), None);

        assert!(!store.contains("a"));
        assert!(store.contains("b"));
        assert!(store.contains("c"));
    }

    #[test]
    fn test_store_byte_budget_eviction() {
        // Each value "xxxxxxxx" serializes to 10 bytes
        let (mut store, _) = store_with(0, 25, EvictionPolicy::Lru);

        store.set("a".to_string(), "x".repeat(8), None);
        store.set("b".to_string(), "x".repeat(8), None);
        assert_eq!(store.current_bytes(), 20);

        store.set("c".to_string(), "x".repeat(8), None);
        assert_eq!(store.len(), 2);
        assert_eq!(store.current_bytes(), 20);
        assert!(!store.contains("a"));
    }

    #[test]
    fn test_store_oversized_entry_inserted_into_empty_store() {
        let (mut store, _) = store_with(0, 8, EvictionPolicy::Lru);

        store.set("small".to_string(), "x".to_string(), None);
        assert!(store.set("big".to_string(), "x".repeat(64), None));

        assert_eq!(store.len(), 1);
        assert!(store.contains("big"));
        assert!(!store.contains("small"));
        assert_eq!(store.current_bytes(), 66);
    }

    #[test]
    fn test_store_stats() {
        let (mut store, _) = store_with(100, 1024, EvictionPolicy::Lru);

        store.set("key1".to_string(), "value1".to_string(), None);
        store.get("key1"); // hit
        store.get("nonexistent"); // miss

        let stats = store.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.size, 1);
        assert_eq!(stats.bytes, 8);
        assert_eq!(stats.max_bytes, 1024);
        assert_eq!(stats.hit_rate, 0.5);
        assert_eq!(stats.policy, EvictionPolicy::Lru);
        assert_eq!(stats.default_ttl, 300);
    }

    #[test]
    fn test_store_cleanup_expired() {
        let (mut store, clock) = store_with(100, 0, EvictionPolicy::Lru);

        store.set("key1".to_string(), "value1".to_string(), Some(1));
        store.set("key2".to_string(), "value2".to_string(), Some(10));

        clock.advance(Duration::from_millis(1100));

        assert_eq!(store.cleanup_expired(), 1);
        assert_eq!(store.len(), 1);
        assert_eq!(store.current_bytes(), 8);
        assert!(store.get("key2").is_some());
        assert_eq!(store.stats().expired_removals, 1);
    }

    #[test]
    fn test_store_clear() {
        let (mut store, _) = store_with(100, 0, EvictionPolicy::Lru);

        store.set("a".to_string(), "1".to_string(), None);
        store.set("b".to_string(), "2".to_string(), None);
        store.get("a");
        store.clear();

        assert!(store.is_empty());
        assert_eq!(store.current_bytes(), 0);
        // Counters survive a clear
        assert_eq!(store.stats().hits, 1);
    }

    #[test]
    fn test_store_from_config() {
        let clock = Arc::new(ManualClock::new(0));
        let config = CacheConfig {
            ttl_seconds: 60,
            max_entries: 5,
            max_size_mb: 1.0,
            eviction_policy: EvictionPolicy::Lfu,
        };
        let store: CacheStore<String> = CacheStore::from_config(&config, clock).unwrap();
        let stats = store.stats();

        assert_eq!(stats.max_entries, 5);
        assert_eq!(stats.max_bytes, 1024 * 1024);
        assert_eq!(stats.default_ttl, 60);
        assert_eq!(stats.policy, EvictionPolicy::Lfu);
    }

    #[test]
    fn test_store_from_config_rejects_negative_size() {
        let clock = Arc::new(ManualClock::new(0));
        let config = CacheConfig {
            max_size_mb: -1.0,
            ..CacheConfig::default()
        };
        assert!(CacheStore::<String>::from_config(&config, clock).is_err());
    }
}
