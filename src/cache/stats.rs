//! Cache Statistics Module
//!
//! Tracks cache performance metrics including hits, misses, evictions and
//! expired removals.

use serde::Serialize;

use crate::cache::EvictionPolicy;

// == Cache Counters ==
/// Running counters kept by the store.
#[derive(Debug, Clone, Default)]
pub struct CacheCounters {
    /// Number of successful cache retrievals
    pub hits: u64,
    /// Number of failed cache retrievals (key not found or expired)
    pub misses: u64,
    /// Number of entries evicted to respect a bound
    pub evictions: u64,
    /// Number of entries dropped because their TTL elapsed
    pub expired_removals: u64,
}

impl CacheCounters {
    pub fn record_hit(&mut self) {
        self.hits += 1;
    }

    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    pub fn record_eviction(&mut self) {
        self.evictions += 1;
    }

    pub fn record_expired(&mut self, count: usize) {
        self.expired_removals += count as u64;
    }
}

// == Cache Stats ==
/// Point-in-time view of the store.
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    /// Current number of entries
    pub size: usize,
    pub max_entries: usize,
    /// Current byte estimate
    pub bytes: usize,
    pub max_bytes: usize,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub expired_removals: u64,
    /// hits / (hits + misses), 0.0 before any lookup
    pub hit_rate: f64,
    pub policy: EvictionPolicy,
    /// Default TTL in seconds
    pub default_ttl: u64,
}

impl CacheStats {
    /// Builds a snapshot, deriving the hit rate from the counters.
    pub fn new(
        counters: &CacheCounters,
        size: usize,
        max_entries: usize,
        bytes: usize,
        max_bytes: usize,
        policy: EvictionPolicy,
        default_ttl: u64,
    ) -> Self {
        Self {
            size,
            max_entries,
            bytes,
            max_bytes,
            hits: counters.hits,
            misses: counters.misses,
            evictions: counters.evictions,
            expired_removals: counters.expired_removals,
            hit_rate: hit_rate(counters.hits, counters.misses),
            policy,
            default_ttl,
        }
    }
}

/// Returns hits / (hits + misses), or 0.0 if no requests have been made.
pub fn hit_rate(hits: u64, misses: u64) -> f64 {
    let total = hits + misses;
    if total == 0 {
        0.0
    } else {
        hits as f64 / total as f64
    }
}
