//! Cache Entry Module
//!
//! Defines the structure for individual cache entries with TTL and access
//! bookkeeping.

use serde::Serialize;

/// Size charged for a value whose serialized form cannot be measured.
pub const DEFAULT_ENTRY_SIZE_BYTES: usize = 1024;

// == Cache Entry ==
/// Represents a single cache entry with value and metadata.
///
/// All timestamps are milliseconds read from the store's clock.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    /// The stored value, never mutated after insertion
    pub value: V,
    /// Creation timestamp
    pub created_at: u64,
    /// Last successful `get`
    pub last_accessed_at: u64,
    /// Expiration timestamp (`created_at + ttl`)
    pub expires_at: u64,
    /// Number of successful `get` calls
    pub hit_count: u64,
    /// Best-effort size estimate of `value`
    pub size_bytes: usize,
    /// Insertion order, used to break eviction ties
    pub sequence: u64,
}

impl<V: Serialize> CacheEntry<V> {
    // == Constructor ==
    /// Creates a new cache entry that expires `ttl_seconds` after `now_ms`.
    pub fn new(value: V, ttl_seconds: u64, now_ms: u64, sequence: u64) -> Self {
        let size_bytes = estimate_size(&value);
        Self {
            value,
            created_at: now_ms,
            last_accessed_at: now_ms,
            expires_at: now_ms.saturating_add(ttl_seconds.saturating_mul(1000)),
            hit_count: 0,
            size_bytes,
            sequence,
        }
    }
}

impl<V> CacheEntry<V> {
    // == Is Expired ==
    /// Checks if the entry has expired.
    ///
    /// An entry is expired once `now_ms >= expires_at`, so it is never served
    /// after its TTL has fully elapsed.
    pub fn is_expired(&self, now_ms: u64) -> bool {
        now_ms >= self.expires_at
    }

    // == Record Hit ==
    /// Bumps the hit counter and access time.
    pub fn record_hit(&mut self, now_ms: u64) {
        self.hit_count += 1;
        self.last_accessed_at = now_ms;
    }
}

// == Utility Functions ==
/// Estimates the in-memory footprint of a value from its JSON encoding.
///
/// Falls back to [`DEFAULT_ENTRY_SIZE_BYTES`] when the value cannot be
/// serialized.
pub fn estimate_size<V: Serialize>(value: &V) -> usize {
    serde_json::to_vec(value)
        .map(|bytes| bytes.len())
        .unwrap_or(DEFAULT_ENTRY_SIZE_BYTES)
}
