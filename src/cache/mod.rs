//! Cache Module
//!
//! Provides the bounded result cache with TTL expiration and pluggable
//! eviction (LRU, LFU, oldest-first).

mod entry;
mod eviction;
mod lru;
mod stats;
mod store;

#[cfg(test)]
mod property_tests;

// Re-export public types
pub use entry::{estimate_size, CacheEntry, DEFAULT_ENTRY_SIZE_BYTES};
pub use eviction::EvictionPolicy;
pub use lru::LruTracker;
pub use stats::{hit_rate, CacheCounters, CacheStats};
pub use store::CacheStore;
