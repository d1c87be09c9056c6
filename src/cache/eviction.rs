//! Eviction Policy Module
//!
//! Victim selection for a full cache. Recency is always tracked; the policy
//! only decides which entry goes when a bound is hit.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::cache::{CacheEntry, LruTracker};
use crate::error::GovernorError;

// == Eviction Policy ==
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvictionPolicy {
    /// Least recently touched entry
    #[default]
    Lru,
    /// Entry with the fewest hits, oldest insertion first on ties
    Lfu,
    /// Entry with the earliest creation time
    #[serde(rename = "ttl", alias = "ttl_oldest")]
    TtlOldest,
}

impl EvictionPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            EvictionPolicy::Lru => "lru",
            EvictionPolicy::Lfu => "lfu",
            EvictionPolicy::TtlOldest => "ttl",
        }
    }

    // == Select Victim ==
    /// Picks the key to evict next, or None if the store is empty.
    pub fn select_victim<V>(
        &self,
        entries: &HashMap<String, CacheEntry<V>>,
        lru: &LruTracker,
    ) -> Option<String> {
        match self {
            EvictionPolicy::Lru => lru.peek_oldest().cloned(),
            EvictionPolicy::Lfu => entries
                .iter()
                .min_by_key(|(_, entry)| (entry.hit_count, entry.sequence))
                .map(|(key, _)| key.clone()),
            EvictionPolicy::TtlOldest => entries
                .iter()
                .min_by_key(|(_, entry)| (entry.created_at, entry.sequence))
                .map(|(key, _)| key.clone()),
        }
    }
}

impl fmt::Display for EvictionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EvictionPolicy {
    type Err = GovernorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lru" => Ok(EvictionPolicy::Lru),
            "lfu" => Ok(EvictionPolicy::Lfu),
            "ttl" | "ttl_oldest" => Ok(EvictionPolicy::TtlOldest),
            other => Err(GovernorError::InvalidConfiguration(format!(
                "unknown eviction policy '{other}' (expected lru, lfu or ttl)"
            ))),
        }
    }
}
