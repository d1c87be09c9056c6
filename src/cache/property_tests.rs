//! Property-Based Tests for Cache Module
//!
//! Uses proptest to check the store's bounds and accounting under arbitrary
//! operation sequences.

use proptest::prelude::*;
use std::sync::Arc;
use std::time::Duration;

use crate::cache::{CacheStore, EvictionPolicy};
use crate::clock::ManualClock;

// == Test Configuration ==
const TEST_DEFAULT_TTL: u64 = 300;

// == Strategies ==
fn valid_key_strategy() -> impl Strategy<Value = String> {
    "[a-z0-9_]{1,12}"
}

fn valid_value_strategy() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9 ]{0,64}"
}

fn policy_strategy() -> impl Strategy<Value = EvictionPolicy> {
    prop_oneof![
        Just(EvictionPolicy::Lru),
        Just(EvictionPolicy::Lfu),
        Just(EvictionPolicy::TtlOldest),
    ]
}

/// A single step applied to the store
#[derive(Debug, Clone)]
enum CacheOp {
    Set {
        key: String,
        value: String,
        ttl: Option<u64>,
    },
    Get {
        key: String,
    },
    Remove {
        key: String,
    },
    Advance {
        millis: u64,
    },
    Sweep,
}

fn cache_op_strategy() -> impl Strategy<Value = CacheOp> {
    prop_oneof![
        4 => (valid_key_strategy(), valid_value_strategy(), prop::option::of(0u64..5))
            .prop_map(|(key, value, ttl)| CacheOp::Set { key, value, ttl }),
        3 => valid_key_strategy().prop_map(|key| CacheOp::Get { key }),
        1 => valid_key_strategy().prop_map(|key| CacheOp::Remove { key }),
        1 => (0u64..3000).prop_map(|millis| CacheOp::Advance { millis }),
        1 => Just(CacheOp::Sweep),
    ]
}

fn apply(store: &mut CacheStore<String>, clock: &ManualClock, op: CacheOp) {
    match op {
        CacheOp::Set { key, value, ttl } => {
            store.set(key, value, ttl);
        }
        CacheOp::Get { key } => {
            store.get(&key);
        }
        CacheOp::Remove { key } => {
            store.remove(&key);
        }
        CacheOp::Advance { millis } => clock.advance(Duration::from_millis(millis)),
        CacheOp::Sweep => {
            store.cleanup_expired();
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    // For any sequence of operations with max_entries = N, the store never
    // holds more than N entries.
    #[test]
    fn prop_entry_bound_holds(
        max_entries in 1usize..8,
        policy in policy_strategy(),
        ops in prop::collection::vec(cache_op_strategy(), 1..80)
    ) {
        let clock = Arc::new(ManualClock::new(0));
        let mut store = CacheStore::new(max_entries, 0, TEST_DEFAULT_TTL, policy, clock.clone());

        for op in ops {
            apply(&mut store, &clock, op);
            prop_assert!(
                store.len() <= max_entries,
                "Cache size {} exceeds max {}",
                store.len(),
                max_entries
            );
        }
    }

    // With a byte budget larger than any single value, current bytes never
    // exceed the budget.
    #[test]
    fn prop_byte_bound_holds(
        max_bytes in 70usize..400,
        policy in policy_strategy(),
        ops in prop::collection::vec(cache_op_strategy(), 1..80)
    ) {
        let clock = Arc::new(ManualClock::new(0));
        let mut store = CacheStore::new(0, max_bytes, TEST_DEFAULT_TTL, policy, clock.clone());

        for op in ops {
            apply(&mut store, &clock, op);
            prop_assert!(
                store.current_bytes() <= max_bytes,
                "Cache bytes {} exceed budget {}",
                store.current_bytes(),
                max_bytes
            );
        }
    }

    // The byte counter always equals the sum of the stored entries' sizes.
    #[test]
    fn prop_byte_accounting_matches_entries(
        policy in policy_strategy(),
        ops in prop::collection::vec(cache_op_strategy(), 1..80)
    ) {
        let clock = Arc::new(ManualClock::new(0));
        let mut store = CacheStore::new(5, 200, TEST_DEFAULT_TTL, policy, clock.clone());

        for op in ops {
            apply(&mut store, &clock, op);
            prop_assert_eq!(store.current_bytes(), store.summed_entry_bytes());
            prop_assert_eq!(store.stats().bytes, store.current_bytes());
        }
    }

    // Expired entries are never served.
    #[test]
    fn prop_expired_entries_never_returned(
        key in valid_key_strategy(),
        value in valid_value_strategy(),
        ttl in 1u64..5,
        extra_millis in 0u64..5000
    ) {
        let clock = Arc::new(ManualClock::new(0));
        let mut store =
            CacheStore::new(10, 0, TEST_DEFAULT_TTL, EvictionPolicy::Lru, clock.clone());

        store.set(key.clone(), value.clone(), Some(ttl));
        prop_assert_eq!(store.get(&key), Some(value));

        clock.advance(Duration::from_millis(ttl * 1000 + extra_millis));
        prop_assert_eq!(store.get(&key), None);
    }

    // A key touched by `get` is never the next LRU victim.
    #[test]
    fn prop_lru_access_tracking(
        keys in prop::collection::hash_set(valid_key_strategy(), 3..8),
        new_key in valid_key_strategy(),
        new_value in valid_value_strategy()
    ) {
        let keys: Vec<String> = keys.into_iter().collect();
        prop_assume!(!keys.contains(&new_key));

        let clock = Arc::new(ManualClock::new(0));
        let mut store =
            CacheStore::new(keys.len(), 0, TEST_DEFAULT_TTL, EvictionPolicy::Lru, clock);
        for key in &keys {
            store.set(key.clone(), format!("value_{}", key), None);
        }

        let accessed_key = keys[0].clone();
        prop_assert!(store.get(&accessed_key).is_some());
        let expected_evicted = keys[1].clone();

        store.set(new_key.clone(), new_value, None);

        prop_assert!(store.contains(&accessed_key));
        prop_assert!(!store.contains(&expected_evicted));
        prop_assert!(store.contains(&new_key));
        prop_assert_eq!(store.len(), keys.len());
    }
}
