//! Rate Limiter Statistics Module

use std::collections::BTreeMap;

use serde::Serialize;

use crate::rate_limit::BucketSnapshot;

// == Operation Counters ==
/// Request and throttle counts for one operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct OperationCounters {
    pub requests: u64,
    pub throttled: u64,
}

impl OperationCounters {
    pub fn record(&mut self, granted: bool) {
        self.requests += 1;
        if !granted {
            self.throttled += 1;
        }
    }
}

// == Rate Limiter Stats ==
/// Point-in-time view of the limiter.
#[derive(Debug, Clone, Serialize)]
pub struct RateLimiterStats {
    pub enabled: bool,
    pub global: BucketSnapshot,
    /// Buckets of operations with their own limit
    pub operations: BTreeMap<String, BucketSnapshot>,
    /// Per-operation counters; names past the tracking bound share `(other)`
    pub counters: BTreeMap<String, OperationCounters>,
    pub total_requests: u64,
    pub total_throttled: u64,
    /// Granted requests in the last 60 seconds
    pub requests_last_minute: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_counters() {
        let mut counters = OperationCounters::default();
        counters.record(true);
        counters.record(false);
        counters.record(true);

        assert_eq!(counters.requests, 3);
        assert_eq!(counters.throttled, 1);
    }
}
