//! Request History Module
//!
//! Bounded ring buffer of granted requests, kept for observability only.

use std::collections::VecDeque;

// == Request History ==
#[derive(Debug)]
pub struct RequestHistory {
    /// Oldest first
    records: VecDeque<(String, u64)>,
    capacity: usize,
}

impl RequestHistory {
    /// Creates an empty history holding at most `capacity` records.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            records: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Appends a record, dropping the oldest one when full.
    pub fn record(&mut self, operation: &str, timestamp_ms: u64) {
        if self.records.len() == self.capacity {
            self.records.pop_front();
        }
        self.records.push_back((operation.to_string(), timestamp_ms));
    }

    /// Number of records at or after `since_ms`.
    pub fn count_since(&self, since_ms: u64) -> usize {
        self.records
            .iter()
            .filter(|(_, ts)| *ts >= since_ms)
            .count()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }
}
