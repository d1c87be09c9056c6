//! Token Bucket Module
//!
//! Continuous-refill token bucket. Time is passed in explicitly so the bucket
//! never reads a clock itself.

use serde::Serialize;

// == Token Bucket ==
/// Token bucket state for one rate limit.
///
/// Tokens are replenished at `refill_rate` per second up to `capacity`.
/// Every read or consumption must be preceded by [`TokenBucket::refill`].
#[derive(Debug, Clone)]
pub struct TokenBucket {
    /// Maximum tokens (burst capacity)
    capacity: f64,
    /// Current number of available tokens, always in `[0, capacity]`
    tokens: f64,
    /// Tokens added per second
    refill_rate: f64,
    /// Timestamp of the last refill in milliseconds
    last_refill: u64,
}

impl TokenBucket {
    /// Creates a full bucket.
    pub fn new(capacity: f64, refill_rate: f64, now_ms: u64) -> Self {
        let capacity = capacity.max(0.0);
        Self {
            capacity,
            tokens: capacity,
            refill_rate,
            last_refill: now_ms,
        }
    }

    // == Refill ==
    /// Adds the tokens earned since the last refill, capped at capacity.
    ///
    /// A clock reading older than `last_refill` adds nothing.
    pub fn refill(&mut self, now_ms: u64) {
        let elapsed_ms = now_ms.saturating_sub(self.last_refill);
        if elapsed_ms > 0 && self.refill_rate > 0.0 {
            let earned = elapsed_ms as f64 / 1000.0 * self.refill_rate;
            self.tokens = (self.tokens + earned).min(self.capacity);
        }
        self.last_refill = self.last_refill.max(now_ms);
    }

    /// True if at least `cost` tokens are available.
    pub fn has(&self, cost: f64) -> bool {
        self.tokens >= cost
    }

    /// Removes `cost` tokens. Callers check [`TokenBucket::has`] first.
    pub fn consume(&mut self, cost: f64) {
        self.tokens = (self.tokens - cost).clamp(0.0, self.capacity);
    }

    // == Wait Time ==
    /// Seconds until `cost` tokens are available, 0.0 if they already are.
    ///
    /// Infinite when the bucket never refills or `cost` exceeds its capacity.
    pub fn wait_time(&self, cost: f64) -> f64 {
        let deficit = cost - self.tokens;
        if deficit <= 0.0 {
            0.0
        } else if cost > self.capacity {
            f64::INFINITY
        } else if self.refill_rate > 0.0 {
            deficit / self.refill_rate
        } else {
            f64::INFINITY
        }
    }

    /// Refills to capacity.
    pub fn reset(&mut self, now_ms: u64) {
        self.tokens = self.capacity;
        self.last_refill = now_ms;
    }

    pub fn tokens(&self) -> f64 {
        self.tokens
    }

    pub fn capacity(&self) -> f64 {
        self.capacity
    }

    pub fn refill_rate(&self) -> f64 {
        self.refill_rate
    }

    pub fn snapshot(&self) -> BucketSnapshot {
        BucketSnapshot {
            tokens: self.tokens,
            capacity: self.capacity,
            refill_rate: self.refill_rate,
        }
    }
}

// == Bucket Snapshot ==
/// Token level of a bucket at the time stats were taken.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BucketSnapshot {
    pub tokens: f64,
    pub capacity: f64,
    pub refill_rate: f64,
}
