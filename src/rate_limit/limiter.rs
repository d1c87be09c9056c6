//! Hierarchical Rate Limiter
//!
//! One global token bucket plus optional per-operation buckets. A request must
//! fit in both before either is charged.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::clock::Clock;
use crate::config::{check_burst, check_positive, default_burst, RateLimitConfig};
use crate::error::Result;
use crate::rate_limit::{OperationCounters, RateLimiterStats, RequestHistory, TokenBucket};

/// Window used for the rolling request count in stats.
const ROLLING_WINDOW_MS: u64 = 60_000;

/// Upper bound on operations with their own counters.
pub const MAX_TRACKED_OPERATIONS: usize = 1024;

/// Counter key shared by operations seen after the bound is reached.
pub const OVERFLOW_OPERATION: &str = "(other)";

// == Acquisition ==
/// Outcome of a token request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Acquisition {
    /// Tokens were deducted from every relevant bucket
    Granted,
    /// Nothing was deducted
    Denied {
        /// Estimated seconds until the request would fit
        retry_after: f64,
    },
}

impl Acquisition {
    pub fn is_granted(&self) -> bool {
        matches!(self, Acquisition::Granted)
    }

    pub fn retry_after(&self) -> Option<f64> {
        match self {
            Acquisition::Granted => None,
            Acquisition::Denied { retry_after } => Some(*retry_after),
        }
    }
}

#[derive(Debug)]
struct LimiterState {
    global: TokenBucket,
    operations: HashMap<String, TokenBucket>,
    counters: HashMap<String, OperationCounters>,
    history: RequestHistory,
}

// == Rate Limiter ==
/// Thread-safe hierarchical token bucket limiter.
///
/// All bucket state sits behind one lock that is only held for in-memory
/// bookkeeping; blocking waits sleep with the lock released.
pub struct RateLimiter {
    enabled: bool,
    poll_interval_ms: u64,
    max_poll_iterations: u32,
    clock: Arc<dyn Clock>,
    state: Mutex<LimiterState>,
}

impl RateLimiter {
    /// Builds a limiter from validated configuration. Every bucket starts full.
    pub fn new(config: &RateLimitConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        config.validate()?;
        let now = clock.now_ms();

        let operations = config
            .operation_limits
            .iter()
            .map(|(name, rate)| {
                let burst = config
                    .burst_for(name)
                    .unwrap_or_else(|| default_burst(*rate));
                (name.clone(), TokenBucket::new(burst, *rate, now))
            })
            .collect();

        let state = LimiterState {
            global: TokenBucket::new(config.global_burst, config.global_calls_per_second, now),
            operations,
            counters: HashMap::new(),
            history: RequestHistory::new(config.history_size),
        };

        Ok(Self {
            enabled: config.enabled,
            poll_interval_ms: config.poll_interval_ms,
            max_poll_iterations: config.max_poll_iterations,
            clock,
            state: Mutex::new(state),
        })
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    // == Acquire ==
    /// Requests `cost` tokens for `operation`.
    ///
    /// With `wait_timeout` of None or zero the call never blocks. Otherwise it
    /// re-polls, sleeping at most `poll_interval_ms` at a time and never past
    /// the estimated wait, until the tokens fit, the timeout elapses or
    /// `max_poll_iterations` sleeps have been spent.
    pub fn acquire(
        &self,
        operation: &str,
        cost: f64,
        wait_timeout: Option<Duration>,
    ) -> Acquisition {
        if !self.enabled {
            return Acquisition::Granted;
        }
        let cost = sanitize_cost(cost);

        let start = self.clock.now_ms();
        let deadline =
            wait_timeout.map(|timeout| start.saturating_add(timeout.as_millis() as u64));
        let mut polls = 0u32;

        loop {
            let retry_after = match self.try_take(operation, cost) {
                Ok(()) => return Acquisition::Granted,
                Err(retry_after) => retry_after,
            };

            let now = self.clock.now_ms();
            let keep_waiting = match deadline {
                // An infinite estimate means the cost exceeds a bucket's capacity
                Some(deadline) => {
                    retry_after.is_finite()
                        && now < deadline
                        && polls < self.max_poll_iterations
                }
                None => false,
            };

            if !keep_waiting {
                self.record_throttle(operation);
                if polls > 0 {
                    warn!(
                        operation,
                        cost,
                        retry_after,
                        waited_ms = now.saturating_sub(start),
                        "Timed out waiting for rate limit tokens"
                    );
                } else {
                    debug!(operation, cost, retry_after, "Request throttled");
                }
                return Acquisition::Denied { retry_after };
            }

            let remaining_ms = deadline.map_or(0, |deadline| deadline - now);
            self.clock.sleep(self.poll_delay(retry_after, remaining_ms));
            polls += 1;
        }
    }

    // == Allow Request ==
    /// Non-blocking check-and-take. Always true when limiting is disabled.
    pub fn allow_request(&self, operation: &str, cost: f64) -> bool {
        self.acquire(operation, cost, Some(Duration::ZERO)).is_granted()
    }

    // == Retry After ==
    /// Seconds until `cost` tokens would fit for `operation`, without taking any.
    pub fn retry_after(&self, operation: &str, cost: f64) -> f64 {
        if !self.enabled {
            return 0.0;
        }
        let cost = sanitize_cost(cost);
        let now = self.clock.now_ms();

        let mut state = self.state.lock();
        let LimiterState {
            global, operations, ..
        } = &mut *state;

        global.refill(now);
        let operation_wait = match operations.get_mut(operation) {
            Some(bucket) => {
                bucket.refill(now);
                bucket.wait_time(cost)
            }
            None => 0.0,
        };
        global.wait_time(cost).max(operation_wait).max(0.0)
    }

    // == Operation Limits ==
    /// Registers or replaces the bucket for `operation`. The new bucket starts full.
    pub fn set_operation_limit(
        &self,
        operation: &str,
        calls_per_second: f64,
        burst: Option<f64>,
    ) -> Result<()> {
        let field = format!("operation_limits.{operation}");
        check_positive(&field, calls_per_second)?;
        let burst = burst.unwrap_or_else(|| default_burst(calls_per_second));
        check_burst(&field, burst)?;

        let now = self.clock.now_ms();
        self.state.lock().operations.insert(
            operation.to_string(),
            TokenBucket::new(burst, calls_per_second, now),
        );
        debug!(operation, calls_per_second, burst, "Operation rate limit set");
        Ok(())
    }

    /// Drops the bucket for `operation`; it is then governed by the global bucket only.
    pub fn remove_operation_limit(&self, operation: &str) -> bool {
        self.state.lock().operations.remove(operation).is_some()
    }

    // == Reset ==
    /// Refills every bucket and clears counters and history.
    pub fn reset(&self) {
        let now = self.clock.now_ms();
        let mut state = self.state.lock();
        state.global.reset(now);
        for bucket in state.operations.values_mut() {
            bucket.reset(now);
        }
        state.counters.clear();
        state.history.clear();
    }

    // == Stats ==
    pub fn stats(&self) -> RateLimiterStats {
        let now = self.clock.now_ms();
        let mut state = self.state.lock();

        state.global.refill(now);
        for bucket in state.operations.values_mut() {
            bucket.refill(now);
        }

        let counters: BTreeMap<String, OperationCounters> = state
            .counters
            .iter()
            .map(|(name, counters)| (name.clone(), *counters))
            .collect();

        RateLimiterStats {
            enabled: self.enabled,
            global: state.global.snapshot(),
            operations: state
                .operations
                .iter()
                .map(|(name, bucket)| (name.clone(), bucket.snapshot()))
                .collect(),
            total_requests: counters.values().map(|c| c.requests).sum(),
            total_throttled: counters.values().map(|c| c.throttled).sum(),
            counters,
            requests_last_minute: state
                .history
                .count_since(now.saturating_sub(ROLLING_WINDOW_MS)),
        }
    }

    // == Internals ==
    /// Refills both buckets and charges them only if both can pay.
    ///
    /// Returns the larger of the two waits when either is short.
    fn try_take(&self, operation: &str, cost: f64) -> std::result::Result<(), f64> {
        let now = self.clock.now_ms();
        let mut state = self.state.lock();
        let LimiterState {
            global,
            operations,
            counters,
            history,
        } = &mut *state;

        global.refill(now);
        let mut operation_bucket = operations.get_mut(operation);
        if let Some(bucket) = operation_bucket.as_mut() {
            bucket.refill(now);
        }

        let operation_ok = operation_bucket.as_ref().map_or(true, |bucket| bucket.has(cost));
        if !(global.has(cost) && operation_ok) {
            let operation_wait = operation_bucket.map_or(0.0, |bucket| bucket.wait_time(cost));
            return Err(global.wait_time(cost).max(operation_wait));
        }

        global.consume(cost);
        if let Some(bucket) = operation_bucket {
            bucket.consume(cost);
        }
        counters_for(counters, operation).record(true);
        history.record(operation, now);
        Ok(())
    }

    fn record_throttle(&self, operation: &str) {
        let mut state = self.state.lock();
        counters_for(&mut state.counters, operation).record(false);
    }

    /// Next sleep: bounded by the estimate, the poll cap and the time left, at least 1ms.
    fn poll_delay(&self, retry_after: f64, remaining_ms: u64) -> Duration {
        let estimate_ms = if retry_after.is_finite() {
            (retry_after * 1000.0).ceil() as u64
        } else {
            u64::MAX
        };
        let delay_ms = estimate_ms
            .min(self.poll_interval_ms)
            .min(remaining_ms)
            .max(1);
        Duration::from_millis(delay_ms)
    }
}

/// Counters for `operation`. Caller-supplied names are unbounded, so once
/// [`MAX_TRACKED_OPERATIONS`] are tracked new names share [`OVERFLOW_OPERATION`].
fn counters_for<'a>(
    counters: &'a mut HashMap<String, OperationCounters>,
    operation: &str,
) -> &'a mut OperationCounters {
    let key = if counters.contains_key(operation) || counters.len() < MAX_TRACKED_OPERATIONS {
        operation
    } else {
        OVERFLOW_OPERATION
    };
    counters.entry(key.to_string()).or_default()
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("enabled", &self.enabled)
            .field("poll_interval_ms", &self.poll_interval_ms)
            .field("max_poll_iterations", &self.max_poll_iterations)
            .field("state", &*self.state.lock())
            .finish()
    }
}

/// Negative costs would mint tokens; NaN can never be satisfied.
fn sanitize_cost(cost: f64) -> f64 {
    if cost.is_nan() {
        f64::INFINITY
    } else {
        cost.max(0.0)
    }
}
