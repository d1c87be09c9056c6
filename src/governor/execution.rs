//! Execution Governor
//!
//! Sequences rate limiting, cache lookup, delegated execution and cache
//! population for one request, and emits a telemetry record either way.

use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use tracing::debug;

use crate::cache::{CacheStats, CacheStore};
use crate::clock::Clock;
use crate::config::Config;
use crate::error::{GovernorError, Result};
use crate::governor::{ExecutionRecord, TelemetrySink};
use crate::rate_limit::{RateLimiter, RateLimiterStats};

/// Tokens charged per `run` call.
const RUN_COST: f64 = 1.0;

// == Run Outcome ==
/// Successful result of [`ExecutionGovernor::run`].
#[derive(Debug, Clone, PartialEq)]
pub struct RunOutcome<V> {
    pub value: V,
    /// True when the value came from the cache
    pub cached: bool,
    pub latency_ms: f64,
}

// == Execution Governor ==
/// Protects an expensive executor with a result cache and a rate limiter.
///
/// The cache lock and the limiter lock are never held at the same time, and
/// the executor always runs with both released. Concurrent misses on the same
/// key each call the executor; there is no in-flight deduplication.
pub struct ExecutionGovernor<V> {
    cache: Mutex<CacheStore<V>>,
    limiter: RateLimiter,
    clock: Arc<dyn Clock>,
    telemetry: Arc<dyn TelemetrySink>,
}

impl<V: Clone + Serialize> ExecutionGovernor<V> {
    pub fn new(
        cache: CacheStore<V>,
        limiter: RateLimiter,
        clock: Arc<dyn Clock>,
        telemetry: Arc<dyn TelemetrySink>,
    ) -> Self {
        Self {
            cache: Mutex::new(cache),
            limiter,
            clock,
            telemetry,
        }
    }

    /// Builds the cache and limiter from configuration sharing one clock.
    pub fn from_config(
        config: &Config,
        clock: Arc<dyn Clock>,
        telemetry: Arc<dyn TelemetrySink>,
    ) -> Result<Self> {
        let cache = CacheStore::from_config(&config.cache, clock.clone())?;
        let limiter = RateLimiter::new(&config.rate_limiting, clock.clone())?;
        Ok(Self::new(cache, limiter, clock, telemetry))
    }

    // == Run ==
    /// Executes `operation` for `key`, serving from the cache when possible.
    ///
    /// 1. Throttled requests fail with `RateLimitExceeded` without touching the cache.
    /// 2. A cache hit returns immediately.
    /// 3. Otherwise `execute` runs; its error is returned as `ExecutionFailure`
    ///    and nothing is cached.
    /// 4. A successful value is cached with `ttl` (None = default TTL).
    pub fn run<F, E>(
        &self,
        operation: &str,
        key: &str,
        ttl: Option<u64>,
        execute: F,
    ) -> Result<RunOutcome<V>>
    where
        F: FnOnce() -> std::result::Result<V, E>,
        E: Into<anyhow::Error>,
    {
        if !self.limiter.allow_request(operation, RUN_COST) {
            let retry_after = self.limiter.retry_after(operation, RUN_COST);
            let err = GovernorError::RateLimitExceeded {
                operation: operation.to_string(),
                retry_after,
            };
            self.emit(ExecutionRecord::failure(operation, err.category(), 0.0));
            return Err(err);
        }

        let start = self.clock.now_us();

        let hit = self.cache.lock().get(key);
        if let Some(value) = hit {
            let latency_ms = self.elapsed_ms(start);
            debug!(operation, key, "Cache hit");
            self.emit(ExecutionRecord::success(operation, true, latency_ms));
            return Ok(RunOutcome {
                value,
                cached: true,
                latency_ms,
            });
        }

        debug!(operation, key, "Cache miss, executing");
        let value = match execute() {
            Ok(value) => value,
            Err(source) => {
                let err = GovernorError::ExecutionFailure(source.into());
                self.emit(ExecutionRecord::failure(
                    operation,
                    err.category(),
                    self.elapsed_ms(start),
                ));
                return Err(err);
            }
        };

        self.cache.lock().set(key.to_string(), value.clone(), ttl);

        let latency_ms = self.elapsed_ms(start);
        self.emit(ExecutionRecord::success(operation, false, latency_ms));
        Ok(RunOutcome {
            value,
            cached: false,
            latency_ms,
        })
    }

    // == Maintenance ==
    /// Sweeps expired cache entries. Returns how many were removed.
    pub fn cleanup_expired(&self) -> usize {
        self.cache.lock().cleanup_expired()
    }

    pub fn clear_cache(&self) {
        self.cache.lock().clear();
    }

    /// Drops the cached result for `key`. Returns true if one existed.
    pub fn invalidate(&self, key: &str) -> bool {
        self.cache.lock().remove(key)
    }

    // == Stats ==
    pub fn cache_stats(&self) -> CacheStats {
        self.cache.lock().stats()
    }

    pub fn rate_limit_stats(&self) -> RateLimiterStats {
        self.limiter.stats()
    }

    pub fn rate_limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    /// Milliseconds since `start_us`, keeping sub-millisecond precision.
    fn elapsed_ms(&self, start_us: u64) -> f64 {
        self.clock.now_us().saturating_sub(start_us) as f64 / 1_000.0
    }

    fn emit(&self, record: ExecutionRecord) {
        self.telemetry.record(record);
    }
}

impl<V> std::fmt::Debug for ExecutionGovernor<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionGovernor")
            .field("cache", &*self.cache.lock())
            .field("limiter", &self.limiter)
            .finish()
    }
}
