//! Configuration Module
//!
//! Typed configuration for the cache and the rate limiter, loaded from
//! defaults, environment variables or a JSON document.

use std::collections::BTreeMap;
use std::env;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::cache::EvictionPolicy;
use crate::error::{GovernorError, Result};
use crate::rate_limit::RateLimitProfile;

/// Bytes in one megabyte, as used by `max_size_mb`.
pub const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Smallest bucket capacity accepted: one call at unit cost must fit.
pub const MIN_BURST: f64 = 1.0;

// == Top-level Config ==
/// Complete governance configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub cache: CacheConfig,
    pub rate_limiting: RateLimitConfig,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_TTL_SECONDS` - Default entry TTL, 0 disables caching (default: 300)
    /// - `CACHE_MAX_ENTRIES` - Maximum cache entries, 0 = unlimited (default: 1000)
    /// - `CACHE_MAX_SIZE_MB` - Cache byte budget, 0 = unlimited (default: 100)
    /// - `CACHE_EVICTION_POLICY` - `lru`, `lfu` or `ttl` (default: lru)
    /// - `RATE_LIMIT_PROFILE` - Named profile to start from (default: none)
    /// - `RATE_LIMIT_ENABLED` - Overrides the profile's switch
    /// - `RATE_LIMIT_GLOBAL_CPS` - Overrides global calls per second
    /// - `RATE_LIMIT_GLOBAL_BURST` - Overrides global burst
    ///
    /// Unparsable values fall back to the default.
    pub fn from_env() -> Self {
        let cache_defaults = CacheConfig::default();
        let cache = CacheConfig {
            ttl_seconds: env_or("CACHE_TTL_SECONDS", cache_defaults.ttl_seconds),
            max_entries: env_or("CACHE_MAX_ENTRIES", cache_defaults.max_entries),
            max_size_mb: env_or("CACHE_MAX_SIZE_MB", cache_defaults.max_size_mb),
            eviction_policy: env_or("CACHE_EVICTION_POLICY", cache_defaults.eviction_policy),
        };

        let mut rate_limiting = env::var("RATE_LIMIT_PROFILE")
            .ok()
            .and_then(|name| name.parse::<RateLimitProfile>().ok())
            .map(|profile| profile.config())
            .unwrap_or_default();
        rate_limiting.enabled = env_or("RATE_LIMIT_ENABLED", rate_limiting.enabled);
        rate_limiting.global_calls_per_second =
            env_or("RATE_LIMIT_GLOBAL_CPS", rate_limiting.global_calls_per_second);
        rate_limiting.global_burst = env_or("RATE_LIMIT_GLOBAL_BURST", rate_limiting.global_burst);

        Self {
            cache,
            rate_limiting,
        }
    }

    /// Parses a JSON document. Missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(json)
            .map_err(|e| GovernorError::InvalidConfiguration(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks every section.
    pub fn validate(&self) -> Result<()> {
        self.cache.validate()?;
        self.rate_limiting.validate()
    }
}

// == Cache Config ==
/// Result cache settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Default TTL in seconds; 0 disables caching entirely
    pub ttl_seconds: u64,
    /// Maximum number of entries, 0 = unlimited
    pub max_entries: usize,
    /// Byte budget in megabytes, 0 = unlimited
    pub max_size_mb: f64,
    /// Victim selection when a bound is hit
    pub eviction_policy: EvictionPolicy,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_seconds: 300,
            max_entries: 1000,
            max_size_mb: 100.0,
            eviction_policy: EvictionPolicy::Lru,
        }
    }
}

impl CacheConfig {
    pub fn validate(&self) -> Result<()> {
        check_non_negative("cache.max_size_mb", self.max_size_mb)
    }

    /// Byte budget derived from `max_size_mb`, 0 = unlimited.
    ///
    /// Rounded up so a positive budget never collapses to unlimited.
    pub fn max_bytes(&self) -> usize {
        (self.max_size_mb * BYTES_PER_MB).ceil() as usize
    }
}

// == Rate Limit Config ==
/// Global and per-operation token bucket settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// When false every request is allowed and no bucket is touched
    pub enabled: bool,
    /// Refill rate of the global bucket
    pub global_calls_per_second: f64,
    /// Capacity of the global bucket
    pub global_burst: f64,
    /// Per-operation refill rates
    pub operation_limits: BTreeMap<String, f64>,
    /// Per-operation capacities; defaults to twice the operation's rate, at least 1
    pub operation_bursts: BTreeMap<String, f64>,
    /// Upper bound on a single sleep while waiting for tokens
    pub poll_interval_ms: u64,
    /// Upper bound on sleeps during one blocking acquire
    pub max_poll_iterations: u32,
    /// Capacity of the request history ring buffer
    pub history_size: usize,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            global_calls_per_second: 10.0,
            global_burst: 20.0,
            operation_limits: BTreeMap::new(),
            operation_bursts: BTreeMap::new(),
            poll_interval_ms: 100,
            max_poll_iterations: 1000,
            history_size: 1000,
        }
    }
}

impl RateLimitConfig {
    /// Starts from a named profile (`conservative`, `balanced`, `aggressive`, `development`).
    pub fn from_profile(name: &str) -> Result<Self> {
        Ok(name.parse::<RateLimitProfile>()?.config())
    }

    /// Adds or replaces a per-operation limit.
    pub fn with_operation_limit(
        mut self,
        operation: impl Into<String>,
        calls_per_second: f64,
        burst: Option<f64>,
    ) -> Self {
        let operation = operation.into();
        match burst {
            Some(burst) => {
                self.operation_bursts.insert(operation.clone(), burst);
            }
            None => {
                self.operation_bursts.remove(&operation);
            }
        }
        self.operation_limits.insert(operation, calls_per_second);
        self
    }

    /// Burst for a configured operation, [`default_burst`] when unspecified.
    pub fn burst_for(&self, operation: &str) -> Option<f64> {
        let rate = *self.operation_limits.get(operation)?;
        Some(
            self.operation_bursts
                .get(operation)
                .copied()
                .unwrap_or_else(|| default_burst(rate)),
        )
    }

    pub fn validate(&self) -> Result<()> {
        check_positive("rate_limiting.global_calls_per_second", self.global_calls_per_second)?;
        check_burst("rate_limiting.global_burst", self.global_burst)?;

        for (operation, rate) in &self.operation_limits {
            check_positive(&format!("rate_limiting.operation_limits.{operation}"), *rate)?;
        }
        for (operation, burst) in &self.operation_bursts {
            if !self.operation_limits.contains_key(operation) {
                return Err(GovernorError::InvalidConfiguration(format!(
                    "rate_limiting.operation_bursts.{operation} has no matching operation limit"
                )));
            }
            check_burst(&format!("rate_limiting.operation_bursts.{operation}"), *burst)?;
        }

        if self.poll_interval_ms == 0 {
            return Err(GovernorError::InvalidConfiguration(
                "rate_limiting.poll_interval_ms must be greater than 0".to_string(),
            ));
        }
        if self.history_size == 0 {
            return Err(GovernorError::InvalidConfiguration(
                "rate_limiting.history_size must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

// == Helpers ==
fn env_or<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Capacity used for an operation limit without an explicit burst: `2 × rate`,
/// raised to [`MIN_BURST`] for slow operations.
pub fn default_burst(calls_per_second: f64) -> f64 {
    (calls_per_second * 2.0).max(MIN_BURST)
}

/// A bucket that can never hold one unit of cost would throttle forever.
pub(crate) fn check_burst(field: &str, value: f64) -> Result<()> {
    check_non_negative(field, value)?;
    if value < MIN_BURST {
        return Err(GovernorError::InvalidConfiguration(format!(
            "{field} must be at least {MIN_BURST} (got {value})"
        )));
    }
    Ok(())
}

pub(crate) fn check_non_negative(field: &str, value: f64) -> Result<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(GovernorError::InvalidConfiguration(format!(
            "{field} must be a finite, non-negative number (got {value})"
        )));
    }
    Ok(())
}

pub(crate) fn check_positive(field: &str, value: f64) -> Result<()> {
    if !value.is_finite() || value <= 0.0 {
        return Err(GovernorError::InvalidConfiguration(format!(
            "{field} must be a finite, positive number (got {value})"
        )));
    }
    Ok(())
}
