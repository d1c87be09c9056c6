//! Resource Governor - result caching and rate limiting for an expensive resource
//!
//! Provides a bounded multi-policy result cache and a hierarchical token-bucket
//! rate limiter, sequenced by an execution governor.

pub mod cache;
pub mod clock;
pub mod config;
pub mod error;
pub mod governor;
pub mod rate_limit;

pub use cache::{CacheStats, CacheStore, EvictionPolicy};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{CacheConfig, Config, RateLimitConfig};
pub use error::{GovernorError, Result};
pub use governor::{ExecutionGovernor, ExecutionRecord, RunOutcome, TelemetrySink};
pub use rate_limit::{Acquisition, RateLimitProfile, RateLimiter, RateLimiterStats};
