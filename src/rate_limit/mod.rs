//! Rate Limit Module
//!
//! Hierarchical token bucket limiting: a global bucket every request pays
//! into, plus optional per-operation buckets.

mod bucket;
mod history;
mod limiter;
mod profiles;
mod stats;


// Re-export public types
pub use bucket::{BucketSnapshot, TokenBucket};
pub use history::RequestHistory;
pub use limiter::{Acquisition, RateLimiter, MAX_TRACKED_OPERATIONS, OVERFLOW_OPERATION};
pub use profiles::RateLimitProfile;
pub use stats::{OperationCounters, RateLimiterStats};
