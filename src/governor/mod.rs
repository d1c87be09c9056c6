//! Governor Module
//!
//! End-to-end orchestration of a governed call: rate limit, cache lookup,
//! delegated execution, cache population and telemetry.

mod execution;
mod telemetry;

pub use execution::{ExecutionGovernor, RunOutcome};
pub use telemetry::{
    ExecutionRecord, MemorySink, NoopSink, TelemetrySink, TelemetrySummary, TracingSink,
};
