//! Execution Telemetry
//!
//! Write-once records of every governed call and the sinks that consume them.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{info, warn};

// == Execution Record ==
/// Outcome of one `run` call. Immutable once emitted.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionRecord {
    pub operation: String,
    pub success: bool,
    /// Served from the cache without calling the executor
    pub cached: bool,
    pub latency_ms: f64,
    /// `rate_limited` or `execution_failure` on failure
    pub error_category: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl ExecutionRecord {
    pub fn success(operation: &str, cached: bool, latency_ms: f64) -> Self {
        Self {
            operation: operation.to_string(),
            success: true,
            cached,
            latency_ms,
            error_category: None,
            timestamp: Utc::now(),
        }
    }

    pub fn failure(operation: &str, category: &str, latency_ms: f64) -> Self {
        Self {
            operation: operation.to_string(),
            success: false,
            cached: false,
            latency_ms,
            error_category: Some(category.to_string()),
            timestamp: Utc::now(),
        }
    }
}

// == Telemetry Sink ==
/// Consumer of execution records. Takes ownership of each record.
pub trait TelemetrySink: Send + Sync {
    fn record(&self, record: ExecutionRecord);
}

/// Discards every record.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl TelemetrySink for NoopSink {
    fn record(&self, _record: ExecutionRecord) {}
}

/// Emits each record as a structured `tracing` event.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl TelemetrySink for TracingSink {
    fn record(&self, record: ExecutionRecord) {
        if record.success {
            info!(
                operation = %record.operation,
                cached = record.cached,
                latency_ms = record.latency_ms,
                "Execution completed"
            );
        } else {
            warn!(
                operation = %record.operation,
                error_category = record.error_category.as_deref().unwrap_or("unknown"),
                latency_ms = record.latency_ms,
                "Execution failed"
            );
        }
    }
}

// == Memory Sink ==
/// Keeps the most recent records in memory.
#[derive(Debug)]
pub struct MemorySink {
    records: Mutex<VecDeque<ExecutionRecord>>,
    capacity: usize,
}

impl MemorySink {
    /// Creates a sink holding at most `capacity` records (at least one).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            records: Mutex::new(VecDeque::with_capacity(capacity.min(1024))),
            capacity,
        }
    }

    /// Copies of the retained records, oldest first.
    pub fn records(&self) -> Vec<ExecutionRecord> {
        self.records.lock().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }

    pub fn clear(&self) {
        self.records.lock().clear();
    }

    // == Summary ==
    /// Aggregates the retained records.
    pub fn summary(&self) -> TelemetrySummary {
        let records = self.records.lock();
        let mut summary = TelemetrySummary::default();
        let mut latency_total = 0.0;

        for record in records.iter() {
            summary.total += 1;
            latency_total += record.latency_ms;
            if record.success {
                summary.successes += 1;
            } else {
                summary.failures += 1;
            }
            if record.cached {
                summary.cached += 1;
            }
            if record.error_category.as_deref() == Some("rate_limited") {
                summary.throttled += 1;
            }
        }

        if summary.total > 0 {
            summary.mean_latency_ms = latency_total / summary.total as f64;
        }
        summary
    }
}

impl Default for MemorySink {
    fn default() -> Self {
        Self::new(1000)
    }
}

impl TelemetrySink for MemorySink {
    fn record(&self, record: ExecutionRecord) {
        let mut records = self.records.lock();
        if records.len() == self.capacity {
            records.pop_front();
        }
        records.push_back(record);
    }
}

/// Totals over a [`MemorySink`]'s records.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TelemetrySummary {
    pub total: u64,
    pub successes: u64,
    pub failures: u64,
    pub cached: u64,
    pub throttled: u64,
    pub mean_latency_ms: f64,
}
