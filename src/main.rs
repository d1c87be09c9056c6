//! governor-check - validates governance settings from the environment
//!
//! Loads the configuration the way an embedding service would, builds a
//! governor from it and prints the effective settings with both stats
//! snapshots as JSON.

use std::sync::Arc;

use anyhow::Context;
use serde_json::json;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use resource_governor::governor::TracingSink;
use resource_governor::{Config, ExecutionGovernor, SystemClock};

fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "resource_governor=info,governor_check=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();
    config.validate().context("invalid governance configuration")?;
    info!(
        "Configuration loaded: ttl={}s, max_entries={}, max_size_mb={}, policy={}, rate_limiting={}",
        config.cache.ttl_seconds,
        config.cache.max_entries,
        config.cache.max_size_mb,
        config.cache.eviction_policy,
        config.rate_limiting.enabled
    );

    let clock = Arc::new(SystemClock::new());
    let governor: ExecutionGovernor<serde_json::Value> =
        ExecutionGovernor::from_config(&config, clock, Arc::new(TracingSink))
            .context("failed to build execution governor")?;

    let report = json!({
        "config": config,
        "cache": governor.cache_stats(),
        "rate_limiting": governor.rate_limit_stats(),
    });
    println!(
        "{}",
        serde_json::to_string_pretty(&report).context("failed to render report")?
    );

    Ok(())
}
