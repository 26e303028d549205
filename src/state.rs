//! Application state management for the exporter.
//!
//! This module defines the shared application state that is passed
//! to HTTP handlers.

use procgroup_exporter::process::{
    Aggregator, ProcfsSource, RuleSet, ScrapeErrors, SystemAccounts,
};
use procgroup_exporter::ProcMetrics;
use prometheus::Registry;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;

use crate::config::Config;
use crate::health_stats::HealthStats;

/// Aggregator over the live process table.
pub type ProcAggregator = Aggregator<ProcfsSource, SystemAccounts, RuleSet>;

/// Type alias for shared application state.
pub type SharedState = Arc<AppState>;

/// Global application state shared across requests.
pub struct AppState {
    pub registry: Registry,
    pub metrics: ProcMetrics,
    pub aggregator: Arc<ProcAggregator>,
    /// Serializes passes so concurrent scrapes do not interleave their
    /// reset and record of the group series.
    pub scrape_lock: Mutex<()>,
    pub config: Arc<Config>,
    pub health_stats: Arc<HealthStats>,
    /// Server start time for uptime calculation.
    pub start_time: Instant,
}

impl AppState {
    /// Builds the state and registers all metrics with a fresh registry.
    pub fn new(config: Config, rules: RuleSet) -> Result<Self, prometheus::Error> {
        let registry = Registry::new();
        let metrics = ProcMetrics::new(&registry)?;
        let aggregator = Aggregator::new(
            ProcfsSource::new(config.procfs_path()),
            SystemAccounts,
            rules,
            config.clock_ticks(),
            Arc::new(ScrapeErrors::new()),
        );

        Ok(Self {
            registry,
            metrics,
            aggregator: Arc::new(aggregator),
            scrape_lock: Mutex::new(()),
            config: Arc::new(config),
            health_stats: Arc::new(HealthStats::new()),
            start_time: Instant::now(),
        })
    }
}
