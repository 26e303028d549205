//! Prometheus metrics definitions for procgroup-exporter.
//!
//! Group series are labelled by `account` and `groupname` and are rewritten
//! from scratch on every scrape, so groups that disappeared do not linger.

use prometheus::{Counter, CounterVec, Gauge, GaugeVec, Opts, Registry};

use crate::process::ScrapeResult;

const GROUP_LABELS: &[&str] = &["account", "groupname"];

/// Collection of per-group Prometheus metrics.
#[derive(Clone)]
pub struct ProcMetrics {
    pub cpu_seconds_total: CounterVec,     // labels: account, groupname, mode
    pub memory_bytes: GaugeVec,            // labels: account, groupname, memtype
    pub num_procs: GaugeVec,               // labels: account, groupname
    pub num_threads: GaugeVec,             // labels: account, groupname
    pub oldest_start_time_seconds: GaugeVec, // labels: account, groupname
    pub scrape_errors: Counter,

    // ========== Exporter self metrics ==========
    pub scrape_duration_seconds: Gauge,
    pub processes_matched: Gauge,
}

impl ProcMetrics {
    /// Creates and registers all Prometheus metrics with the registry.
    pub fn new(registry: &Registry) -> Result<Self, prometheus::Error> {
        let cpu_seconds_total = CounterVec::new(
            Opts::new("proc_cpu_seconds_total", "Total CPU time spent in seconds."),
            &["account", "groupname", "mode"],
        )?;
        let memory_bytes = GaugeVec::new(
            Opts::new("proc_memory_bytes", "Used amount of memory in bytes."),
            &["account", "groupname", "memtype"],
        )?;
        let num_procs = GaugeVec::new(
            Opts::new("proc_num_procs", "Number of processes."),
            GROUP_LABELS,
        )?;
        let num_threads = GaugeVec::new(
            Opts::new("proc_num_threads", "Number of threads."),
            GROUP_LABELS,
        )?;
        let oldest_start_time_seconds = GaugeVec::new(
            Opts::new(
                "proc_oldest_start_time_seconds",
                "Oldest process start time in seconds since epoch.",
            ),
            GROUP_LABELS,
        )?;
        let scrape_errors = Counter::new(
            "proc_scrape_errors",
            "Errors collecting proc metrics since exporter start.",
        )?;
        let scrape_duration_seconds = Gauge::new(
            "proc_exporter_scrape_duration_seconds",
            "Time spent in the last aggregation pass",
        )?;
        let processes_matched = Gauge::new(
            "proc_exporter_processes_matched",
            "Number of processes matched by a rule in the last aggregation pass",
        )?;

        registry.register(Box::new(cpu_seconds_total.clone()))?;
        registry.register(Box::new(memory_bytes.clone()))?;
        registry.register(Box::new(num_procs.clone()))?;
        registry.register(Box::new(num_threads.clone()))?;
        registry.register(Box::new(oldest_start_time_seconds.clone()))?;
        registry.register(Box::new(scrape_errors.clone()))?;
        registry.register(Box::new(scrape_duration_seconds.clone()))?;
        registry.register(Box::new(processes_matched.clone()))?;

        Ok(Self {
            cpu_seconds_total,
            memory_bytes,
            num_procs,
            num_threads,
            oldest_start_time_seconds,
            scrape_errors,
            scrape_duration_seconds,
            processes_matched,
        })
    }

    /// Drops all group series.
    pub fn reset_group_metrics(&self) {
        self.cpu_seconds_total.reset();
        self.memory_bytes.reset();
        self.num_procs.reset();
        self.num_threads.reset();
        self.oldest_start_time_seconds.reset();
    }

    /// Replaces the group series with the result of one pass.
    pub fn record(&self, result: &ScrapeResult) {
        self.reset_group_metrics();

        for g in result.groups.values() {
            let (account, name) = (g.account.as_str(), g.name.as_str());

            // Counters carry the cumulative value read from /proc,
            // so they are rebuilt from zero each time.
            self.cpu_seconds_total
                .with_label_values(&[account, name, "system"])
                .inc_by(g.cpu_system_seconds);
            self.cpu_seconds_total
                .with_label_values(&[account, name, "user"])
                .inc_by(g.cpu_user_seconds);

            self.memory_bytes
                .with_label_values(&[account, name, "virtual"])
                .set(g.virtual_memory_bytes as f64);
            self.memory_bytes
                .with_label_values(&[account, name, "resident"])
                .set(g.resident_memory_bytes as f64);
            self.num_procs
                .with_label_values(&[account, name])
                .set(g.process_count as f64);
            self.num_threads
                .with_label_values(&[account, name])
                .set(g.thread_count as f64);
            self.oldest_start_time_seconds
                .with_label_values(&[account, name])
                .set(g.oldest_start_time_seconds);
        }

        self.scrape_errors.reset();
        self.scrape_errors.inc_by(result.scrape_errors as f64);
        self.processes_matched.set(result.matched as f64);
    }
}
