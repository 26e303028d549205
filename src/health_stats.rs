//! Health statistics for the exporter.
//!
//! Tracks aggregation pass performance and HTTP request counts for the
//! `/health` endpoint.

use std::collections::VecDeque;
use std::fmt::Write as FmtWrite;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, RwLock as StdRwLock};
use std::time::{Duration, Instant};

/// Running statistics for a single metric.
#[derive(Clone, Copy, Default)]
pub struct RunningStat {
    count: u64,
    sum: f64,
    min: f64,
    max: f64,
    last: f64,
}

impl RunningStat {
    pub fn add(&mut self, value: f64) {
        if self.count == 0 {
            *self = RunningStat {
                count: 1,
                sum: value,
                min: value,
                max: value,
                last: value,
            };
            return;
        }
        self.count += 1;
        self.sum += value;
        self.last = value;
        self.min = self.min.min(value);
        self.max = self.max.max(value);
    }

    pub fn avg(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum / (self.count as f64)
        }
    }
}

/// Snapshot of a [`Stat`].
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StatSnapshot {
    pub last: f64,
    pub avg: f64,
    pub max: f64,
    pub min: f64,
    pub count: u64,
}

/// Thread-safe wrapper for running statistics.
#[derive(Default)]
pub struct Stat {
    inner: Mutex<RunningStat>,
}

impl Stat {
    pub fn add_sample(&self, value: f64) {
        if let Ok(mut s) = self.inner.lock() {
            s.add(value);
        }
    }

    pub fn snapshot(&self) -> StatSnapshot {
        match self.inner.lock() {
            Ok(s) => StatSnapshot {
                last: s.last,
                avg: s.avg(),
                max: s.max,
                min: s.min,
                count: s.count,
            },
            Err(_) => StatSnapshot::default(),
        }
    }
}

/// Sliding window of HTTP request timestamps.
pub struct RequestTimestamps {
    inner: Mutex<VecDeque<Instant>>,
}

impl Default for RequestTimestamps {
    fn default() -> Self {
        Self {
            inner: Mutex::new(VecDeque::with_capacity(1024)),
        }
    }
}

impl RequestTimestamps {
    pub fn record(&self) {
        if let Ok(mut guard) = self.inner.lock() {
            let now = Instant::now();
            guard.push_back(now);
            // Keep only last 10 minutes of timestamps to avoid unbounded growth
            if let Some(cutoff) = now.checked_sub(Duration::from_secs(600)) {
                while guard.front().is_some_and(|&t| t < cutoff) {
                    guard.pop_front();
                }
            }
        }
    }

    pub fn count_last_minute(&self) -> u64 {
        let Ok(guard) = self.inner.lock() else {
            return 0;
        };
        match Instant::now().checked_sub(Duration::from_secs(60)) {
            Some(cutoff) => guard.iter().filter(|&&t| t >= cutoff).count() as u64,
            None => guard.len() as u64,
        }
    }
}

/// Exporter health statistics.
pub struct HealthStats {
    // Aggregation passes
    pub scanned_processes: Stat,
    pub matched_processes: Stat,
    pub groups: Stat,
    pub scrape_duration_seconds: Stat,
    pub total_scrapes: AtomicU64,
    pub scrape_errors: AtomicU64,

    // HTTP server stats
    pub http_request_timestamps: RequestTimestamps,
    pub metrics_endpoint_calls: AtomicU64,

    // Timing
    pub start_time: Instant,
    pub last_scrape_time: StdRwLock<Option<Instant>>,
}

impl Default for HealthStats {
    fn default() -> Self {
        Self {
            scanned_processes: Stat::default(),
            matched_processes: Stat::default(),
            groups: Stat::default(),
            scrape_duration_seconds: Stat::default(),
            total_scrapes: AtomicU64::new(0),
            scrape_errors: AtomicU64::new(0),
            http_request_timestamps: RequestTimestamps::default(),
            metrics_endpoint_calls: AtomicU64::new(0),
            start_time: Instant::now(),
            last_scrape_time: StdRwLock::new(None),
        }
    }
}

impl HealthStats {
    pub fn new() -> Self {
        Default::default()
    }

    /// Records the outcome of one aggregation pass. `scrape_errors` is the
    /// cumulative counter value after the pass.
    pub fn record_scrape(
        &self,
        scanned: usize,
        matched: usize,
        groups: usize,
        duration_seconds: f64,
        scrape_errors: u64,
    ) {
        self.scanned_processes.add_sample(scanned as f64);
        self.matched_processes.add_sample(matched as f64);
        self.groups.add_sample(groups as f64);
        self.scrape_duration_seconds.add_sample(duration_seconds);
        self.total_scrapes.fetch_add(1, Ordering::Relaxed);
        self.scrape_errors.store(scrape_errors, Ordering::Relaxed);
        if let Ok(mut guard) = self.last_scrape_time.write() {
            *guard = Some(Instant::now());
        }
    }

    pub fn record_http_request(&self) {
        self.http_request_timestamps.record();
    }

    pub fn record_metrics_endpoint_call(&self) {
        self.metrics_endpoint_calls.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get_uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Seconds since the last pass, or `None` before the first one.
    pub fn seconds_since_last_scrape(&self) -> Option<u64> {
        self.last_scrape_time
            .read()
            .ok()
            .and_then(|guard| guard.map(|t| t.elapsed().as_secs()))
    }

    pub fn render_table(&self) -> String {
        let left_col = 26usize;
        let col_w = 12usize;

        let mut out = String::new();

        writeln!(out, "HEALTH ENDPOINT - EXPORTER INTERNAL STATS").ok();
        writeln!(out, "==========================================").ok();
        writeln!(out).ok();

        // Header
        writeln!(
            out,
            "{:left$} | {:^col$} | {:^col$} | {:^col$} | {:^col$}",
            "",
            "current",
            "average",
            "max",
            "min",
            left = left_col,
            col = col_w
        )
        .ok();

        writeln!(out).ok();
        writeln!(out, "AGGREGATION PASSES").ok();
        writeln!(out, "------------------").ok();

        let rows: [(&str, StatSnapshot, usize); 4] = [
            ("scanned_processes", self.scanned_processes.snapshot(), 0),
            ("matched_processes", self.matched_processes.snapshot(), 0),
            ("groups", self.groups.snapshot(), 0),
            ("scrape_duration (s)", self.scrape_duration_seconds.snapshot(), 3),
        ];
        for (label, s, prec) in rows {
            writeln!(
                out,
                "{:left$} | {:^col$} | {:^col$} | {:^col$} | {:^col$}",
                label,
                format!("{:.prec$}", s.last),
                format!("{:.prec$}", s.avg, prec = prec.max(1)),
                format!("{:.prec$}", s.max),
                format!("{:.prec$}", s.min),
                left = left_col,
                col = col_w
            )
            .ok();
        }

        writeln!(out).ok();
        writeln!(out, "COUNTERS").ok();
        writeln!(out, "--------").ok();
        writeln!(
            out,
            "{:left$} | {}",
            "total_scrapes",
            self.total_scrapes.load(Ordering::Relaxed),
            left = left_col
        )
        .ok();
        writeln!(
            out,
            "{:left$} | {}",
            "scrape_errors",
            self.scrape_errors.load(Ordering::Relaxed),
            left = left_col
        )
        .ok();
        writeln!(
            out,
            "{:left$} | {}",
            "metrics_endpoint_calls",
            self.metrics_endpoint_calls.load(Ordering::Relaxed),
            left = left_col
        )
        .ok();
        writeln!(
            out,
            "{:left$} | {}",
            "http_requests_last_minute",
            self.http_request_timestamps.count_last_minute(),
            left = left_col
        )
        .ok();
        let last = match self.seconds_since_last_scrape() {
            Some(secs) => format!("{}s ago", secs),
            None => "N/A".to_string(),
        };
        writeln!(out, "{:left$} | {}", "last_scrape", last, left = left_col).ok();

        out
    }
}
