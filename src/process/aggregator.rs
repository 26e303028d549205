//! The per-scrape aggregation pass.
//!
//! One pass walks the process table once, classifies each process with the
//! configured [`MatchNamer`], and folds its metrics into per-(account, group)
//! accumulators. Read failures are counted in [`ScrapeErrors`] and never
//! abort the pass, except a failure to list the table at all.

use ahash::AHashMap as HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use crate::process::account::AccountResolver;
use crate::process::classifier::MatchNamer;
use crate::process::matcher::ProcessIdentity;
use crate::process::scanner::{ProcHandle, ProcSource};

/// Bucket key for group accumulators.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupKey {
    pub account: String,
    pub group_name: String,
}

/// Metrics folded from all processes of one group during a pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GroupAccumulator {
    pub name: String,
    pub account: String,
    pub cpu_system_seconds: f64,
    pub cpu_user_seconds: f64,
    pub virtual_memory_bytes: u64,
    pub resident_memory_bytes: u64,
    pub process_count: u64,
    pub thread_count: u64,
    /// Seconds since epoch; 0 until the first process is folded in.
    pub oldest_start_time_seconds: f64,
}

/// Derived metrics of a single process.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ProcessSample {
    pub cpu_system_seconds: f64,
    pub cpu_user_seconds: f64,
    pub virtual_memory_bytes: u64,
    pub resident_memory_bytes: u64,
    pub thread_count: u64,
    pub start_time_seconds: f64,
}

impl GroupAccumulator {
    fn new(key: &GroupKey) -> Self {
        Self {
            name: key.group_name.clone(),
            account: key.account.clone(),
            ..Default::default()
        }
    }

    /// Adds one process to the group.
    pub fn fold(&mut self, sample: &ProcessSample) {
        self.cpu_system_seconds += sample.cpu_system_seconds;
        self.cpu_user_seconds += sample.cpu_user_seconds;
        self.virtual_memory_bytes += sample.virtual_memory_bytes;
        self.resident_memory_bytes += sample.resident_memory_bytes;
        self.thread_count += sample.thread_count;
        // The first process sets the start time even when it computes to 0.
        if self.process_count == 0 || sample.start_time_seconds < self.oldest_start_time_seconds {
            self.oldest_start_time_seconds = sample.start_time_seconds;
        }
        self.process_count += 1;
    }
}

/// Process-wide scrape error counter. Accumulates for the exporter's
/// lifetime and is never reset.
#[derive(Debug, Default)]
pub struct ScrapeErrors(AtomicU64);

impl ScrapeErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// Outcome of one aggregation pass.
#[derive(Debug, Clone, Default)]
pub struct ScrapeResult {
    pub groups: HashMap<GroupKey, GroupAccumulator>,
    /// Cumulative error count after this pass.
    pub scrape_errors: u64,
    /// Processes whose stat and cmdline were read.
    pub scanned: usize,
    /// Processes that matched a rule.
    pub matched: usize,
}

impl ScrapeResult {
    /// Groups ordered by account, then name.
    pub fn sorted_groups(&self) -> Vec<&GroupAccumulator> {
        let mut groups: Vec<_> = self.groups.iter().collect();
        groups.sort_by(|a, b| a.0.cmp(b.0));
        groups.into_iter().map(|(_, g)| g).collect()
    }

    pub fn group(&self, account: &str, group_name: &str) -> Option<&GroupAccumulator> {
        self.groups.get(&GroupKey {
            account: account.to_string(),
            group_name: group_name.to_string(),
        })
    }
}

/// Runs aggregation passes over a process source.
pub struct Aggregator<S, A, N> {
    source: S,
    accounts: A,
    namer: N,
    clk_tck: f64,
    errors: Arc<ScrapeErrors>,
}

impl<S, A, N> Aggregator<S, A, N>
where
    S: ProcSource,
    A: AccountResolver,
    N: MatchNamer,
{
    pub fn new(source: S, accounts: A, namer: N, clk_tck: u64, errors: Arc<ScrapeErrors>) -> Self {
        Self {
            source,
            accounts,
            namer,
            clk_tck: clk_tck.max(1) as f64,
            errors,
        }
    }

    pub fn errors(&self) -> &Arc<ScrapeErrors> {
        &self.errors
    }

    pub fn namer(&self) -> &N {
        &self.namer
    }

    /// Runs one full pass over the process table.
    #[instrument(skip(self))]
    pub fn read_proc_groups(&self) -> ScrapeResult {
        let procs = match self.source.all_procs() {
            Ok(procs) => procs,
            Err(e) => {
                warn!("Failed to list processes: {}", e);
                self.errors.increment();
                return ScrapeResult {
                    scrape_errors: self.errors.get(),
                    ..Default::default()
                };
            }
        };

        // Start times are skewed by the boot time offset when this fails.
        let boot_time = match self.source.boot_time() {
            Ok(t) => t as f64,
            Err(e) => {
                warn!("Failed to read boot time: {}", e);
                self.errors.increment();
                0.0
            }
        };

        let mut result = ScrapeResult::default();
        for proc in procs {
            let Some((key, sample)) = self.read_process(proc, boot_time, &mut result) else {
                continue;
            };
            result
                .groups
                .entry(key)
                .or_insert_with_key(GroupAccumulator::new)
                .fold(&sample);
        }

        result.scrape_errors = self.errors.get();
        debug!(
            "Aggregation pass: {} scanned, {} matched, {} groups",
            result.scanned,
            result.matched,
            result.groups.len()
        );
        result
    }

    /// Reads, classifies and samples one process. `None` when it was skipped.
    fn read_process(
        &self,
        proc: ProcHandle,
        boot_time: f64,
        result: &mut ScrapeResult,
    ) -> Option<(GroupKey, ProcessSample)> {
        let stat = match self.source.stat(proc) {
            Ok(stat) => stat,
            Err(e) => {
                debug!("Skipping process {}: {}", proc.pid, e);
                self.errors.increment();
                return None;
            }
        };
        let cmdline = match self.source.cmdline(proc) {
            Ok(cmdline) => cmdline,
            Err(e) => {
                debug!("Skipping process {}: {}", proc.pid, e);
                self.errors.increment();
                return None;
            }
        };
        result.scanned += 1;

        let identity = ProcessIdentity::new(stat.comm.clone(), cmdline);
        let group_name = self.namer.match_and_name(&identity)?;
        result.matched += 1;

        let account = self.resolve_account(proc);

        let sample = ProcessSample {
            cpu_system_seconds: stat.stime as f64 / self.clk_tck,
            cpu_user_seconds: stat.utime as f64 / self.clk_tck,
            virtual_memory_bytes: stat.virtual_bytes(),
            resident_memory_bytes: stat.resident_bytes(),
            thread_count: stat.num_threads,
            start_time_seconds: boot_time + stat.starttime as f64 / self.clk_tck,
        };

        Some((GroupKey { account, group_name }, sample))
    }

    /// Owner account name, or the empty string when it cannot be resolved.
    fn resolve_account(&self, proc: ProcHandle) -> String {
        let uid = match self.source.owner_uid(proc) {
            Ok(uid) => uid,
            Err(e) => {
                debug!("Owner lookup failed for process {}: {}", proc.pid, e);
                self.errors.increment();
                return String::new();
            }
        };
        match self.accounts.account_name(uid) {
            Ok(name) => name,
            Err(e) => {
                debug!("Account lookup failed for process {}: {}", proc.pid, e);
                self.errors.increment();
                String::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(start: f64) -> ProcessSample {
        ProcessSample {
            cpu_system_seconds: 1.5,
            cpu_user_seconds: 2.0,
            virtual_memory_bytes: 100,
            resident_memory_bytes: 10,
            thread_count: 3,
            start_time_seconds: start,
        }
    }

    fn key() -> GroupKey {
        GroupKey {
            account: "alice".into(),
            group_name: "foo".into(),
        }
    }

    // -------------------------------------------------------------------------
    // GroupAccumulator
    // -------------------------------------------------------------------------

    #[test]
    fn test_fold_sums_and_counts() {
        let mut g = GroupAccumulator::new(&key());
        g.fold(&sample(50.0));
        g.fold(&sample(40.0));

        assert_eq!(g.name, "foo");
        assert_eq!(g.account, "alice");
        assert_eq!(g.process_count, 2);
        assert_eq!(g.thread_count, 6);
        assert_eq!(g.virtual_memory_bytes, 200);
        assert_eq!(g.resident_memory_bytes, 20);
        assert!((g.cpu_system_seconds - 3.0).abs() < 1e-9);
        assert!((g.cpu_user_seconds - 4.0).abs() < 1e-9);
        assert_eq!(g.oldest_start_time_seconds, 40.0);
    }

    #[test]
    fn test_fold_keeps_zero_start_time() {
        let mut g = GroupAccumulator::new(&key());
        g.fold(&sample(0.0));
        g.fold(&sample(5.0));

        assert_eq!(g.process_count, 2);
        assert_eq!(g.oldest_start_time_seconds, 0.0);
    }

    #[test]
    fn test_first_start_time_replaces_sentinel() {
        let mut g = GroupAccumulator::new(&key());
        assert_eq!(g.oldest_start_time_seconds, 0.0);
        g.fold(&sample(1_700_000_000.0));
        assert_eq!(g.oldest_start_time_seconds, 1_700_000_000.0);
        g.fold(&sample(1_800_000_000.0));
        assert_eq!(g.oldest_start_time_seconds, 1_700_000_000.0);
    }

    #[test]
    fn test_fold_is_order_independent() {
        let samples = [sample(30.0), sample(10.0), sample(20.0)];

        let mut forward = GroupAccumulator::new(&key());
        samples.iter().for_each(|s| forward.fold(s));
        let mut backward = GroupAccumulator::new(&key());
        samples.iter().rev().for_each(|s| backward.fold(s));

        assert_eq!(forward, backward);
    }

    // -------------------------------------------------------------------------
    // ScrapeErrors
    // -------------------------------------------------------------------------

    #[test]
    fn test_scrape_errors_accumulate_across_threads() {
        let errors = Arc::new(ScrapeErrors::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let errors = Arc::clone(&errors);
                std::thread::spawn(move || (0..250).for_each(|_| errors.increment()))
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(errors.get(), 1000);
    }
}
