//! procgroup-exporter library
//!
//! Classifies the processes of a Linux host into user-named groups and
//! aggregates CPU, memory, thread and start-time metrics per
//! `(account, group)`. The binary serves the result as Prometheus metrics;
//! this library holds everything that does not need a running server.
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use procgroup_exporter::process::{
//!     Aggregator, ProcfsSource, RuleSet, ScrapeErrors, SystemAccounts, CLK_TCK,
//! };
//!
//! let rules = RuleSet::parse_document(
//!     "process_names:\n  - name: \"{{.Comm}}\"\n    comm: [bash, sshd]\n",
//! )
//! .expect("valid rules");
//!
//! let aggregator = Aggregator::new(
//!     ProcfsSource::new("/proc"),
//!     SystemAccounts,
//!     rules,
//!     *CLK_TCK,
//!     Arc::new(ScrapeErrors::new()),
//! );
//!
//! let result = aggregator.read_proc_groups();
//! for group in result.sorted_groups() {
//!     println!("{}/{}: {} procs", group.account, group.name, group.process_count);
//! }
//! ```

pub mod metrics;
pub mod process;

// Re-export main types for convenience
pub use metrics::ProcMetrics;
pub use process::{Aggregator, RuleSet, ScrapeErrors, ScrapeResult};
