//! Process classification and aggregation.
//!
//! This module provides:
//! - `matcher`: comm / exe / cmdline predicates and their conjunction
//! - `template`: group name templates
//! - `classifier`: rules, ordered rule sets and rule configuration
//! - `stat`: `/proc/<pid>/stat` and `/proc/stat` parsing
//! - `scanner`: the process table read contract and its procfs implementation
//! - `account`: uid to account name resolution
//! - `aggregator`: the per-scrape aggregation pass

pub mod account;
pub mod aggregator;
pub mod classifier;
pub mod matcher;
pub mod scanner;
pub mod stat;
pub mod template;

// Re-export commonly used types
pub use account::{AccountError, AccountResolver, SystemAccounts};
pub use aggregator::{
    Aggregator, GroupAccumulator, GroupKey, ProcessSample, ScrapeErrors, ScrapeResult,
};
pub use classifier::{
    parse_rule_entries, ConfigError, MatchNamer, Rule, RuleEntry, RuleError, RuleSet,
};
pub use matcher::{
    AllMatcher, Captures, CmdlineMatcher, CommMatcher, ExeMatcher, Matcher, MatcherKind,
    ProcessIdentity,
};
pub use scanner::{ProcHandle, ProcSource, ProcfsSource, ReadError};
pub use stat::{parse_boot_time, parse_stat, ProcStat, CLK_TCK, DEFAULT_CLK_TCK, PAGE_SIZE};
pub use template::{NameTemplate, TemplateError, TemplateParams, DEFAULT_TEMPLATE};
