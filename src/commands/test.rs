//! Test command implementation.
//!
//! Runs aggregation passes against the configured procfs and prints the
//! resulting groups.

use procgroup_exporter::process::{Aggregator, ProcfsSource, RuleSet, ScrapeErrors, SystemAccounts};
use std::sync::Arc;
use std::time::Instant;

use crate::config::Config;

const MIB: f64 = 1024.0 * 1024.0;

/// Tests metrics collection.
pub fn command_test(
    iterations: usize,
    verbose: bool,
    config: &Config,
    rules: RuleSet,
) -> Result<(), Box<dyn std::error::Error>> {
    println!("🧪 Process Group Exporter - Test Mode");
    println!("=====================================");

    let aggregator = Aggregator::new(
        ProcfsSource::new(config.procfs_path()),
        SystemAccounts,
        rules,
        config.clock_ticks(),
        Arc::new(ScrapeErrors::new()),
    );

    for iteration in 1..=iterations {
        println!("\n🔄 Iteration {}/{}:", iteration, iterations);

        let start = Instant::now();
        let result = aggregator.read_proc_groups();
        let duration = start.elapsed();

        println!(
            "   ⏱️  Pass duration: {:.2}ms",
            duration.as_secs_f64() * 1000.0
        );
        println!(
            "   📊 {} processes scanned, {} matched, {} groups",
            result.scanned,
            result.matched,
            result.groups.len()
        );
        println!("   ❌ Scrape errors (cumulative): {}", result.scrape_errors);

        for g in result.sorted_groups() {
            let account = if g.account.is_empty() { "?" } else { &g.account };
            println!(
                "   ├─ {}/{}: {} procs, {} threads",
                account, g.name, g.process_count, g.thread_count
            );
            if verbose {
                println!(
                    "   │  ├─ CPU: user {:.2}s, system {:.2}s",
                    g.cpu_user_seconds, g.cpu_system_seconds
                );
                println!(
                    "   │  ├─ Memory: resident {:.1} MiB, virtual {:.1} MiB",
                    g.resident_memory_bytes as f64 / MIB,
                    g.virtual_memory_bytes as f64 / MIB
                );
                println!("   │  └─ Oldest start: {:.0}", g.oldest_start_time_seconds);
            }
        }
    }

    println!("\n✅ Test completed successfully");
    Ok(())
}
