//! Check command implementation.
//!
//! Validates system requirements and configuration.

use procgroup_exporter::process::{ProcSource, ProcfsSource, SystemAccounts, AccountResolver};

use crate::config::{load_rules, validate_effective_config, Config};

/// Validates system requirements and configuration.
pub fn command_check(proc: bool, all: bool, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    println!("🔍 Process Group Exporter - System Check");
    println!("=======================================");

    let mut all_ok = true;

    // Check procfs
    if proc || all {
        let root = config.procfs_path();
        println!("\nChecking {} ...", root.display());
        let source = ProcfsSource::new(&root);
        match source.all_procs() {
            Ok(procs) if procs.is_empty() => {
                println!("   ❌ no process entries found");
                all_ok = false;
            }
            Ok(procs) => {
                println!("   ✅ {} process entries", procs.len());
                let readable = procs
                    .iter()
                    .filter(|p| source.stat(**p).is_ok() && source.cmdline(**p).is_ok())
                    .count();
                println!("   ✅ {} of {} processes readable", readable, procs.len());
                if let Some(first) = procs.first() {
                    match source.owner_uid(*first).map(|uid| SystemAccounts.account_name(uid)) {
                        Ok(Ok(name)) => println!("   ✅ owner of pid {} is '{}'", first.pid, name),
                        Ok(Err(e)) => println!("   ⚠️  account lookup failed: {}", e),
                        Err(e) => println!("   ⚠️  owner lookup failed: {}", e),
                    }
                }
            }
            Err(e) => {
                println!("   ❌ {}", e);
                all_ok = false;
            }
        }

        match source.boot_time() {
            Ok(btime) => println!("   ✅ boot time {}", btime),
            Err(e) => {
                println!("   ❌ {}", e);
                all_ok = false;
            }
        }
        println!("   ℹ️  clock ticks per second: {}", config.clock_ticks());
    }

    // Check configuration
    println!("\nChecking configuration...");
    match validate_effective_config(config) {
        Ok(()) => println!("   ✅ Configuration is valid"),
        Err(e) => {
            println!("   ❌ Configuration invalid: {}", e);
            all_ok = false;
        }
    }

    if let Ok(rules) = load_rules(config) {
        println!("   ✅ {} rules loaded", rules.len());
    }

    println!("\n📋 Summary:");
    if all_ok {
        println!("   All checks passed - system is ready");
        Ok(())
    } else {
        Err("some checks failed".into())
    }
}
