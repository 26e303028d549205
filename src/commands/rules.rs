//! Rules command implementation.
//!
//! Lists the compiled rules in evaluation order.

use procgroup_exporter::process::RuleSet;

/// Lists the configured rules.
pub fn command_rules(rules: &RuleSet, verbose: bool) -> Result<(), Box<dyn std::error::Error>> {
    println!("📋 Process rules (first match wins)");
    println!("===================================");

    for (index, rule) in rules.rules().iter().enumerate() {
        println!("\n{:>3}. name: {}", index, rule.template());
        if verbose {
            let entry = rule.entry();
            for (kind, values) in [
                ("comm", &entry.comm),
                ("exe", &entry.exe),
                ("cmdline", &entry.cmdline),
            ] {
                if let Some(values) = values {
                    println!("     {:8} {}", kind, values.join(", "));
                }
            }
        }
    }

    println!("\n{} rules", rules.len());
    Ok(())
}
