//! Config command implementation.
//!
//! Generates configuration files in various formats.

use procgroup_exporter::process::RuleEntry;
use std::fs;
use std::path::PathBuf;

use crate::cli::ConfigFormat;
use crate::config::{render_config, Config};

/// Generates configuration files.
pub fn command_config(
    output: Option<PathBuf>,
    format: ConfigFormat,
    commented: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = sample_config();
    let output = output.unwrap_or_else(|| PathBuf::from("procgroup-exporter.yaml"));

    let commented = commented && matches!(format, ConfigFormat::Yaml);
    let mut content = render_config(&config, format)?;
    if commented {
        content = add_config_comments(content);
    }

    if output.to_string_lossy() == "-" {
        print!("{}", content);
    } else {
        fs::write(&output, content)?;
        println!("✅ Configuration written to: {}", output.display());
    }

    Ok(())
}

/// Default configuration plus one example rule, so the output validates.
fn sample_config() -> Config {
    Config {
        process_names: Some(vec![RuleEntry {
            name: Some("{{.Comm}}".to_string()),
            comm: Some(vec!["bash".to_string(), "sshd".to_string()]),
            ..Default::default()
        }]),
        ..Config::default()
    }
}

/// Adds comments to YAML configuration.
fn add_config_comments(yaml: String) -> String {
    let comments = r#"# Process Group Exporter Configuration
# =====================================
#
# Server Configuration
# --------------------
# bind: "0.0.0.0"              # Bind IP (0.0.0.0 = all interfaces)
# port: 9256                   # HTTP port
# metrics_path: /metrics       # Path serving the Prometheus metrics
#
# Process Table
# -------------
# procfs_path: /proc           # procfs mount point
# clock_ticks: null            # Override detected clock ticks per second
#
# Logging
# -------
# log_level: "info"            # off, error, warn, info, debug, trace
#
# TLS/SSL Configuration
# ---------------------
# enable_tls: false            # Enable HTTPS (default: false)
# tls_cert_path: null          # Path to TLS certificate (PEM format)
# tls_key_path: null           # Path to TLS private key (PEM format)
#
# Rules
# -----
# rules_file: null             # Extra YAML document with a process_names list,
#                              # evaluated after the inline rules
# process_names:               # Ordered; the first matching rule names the group
#   - name: "{{.Matches.Cfgfile}}"   # Template: {{.Comm}} {{.ExeBase}} {{.ExeFull}}
#     cmdline:                       #   {{.Matches.<name>}} (default {{.ExeBase}})
#       - 'prometheus\s+--config\.file=(?P<Cfgfile>\S+)'
#   - comm: [bash, sshd]             # All listed matcher kinds must match
#     exe: [/usr/local/bin/app, app] # Full path pins the binary; bare name matches any path
"#;

    format!("{comments}\n{yaml}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{load_config, load_rules};
    use tempfile::TempDir;

    #[test]
    fn test_generated_config_loads_and_validates() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let path = dir.path().join("generated.yaml");
        command_config(Some(path.clone()), ConfigFormat::Yaml, true)
            .expect("Failed to write config");

        let cfg = load_config(Some(&path)).expect("Failed to load generated config");
        let rules = load_rules(&cfg).expect("Generated rules compile");
        assert_eq!(rules.len(), 1);
    }
}
