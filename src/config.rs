//! Configuration management for procgroup-exporter.
//!
//! This module handles loading, merging, and validating configuration from files
//! and CLI arguments. It supports YAML, JSON, and TOML formats. Process rules are
//! taken from the inline `process_names` list, followed by the entries of the
//! optional standalone `rules_file`.

use crate::cli::{Args, ConfigFormat, LogLevel};
use clap::ValueEnum;
use procgroup_exporter::process::{parse_rule_entries, ConfigError, RuleEntry, RuleSet, CLK_TCK};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

// Default configuration constants
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 9256;
pub const DEFAULT_METRICS_PATH: &str = "/metrics";
pub const DEFAULT_PROCFS_PATH: &str = "/proc";

/// Exporter configuration. Every field is optional so a file only needs to
/// name what it changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    // Server configuration
    pub port: Option<u16>,
    pub bind: Option<String>,
    #[serde(alias = "metrics-path")]
    pub metrics_path: Option<String>,

    // Process table access
    #[serde(alias = "procfs-path", alias = "procfs")]
    pub procfs_path: Option<PathBuf>,
    /// Overrides the detected clock tick rate.
    #[serde(alias = "clock-ticks")]
    pub clock_ticks: Option<u64>,

    // Logging
    pub log_level: Option<String>,

    // TLS/SSL Configuration
    #[serde(alias = "enable-tls")]
    pub enable_tls: Option<bool>,
    #[serde(alias = "tls-cert-path")]
    pub tls_cert_path: Option<String>,
    #[serde(alias = "tls-key-path")]
    pub tls_key_path: Option<String>,

    // Classification rules
    #[serde(alias = "rules-file")]
    pub rules_file: Option<PathBuf>,
    #[serde(alias = "process-names")]
    pub process_names: Option<Vec<RuleEntry>>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind: Some(DEFAULT_BIND_ADDR.to_string()),
            port: Some(DEFAULT_PORT),
            metrics_path: Some(DEFAULT_METRICS_PATH.to_string()),
            procfs_path: Some(PathBuf::from(DEFAULT_PROCFS_PATH)),
            clock_ticks: None,
            log_level: Some("info".into()),
            enable_tls: Some(false),
            tls_cert_path: None,
            tls_key_path: None,
            rules_file: None,
            process_names: None,
        }
    }
}

impl Config {
    pub fn procfs_path(&self) -> PathBuf {
        self.procfs_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_PROCFS_PATH))
    }

    pub fn metrics_path(&self) -> &str {
        self.metrics_path.as_deref().unwrap_or(DEFAULT_METRICS_PATH)
    }

    /// Configured log level; unknown names fall back to `info`.
    pub fn log_level(&self) -> LogLevel {
        self.log_level
            .as_deref()
            .and_then(|l| LogLevel::from_str(l, true).ok())
            .unwrap_or(LogLevel::Info)
    }

    /// Configured tick rate, or the one reported by the kernel.
    pub fn clock_ticks(&self) -> u64 {
        self.clock_ticks.unwrap_or(*CLK_TCK)
    }
}

/// Collects inline rules and the rules file entries, then compiles them.
pub fn load_rules(cfg: &Config) -> Result<RuleSet, ConfigError> {
    let mut entries = cfg.process_names.clone().unwrap_or_default();

    if let Some(path) = &cfg.rules_file {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.clone(),
            source,
        })?;
        let file_entries = parse_rule_entries(&content)?;
        debug!(
            "Loaded {} rules from {}",
            file_entries.len(),
            path.display()
        );
        entries.extend(file_entries);
    }

    if entries.is_empty() {
        return Err(ConfigError::NoRules);
    }
    RuleSet::from_entries(&entries)
}

/// Validate effective config (used by --check-config and at startup)
pub fn validate_effective_config(cfg: &Config) -> Result<(), Box<dyn std::error::Error>> {
    // TLS validation
    if cfg.enable_tls.unwrap_or(false) {
        let cert_path = cfg.tls_cert_path.as_deref();
        let key_path = cfg.tls_key_path.as_deref();

        match (cert_path, key_path) {
            (None, None) => {
                return Err(
                    "TLS is enabled but neither tls_cert_path nor tls_key_path are set".into(),
                );
            }
            (Some(_), None) => {
                return Err("TLS is enabled but tls_key_path is not set".into());
            }
            (None, Some(_)) => {
                return Err("TLS is enabled but tls_cert_path is not set".into());
            }
            (Some(cert), Some(key)) => {
                check_tls_file(cert, "certificate")?;
                check_tls_file(key, "private key")?;
            }
        }
    }

    if !cfg.metrics_path().starts_with('/') {
        return Err(format!(
            "metrics_path must start with '/', got '{}'",
            cfg.metrics_path()
        )
        .into());
    }

    if let Some(level) = cfg.log_level.as_deref() {
        if LogLevel::from_str(level, true).is_err() {
            return Err(format!("Invalid log_level '{}'", level).into());
        }
    }

    if cfg.clock_ticks == Some(0) {
        return Err("clock_ticks must be greater than zero".into());
    }

    // Rules: surfaces the offending entry index
    let rules = load_rules(cfg)?;
    debug!("Validated {} process rules", rules.len());

    Ok(())
}

fn check_tls_file(path: &str, kind: &str) -> Result<(), Box<dyn std::error::Error>> {
    match fs::metadata(path) {
        Ok(meta) if meta.len() == 0 => Err(format!("TLS {} file is empty: {}", kind, path).into()),
        Ok(_) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(format!("TLS {} file not found: {}", kind, path).into())
        }
        Err(e) => Err(format!("TLS {} file is not readable: {} ({})", kind, path, e).into()),
    }
}

/// Resolves configuration from CLI args, config file, and defaults.
/// This enforces precedence: CLI (if provided) > config file > default.
pub fn resolve_config(args: &Args) -> Result<Config, Box<dyn std::error::Error>> {
    let mut config = if args.no_config {
        Config::default()
    } else {
        load_config(args.config.as_deref())?
    };

    // Override with CLI args
    if let Some(bind_ip) = args.bind {
        config.bind = Some(bind_ip.to_string());
    }

    // Only override port if the user supplied it on the CLI.
    if let Some(cli_port) = args.port {
        config.port = Some(cli_port);
    }

    if let Some(level) = args.log_level.as_ref().and_then(|l| l.to_possible_value()) {
        config.log_level = Some(level.get_name().to_string());
    }
    if let Some(path) = &args.metrics_path {
        config.metrics_path = Some(path.clone());
    }
    if let Some(procfs) = &args.procfs {
        config.procfs_path = Some(procfs.clone());
    }
    if let Some(rules) = &args.rules {
        config.rules_file = Some(rules.clone());
    }

    // TLS configuration: CLI wins if provided
    if args.enable_tls {
        config.enable_tls = Some(true);
    }
    if let Some(cert_path) = &args.tls_cert {
        config.tls_cert_path = Some(cert_path.to_string_lossy().to_string());
    }
    if let Some(key_path) = &args.tls_key {
        config.tls_key_path = Some(key_path.to_string_lossy().to_string());
    }

    Ok(config)
}

/// Loads a config file, or the first existing default location.
///
/// Missing keys fall back to their defaults.
pub fn load_config(path: Option<&Path>) -> Result<Config, Box<dyn std::error::Error>> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => {
            // Try default locations
            let defaults = [
                "/etc/procgroup-exporter/config.yaml",
                "/etc/procgroup-exporter/config.yml",
                "/etc/procgroup-exporter/config.json",
                "./procgroup-exporter.yaml",
                "./procgroup-exporter.yml",
                "./procgroup-exporter.json",
            ];

            match defaults.iter().map(Path::new).find(|p| p.exists()) {
                Some(p) => p.to_path_buf(),
                None => return Ok(Config::default()),
            }
        }
    };

    if !path.exists() {
        return Err(format!("config file not found: {}", path.display()).into());
    }

    let content = fs::read_to_string(&path)?;

    let loaded: Config = match path.extension().and_then(|s| s.to_str()) {
        Some("json") => {
            let config = serde_json::from_str(&content)?;
            info!("Loaded JSON configuration from: {}", path.display());
            config
        }
        Some("toml") => {
            let config = toml::from_str(&content)?;
            info!("Loaded TOML configuration from: {}", path.display());
            config
        }
        _ => {
            // Default to YAML
            let config = serde_yaml::from_str(&content)?;
            info!("Loaded YAML configuration from: {}", path.display());
            config
        }
    };

    Ok(loaded.with_defaults())
}

impl Config {
    /// Fills unset keys from [`Config::default`].
    fn with_defaults(self) -> Self {
        let d = Config::default();
        Self {
            port: self.port.or(d.port),
            bind: self.bind.or(d.bind),
            metrics_path: self.metrics_path.or(d.metrics_path),
            procfs_path: self.procfs_path.or(d.procfs_path),
            clock_ticks: self.clock_ticks.or(d.clock_ticks),
            log_level: self.log_level.or(d.log_level),
            enable_tls: self.enable_tls.or(d.enable_tls),
            tls_cert_path: self.tls_cert_path.or(d.tls_cert_path),
            tls_key_path: self.tls_key_path.or(d.tls_key_path),
            rules_file: self.rules_file.or(d.rules_file),
            process_names: self.process_names.or(d.process_names),
        }
    }
}

/// Shows configuration in requested format
pub fn show_config(config: &Config, format: ConfigFormat) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", render_config(config, format)?);
    Ok(())
}

pub fn render_config(
    config: &Config,
    format: ConfigFormat,
) -> Result<String, Box<dyn std::error::Error>> {
    let output = match format {
        ConfigFormat::Json => serde_json::to_string_pretty(config)?,
        ConfigFormat::Toml => toml::to_string_pretty(config)?,
        ConfigFormat::Yaml => serde_yaml::to_string(config)?,
    };
    Ok(output)
}
