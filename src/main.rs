//! procgroup-exporter
//!
//! Prometheus exporter that groups Linux processes by configurable rules.
//! This is the main entry point that initializes the server and handles subcommands.

mod cli;
mod commands;
mod config;
mod handlers;
mod health_stats;
mod startup_checks;
mod state;

use anyhow::Context;
use axum::{routing::get, Router};
use axum_server::tls_rustls::RustlsConfig;
use clap::Parser;
use procgroup_exporter::process::RuleSet;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::{net::TcpListener, signal};
use tracing::{error, info, level_filters::LevelFilter};

use cli::{Args, Commands, LogLevel};
use commands::{command_check, command_config, command_rules, command_test};
use config::{
    load_rules, resolve_config, show_config, validate_effective_config, Config, DEFAULT_BIND_ADDR,
    DEFAULT_PORT,
};
use handlers::{health_handler, metrics_handler, root_handler};
use state::{AppState, SharedState};

/// Initializes tracing logging subsystem with configured log level.
fn setup_logging(config: &Config) {
    let level = config.log_level();
    let filter = match level {
        LogLevel::Off => LevelFilter::OFF,
        LogLevel::Error => LevelFilter::ERROR,
        LogLevel::Warn => LevelFilter::WARN,
        LogLevel::Info => LevelFilter::INFO,
        LogLevel::Debug => LevelFilter::DEBUG,
        LogLevel::Trace => LevelFilter::TRACE,
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");

    info!("Logging initialized with level: {:?}", level);
}

/// Resolves and validates the configuration, then compiles the rules.
/// Exits the process with error code 1 if validation fails.
fn load_validated_config(args: &Args) -> Result<(Config, RuleSet), Box<dyn std::error::Error>> {
    let config = resolve_config(args)?;
    if let Err(e) = validate_effective_config(&config) {
        eprintln!("❌ Configuration invalid: {}", e);
        std::process::exit(1);
    }
    let rules = load_rules(&config)?;
    Ok((config, rules))
}

fn build_state(config: Config, rules: RuleSet) -> anyhow::Result<SharedState> {
    let state = AppState::new(config, rules).context("Failed to register metrics")?;
    Ok(Arc::new(state))
}

/// Completes on SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT (Ctrl+C), shutting down gracefully...");
        }
        _ = terminate => {
            info!("Received SIGTERM, shutting down gracefully...");
        }
    }
}

/// Main application entry point.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Early config resolution for show/check modes
    if args.show_config || args.check_config {
        let config = resolve_config(&args)?;

        if args.check_config {
            if let Err(e) = validate_effective_config(&config) {
                eprintln!("❌ Configuration invalid: {}", e);
                std::process::exit(1);
            }
            println!("✅ Configuration is valid");
            return Ok(());
        }

        return show_config(&config, args.config_format);
    }

    // Handle subcommands
    if let Some(command) = &args.command {
        // Generating a sample config needs no existing config
        if let Commands::Config {
            output,
            format,
            commented,
        } = command
        {
            return command_config(output.clone(), format.clone(), *commented);
        }

        let config = resolve_config(&args)?;
        setup_logging(&config);

        return match command {
            Commands::Check { proc, all } => command_check(*proc, *all, &config),
            Commands::Test {
                iterations,
                verbose,
            } => {
                let rules = load_rules(&config)?;
                command_test(*iterations, *verbose, &config, rules)
            }
            Commands::Rules { verbose } => {
                let rules = load_rules(&config)?;
                command_rules(&rules, *verbose)
            }
            Commands::Config { .. } => Ok(()),
        };
    }

    // Load configuration for main server mode
    let (config, rules) = load_validated_config(&args)?;

    setup_logging(&config);

    info!(
        "Starting procgroup-exporter {} (built {})",
        env!("CARGO_PKG_VERSION"),
        env!("VERGEN_BUILD_TIMESTAMP")
    );
    info!("Loaded {} process rules", rules.len());

    if let Err(e) = startup_checks::validate_requirements(&config.procfs_path()) {
        error!("❌ Startup validation failed: {}", e);
        error!("   The exporter will start but scrapes will report errors!");
    }

    let bind_ip_str = config.bind.clone().unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
    let port = config.port.unwrap_or(DEFAULT_PORT);
    let metrics_path = config.metrics_path().to_string();
    let tls_paths = match (
        config.enable_tls.unwrap_or(false),
        config.tls_cert_path.clone(),
        config.tls_key_path.clone(),
    ) {
        (true, Some(cert), Some(key)) => Some((cert, key)),
        _ => None,
    };

    let state = build_state(config, rules)?;

    // Configure HTTP server routes
    let addr: SocketAddr = format!("{}:{}", bind_ip_str, port).parse()?;

    let app = Router::new()
        .route("/", get(root_handler))
        .route(&metrics_path, get(metrics_handler))
        .route("/health", get(health_handler))
        .with_state(state);

    if let Some((cert_path, key_path)) = tls_paths {
        info!("Loading TLS certificate from: {}", cert_path);
        info!("Loading TLS private key from: {}", key_path);

        let tls_config = RustlsConfig::from_pem_file(&cert_path, &key_path)
            .await
            .map_err(|e| {
                error!("Failed to load TLS configuration: {}", e);
                e
            })?;

        info!(
            "procgroup-exporter listening on https://{}:{}{}",
            bind_ip_str, port, metrics_path
        );
        let server = axum_server::bind_rustls(addr, tls_config).serve(app.into_make_service());
        tokio::select! {
            result = server => {
                if let Err(e) = result {
                    error!("Server error: {}", e);
                }
            }
            _ = shutdown_signal() => {
                info!("Shutdown signal received, exiting...");
            }
        }
    } else {
        let listener = TcpListener::bind(addr).await?;
        info!(
            "procgroup-exporter listening on http://{}:{}{}",
            bind_ip_str, port, metrics_path
        );
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;
    }

    info!("Server stopped");
    Ok(())
}
