// Main entrypoint for the deployd application.

use deployd::app::App;
use deployd::config::{Config, ConfigTrait};
use deployd::shutdown::GracefulShutdown;

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

const CONFIG_PATH: &str = "cfg/deployd.cfg.yaml";
const CONFIG_PATH_LOCAL: &str = "cfg/deployd.cfg.local.yaml";

/// deployd - deploys artifact roots onto a dependency-ordered service registry
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Custom config file path
    #[arg(short, long, value_name = "FILE")]
    cfg: Option<PathBuf>,

    /// Extra deployment roots, deployed after the configured ones
    #[arg(value_name = "ROOT")]
    roots: Vec<PathBuf>,
}

/// Resolves the worker thread count: the configured value, or every available core.
fn num_workers(cfg: &Config) -> usize {
    match cfg.runtime().num_cpus {
        0 => num_cpus::get(),
        cores => cores,
    }
}

/// Loads the configuration struct from YAML file.
/// Tries local config first, then falls back to default config.
fn load_cfg(path: Option<PathBuf>) -> Result<Config> {
    if let Some(custom_path) = path {
        return Config::load(&custom_path)
            .with_context(|| format!("failed to load custom config from {:?}", custom_path));
    }

    // Try local config first
    match Config::load(PathBuf::from(CONFIG_PATH_LOCAL)) {
        Ok(cfg) => Ok(cfg),
        Err(_) => Config::load(PathBuf::from(CONFIG_PATH))
            .with_context(|| format!("failed to load config from {}", CONFIG_PATH)),
    }
}

/// Configures structured logging based on configuration.
fn configure_logger(cfg: &Config) {
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::EnvFilter;

    let log_level = cfg
        .logs()
        .and_then(|logs| logs.level.as_ref())
        .map(|s| s.as_str())
        .unwrap_or("debug");

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    if cfg.is_prod() {
        // Production: JSON format
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        // Development: Pretty console format
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().pretty())
            .init();
    }
}

/// Installs the Prometheus exporter when metrics are enabled.
/// Called before the tokio runtime exists, so the exporter runs on its own thread.
fn init_prometheus_exporter(cfg: &Config) -> Result<()> {
    use metrics_exporter_prometheus::PrometheusBuilder;

    let Some(metrics) = cfg.metrics().filter(|m| m.enabled) else {
        return Ok(());
    };
    let listen = metrics
        .listen
        .context("metrics.listen is required when metrics are enabled")?;

    PrometheusBuilder::new()
        .with_http_listener(listen)
        .install()
        .map_err(|e| anyhow::anyhow!("failed to install Prometheus recorder: {}", e))?;

    info!(
        component = "main",
        event = "metrics_exporter_started",
        listen = %listen,
        "prometheus exporter listening"
    );
    Ok(())
}

fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse();

    // Load configuration
    let cfg = load_cfg(args.cfg.clone())?;

    // Configure logger (must be done after config is loaded)
    configure_logger(&cfg);

    if let Err(e) = init_prometheus_exporter(&cfg) {
        warn!(
            component = "main",
            event = "metrics_exporter_failed",
            error = %e,
            "metrics endpoint will not be available"
        );
    }

    let workers = num_workers(&cfg);
    info!(
        component = "main",
        event = "num_cpus_configured",
        num_cpus = workers,
        "worker threads configured"
    );

    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(workers)
        .enable_all()
        .build()
        .context("failed to create tokio runtime")?
        .block_on(async_main(cfg, args.roots))
}

async fn async_main(cfg: Config, roots: Vec<PathBuf>) -> Result<()> {
    // Create cancellation token for graceful shutdown
    let shutdown_token = CancellationToken::new();

    // Setup graceful shutdown handler
    let graceful_shutdown = GracefulShutdown::new(shutdown_token.clone());
    graceful_shutdown
        .set_graceful_timeout(cfg.shutdown_timeout())
        .await;

    let app = App::new(shutdown_token.clone(), cfg, roots)?;

    // Register app for graceful shutdown
    graceful_shutdown.add(1);
    app.serve(Arc::new(graceful_shutdown.clone())).await?;

    // Listen for OS signals or cancellation and wait for graceful shutdown
    if let Err(e) = graceful_shutdown.await_shutdown().await {
        error!(
            component = "main",
            scope = "service",
            event = "graceful_shutdown_failed",
            error = %e,
            "failed to gracefully shut down service"
        );
        return Err(e);
    }

    Ok(())
}
