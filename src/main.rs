//! PV Exporter
//!
//! Per-node Prometheus exporter for the filesystem usage of local
//! PersistentVolumes.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                          PV Exporter                             │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  ┌──────────────┐    ┌──────────────┐    ┌──────────────┐       │
//! │  │  Kubernetes  │───▶│  Refresher   │───▶│   Registry   │──▶ /metrics
//! │  │  Inventory   │    │ (local only) │    │ (value fns)  │       │
//! │  └──────────────┘    └──────────────┘    └──────────────┘       │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config};
use tracing::{error, info, warn, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use pv_exporter::adapters::KubernetesInventory;
use pv_exporter::error::{Error, Result};
use pv_exporter::refresh::{ExporterContext, Refresher};
use pv_exporter::registry::{EvictionPolicy, Exposition, MetricRegistry};
use pv_exporter::server::{run_server, ServerState};

// =============================================================================
// CLI Arguments
// =============================================================================

/// PV Exporter - Filesystem usage metrics for node-local PersistentVolumes
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Name of this node as it appears in volume node affinity
    #[arg(long, env = "HOSTNAME")]
    hostname: String,

    /// Prefix under which the host filesystem is mounted (none by default)
    #[arg(long, env = "ROOTFS")]
    rootfs: Option<PathBuf>,

    /// Metrics server bind address
    #[arg(long, env = "LISTEN_ADDR", default_value = "0.0.0.0:2112")]
    listen_addr: String,

    /// Path to a kubeconfig file
    #[arg(long, env = "KUBECONFIG")]
    kubeconfig: Option<PathBuf>,

    /// Use the in-cluster service account configuration
    #[arg(long, env = "IN_CLUSTER")]
    in_cluster: bool,

    /// Seconds between inventory refreshes
    #[arg(long, env = "REFRESH_INTERVAL_SECONDS", default_value = "1")]
    refresh_interval_seconds: u64,

    /// Drop series of volumes absent for this many refreshes (0 = never)
    #[arg(long, env = "EVICT_AFTER_CYCLES", default_value = "0")]
    evict_after_cycles: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, env = "LOG_JSON")]
    log_json: bool,
}

// =============================================================================
// Main
// =============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args);

    if args.hostname.is_empty() {
        return Err(Error::Config("hostname must not be empty".to_string()));
    }
    if args.refresh_interval_seconds == 0 {
        return Err(Error::Config(
            "refresh interval must be at least one second".to_string(),
        ));
    }

    let eviction = EvictionPolicy::from_cycles(args.evict_after_cycles);

    info!("Starting PV Exporter");
    info!("  Hostname: {}", args.hostname);
    let rootfs = args.rootfs.clone().unwrap_or_default();
    info!("  Root filesystem: {}", rootfs.display());
    info!("  Refresh interval: {}s", args.refresh_interval_seconds);
    info!("  Eviction: {:?}", eviction);

    let client = kube_client(&args).await.map_err(|e| {
        error!("Failed to create Kubernetes client: {}", e);
        e
    })?;

    info!("Connected to Kubernetes cluster");

    let registry = Arc::new(MetricRegistry::new(eviction));
    let exposition = Exposition::new(Arc::clone(&registry))?;

    let ctx = ExporterContext::new(
        Arc::new(KubernetesInventory::new(client)),
        args.hostname.clone(),
        rootfs,
        registry,
    );

    let refresher = Arc::new(
        Refresher::new(ctx, Duration::from_secs(args.refresh_interval_seconds))
            .with_metrics(exposition.metrics().clone()),
    );

    tokio::spawn(Arc::clone(&refresher).run());

    let state = ServerState::new(exposition, refresher);
    if let Err(e) = run_server(&args.listen_addr, state).await {
        error!("Metrics server error: {}", e);
        return Err(e);
    }

    info!("Exporter shutdown complete");
    Ok(())
}

// =============================================================================
// Kubernetes Client
// =============================================================================

async fn kube_client(args: &Args) -> Result<Client> {
    let config = if args.in_cluster {
        info!("Using in-cluster configuration");
        Config::incluster()
            .map_err(|e| Error::Config(format!("In-cluster configuration failed: {}", e)))?
    } else if let Some(path) = &args.kubeconfig {
        info!("Using kubeconfig {}", path.display());
        let kubeconfig = Kubeconfig::read_from(path)
            .map_err(|e| Error::Config(format!("Failed to read {}: {}", path.display(), e)))?;
        Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
            .await
            .map_err(|e| Error::Config(format!("Invalid kubeconfig {}: {}", path.display(), e)))?
    } else {
        return Ok(Client::try_default().await?);
    };

    Ok(Client::try_from(config)?)
}

// =============================================================================
// Logging Setup
// =============================================================================

fn init_logging(args: &Args) {
    let level = parse_level(&args.log_level);

    let mut filter =
        EnvFilter::from_default_env().add_directive(level.unwrap_or(Level::INFO).into());
    for directive in ["hyper=warn", "kube=info", "tower=warn"] {
        match directive.parse() {
            Ok(d) => filter = filter.add_directive(d),
            Err(e) => eprintln!("Ignoring log directive {}: {}", directive, e),
        }
    }

    if args.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true))
            .init();
    }

    if level.is_none() {
        warn!("Unknown log level {:?}, using info", args.log_level);
    }
}

fn parse_level(level: &str) -> Option<Level> {
    match level.to_lowercase().as_str() {
        "trace" => Some(Level::TRACE),
        "debug" => Some(Level::DEBUG),
        "info" => Some(Level::INFO),
        "warn" => Some(Level::WARN),
        "error" => Some(Level::ERROR),
        _ => None,
    }
}
