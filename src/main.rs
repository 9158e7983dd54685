//! # Map Cache Worker Entry Point
//!
//! Runs the batch pre-computation pipeline over the configured store until
//! the configuration space is exhausted or SIGINT/SIGTERM arrives.

use clap::Parser;
use mapcache::{
    AppConfig, ArtifactStore, BatchPipeline, ComputationEngine, ConfigOverrides, Priority,
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "mapcache-worker")]
#[command(about = "Pre-compute prime map artifacts into the shared cache", long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long, env = "MAPCACHE_CONFIG")]
    config: Option<PathBuf>,

    /// Artifact store directory
    #[arg(long)]
    store_dir: Option<PathBuf>,

    /// Pipeline stats file
    #[arg(long)]
    stats_path: Option<PathBuf>,

    /// Enumerate and report counts without computing anything
    #[arg(long)]
    dry_run: bool,

    /// Process at most this many configurations
    #[arg(long)]
    limit: Option<usize>,
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    // Also installs the log -> tracing bridge for the library's `log` records
    fmt().with_env_filter(filter).with_target(false).init();
}

/// Cancel `token` on SIGINT or SIGTERM.
fn spawn_signal_handler(token: CancellationToken) {
    tokio::spawn(async move {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};
            let mut terminate = match signal(SignalKind::terminate()) {
                Ok(s) => s,
                Err(e) => {
                    log::warn!("Cannot install SIGTERM handler: {}", e);
                    let _ = tokio::signal::ctrl_c().await;
                    token.cancel();
                    return;
                }
            };
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = terminate.recv() => {}
            }
        }
        #[cfg(not(unix))]
        {
            let _ = tokio::signal::ctrl_c().await;
        }
        log::info!("Termination signal received");
        token.cancel();
    });
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging();

    println!("=================================================");
    println!("  Prime Map Cache - Batch Pre-computation Worker ");
    println!("=================================================");
    println!();

    let mut config = AppConfig::load(cli.config.as_deref())?;
    config.apply_overrides(&ConfigOverrides {
        store_dir: cli.store_dir,
        stats_path: cli.stats_path,
    });

    let mut configurations = config.enumerator.enumerate();
    if let Some(limit) = cli.limit {
        configurations.truncate(limit);
    }

    let count = |p: Priority| configurations.iter().filter(|c| c.priority == p).count();
    println!("Configuration space:");
    println!("  - Total: {}", configurations.len());
    println!("  - Normal: {}", count(Priority::Normal));
    println!("  - High: {}", count(Priority::High));
    println!("  - Ultra: {}", count(Priority::Ultra));
    if let (Some(first), Some(last)) = (configurations.first(), configurations.last()) {
        println!(
            "  - Elements: {} - {}",
            first.total_elements, last.total_elements
        );
    }
    println!();

    if cli.dry_run {
        println!("Dry run, nothing computed.");
        return Ok(());
    }

    let store = match ArtifactStore::open(config.store.clone()) {
        Ok(store) => Arc::new(store),
        Err(e) => {
            eprintln!("✗ Failed to open artifact store: {}", e);
            return Err(e.into());
        }
    };
    println!("✓ Artifact store at {}", store.dir().display());
    println!("  - Max entries: {}", config.store.max_entries);
    println!("  - TTL: {}s", config.store.ttl_secs);
    println!("  - Stats file: {}", config.pipeline.stats_path.display());
    println!();

    let cancel = CancellationToken::new();
    spawn_signal_handler(cancel.clone());

    let engine = Arc::new(ComputationEngine::new(config.engine.clone()));
    let pipeline = BatchPipeline::new(store, engine, config.pipeline.clone())
        .with_cancellation(cancel);
    let summary = pipeline.run(configurations).await?;

    println!();
    println!("=================================================");
    println!(
        "  Generated {} | Skipped {} | Failed {} | Oversized {}",
        summary.generated, summary.skipped, summary.failed, summary.oversized
    );
    if summary.cancelled {
        println!("  Interrupted after {}/{}", summary.processed, summary.total);
    }
    println!("=================================================");

    Ok(())
}
