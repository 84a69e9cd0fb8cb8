//! Bootstrap binary: wires a [`ShardHandle`] to a backend and coordinator
//! driver chosen by [`ShardConfig`], runs it until `Ctrl+C`, then shuts it
//! down: tracing init, load config, start subsystem, wait on
//! `signal::ctrl_c`, stop subsystem.

use anyhow::Result;
use clap::Parser;
use docshard_backend::{BackendStore, MemoryBackend, SledBackend};
use docshard_coordinator::{CoordinatorClient, LocalCoordinator, RedisCoordinator};
use docshard_core::{BackendKind, CoordinatorKind, ShardConfig};
use docshard_shard::ShardHandle;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};

/// Run a single docshard shard process.
#[derive(Parser, Debug)]
#[command(name = "docshard", version, about)]
struct Cli {
    /// Path to the shard's JSON config file; generated with defaults if absent.
    #[arg(long, default_value = "config.json")]
    config: String,

    /// Overrides the shard identity used in coordinator locks.
    #[arg(long)]
    shard_id: Option<String>,

    /// Overrides the configured backend driver (`memory` or `sled`).
    #[arg(long)]
    backend: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive("docshard=info".parse()?),
        )
        .json()
        .init();

    let cli = Cli::parse();
    let mut config = ShardConfig::load(&cli.config).await?;
    if let Some(shard_id) = cli.shard_id {
        config.shard_id = shard_id;
    }
    if let Some(backend) = cli.backend.as_deref() {
        config.backend = match backend {
            "memory" => BackendKind::Memory,
            "sled" => BackendKind::Sled,
            other => anyhow::bail!("unknown backend override: {other}"),
        };
    }

    info!(shard_id = %config.shard_id, "starting docshard");

    let backend: Arc<dyn BackendStore> = match config.backend {
        BackendKind::Memory => Arc::new(MemoryBackend::new()),
        BackendKind::Sled => Arc::new(SledBackend::new(&config.backend_config).await?),
    };

    let coordinator: Arc<dyn CoordinatorClient> = match config.coordinator {
        CoordinatorKind::Local => Arc::new(LocalCoordinator::new()),
        CoordinatorKind::Redis => Arc::new(RedisCoordinator::new(&config.coord_config).await?),
    };

    let shard = ShardHandle::new(config, backend, coordinator);

    if let Err(e) = shard.start().await {
        error!("failed to start shard: {e}");
        return Err(e.into());
    }
    info!("docshard started, waiting for shutdown signal");

    match signal::ctrl_c().await {
        Ok(()) => info!("received shutdown signal, stopping"),
        Err(e) => error!("unable to listen for shutdown signal: {e}"),
    }

    if let Err(e) = shard.stop().await {
        error!("error during shutdown: {e}");
        return Err(e.into());
    }
    info!("docshard stopped cleanly");
    Ok(())
}
