//! Entity-component-system runtime server.
//!
//! Wires a `Store` to a `Scheduler` and exposes the scheduler's published
//! projection snapshots over `ecs-api`'s read-only HTTP route. Installs no
//! domain systems itself; those are registered by whatever crate embeds
//! `ecs-core`/`ecs-runtime` to build an actual simulation.

use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;

use ecs_api::{Router, Server as ApiServer, Snapshots};
use ecs_core::config::EngineConfig;
use ecs_core::Store;
use ecs_runtime::Setup;

#[derive(Parser, Debug)]
#[command(about = "Entity-component-system runtime server")]
struct Args {
    /// Address the projection subscription server listens on.
    #[arg(long, default_value = "127.0.0.1:8080")]
    bind: SocketAddr,

    /// Frames per second; clamped to the engine's supported range (15-240).
    #[arg(long, default_value_t = 60)]
    fps: u32,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let config = EngineConfig {
        fps_limit: args.fps,
        ..EngineConfig::default()
    };
    let store = Arc::new(Store::new(config));

    let snapshots = Snapshots::new();
    let mut scheduler = Setup::new(store).build();

    let api_server = ApiServer::new(args.bind, Router::new(snapshots));
    let api_handle = tokio::spawn(async move {
        if let Err(err) = api_server.serve().await {
            tracing::error!(error = %err, "projection subscription server exited");
        }
    });

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    let signal_handle = tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        tracing::info!("shutdown signal received");
        let _ = shutdown_tx.send(());
    });

    scheduler.run(shutdown_rx).await?;

    api_handle.abort();
    signal_handle.abort();
    Ok(())
}
