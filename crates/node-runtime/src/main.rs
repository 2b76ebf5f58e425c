//! StoryChain node binary.
//!
//! Boots a single node: chain engine, background tasks, and the HTTP
//! surface. Peers and the tracker are plain HTTP collaborators, so a
//! local network is just several of these processes pointed at one
//! tracker.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use chain_engine::EngineConfig;
use node_runtime::api;
use node_runtime::config::NodeConfig;
use node_runtime::node::Node;
use node_runtime::snapshot::{JsonFileSnapshotStore, NullSnapshotStore, SnapshotStore};
use node_runtime::tracker;

/// Command-line options for a StoryChain node.
#[derive(Debug, Parser)]
#[command(name = "node-runtime", about = "StoryChain collaborative-story blockchain node")]
struct Cli {
    /// Host address to bind to.
    #[arg(long, default_value = "localhost")]
    host: String,

    /// Port to bind to.
    #[arg(long, default_value_t = 5501)]
    port: u16,

    /// Tracker URL, e.g. http://localhost:5500.
    #[arg(long, env = "STORYCHAIN_TRACKER")]
    tracker: String,

    /// Enable automatic mining of queued contributions.
    #[arg(long)]
    auto_mine: bool,

    /// Seconds between auto-mining attempts.
    #[arg(long, default_value_t = 10)]
    mine_interval: u64,

    /// Custom genesis payload; every node in the network must agree on it.
    #[arg(long)]
    genesis_data: Option<String>,

    /// Directory for chain snapshots (disabled when omitted).
    #[arg(long)]
    snapshot_dir: Option<std::path::PathBuf>,

    /// Mining difficulty for the first blocks.
    #[arg(long, default_value_t = 2)]
    difficulty: u32,
}

#[tokio::main]
async fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let cli = Cli::parse();
    let config = NodeConfig {
        host: cli.host,
        port: cli.port,
        tracker_url: cli.tracker,
        auto_mine: cli.auto_mine,
        mine_interval_secs: cli.mine_interval,
        genesis_data: cli.genesis_data,
        snapshot_dir: cli.snapshot_dir,
        ..NodeConfig::default()
    };
    let engine = EngineConfig {
        initial_difficulty: cli.difficulty,
        ..EngineConfig::default()
    };

    let snapshots: Arc<dyn SnapshotStore> = match &config.snapshot_dir {
        Some(dir) => Arc::new(JsonFileSnapshotStore::new(
            dir.clone(),
            format!("node_{}", config.port),
        )),
        None => Arc::new(NullSnapshotStore),
    };

    let node = Node::new(config.clone(), engine, snapshots);
    node.persist_snapshot("init");
    node.start().await;

    let listener = tokio::net::TcpListener::bind((config.host.as_str(), config.port))
        .await
        .with_context(|| format!("failed to bind {}:{}", config.host, config.port))?;
    info!(address = %config.address(), "node HTTP surface listening");

    let router = api::router(Arc::clone(&node));
    let shutdown_node = Arc::clone(&node);
    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown signal received");
            tracker::unregister(&shutdown_node).await;
            shutdown_node.shutdown();
        })
        .await
        .context("HTTP server failed")?;

    Ok(())
}
