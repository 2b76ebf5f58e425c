//! Chain snapshot persistence (outbound port).
//!
//! Snapshots are a debugging aid written after notable events (mining,
//! appends, chain replacement). Failures are logged and never propagate
//! into the mining or sync flows.

use std::path::PathBuf;

use async_trait::async_trait;
use chain_engine::Block;
use chrono::Utc;
use tracing::{debug, error};

/// Outbound port for persisting chain state.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Persist the chain under an event label.
    async fn persist(&self, label: &str, blocks: &[Block]);
}

/// Writes one JSON file per event under a data directory.
pub struct JsonFileSnapshotStore {
    dir: PathBuf,
    node_id: String,
}

impl JsonFileSnapshotStore {
    /// Store writing `<node_id>_<label>_<timestamp>.json` files to `dir`.
    pub fn new(dir: PathBuf, node_id: impl Into<String>) -> Self {
        Self {
            dir,
            node_id: node_id.into(),
        }
    }
}

#[async_trait]
impl SnapshotStore for JsonFileSnapshotStore {
    async fn persist(&self, label: &str, blocks: &[Block]) {
        let json = match serde_json::to_string_pretty(blocks) {
            Ok(json) => json,
            Err(error) => {
                error!(%error, "failed to serialize chain snapshot");
                return;
            }
        };
        let stamp = Utc::now().format("%Y%m%d_%H%M%S");
        let path = self
            .dir
            .join(format!("{}_{}_{}.json", self.node_id, label, stamp));
        if let Err(error) = tokio::fs::create_dir_all(&self.dir).await {
            error!(dir = %self.dir.display(), %error, "failed to create snapshot directory");
            return;
        }
        match tokio::fs::write(&path, json).await {
            Ok(()) => debug!(path = %path.display(), label, "chain snapshot persisted"),
            Err(error) => error!(path = %path.display(), %error, "failed to write snapshot"),
        }
    }
}

/// Discards snapshots; used when no data directory is configured.
pub struct NullSnapshotStore;

#[async_trait]
impl SnapshotStore for NullSnapshotStore {
    async fn persist(&self, _label: &str, _blocks: &[Block]) {}
}
