//! Node configuration.

use std::path::PathBuf;

/// Runtime configuration for a single node.
#[derive(Clone, Debug)]
pub struct NodeConfig {
    /// Host the HTTP surface binds to.
    pub host: String,

    /// Port the HTTP surface binds to.
    pub port: u16,

    /// Tracker base URL used for bootstrap registration.
    pub tracker_url: String,

    /// Start the auto-mining loop at boot.
    pub auto_mine: bool,

    /// Seconds between auto-mining attempts.
    pub mine_interval_secs: u64,

    /// Custom genesis payload. Every node in a network must agree on it,
    /// or their genesis hashes diverge and no chain will sync.
    pub genesis_data: Option<String>,

    /// Directory for chain snapshots; `None` disables snapshotting.
    pub snapshot_dir: Option<PathBuf>,

    /// Seconds between periodic fork-resolution passes.
    pub sync_interval_secs: u64,
}

impl NodeConfig {
    /// The externally reachable address peers use for this node.
    pub fn address(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5501,
            tracker_url: "http://localhost:5500".to_string(),
            auto_mine: false,
            mine_interval_secs: 10,
            genesis_data: None,
            snapshot_dir: None,
            sync_interval_secs: 30,
        }
    }
}
