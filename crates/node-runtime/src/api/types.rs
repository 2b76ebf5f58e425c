//! Request bodies for the node's HTTP surface.
//!
//! Fields are optional at the serde layer so missing ones answer 400
//! from the handlers instead of a framework rejection.

use serde::Deserialize;

/// Body of `POST /add_transaction`.
#[derive(Debug, Deserialize)]
pub struct AddTransactionRequest {
    /// The contribution payload.
    pub data: Option<String>,
    /// The head hash the contribution was written against.
    pub previous_hash: Option<String>,
}

/// Body of `POST /mine`.
#[derive(Debug, Deserialize)]
pub struct MineRequest {
    /// The payload to mine.
    pub data: Option<String>,
}

/// Body of `POST /discover`.
#[derive(Debug, Deserialize)]
pub struct DiscoverRequest {
    /// The requester's reachable address.
    pub address: Option<String>,
}

/// Body of `POST /update_peers`.
#[derive(Debug, Deserialize)]
pub struct UpdatePeersRequest {
    /// Addresses to union into the peer set.
    #[serde(default)]
    pub peers: Vec<String>,
}

/// Body of `POST /auto_mine`.
#[derive(Debug, Deserialize)]
pub struct AutoMineRequest {
    /// Enable or disable the auto-mining loop. Defaults to enabling.
    pub enable: Option<bool>,
    /// New interval between attempts, in seconds.
    pub interval: Option<u64>,
}
