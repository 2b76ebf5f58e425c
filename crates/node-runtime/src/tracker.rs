//! Tracker client: bootstrap registration and peer-list refresh.
//!
//! The tracker is an external directory service that only seeds peer
//! addresses; gossip and discovery carry everything else. A tracker that
//! stays unreachable degrades bootstrapping and is never fatal.

use std::sync::Arc;

use reqwest::StatusCode;
use serde_json::json;
use tracing::{debug, info, warn};

use crate::node::Node;

/// Register this node's address; the response seeds the peer set.
pub async fn register(node: &Arc<Node>) {
    let url = format!("{}/register", node.tracker_url());
    info!(url = %url, "registering with tracker");
    let body = json!({ "address": node.address() });
    match node.client().post_json(&url, &body).await {
        Some(response) if response.status == StatusCode::OK => {
            let peers: Vec<String> = response
                .body
                .get("peers")
                .and_then(|value| serde_json::from_value(value.clone()).ok())
                .unwrap_or_default();
            let added = node.merge_peers(peers);
            info!(peers = added.len(), "registered with tracker");
        }
        Some(response) => {
            warn!(status = %response.status, "tracker rejected registration");
        }
        None => warn!("tracker unreachable, continuing without bootstrap peers"),
    }
}

/// Merge the tracker's current peer list into ours; re-register when the
/// local peer set is still empty afterwards.
pub async fn refresh_peers(node: &Arc<Node>) -> bool {
    let url = format!("{}/peers", node.tracker_url());
    let Some(body) = node.client().get_json(&url).await else {
        warn!("could not refresh peer list from tracker");
        return false;
    };
    let peers: Vec<String> = body
        .get("peers")
        .and_then(|value| serde_json::from_value(value.clone()).ok())
        .unwrap_or_default();
    let added = node.merge_peers(peers);
    if !added.is_empty() {
        info!(added = added.len(), "added peers from tracker refresh");
    } else {
        debug!("tracker refresh returned no new peers");
    }
    if node.peers_snapshot().is_empty() {
        info!("peer list empty after refresh, re-registering with tracker");
        register(node).await;
    }
    true
}

/// Best-effort unregistration on shutdown.
pub async fn unregister(node: &Arc<Node>) {
    let url = format!("{}/unregister", node.tracker_url());
    let body = json!({ "address": node.address() });
    if node.client().post_json(&url, &body).await.is_none() {
        debug!("tracker unreachable for unregistration");
    }
}
