//! Direct peer-to-peer discovery, independent of the tracker.

use std::sync::Arc;

use reqwest::StatusCode;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::node::Node;

/// Contact `target` with our own address. The target registers us,
/// answers with its peer list and chain length; its peers are unioned
/// into ours, and a longer remote chain schedules a background sync.
pub async fn discover_peer(node: &Arc<Node>, target: &str) -> bool {
    debug!(target, "attempting direct discovery");
    let body = json!({ "address": node.address() });
    let Some(response) = node
        .client()
        .post_json(&format!("{target}/discover"), &body)
        .await
    else {
        warn!(target, "discovery request failed");
        return false;
    };
    if response.status != StatusCode::OK {
        warn!(target, status = %response.status, "discovery rejected");
        return false;
    }

    let peers: Vec<String> = response
        .body
        .get("peers")
        .and_then(|value| serde_json::from_value(value.clone()).ok())
        .unwrap_or_default();
    let remote_length = response
        .body
        .get("chain_length")
        .and_then(Value::as_u64)
        .unwrap_or(0) as usize;

    let added = node.merge_peers(peers);
    if !added.is_empty() {
        info!(target, added = added.len(), "added peers via discovery");
    }
    if remote_length > node.chain_len() {
        info!(
            target,
            remote_length, "remote peer has a longer chain, scheduling sync"
        );
        node.spawn_sync();
    }
    true
}

/// Fan discovery out to every known peer; fall back to a tracker refresh
/// when the peer set is empty.
pub async fn discover_from_all_peers(node: &Arc<Node>) -> bool {
    let peers = node.peers_snapshot();
    if peers.is_empty() {
        debug!("no peers to discover from, refreshing from tracker");
        crate::tracker::refresh_peers(node).await;
        return false;
    }
    let mut reached_any = false;
    for peer in peers {
        if discover_peer(node, &peer).await {
            reached_any = true;
        }
    }
    reached_any
}
