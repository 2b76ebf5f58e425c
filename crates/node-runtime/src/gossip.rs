//! Block gossip: pushing freshly committed blocks to peers.

use std::sync::Arc;
use std::time::Duration;

use reqwest::StatusCode;
use tracing::{debug, info, warn};

use chain_engine::Block;

use crate::node::Node;

/// Delay between the repair handshake and the single block retry, giving
/// the rejecting peer time to finish the sync the handshake triggers.
const REPAIR_RETRY_DELAY: Duration = Duration::from_millis(500);

/// Broadcast `block` to every known peer.
///
/// Peers that answered 409 have diverged. When at least one other peer
/// accepted the block, each rejecting peer gets a two-step repair in the
/// background: a discovery handshake (so it learns of this node and can
/// sync), then one retry of the block.
pub async fn broadcast_block(node: &Arc<Node>, block: &Block) {
    let peers = node.peers_snapshot();
    if peers.is_empty() {
        debug!("no peers to broadcast to");
        return;
    }
    info!(
        index = block.index,
        hash = %block.hash,
        peers = peers.len(),
        "broadcasting block"
    );

    let mut accepted = 0usize;
    let mut rejected = Vec::new();
    for peer in peers {
        let url = format!("{peer}/add_block");
        match node.client().post_json(&url, block).await {
            Some(response) if response.status == StatusCode::CREATED => accepted += 1,
            Some(response) if response.status == StatusCode::CONFLICT => {
                debug!(peer = %peer, "peer rejected block as conflicting");
                rejected.push(peer);
            }
            Some(response) => {
                debug!(peer = %peer, status = %response.status, "unexpected broadcast response");
            }
            None => warn!(peer = %peer, "peer unreachable for broadcast"),
        }
    }

    if accepted > 0 && !rejected.is_empty() {
        info!(
            accepted,
            rejected = rejected.len(),
            "scheduling repair for rejecting peers"
        );
        for peer in rejected {
            let node = Arc::clone(node);
            let block = block.clone();
            tokio::spawn(async move { repair_rejecting_peer(&node, &peer, &block).await });
        }
    }
}

/// Two-step repair: handshake so the peer knows us and syncs, then one
/// delayed retry of the block.
async fn repair_rejecting_peer(node: &Arc<Node>, peer: &str, block: &Block) {
    info!(peer, index = block.index, "attempting broadcast repair");
    crate::discovery::discover_peer(node, peer).await;
    tokio::time::sleep(REPAIR_RETRY_DELAY).await;

    let url = format!("{peer}/add_block");
    match node.client().post_json(&url, block).await {
        Some(response) if response.status == StatusCode::CREATED => {
            info!(peer, "repair retry accepted");
        }
        Some(response) => debug!(peer, status = %response.status, "repair retry not accepted"),
        None => warn!(peer, "peer unreachable for repair retry"),
    }
}

/// Push a block to a specific set of peers in the background (late
/// joiners and fresh discoveries).
pub fn push_block_to_peers(node: &Arc<Node>, block: Block, peers: Vec<String>) {
    if peers.is_empty() {
        return;
    }
    debug!(
        index = block.index,
        peers = peers.len(),
        "pushing latest block to specific peers"
    );
    let node = Arc::clone(node);
    tokio::spawn(async move {
        for peer in peers {
            let url = format!("{peer}/add_block");
            if node.client().post_json(&url, &block).await.is_none() {
                warn!(peer = %peer, "failed to push block to peer");
            }
        }
    });
}
