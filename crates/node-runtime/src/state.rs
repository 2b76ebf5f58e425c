//! Mutable node state guarded by a single lock.

use std::collections::{HashSet, VecDeque};

use chain_engine::Chain;

/// All mutable state owned by a node.
///
/// Every read or mutation happens under the node's single mutex. Network
/// calls and Proof-of-Work searches operate on copies taken while the
/// lock was held, never on live references across an await point.
pub struct NodeState {
    /// The chain this node owns exclusively.
    pub chain: Chain,
    /// Known peer addresses, e.g. `http://localhost:5502`.
    pub peers: HashSet<String>,
    /// Contributions waiting to be mined, FIFO.
    pub transaction_pool: VecDeque<String>,
    /// Contributions whose mining was interrupted; drained before the pool.
    pub pending_transactions: VecDeque<String>,
    /// Whether a mining task is in flight.
    pub mining: bool,
    /// Whether the auto-mining loop is enabled.
    pub auto_mine: bool,
    /// Seconds between auto-mining attempts.
    pub mine_interval_secs: u64,
}

impl NodeState {
    /// Fresh state around a chain.
    pub fn new(chain: Chain, auto_mine: bool, mine_interval_secs: u64) -> Self {
        Self {
            chain,
            peers: HashSet::new(),
            transaction_pool: VecDeque::new(),
            pending_transactions: VecDeque::new(),
            mining: false,
            auto_mine,
            mine_interval_secs,
        }
    }

    /// Peer list copy for use outside the lock.
    pub fn peers_snapshot(&self) -> Vec<String> {
        self.peers.iter().cloned().collect()
    }

    /// Union `incoming` into the peer set, skipping `self_address`.
    /// Peer lists are never replaced, only grown. Returns the addresses
    /// that were actually new.
    pub fn merge_peers(
        &mut self,
        incoming: impl IntoIterator<Item = String>,
        self_address: &str,
    ) -> Vec<String> {
        let mut added = Vec::new();
        for peer in incoming {
            if peer != self_address && self.peers.insert(peer.clone()) {
                added.push(peer);
            }
        }
        added
    }
}
