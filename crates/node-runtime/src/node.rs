//! The node: state ownership, transaction intake, block receipt, and
//! mining orchestration.
//!
//! Mining follows a small state machine driven by the mutex-protected
//! `mining` flag: IDLE -> MINING -> (COMMITTED | ABORTED) -> IDLE. The
//! Proof-of-Work search itself runs on a blocking thread outside the
//! lock, and losing a race to a peer's block is ordinary steady-state
//! behavior: the local candidate is discarded and its payload requeued.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use chain_engine::{
    position_id_of, proof_of_work, quality_score, Block, BlockRejection, Chain, EngineConfig,
    StoryPayload,
};

use crate::client::RetryingClient;
use crate::config::NodeConfig;
use crate::consensus::Candidate;
use crate::error::{NodeError, Result};
use crate::snapshot::SnapshotStore;
use crate::state::NodeState;

/// How often the startup discovery/sync round repeats.
const STARTUP_SYNC_ATTEMPTS: u32 = 3;

/// Outcome of accepting a peer block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockOutcome {
    /// Appended as the new head.
    Appended,
    /// Adopted via localized splice repair.
    Repaired,
}

/// Snapshot of node health returned by the status endpoint.
#[derive(Debug, Serialize)]
pub struct StatusReport {
    pub chain_length: usize,
    pub latest_block: LatestBlockSummary,
    pub is_mining: bool,
    pub auto_mining: bool,
    pub mine_interval: u64,
    pub peer_count: usize,
    pub transaction_pool_size: usize,
    pub pending_transactions: usize,
    pub address: String,
}

/// Abbreviated head-block info for status reports.
#[derive(Debug, Serialize)]
pub struct LatestBlockSummary {
    pub index: u64,
    pub hash: String,
    pub timestamp: String,
    pub difficulty: u32,
}

/// A running StoryChain node.
pub struct Node {
    config: NodeConfig,
    state: Mutex<NodeState>,
    client: RetryingClient,
    snapshots: Arc<dyn SnapshotStore>,
    /// Cooperative cancellation observed by the in-flight PoW search.
    mining_cancel: Arc<AtomicBool>,
    /// Node-wide shutdown signal observed by background tasks.
    shutdown_tx: watch::Sender<bool>,
    /// Weak self-reference for handing strong clones to spawned tasks.
    self_weak: Weak<Node>,
}

impl Node {
    /// Build a node around a fresh chain.
    pub fn new(
        config: NodeConfig,
        engine: EngineConfig,
        snapshots: Arc<dyn SnapshotStore>,
    ) -> Arc<Self> {
        info!(
            address = %config.address(),
            tracker = %config.tracker_url,
            auto_mine = config.auto_mine,
            "initializing node"
        );
        let chain = Chain::new(engine, config.genesis_data.as_deref());
        let state = NodeState::new(chain, config.auto_mine, config.mine_interval_secs);
        let (shutdown_tx, _) = watch::channel(false);
        Arc::new_cyclic(|weak| Self {
            config,
            state: Mutex::new(state),
            client: RetryingClient::new(),
            snapshots,
            mining_cancel: Arc::new(AtomicBool::new(false)),
            shutdown_tx,
            self_weak: weak.clone(),
        })
    }

    /// Strong handle for spawned tasks. The weak reference is set at
    /// construction and the node outlives every task it spawns.
    fn handle(&self) -> Arc<Self> {
        self.self_weak.upgrade().expect("node is alive")
    }

    /// The address peers reach this node at.
    pub fn address(&self) -> String {
        self.config.address()
    }

    /// The tracker this node bootstraps from.
    pub fn tracker_url(&self) -> &str {
        &self.config.tracker_url
    }

    /// The outbound HTTP client shared by every network path.
    pub fn client(&self) -> &RetryingClient {
        &self.client
    }

    /// Copy of the full chain in wire form.
    pub fn chain_blocks(&self) -> Vec<Block> {
        self.state.lock().chain.blocks().to_vec()
    }

    /// Current chain length.
    pub fn chain_len(&self) -> usize {
        self.state.lock().chain.len()
    }

    /// Chain length plus engine config, copied out for fork resolution.
    pub(crate) fn chain_overview(&self) -> (usize, EngineConfig) {
        let state = self.state.lock();
        (state.chain.len(), state.chain.config().clone())
    }

    /// Copy of the peer set.
    pub fn peers_snapshot(&self) -> Vec<String> {
        self.state.lock().peers_snapshot()
    }

    /// Union peers into the local set (own address excluded). Returns the
    /// addresses that were new.
    pub fn merge_peers(&self, incoming: Vec<String>) -> Vec<String> {
        let address = self.address();
        self.state.lock().merge_peers(incoming, &address)
    }

    /// Subscribe to the shutdown signal.
    pub fn subscribe_shutdown(&self) -> watch::Receiver<bool> {
        self.shutdown_tx.subscribe()
    }

    /// Flip the shutdown signal; background tasks drain cooperatively.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    /// Persist a chain snapshot in the background.
    pub fn persist_snapshot(&self, label: &str) {
        let blocks = self.chain_blocks();
        let store = Arc::clone(&self.snapshots);
        let label = label.to_string();
        tokio::spawn(async move { store.persist(&label, &blocks).await });
    }

    /// Node health summary.
    pub fn status(&self) -> StatusReport {
        let state = self.state.lock();
        let latest = state.chain.latest();
        StatusReport {
            chain_length: state.chain.len(),
            latest_block: LatestBlockSummary {
                index: latest.index,
                hash: latest.hash.chars().take(8).collect(),
                timestamp: latest.timestamp.to_rfc3339(),
                difficulty: latest.difficulty,
            },
            is_mining: state.mining,
            auto_mining: state.auto_mine,
            mine_interval: state.mine_interval_secs,
            peer_count: state.peers.len(),
            transaction_pool_size: state.transaction_pool.len(),
            pending_transactions: state.pending_transactions.len(),
            address: self.address(),
        }
    }

    // =========================================================================
    // TRANSACTION INTAKE
    // =========================================================================

    /// Queue a contribution for mining.
    ///
    /// Rejected when the caller's head hint is stale (the response carries
    /// the expected hash so the caller can regenerate), or when the
    /// payload's structured story position already exists in the chain or
    /// the pool. Returns the pool size after queuing.
    pub fn add_transaction(&self, data: String, previous_hash: &str) -> Result<usize> {
        let (pool_size, trigger) = {
            let mut state = self.state.lock();
            let head = state.chain.latest();
            if head.hash != previous_hash {
                return Err(NodeError::StaleHead {
                    expected_hash: head.hash.clone(),
                    latest_block_index: head.index,
                });
            }
            if let StoryPayload::Structured { position } = StoryPayload::parse(&data) {
                let position_id = position_id_of(&position);
                let queued_duplicate = state
                    .transaction_pool
                    .iter()
                    .chain(state.pending_transactions.iter())
                    .any(|queued| queued_position_matches(queued, &position_id));
                if state.chain.contains_position(&position_id) || queued_duplicate {
                    return Err(NodeError::DuplicatePosition { position_id });
                }
            }
            state.transaction_pool.push_back(data);
            info!(
                pool_size = state.transaction_pool.len(),
                "transaction added to pool"
            );
            (
                state.transaction_pool.len(),
                state.auto_mine && !state.mining,
            )
        };
        if trigger {
            self.check_and_trigger_mining();
        }
        Ok(pool_size)
    }

    // =========================================================================
    // BLOCK RECEIPT (gossip inbound)
    // =========================================================================

    /// Validate and integrate a block received from a peer.
    pub fn handle_block(&self, block: Block) -> Result<BlockOutcome> {
        let mut state = self.state.lock();

        // Uniqueness is enforced strictly on direct receipt; it is only
        // relaxed inside fork resolution.
        if state
            .chain
            .contains_position(&block.story_position.position_id)
        {
            return Err(NodeError::DuplicatePosition {
                position_id: block.story_position.position_id.clone(),
            });
        }

        let head_index = state.chain.latest().index;
        if block.index == head_index + 1 {
            if state.mining {
                info!(
                    index = block.index,
                    "received the block we were racing for, stopping local mining"
                );
                self.stop_mining();
            }
            match state.chain.try_append(block.clone()) {
                Ok(()) => {
                    let resume = if state.mining {
                        None
                    } else {
                        state.pending_transactions.pop_front()
                    };
                    let schedule_auto = state.auto_mine && !state.mining && resume.is_none();
                    let interval = state.mine_interval_secs;
                    drop(state);

                    info!(index = block.index, hash = %block.hash, "peer block appended");
                    self.persist_snapshot(&format!("add_block_{}", block.index));
                    if let Some(next) = resume {
                        info!("restarting mining with next pending contribution");
                        self.start_mining(next);
                    } else if schedule_auto {
                        self.schedule_next_auto_mining(interval);
                    }
                    Ok(BlockOutcome::Appended)
                }
                Err(rejection) => {
                    drop(state);
                    warn!(error = %rejection, "peer block failed validation, scheduling sync");
                    self.spawn_sync();
                    Err(NodeError::Validation(rejection))
                }
            }
        } else if block.index > head_index + 1 {
            drop(state);
            info!(
                index = block.index,
                head_index, "peer block is ahead of us, scheduling sync"
            );
            self.spawn_sync();
            Err(NodeError::ChainAhead {
                index: block.index,
                head_index,
            })
        } else {
            // Behind the head: try a localized splice repair.
            let current_score = quality_score(&state.chain);
            let repaired = state
                .chain
                .spliced_with(&block)
                .filter(|candidate| quality_score(candidate) > current_score);
            match repaired {
                Some(candidate) => {
                    state.chain.replace_with(candidate);
                    if state.mining {
                        self.stop_mining();
                    }
                    drop(state);
                    info!(index = block.index, "adopted block via splice repair");
                    self.persist_snapshot("splice_repair");
                    Ok(BlockOutcome::Repaired)
                }
                None => {
                    drop(state);
                    Err(NodeError::NotNeeded { index: block.index })
                }
            }
        }
    }

    // =========================================================================
    // MINING ORCHESTRATION
    // =========================================================================

    /// Begin mining `data`, or report `false` when a mining task is
    /// already in flight.
    pub fn start_mining(&self, data: String) -> bool {
        {
            let mut state = self.state.lock();
            if state.mining {
                return false;
            }
            state.mining = true;
        }
        self.mining_cancel.store(false, Ordering::Relaxed);
        let node = self.handle();
        tokio::spawn(async move { node.mine_task(data).await });
        true
    }

    /// Start mining, or queue the payload when mining is already running.
    /// Returns the queue position when queued.
    pub fn start_or_queue_mining(&self, data: String) -> Option<usize> {
        if self.start_mining(data.clone()) {
            None
        } else {
            let mut state = self.state.lock();
            state.pending_transactions.push_back(data);
            Some(state.pending_transactions.len())
        }
    }

    /// Cooperative stop: the PoW loop observes the flag between hash
    /// batches and discards its own result; nothing is preempted
    /// mid-attempt.
    pub fn stop_mining(&self) {
        self.mining_cancel.store(true, Ordering::Relaxed);
    }

    /// The mining task: sync, search, re-validate, commit, gossip, and
    /// either continue with the next pending payload or return to idle.
    async fn mine_task(self: Arc<Self>, first: String) {
        // Sync with the network first so the search starts from the
        // freshest head and wastes as little work as possible.
        self.sync_chain().await;

        let mut payload = first;
        loop {
            let (candidate, engine) = {
                let mut state = self.state.lock();
                self.mining_cancel.store(false, Ordering::Relaxed);
                (
                    state.chain.build_candidate(&payload),
                    state.chain.config().clone(),
                )
            };
            info!(
                index = candidate.index,
                difficulty = candidate.difficulty,
                "starting proof-of-work search"
            );

            let cancel = Arc::clone(&self.mining_cancel);
            let mined =
                tokio::task::spawn_blocking(move || proof_of_work(candidate, &engine, &cancel))
                    .await
                    .ok()
                    .flatten();

            let Some(block) = mined else {
                // The race was lost or a stop was requested: requeue the
                // payload so it mines against the new head later.
                {
                    let mut state = self.state.lock();
                    state.pending_transactions.push_front(payload);
                    state.mining = false;
                }
                info!("mining aborted, payload requeued");
                self.spawn_sync();
                return;
            };

            enum Commit {
                Committed,
                Stale,
                Rejected(BlockRejection),
            }
            let commit = {
                let mut state = self.state.lock();
                if block.previous_hash != state.chain.latest().hash {
                    state.pending_transactions.push_front(payload.clone());
                    state.mining = false;
                    Commit::Stale
                } else {
                    match state.chain.try_append(block.clone()) {
                        Ok(()) => Commit::Committed,
                        Err(rejection) => {
                            state.mining = false;
                            Commit::Rejected(rejection)
                        }
                    }
                }
            };
            match commit {
                Commit::Stale => {
                    warn!(
                        index = block.index,
                        "chain advanced during mining, candidate discarded"
                    );
                    self.spawn_sync();
                    return;
                }
                Commit::Rejected(rejection) => {
                    // Typically a story position that arrived via sync while
                    // we were searching; the payload is dropped, not retried.
                    warn!(error = %rejection, "mined block failed validation, payload dropped");
                    return;
                }
                Commit::Committed => {}
            }

            info!(index = block.index, hash = %block.hash, "mined and appended block");
            self.persist_snapshot(&format!("mined_{}", block.index));

            // Refresh peers, push the block out, then look for more peers.
            crate::tracker::refresh_peers(&self).await;
            crate::gossip::broadcast_block(&self, &block).await;
            let discoverer = Arc::clone(&self);
            tokio::spawn(async move {
                crate::discovery::discover_from_all_peers(&discoverer).await;
            });

            let next = {
                let mut state = self.state.lock();
                let next = state.pending_transactions.pop_front();
                if next.is_none() {
                    state.mining = false;
                }
                next
            };
            match next {
                Some(next_payload) => payload = next_payload,
                None => {
                    let (auto, interval) = {
                        let state = self.state.lock();
                        (state.auto_mine, state.mine_interval_secs)
                    };
                    if auto {
                        self.schedule_next_auto_mining(interval);
                    }
                    return;
                }
            }
        }
    }

    /// Pick one payload (pool first, then pending) and start mining it.
    pub fn check_and_trigger_mining(&self) {
        let data = {
            let mut state = self.state.lock();
            if state.mining {
                return;
            }
            state
                .transaction_pool
                .pop_front()
                .or_else(|| state.pending_transactions.pop_front())
        };
        let Some(data) = data else {
            debug!("no queued contributions, skipping mining trigger");
            return;
        };
        info!("mining triggered from the queue");
        if !self.start_mining(data.clone()) {
            // Someone else began mining between the pop and the start;
            // hand the payload back.
            self.state.lock().pending_transactions.push_front(data);
        }
    }

    /// Enable or disable auto-mining; returns the pool size. Enabling
    /// spawns the loop when it was previously off.
    pub fn set_auto_mine(&self, enable: bool, interval: Option<u64>) -> usize {
        let (start_loop, pool_size) = {
            let mut state = self.state.lock();
            let was_enabled = state.auto_mine;
            state.auto_mine = enable;
            if let Some(secs) = interval {
                state.mine_interval_secs = secs;
            }
            (enable && !was_enabled, state.transaction_pool.len())
        };
        if start_loop {
            info!("auto-mining enabled");
            let node = self.handle();
            tokio::spawn(async move { node.auto_mine_loop().await });
        } else if !enable {
            info!("auto-mining disabled");
        }
        pool_size
    }

    /// Background loop: trigger mining on queued contributions every
    /// `mine_interval`, checking the stop conditions each second.
    pub(crate) async fn auto_mine_loop(self: Arc<Self>) {
        info!("auto-mining loop started");
        let shutdown = self.subscribe_shutdown();
        loop {
            if *shutdown.borrow() || !self.state.lock().auto_mine {
                break;
            }
            self.check_and_trigger_mining();
            let interval = self.state.lock().mine_interval_secs;
            for _ in 0..interval.max(1) {
                if *shutdown.borrow() || !self.state.lock().auto_mine {
                    info!("auto-mining loop stopped");
                    return;
                }
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
        }
        info!("auto-mining loop stopped");
    }

    fn schedule_next_auto_mining(&self, interval: u64) {
        debug!(interval, "next auto-mining attempt scheduled");
        let node = self.handle();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(interval)).await;
            node.check_and_trigger_mining();
        });
    }

    // =========================================================================
    // SYNC AND PEER MANAGEMENT
    // =========================================================================

    /// Refresh peers from the tracker, then run fork resolution. Returns
    /// true when the local chain was replaced.
    pub async fn sync_chain(&self) -> bool {
        debug!("synchronizing chain with the network");
        let node = self.handle();
        crate::tracker::refresh_peers(&node).await;
        let replaced = crate::consensus::resolve_conflicts(&node).await;
        self.persist_snapshot("after_sync");
        replaced
    }

    /// Run a sync in the background.
    pub fn spawn_sync(&self) {
        let node = self.handle();
        tokio::spawn(async move {
            node.sync_chain().await;
        });
    }

    /// Adopt the winning fork candidate when it strictly outranks the
    /// local chain (ties resolved toward the smaller head hash). The
    /// local score is recomputed under the lock because the chain may
    /// have advanced since the candidate was fetched.
    pub fn adopt_if_better(&self, winner: Candidate) -> bool {
        let mut state = self.state.lock();
        let local_score = quality_score(&state.chain);
        let local_head = state.chain.latest().hash.clone();
        if !chain_engine::outranks(winner.score, &winner.head_hash, local_score, &local_head) {
            debug!("local chain is already the best candidate, keeping it");
            return false;
        }
        let old_length = state.chain.len();
        let new_length = winner.chain.len();
        let source = winner.source;
        state.chain.replace_with(winner.chain);
        if state.mining {
            info!("stopping mining due to chain replacement");
            self.stop_mining();
        }
        drop(state);
        info!(
            old_length,
            new_length,
            source = %source,
            "replaced local chain with better fork candidate"
        );
        self.persist_snapshot(&format!("replaced_chain_{new_length}"));
        true
    }

    /// Handle a peer-list push (from the tracker or a peer). New peers
    /// trigger a background sync, and when the chain is past genesis the
    /// latest block is pushed to them so late joiners catch up quickly.
    pub fn update_peers(&self, incoming: Vec<String>) {
        let added = self.merge_peers(incoming);
        if added.is_empty() {
            return;
        }
        info!(added = added.len(), "peer list grew, scheduling sync");
        self.spawn_sync();
        let latest = {
            let state = self.state.lock();
            (state.chain.len() > 1).then(|| state.chain.latest().clone())
        };
        if let Some(block) = latest {
            crate::gossip::push_block_to_peers(&self.handle(), block, added);
        }
    }

    /// Handle a discovery handshake: register the requester, answer with
    /// our peers (minus the requester) and chain length, and push our
    /// latest block to a previously unknown requester.
    pub fn handle_discover(&self, requester: String) -> (Vec<String>, usize) {
        let (newly_known, peers, chain_length, latest) = {
            let mut state = self.state.lock();
            let added = state.merge_peers([requester.clone()], &self.address());
            let peers = state
                .peers
                .iter()
                .filter(|peer| **peer != requester)
                .cloned()
                .collect::<Vec<_>>();
            let latest =
                (!added.is_empty() && state.chain.len() > 1).then(|| state.chain.latest().clone());
            (!added.is_empty(), peers, state.chain.len(), latest)
        };
        if newly_known {
            info!(peer = %requester, "added new peer via direct discovery");
        }
        if let Some(block) = latest {
            crate::gossip::push_block_to_peers(&self.handle(), block, vec![requester]);
        }
        (peers, chain_length)
    }

    // =========================================================================
    // LIFECYCLE
    // =========================================================================

    /// Register with the tracker and start the background tasks: the
    /// initial discovery/sync rounds, the periodic sync loop, and the
    /// auto-mining loop when enabled.
    pub async fn start(&self) {
        let node = self.handle();
        crate::tracker::register(&node).await;

        tokio::spawn(async move {
            // Give the tracker and early peers a moment to settle.
            tokio::time::sleep(Duration::from_secs(2)).await;
            for attempt in 1..=STARTUP_SYNC_ATTEMPTS {
                debug!(attempt, "startup discovery and sync round");
                node.sync_chain().await;
                if crate::discovery::discover_from_all_peers(&node).await {
                    node.sync_chain().await;
                }
                if attempt < STARTUP_SYNC_ATTEMPTS {
                    tokio::time::sleep(Duration::from_secs(2)).await;
                }
            }
            info!(
                peers = node.peers_snapshot().len(),
                chain_length = node.chain_len(),
                "initial discovery and sync complete"
            );
            node.start_periodic_sync();

            let auto = node.state.lock().auto_mine;
            if auto {
                info!("starting automatic mining");
                let miner = Arc::clone(&node);
                tokio::spawn(async move { miner.auto_mine_loop().await });
            }
        });
    }

    /// Periodic fork resolution, skipped while mining.
    fn start_periodic_sync(&self) {
        let node = self.handle();
        let interval = self.config.sync_interval_secs;
        tokio::spawn(async move {
            let mut shutdown = node.subscribe_shutdown();
            info!(interval, "periodic sync started");
            loop {
                tokio::select! {
                    _ = tokio::time::sleep(Duration::from_secs(interval)) => {}
                    _ = shutdown.changed() => {
                        if *shutdown.borrow() {
                            break;
                        }
                    }
                }
                if node.state.lock().mining {
                    debug!("skipping periodic sync while mining");
                    continue;
                }
                node.sync_chain().await;
            }
            info!("periodic sync stopped");
        });
    }
}

fn queued_position_matches(queued: &str, position_id: &str) -> bool {
    match StoryPayload::parse(queued) {
        StoryPayload::Structured { position } => position_id_of(&position) == position_id,
        StoryPayload::Opaque => false,
    }
}
