//! Fork resolution: quality-scored chain selection over peer chains.
//!
//! This is a length-biased, duplicate-penalizing longest-chain rule, not
//! classic Nakamoto consensus. It tolerates and actively repairs the
//! accidental forks that concurrent mining on the same story position
//! produces. Runs at startup, on a periodic timer, on new-peer
//! discovery, and whenever a received block fails to append.

use std::sync::Arc;

use tracing::{debug, info, warn};

use chain_engine::{quality_score, Block, Chain, ValidationMode};

use crate::node::Node;

/// Peer chains up to this many blocks shorter than ours are still
/// admitted as candidates; quality, not raw length, decides the winner.
pub const LENGTH_TOLERANCE: usize = 2;

/// A validated candidate chain from a peer.
pub struct Candidate {
    /// Where the chain came from.
    pub source: String,
    /// The candidate chain itself.
    pub chain: Chain,
    /// Its quality score.
    pub score: i64,
    /// Its head hash, used for the deterministic tie-break.
    pub head_hash: String,
}

impl Candidate {
    /// Score a chain into a candidate.
    pub fn from_chain(source: impl Into<String>, chain: Chain) -> Self {
        let score = quality_score(&chain);
        let head_hash = chain.latest().hash.clone();
        Self {
            source: source.into(),
            chain,
            score,
            head_hash,
        }
    }
}

/// Pick the winning candidate: strictly highest quality score, ties
/// broken toward the lexicographically smaller head hash. Deterministic
/// and symmetric, so every node converges on the same winner regardless
/// of the order peers were queried in.
pub fn select_candidate(candidates: Vec<Candidate>) -> Option<Candidate> {
    candidates.into_iter().reduce(|best, contender| {
        if chain_engine::outranks(contender.score, &contender.head_hash, best.score, &best.head_hash)
        {
            contender
        } else {
            best
        }
    })
}

/// Fetch every peer's chain, validate in relaxed mode, score, and replace
/// the local chain when the winner strictly outranks it. Returns true
/// when the local chain was replaced.
pub async fn resolve_conflicts(node: &Arc<Node>) -> bool {
    let peers = node.peers_snapshot();
    if peers.is_empty() {
        debug!("no peers available for fork resolution");
        return false;
    }
    let (local_length, engine) = node.chain_overview();
    info!(
        local_length,
        peers = peers.len(),
        "running fork resolution"
    );

    let mut candidates = Vec::new();
    for peer in peers {
        let Some(body) = node.client().get_json(&format!("{peer}/get_chain")).await else {
            warn!(peer = %peer, "could not fetch chain from peer");
            continue;
        };
        let blocks: Vec<Block> = match serde_json::from_value(body) {
            Ok(blocks) => blocks,
            Err(error) => {
                warn!(peer = %peer, %error, "peer chain failed to decode");
                continue;
            }
        };
        if blocks.len() + LENGTH_TOLERANCE < local_length {
            debug!(
                peer = %peer,
                length = blocks.len(),
                "peer chain too short to consider"
            );
            continue;
        }
        let chain = match Chain::from_blocks(engine.clone(), blocks) {
            Ok(chain) => chain,
            Err(rejection) => {
                warn!(peer = %peer, error = %rejection, "peer sent an empty chain");
                continue;
            }
        };
        // Position uniqueness is relaxed here; scoring punishes the
        // duplicates instead of discarding the whole candidate.
        if let Err(rejection) = chain.validate(ValidationMode::Relaxed) {
            warn!(peer = %peer, error = %rejection, "peer chain failed validation");
            continue;
        }
        let candidate = Candidate::from_chain(peer.clone(), chain);
        debug!(
            peer = %peer,
            score = candidate.score,
            head = %candidate.head_hash,
            "peer chain admitted as fork candidate"
        );
        candidates.push(candidate);
    }

    let Some(winner) = select_candidate(candidates) else {
        debug!("no valid fork candidates found");
        return false;
    };
    node.adopt_if_better(winner)
}
