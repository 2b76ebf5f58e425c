//! The Proof-of-Work nonce search.

use std::sync::atomic::{AtomicBool, Ordering};

use chrono::Utc;
use rand::Rng;
use tracing::debug;

use crate::block::Block;
use crate::config::EngineConfig;

/// Hash attempts between cancellation checks.
const CANCEL_CHECK_INTERVAL: u64 = 1_000;

/// Nonce seeds are drawn from this range so competitors racing the same
/// payload start from different points of the search space.
const NONCE_SEED_RANGE: u64 = 100_000;

/// Search for a nonce that satisfies the candidate's difficulty.
///
/// Returns the sealed block, or `None` when `cancel` was observed set.
/// Cancellation is cooperative: the flag is checked between hash batches,
/// never mid-computation. The caller runs this on a blocking thread and
/// never under a lock. On nonce overflow the nonce resets to 0 and the
/// timestamp refreshes, and the search continues; there is no attempt
/// bound other than cancellation.
pub fn proof_of_work(mut block: Block, config: &EngineConfig, cancel: &AtomicBool) -> Option<Block> {
    block.nonce = rand::thread_rng().gen_range(0..NONCE_SEED_RANGE);
    block.hash = block.calculate_hash();

    let mut attempts: u64 = 0;
    while !block.meets_difficulty() {
        if attempts % CANCEL_CHECK_INTERVAL == 0 && cancel.load(Ordering::Relaxed) {
            debug!(index = block.index, attempts, "mining cancelled");
            return None;
        }
        block.nonce += 1;
        if block.nonce >= config.max_nonce {
            block.nonce = 0;
            block.timestamp = Utc::now();
        }
        block.hash = block.calculate_hash();
        attempts += 1;
        if attempts % 100_000 == 0 {
            debug!(
                index = block.index,
                attempts,
                difficulty = block.difficulty,
                "mining in progress"
            );
        }
    }
    debug!(
        index = block.index,
        nonce = block.nonce,
        hash = %block.hash,
        "proof of work found"
    );
    Some(block)
}
