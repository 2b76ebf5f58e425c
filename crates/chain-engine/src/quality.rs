//! Fork quality scoring.
//!
//! Chain selection is length-biased but not length-only: chains carrying
//! duplicate story positions or regressing story metadata score worse than
//! clean shorter chains. The penalty constants are empirically chosen
//! tunables, not derived from a formal model; they only need to dominate
//! (duplicates) or gently bias (regressions) the length term.

use crate::chain::Chain;

/// Penalty applied once when a chain carries any duplicate position id.
pub const DUPLICATE_POSITION_PENALTY: i64 = 1_000;

/// Penalty applied for each adjacent pair whose story metadata moves
/// backward.
pub const POSITION_REGRESSION_PENALTY: i64 = 25;

/// Score a chain for fork resolution.
pub fn quality_score(chain: &Chain) -> i64 {
    let mut score = chain.len() as i64;
    if !chain.duplicate_position_ids().is_empty() {
        score -= DUPLICATE_POSITION_PENALTY;
    }
    for pair in chain.blocks().windows(2) {
        if pair[1]
            .story_position
            .regresses_from(&pair[0].story_position)
        {
            score -= POSITION_REGRESSION_PENALTY;
        }
    }
    score
}

/// Whether candidate `(score_a, head_a)` beats incumbent `(score_b, head_b)`.
///
/// Strictly higher score wins; equal scores fall to the lexicographically
/// smaller head hash. The order is deterministic and symmetric, so every
/// node converges on the same winner regardless of the order peers were
/// queried in.
pub fn outranks(score_a: i64, head_a: &str, score_b: i64, head_b: &str) -> bool {
    score_a > score_b || (score_a == score_b && head_a < head_b)
}
