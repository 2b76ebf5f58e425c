//! Node-level error taxonomy.
//!
//! Conflicts are ordinary steady-state outcomes here: stale callers, lost
//! mining races, and diverged peers all map to a distinct conflict status
//! so the caller can resync or regenerate instead of blindly retrying.
//! Transient network failures never surface as errors at all; the
//! retrying client absorbs them and returns absence.

use thiserror::Error;

/// Result type alias for node operations.
pub type Result<T> = std::result::Result<T, NodeError>;

/// Errors surfaced by node operations.
#[derive(Debug, Error)]
pub enum NodeError {
    /// Block or chain data violated a chain invariant.
    #[error(transparent)]
    Validation(#[from] chain_engine::BlockRejection),

    /// The caller's head-hash hint no longer matches the chain head.
    #[error("stale head: expected {expected_hash}")]
    StaleHead {
        /// The hash of the actual current head.
        expected_hash: String,
        /// The index of the actual current head.
        latest_block_index: u64,
    },

    /// The contribution's story position already exists in the chain or
    /// the transaction pool.
    #[error("duplicate story position {position_id}")]
    DuplicatePosition {
        /// The duplicated position id.
        position_id: String,
    },

    /// A received block is further ahead than our head; local history is
    /// missing and a background sync has been scheduled.
    #[error("block {index} is ahead of local head {head_index}")]
    ChainAhead {
        /// Index the received block carries.
        index: u64,
        /// Local head index at the time of receipt.
        head_index: u64,
    },

    /// A behind-head block whose adoption would not improve the chain.
    #[error("block {index} not needed")]
    NotNeeded {
        /// Index the received block carries.
        index: u64,
    },

    /// A required request field was missing or malformed.
    #[error("bad request: {0}")]
    BadRequest(String),
}
