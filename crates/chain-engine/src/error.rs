//! Error types for the chain engine.

use thiserror::Error;

/// Result type alias for chain engine operations.
pub type Result<T> = std::result::Result<T, BlockRejection>;

/// Reasons a block or chain fails validation.
///
/// Validation never panics or throws; every broken invariant maps to a
/// variant so callers can log exactly what was violated and answer peers
/// with a conflict instead of crashing.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BlockRejection {
    /// Index does not continue the chain.
    #[error("invalid index: expected {expected}, got {actual}")]
    IndexMismatch {
        /// The index the chain expects next.
        expected: u64,
        /// The index the block carries.
        actual: u64,
    },

    /// The block does not link to its predecessor's hash.
    #[error("previous hash mismatch at block {index}")]
    PreviousHashMismatch {
        /// Index of the offending block.
        index: u64,
    },

    /// The stored hash does not recompute from the block's fields.
    #[error("hash mismatch for block {index}: stored hash does not recompute")]
    HashMismatch {
        /// Index of the tampered block.
        index: u64,
    },

    /// The hash does not carry the leading zeros the block claims.
    #[error("hash {hash} does not meet difficulty {difficulty}")]
    DifficultyNotMet {
        /// The offending hash.
        hash: String,
        /// The difficulty the block itself states.
        difficulty: u32,
    },

    /// A non-genesis block is missing its story position id.
    #[error("block {index} is missing a story position id")]
    MissingPosition {
        /// Index of the offending block.
        index: u64,
    },

    /// The story position already appears elsewhere in the chain.
    #[error("duplicate story position {position_id}")]
    DuplicatePosition {
        /// The duplicated position id.
        position_id: String,
    },

    /// The genesis block is not structurally exact.
    #[error("genesis block malformed")]
    MalformedGenesis,

    /// A chain must hold at least its genesis block.
    #[error("chain is empty")]
    EmptyChain,
}
