//! Block: the immutable unit of chain data.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::position::{sha256_hex, StoryPosition};

/// The hash the genesis block links to.
pub const GENESIS_PREVIOUS_HASH: &str = "0";

/// Unix seconds of 2025-01-01T00:00:00Z, the pinned genesis timestamp.
const GENESIS_TIMESTAMP_SECS: i64 = 1_735_689_600;

/// A single block.
///
/// Immutable once `hash` is set: changing any field makes the stored hash
/// fail recomputation, which validation catches. The serde representation
/// is the wire format; `hash` is trusted from the source on
/// deserialization and independently re-verifiable.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Block {
    /// Height in the chain, genesis at 0.
    pub index: u64,
    /// Wall-clock time the block was built (fixed for genesis).
    pub timestamp: DateTime<Utc>,
    /// The story contribution this block carries, opaque to the engine.
    pub data: String,
    /// Hash of the predecessor block.
    pub previous_hash: String,
    /// Leading zero hex characters the hash must carry. Stored per block
    /// so historical validation uses the difficulty in force at mining
    /// time.
    pub difficulty: u32,
    /// The Proof-of-Work search variable.
    pub nonce: u64,
    /// The logical story slot this block fills.
    pub story_position: StoryPosition,
    /// SHA-256 over the canonical rendering of every other field.
    pub hash: String,
}

impl Block {
    /// Construct a block and seal it with its computed hash.
    #[allow(clippy::too_many_arguments)]
    pub fn sealed(
        index: u64,
        timestamp: DateTime<Utc>,
        data: String,
        previous_hash: String,
        difficulty: u32,
        nonce: u64,
        story_position: StoryPosition,
    ) -> Self {
        let mut block = Self {
            index,
            timestamp,
            data,
            previous_hash,
            difficulty,
            nonce,
            story_position,
            hash: String::new(),
        };
        block.hash = block.calculate_hash();
        block
    }

    /// The genesis block for a given payload.
    ///
    /// The timestamp is pinned so every node derives the same genesis hash
    /// when no custom payload is given.
    pub fn genesis(data: &str, difficulty: u32) -> Self {
        Self::sealed(
            0,
            genesis_timestamp(),
            data.to_string(),
            GENESIS_PREVIOUS_HASH.to_string(),
            difficulty,
            0,
            StoryPosition::genesis(),
        )
    }

    /// SHA-256 of the canonical JSON rendering of every field except
    /// `hash`. Object keys are sorted, so the digest is a pure
    /// deterministic function of the field values.
    pub fn calculate_hash(&self) -> String {
        let canonical = json!({
            "index": self.index,
            "timestamp": canonical_timestamp(&self.timestamp),
            "data": self.data,
            "previous_hash": self.previous_hash,
            "difficulty": self.difficulty,
            "nonce": self.nonce,
            "story_position": self.story_position,
        });
        sha256_hex(canonical.to_string().as_bytes())
    }

    /// True when the stored hash satisfies the block's own difficulty.
    pub fn meets_difficulty(&self) -> bool {
        meets_difficulty(&self.hash, self.difficulty)
    }
}

/// A hash meets difficulty `d` when it starts with `d` zero hex
/// characters.
pub fn meets_difficulty(hash: &str, difficulty: u32) -> bool {
    let required = difficulty as usize;
    hash.len() >= required && hash.as_bytes()[..required].iter().all(|&b| b == b'0')
}

fn canonical_timestamp(timestamp: &DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn genesis_timestamp() -> DateTime<Utc> {
    DateTime::from_timestamp(GENESIS_TIMESTAMP_SECS, 0).unwrap_or(DateTime::UNIX_EPOCH)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_block() -> Block {
        Block::sealed(
            3,
            genesis_timestamp(),
            "a dark and stormy night".to_string(),
            "00abcdef".to_string(),
            2,
            42,
            StoryPosition::derive("a dark and stormy night", 3, "0"),
        )
    }

    #[test]
    fn test_hash_is_deterministic() {
        let a = sample_block();
        let b = sample_block();
        assert_eq!(a.hash, b.hash);
        assert_eq!(a.hash, a.calculate_hash());
    }

    #[test]
    fn test_any_field_change_invalidates_hash() {
        let block = sample_block();

        let mut tampered = block.clone();
        tampered.index += 1;
        assert_ne!(tampered.calculate_hash(), block.hash);

        let mut tampered = block.clone();
        tampered.data = "a bright and calm morning".to_string();
        assert_ne!(tampered.calculate_hash(), block.hash);

        let mut tampered = block.clone();
        tampered.previous_hash = "00fedcba".to_string();
        assert_ne!(tampered.calculate_hash(), block.hash);

        let mut tampered = block.clone();
        tampered.difficulty += 1;
        assert_ne!(tampered.calculate_hash(), block.hash);

        let mut tampered = block.clone();
        tampered.nonce += 1;
        assert_ne!(tampered.calculate_hash(), block.hash);

        let mut tampered = block.clone();
        tampered.timestamp = tampered.timestamp + chrono::Duration::seconds(1);
        assert_ne!(tampered.calculate_hash(), block.hash);

        let mut tampered = block.clone();
        tampered.story_position.position_id = "different".to_string();
        assert_ne!(tampered.calculate_hash(), block.hash);
    }

    #[test]
    fn test_genesis_is_fixed() {
        let a = Block::genesis("Genesis Block", 2);
        let b = Block::genesis("Genesis Block", 2);
        assert_eq!(a, b);
        assert_eq!(a.index, 0);
        assert_eq!(a.previous_hash, GENESIS_PREVIOUS_HASH);
    }

    #[test]
    fn test_meets_difficulty() {
        assert!(meets_difficulty("00ab", 2));
        assert!(meets_difficulty("00ab", 0));
        assert!(!meets_difficulty("0ab0", 2));
        assert!(!meets_difficulty("0", 2));
    }

    #[test]
    fn test_wire_round_trip_preserves_hash() {
        let block = sample_block();
        let wire = serde_json::to_string(&block).expect("serialize");
        let decoded: Block = serde_json::from_str(&wire).expect("deserialize");
        assert_eq!(decoded, block);
        assert_eq!(decoded.calculate_hash(), decoded.hash);
    }
}
