//! The ordered block list and its validation rules.

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::block::{Block, GENESIS_PREVIOUS_HASH};
use crate::config::EngineConfig;
use crate::error::{BlockRejection, Result};
use crate::position::{StoryPosition, GENESIS_POSITION_ID};

/// Controls whether story-position uniqueness is enforced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationMode {
    /// Enforce every invariant, including position uniqueness.
    Strict,
    /// Admit duplicate positions. Used while weighing competing fork
    /// chains; quality scoring penalizes the duplicates instead.
    Relaxed,
}

/// The chain owned by a single node.
///
/// Mutated only by genesis construction, appending a mined or received
/// block, splice repair, or wholesale replacement during fork resolution.
#[derive(Debug, Clone)]
pub struct Chain {
    blocks: Vec<Block>,
    difficulty: u32,
    config: EngineConfig,
}

impl Chain {
    /// A new chain holding only the genesis block.
    pub fn new(config: EngineConfig, genesis_data: Option<&str>) -> Self {
        let difficulty = config.initial_difficulty;
        let genesis = Block::genesis(genesis_data.unwrap_or("Genesis Block"), difficulty);
        Self {
            blocks: vec![genesis],
            difficulty,
            config,
        }
    }

    /// Rebuild a chain from its wire form.
    ///
    /// Hashes are trusted from the source and re-verifiable through
    /// [`Chain::validate`]. The engine difficulty resumes from the head
    /// block, mirroring how the chain was left by its previous owner.
    pub fn from_blocks(config: EngineConfig, blocks: Vec<Block>) -> Result<Self> {
        let difficulty = blocks
            .last()
            .map(|block| block.difficulty)
            .ok_or(BlockRejection::EmptyChain)?;
        Ok(Self {
            blocks,
            difficulty,
            config,
        })
    }

    /// All blocks, genesis first.
    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// Number of blocks, genesis included.
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Always false: a chain holds at least its genesis block.
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// The head block.
    pub fn latest(&self) -> &Block {
        // Invariant: a chain always holds at least the genesis block.
        &self.blocks[self.blocks.len() - 1]
    }

    /// The difficulty the next candidate will be mined at.
    pub fn difficulty(&self) -> u32 {
        self.difficulty
    }

    /// The engine configuration this chain runs under.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Build the candidate block to mine for `data`.
    ///
    /// Adjusts difficulty at interval boundaries, then derives the story
    /// position from the payload. The candidate is sealed but will not
    /// meet its difficulty until the Proof-of-Work search finds a nonce.
    pub fn build_candidate(&mut self, data: &str) -> Block {
        let (next_index, previous_hash, previous_position) = {
            let previous = self.latest();
            (
                previous.index + 1,
                previous.hash.clone(),
                previous.story_position.position_id.clone(),
            )
        };
        if next_index % self.config.difficulty_adjustment_interval == 0 {
            self.adjust_difficulty();
        }
        let position = StoryPosition::derive(data, next_index, &previous_position);
        Block::sealed(
            next_index,
            Utc::now(),
            data.to_string(),
            previous_hash,
            self.difficulty,
            0,
            position,
        )
    }

    /// Compare elapsed wall-clock time over the last adjustment window
    /// with the target and nudge difficulty by one, floored at 1.
    fn adjust_difficulty(&mut self) {
        let window = self.config.difficulty_adjustment_interval;
        let latest = self.latest();
        let first_index = latest.index.saturating_sub(window - 1) as usize;
        let first = &self.blocks[first_index];

        let expected = (self.config.block_generation_interval_secs * window) as i64;
        let taken = (latest.timestamp - first.timestamp).num_seconds();

        if taken < expected / 2 {
            self.difficulty += 1;
            info!(
                difficulty = self.difficulty,
                "difficulty raised: blocks arriving too fast"
            );
        } else if taken > expected * 2 {
            self.difficulty = self.difficulty.saturating_sub(1).max(1);
            info!(
                difficulty = self.difficulty,
                "difficulty lowered: blocks arriving too slowly"
            );
        }
    }

    /// Append after full strict validation against the current head.
    pub fn try_append(&mut self, block: Block) -> Result<()> {
        self.validate_successor(&block, self.latest(), ValidationMode::Strict)?;
        debug!(index = block.index, hash = %block.hash, "block appended");
        self.blocks.push(block);
        Ok(())
    }

    /// Validate `block` as the immediate successor of `previous`.
    ///
    /// Returns the first violated invariant; never panics.
    pub fn validate_successor(
        &self,
        block: &Block,
        previous: &Block,
        mode: ValidationMode,
    ) -> Result<()> {
        if block.index != previous.index + 1 {
            return Err(BlockRejection::IndexMismatch {
                expected: previous.index + 1,
                actual: block.index,
            });
        }
        if block.previous_hash != previous.hash {
            return Err(BlockRejection::PreviousHashMismatch { index: block.index });
        }
        if block.calculate_hash() != block.hash {
            return Err(BlockRejection::HashMismatch { index: block.index });
        }
        if !block.meets_difficulty() {
            return Err(BlockRejection::DifficultyNotMet {
                hash: block.hash.clone(),
                difficulty: block.difficulty,
            });
        }
        self.check_story_position(block, previous, mode)
    }

    fn check_story_position(
        &self,
        block: &Block,
        previous: &Block,
        mode: ValidationMode,
    ) -> Result<()> {
        let position = &block.story_position;
        if position.position_id.is_empty() || position.position_id == GENESIS_POSITION_ID {
            return Err(BlockRejection::MissingPosition { index: block.index });
        }
        if mode == ValidationMode::Strict {
            let duplicated = self.blocks.iter().any(|other| {
                other.index != 0
                    && other.index != block.index
                    && other.story_position.position_id == position.position_id
            });
            if duplicated {
                return Err(BlockRejection::DuplicatePosition {
                    position_id: position.position_id.clone(),
                });
            }
        }

        // Soft checks: warn, never reject. The previous-position tolerance
        // keeps cross-fork merges possible.
        if position.previous_position_id != previous.story_position.position_id {
            warn!(
                index = block.index,
                "story position does not chain from its predecessor"
            );
        }
        if position.regresses_from(&previous.story_position) {
            warn!(
                index = block.index,
                "story position does not advance past its predecessor"
            );
        }
        Ok(())
    }

    /// Validate the whole chain: exact genesis, then each adjacent pair.
    pub fn validate(&self, mode: ValidationMode) -> Result<()> {
        let genesis = self.blocks.first().ok_or(BlockRejection::EmptyChain)?;
        if genesis.index != 0
            || genesis.previous_hash != GENESIS_PREVIOUS_HASH
            || genesis.calculate_hash() != genesis.hash
        {
            return Err(BlockRejection::MalformedGenesis);
        }
        for pair in self.blocks.windows(2) {
            self.validate_successor(&pair[1], &pair[0], mode)?;
        }
        Ok(())
    }

    /// Position ids appearing more than once among non-genesis blocks.
    pub fn duplicate_position_ids(&self) -> Vec<String> {
        let mut seen = std::collections::HashSet::new();
        let mut duplicates = Vec::new();
        for block in self.blocks.iter().skip(1) {
            let id = &block.story_position.position_id;
            if !seen.insert(id.clone()) && !duplicates.contains(id) {
                duplicates.push(id.clone());
            }
        }
        duplicates
    }

    /// Whether any non-genesis block carries this position id.
    pub fn contains_position(&self, position_id: &str) -> bool {
        self.blocks
            .iter()
            .skip(1)
            .any(|block| block.story_position.position_id == position_id)
    }

    /// Replace the chain contents wholesale (fork resolution).
    pub fn replace_with(&mut self, other: Chain) {
        self.difficulty = other.difficulty;
        self.blocks = other.blocks;
    }

    /// Localized repair: the chain that results from substituting `block`
    /// at its own index and re-linking the suffix hash chain.
    ///
    /// Suffix nonces are kept, so re-linked blocks may no longer meet
    /// their stated difficulty; callers adopt the result only when its
    /// quality score strictly improves, and periodic fork resolution owns
    /// network-wide convergence afterwards.
    pub fn spliced_with(&self, block: &Block) -> Option<Chain> {
        let index = block.index as usize;
        if index == 0 || index >= self.blocks.len() {
            return None;
        }
        if block.previous_hash != self.blocks[index - 1].hash {
            return None;
        }
        if block.calculate_hash() != block.hash || !block.meets_difficulty() {
            return None;
        }

        let mut blocks = self.blocks.clone();
        blocks[index] = block.clone();
        for i in (index + 1)..blocks.len() {
            let parent_hash = blocks[i - 1].hash.clone();
            blocks[i].previous_hash = parent_hash;
            let rehashed = blocks[i].calculate_hash();
            blocks[i].hash = rehashed;
        }
        Some(Chain {
            blocks,
            difficulty: self.difficulty,
            config: self.config.clone(),
        })
    }
}
