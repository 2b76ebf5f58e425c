//! # StoryChain — Chain Engine
//!
//! The blockchain core beneath a StoryChain node: block structure and
//! hashing, Proof-of-Work mining with periodic difficulty adjustment,
//! block and chain validation, story-position extraction, and the fork
//! quality scoring used by chain selection.
//!
//! ## Structure
//!
//! - [`block`] - the immutable block value object and its canonical hash
//! - [`position`] - story positions: the ordering key carried in payloads
//! - [`chain`] - the ordered block list, genesis, validation, splice repair
//! - [`mining`] - the cancellable Proof-of-Work nonce search
//! - [`quality`] - length-biased, duplicate-penalizing chain scoring
//!
//! The engine owns no network or concurrency concerns. A chain is owned
//! exclusively by one node; only serialized copies ever cross the wire,
//! and deserialized chains are re-verifiable through [`Chain::validate`].

pub mod block;
pub mod chain;
pub mod config;
pub mod error;
pub mod mining;
pub mod position;
pub mod quality;

pub use block::{meets_difficulty, Block, GENESIS_PREVIOUS_HASH};
pub use chain::{Chain, ValidationMode};
pub use config::EngineConfig;
pub use error::{BlockRejection, Result};
pub use mining::proof_of_work;
pub use position::{position_id_of, StoryPayload, StoryPosition};
pub use quality::{
    outranks, quality_score, DUPLICATE_POSITION_PENALTY, POSITION_REGRESSION_PENALTY,
};
