//! Story positions: the logical ordering key embedded in block payloads.
//!
//! Contributions are opaque to the engine except for one thing: a payload
//! may carry an explicit `storyPosition` object describing where in the
//! story it belongs. The engine hashes that object into a `position_id`
//! used to detect duplicate or overlapping contributions independently of
//! chain index. Payloads without one fall back to a deterministic id keyed
//! by the height they are mined at.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

/// Sentinel position id carried by the genesis block.
pub const GENESIS_POSITION_ID: &str = "0";

/// A parsed block payload.
///
/// Parsing never fails: anything that is not a JSON object with a
/// `storyPosition` member is an opaque payload, which is a normal branch,
/// not an error.
#[derive(Debug, Clone, PartialEq)]
pub enum StoryPayload {
    /// JSON payload carrying an explicit `storyPosition` object.
    Structured {
        /// The raw `storyPosition` member.
        position: Map<String, Value>,
    },
    /// Free-form payload without position information.
    Opaque,
}

impl StoryPayload {
    /// Classify a payload by looking for a `storyPosition` object member.
    pub fn parse(data: &str) -> Self {
        match serde_json::from_str::<Value>(data) {
            Ok(Value::Object(obj)) => match obj.get("storyPosition") {
                Some(Value::Object(position)) => Self::Structured {
                    position: position.clone(),
                },
                _ => Self::Opaque,
            },
            _ => Self::Opaque,
        }
    }
}

/// The position record stored in each block.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoryPosition {
    /// Hash identifying the logical story slot this block fills.
    pub position_id: String,

    /// The predecessor's position id at mining time. A mismatch with the
    /// actual predecessor is tolerated (warned, never rejected) so chains
    /// from different forks can still merge.
    pub previous_position_id: String,

    /// The raw `storyPosition` object, when the payload carried one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
}

impl StoryPosition {
    /// The fixed position of the genesis block, exempt from all rules.
    pub fn genesis() -> Self {
        Self {
            position_id: GENESIS_POSITION_ID.to_string(),
            previous_position_id: GENESIS_POSITION_ID.to_string(),
            metadata: None,
        }
    }

    /// Derive the position for a payload mined at `height`, chaining from
    /// the predecessor's position id.
    pub fn derive(data: &str, height: u64, previous_position_id: &str) -> Self {
        match StoryPayload::parse(data) {
            StoryPayload::Structured { position } => Self {
                position_id: position_id_of(&position),
                previous_position_id: previous_position_id.to_string(),
                metadata: Some(position),
            },
            StoryPayload::Opaque => Self {
                position_id: fallback_position_id(height),
                previous_position_id: previous_position_id.to_string(),
                metadata: None,
            },
        }
    }

    /// True when this position's ordered key fails to advance past
    /// `previous`: same book with the chapter moving backward, or same
    /// book and chapter with a non-increasing verse. Positions without a
    /// complete book/chapter/verse key never regress.
    pub fn regresses_from(&self, previous: &StoryPosition) -> bool {
        let (Some(current), Some(prior)) = (
            self.metadata.as_ref().and_then(ordered_key),
            previous.metadata.as_ref().and_then(ordered_key),
        ) else {
            return false;
        };
        if current.book != prior.book {
            // A book change carries no ordering we can check.
            return false;
        }
        if current.chapter < prior.chapter {
            return true;
        }
        current.chapter == prior.chapter && current.verse <= prior.verse
    }
}

struct OrderedKey {
    book: String,
    chapter: u64,
    verse: u64,
}

fn ordered_key(metadata: &Map<String, Value>) -> Option<OrderedKey> {
    Some(OrderedKey {
        book: metadata.get("book")?.as_str()?.to_string(),
        chapter: metadata.get("chapter")?.as_u64()?,
        verse: metadata.get("verse")?.as_u64()?,
    })
}

/// Position id for an explicit `storyPosition` object: SHA-256 of its
/// canonical (sorted-key) JSON rendering.
pub fn position_id_of(position: &Map<String, Value>) -> String {
    let canonical = Value::Object(position.clone()).to_string();
    sha256_hex(canonical.as_bytes())
}

/// Deterministic fallback id for payloads without an explicit position,
/// keyed by the height the payload is mined at.
pub fn fallback_position_id(height: u64) -> String {
    sha256_hex(format!("story-position-fallback:{height}").as_bytes())
}

pub(crate) fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}
