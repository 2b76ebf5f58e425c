//! # StoryChain — Node Runtime
//!
//! Wraps the chain engine with everything a running node needs: the peer
//! set, the transaction pool, mining orchestration, the gossip and
//! discovery protocols, quality-scored fork resolution, the periodic
//! background sync, and the HTTP surface peers and story agents talk to.
//!
//! ## Structure
//!
//! - [`node`] - the node itself: state ownership and mining orchestration
//! - [`consensus`] - fork resolution over peer chains
//! - [`gossip`] - block broadcast with rejection repair
//! - [`discovery`] - direct peer-to-peer discovery
//! - [`tracker`] - bootstrap registration against the peer directory
//! - [`client`] - the retrying HTTP client all outbound calls go through
//! - [`snapshot`] - chain snapshot persistence (outbound port)
//! - [`api`] - thin axum adapters over node operations
//!
//! ## Concurrency model
//!
//! One `parking_lot::Mutex` guards the chain, the peer set, and both
//! transaction queues. Every read or mutation holds the lock for the
//! duration of the access; network calls and the Proof-of-Work search run
//! outside it on copies. Mining, auto-mining, periodic sync, and repair
//! rebroadcasts each run as independent tasks observing a shared shutdown
//! signal, and stopping mining is cooperative only.

pub mod api;
pub mod client;
pub mod config;
pub mod consensus;
pub mod discovery;
pub mod error;
pub mod gossip;
pub mod node;
pub mod snapshot;
pub mod state;
pub mod tracker;

pub use config::NodeConfig;
pub use error::{NodeError, Result};
pub use node::{BlockOutcome, Node};
