//! # StoryChain Test Suite
//!
//! Unified test crate covering cross-module properties:
//!
//! ```text
//! tests/src/
//! ├── chain_properties.rs   # Hashing, PoW, linkage, uniqueness
//! ├── consensus.rs          # Fork selection and convergence
//! └── node_flows.rs         # Intake, block receipt, mining queues
//! ```
//!
//! Run with `cargo test -p sc-tests`.

#![allow(unused_imports)]

pub mod chain_properties;
pub mod consensus;
pub mod node_flows;
