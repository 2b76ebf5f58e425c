//! HTTP surface: thin axum adapters over node operations.

pub mod handlers;
pub mod types;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;

use crate::node::Node;

/// Build the node's public router.
pub fn router(node: Arc<Node>) -> Router {
    Router::new()
        .route("/get_chain", get(handlers::get_chain))
        .route("/add_block", post(handlers::add_block))
        .route("/add_transaction", post(handlers::add_transaction))
        .route("/mine", post(handlers::mine))
        .route("/discover", post(handlers::discover))
        .route("/update_peers", post(handlers::update_peers))
        .route("/auto_mine", post(handlers::auto_mine))
        .route("/status", get(handlers::status))
        .route("/health", get(handlers::health))
        .with_state(node)
}
