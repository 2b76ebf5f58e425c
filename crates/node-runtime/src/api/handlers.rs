//! Request handlers. Each one adapts an HTTP call onto a node operation
//! and maps the node's error taxonomy onto status codes: validation and
//! conflicts answer 409, malformed requests 400.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde_json::{json, Value};
use tracing::debug;

use chain_engine::Block;

use crate::error::NodeError;
use crate::node::{BlockOutcome, Node};

use super::types::{
    AddTransactionRequest, AutoMineRequest, DiscoverRequest, MineRequest, UpdatePeersRequest,
};

type ApiResponse = (StatusCode, Json<Value>);

/// `GET /get_chain` - the full serialized chain.
pub async fn get_chain(State(node): State<Arc<Node>>) -> Json<Vec<Block>> {
    debug!("chain requested");
    Json(node.chain_blocks())
}

/// `POST /add_block` - a peer pushes a block at us.
pub async fn add_block(State(node): State<Arc<Node>>, Json(body): Json<Value>) -> ApiResponse {
    let block: Block = match serde_json::from_value(body) {
        Ok(block) => block,
        Err(error) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": format!("invalid block data: {error}") })),
            );
        }
    };
    match node.handle_block(block) {
        Ok(BlockOutcome::Appended) => (
            StatusCode::CREATED,
            Json(json!({ "message": "block added" })),
        ),
        Ok(BlockOutcome::Repaired) => (
            StatusCode::CREATED,
            Json(json!({ "message": "block adopted via repair" })),
        ),
        Err(error) => error_response(error),
    }
}

/// `POST /add_transaction` - a story agent queues a contribution.
pub async fn add_transaction(
    State(node): State<Arc<Node>>,
    Json(request): Json<AddTransactionRequest>,
) -> ApiResponse {
    let Some(data) = request.data else {
        return missing_field("data");
    };
    let Some(previous_hash) = request.previous_hash else {
        return missing_field("previous_hash");
    };
    match node.add_transaction(data, &previous_hash) {
        Ok(pool_size) => (
            StatusCode::CREATED,
            Json(json!({
                "message": "transaction added to pool",
                "pool_size": pool_size,
            })),
        ),
        Err(error) => error_response(error),
    }
}

/// `POST /mine` - start mining a payload, queueing it when busy.
pub async fn mine(State(node): State<Arc<Node>>, Json(request): Json<MineRequest>) -> ApiResponse {
    let Some(data) = request.data else {
        return missing_field("data");
    };
    match node.start_or_queue_mining(data) {
        None => (
            StatusCode::ACCEPTED,
            Json(json!({ "message": "mining started" })),
        ),
        Some(position) => (
            StatusCode::ACCEPTED,
            Json(json!({
                "message": "mining already in progress, transaction queued",
                "queue_position": position,
            })),
        ),
    }
}

/// `POST /discover` - a peer introduces itself.
pub async fn discover(
    State(node): State<Arc<Node>>,
    Json(request): Json<DiscoverRequest>,
) -> ApiResponse {
    let Some(address) = request.address else {
        return missing_field("address");
    };
    let (peers, chain_length) = node.handle_discover(address);
    (
        StatusCode::OK,
        Json(json!({
            "message": "discovery successful",
            "peers": peers,
            "chain_length": chain_length,
        })),
    )
}

/// `POST /update_peers` - the tracker or a peer pushes a peer list.
pub async fn update_peers(
    State(node): State<Arc<Node>>,
    Json(request): Json<UpdatePeersRequest>,
) -> ApiResponse {
    node.update_peers(request.peers);
    (
        StatusCode::OK,
        Json(json!({ "message": "peers updated" })),
    )
}

/// `POST /auto_mine` - toggle the auto-mining loop.
pub async fn auto_mine(
    State(node): State<Arc<Node>>,
    Json(request): Json<AutoMineRequest>,
) -> ApiResponse {
    let enable = request.enable.unwrap_or(true);
    let pool_size = node.set_auto_mine(enable, request.interval);
    let state = if enable { "enabled" } else { "disabled" };
    (
        StatusCode::OK,
        Json(json!({
            "message": format!("auto-mining {state}"),
            "interval": request.interval,
            "transaction_pool_size": pool_size,
        })),
    )
}

/// `GET /status` - node health summary.
pub async fn status(State(node): State<Arc<Node>>) -> ApiResponse {
    let report = node.status();
    (
        StatusCode::OK,
        Json(serde_json::to_value(report).unwrap_or(Value::Null)),
    )
}

/// `GET /health` - liveness probe.
pub async fn health() -> ApiResponse {
    (StatusCode::OK, Json(json!({ "status": "ok" })))
}

fn missing_field(field: &str) -> ApiResponse {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({ "error": format!("missing '{field}' field in request body") })),
    )
}

fn error_response(error: NodeError) -> ApiResponse {
    match error {
        NodeError::StaleHead {
            expected_hash,
            latest_block_index,
        } => (
            StatusCode::CONFLICT,
            Json(json!({
                "error": "previous hash does not match the current head",
                "expected_hash": expected_hash,
                "latest_block_index": latest_block_index,
            })),
        ),
        NodeError::DuplicatePosition { position_id } => (
            StatusCode::CONFLICT,
            Json(json!({
                "error": "duplicate story position",
                "position_id": position_id,
            })),
        ),
        NodeError::ChainAhead { index, head_index } => (
            StatusCode::CONFLICT,
            Json(json!({
                "error": "local chain is behind, sync scheduled",
                "block_index": index,
                "head_index": head_index,
            })),
        ),
        NodeError::NotNeeded { index } => (
            StatusCode::CONFLICT,
            Json(json!({
                "error": "block not needed",
                "block_index": index,
            })),
        ),
        NodeError::Validation(rejection) => (
            StatusCode::CONFLICT,
            Json(json!({ "error": rejection.to_string() })),
        ),
        NodeError::BadRequest(message) => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": message })),
        ),
    }
}
