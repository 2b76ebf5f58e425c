//! Node-level flows: transaction intake, block receipt, mining queues,
//! and peer-list handling. These drive the node object directly; the
//! HTTP layer above it is a thin adapter.

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;
    use std::time::Duration;

    use chain_engine::{proof_of_work, Block, Chain, EngineConfig};
    use node_runtime::node::{BlockOutcome, Node};
    use node_runtime::snapshot::NullSnapshotStore;
    use node_runtime::{NodeConfig, NodeError};
    use serde_json::json;

    fn easy_engine() -> EngineConfig {
        EngineConfig {
            initial_difficulty: 1,
            ..EngineConfig::default()
        }
    }

    fn test_node(port: u16) -> Arc<Node> {
        let config = NodeConfig {
            port,
            // Nothing listens here; tracker calls degrade gracefully.
            tracker_url: "http://127.0.0.1:9".to_string(),
            ..NodeConfig::default()
        };
        Node::new(config, easy_engine(), Arc::new(NullSnapshotStore))
    }

    /// A twin chain with the same genesis as a test node, for mining
    /// blocks the node has not seen yet.
    fn twin_chain() -> Chain {
        Chain::new(easy_engine(), None)
    }

    fn mine_next(chain: &mut Chain, data: &str) -> Block {
        let candidate = chain.build_candidate(data);
        proof_of_work(candidate, chain.config(), &AtomicBool::new(false))
            .expect("uncancelled search terminates")
    }

    fn verse_payload(verse: u64) -> String {
        json!({
            "Content": format!("verse {verse}"),
            "storyPosition": { "book": "Genesis", "chapter": 1, "verse": verse },
        })
        .to_string()
    }

    // =========================================================================
    // TRANSACTION INTAKE
    // =========================================================================

    #[tokio::test]
    async fn test_stale_previous_hash_is_conflict_with_expected_hash() {
        let node = test_node(6101);
        let head_hash = node.chain_blocks().last().expect("genesis").hash.clone();

        let result = node.add_transaction("late contribution".to_string(), "0stale");
        match result {
            Err(NodeError::StaleHead {
                expected_hash,
                latest_block_index,
            }) => {
                assert_eq!(expected_hash, head_hash);
                assert_eq!(latest_block_index, 0);
            }
            other => panic!("expected StaleHead, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_duplicate_story_position_rejected_on_second_submission() {
        let node = test_node(6102);
        let head_hash = node.chain_blocks().last().expect("genesis").hash.clone();

        let pool_size = node
            .add_transaction(verse_payload(1), &head_hash)
            .expect("first submission queues");
        assert_eq!(pool_size, 1);

        // Identical storyPosition object, different content.
        let rival = json!({
            "Content": "a different telling of the same verse",
            "storyPosition": { "book": "Genesis", "chapter": 1, "verse": 1 },
        })
        .to_string();
        assert!(matches!(
            node.add_transaction(rival, &head_hash),
            Err(NodeError::DuplicatePosition { .. })
        ));
    }

    #[tokio::test]
    async fn test_position_already_mined_into_chain_is_rejected() {
        let node = test_node(6103);
        let mut twin = twin_chain();
        let block = mine_next(&mut twin, &verse_payload(1));
        assert_eq!(
            node.handle_block(block).expect("block appends"),
            BlockOutcome::Appended
        );

        let head_hash = node.chain_blocks().last().expect("head").hash.clone();
        assert!(matches!(
            node.add_transaction(verse_payload(1), &head_hash),
            Err(NodeError::DuplicatePosition { .. })
        ));
    }

    // =========================================================================
    // BLOCK RECEIPT
    // =========================================================================

    #[tokio::test]
    async fn test_immediate_successor_appends() {
        let node = test_node(6104);
        let mut twin = twin_chain();
        let block = mine_next(&mut twin, "hello");

        assert_eq!(
            node.handle_block(block.clone()).expect("appends"),
            BlockOutcome::Appended
        );
        let blocks = node.chain_blocks();
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[1].hash, block.hash);
    }

    #[tokio::test]
    async fn test_block_far_ahead_is_conflict_and_schedules_sync() {
        let node = test_node(6105);
        let mut twin = twin_chain();
        let first = mine_next(&mut twin, "one");
        twin.try_append(first).expect("append");
        let second = mine_next(&mut twin, "two");

        // The node never saw "one"; "two" is two ahead of its head.
        assert!(matches!(
            node.handle_block(second),
            Err(NodeError::ChainAhead { index: 2, .. })
        ));
        assert_eq!(node.chain_blocks().len(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_position_block_is_rejected_outright() {
        let node = test_node(6106);
        let mut twin = twin_chain();
        let block = mine_next(&mut twin, &verse_payload(3));
        twin.try_append(block.clone()).expect("append");
        node.handle_block(block).expect("appends");

        // A rival block for the same story position, one index further.
        let rival = mine_next(&mut twin, &verse_payload(3));
        assert!(matches!(
            node.handle_block(rival),
            Err(NodeError::DuplicatePosition { .. })
        ));
    }

    #[tokio::test]
    async fn test_behind_head_block_not_needed() {
        let node = test_node(6107);
        let mut twin = twin_chain();
        let block = mine_next(&mut twin, "the settled chapter");
        twin.try_append(block.clone()).expect("append");
        node.handle_block(block).expect("appends");

        // A rival for index 1 with a distinct position but no quality
        // edge: same length, nothing to repair.
        let mut rival_fork = twin_chain();
        let rival = mine_next(&mut rival_fork, &verse_payload(9));
        assert!(matches!(
            node.handle_block(rival),
            Err(NodeError::NotNeeded { index: 1 })
        ));
    }

    // =========================================================================
    // MINING ORCHESTRATION
    // =========================================================================

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_mining_commits_a_block_end_to_end() {
        let node = test_node(6108);
        assert!(node.start_mining("mined by the test".to_string()));

        // The task syncs (degraded, no tracker), searches at difficulty 1,
        // and appends. Poll with a generous deadline.
        let deadline = tokio::time::Instant::now() + Duration::from_secs(30);
        while node.chain_len() < 2 {
            assert!(
                tokio::time::Instant::now() < deadline,
                "mining did not commit in time"
            );
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        let blocks = node.chain_blocks();
        assert_eq!(blocks[1].data, "mined by the test");
        assert!(blocks[1].hash.starts_with('0'));
    }

    #[tokio::test]
    async fn test_second_mine_request_queues() {
        let node = test_node(6109);
        assert!(node.start_or_queue_mining("first".to_string()).is_none());
        // The mining flag is set synchronously, so the second request
        // queues behind the first.
        assert_eq!(
            node.start_or_queue_mining("second".to_string()),
            Some(1)
        );
    }

    // =========================================================================
    // PEERS
    // =========================================================================

    #[tokio::test]
    async fn test_update_peers_unions_and_excludes_self() {
        let node = test_node(6110);
        let own_address = node.address();

        node.update_peers(vec![
            own_address.clone(),
            "http://localhost:7001".to_string(),
        ]);
        node.update_peers(vec![
            "http://localhost:7001".to_string(),
            "http://localhost:7002".to_string(),
        ]);

        let mut peers = node.peers_snapshot();
        peers.sort();
        assert_eq!(
            peers,
            vec![
                "http://localhost:7001".to_string(),
                "http://localhost:7002".to_string(),
            ]
        );
        assert!(!peers.contains(&own_address));
    }

    #[tokio::test]
    async fn test_discover_registers_requester_and_reports_length() {
        let node = test_node(6111);
        node.update_peers(vec!["http://localhost:7001".to_string()]);

        let (peers, chain_length) = node.handle_discover("http://localhost:7002".to_string());
        assert_eq!(chain_length, 1);
        // The requester is registered but not echoed back.
        assert!(peers.contains(&"http://localhost:7001".to_string()));
        assert!(!peers.contains(&"http://localhost:7002".to_string()));
        assert!(node
            .peers_snapshot()
            .contains(&"http://localhost:7002".to_string()));
    }
}
