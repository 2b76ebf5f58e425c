//! Chain-engine properties exercised across module boundaries: hash
//! integrity, Proof-of-Work validity, linkage, genesis determinism, and
//! story-position uniqueness.

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicBool;

    use chain_engine::{
        meets_difficulty, proof_of_work, Block, BlockRejection, Chain, EngineConfig,
        ValidationMode,
    };
    use serde_json::json;

    fn easy_config() -> EngineConfig {
        EngineConfig {
            initial_difficulty: 1,
            ..EngineConfig::default()
        }
    }

    fn mine_next(chain: &mut Chain, data: &str) -> Block {
        let candidate = chain.build_candidate(data);
        proof_of_work(candidate, chain.config(), &AtomicBool::new(false))
            .expect("uncancelled search terminates")
    }

    fn verse_payload(book: &str, chapter: u64, verse: u64) -> String {
        json!({
            "Content": format!("{book} {chapter}:{verse}"),
            "storyPosition": { "book": book, "chapter": chapter, "verse": verse },
        })
        .to_string()
    }

    // =========================================================================
    // HASH INTEGRITY
    // =========================================================================

    #[test]
    fn test_calculate_hash_is_pure_and_field_sensitive() {
        let mut chain = Chain::new(easy_config(), None);
        let block = mine_next(&mut chain, "hello");

        assert_eq!(block.calculate_hash(), block.hash);

        let mut mutated = block.clone();
        mutated.nonce = mutated.nonce.wrapping_add(1);
        assert_ne!(mutated.calculate_hash(), block.hash);

        let mut mutated = block.clone();
        mutated.data.push('!');
        assert_ne!(mutated.calculate_hash(), block.hash);

        let mut mutated = block;
        mutated.story_position.previous_position_id = "elsewhere".to_string();
        assert_ne!(mutated.calculate_hash(), mutated.hash);
    }

    // =========================================================================
    // PROOF OF WORK
    // =========================================================================

    #[test]
    fn test_accepted_blocks_satisfy_their_stated_difficulty() {
        let mut chain = Chain::new(easy_config(), None);
        for i in 1..=3u64 {
            let block = mine_next(&mut chain, &verse_payload("Genesis", 1, i));
            chain.try_append(block).expect("append");
        }
        for block in chain.blocks().iter().skip(1) {
            assert!(meets_difficulty(&block.hash, block.difficulty));
        }
    }

    #[test]
    fn test_mining_scenario_difficulty_one() {
        // Genesis-only chain, mine "hello" at difficulty 1.
        let mut chain = Chain::new(easy_config(), None);
        let genesis_hash = chain.latest().hash.clone();
        let block = mine_next(&mut chain, "hello");

        assert!(block.hash.starts_with('0'));
        assert_eq!(block.index, 1);
        assert_eq!(block.previous_hash, genesis_hash);
    }

    // =========================================================================
    // LINKAGE AND GENESIS
    // =========================================================================

    #[test]
    fn test_valid_chain_links_every_block() {
        let mut chain = Chain::new(easy_config(), None);
        for i in 1..=4u64 {
            let block = mine_next(&mut chain, &verse_payload("Genesis", 1, i));
            chain.try_append(block).expect("append");
        }
        chain.validate(ValidationMode::Strict).expect("valid chain");
        for pair in chain.blocks().windows(2) {
            assert_eq!(pair[1].previous_hash, pair[0].hash);
        }
    }

    #[test]
    fn test_default_genesis_chains_serialize_identically() {
        let a = Chain::new(EngineConfig::default(), None);
        let b = Chain::new(EngineConfig::default(), None);
        let a_wire = serde_json::to_string(a.blocks()).expect("serialize");
        let b_wire = serde_json::to_string(b.blocks()).expect("serialize");
        assert_eq!(a_wire, b_wire);
        assert_eq!(a.latest().hash, b.latest().hash);
    }

    #[test]
    fn test_deserialized_chain_revalidates() {
        let mut chain = Chain::new(easy_config(), None);
        for i in 1..=3u64 {
            let block = mine_next(&mut chain, &verse_payload("Genesis", 1, i));
            chain.try_append(block).expect("append");
        }
        let wire = serde_json::to_string(chain.blocks()).expect("serialize");
        let blocks: Vec<Block> = serde_json::from_str(&wire).expect("deserialize");
        let restored = Chain::from_blocks(easy_config(), blocks).expect("non-empty");
        restored
            .validate(ValidationMode::Strict)
            .expect("hashes survive the round trip unchanged");
    }

    // =========================================================================
    // STORY-POSITION UNIQUENESS
    // =========================================================================

    #[test]
    fn test_duplicate_position_rejected_strict_accepted_relaxed() {
        let mut chain = Chain::new(easy_config(), None);
        let first = mine_next(&mut chain, &verse_payload("Genesis", 1, 1));
        chain.try_append(first).expect("append");

        let duplicate = mine_next(&mut chain, &verse_payload("Genesis", 1, 1));
        assert!(matches!(
            chain.try_append(duplicate.clone()),
            Err(BlockRejection::DuplicatePosition { .. })
        ));

        let mut blocks = chain.blocks().to_vec();
        blocks.push(duplicate);
        let forked = Chain::from_blocks(easy_config(), blocks).expect("non-empty");
        assert!(forked.validate(ValidationMode::Strict).is_err());
        assert!(forked.validate(ValidationMode::Relaxed).is_ok());
    }
}
