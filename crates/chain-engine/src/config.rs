//! Engine configuration.

use serde::Deserialize;

/// Tunables for mining and difficulty adjustment.
#[derive(Clone, Debug, Deserialize)]
pub struct EngineConfig {
    /// Leading zero hex characters required of the first blocks.
    pub initial_difficulty: u32,

    /// Target seconds between blocks.
    pub block_generation_interval_secs: u64,

    /// Recompute difficulty after this many blocks.
    pub difficulty_adjustment_interval: u64,

    /// Nonce ceiling; reaching it resets the nonce and refreshes the
    /// candidate timestamp so the search space stays fresh.
    pub max_nonce: u64,

    /// Nominal reward recorded for a mined block. Reporting only; no
    /// economic role.
    pub mining_reward: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            initial_difficulty: 2,
            block_generation_interval_secs: 10,
            difficulty_adjustment_interval: 10,
            max_nonce: 1 << 32,
            mining_reward: 1.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.initial_difficulty, 2);
        assert_eq!(config.difficulty_adjustment_interval, 10);
        assert_eq!(config.max_nonce, 1 << 32);
    }
}
