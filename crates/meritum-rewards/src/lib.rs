//! Reward distribution for settled tasks.
//!
//! A task's pool is cut into six buckets by a per-kind, per-difficulty
//! basis-point [`RewardStructure`], then [`RewardEngine::distribute`]
//! pays winners, participants, validators and the bonus sets out of
//! their buckets. Everything unclaimed collapses into the network fee,
//! so the resulting `RewardDistribution` always balances to the pool.

pub mod engine;
pub mod structure;

pub use engine::{RewardEngine, ScoredSubmission, ValidatorContribution};
pub use structure::{
    PoolSlices, RewardConfig, RewardStructure, RewardStructureEntry, SPLIT_TOTAL_BP,
};
