//! Reward pool structure.
//!
//! A task's pool is carved into six buckets (winner, participant,
//! validator, quality bonus, speed bonus, network fee) by basis-point
//! splits that depend on the task kind and difficulty. The splits are
//! configuration, loaded from JSON; the fee bucket is computed by
//! subtraction so a pool slice never loses dust to rounding.

use std::path::Path;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use meritum_core::error::MeritumError;
use meritum_core::task::DifficultyLevel;
use meritum_core::types::{Amount, BasisPoints};

pub const SPLIT_TOTAL_BP: BasisPoints = 10_000;

// ── Structure ───────────────────────────────────────────────────────────────

/// Basis-point split of one task's reward pool, plus the winner cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardStructure {
    pub winner_bp: BasisPoints,
    pub participant_bp: BasisPoints,
    pub validator_bp: BasisPoints,
    pub quality_bonus_bp: BasisPoints,
    pub speed_bonus_bp: BasisPoints,
    pub network_fee_bp: BasisPoints,
    /// Most winners a settlement of this shape may name.
    pub max_winners: u32,
}

impl RewardStructure {
    pub fn validate(&self) -> Result<(), MeritumError> {
        let got = self.winner_bp
            + self.participant_bp
            + self.validator_bp
            + self.quality_bonus_bp
            + self.speed_bonus_bp
            + self.network_fee_bp;
        if got != SPLIT_TOTAL_BP {
            return Err(MeritumError::SplitBasisPointsMismatch { got });
        }
        Ok(())
    }

    /// Carves a pool into bucket amounts. The five earmarked buckets floor;
    /// the fee takes whatever remains, so the slices always sum back to the
    /// pool exactly.
    pub fn slice(&self, pool: Amount) -> PoolSlices {
        let part = |bp: BasisPoints| pool * bp as Amount / SPLIT_TOTAL_BP as Amount;
        let winner = part(self.winner_bp);
        let participant = part(self.participant_bp);
        let validator = part(self.validator_bp);
        let quality_bonus = part(self.quality_bonus_bp);
        let speed_bonus = part(self.speed_bonus_bp);
        let fee = pool - winner - participant - validator - quality_bonus - speed_bonus;
        PoolSlices {
            winner,
            participant,
            validator,
            quality_bonus,
            speed_bonus,
            fee,
        }
    }
}

/// One pool carved into its buckets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolSlices {
    pub winner: Amount,
    pub participant: Amount,
    pub validator: Amount,
    pub quality_bonus: Amount,
    pub speed_bonus: Amount,
    pub fee: Amount,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardStructureEntry {
    pub task_kind: String,
    pub difficulty: DifficultyLevel,
    pub structure: RewardStructure,
}

// ── Config ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardConfig {
    pub entries: Vec<RewardStructureEntry>,
}

impl RewardConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, MeritumError> {
        let json = std::fs::read_to_string(path)
            .map_err(|e| MeritumError::Storage(e.to_string()))?;
        let config: Self = serde_json::from_str(&json)
            .map_err(|e| MeritumError::Serialization(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), MeritumError> {
        for entry in &self.entries {
            entry.structure.validate()?;
        }
        Ok(())
    }

    /// Split for one (task kind, difficulty), falling back to an even
    /// general-purpose split when the table has no entry.
    pub fn structure_for(&self, task_kind: &str, difficulty: DifficultyLevel) -> RewardStructure {
        self.entries
            .iter()
            .find(|e| e.task_kind == task_kind && e.difficulty == difficulty)
            .map(|e| e.structure)
            .unwrap_or_else(fallback_structure)
    }
}

impl Default for RewardConfig {
    fn default() -> Self {
        DEFAULT_REWARD_CONFIG.clone()
    }
}

fn fallback_structure() -> RewardStructure {
    RewardStructure {
        winner_bp: 4_000,
        participant_bp: 2_500,
        validator_bp: 2_000,
        quality_bonus_bp: 500,
        speed_bonus_bp: 500,
        network_fee_bp: 500,
        max_winners: 3,
    }
}

/// Base splits per task kind at Beginner difficulty. Each difficulty step
/// moves 250 bp from the participant bucket to the winner bucket, so harder
/// tasks skew toward the winners.
const KIND_STRUCTURES: [(&str, RewardStructure); 6] = [
    (
        "code-analysis",
        RewardStructure {
            winner_bp: 4_000,
            participant_bp: 2_500,
            validator_bp: 2_000,
            quality_bonus_bp: 500,
            speed_bonus_bp: 500,
            network_fee_bp: 500,
            max_winners: 3,
        },
    ),
    (
        "security-audit",
        RewardStructure {
            winner_bp: 5_500,
            participant_bp: 1_000,
            validator_bp: 2_500,
            quality_bonus_bp: 300,
            speed_bonus_bp: 200,
            network_fee_bp: 500,
            max_winners: 1,
        },
    ),
    (
        "data-analysis",
        RewardStructure {
            winner_bp: 4_500,
            participant_bp: 2_000,
            validator_bp: 2_000,
            quality_bonus_bp: 500,
            speed_bonus_bp: 500,
            network_fee_bp: 500,
            max_winners: 2,
        },
    ),
    (
        "algorithm-optimization",
        RewardStructure {
            winner_bp: 5_000,
            participant_bp: 1_500,
            validator_bp: 2_000,
            quality_bonus_bp: 500,
            speed_bonus_bp: 500,
            network_fee_bp: 500,
            max_winners: 2,
        },
    ),
    (
        "logic-reasoning",
        RewardStructure {
            winner_bp: 4_500,
            participant_bp: 2_500,
            validator_bp: 1_800,
            quality_bonus_bp: 400,
            speed_bonus_bp: 300,
            network_fee_bp: 500,
            max_winners: 3,
        },
    ),
    (
        "general",
        RewardStructure {
            winner_bp: 4_000,
            participant_bp: 3_000,
            validator_bp: 1_800,
            quality_bonus_bp: 400,
            speed_bonus_bp: 300,
            network_fee_bp: 500,
            max_winners: 3,
        },
    ),
];

static DEFAULT_REWARD_CONFIG: Lazy<RewardConfig> = Lazy::new(|| {
    let mut entries = Vec::with_capacity(KIND_STRUCTURES.len() * DifficultyLevel::ALL.len());
    for (tag, base) in KIND_STRUCTURES {
        for difficulty in DifficultyLevel::ALL {
            let shift = 250 * difficulty.index() as u32;
            entries.push(RewardStructureEntry {
                task_kind: tag.to_string(),
                difficulty,
                structure: RewardStructure {
                    winner_bp: base.winner_bp + shift,
                    participant_bp: base.participant_bp - shift,
                    ..base
                },
            });
        }
    }
    RewardConfig { entries }
});

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_table_sums_to_total_everywhere() {
        let config = RewardConfig::default();
        assert_eq!(config.entries.len(), 24);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn mismatched_split_is_rejected() {
        let mut structure = fallback_structure();
        structure.network_fee_bp += 1;
        let err = structure.validate().unwrap_err();
        assert!(matches!(
            err,
            MeritumError::SplitBasisPointsMismatch { got: 10_001 }
        ));
    }

    #[test]
    fn slices_conserve_odd_pools() {
        let structure = fallback_structure();
        // A pool that does not divide evenly by any of the splits.
        let pool: Amount = 999_999_937;
        let slices = structure.slice(pool);
        let sum = slices.winner
            + slices.participant
            + slices.validator
            + slices.quality_bonus
            + slices.speed_bonus
            + slices.fee;
        assert_eq!(sum, pool);
        assert!(slices.fee >= pool * structure.network_fee_bp as Amount / 10_000);
    }

    #[test]
    fn difficulty_skews_toward_winners() {
        let config = RewardConfig::default();
        let beginner = config.structure_for("security-audit", DifficultyLevel::Beginner);
        let expert = config.structure_for("security-audit", DifficultyLevel::Expert);
        assert!(expert.winner_bp > beginner.winner_bp);
        assert!(expert.participant_bp < beginner.participant_bp);
        assert_eq!(expert.max_winners, 1);
    }

    #[test]
    fn unknown_kind_falls_back() {
        let config = RewardConfig { entries: Vec::new() };
        assert_eq!(
            config.structure_for("code-analysis", DifficultyLevel::Beginner),
            fallback_structure()
        );
    }
}
