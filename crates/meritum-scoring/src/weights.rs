//! Final-score weight tables and scoring knobs.
//!
//! How much each sub-score counts toward the final score depends on what
//! kind of work the task asked for: a security audit lives or dies on
//! correctness and practicality, an optimization task on technical depth
//! and speed. The table is configuration, loaded from JSON, so operators
//! can retune it without touching the engine.

use std::path::Path;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use meritum_core::error::MeritumError;
use meritum_core::task::DifficultyLevel;
use meritum_core::types::{BasisPoints, Score};

pub const WEIGHT_TOTAL_BP: BasisPoints = 10_000;

// ── Weights ─────────────────────────────────────────────────────────────────

/// Relative weight of each sub-score in the final score, in basis points.
/// The five weights must sum to exactly [`WEIGHT_TOTAL_BP`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreWeights {
    pub quality_bp: BasisPoints,
    pub innovation_bp: BasisPoints,
    pub technical_depth_bp: BasisPoints,
    pub practicality_bp: BasisPoints,
    pub timeliness_bp: BasisPoints,
}

impl ScoreWeights {
    pub fn validate(&self) -> Result<(), MeritumError> {
        let got = self.quality_bp
            + self.innovation_bp
            + self.technical_depth_bp
            + self.practicality_bp
            + self.timeliness_bp;
        if got != WEIGHT_TOTAL_BP {
            return Err(MeritumError::ScoreWeightsMismatch { got });
        }
        Ok(())
    }

    /// Weighted combination of the sub-scores, floor-rounded.
    pub fn combine(
        &self,
        quality: Score,
        innovation: Score,
        technical_depth: Score,
        practicality: Score,
        timeliness: Score,
    ) -> Score {
        let sum = quality as u32 * self.quality_bp
            + innovation as u32 * self.innovation_bp
            + technical_depth as u32 * self.technical_depth_bp
            + practicality as u32 * self.practicality_bp
            + timeliness as u32 * self.timeliness_bp;
        (sum / WEIGHT_TOTAL_BP) as Score
    }

    /// Quality-leaning weights used when a task kind has no table entry.
    pub fn balanced() -> Self {
        Self {
            quality_bp: 4_000,
            innovation_bp: 1_500,
            technical_depth_bp: 2_000,
            practicality_bp: 1_500,
            timeliness_bp: 1_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreWeightEntry {
    pub task_kind: String,
    pub difficulty: DifficultyLevel,
    pub weights: ScoreWeights,
}

// ── Config ──────────────────────────────────────────────────────────────────

/// Scoring configuration: how validation kinds are weighted in the
/// composite, bonus eligibility cut-offs, and the final-score weight table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringConfig {
    /// Fixed composite weight of one automatic validation entry.
    pub auto_weight: f64,
    /// Premium multiplied onto the reputation-derived weight of an expert
    /// entry.
    pub expert_premium: f64,
    /// Final score at or above which a submission becomes quality-bonus
    /// eligible.
    pub quality_bonus_threshold: Score,
    /// Fraction of the task's time budget inside which a submission becomes
    /// speed-bonus eligible.
    pub speed_bonus_fraction: f64,
    pub weight_table: Vec<ScoreWeightEntry>,
}

impl ScoringConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, MeritumError> {
        let json = std::fs::read_to_string(path)
            .map_err(|e| MeritumError::Storage(e.to_string()))?;
        let config: Self = serde_json::from_str(&json)
            .map_err(|e| MeritumError::Serialization(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), MeritumError> {
        for entry in &self.weight_table {
            entry.weights.validate()?;
        }
        Ok(())
    }

    /// Weight row for one (task kind, difficulty), falling back to the
    /// balanced row when the table has no entry.
    pub fn weights_for(&self, task_kind: &str, difficulty: DifficultyLevel) -> ScoreWeights {
        self.weight_table
            .iter()
            .find(|e| e.task_kind == task_kind && e.difficulty == difficulty)
            .map(|e| e.weights)
            .unwrap_or_else(ScoreWeights::balanced)
    }
}

impl Default for ScoringConfig {
    fn default() -> Self {
        DEFAULT_SCORING_CONFIG.clone()
    }
}

/// Per-kind weight rows; the same row serves every difficulty by default.
const KIND_WEIGHTS: [(&str, ScoreWeights); 6] = [
    (
        "code-analysis",
        ScoreWeights {
            quality_bp: 4_000,
            innovation_bp: 1_000,
            technical_depth_bp: 2_500,
            practicality_bp: 1_500,
            timeliness_bp: 1_000,
        },
    ),
    (
        "security-audit",
        ScoreWeights {
            quality_bp: 4_500,
            innovation_bp: 500,
            technical_depth_bp: 2_000,
            practicality_bp: 2_500,
            timeliness_bp: 500,
        },
    ),
    (
        "data-analysis",
        ScoreWeights {
            quality_bp: 4_000,
            innovation_bp: 1_500,
            technical_depth_bp: 2_000,
            practicality_bp: 1_500,
            timeliness_bp: 1_000,
        },
    ),
    (
        "algorithm-optimization",
        ScoreWeights {
            quality_bp: 3_000,
            innovation_bp: 1_500,
            technical_depth_bp: 3_000,
            practicality_bp: 1_000,
            timeliness_bp: 1_500,
        },
    ),
    (
        "logic-reasoning",
        ScoreWeights {
            quality_bp: 4_500,
            innovation_bp: 2_000,
            technical_depth_bp: 1_500,
            practicality_bp: 1_000,
            timeliness_bp: 1_000,
        },
    ),
    (
        "general",
        ScoreWeights {
            quality_bp: 5_000,
            innovation_bp: 1_000,
            technical_depth_bp: 1_500,
            practicality_bp: 1_500,
            timeliness_bp: 1_000,
        },
    ),
];

static DEFAULT_SCORING_CONFIG: Lazy<ScoringConfig> = Lazy::new(|| {
    let mut weight_table = Vec::with_capacity(KIND_WEIGHTS.len() * DifficultyLevel::ALL.len());
    for (tag, weights) in KIND_WEIGHTS {
        for difficulty in DifficultyLevel::ALL {
            weight_table.push(ScoreWeightEntry {
                task_kind: tag.to_string(),
                difficulty,
                weights,
            });
        }
    }
    ScoringConfig {
        auto_weight: 1.0,
        expert_premium: 1.5,
        quality_bonus_threshold: 90,
        speed_bonus_fraction: 0.25,
        weight_table,
    }
});

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_table_rows_all_sum_to_total() {
        let config = ScoringConfig::default();
        assert_eq!(config.weight_table.len(), 24);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn mismatched_weights_are_rejected() {
        let weights = ScoreWeights {
            quality_bp: 4_000,
            innovation_bp: 1_500,
            technical_depth_bp: 2_000,
            practicality_bp: 1_500,
            timeliness_bp: 1_500,
        };
        let err = weights.validate().unwrap_err();
        assert!(matches!(err, MeritumError::ScoreWeightsMismatch { got: 10_500 }));
    }

    #[test]
    fn combine_is_exact_at_the_extremes() {
        let weights = ScoreWeights::balanced();
        assert_eq!(weights.combine(100, 100, 100, 100, 100), 100);
        assert_eq!(weights.combine(0, 0, 0, 0, 0), 0);
    }

    #[test]
    fn security_audits_lean_on_quality_and_practicality() {
        let config = ScoringConfig::default();
        let audit = config.weights_for("security-audit", DifficultyLevel::Expert);
        let optimization = config.weights_for("algorithm-optimization", DifficultyLevel::Expert);

        // Identical sub-scores except practicality: the audit separates more.
        let strong_practice = |w: ScoreWeights| w.combine(80, 80, 80, 95, 80);
        assert!(strong_practice(audit) > strong_practice(optimization));
        // And the optimization table rewards depth and speed harder.
        let deep_and_fast = |w: ScoreWeights| w.combine(80, 80, 95, 80, 95);
        assert!(deep_and_fast(optimization) > deep_and_fast(audit));
    }

    #[test]
    fn unknown_kinds_fall_back_to_balanced() {
        let config = ScoringConfig {
            weight_table: Vec::new(),
            ..ScoringConfig::default()
        };
        assert_eq!(
            config.weights_for("code-analysis", DifficultyLevel::Beginner),
            ScoreWeights::balanced()
        );
    }

    #[test]
    fn config_round_trips_through_json() {
        let config = ScoringConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let back: ScoringConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }
}
