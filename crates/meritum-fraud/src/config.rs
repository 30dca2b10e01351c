use meritum_core::constants::COLLUSION_WINDOW_SECS;
use meritum_core::task::DifficultyLevel;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Expected completion-duration envelope for one (task kind, difficulty).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DurationModel {
    pub min_secs: u64,
    pub mean_secs: u64,
    pub max_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DurationModelEntry {
    pub task_kind: String,
    pub difficulty: DifficultyLevel,
    pub model: DurationModel,
}

/// Tunable fraud-analysis parameters. Thresholds that define the detection
/// semantics stay as constants; this carries the deployment-specific knobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FraudConfig {
    /// Half-width of the collusion time window.
    pub collusion_window_secs: i64,
    /// Per-analyzer timeout; a slower analyzer abstains.
    pub analyzer_timeout_secs: u64,
    /// Cap on corpus candidates fetched per similarity search.
    pub corpus_candidate_limit: usize,
    /// Edge weight added per observed co-submission.
    pub interaction_weight: f64,
    pub duration_models: Vec<DurationModelEntry>,
}

impl FraudConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, meritum_core::MeritumError> {
        let json = std::fs::read_to_string(path)
            .map_err(|e| meritum_core::MeritumError::Storage(e.to_string()))?;
        serde_json::from_str(&json)
            .map_err(|e| meritum_core::MeritumError::Serialization(e.to_string()))
    }

    pub fn duration_model(
        &self,
        task_kind: &str,
        difficulty: DifficultyLevel,
    ) -> Option<DurationModel> {
        self.duration_models
            .iter()
            .find(|e| e.task_kind == task_kind && e.difficulty == difficulty)
            .map(|e| e.model)
    }
}

impl Default for FraudConfig {
    fn default() -> Self {
        DEFAULT_FRAUD_CONFIG.clone()
    }
}

/// Base expected-minimum seconds per task kind at Beginner difficulty; each
/// difficulty step doubles the envelope.
const BASE_MIN_SECS: [(&str, u64); 6] = [
    ("code-analysis", 600),
    ("security-audit", 1_800),
    ("data-analysis", 900),
    ("algorithm-optimization", 1_200),
    ("logic-reasoning", 300),
    ("general", 300),
];

static DEFAULT_FRAUD_CONFIG: Lazy<FraudConfig> = Lazy::new(|| {
    let mut duration_models = Vec::with_capacity(BASE_MIN_SECS.len() * 4);
    for (tag, base) in BASE_MIN_SECS {
        for difficulty in DifficultyLevel::ALL {
            let min_secs = base << difficulty.index();
            duration_models.push(DurationModelEntry {
                task_kind: tag.to_string(),
                difficulty,
                model: DurationModel {
                    min_secs,
                    mean_secs: min_secs * 4,
                    max_secs: min_secs * 12,
                },
            });
        }
    }
    FraudConfig {
        collusion_window_secs: COLLUSION_WINDOW_SECS,
        analyzer_timeout_secs: 30,
        corpus_candidate_limit: 256,
        interaction_weight: 0.05,
        duration_models,
    }
});
