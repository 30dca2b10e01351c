use crate::types::{ParticipantId, Score, SubmissionId};
use serde::{Deserialize, Serialize};

/// Composite score of one submission. Derived data: recomputing from the
/// same validation set, task and submission yields identical values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionScore {
    pub submission: SubmissionId,
    pub participant: ParticipantId,
    pub quality: Score,
    pub innovation: Score,
    pub technical_depth: Score,
    pub practicality: Score,
    pub timeliness: Score,
    /// Weighted combination of the sub-scores per the task's weight table.
    pub final_score: Score,
    /// Agreement level across validators, 0.0 (scattered) to 1.0 (unanimous).
    pub validation_consensus: f64,
    pub quality_bonus_eligible: bool,
    pub speed_bonus_eligible: bool,
}

impl SubmissionScore {
    /// Winner eligibility requires strictly exceeding the task threshold.
    pub fn winner_eligible(&self, quality_threshold: Score) -> bool {
        self.final_score > quality_threshold
    }
}
