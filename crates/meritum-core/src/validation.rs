use crate::constants::VALIDATION_PASS_SCORE;
use crate::error::MeritumError;
use crate::types::{Confidence, ParticipantId, Score, SubmissionId, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

// ── Validation results ───────────────────────────────────────────────────────

/// Outcome of one automatic check (syntax, static analysis, security scan,
/// benchmark, ...) as reported by a capability provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutoCheck {
    pub name: String,
    pub score: Score,
    pub detail: String,
}

impl AutoCheck {
    pub fn passed(&self) -> bool {
        self.score >= VALIDATION_PASS_SCORE
    }
}

/// Which validation tier produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValidationKind {
    Automatic,
    Peer,
    Expert,
    Consensus,
}

impl fmt::Display for ValidationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ValidationKind::Automatic => "automatic",
            ValidationKind::Peer => "peer",
            ValidationKind::Expert => "expert",
            ValidationKind::Consensus => "consensus",
        };
        write!(f, "{s}")
    }
}

/// One validator's assessment of one submission. Scores are 0–100,
/// confidence 0.0–1.0; `validate` enforces both bounds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ValidationResult {
    Automatic {
        validator_tag: String,
        overall_score: Score,
        checks: Vec<AutoCheck>,
        confidence: Confidence,
    },
    PeerReview {
        validator: ParticipantId,
        quality_score: Score,
        confidence: Confidence,
        reviewed_at: Timestamp,
    },
    ExpertReview {
        expert: ParticipantId,
        overall_score: Score,
        innovation: Score,
        technical_depth: Score,
        practicality: Score,
        standards_compliance: Score,
        confidence: Confidence,
    },
    Consensus {
        participants: Vec<ParticipantId>,
        consensus_score: Score,
        consensus_confidence: Confidence,
    },
}

impl ValidationResult {
    pub fn kind(&self) -> ValidationKind {
        match self {
            ValidationResult::Automatic { .. } => ValidationKind::Automatic,
            ValidationResult::PeerReview { .. } => ValidationKind::Peer,
            ValidationResult::ExpertReview { .. } => ValidationKind::Expert,
            ValidationResult::Consensus { .. } => ValidationKind::Consensus,
        }
    }

    /// The headline quality score of this result.
    pub fn score(&self) -> Score {
        match self {
            ValidationResult::Automatic { overall_score, .. } => *overall_score,
            ValidationResult::PeerReview { quality_score, .. } => *quality_score,
            ValidationResult::ExpertReview { overall_score, .. } => *overall_score,
            ValidationResult::Consensus { consensus_score, .. } => *consensus_score,
        }
    }

    pub fn confidence(&self) -> Confidence {
        match self {
            ValidationResult::Automatic { confidence, .. } => *confidence,
            ValidationResult::PeerReview { confidence, .. } => *confidence,
            ValidationResult::ExpertReview { confidence, .. } => *confidence,
            ValidationResult::Consensus {
                consensus_confidence,
                ..
            } => *consensus_confidence,
        }
    }

    /// The individual validator behind this result, where one exists.
    pub fn validator(&self) -> Option<&ParticipantId> {
        match self {
            ValidationResult::PeerReview { validator, .. } => Some(validator),
            ValidationResult::ExpertReview { expert, .. } => Some(expert),
            _ => None,
        }
    }

    /// Enforce the fixed representational contracts.
    ///
    /// # Errors
    /// Any score above 100 or confidence outside [0, 1].
    pub fn validate(&self) -> Result<(), MeritumError> {
        let scores: Vec<Score> = match self {
            ValidationResult::Automatic {
                overall_score,
                checks,
                ..
            } => {
                let mut v = vec![*overall_score];
                v.extend(checks.iter().map(|c| c.score));
                v
            }
            ValidationResult::PeerReview { quality_score, .. } => vec![*quality_score],
            ValidationResult::ExpertReview {
                overall_score,
                innovation,
                technical_depth,
                practicality,
                standards_compliance,
                ..
            } => vec![
                *overall_score,
                *innovation,
                *technical_depth,
                *practicality,
                *standards_compliance,
            ],
            ValidationResult::Consensus {
                consensus_score, ..
            } => vec![*consensus_score],
        };
        for s in scores {
            if s > 100 {
                return Err(MeritumError::ScoreOutOfRange(s));
            }
        }
        let c = self.confidence();
        if !(0.0..=1.0).contains(&c) {
            return Err(MeritumError::ConfidenceOutOfRange(c));
        }
        Ok(())
    }
}

// ── Append-only records ──────────────────────────────────────────────────────

/// Sequence number of a validation record within one submission's history.
pub type RecordSeq = u64;

/// A recorded validation result. Records are append-only: a correction is a
/// new record whose `supersedes` names the old one, never an in-place edit,
/// so the full audit trail survives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationRecord {
    pub seq: RecordSeq,
    pub submission: SubmissionId,
    pub result: ValidationResult,
    pub recorded_at: Timestamp,
    pub supersedes: Option<RecordSeq>,
}

/// The effective view of a record history: everything not superseded by a
/// later record.
pub fn effective_records(records: &[ValidationRecord]) -> Vec<&ValidationRecord> {
    let superseded: HashSet<RecordSeq> =
        records.iter().filter_map(|r| r.supersedes).collect();
    records
        .iter()
        .filter(|r| !superseded.contains(&r.seq))
        .collect()
}
