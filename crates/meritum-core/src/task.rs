use crate::constants::{
    CONSENSUS_APPROVAL_THRESHOLD, MAX_STAKE_BP, MAX_TASK_DURATION_SECS, MIN_STAKE_BP,
    MIN_VALIDATOR_REPUTATION, SUBMISSION_COOLDOWN_SECS,
};
use crate::error::MeritumError;
use crate::types::{Amount, ParticipantId, TaskId, Timestamp};
use serde::{Deserialize, Serialize};
use std::fmt;

// ── Task kind ────────────────────────────────────────────────────────────────

/// What kind of work a task asks for. The payload carries the parameters the
/// matching automatic validators and scoring weight tables key off.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TaskKind {
    CodeAnalysis { language: String, complexity: u8 },
    SecurityAudit { scope: String, standards: Vec<String> },
    DataAnalysis { domain: String, dataset_size: u64 },
    AlgorithmOptimization { target: String, baseline_metric: f64 },
    LogicReasoning { domain: String },
    GeneralTask { description: String },
}

impl TaskKind {
    /// Stable tag used for config lookup and capability matching.
    pub fn tag(&self) -> &'static str {
        match self {
            TaskKind::CodeAnalysis { .. } => "code-analysis",
            TaskKind::SecurityAudit { .. } => "security-audit",
            TaskKind::DataAnalysis { .. } => "data-analysis",
            TaskKind::AlgorithmOptimization { .. } => "algorithm-optimization",
            TaskKind::LogicReasoning { .. } => "logic-reasoning",
            TaskKind::GeneralTask { .. } => "general",
        }
    }

    /// The specialization domain a validator must cover to review this task,
    /// if the kind implies one.
    pub fn required_domain(&self) -> Option<&str> {
        match self {
            TaskKind::CodeAnalysis { language, .. } => Some(language),
            TaskKind::SecurityAudit { scope, .. } => Some(scope),
            TaskKind::DataAnalysis { domain, .. } => Some(domain),
            TaskKind::AlgorithmOptimization { target, .. } => Some(target),
            TaskKind::LogicReasoning { domain } => Some(domain),
            TaskKind::GeneralTask { .. } => None,
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tag())
    }
}

// ── Difficulty ───────────────────────────────────────────────────────────────

/// Task difficulty tier. Drives consensus thresholds, validator reputation
/// minimums, submission cooldowns and reward-structure lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DifficultyLevel {
    Beginner,
    Intermediate,
    Advanced,
    Expert,
}

impl DifficultyLevel {
    pub const ALL: [DifficultyLevel; 4] = [
        DifficultyLevel::Beginner,
        DifficultyLevel::Intermediate,
        DifficultyLevel::Advanced,
        DifficultyLevel::Expert,
    ];

    pub fn index(self) -> usize {
        match self {
            DifficultyLevel::Beginner => 0,
            DifficultyLevel::Intermediate => 1,
            DifficultyLevel::Advanced => 2,
            DifficultyLevel::Expert => 3,
        }
    }

    /// Cooldown between submissions by one participant at this tier.
    pub fn submission_cooldown_secs(self) -> i64 {
        SUBMISSION_COOLDOWN_SECS[self.index()]
    }

    /// Fraction of weighted votes that must agree for consensus.
    pub fn approval_threshold(self) -> f64 {
        CONSENSUS_APPROVAL_THRESHOLD[self.index()]
    }

    /// Minimum effective reputation for a peer validator at this tier.
    pub fn min_validator_reputation(self) -> u32 {
        MIN_VALIDATOR_REPUTATION[self.index()]
    }
}

impl fmt::Display for DifficultyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DifficultyLevel::Beginner => "beginner",
            DifficultyLevel::Intermediate => "intermediate",
            DifficultyLevel::Advanced => "advanced",
            DifficultyLevel::Expert => "expert",
        };
        write!(f, "{s}")
    }
}

// ── Verification method ──────────────────────────────────────────────────────

/// How submissions to this task are validated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum VerificationMethod {
    /// Capability-matched automatic validators only.
    Automatic,
    /// Peer review with a consensus aggregation over the individual votes.
    PeerReview {
        required_reviewers: u32,
        consensus_threshold: f64,
    },
    /// A fixed number of certified expert reviews.
    ExpertReview { expert_count: u32 },
    /// Weighted blend of the tiers; weights in basis points, must sum to
    /// 10000.
    Hybrid {
        auto_bp: u32,
        peer_bp: u32,
        expert_bp: u32,
    },
}

impl VerificationMethod {
    pub fn validate(&self) -> Result<(), MeritumError> {
        if let VerificationMethod::Hybrid {
            auto_bp,
            peer_bp,
            expert_bp,
        } = self
        {
            let sum = auto_bp + peer_bp + expert_bp;
            if sum != 10_000 {
                return Err(MeritumError::HybridWeightsMismatch { got: sum });
            }
        }
        Ok(())
    }
}

// ── Status machine ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskStatus {
    Published,
    InProgress,
    AnswersSubmitted,
    UnderValidation,
    Completed,
    Expired,
    Disputed,
    Cancelled,
}

impl TaskStatus {
    /// Terminal states admit no further transitions.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Expired | TaskStatus::Cancelled
        )
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskStatus::Published => "published",
            TaskStatus::InProgress => "in-progress",
            TaskStatus::AnswersSubmitted => "answers-submitted",
            TaskStatus::UnderValidation => "under-validation",
            TaskStatus::Completed => "completed",
            TaskStatus::Expired => "expired",
            TaskStatus::Disputed => "disputed",
            TaskStatus::Cancelled => "cancelled",
        };
        write!(f, "{s}")
    }
}

/// What caused a status transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatusTrigger {
    Expiry,
    ParticipantAction,
    ValidationComplete,
    DisputeResolution,
    AdminAction,
}

/// One recorded status change. Transitions are append-only history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusTransition {
    pub from: TaskStatus,
    pub to: TaskStatus,
    pub at: Timestamp,
    pub trigger: StatusTrigger,
}

/// Legal forward edges of the task lifecycle.
fn transition_allowed(from: TaskStatus, to: TaskStatus) -> bool {
    use TaskStatus::*;
    matches!(
        (from, to),
        (Published, InProgress)
            | (Published, Expired)
            | (Published, Cancelled)
            | (InProgress, AnswersSubmitted)
            | (InProgress, Expired)
            | (InProgress, Cancelled)
            | (AnswersSubmitted, UnderValidation)
            | (AnswersSubmitted, Expired)
            | (AnswersSubmitted, Cancelled)
            | (UnderValidation, Completed)
            | (UnderValidation, Disputed)
            | (UnderValidation, Expired)
            | (UnderValidation, Cancelled)
            | (Disputed, UnderValidation)
            | (Disputed, Completed)
            | (Disputed, Cancelled)
    )
}

// ── Task ─────────────────────────────────────────────────────────────────────

/// A published unit of work. Immutable once published except for the status
/// field, which only the evaluation pipeline drives (writes are persisted
/// through the external status sink).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub publisher: ParticipantId,
    pub title: String,
    pub kind: TaskKind,
    pub difficulty: DifficultyLevel,
    /// Total reward pool in merits.
    pub reward_pool: Amount,
    /// Stake the publisher escrowed; must sit within 10–50% of the pool.
    pub required_stake: Amount,
    pub published_at: Timestamp,
    pub submission_deadline: Timestamp,
    pub validation_deadline: Timestamp,
    /// Minimum final score for winner eligibility (0–100).
    pub quality_threshold: u8,
    pub verification: VerificationMethod,
    pub status: TaskStatus,
    pub status_history: Vec<StatusTransition>,
}

impl Task {
    /// Check the publication-time rules. Called once when a task enters the
    /// evaluation core; the marketplace enforces the same rules upstream.
    ///
    /// # Errors
    /// Stake outside 10–50% of the pool, a deadline more than 30 days out, a
    /// validation deadline before the submission deadline, a threshold above
    /// 100, or malformed hybrid weights.
    pub fn validate_publication(&self) -> Result<(), MeritumError> {
        let min = self.reward_pool * MIN_STAKE_BP as u128 / 10_000;
        let max = self.reward_pool * MAX_STAKE_BP as u128 / 10_000;
        if self.required_stake < min || self.required_stake > max {
            return Err(MeritumError::StakeOutOfBounds {
                min,
                max,
                got: self.required_stake,
            });
        }
        if self.submission_deadline - self.published_at > MAX_TASK_DURATION_SECS {
            return Err(MeritumError::DeadlineTooFar {
                max_secs: MAX_TASK_DURATION_SECS,
            });
        }
        if self.validation_deadline < self.submission_deadline {
            return Err(MeritumError::ValidationDeadlineBeforeSubmission);
        }
        if self.quality_threshold > 100 {
            return Err(MeritumError::QualityThresholdOutOfRange(
                self.quality_threshold,
            ));
        }
        self.verification.validate()
    }

    /// Drive the status machine. Illegal edges and transitions out of a
    /// terminal state are errors; legal ones are appended to the history.
    pub fn transition(
        &mut self,
        to: TaskStatus,
        at: Timestamp,
        trigger: StatusTrigger,
    ) -> Result<(), MeritumError> {
        if self.status.is_terminal() || !transition_allowed(self.status, to) {
            return Err(MeritumError::InvalidStatusTransition {
                from: self.status.to_string(),
                to: to.to_string(),
            });
        }
        self.status_history.push(StatusTransition {
            from: self.status,
            to,
            at,
            trigger,
        });
        self.status = to;
        Ok(())
    }

    pub fn submission_window_contains(&self, at: Timestamp) -> bool {
        at >= self.published_at && at <= self.submission_deadline
    }

    /// Wall-clock seconds between publication and the submission deadline.
    pub fn time_budget_secs(&self) -> i64 {
        self.submission_deadline - self.published_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: Timestamp = 1_700_000_000;

    fn make_task() -> Task {
        let publisher = ParticipantId::from_bytes([1u8; 32]);
        Task {
            id: TaskId::derive(&publisher, NOW, "audit the bridge"),
            publisher,
            title: "audit the bridge".into(),
            kind: TaskKind::SecurityAudit {
                scope: "bridge-contracts".into(),
                standards: vec!["CWE".into()],
            },
            difficulty: DifficultyLevel::Advanced,
            reward_pool: 10_000_000,
            required_stake: 2_000_000,
            published_at: NOW,
            submission_deadline: NOW + 7 * 24 * 3600,
            validation_deadline: NOW + 10 * 24 * 3600,
            quality_threshold: 75,
            verification: VerificationMethod::PeerReview {
                required_reviewers: 3,
                consensus_threshold: 0.7,
            },
            status: TaskStatus::Published,
            status_history: Vec::new(),
        }
    }

    #[test]
    fn publication_rules_accept_valid_task() {
        assert!(make_task().validate_publication().is_ok());
    }

    #[test]
    fn stake_outside_bounds_is_rejected() {
        let mut task = make_task();
        task.required_stake = 100; // below 10% of pool
        assert!(matches!(
            task.validate_publication(),
            Err(MeritumError::StakeOutOfBounds { .. })
        ));
        task.required_stake = 6_000_000; // above 50%
        assert!(matches!(
            task.validate_publication(),
            Err(MeritumError::StakeOutOfBounds { .. })
        ));
    }

    #[test]
    fn deadline_cap_is_thirty_days() {
        let mut task = make_task();
        task.submission_deadline = NOW + MAX_TASK_DURATION_SECS + 1;
        task.validation_deadline = task.submission_deadline + 3600;
        assert!(matches!(
            task.validate_publication(),
            Err(MeritumError::DeadlineTooFar { .. })
        ));
    }

    #[test]
    fn hybrid_weights_must_sum() {
        let mut task = make_task();
        task.verification = VerificationMethod::Hybrid {
            auto_bp: 3_000,
            peer_bp: 3_000,
            expert_bp: 3_000,
        };
        assert!(matches!(
            task.validate_publication(),
            Err(MeritumError::HybridWeightsMismatch { got: 9_000 })
        ));
    }

    #[test]
    fn lifecycle_happy_path() {
        let mut task = make_task();
        task.transition(TaskStatus::InProgress, NOW + 10, StatusTrigger::ParticipantAction)
            .unwrap();
        task.transition(
            TaskStatus::AnswersSubmitted,
            NOW + 20,
            StatusTrigger::ParticipantAction,
        )
        .unwrap();
        task.transition(TaskStatus::UnderValidation, NOW + 30, StatusTrigger::Expiry)
            .unwrap();
        task.transition(
            TaskStatus::Completed,
            NOW + 40,
            StatusTrigger::ValidationComplete,
        )
        .unwrap();
        assert_eq!(task.status, TaskStatus::Completed);
        assert_eq!(task.status_history.len(), 4);
        assert_eq!(task.status_history[0].from, TaskStatus::Published);
    }

    #[test]
    fn illegal_transition_is_rejected() {
        let mut task = make_task();
        let err = task
            .transition(TaskStatus::Completed, NOW, StatusTrigger::AdminAction)
            .unwrap_err();
        assert!(matches!(err, MeritumError::InvalidStatusTransition { .. }));
    }

    #[test]
    fn terminal_states_are_final() {
        let mut task = make_task();
        task.transition(TaskStatus::Cancelled, NOW, StatusTrigger::AdminAction)
            .unwrap();
        assert!(task
            .transition(TaskStatus::InProgress, NOW + 1, StatusTrigger::AdminAction)
            .is_err());
    }

    #[test]
    fn disputed_can_reenter_validation() {
        let mut task = make_task();
        task.transition(TaskStatus::InProgress, NOW, StatusTrigger::ParticipantAction)
            .unwrap();
        task.transition(
            TaskStatus::AnswersSubmitted,
            NOW + 1,
            StatusTrigger::ParticipantAction,
        )
        .unwrap();
        task.transition(TaskStatus::UnderValidation, NOW + 2, StatusTrigger::Expiry)
            .unwrap();
        task.transition(TaskStatus::Disputed, NOW + 3, StatusTrigger::ParticipantAction)
            .unwrap();
        task.transition(
            TaskStatus::UnderValidation,
            NOW + 4,
            StatusTrigger::DisputeResolution,
        )
        .unwrap();
        assert_eq!(task.status, TaskStatus::UnderValidation);
    }

    #[test]
    fn difficulty_lookups_line_up() {
        assert_eq!(DifficultyLevel::Beginner.submission_cooldown_secs(), 300);
        assert_eq!(DifficultyLevel::Expert.submission_cooldown_secs(), 3_600);
        assert!(DifficultyLevel::Expert.approval_threshold() > DifficultyLevel::Beginner.approval_threshold());
        assert_eq!(DifficultyLevel::Advanced.min_validator_reputation(), 6_000);
    }
}
