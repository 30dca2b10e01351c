pub mod constants;
pub mod error;
pub mod fraud;
pub mod network;
pub mod reputation;
pub mod reward;
pub mod score;
pub mod submission;
pub mod task;
pub mod types;
pub mod validation;

pub use constants::*;
pub use error::MeritumError;
pub use fraud::{
    clamp01, combine_risk, recommend, FraudAnalysisResult, FraudIndicator, IndicatorKind,
    Recommendation, ReviewPriority, Severity,
};
pub use network::{NearbySubmission, NetworkSnapshot};
pub use reputation::{sybil_risk, ReputationDelta, ReputationEvent, ReputationRecord, SybilRiskLevel};
pub use reward::{RewardDistribution, RewardEntry, RewardKind};
pub use score::SubmissionScore;
pub use submission::{Submission, WorkProof};
pub use task::{
    DifficultyLevel, StatusTransition, StatusTrigger, Task, TaskKind, TaskStatus,
    VerificationMethod,
};
pub use types::*;
pub use validation::{
    effective_records, AutoCheck, RecordSeq, ValidationKind, ValidationRecord, ValidationResult,
};
