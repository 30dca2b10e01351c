use thiserror::Error;

#[derive(Debug, Error)]
pub enum MeritumError {
    // ── Task errors ──────────────────────────────────────────────────────────
    #[error("task not found: {0}")]
    TaskNotFound(String),

    #[error("invalid task status transition: {from} → {to}")]
    InvalidStatusTransition { from: String, to: String },

    #[error("task is not awaiting evaluation (status {0})")]
    TaskNotEvaluable(String),

    #[error("required stake out of bounds: {got} merits (allowed {min}..={max})")]
    StakeOutOfBounds { min: u128, max: u128, got: u128 },

    #[error("submission deadline too far out: maximum {max_secs} seconds after publication")]
    DeadlineTooFar { max_secs: i64 },

    #[error("validation deadline must not precede the submission deadline")]
    ValidationDeadlineBeforeSubmission,

    #[error("quality threshold must be 0–100; got {0}")]
    QualityThresholdOutOfRange(u8),

    #[error("hybrid verification weights must sum to 10000 basis points; got {got}")]
    HybridWeightsMismatch { got: u32 },

    // ── Submission errors ────────────────────────────────────────────────────
    #[error("submission not found: {0}")]
    SubmissionNotFound(String),

    #[error("duplicate submission: participant {participant} already submitted to task {task}")]
    DuplicateSubmission { task: String, participant: String },

    #[error("submission timestamp outside the task window")]
    SubmissionOutsideWindow,

    #[error("submission content unavailable: {0}")]
    ContentUnavailable(String),

    #[error("score out of range: {0} (scores are 0–100)")]
    ScoreOutOfRange(u8),

    #[error("confidence out of range: {0} (confidence is 0.0–1.0)")]
    ConfidenceOutOfRange(f64),

    // ── Validator eligibility (always fail closed) ───────────────────────────
    #[error("automatic validation not supported: no capable validator for {task_kind}")]
    AutoValidationNotSupported { task_kind: String },

    #[error("insufficient reputation: need {need}, have {have}")]
    InsufficientReputation { need: u32, have: u32 },

    #[error("validator lacks required domain specialization: {required}")]
    DomainMismatch { required: String },

    #[error("conflict of interest: {0}")]
    ConflictOfInterest(String),

    #[error("validation rate limit exceeded: {performed} similar validations in window (limit {limit})")]
    ValidationRateLimited { performed: u32, limit: u32 },

    #[error("insufficient expertise: no valid certification for {domain}")]
    InsufficientExpertise { domain: String },

    #[error("certification expired at {expired_at}")]
    ExpiredCertification { expired_at: i64 },

    #[error("validation accuracy too low: {got:.3} (minimum {min:.2})")]
    LowValidationAccuracy { min: f64, got: f64 },

    #[error("insufficient reviewers: need {need}, got {got}")]
    InsufficientReviewers { need: u32, got: u32 },

    // ── Scoring errors ───────────────────────────────────────────────────────
    #[error("no validations recorded for submission {0}")]
    NoValidations(String),

    #[error("score weight table entries must sum to 10000 basis points; got {got}")]
    ScoreWeightsMismatch { got: u32 },

    // ── Settlement errors ────────────────────────────────────────────────────
    #[error("reward split basis points must sum to 10000; got {got}")]
    SplitBasisPointsMismatch { got: u32 },

    #[error("settlement imbalance: distributed {distributed} + fee {fee} ≠ pool {pool}")]
    SettlementImbalance { distributed: u128, fee: u128, pool: u128 },

    #[error("task already finalized: {0}")]
    AlreadyFinalized(String),

    #[error("empty reward pool for task {0}")]
    EmptyRewardPool(String),

    // ── Reputation errors ────────────────────────────────────────────────────
    #[error("unknown participant: {0}")]
    UnknownParticipant(String),

    // ── Serialization / storage ──────────────────────────────────────────────
    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("storage error: {0}")]
    Storage(String),

    // ── Pipeline ─────────────────────────────────────────────────────────────
    #[error("evaluation cancelled for task {0}")]
    Cancelled(String),

    #[error("evaluation timed out for submission {0}")]
    EvaluationTimeout(String),

    #[error("{0}")]
    Other(String),
}
