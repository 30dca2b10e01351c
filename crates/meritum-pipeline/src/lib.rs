//! meritum-pipeline
//!
//! Ties the engines together: for each task under validation, fraud
//! screening gates every submission, the validation tiers aggregate
//! validator input, the scoring engine produces the competitive set and
//! the reward engine settles the pool. The crate owns the orchestration
//! and the boundary traits; everything stateful or external sits behind
//! [`traits`] or the stores.

pub mod evaluator;
pub mod traits;

pub use evaluator::{
    EvaluationOutcome, EvaluationSources, HeldSubmission, HoldReason, RejectedSubmission,
    TaskEvaluator,
};
pub use traits::{SettlementSink, StatusSink, SubmissionSource, TaskSource, ValidationSource};
