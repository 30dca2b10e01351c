//! meritum-scoring
//!
//! Converts a submission's validation evidence into a composite
//! [`SubmissionScore`](meritum_core::score::SubmissionScore): a quality
//! figure weighted by validation kind, dedicated innovation / technical
//! depth / practicality passes, deadline-proximity timeliness, and a final
//! score combined through a per-task-kind weight table.

pub mod engine;
pub mod weights;

pub use engine::ScoringEngine;
pub use weights::{ScoreWeightEntry, ScoreWeights, ScoringConfig, WEIGHT_TOTAL_BP};
