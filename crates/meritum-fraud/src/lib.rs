//! meritum-fraud
//!
//! Fraud-risk screening for submissions: statistical timing checks,
//! behavioral pattern detection, cross-participant collusion correlation
//! and multi-algorithm plagiarism search, combined by [`FraudEngine`] into
//! one risk score and a recommendation the pipeline gates on.

pub mod collusion;
pub mod config;
pub mod engine;
pub mod pattern;
pub mod plagiarism;
pub mod similarity;
pub mod timing;

pub use collusion::{CollusionAnalysisResult, CollusionAnalyzer};
pub use config::{DurationModel, DurationModelEntry, FraudConfig};
pub use engine::FraudEngine;
pub use pattern::{PatternAnalysisResult, PatternAnalyzer};
pub use plagiarism::{MatchType, PlagiarismAnalyzer, PlagiarismMatch, PlagiarismReport};
pub use timing::{TimeAnalysisResult, TimingAnalyzer};
