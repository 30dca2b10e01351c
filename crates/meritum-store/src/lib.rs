//! meritum-store
//!
//! Shared evaluation state behind trait handles: the global solution
//! corpus, the pairwise collusion graph, per-participant timing history and
//! reputation. Each store has a sled-backed implementation (production, one
//! `EvalDb` per node) and an in-memory one (tests, single-shot runs). The
//! analyzers and the pipeline only ever see the traits.

pub mod collusion;
pub mod corpus;
pub mod db;
pub mod reputation;
pub mod timing;

pub use collusion::{CollusionGraph, EdgeStats, MemoryCollusionGraph, SledCollusionGraph};
pub use corpus::{CorpusEntry, MemoryCorpus, SledCorpus, SolutionCorpus};
pub use db::EvalDb;
pub use reputation::{MemoryReputationStore, ReputationStore, SledReputationStore};
pub use timing::{MemoryTimingHistory, SledTimingHistory, TimingHistory};
