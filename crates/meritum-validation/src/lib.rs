//! meritum-validation
//!
//! The validation tiers: capability-scoped automatic checks, gated peer
//! review with stake- and reputation-weighted consensus, and certified
//! expert review. [`ValidationTierRunner`] routes a submission through the
//! tier its task was published with and reports accepted results next to
//! every refusal.

pub mod capability;
pub mod consensus;
pub mod eligibility;
pub mod runner;

pub use capability::{AutoAssessment, AutoValidator, CapabilityRegistry};
pub use consensus::{weighted_consensus, ConsensusOutcome, VoteWeighting, WeightedVote};
pub use eligibility::{
    check_expert_eligibility, check_peer_eligibility, Certification, ReviewContext,
    ValidatorProfile,
};
pub use runner::{
    ExpertAssessment, PeerVote, Refusal, ValidationInputs, ValidationRun, ValidationTierRunner,
};
