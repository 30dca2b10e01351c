//! Boundary contracts between the evaluation core and the outside world.
//!
//! The core never owns task persistence, submission transport, vote
//! collection or settlement side effects. It reads through these traits
//! and writes through the sinks; the node binary carries the
//! bundle-backed implementations, tests carry in-memory ones.

use std::collections::BTreeMap;

use async_trait::async_trait;

use meritum_core::error::MeritumError;
use meritum_core::reputation::ReputationDelta;
use meritum_core::reward::RewardDistribution;
use meritum_core::submission::Submission;
use meritum_core::task::{StatusTransition, Task};
use meritum_core::types::{ContentHash, ParticipantId, SubmissionId, TaskId};
use meritum_validation::{ExpertAssessment, PeerVote, ValidatorProfile};

/// Read-only task lookup. The pipeline mutates nothing here; status
/// changes go through [`StatusSink`] so persistence and broadcast stay
/// outside the core.
#[async_trait]
pub trait TaskSource: Send + Sync {
    async fn task(&self, id: &TaskId) -> Result<Task, MeritumError>;
}

/// Receives task status transitions the pipeline decides on.
#[async_trait]
pub trait StatusSink: Send + Sync {
    async fn record_transition(
        &self,
        task: &TaskId,
        transition: &StatusTransition,
    ) -> Result<(), MeritumError>;
}

/// Enumerates a task's submissions and resolves opaque content handles
/// to the bytes the analyzers see. Retrieval and decryption live behind
/// this trait; the core only ever handles what it is given.
#[async_trait]
pub trait SubmissionSource: Send + Sync {
    async fn submissions(&self, task: &TaskId) -> Result<Vec<Submission>, MeritumError>;

    async fn content(&self, handle: &ContentHash) -> Result<Vec<u8>, MeritumError>;
}

/// Supplies the raw validator input collected off-core: peer votes and
/// expert assessments per submission, plus the profile snapshot the
/// eligibility gates judge against.
#[async_trait]
pub trait ValidationSource: Send + Sync {
    async fn peer_votes(&self, submission: &SubmissionId) -> Result<Vec<PeerVote>, MeritumError>;

    async fn expert_assessments(
        &self,
        submission: &SubmissionId,
    ) -> Result<Vec<ExpertAssessment>, MeritumError>;

    async fn validator_profiles(
        &self,
    ) -> Result<BTreeMap<ParticipantId, ValidatorProfile>, MeritumError>;
}

/// Receives the finalized distribution and the reputation deltas it
/// triggered. Token transfer, persistence beyond the settlement gate and
/// participant notification all happen behind this trait.
#[async_trait]
pub trait SettlementSink: Send + Sync {
    async fn settle(
        &self,
        distribution: &RewardDistribution,
        deltas: &[ReputationDelta],
    ) -> Result<(), MeritumError>;
}
