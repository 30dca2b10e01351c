//! Offline evaluation bundles.
//!
//! A bundle is one JSON file carrying everything a single evaluation run
//! needs: the tasks under validation, their submissions, the plaintext
//! solution bodies, the raw peer votes and expert assessments collected
//! off-core, validator profile snapshots, and the participants' timing
//! history. [`BundleSources`] exposes the bundle through the pipeline's
//! boundary traits so the node can drive [`TaskEvaluator`] end to end
//! without a live network.
//!
//! [`TaskEvaluator`]: meritum_pipeline::TaskEvaluator

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Mutex;

use anyhow::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

use meritum_core::reputation::ReputationDelta;
use meritum_core::reward::RewardDistribution;
use meritum_core::submission::Submission;
use meritum_core::task::{StatusTransition, Task};
use meritum_core::types::{ContentHash, ParticipantId, SubmissionId, TaskId, Timestamp};
use meritum_core::MeritumError;
use meritum_pipeline::{SettlementSink, StatusSink, SubmissionSource, TaskSource, ValidationSource};
use meritum_store::TimingHistory;
use meritum_validation::{ExpertAssessment, PeerVote, ValidatorProfile};

// ── Bundle format ────────────────────────────────────────────────────────────

/// A peer vote addressed to one submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BundlePeerVote {
    pub submission: SubmissionId,
    pub vote: PeerVote,
}

/// An expert assessment addressed to one submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BundleExpertAssessment {
    pub submission: SubmissionId,
    pub assessment: ExpertAssessment,
}

/// Completion durations one participant has recorded for a task kind,
/// oldest first. Seeds the timing history the fraud analyzers read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionSample {
    pub participant: ParticipantId,
    pub task_kind: String,
    pub durations_secs: Vec<u64>,
}

/// Past submission timestamps for one participant, oldest first. Seeds
/// the cadence history behind the pattern analyzer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CadenceSample {
    pub participant: ParticipantId,
    pub timestamps: Vec<Timestamp>,
}

/// The on-disk bundle. Submission content handles must be the BLAKE3
/// hashes of entries in `contents`; anything a submission references but
/// the bundle does not carry surfaces as `ContentUnavailable` at
/// evaluation time, holding that submission rather than failing the run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct EvaluationBundle {
    /// Evaluation wall clock; every deadline and window check reads this.
    /// Zero means "evaluate at the current wall clock".
    pub now: Timestamp,
    pub block_height: u64,
    pub tasks: Vec<Task>,
    pub submissions: Vec<Submission>,
    /// Plaintext solution bodies, addressed by their BLAKE3 hash.
    pub contents: Vec<String>,
    pub peer_votes: Vec<BundlePeerVote>,
    pub expert_assessments: Vec<BundleExpertAssessment>,
    pub profiles: Vec<ValidatorProfile>,
    pub completions: Vec<CompletionSample>,
    pub cadence: Vec<CadenceSample>,
}

impl EvaluationBundle {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("reading bundle from {}", path.display()))?;
        serde_json::from_str(&json).context("parsing evaluation bundle JSON")
    }

    /// Replays the bundled history into a timing-history store so the
    /// timing and pattern analyzers see the participants' past behavior.
    pub fn seed_history(&self, history: &dyn TimingHistory) -> Result<(), MeritumError> {
        for sample in &self.completions {
            for &duration in &sample.durations_secs {
                history.record_completion(&sample.participant, &sample.task_kind, duration)?;
            }
        }
        for sample in &self.cadence {
            for &at in &sample.timestamps {
                history.record_submission(&sample.participant, at)?;
            }
        }
        Ok(())
    }
}

// ── Boundary-trait views ─────────────────────────────────────────────────────

/// Read-side boundary implementations backed by a loaded bundle.
pub struct BundleSources {
    tasks: HashMap<TaskId, Task>,
    submissions: Vec<Submission>,
    contents: HashMap<ContentHash, Vec<u8>>,
    peer_votes: HashMap<SubmissionId, Vec<PeerVote>>,
    expert_assessments: HashMap<SubmissionId, Vec<ExpertAssessment>>,
    profiles: BTreeMap<ParticipantId, ValidatorProfile>,
}

impl BundleSources {
    pub fn new(bundle: &EvaluationBundle) -> Self {
        let tasks = bundle
            .tasks
            .iter()
            .map(|t| (t.id.clone(), t.clone()))
            .collect();
        let contents = bundle
            .contents
            .iter()
            .map(|text| (ContentHash::of(text.as_bytes()), text.clone().into_bytes()))
            .collect();

        let mut peer_votes: HashMap<SubmissionId, Vec<PeerVote>> = HashMap::new();
        for entry in &bundle.peer_votes {
            peer_votes
                .entry(entry.submission.clone())
                .or_default()
                .push(entry.vote.clone());
        }
        let mut expert_assessments: HashMap<SubmissionId, Vec<ExpertAssessment>> = HashMap::new();
        for entry in &bundle.expert_assessments {
            expert_assessments
                .entry(entry.submission.clone())
                .or_default()
                .push(entry.assessment.clone());
        }
        let profiles = bundle
            .profiles
            .iter()
            .map(|p| (p.participant.clone(), p.clone()))
            .collect();

        Self {
            tasks,
            submissions: bundle.submissions.clone(),
            contents,
            peer_votes,
            expert_assessments,
            profiles,
        }
    }
}

#[async_trait]
impl TaskSource for BundleSources {
    async fn task(&self, id: &TaskId) -> Result<Task, MeritumError> {
        self.tasks
            .get(id)
            .cloned()
            .ok_or_else(|| MeritumError::TaskNotFound(id.to_hex()))
    }
}

#[async_trait]
impl SubmissionSource for BundleSources {
    async fn submissions(&self, task: &TaskId) -> Result<Vec<Submission>, MeritumError> {
        Ok(self
            .submissions
            .iter()
            .filter(|s| &s.task == task)
            .cloned()
            .collect())
    }

    async fn content(&self, handle: &ContentHash) -> Result<Vec<u8>, MeritumError> {
        self.contents
            .get(handle)
            .cloned()
            .ok_or_else(|| MeritumError::ContentUnavailable(handle.to_hex()))
    }
}

#[async_trait]
impl ValidationSource for BundleSources {
    async fn peer_votes(&self, submission: &SubmissionId) -> Result<Vec<PeerVote>, MeritumError> {
        Ok(self.peer_votes.get(submission).cloned().unwrap_or_default())
    }

    async fn expert_assessments(
        &self,
        submission: &SubmissionId,
    ) -> Result<Vec<ExpertAssessment>, MeritumError> {
        Ok(self
            .expert_assessments
            .get(submission)
            .cloned()
            .unwrap_or_default())
    }

    async fn validator_profiles(
        &self,
    ) -> Result<BTreeMap<ParticipantId, ValidatorProfile>, MeritumError> {
        Ok(self.profiles.clone())
    }
}

/// Write-side sinks for an offline run: transitions and settlements are
/// logged and retained for the caller to print. A deployed node would
/// persist and broadcast here instead.
#[derive(Default)]
pub struct RecordingSinks {
    pub transitions: Mutex<Vec<(TaskId, StatusTransition)>>,
    pub settlements: Mutex<Vec<RewardDistribution>>,
}

#[async_trait]
impl StatusSink for RecordingSinks {
    async fn record_transition(
        &self,
        task: &TaskId,
        transition: &StatusTransition,
    ) -> Result<(), MeritumError> {
        info!(task = %task.to_hex(), to = %transition.to, "status transition");
        self.transitions
            .lock()
            .map_err(|e| MeritumError::Storage(e.to_string()))?
            .push((task.clone(), transition.clone()));
        Ok(())
    }
}

#[async_trait]
impl SettlementSink for RecordingSinks {
    async fn settle(
        &self,
        distribution: &RewardDistribution,
        deltas: &[ReputationDelta],
    ) -> Result<(), MeritumError> {
        info!(
            task = %distribution.task.to_hex(),
            entries = distribution.entries.len(),
            fee = %distribution.network_fee,
            reputation_deltas = deltas.len(),
            "settlement received"
        );
        self.settlements
            .lock()
            .map_err(|e| MeritumError::Storage(e.to_string()))?
            .push(distribution.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meritum_core::submission::WorkProof;
    use meritum_core::task::{DifficultyLevel, TaskKind, TaskStatus, VerificationMethod};
    use meritum_store::MemoryTimingHistory;

    const NOW: Timestamp = 1_700_000_000;

    fn sample_bundle() -> EvaluationBundle {
        let publisher = ParticipantId::from_bytes([1u8; 32]);
        let miner = ParticipantId::from_bytes([2u8; 32]);
        let task = Task {
            id: TaskId::derive(&publisher, NOW, "audit the bridge"),
            publisher,
            title: "audit the bridge".into(),
            kind: TaskKind::SecurityAudit {
                scope: "bridge-contracts".into(),
                standards: vec!["cwe-top-25".into()],
            },
            difficulty: DifficultyLevel::Advanced,
            reward_pool: 5_000_000,
            required_stake: 1_000_000,
            published_at: NOW,
            submission_deadline: NOW + 86_400,
            validation_deadline: NOW + 2 * 86_400,
            quality_threshold: 75,
            verification: VerificationMethod::Automatic,
            status: TaskStatus::UnderValidation,
            status_history: Vec::new(),
        };
        let body = "Reentrancy in withdraw(): state written after the call.";
        let submission = Submission {
            id: SubmissionId::derive(&task.id, &miner, NOW + 7_200),
            task: task.id.clone(),
            participant: miner.clone(),
            submitted_at: NOW + 7_200,
            content: ContentHash::of(body.as_bytes()),
            work_proof: WorkProof {
                claimed_duration_secs: 7_000,
                cpu_time_ms: 40_000,
                memory_peak_kb: 8_192,
                step_chain_root: ContentHash::of(b"steps"),
                nonce_commitment: [9u8; 32],
            },
        };
        EvaluationBundle {
            now: NOW + 90_000,
            block_height: 42,
            tasks: vec![task],
            submissions: vec![submission],
            contents: vec![body.to_string()],
            completions: vec![CompletionSample {
                participant: miner,
                task_kind: "security-audit".into(),
                durations_secs: vec![6_500, 7_100, 6_900],
            }],
            ..Default::default()
        }
    }

    #[test]
    fn bundle_round_trips_through_json() {
        let bundle = sample_bundle();
        let json = serde_json::to_string(&bundle).unwrap();
        let back: EvaluationBundle = serde_json::from_str(&json).unwrap();
        assert_eq!(bundle, back);
    }

    #[tokio::test]
    async fn sources_resolve_submissions_and_content() {
        let bundle = sample_bundle();
        let sources = BundleSources::new(&bundle);
        let task_id = bundle.tasks[0].id.clone();

        let subs = sources.submissions(&task_id).await.unwrap();
        assert_eq!(subs.len(), 1);

        let bytes = sources.content(&subs[0].content).await.unwrap();
        assert_eq!(bytes, bundle.contents[0].as_bytes());

        let other_task = TaskId::from_bytes([0xAB; 32]);
        assert!(sources.submissions(&other_task).await.unwrap().is_empty());
        assert!(matches!(
            sources.task(&other_task).await,
            Err(MeritumError::TaskNotFound(_))
        ));
    }

    #[tokio::test]
    async fn missing_content_is_an_explicit_error() {
        let sources = BundleSources::new(&sample_bundle());
        let absent = ContentHash::of(b"never bundled");
        assert!(matches!(
            sources.content(&absent).await,
            Err(MeritumError::ContentUnavailable(_))
        ));
    }

    #[test]
    fn seed_history_replays_completions_and_cadence() {
        let mut bundle = sample_bundle();
        let miner = bundle.completions[0].participant.clone();
        bundle.cadence = vec![CadenceSample {
            participant: miner.clone(),
            timestamps: vec![NOW, NOW + 3_600, NOW + 7_200],
        }];

        let history = MemoryTimingHistory::new();
        bundle.seed_history(&history).unwrap();

        let durations = history.completions(&miner, "security-audit").unwrap();
        assert_eq!(durations, vec![6_500, 7_100, 6_900]);
        let intervals = history.submission_intervals(&miner).unwrap();
        assert_eq!(intervals, vec![3_600, 3_600]);
    }
}
