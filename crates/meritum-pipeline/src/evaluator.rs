//! Per-task evaluation orchestration.
//!
//! One task at a time: enumerate its submissions in arrival order, run
//! each through fraud screening, the validation tiers and scoring, then
//! settle the pool over everything that survived. Rejected submissions
//! are excluded before scoring; a submission held for manual review or
//! escalated validation parks the whole task in an awaiting state, since
//! winner ranking needs the complete competitive set. Finalization is a
//! one-way gate through the settlement tree in [`EvalDb`].

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use meritum_core::constants::{CONSENSUS_AGREEMENT_BAND, NEUTRAL_VALIDATION_ACCURACY};
use meritum_core::error::MeritumError;
use meritum_core::fraud::{clamp01, FraudIndicator, Recommendation, ReviewPriority};
use meritum_core::network::{NearbySubmission, NetworkSnapshot};
use meritum_core::reputation::{ReputationDelta, ReputationEvent};
use meritum_core::reward::RewardDistribution;
use meritum_core::submission::Submission;
use meritum_core::task::{StatusTrigger, Task, TaskStatus};
use meritum_core::types::{ParticipantId, SubmissionId, TaskId, Timestamp};
use meritum_core::validation::{ValidationKind, ValidationRecord, ValidationResult};
use meritum_fraud::FraudEngine;
use meritum_rewards::{RewardEngine, ScoredSubmission, ValidatorContribution};
use meritum_scoring::ScoringEngine;
use meritum_store::{EvalDb, ReputationStore};
use meritum_validation::{ValidationInputs, ValidationTierRunner, ValidatorProfile};

use crate::traits::{
    SettlementSink, StatusSink, SubmissionSource, TaskSource, ValidationSource,
};

/// Cap on wall-clock spent evaluating a single submission. The effective
/// budget is the smaller of this and the time left to the validation
/// deadline.
const DEFAULT_SUBMISSION_BUDGET: Duration = Duration::from_secs(300);

// ── Outcomes ────────────────────────────────────────────────────────────────

/// Why a submission was parked instead of settled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum HoldReason {
    ManualReview {
        priority: ReviewPriority,
        required_reviewers: u32,
    },
    EnhancedValidation {
        extra_validators: u32,
        extended_window_secs: i64,
    },
    StageTimeout {
        budget_secs: u64,
    },
    ValidationIncomplete {
        detail: String,
    },
    ContentUnavailable {
        detail: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeldSubmission {
    pub submission: SubmissionId,
    pub reason: HoldReason,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RejectedSubmission {
    pub submission: SubmissionId,
    pub participant: ParticipantId,
    pub indicators: Vec<FraudIndicator>,
}

/// What the caller gets back. Never a bare failure: a settled
/// distribution, an explicit awaiting state with the reasons, or the
/// observation that the task was withdrawn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EvaluationOutcome {
    Settled {
        distribution: RewardDistribution,
        rejected: Vec<RejectedSubmission>,
    },
    AwaitingValidation {
        holds: Vec<HeldSubmission>,
    },
    Cancelled,
}

/// The boundary implementations one evaluation run reads and writes
/// through.
pub struct EvaluationSources<'a> {
    pub tasks: &'a dyn TaskSource,
    pub submissions: &'a dyn SubmissionSource,
    pub votes: &'a dyn ValidationSource,
    pub status: &'a dyn StatusSink,
    pub settlement: &'a dyn SettlementSink,
}

enum Verdict {
    Scored {
        score: ScoredSubmission,
        contributions: Vec<ValidatorContribution>,
    },
    Rejected {
        indicators: Vec<FraudIndicator>,
    },
    Held {
        reason: HoldReason,
    },
}

// ── Evaluator ───────────────────────────────────────────────────────────────

pub struct TaskEvaluator {
    fraud: FraudEngine,
    runner: ValidationTierRunner,
    scoring: ScoringEngine,
    rewards: RewardEngine,
    reputation: Arc<dyn ReputationStore>,
    db: Arc<EvalDb>,
    budget_cap: Duration,
}

impl TaskEvaluator {
    pub fn new(
        fraud: FraudEngine,
        runner: ValidationTierRunner,
        scoring: ScoringEngine,
        rewards: RewardEngine,
        reputation: Arc<dyn ReputationStore>,
        db: Arc<EvalDb>,
    ) -> Self {
        Self {
            fraud,
            runner,
            scoring,
            rewards,
            reputation,
            db,
            budget_cap: DEFAULT_SUBMISSION_BUDGET,
        }
    }

    pub fn with_budget_cap(mut self, cap: Duration) -> Self {
        self.budget_cap = cap;
        self
    }

    /// Evaluates and, when nothing blocks it, settles one task.
    ///
    /// `revision` is 0 for a first settlement; a dispute re-run passes the
    /// superseding revision. A task already finalized at or above the
    /// requested revision is refused up front, so late work can never
    /// mutate a settled distribution.
    pub async fn evaluate(
        &self,
        task_id: &TaskId,
        sources: &EvaluationSources<'_>,
        context: &NetworkSnapshot,
        mut cancel: watch::Receiver<bool>,
        revision: u32,
    ) -> Result<EvaluationOutcome, MeritumError> {
        if let Some(existing) = self.db.settlement(task_id)? {
            if revision <= existing.revision {
                return Err(MeritumError::AlreadyFinalized(task_id.to_hex()));
            }
        }

        let task = sources.tasks.task(task_id).await?;
        match task.status {
            TaskStatus::UnderValidation => {}
            TaskStatus::Cancelled | TaskStatus::Disputed => {
                info!(task = %task_id.to_hex(), status = %task.status, "task withdrawn from evaluation");
                return Ok(EvaluationOutcome::Cancelled);
            }
            other => return Err(MeritumError::TaskNotEvaluable(other.to_string())),
        }

        let mut submissions = sources.submissions.submissions(task_id).await?;
        submissions.sort_by(|a, b| {
            a.submitted_at
                .cmp(&b.submitted_at)
                .then_with(|| a.id.cmp(&b.id))
        });

        let snapshot = task_snapshot(context, &submissions);
        let task_submitters: Vec<ParticipantId> =
            submissions.iter().map(|s| s.participant.clone()).collect();
        let profiles = sources.votes.validator_profiles().await?;
        let budget = self.submission_budget(&task, snapshot.now);

        let mut scored: Vec<ScoredSubmission> = Vec::new();
        let mut contributions: Vec<ValidatorContribution> = Vec::new();
        let mut rejected: Vec<RejectedSubmission> = Vec::new();
        let mut holds: Vec<HeldSubmission> = Vec::new();
        let mut deltas: Vec<ReputationDelta> = Vec::new();
        let mut seq: u64 = 0;

        for submission in &submissions {
            if *cancel.borrow() {
                info!(task = %task.id.to_hex(), "evaluation cancelled");
                return Ok(EvaluationOutcome::Cancelled);
            }

            let work = self.evaluate_submission(
                &task,
                submission,
                &snapshot,
                sources,
                &profiles,
                &task_submitters,
                &mut seq,
            );
            let verdict = tokio::select! {
                () = wait_cancelled(&mut cancel) => {
                    info!(task = %task.id.to_hex(), "evaluation cancelled mid-run");
                    return Ok(EvaluationOutcome::Cancelled);
                }
                outcome = timeout(budget, work) => match outcome {
                    Ok(result) => result?,
                    Err(_) => {
                        let err = MeritumError::EvaluationTimeout(submission.id.to_hex());
                        warn!(%err, budget_secs = budget.as_secs(), "holding submission for manual review");
                        Verdict::Held {
                            reason: HoldReason::StageTimeout {
                                budget_secs: budget.as_secs(),
                            },
                        }
                    }
                }
            };

            match verdict {
                Verdict::Scored {
                    score,
                    contributions: claimed,
                } => {
                    if score.score.winner_eligible(task.quality_threshold) {
                        deltas.push(delta(
                            score.score.participant.clone(),
                            ReputationEvent::SubmissionAccepted,
                            &task,
                            snapshot.now,
                        ));
                    }
                    let quality = score.score.quality;
                    for contribution in &claimed {
                        let miss = (i16::from(contribution.quality_score)
                            - i16::from(quality))
                        .unsigned_abs();
                        let event = if miss <= u16::from(CONSENSUS_AGREEMENT_BAND) {
                            ReputationEvent::ValidationCorrect
                        } else {
                            ReputationEvent::ValidationIncorrect
                        };
                        deltas.push(delta(
                            contribution.validator.clone(),
                            event,
                            &task,
                            snapshot.now,
                        ));
                    }
                    contributions.extend(claimed);
                    scored.push(score);
                }
                Verdict::Rejected { indicators } => {
                    deltas.push(delta(
                        submission.participant.clone(),
                        ReputationEvent::SubmissionRejected,
                        &task,
                        snapshot.now,
                    ));
                    rejected.push(RejectedSubmission {
                        submission: submission.id.clone(),
                        participant: submission.participant.clone(),
                        indicators,
                    });
                }
                Verdict::Held { reason } => holds.push(HeldSubmission {
                    submission: submission.id.clone(),
                    reason,
                }),
            }
        }

        if !holds.is_empty() {
            info!(
                task = %task.id.to_hex(),
                held = holds.len(),
                "settlement awaits further validation"
            );
            return Ok(EvaluationOutcome::AwaitingValidation { holds });
        }

        let distribution = self
            .rewards
            .distribute(&task, &scored, &contributions, snapshot.now, revision)?;
        self.db.record_settlement(&distribution)?;

        // Deltas apply in finalization order: submitters as their verdicts
        // landed, then the validators who judged them.
        for entry in &deltas {
            if let Err(err) = self.reputation.apply(entry) {
                warn!(participant = %entry.participant.to_b58(), %err, "reputation delta not applied");
            }
        }

        let mut settled = task.clone();
        match settled.transition(
            TaskStatus::Completed,
            snapshot.now,
            StatusTrigger::ValidationComplete,
        ) {
            Ok(()) => {
                if let Some(transition) = settled.status_history.last() {
                    if let Err(err) = sources.status.record_transition(&task.id, transition).await
                    {
                        warn!(%err, "status transition not recorded");
                    }
                }
            }
            Err(err) => warn!(%err, "completion transition refused"),
        }

        if let Err(err) = sources.settlement.settle(&distribution, &deltas).await {
            warn!(%err, "settlement sink failed; distribution remains recorded");
        }

        info!(
            task = %task.id.to_hex(),
            entries = distribution.entries.len(),
            rejected = rejected.len(),
            fee = %distribution.network_fee,
            "task settled"
        );
        Ok(EvaluationOutcome::Settled {
            distribution,
            rejected,
        })
    }

    /// Fraud gate, validation tiers and scoring for one submission.
    /// Recoverable conditions come back as verdicts; infrastructure
    /// failures propagate.
    #[allow(clippy::too_many_arguments)]
    async fn evaluate_submission(
        &self,
        task: &Task,
        submission: &Submission,
        snapshot: &NetworkSnapshot,
        sources: &EvaluationSources<'_>,
        profiles: &BTreeMap<ParticipantId, ValidatorProfile>,
        task_submitters: &[ParticipantId],
        seq: &mut u64,
    ) -> Result<Verdict, MeritumError> {
        let content = match sources.submissions.content(&submission.content).await {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!(submission = %submission.id.to_hex(), %err, "content fetch failed");
                return Ok(Verdict::Held {
                    reason: HoldReason::ContentUnavailable {
                        detail: err.to_string(),
                    },
                });
            }
        };

        let analysis = self.fraud.analyze(task, submission, &content, snapshot).await?;
        match analysis.recommendation {
            Recommendation::Reject => {
                info!(
                    submission = %submission.id.to_hex(),
                    risk = analysis.overall_risk,
                    "submission rejected by fraud screening"
                );
                return Ok(Verdict::Rejected {
                    indicators: analysis.indicators,
                });
            }
            Recommendation::FlagForManualReview {
                priority,
                required_reviewers,
            } => {
                return Ok(Verdict::Held {
                    reason: HoldReason::ManualReview {
                        priority,
                        required_reviewers,
                    },
                });
            }
            Recommendation::EnhancedValidation {
                extra_validators,
                extended_window_secs,
            } => {
                return Ok(Verdict::Held {
                    reason: HoldReason::EnhancedValidation {
                        extra_validators,
                        extended_window_secs,
                    },
                });
            }
            Recommendation::Monitor {
                window_secs,
                alert_threshold,
            } => {
                warn!(
                    submission = %submission.id.to_hex(),
                    window_secs,
                    alert_threshold,
                    "submission proceeds under monitoring"
                );
            }
            Recommendation::Proceed { .. } => {}
        }

        let peer_votes = sources.votes.peer_votes(&submission.id).await?;
        let expert_assessments = sources.votes.expert_assessments(&submission.id).await?;
        let inputs = ValidationInputs {
            content: &content,
            peer_votes: &peer_votes,
            expert_assessments: &expert_assessments,
            profiles,
            submitter_employer: profiles
                .get(&submission.participant)
                .and_then(|p| p.employer.as_deref()),
            task_submitters,
            now: snapshot.now,
        };

        let run = match self.runner.run(task, submission, &inputs).await {
            Ok(run) => run,
            Err(err) if awaits_more_validation(&err) => {
                return Ok(Verdict::Held {
                    reason: HoldReason::ValidationIncomplete {
                        detail: err.to_string(),
                    },
                });
            }
            Err(err) => return Err(err),
        };
        for refusal in &run.refusals {
            debug!(validator = %refusal.validator, reason = %refusal.reason, "vote refused");
        }

        let records: Vec<ValidationRecord> = run
            .results
            .into_iter()
            .map(|result| {
                *seq += 1;
                ValidationRecord {
                    seq: *seq,
                    submission: submission.id.clone(),
                    result,
                    recorded_at: snapshot.now,
                    supersedes: None,
                }
            })
            .collect();

        let reputations = self.reputation_snapshot(&records, snapshot.now);
        let score = match self.scoring.score(task, submission, &records, &reputations) {
            Ok(score) => score,
            Err(MeritumError::NoValidations(_)) => {
                return Ok(Verdict::Held {
                    reason: HoldReason::ValidationIncomplete {
                        detail: "no validations produced".into(),
                    },
                });
            }
            Err(err) => return Err(err),
        };

        let contributions = self.contributions(task, &records, snapshot.now);
        Ok(Verdict::Scored {
            score: ScoredSubmission {
                score,
                submitted_at: submission.submitted_at,
            },
            contributions,
        })
    }

    fn submission_budget(&self, task: &Task, now: Timestamp) -> Duration {
        let remaining = (task.validation_deadline - now).max(1) as u64;
        Duration::from_secs(remaining).min(self.budget_cap)
    }

    /// Effective reputation per validator named in the records, for the
    /// scoring weights. Missing participants fall back to the engine's
    /// initial-reputation default.
    fn reputation_snapshot(
        &self,
        records: &[ValidationRecord],
        now: Timestamp,
    ) -> BTreeMap<ParticipantId, u32> {
        let mut snapshot = BTreeMap::new();
        for validator in validators_of(records) {
            match self.reputation.get(&validator) {
                Ok(Some(record)) => {
                    snapshot.insert(validator, record.effective_score(now));
                }
                Ok(None) => {}
                Err(err) => {
                    warn!(validator = %validator.to_b58(), %err, "reputation read failed");
                }
            }
        }
        snapshot
    }

    /// Converts the effective validation records into reward-bucket
    /// claims. A validator is credited once per submission: a consensus
    /// echo of an already-credited peer vote does not pay twice.
    fn contributions(
        &self,
        task: &Task,
        records: &[ValidationRecord],
        now: Timestamp,
    ) -> Vec<ValidatorContribution> {
        let mut credited: HashSet<ParticipantId> = HashSet::new();
        let mut out = Vec::new();
        for record in records {
            match &record.result {
                ValidationResult::PeerReview {
                    validator,
                    quality_score,
                    confidence,
                    reviewed_at,
                } => {
                    let (accuracy, multiplier) = self.validator_rating(validator, now);
                    credited.insert(validator.clone());
                    out.push(ValidatorContribution {
                        validator: validator.clone(),
                        kind: ValidationKind::Peer,
                        quality_score: *quality_score,
                        confidence: *confidence,
                        timeliness: review_timeliness(task, *reviewed_at),
                        accuracy,
                        reputation_multiplier: multiplier,
                    });
                }
                ValidationResult::ExpertReview {
                    expert,
                    overall_score,
                    confidence,
                    ..
                } => {
                    let (accuracy, multiplier) = self.validator_rating(expert, now);
                    credited.insert(expert.clone());
                    out.push(ValidatorContribution {
                        validator: expert.clone(),
                        kind: ValidationKind::Expert,
                        quality_score: *overall_score,
                        confidence: *confidence,
                        timeliness: 1.0,
                        accuracy,
                        reputation_multiplier: multiplier,
                    });
                }
                ValidationResult::Consensus {
                    participants,
                    consensus_score,
                    consensus_confidence,
                } => {
                    for participant in participants {
                        if credited.contains(participant) {
                            continue;
                        }
                        let (accuracy, multiplier) = self.validator_rating(participant, now);
                        out.push(ValidatorContribution {
                            validator: participant.clone(),
                            kind: ValidationKind::Consensus,
                            quality_score: *consensus_score,
                            confidence: *consensus_confidence,
                            timeliness: 1.0,
                            accuracy,
                            reputation_multiplier: multiplier,
                        });
                    }
                }
                ValidationResult::Automatic { .. } => {}
            }
        }
        out
    }

    fn validator_rating(&self, validator: &ParticipantId, now: Timestamp) -> (f64, f64) {
        match self.reputation.get(validator) {
            Ok(Some(record)) => {
                let accuracy = if record.validations_total == 0 {
                    NEUTRAL_VALIDATION_ACCURACY
                } else {
                    record.validation_accuracy()
                };
                (accuracy, record.reward_multiplier(now))
            }
            Ok(None) => (NEUTRAL_VALIDATION_ACCURACY, 1.0),
            Err(err) => {
                warn!(validator = %validator.to_b58(), %err, "reputation read failed");
                (NEUTRAL_VALIDATION_ACCURACY, 1.0)
            }
        }
    }
}

// ── Helpers ─────────────────────────────────────────────────────────────────

/// Resolves when cancellation is signalled; pends forever once the sender
/// is gone and cancellation can no longer arrive.
async fn wait_cancelled(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow() {
            return;
        }
        if rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// The per-task snapshot: ambient context plus this task's own
/// submissions as the nearby set for collusion analysis.
fn task_snapshot(context: &NetworkSnapshot, submissions: &[Submission]) -> NetworkSnapshot {
    let mut snapshot = context.clone();
    let known: HashSet<SubmissionId> = snapshot
        .nearby_submissions
        .iter()
        .map(|n| n.submission.clone())
        .collect();
    for submission in submissions {
        if known.contains(&submission.id) {
            continue;
        }
        snapshot.nearby_submissions.push(NearbySubmission {
            submission: submission.id.clone(),
            participant: submission.participant.clone(),
            submitted_at: submission.submitted_at,
        });
    }
    snapshot.nearby_submissions.sort_by_key(|n| n.submitted_at);
    snapshot
}

/// Conditions that mean "collect more validator input", as opposed to
/// infrastructure failures.
fn awaits_more_validation(err: &MeritumError) -> bool {
    matches!(
        err,
        MeritumError::InsufficientReviewers { .. }
            | MeritumError::AutoValidationNotSupported { .. }
    )
}

/// Fraction of the validation window still ahead when the review landed.
fn review_timeliness(task: &Task, reviewed_at: Timestamp) -> f64 {
    let window = task.validation_deadline - task.submission_deadline;
    if window <= 0 {
        return 1.0;
    }
    let used = (reviewed_at - task.submission_deadline).max(0);
    clamp01(1.0 - used as f64 / window as f64)
}

fn validators_of(records: &[ValidationRecord]) -> Vec<ParticipantId> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for record in records {
        match &record.result {
            ValidationResult::PeerReview { validator, .. } => {
                if seen.insert(validator.clone()) {
                    out.push(validator.clone());
                }
            }
            ValidationResult::ExpertReview { expert, .. } => {
                if seen.insert(expert.clone()) {
                    out.push(expert.clone());
                }
            }
            ValidationResult::Consensus { participants, .. } => {
                for participant in participants {
                    if seen.insert(participant.clone()) {
                        out.push(participant.clone());
                    }
                }
            }
            ValidationResult::Automatic { .. } => {}
        }
    }
    out
}

fn delta(
    participant: ParticipantId,
    event: ReputationEvent,
    task: &Task,
    at: Timestamp,
) -> ReputationDelta {
    ReputationDelta {
        participant,
        event,
        domain: Some(task.kind.tag().to_string()),
        finalized_at: at,
    }
}
