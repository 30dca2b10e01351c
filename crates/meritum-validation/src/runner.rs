//! Validation tier orchestration.
//!
//! The runner takes a task, a submission, and the raw material gathered for
//! it (capability providers, peer votes, expert assessments, validator
//! profiles) and produces the accepted [`ValidationResult`]s for the tier
//! the task was published with. Gate decisions are never silent: every vote
//! or assessment that fails a gate comes back as a [`Refusal`] alongside
//! the accepted results.

use std::collections::BTreeMap;

use futures::future::join_all;
use tracing::{debug, warn};

use meritum_core::error::MeritumError;
use meritum_core::submission::Submission;
use meritum_core::task::{Task, VerificationMethod};
use meritum_core::types::{ParticipantId, Score, Timestamp};
use meritum_core::validation::ValidationResult;

use crate::capability::CapabilityRegistry;
use crate::consensus::{weighted_consensus, VoteWeighting, WeightedVote};
use crate::eligibility::{
    check_expert_eligibility, check_peer_eligibility, ReviewContext, ValidatorProfile,
};

// ── Raw inputs ──────────────────────────────────────────────────────────────

/// A peer's quality vote before gating.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PeerVote {
    pub validator: ParticipantId,
    pub quality_score: Score,
    pub confidence: f64,
    pub reviewed_at: Timestamp,
}

/// An expert's assessment before gating.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ExpertAssessment {
    pub expert: ParticipantId,
    pub overall_score: Score,
    pub innovation: Score,
    pub technical_depth: Score,
    pub practicality: Score,
    pub standards_compliance: Score,
    pub confidence: f64,
}

/// Everything the runner needs besides the task and submission.
pub struct ValidationInputs<'a> {
    pub content: &'a [u8],
    pub peer_votes: &'a [PeerVote],
    pub expert_assessments: &'a [ExpertAssessment],
    pub profiles: &'a BTreeMap<ParticipantId, ValidatorProfile>,
    pub submitter_employer: Option<&'a str>,
    pub task_submitters: &'a [ParticipantId],
    pub now: Timestamp,
}

// ── Output ──────────────────────────────────────────────────────────────────

/// A vote or assessment turned away at a gate, with the exact reason.
#[derive(Debug)]
pub struct Refusal {
    /// Peer or expert address in base58, or the provider tag for
    /// automatic checks.
    pub validator: String,
    pub reason: MeritumError,
}

/// Accepted results plus every refusal produced along the way.
#[derive(Debug, Default)]
pub struct ValidationRun {
    pub results: Vec<ValidationResult>,
    pub refusals: Vec<Refusal>,
}

// ── Runner ──────────────────────────────────────────────────────────────────

pub struct ValidationTierRunner {
    registry: CapabilityRegistry,
    weighting: VoteWeighting,
}

impl ValidationTierRunner {
    pub fn new(registry: CapabilityRegistry) -> Self {
        Self {
            registry,
            weighting: VoteWeighting::Blended,
        }
    }

    pub fn with_weighting(mut self, weighting: VoteWeighting) -> Self {
        self.weighting = weighting;
        self
    }

    /// Runs the validation tier the task was published with.
    ///
    /// Capability dispatch and reviewer minimums fail closed with an error.
    /// Individual provider failures and gate refusals do not: they are
    /// reported in the run so the caller can route the submission onward
    /// with full knowledge of what was turned away.
    pub async fn run(
        &self,
        task: &Task,
        submission: &Submission,
        inputs: &ValidationInputs<'_>,
    ) -> Result<ValidationRun, MeritumError> {
        let mut run = ValidationRun::default();
        match task.verification {
            VerificationMethod::Automatic => {
                self.run_automatic(task, submission, inputs.content, &mut run)
                    .await?;
            }
            VerificationMethod::PeerReview {
                required_reviewers,
                consensus_threshold,
            } => {
                let votes = self.gate_peer_votes(task, submission, inputs, &mut run);
                let accepted = votes.len() as u32;
                if accepted < required_reviewers {
                    return Err(MeritumError::InsufficientReviewers {
                        need: required_reviewers,
                        got: accepted,
                    });
                }
                self.append_consensus(&votes, consensus_threshold, &mut run)?;
            }
            VerificationMethod::ExpertReview { expert_count } => {
                let accepted = self.gate_expert_assessments(task, inputs, &mut run);
                if accepted < expert_count {
                    return Err(MeritumError::InsufficientReviewers {
                        need: expert_count,
                        got: accepted,
                    });
                }
            }
            VerificationMethod::Hybrid { .. } => {
                self.run_automatic(task, submission, inputs.content, &mut run)
                    .await?;
                let votes = self.gate_peer_votes(task, submission, inputs, &mut run);
                // A hybrid tier has no reviewer minimum of its own, but a
                // consensus over fewer than two votes says nothing.
                if votes.len() >= 2 {
                    self.append_consensus(&votes, task.difficulty.approval_threshold(), &mut run)?;
                }
                self.gate_expert_assessments(task, inputs, &mut run);
            }
        }
        Ok(run)
    }

    /// Runs every capable provider concurrently. Dispatch fails closed;
    /// individual provider failures become refusals.
    async fn run_automatic(
        &self,
        task: &Task,
        submission: &Submission,
        content: &[u8],
        run: &mut ValidationRun,
    ) -> Result<(), MeritumError> {
        let providers = self.registry.supporting(task)?;
        let outcomes = join_all(
            providers
                .iter()
                .map(|p| p.assess(task, submission, content)),
        )
        .await;

        for (provider, outcome) in providers.iter().zip(outcomes) {
            match outcome {
                Ok(assessment) => {
                    let result = ValidationResult::Automatic {
                        validator_tag: provider.tag().to_string(),
                        overall_score: assessment.overall_score(),
                        checks: assessment.checks,
                        confidence: assessment.confidence,
                    };
                    match result.validate() {
                        Ok(()) => run.results.push(result),
                        Err(reason) => run.refusals.push(Refusal {
                            validator: provider.tag().to_string(),
                            reason,
                        }),
                    }
                }
                Err(reason) => {
                    warn!(provider = provider.tag(), %reason, "automatic check failed");
                    run.refusals.push(Refusal {
                        validator: provider.tag().to_string(),
                        reason,
                    });
                }
            }
        }
        Ok(())
    }

    /// Gates peer votes, pushing accepted results and returning the
    /// weighted votes for consensus.
    fn gate_peer_votes(
        &self,
        task: &Task,
        submission: &Submission,
        inputs: &ValidationInputs<'_>,
        run: &mut ValidationRun,
    ) -> Vec<WeightedVote> {
        let review = ReviewContext {
            submitter: &submission.participant,
            submitter_employer: inputs.submitter_employer,
            task_submitters: inputs.task_submitters,
        };

        let mut weighted = Vec::new();
        for vote in inputs.peer_votes {
            let profile = match inputs.profiles.get(&vote.validator) {
                Some(p) => p,
                None => {
                    run.refusals.push(Refusal {
                        validator: vote.validator.to_b58(),
                        reason: MeritumError::UnknownParticipant(vote.validator.to_b58()),
                    });
                    continue;
                }
            };
            if let Err(reason) = check_peer_eligibility(task, profile, &review) {
                warn!(validator = %vote.validator.to_b58(), %reason, "peer vote refused");
                run.refusals.push(Refusal {
                    validator: vote.validator.to_b58(),
                    reason,
                });
                continue;
            }

            let result = ValidationResult::PeerReview {
                validator: vote.validator.clone(),
                quality_score: vote.quality_score,
                confidence: vote.confidence,
                reviewed_at: vote.reviewed_at,
            };
            if let Err(reason) = result.validate() {
                run.refusals.push(Refusal {
                    validator: vote.validator.to_b58(),
                    reason,
                });
                continue;
            }

            weighted.push(WeightedVote {
                validator: vote.validator.clone(),
                score: vote.quality_score,
                confidence: vote.confidence,
                stake: profile.stake,
                reputation: profile.reputation,
            });
            run.results.push(result);
        }
        weighted
    }

    /// Gates expert assessments, pushing accepted results and returning the
    /// accepted count.
    fn gate_expert_assessments(
        &self,
        task: &Task,
        inputs: &ValidationInputs<'_>,
        run: &mut ValidationRun,
    ) -> u32 {
        let mut accepted = 0u32;
        for assessment in inputs.expert_assessments {
            let profile = match inputs.profiles.get(&assessment.expert) {
                Some(p) => p,
                None => {
                    run.refusals.push(Refusal {
                        validator: assessment.expert.to_b58(),
                        reason: MeritumError::UnknownParticipant(assessment.expert.to_b58()),
                    });
                    continue;
                }
            };
            if let Err(reason) = check_expert_eligibility(task, profile, inputs.now) {
                warn!(expert = %assessment.expert.to_b58(), %reason, "expert assessment refused");
                run.refusals.push(Refusal {
                    validator: assessment.expert.to_b58(),
                    reason,
                });
                continue;
            }

            let result = ValidationResult::ExpertReview {
                expert: assessment.expert.clone(),
                overall_score: assessment.overall_score,
                innovation: assessment.innovation,
                technical_depth: assessment.technical_depth,
                practicality: assessment.practicality,
                standards_compliance: assessment.standards_compliance,
                confidence: assessment.confidence,
            };
            if let Err(reason) = result.validate() {
                run.refusals.push(Refusal {
                    validator: assessment.expert.to_b58(),
                    reason,
                });
                continue;
            }

            run.results.push(result);
            accepted += 1;
        }
        accepted
    }

    /// Aggregates gated votes and appends the consensus result. A weak
    /// consensus is still appended; its low confidence carries the doubt
    /// downstream.
    fn append_consensus(
        &self,
        votes: &[WeightedVote],
        approval_threshold: f64,
        run: &mut ValidationRun,
    ) -> Result<(), MeritumError> {
        let outcome = weighted_consensus(votes, self.weighting, approval_threshold)?;
        debug!(
            score = outcome.score,
            agreement = outcome.agreement,
            reached = outcome.reached,
            "peer consensus aggregated"
        );
        run.results.push(ValidationResult::Consensus {
            participants: outcome.participants,
            consensus_score: outcome.score,
            consensus_confidence: outcome.confidence,
        });
        Ok(())
    }
}
