//! Composite submission scoring.
//!
//! The engine turns one submission's effective validation records into a
//! [`SubmissionScore`]. It is a pure function of its inputs: no clocks, no
//! stores, no randomness, so re-scoring the same evidence produces
//! bit-identical output.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::debug;

use meritum_core::constants::{CONSENSUS_AGREEMENT_BAND, INITIAL_REPUTATION, REPUTATION_SCALE};
use meritum_core::error::MeritumError;
use meritum_core::score::SubmissionScore;
use meritum_core::submission::Submission;
use meritum_core::task::Task;
use meritum_core::types::{ParticipantId, Score};
use meritum_core::validation::{effective_records, ValidationRecord, ValidationResult};

use crate::weights::ScoringConfig;

// Damping applied when a sub-score has no direct evidence and falls back to
// the composite quality figure.
const INNOVATION_FALLBACK_BP: u32 = 8_000;
const DEPTH_FALLBACK_BP: u32 = 9_000;
const PRACTICALITY_FALLBACK_BP: u32 = 8_500;

pub struct ScoringEngine {
    config: Arc<ScoringConfig>,
}

impl ScoringEngine {
    pub fn new(config: Arc<ScoringConfig>) -> Self {
        Self { config }
    }

    /// Scores one submission from its validation records.
    ///
    /// Superseded records are excluded first; scoring an empty effective set
    /// is an error, never a default score. `reputations` carries each
    /// validator's effective reputation; validators absent from the map are
    /// weighted at the initial midpoint.
    pub fn score(
        &self,
        task: &Task,
        submission: &Submission,
        records: &[ValidationRecord],
        reputations: &BTreeMap<ParticipantId, u32>,
    ) -> Result<SubmissionScore, MeritumError> {
        let effective = effective_records(records);
        let results: Vec<&ValidationResult> = effective.iter().map(|r| &r.result).collect();
        if results.is_empty() {
            return Err(MeritumError::NoValidations(submission.id.to_hex()));
        }

        let weights: Vec<f64> = results
            .iter()
            .map(|r| self.entry_weight(r, reputations))
            .collect();
        let total: f64 = weights.iter().sum();

        let quality = if total > 0.0 {
            let weighted: f64 = results
                .iter()
                .zip(&weights)
                .map(|(r, w)| r.score() as f64 * w)
                .sum();
            (weighted / total).round() as Score
        } else {
            0
        };

        let innovation = weighted_pick(&results, &weights, |r| match r {
            ValidationResult::ExpertReview { innovation, .. } => Some(*innovation),
            _ => None,
        })
        .unwrap_or_else(|| damp(quality, INNOVATION_FALLBACK_BP));

        let technical_depth = weighted_pick(&results, &weights, |r| match r {
            ValidationResult::ExpertReview {
                technical_depth, ..
            } => Some(*technical_depth),
            _ => None,
        })
        .or_else(|| {
            weighted_pick(&results, &weights, |r| match r {
                ValidationResult::Automatic { overall_score, .. } => Some(*overall_score),
                _ => None,
            })
        })
        .unwrap_or_else(|| damp(quality, DEPTH_FALLBACK_BP));

        let practicality = weighted_pick(&results, &weights, |r| match r {
            ValidationResult::ExpertReview { practicality, .. } => Some(*practicality),
            _ => None,
        })
        .or_else(|| {
            weighted_pick(&results, &weights, |r| match r {
                ValidationResult::PeerReview { quality_score, .. } => Some(*quality_score),
                _ => None,
            })
        })
        .unwrap_or_else(|| damp(quality, PRACTICALITY_FALLBACK_BP));

        let timeliness = timeliness_score(task, submission);
        let validation_consensus = agreement(&results, &weights, total, quality);

        let final_score = self
            .config
            .weights_for(task.kind.tag(), task.difficulty)
            .combine(quality, innovation, technical_depth, practicality, timeliness);

        let budget = task.time_budget_secs();
        let elapsed = submission.elapsed_secs(task);
        let speed_bonus_eligible =
            budget > 0 && (elapsed as f64) <= self.config.speed_bonus_fraction * budget as f64;

        debug!(
            submission = %submission.id.to_hex(),
            quality,
            final_score,
            consensus = validation_consensus,
            "submission scored"
        );

        Ok(SubmissionScore {
            submission: submission.id.clone(),
            participant: submission.participant.clone(),
            quality,
            innovation,
            technical_depth,
            practicality,
            timeliness,
            final_score,
            validation_consensus,
            quality_bonus_eligible: final_score >= self.config.quality_bonus_threshold,
            speed_bonus_eligible,
        })
    }

    /// Composite weight of one validation entry: fixed for automatic
    /// checks, reputation-derived for peers, premium reputation-derived for
    /// experts, and the consensus entry's own confidence.
    fn entry_weight(
        &self,
        result: &ValidationResult,
        reputations: &BTreeMap<ParticipantId, u32>,
    ) -> f64 {
        match result {
            ValidationResult::Automatic { .. } => self.config.auto_weight,
            ValidationResult::PeerReview { validator, .. } => {
                reputation_weight(reputations, validator)
            }
            ValidationResult::ExpertReview { expert, .. } => {
                self.config.expert_premium * reputation_weight(reputations, expert)
            }
            ValidationResult::Consensus {
                consensus_confidence,
                ..
            } => *consensus_confidence,
        }
    }
}

/// 0.5x at zero reputation, 1.5x at the scale maximum.
fn reputation_weight(reputations: &BTreeMap<ParticipantId, u32>, validator: &ParticipantId) -> f64 {
    let rep = reputations
        .get(validator)
        .copied()
        .unwrap_or(INITIAL_REPUTATION);
    0.5 + rep.min(REPUTATION_SCALE) as f64 / REPUTATION_SCALE as f64
}

/// Weighted mean over the entries `pick` extracts a score from; `None`
/// when no entry matches.
fn weighted_pick(
    results: &[&ValidationResult],
    weights: &[f64],
    pick: impl Fn(&ValidationResult) -> Option<Score>,
) -> Option<Score> {
    let mut weighted = 0.0;
    let mut total = 0.0;
    for (result, weight) in results.iter().zip(weights) {
        if let Some(score) = pick(result) {
            weighted += score as f64 * weight;
            total += weight;
        }
    }
    if total > 0.0 {
        Some((weighted / total).round() as Score)
    } else {
        None
    }
}

fn damp(score: Score, bp: u32) -> Score {
    (score as u32 * bp / 10_000) as Score
}

/// Full marks at publication, half at the submission deadline, linear
/// in between.
fn timeliness_score(task: &Task, submission: &Submission) -> Score {
    let window = task.time_budget_secs();
    if window <= 0 {
        return 50;
    }
    let elapsed = submission.elapsed_secs(task).clamp(0, window);
    let fraction = elapsed as f64 / window as f64;
    (100.0 - 50.0 * fraction).round() as Score
}

/// Weighted share of entries whose headline score sits within the
/// agreement band of the composite quality figure.
fn agreement(results: &[&ValidationResult], weights: &[f64], total: f64, quality: Score) -> f64 {
    if total <= 0.0 {
        return 0.0;
    }
    let band = CONSENSUS_AGREEMENT_BAND as f64;
    let agreeing: f64 = results
        .iter()
        .zip(weights)
        .filter(|(r, _)| (r.score() as f64 - quality as f64).abs() <= band)
        .map(|(_, w)| *w)
        .sum();
    agreeing / total
}

#[cfg(test)]
mod tests {
    use super::*;
    use meritum_core::submission::WorkProof;
    use meritum_core::task::{
        DifficultyLevel, TaskKind, TaskStatus, VerificationMethod,
    };
    use meritum_core::types::{ContentHash, SubmissionId, TaskId, Timestamp};
    use meritum_core::validation::AutoCheck;

    const NOW: Timestamp = 1_700_000_000;
    const DAY: i64 = 86_400;

    fn make_task(kind: TaskKind) -> Task {
        let publisher = ParticipantId::from_bytes([1u8; 32]);
        Task {
            id: TaskId::derive(&publisher, NOW, "score me"),
            publisher,
            title: "score me".into(),
            kind,
            difficulty: DifficultyLevel::Intermediate,
            reward_pool: 10_000_000,
            required_stake: 1_000_000,
            published_at: NOW,
            submission_deadline: NOW + DAY,
            validation_deadline: NOW + 2 * DAY,
            quality_threshold: 75,
            verification: VerificationMethod::PeerReview {
                required_reviewers: 3,
                consensus_threshold: 0.7,
            },
            status: TaskStatus::UnderValidation,
            status_history: Vec::new(),
        }
    }

    fn code_task() -> Task {
        make_task(TaskKind::CodeAnalysis {
            language: "rust".into(),
            complexity: 3,
        })
    }

    fn make_submission(task: &Task, submitted_at: Timestamp) -> Submission {
        let participant = ParticipantId::from_bytes([2u8; 32]);
        Submission {
            id: SubmissionId::derive(&task.id, &participant, submitted_at),
            task: task.id.clone(),
            participant,
            submitted_at,
            content: ContentHash::of(b"the answer"),
            work_proof: WorkProof {
                claimed_duration_secs: 3_600,
                cpu_time_ms: 3_600_000,
                memory_peak_kb: 8_192,
                step_chain_root: ContentHash::of(b"steps"),
                nonce_commitment: [0u8; 32],
            },
        }
    }

    fn record(seq: u64, result: ValidationResult) -> ValidationRecord {
        ValidationRecord {
            seq,
            submission: SubmissionId::from_bytes([9u8; 32]),
            result,
            recorded_at: NOW + 2 * 3_600,
            supersedes: None,
        }
    }

    fn auto(score: Score) -> ValidationResult {
        ValidationResult::Automatic {
            validator_tag: "syntax-check".into(),
            overall_score: score,
            checks: vec![AutoCheck {
                name: "parse".into(),
                score,
                detail: String::new(),
            }],
            confidence: 0.95,
        }
    }

    fn peer(seed: u8, score: Score) -> ValidationResult {
        ValidationResult::PeerReview {
            validator: ParticipantId::from_bytes([seed; 32]),
            quality_score: score,
            confidence: 0.9,
            reviewed_at: NOW + 3 * 3_600,
        }
    }

    fn expert(seed: u8, overall: Score, innovation: Score, depth: Score, practicality: Score) -> ValidationResult {
        ValidationResult::ExpertReview {
            expert: ParticipantId::from_bytes([seed; 32]),
            overall_score: overall,
            innovation,
            technical_depth: depth,
            practicality,
            standards_compliance: overall,
            confidence: 0.9,
        }
    }

    fn engine() -> ScoringEngine {
        ScoringEngine::new(Arc::new(ScoringConfig::default()))
    }

    fn midpoint_reputations(seeds: &[u8]) -> BTreeMap<ParticipantId, u32> {
        seeds
            .iter()
            .map(|s| (ParticipantId::from_bytes([*s; 32]), 5_000u32))
            .collect()
    }

    #[test]
    fn zero_validations_is_an_error() {
        let task = code_task();
        let submission = make_submission(&task, NOW + 3_600);
        let err = engine()
            .score(&task, &submission, &[], &BTreeMap::new())
            .unwrap_err();
        assert!(matches!(err, MeritumError::NoValidations(_)));
    }

    #[test]
    fn composite_quality_weights_validation_kinds() {
        let task = code_task();
        let submission = make_submission(&task, NOW + 3_600);
        let records = vec![
            record(1, auto(80)),
            record(2, peer(10, 70)),
            record(3, expert(20, 90, 85, 95, 75)),
        ];
        let reputations = midpoint_reputations(&[10, 20]);
        let score = engine()
            .score(&task, &submission, &records, &reputations)
            .unwrap();

        // auto 80 at weight 1.0, peer 70 at 1.0, expert 90 at 1.5.
        assert_eq!(score.quality, 81);
        // Expert axes feed the sub-scores directly.
        assert_eq!(score.innovation, 85);
        assert_eq!(score.technical_depth, 95);
        assert_eq!(score.practicality, 75);
    }

    #[test]
    fn consensus_entry_is_weighted_by_its_own_confidence() {
        let task = code_task();
        let submission = make_submission(&task, NOW + 3_600);
        let records = vec![
            record(1, peer(10, 80)),
            record(
                2,
                ValidationResult::Consensus {
                    participants: vec![ParticipantId::from_bytes([10u8; 32])],
                    consensus_score: 60,
                    consensus_confidence: 0.5,
                },
            ),
        ];
        let reputations = midpoint_reputations(&[10]);
        let score = engine()
            .score(&task, &submission, &records, &reputations)
            .unwrap();
        // (80 * 1.0 + 60 * 0.5) / 1.5 = 73.33
        assert_eq!(score.quality, 73);
    }

    #[test]
    fn sub_scores_fall_back_without_expert_evidence() {
        let task = code_task();
        let submission = make_submission(&task, NOW + 3_600);
        let records = vec![record(1, auto(80)), record(2, peer(10, 70))];
        let reputations = midpoint_reputations(&[10]);
        let score = engine()
            .score(&task, &submission, &records, &reputations)
            .unwrap();

        assert_eq!(score.quality, 75);
        // No expert innovation evidence: damped composite.
        assert_eq!(score.innovation, 60);
        // Depth falls back to the automatic overall, practicality to the
        // peer vote.
        assert_eq!(score.technical_depth, 80);
        assert_eq!(score.practicality, 70);
    }

    #[test]
    fn higher_reputation_peers_pull_the_composite() {
        let task = code_task();
        let submission = make_submission(&task, NOW + 3_600);
        let records = vec![record(1, peer(10, 90)), record(2, peer(11, 50))];

        let mut reputations = midpoint_reputations(&[10, 11]);
        let balanced = engine()
            .score(&task, &submission, &records, &reputations)
            .unwrap();
        assert_eq!(balanced.quality, 70);

        reputations.insert(ParticipantId::from_bytes([10u8; 32]), 10_000);
        reputations.insert(ParticipantId::from_bytes([11u8; 32]), 0);
        let skewed = engine()
            .score(&task, &submission, &records, &reputations)
            .unwrap();
        // (90 * 1.5 + 50 * 0.5) / 2.0 = 80
        assert_eq!(skewed.quality, 80);
    }

    #[test]
    fn timeliness_tracks_deadline_proximity() {
        let task = code_task();
        let reputations = midpoint_reputations(&[10]);
        let engine = engine();

        let prompt = make_submission(&task, NOW);
        let score = engine
            .score(&task, &prompt, &[record(1, peer(10, 80))], &reputations)
            .unwrap();
        assert_eq!(score.timeliness, 100);

        let midway = make_submission(&task, NOW + DAY / 2);
        let score = engine
            .score(&task, &midway, &[record(1, peer(10, 80))], &reputations)
            .unwrap();
        assert_eq!(score.timeliness, 75);

        let last_minute = make_submission(&task, NOW + DAY);
        let score = engine
            .score(&task, &last_minute, &[record(1, peer(10, 80))], &reputations)
            .unwrap();
        assert_eq!(score.timeliness, 50);
    }

    #[test]
    fn final_score_follows_the_task_kind_table() {
        let reputations = midpoint_reputations(&[20]);
        let engine = engine();
        // Deep, fast, but impractical work.
        let records = vec![record(1, expert(20, 80, 80, 98, 55))];

        let audit = make_task(TaskKind::SecurityAudit {
            scope: "bridge".into(),
            standards: vec!["cwe-top-25".into()],
        });
        let audit_sub = make_submission(&audit, NOW + 3_600);
        let audit_score = engine
            .score(&audit, &audit_sub, &records, &reputations)
            .unwrap();

        let optimization = make_task(TaskKind::AlgorithmOptimization {
            target: "matrix-mult".into(),
            baseline_metric: 1.0,
        });
        let opt_sub = make_submission(&optimization, NOW + 3_600);
        let opt_score = engine
            .score(&optimization, &opt_sub, &records, &reputations)
            .unwrap();

        // Same evidence, same sub-scores, different weighting.
        assert_eq!(audit_score.quality, opt_score.quality);
        assert!(opt_score.final_score > audit_score.final_score);
    }

    #[test]
    fn superseded_records_are_excluded() {
        let task = code_task();
        let submission = make_submission(&task, NOW + 3_600);
        let reputations = midpoint_reputations(&[10]);

        let mut revised = record(2, peer(10, 90));
        revised.supersedes = Some(1);
        let records = vec![record(1, peer(10, 40)), revised];

        let score = engine()
            .score(&task, &submission, &records, &reputations)
            .unwrap();
        assert_eq!(score.quality, 90);
    }

    #[test]
    fn bonus_eligibility_flags() {
        let task = code_task();
        let reputations = midpoint_reputations(&[20]);
        let engine = engine();

        // Early, excellent submission: both bonuses.
        let early = make_submission(&task, NOW + 3_600);
        let score = engine
            .score(
                &task,
                &early,
                &[record(1, expert(20, 98, 96, 98, 97))],
                &reputations,
            )
            .unwrap();
        assert!(score.quality_bonus_eligible);
        assert!(score.speed_bonus_eligible);

        // Late, mediocre submission: neither.
        let late = make_submission(&task, NOW + DAY - 60);
        let score = engine
            .score(
                &task,
                &late,
                &[record(1, expert(20, 70, 70, 70, 70))],
                &reputations,
            )
            .unwrap();
        assert!(!score.quality_bonus_eligible);
        assert!(!score.speed_bonus_eligible);
    }

    #[test]
    fn rescoring_is_bit_identical() {
        let task = code_task();
        let submission = make_submission(&task, NOW + 3_600);
        let records = vec![
            record(1, auto(80)),
            record(2, peer(10, 70)),
            record(3, expert(20, 90, 85, 95, 75)),
        ];
        let reputations = midpoint_reputations(&[10, 20]);
        let engine = engine();

        let first = engine
            .score(&task, &submission, &records, &reputations)
            .unwrap();
        let second = engine
            .score(&task, &submission, &records, &reputations)
            .unwrap();
        assert_eq!(first, second);
        assert!(first.validation_consensus.to_bits() == second.validation_consensus.to_bits());
    }
}
