//! Reward settlement.
//!
//! The engine converts a task's fraud-cleared, scored submissions and its
//! validator contributions into a [`RewardDistribution`]. Two terminal
//! shapes exist: a normal settlement across the six pool buckets, or a
//! full pool return to the publisher when nothing survived evaluation.
//! Whatever any bucket leaves unclaimed, and every integer-division
//! remainder, lands in the network fee so the distribution always balances
//! to the pool exactly.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, info};

use meritum_core::constants::{
    PARTICIPATION_FLOOR_SCORE, VALIDATOR_WEIGHT_CONSENSUS, VALIDATOR_WEIGHT_EXPERT,
    VALIDATOR_WEIGHT_PEER, WINNER_RANK_MULTIPLIER_BP,
};
use meritum_core::error::MeritumError;
use meritum_core::reward::{RewardDistribution, RewardEntry, RewardKind};
use meritum_core::score::SubmissionScore;
use meritum_core::task::Task;
use meritum_core::types::{Amount, ParticipantId, Score, SubmissionId, Timestamp};
use meritum_core::validation::ValidationKind;

use crate::structure::RewardConfig;

// Fixed-point scale for converting f64 contribution weights into integer
// proportional-split weights.
const WEIGHT_SCALE: f64 = 1_000_000.0;

// ── Inputs ──────────────────────────────────────────────────────────────────

/// A fraud-cleared, scored submission entering settlement.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ScoredSubmission {
    pub score: SubmissionScore,
    pub submitted_at: Timestamp,
}

/// One validator's claim on the validator bucket.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ValidatorContribution {
    pub validator: ParticipantId,
    pub kind: ValidationKind,
    /// Headline score this validator reported.
    pub quality_score: Score,
    pub confidence: f64,
    /// Promptness inside the validation window, 0.0 to 1.0.
    pub timeliness: f64,
    /// Estimated accuracy of this validator's past verdicts, 0.0 to 1.0.
    pub accuracy: f64,
    /// Reputation reward multiplier, 0.5 to 1.5.
    pub reputation_multiplier: f64,
}

impl ValidatorContribution {
    /// Contribution weight. Automatic checks are infrastructure, not paid
    /// validators, and carry no claim.
    pub fn weight(&self) -> f64 {
        let type_weight = match self.kind {
            ValidationKind::Expert => VALIDATOR_WEIGHT_EXPERT,
            ValidationKind::Peer => VALIDATOR_WEIGHT_PEER,
            ValidationKind::Consensus => VALIDATOR_WEIGHT_CONSENSUS,
            ValidationKind::Automatic => 0.0,
        };
        self.quality_score as f64
            * type_weight
            * self.confidence
            * self.timeliness
            * self.accuracy
            * self.reputation_multiplier
    }
}

// ── Engine ──────────────────────────────────────────────────────────────────

pub struct RewardEngine {
    config: Arc<RewardConfig>,
}

impl RewardEngine {
    pub fn new(config: Arc<RewardConfig>) -> Self {
        Self { config }
    }

    /// Settles one task's pool.
    ///
    /// With no surviving submissions the whole pool returns to the
    /// publisher. Otherwise winners take rank-multiplied shares of the
    /// winner bucket, non-winners split the participant bucket by
    /// score-multiplied per-capita shares (floored so nobody earns zero
    /// weight), validators split their bucket proportionally to
    /// contribution, and the bonus buckets pay their eligible sets.
    pub fn distribute(
        &self,
        task: &Task,
        scored: &[ScoredSubmission],
        validators: &[ValidatorContribution],
        settled_at: Timestamp,
        revision: u32,
    ) -> Result<RewardDistribution, MeritumError> {
        if task.reward_pool == 0 {
            return Err(MeritumError::EmptyRewardPool(task.id.to_hex()));
        }

        if scored.is_empty() {
            info!(task = %task.id.to_hex(), "no valid submissions, pool returns to publisher");
            let dist = RewardDistribution {
                task: task.id.clone(),
                total_pool: task.reward_pool,
                network_fee: 0,
                entries: vec![RewardEntry {
                    recipient: task.publisher.clone(),
                    amount: task.reward_pool,
                    kind: RewardKind::PoolReturn,
                }],
                settled_at,
                revision,
            };
            dist.verify()?;
            return Ok(dist);
        }

        let structure = self
            .config
            .structure_for(task.kind.tag(), task.difficulty);
        structure.validate()?;
        let slices = structure.slice(task.reward_pool);

        let mut entries = Vec::new();
        let mut fee = slices.fee;

        let winners = rank_winners(task, scored, structure.max_winners);
        fee += pay_winners(&winners, slices.winner, &mut entries);

        let winner_ids: HashSet<&SubmissionId> =
            winners.iter().map(|w| &w.score.submission).collect();
        let others: Vec<&ScoredSubmission> = scored
            .iter()
            .filter(|s| !winner_ids.contains(&s.score.submission))
            .collect();
        fee += pay_participants(&others, slices.participant, &mut entries);

        fee += pay_validators(validators, slices.validator, &mut entries);
        fee += pay_quality_bonus(scored, slices.quality_bonus, &mut entries);
        fee += pay_speed_bonus(scored, slices.speed_bonus, &mut entries);

        let dist = RewardDistribution {
            task: task.id.clone(),
            total_pool: task.reward_pool,
            network_fee: fee,
            entries,
            settled_at,
            revision,
        };
        dist.verify()?;
        debug!(
            task = %task.id.to_hex(),
            winners = winners.len(),
            entries = dist.entries.len(),
            fee = %dist.network_fee,
            "task settled"
        );
        Ok(dist)
    }
}

/// Winner-eligible submissions, best first. Ties break toward the earlier
/// submission, then toward higher validator agreement.
fn rank_winners<'a>(
    task: &Task,
    scored: &'a [ScoredSubmission],
    max_winners: u32,
) -> Vec<&'a ScoredSubmission> {
    let mut ranked: Vec<&ScoredSubmission> = scored
        .iter()
        .filter(|s| s.score.winner_eligible(task.quality_threshold))
        .collect();
    ranked.sort_by(|a, b| {
        b.score
            .final_score
            .cmp(&a.score.final_score)
            .then_with(|| a.submitted_at.cmp(&b.submitted_at))
            .then_with(|| {
                b.score
                    .validation_consensus
                    .partial_cmp(&a.score.validation_consensus)
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
    });
    ranked.truncate(max_winners as usize);
    ranked
}

/// Equal base share times the rank multiplier ladder. The margin the
/// ladder leaves unclaimed goes back as fee.
fn pay_winners(
    winners: &[&ScoredSubmission],
    pool: Amount,
    entries: &mut Vec<RewardEntry>,
) -> Amount {
    if winners.is_empty() {
        return pool;
    }
    let base = pool / winners.len() as Amount;
    let mut claimed: Amount = 0;
    for (i, winner) in winners.iter().enumerate() {
        let mult = WINNER_RANK_MULTIPLIER_BP[i.min(WINNER_RANK_MULTIPLIER_BP.len() - 1)];
        let amount = base * mult as Amount / 10_000;
        claimed += amount;
        entries.push(RewardEntry {
            recipient: winner.score.participant.clone(),
            amount,
            kind: RewardKind::Winner {
                rank: i as u32 + 1,
                final_score: winner.score.final_score,
            },
        });
    }
    pool - claimed
}

/// Equal per-capita base share times the submission's score multiplier,
/// floored at [`PARTICIPATION_FLOOR_SCORE`] so a near-zero score still
/// earns a nonzero weight.
fn pay_participants(
    others: &[&ScoredSubmission],
    pool: Amount,
    entries: &mut Vec<RewardEntry>,
) -> Amount {
    if others.is_empty() {
        return pool;
    }
    let base = pool / others.len() as Amount;
    let mut claimed: Amount = 0;
    for submission in others {
        let weight = submission.score.final_score.max(PARTICIPATION_FLOOR_SCORE) as Amount;
        let amount = base * weight / 100;
        claimed += amount;
        entries.push(RewardEntry {
            recipient: submission.score.participant.clone(),
            amount,
            kind: RewardKind::Participation,
        });
    }
    pool - claimed
}

fn pay_validators(
    validators: &[ValidatorContribution],
    pool: Amount,
    entries: &mut Vec<RewardEntry>,
) -> Amount {
    let weights: Vec<u128> = validators
        .iter()
        .map(|v| (v.weight().max(0.0) * WEIGHT_SCALE) as u128)
        .collect();
    let total: u128 = weights.iter().sum();
    if total == 0 {
        return pool;
    }
    let mut claimed: Amount = 0;
    for (validator, weight) in validators.iter().zip(&weights) {
        if *weight == 0 {
            continue;
        }
        let amount = pool * weight / total;
        claimed += amount;
        entries.push(RewardEntry {
            recipient: validator.validator.clone(),
            amount,
            kind: RewardKind::Validation,
        });
    }
    pool - claimed
}

/// Proportional to final score among the eligible, with a perfect score
/// counting double.
fn pay_quality_bonus(
    scored: &[ScoredSubmission],
    pool: Amount,
    entries: &mut Vec<RewardEntry>,
) -> Amount {
    let eligible: Vec<&ScoredSubmission> = scored
        .iter()
        .filter(|s| s.score.quality_bonus_eligible)
        .collect();
    if eligible.is_empty() {
        return pool;
    }
    let weights: Vec<Amount> = eligible
        .iter()
        .map(|s| {
            let w = s.score.final_score as Amount;
            if s.score.final_score == 100 {
                w * 2
            } else {
                w
            }
        })
        .collect();
    let total: Amount = weights.iter().sum();
    let mut claimed: Amount = 0;
    for (submission, weight) in eligible.iter().zip(&weights) {
        let amount = pool * weight / total;
        claimed += amount;
        entries.push(RewardEntry {
            recipient: submission.score.participant.clone(),
            amount,
            kind: RewardKind::QualityBonus,
        });
    }
    pool - claimed
}

/// Equal split among everyone inside the speed percentile.
fn pay_speed_bonus(
    scored: &[ScoredSubmission],
    pool: Amount,
    entries: &mut Vec<RewardEntry>,
) -> Amount {
    let quick: Vec<&ScoredSubmission> = scored
        .iter()
        .filter(|s| s.score.speed_bonus_eligible)
        .collect();
    if quick.is_empty() {
        return pool;
    }
    let each = pool / quick.len() as Amount;
    for submission in &quick {
        entries.push(RewardEntry {
            recipient: submission.score.participant.clone(),
            amount: each,
            kind: RewardKind::SpeedBonus,
        });
    }
    pool - each * quick.len() as Amount
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::structure::{RewardStructure, RewardStructureEntry};
    use meritum_core::task::{DifficultyLevel, TaskKind, TaskStatus, VerificationMethod};
    use meritum_core::types::TaskId;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    const NOW: Timestamp = 1_700_000_000;

    fn make_task(pool: Amount) -> Task {
        let publisher = ParticipantId::from_bytes([1u8; 32]);
        Task {
            id: TaskId::derive(&publisher, NOW, "settle me"),
            publisher,
            title: "settle me".into(),
            kind: TaskKind::CodeAnalysis {
                language: "rust".into(),
                complexity: 3,
            },
            difficulty: DifficultyLevel::Intermediate,
            reward_pool: pool,
            required_stake: 1_000_000,
            published_at: NOW,
            submission_deadline: NOW + 86_400,
            validation_deadline: NOW + 2 * 86_400,
            quality_threshold: 75,
            verification: VerificationMethod::PeerReview {
                required_reviewers: 3,
                consensus_threshold: 0.7,
            },
            status: TaskStatus::UnderValidation,
            status_history: Vec::new(),
        }
    }

    fn pinned_config(max_winners: u32) -> Arc<RewardConfig> {
        Arc::new(RewardConfig {
            entries: vec![RewardStructureEntry {
                task_kind: "code-analysis".into(),
                difficulty: DifficultyLevel::Intermediate,
                structure: RewardStructure {
                    winner_bp: 4_000,
                    participant_bp: 2_500,
                    validator_bp: 2_000,
                    quality_bonus_bp: 500,
                    speed_bonus_bp: 500,
                    network_fee_bp: 500,
                    max_winners,
                },
            }],
        })
    }

    fn scored(
        seed: u8,
        final_score: Score,
        consensus: f64,
        submitted_at: Timestamp,
        quality_bonus: bool,
        speed_bonus: bool,
    ) -> ScoredSubmission {
        ScoredSubmission {
            score: SubmissionScore {
                submission: SubmissionId::from_bytes([seed; 32]),
                participant: ParticipantId::from_bytes([seed; 32]),
                quality: final_score,
                innovation: 50,
                technical_depth: 50,
                practicality: 50,
                timeliness: 80,
                final_score,
                validation_consensus: consensus,
                quality_bonus_eligible: quality_bonus,
                speed_bonus_eligible: speed_bonus,
            },
            submitted_at,
        }
    }

    fn peer_contribution(seed: u8) -> ValidatorContribution {
        ValidatorContribution {
            validator: ParticipantId::from_bytes([seed; 32]),
            kind: ValidationKind::Peer,
            quality_score: 80,
            confidence: 0.8,
            timeliness: 1.0,
            accuracy: 0.85,
            reputation_multiplier: 1.0,
        }
    }

    fn amount_of(dist: &RewardDistribution, pred: impl Fn(&RewardEntry) -> bool) -> Amount {
        dist.entries
            .iter()
            .filter(|e| pred(e))
            .map(|e| e.amount)
            .sum()
    }

    #[test]
    fn three_submission_settlement_is_exact() {
        let engine = RewardEngine::new(pinned_config(2));
        let task = make_task(10_000_000);
        let scored = vec![
            scored(10, 92, 0.9, NOW + 3_600, true, true),
            scored(11, 78, 0.9, NOW + 7_200, false, false),
            scored(12, 60, 0.9, NOW + 9_000, false, false),
        ];
        let validators = vec![peer_contribution(30)];
        let dist = engine
            .distribute(&task, &scored, &validators, NOW + 86_400, 0)
            .unwrap();

        // Winner bucket 4_000_000, base 2_000_000: rank 1 takes 1.0x, rank
        // 2 takes 0.6x, the 0.4x margin becomes fee.
        assert_eq!(
            amount_of(&dist, |e| matches!(e.kind, RewardKind::Winner { rank: 1, .. })),
            2_000_000
        );
        assert_eq!(
            amount_of(&dist, |e| matches!(e.kind, RewardKind::Winner { rank: 2, .. })),
            1_200_000
        );
        // The 60-scorer alone in the participant bucket: per-capita base
        // 2_500_000 scaled by 0.6.
        assert_eq!(
            amount_of(&dist, |e| e.kind == RewardKind::Participation),
            1_500_000
        );
        // Single validator takes the whole validator bucket.
        assert_eq!(
            amount_of(&dist, |e| e.kind == RewardKind::Validation),
            2_000_000
        );
        assert_eq!(
            amount_of(&dist, |e| e.kind == RewardKind::QualityBonus),
            500_000
        );
        assert_eq!(
            amount_of(&dist, |e| e.kind == RewardKind::SpeedBonus),
            500_000
        );
        // Fee = 500_000 base + 800_000 winner margin + 1_000_000
        // participant margin.
        assert_eq!(dist.network_fee, 2_300_000);
        assert!(dist.verify().is_ok());
    }

    #[test]
    fn no_valid_submissions_returns_the_pool() {
        let engine = RewardEngine::new(pinned_config(2));
        let task = make_task(10_000_000);
        let dist = engine
            .distribute(&task, &[], &[peer_contribution(30)], NOW + 86_400, 0)
            .unwrap();

        assert_eq!(dist.entries.len(), 1);
        assert_eq!(dist.entries[0].recipient, task.publisher);
        assert_eq!(dist.entries[0].amount, 10_000_000);
        assert_eq!(dist.entries[0].kind, RewardKind::PoolReturn);
        assert_eq!(dist.network_fee, 0);
        assert!(dist.verify().is_ok());
    }

    #[test]
    fn empty_pool_is_an_error() {
        let engine = RewardEngine::new(pinned_config(2));
        let task = make_task(0);
        let err = engine
            .distribute(&task, &[], &[], NOW + 86_400, 0)
            .unwrap_err();
        assert!(matches!(err, MeritumError::EmptyRewardPool(_)));
    }

    #[test]
    fn ties_break_by_time_then_consensus() {
        let engine = RewardEngine::new(pinned_config(1));
        let task = make_task(10_000_000);

        // Same score, different times: the earlier submission wins.
        let dist = engine
            .distribute(
                &task,
                &[
                    scored(10, 80, 0.7, NOW + 7_200, false, false),
                    scored(11, 80, 0.7, NOW + 3_600, false, false),
                ],
                &[],
                NOW + 86_400,
                0,
            )
            .unwrap();
        let winner = dist
            .entries
            .iter()
            .find(|e| matches!(e.kind, RewardKind::Winner { .. }))
            .unwrap();
        assert_eq!(winner.recipient, ParticipantId::from_bytes([11u8; 32]));

        // Same score and time: higher validator agreement wins.
        let dist = engine
            .distribute(
                &task,
                &[
                    scored(10, 80, 0.7, NOW + 3_600, false, false),
                    scored(11, 80, 0.9, NOW + 3_600, false, false),
                ],
                &[],
                NOW + 86_400,
                0,
            )
            .unwrap();
        let winner = dist
            .entries
            .iter()
            .find(|e| matches!(e.kind, RewardKind::Winner { .. }))
            .unwrap();
        assert_eq!(winner.recipient, ParticipantId::from_bytes([11u8; 32]));
    }

    #[test]
    fn near_zero_scores_still_earn_a_floor_share() {
        let engine = RewardEngine::new(pinned_config(1));
        let task = make_task(10_000_000);
        let dist = engine
            .distribute(
                &task,
                &[
                    scored(10, 90, 0.9, NOW + 3_600, false, false),
                    scored(11, 0, 0.3, NOW + 7_200, false, false),
                ],
                &[],
                NOW + 86_400,
                0,
            )
            .unwrap();

        let floor_share = amount_of(&dist, |e| {
            e.kind == RewardKind::Participation
                && e.recipient == ParticipantId::from_bytes([11u8; 32])
        });
        // Per-capita base 2_500_000 at the floor weight of 10.
        assert_eq!(floor_share, 250_000);
    }

    #[test]
    fn validator_pool_follows_contribution_weight() {
        let engine = RewardEngine::new(pinned_config(1));
        let task = make_task(10_000_000);

        let expert = ValidatorContribution {
            validator: ParticipantId::from_bytes([30u8; 32]),
            kind: ValidationKind::Expert,
            quality_score: 90,
            confidence: 0.9,
            timeliness: 1.0,
            accuracy: 0.9,
            reputation_multiplier: 1.2,
        };
        let peer = peer_contribution(31);
        let automatic = ValidatorContribution {
            validator: ParticipantId::from_bytes([32u8; 32]),
            kind: ValidationKind::Automatic,
            quality_score: 95,
            confidence: 0.95,
            timeliness: 1.0,
            accuracy: 1.0,
            reputation_multiplier: 1.5,
        };

        let dist = engine
            .distribute(
                &task,
                &[scored(10, 80, 0.9, NOW + 3_600, false, false)],
                &[expert.clone(), peer.clone(), automatic],
                NOW + 86_400,
                0,
            )
            .unwrap();

        let expert_amount = amount_of(&dist, |e| {
            e.kind == RewardKind::Validation
                && e.recipient == ParticipantId::from_bytes([30u8; 32])
        });
        let peer_amount = amount_of(&dist, |e| {
            e.kind == RewardKind::Validation
                && e.recipient == ParticipantId::from_bytes([31u8; 32])
        });
        let automatic_entries = dist
            .entries
            .iter()
            .filter(|e| {
                e.kind == RewardKind::Validation
                    && e.recipient == ParticipantId::from_bytes([32u8; 32])
            })
            .count();

        assert!(expert.weight() > peer.weight());
        assert!(expert_amount > peer_amount * 2);
        assert_eq!(automatic_entries, 0, "automatic checks earn nothing");
        assert!(dist.verify().is_ok());
    }

    #[test]
    fn perfect_score_doubles_the_quality_bonus_weight() {
        let engine = RewardEngine::new(pinned_config(2));
        let task = make_task(10_000_000);
        let dist = engine
            .distribute(
                &task,
                &[
                    scored(10, 100, 0.9, NOW + 3_600, true, false),
                    scored(11, 90, 0.9, NOW + 7_200, true, false),
                ],
                &[],
                NOW + 86_400,
                0,
            )
            .unwrap();

        let perfect = amount_of(&dist, |e| {
            e.kind == RewardKind::QualityBonus
                && e.recipient == ParticipantId::from_bytes([10u8; 32])
        });
        let excellent = amount_of(&dist, |e| {
            e.kind == RewardKind::QualityBonus
                && e.recipient == ParticipantId::from_bytes([11u8; 32])
        });
        assert!(perfect > excellent * 2);
        assert!(dist.verify().is_ok());
    }

    #[test]
    fn conservation_holds_under_randomized_inputs() {
        let engine = RewardEngine::new(Arc::new(RewardConfig::default()));
        let mut rng = StdRng::seed_from_u64(7);

        for round in 0..100 {
            let pool = rng.gen_range(1_000u128..1_000_000_000_000);
            let task = make_task(pool);

            let n = rng.gen_range(1usize..12);
            let scored_set: Vec<ScoredSubmission> = (0..n)
                .map(|i| {
                    scored(
                        i as u8 + 10,
                        rng.gen_range(0u8..=100),
                        rng.gen_range(0.0..=1.0),
                        NOW + rng.gen_range(60i64..86_000),
                        rng.gen_bool(0.3),
                        rng.gen_bool(0.3),
                    )
                })
                .collect();

            let m = rng.gen_range(0usize..6);
            let validators: Vec<ValidatorContribution> = (0..m)
                .map(|i| ValidatorContribution {
                    validator: ParticipantId::from_bytes([i as u8 + 100; 32]),
                    kind: match rng.gen_range(0u8..3) {
                        0 => ValidationKind::Peer,
                        1 => ValidationKind::Expert,
                        _ => ValidationKind::Consensus,
                    },
                    quality_score: rng.gen_range(0u8..=100),
                    confidence: rng.gen_range(0.0..=1.0),
                    timeliness: rng.gen_range(0.0..=1.0),
                    accuracy: rng.gen_range(0.0..=1.0),
                    reputation_multiplier: rng.gen_range(0.5..=1.5),
                })
                .collect();

            let dist = engine
                .distribute(&task, &scored_set, &validators, NOW + 86_400, 0)
                .unwrap();
            assert!(
                dist.verify().is_ok(),
                "round {round}: distribution out of balance"
            );
            assert_eq!(dist.distributed() + dist.network_fee, pool);
        }
    }
}
