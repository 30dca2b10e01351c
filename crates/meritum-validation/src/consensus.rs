//! Stake- and reputation-weighted consensus over gated votes.
//!
//! Each vote carries the weight of the validator behind it. Consensus is
//! reached when the weighted share of votes agreeing with the aggregate
//! score clears the approval threshold; the outcome always reports its
//! agreement and confidence so downstream scoring can discount a weak
//! consensus instead of treating it as settled fact.

use serde::{Deserialize, Serialize};

use meritum_core::constants::CONSENSUS_AGREEMENT_BAND;
use meritum_core::error::MeritumError;
use meritum_core::fraud::clamp01;
use meritum_core::types::{Amount, ParticipantId, Score};

// ── Votes ───────────────────────────────────────────────────────────────────

/// How individual votes are weighted during aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VoteWeighting {
    Stake,
    Reputation,
    /// Equal blend of normalized stake and normalized reputation.
    Blended,
}

/// One gated vote entering aggregation.
#[derive(Debug, Clone, PartialEq)]
pub struct WeightedVote {
    pub validator: ParticipantId,
    pub score: Score,
    pub confidence: f64,
    pub stake: Amount,
    pub reputation: u32,
}

// ── Outcome ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsensusOutcome {
    pub score: Score,
    pub confidence: f64,
    /// Weighted share of votes within the agreement band of the score.
    pub agreement: f64,
    /// Whether agreement cleared the approval threshold.
    pub reached: bool,
    pub participants: Vec<ParticipantId>,
}

/// Aggregates gated votes into a consensus outcome.
///
/// The consensus score is the weighted mean vote. Agreement is the summed
/// weight of votes within [`CONSENSUS_AGREEMENT_BAND`] points of that mean,
/// and confidence scales the weighted mean vote confidence by it. Polarized
/// vote sets whose mean satisfies nobody therefore come out with agreement
/// near zero rather than a false middle-ground consensus.
pub fn weighted_consensus(
    votes: &[WeightedVote],
    weighting: VoteWeighting,
    approval_threshold: f64,
) -> Result<ConsensusOutcome, MeritumError> {
    if votes.is_empty() {
        return Err(MeritumError::NoValidations(
            "consensus requires at least one vote".into(),
        ));
    }

    let weights = vote_weights(votes, weighting);
    let weighted_mean: f64 = votes
        .iter()
        .zip(&weights)
        .map(|(v, w)| v.score as f64 * w)
        .sum();

    let band = CONSENSUS_AGREEMENT_BAND as f64;
    let agreement: f64 = votes
        .iter()
        .zip(&weights)
        .filter(|(v, _)| (v.score as f64 - weighted_mean).abs() <= band)
        .map(|(_, w)| *w)
        .sum();

    let mean_confidence: f64 = votes
        .iter()
        .zip(&weights)
        .map(|(v, w)| v.confidence * w)
        .sum();

    Ok(ConsensusOutcome {
        score: weighted_mean.round().clamp(0.0, 100.0) as Score,
        confidence: clamp01(agreement * mean_confidence),
        agreement,
        reached: agreement >= approval_threshold,
        participants: votes.iter().map(|v| v.validator.clone()).collect(),
    })
}

/// Normalized per-vote weights. An axis that sums to zero falls back to
/// equal weights instead of dividing by zero.
fn vote_weights(votes: &[WeightedVote], weighting: VoteWeighting) -> Vec<f64> {
    let equal = vec![1.0 / votes.len() as f64; votes.len()];
    let normalize = |values: Vec<f64>| -> Option<Vec<f64>> {
        let total: f64 = values.iter().sum();
        if total > 0.0 {
            Some(values.into_iter().map(|v| v / total).collect())
        } else {
            None
        }
    };

    let stake = || normalize(votes.iter().map(|v| v.stake as f64).collect());
    let reputation = || normalize(votes.iter().map(|v| v.reputation as f64).collect());

    match weighting {
        VoteWeighting::Stake => stake().unwrap_or(equal),
        VoteWeighting::Reputation => reputation().unwrap_or(equal),
        VoteWeighting::Blended => match (stake(), reputation()) {
            (Some(s), Some(r)) => s.iter().zip(&r).map(|(a, b)| 0.5 * a + 0.5 * b).collect(),
            (Some(s), None) => s,
            (None, Some(r)) => r,
            (None, None) => equal,
        },
    }
}
