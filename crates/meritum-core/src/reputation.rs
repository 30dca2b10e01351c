use crate::constants::{
    ACCURACY_BONUS_MAX, ACCURACY_BONUS_MIN_VALIDATIONS, ACCURACY_BONUS_THRESHOLD, INITIAL_REPUTATION,
    LONGEVITY_BONUS, LONGEVITY_HORIZON_SECS, REPUTATION_DECAY_BP, REPUTATION_DECAY_PERIOD_SECS,
    REPUTATION_FLOOR, REPUTATION_SCALE,
};
use crate::types::{ParticipantId, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ── Events ───────────────────────────────────────────────────────────────────

/// A finalized marketplace event that moves a participant's reputation.
/// Deltas are on the 0–10,000 scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReputationEvent {
    TaskPublished,
    TaskAbandoned,
    SubmissionAccepted,
    SubmissionRejected,
    ValidationCorrect,
    ValidationIncorrect,
}

impl ReputationEvent {
    pub fn delta(self) -> i32 {
        match self {
            ReputationEvent::TaskPublished => 50,
            ReputationEvent::TaskAbandoned => -100,
            ReputationEvent::SubmissionAccepted => 100,
            ReputationEvent::SubmissionRejected => -50,
            ReputationEvent::ValidationCorrect => 30,
            ReputationEvent::ValidationIncorrect => -20,
        }
    }
}

/// One pending reputation adjustment, queued by the pipeline and applied by
/// the reputation store in finalization order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReputationDelta {
    pub participant: ParticipantId,
    pub event: ReputationEvent,
    /// Domain proficiency this event also feeds, if any.
    pub domain: Option<String>,
    pub finalized_at: Timestamp,
}

// ── Sybil risk ───────────────────────────────────────────────────────────────

/// Ladder over effective reputation used by validator eligibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SybilRiskLevel {
    Minimal,
    Low,
    Medium,
    High,
    Critical,
}

pub fn sybil_risk(effective_reputation: u32) -> SybilRiskLevel {
    match effective_reputation {
        r if r < 2_000 => SybilRiskLevel::Critical,
        r if r < 4_000 => SybilRiskLevel::High,
        r if r < 6_000 => SybilRiskLevel::Medium,
        r if r < 8_000 => SybilRiskLevel::Low,
        _ => SybilRiskLevel::Minimal,
    }
}

// ── Record ───────────────────────────────────────────────────────────────────

/// Per-participant reputation state. `overall` is the raw accumulated score;
/// `effective_score` layers decay and bonuses on top at read time so the
/// stored value never needs a background decay job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReputationRecord {
    pub participant: ParticipantId,
    /// Raw score on the 0–10,000 scale.
    pub overall: u32,
    /// Domain tag → proficiency (same scale).
    pub domains: BTreeMap<String, u32>,
    pub validations_total: u64,
    pub validations_correct: u64,
    pub first_active_at: Timestamp,
    pub last_active_at: Timestamp,
}

impl ReputationRecord {
    pub fn new(participant: ParticipantId, at: Timestamp) -> Self {
        Self {
            participant,
            overall: INITIAL_REPUTATION,
            domains: BTreeMap::new(),
            validations_total: 0,
            validations_correct: 0,
            first_active_at: at,
            last_active_at: at,
        }
    }

    /// Fraction of validations judged correct; 0.0 with no history.
    pub fn validation_accuracy(&self) -> f64 {
        if self.validations_total == 0 {
            return 0.0;
        }
        self.validations_correct as f64 / self.validations_total as f64
    }

    /// Apply one finalized event. Saturates into [0, 10_000], tracks
    /// validator accuracy counters and the activity anchor, and feeds the
    /// named domain proficiency at half strength.
    pub fn apply(&mut self, event: ReputationEvent, domain: Option<&str>, at: Timestamp) {
        let delta = event.delta();
        self.overall = add_clamped(self.overall, delta);
        match event {
            ReputationEvent::ValidationCorrect => {
                self.validations_total += 1;
                self.validations_correct += 1;
            }
            ReputationEvent::ValidationIncorrect => {
                self.validations_total += 1;
            }
            _ => {}
        }
        if let Some(d) = domain {
            let entry = self
                .domains
                .entry(d.to_string())
                .or_insert(INITIAL_REPUTATION);
            *entry = add_clamped(*entry, delta / 2);
        }
        if at > self.last_active_at {
            self.last_active_at = at;
        }
    }

    /// Raw score after inactivity decay: 5% of the distance above the floor
    /// per full idle 30-day period.
    pub fn decayed(&self, now: Timestamp) -> u32 {
        let idle = now.saturating_sub(self.last_active_at);
        if idle < REPUTATION_DECAY_PERIOD_SECS || self.overall <= REPUTATION_FLOOR {
            return self.overall;
        }
        let periods = (idle / REPUTATION_DECAY_PERIOD_SECS) as u32;
        let mut above_floor = (self.overall - REPUTATION_FLOOR) as u64;
        for _ in 0..periods.min(64) {
            above_floor = above_floor * (10_000 - REPUTATION_DECAY_BP as u64) / 10_000;
        }
        REPUTATION_FLOOR + above_floor as u32
    }

    /// Decayed score plus the accuracy and longevity bonuses, capped at the
    /// scale maximum. This is the figure eligibility gates and reward
    /// multipliers read.
    pub fn effective_score(&self, now: Timestamp) -> u32 {
        let mut score = self.decayed(now);
        let accuracy = self.validation_accuracy();
        if self.validations_total > ACCURACY_BONUS_MIN_VALIDATIONS
            && accuracy > ACCURACY_BONUS_THRESHOLD
        {
            let over = (accuracy - ACCURACY_BONUS_THRESHOLD) / (1.0 - ACCURACY_BONUS_THRESHOLD);
            score += (over * ACCURACY_BONUS_MAX as f64) as u32;
        }
        if now.saturating_sub(self.first_active_at) > LONGEVITY_HORIZON_SECS {
            score += LONGEVITY_BONUS;
        }
        score.min(REPUTATION_SCALE)
    }

    pub fn domain_proficiency(&self, domain: &str) -> u32 {
        self.domains.get(domain).copied().unwrap_or(0)
    }

    /// Multiplier applied to a validator's reward contribution: 0.5× at zero
    /// reputation, 1.5× at the scale maximum.
    pub fn reward_multiplier(&self, now: Timestamp) -> f64 {
        0.5 + self.effective_score(now) as f64 / REPUTATION_SCALE as f64
    }
}

fn add_clamped(value: u32, delta: i32) -> u32 {
    let next = value as i64 + delta as i64;
    next.clamp(0, REPUTATION_SCALE as i64) as u32
}
