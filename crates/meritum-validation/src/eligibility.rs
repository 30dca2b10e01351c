//! Validator eligibility gates.
//!
//! Peer reviewers must clear a reputation floor for the task difficulty,
//! match the task domain, carry no conflict of interest with the submitter,
//! and stay inside the validation rate limit. Experts additionally need a
//! current certification relevant to the task and a sufficient track record
//! of accurate validations. Every gate returns the precise refusal so the
//! caller can surface it instead of silently dropping the vote.

use serde::{Deserialize, Serialize};

use meritum_core::constants::{EXPERT_MIN_ACCURACY, MAX_VALIDATIONS_PER_WINDOW};
use meritum_core::error::MeritumError;
use meritum_core::task::Task;
use meritum_core::types::{Amount, ParticipantId, TaskId, Timestamp};

// ── Profile ─────────────────────────────────────────────────────────────────

/// A domain certification held by a validator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Certification {
    pub domain: String,
    pub issued_at: Timestamp,
    pub expires_at: Timestamp,
}

impl Certification {
    pub fn valid_at(&self, now: Timestamp) -> bool {
        self.expires_at > now
    }

    pub fn covers(&self, domain: &str) -> bool {
        self.domain == domain
    }
}

/// Snapshot of a validator's standing, supplied by the surrounding system
/// per evaluation run. Reputation arrives with decay and bonuses already
/// applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidatorProfile {
    pub participant: ParticipantId,
    pub reputation: u32,
    /// Bonded stake, used when consensus weights votes by stake.
    pub stake: Amount,
    /// Domains the validator has demonstrated competence in.
    pub domains: Vec<String>,
    pub certifications: Vec<Certification>,
    /// Share of this validator's past verdicts that matched the final
    /// outcome.
    pub validation_accuracy: f64,
    pub validations_total: u64,
    /// Validations of similar tasks performed inside the current rate
    /// window.
    pub validations_in_window: u32,
    pub employer: Option<String>,
    /// Tasks the validator has declared a financial interest in.
    pub declared_interests: Vec<TaskId>,
}

/// Submission-side facts the conflict-of-interest check needs.
#[derive(Debug, Clone)]
pub struct ReviewContext<'a> {
    pub submitter: &'a ParticipantId,
    pub submitter_employer: Option<&'a str>,
    /// Everyone who submitted to the task under review.
    pub task_submitters: &'a [ParticipantId],
}

// ── Gates ───────────────────────────────────────────────────────────────────

/// Peer review gate for one prospective reviewer.
pub fn check_peer_eligibility(
    task: &Task,
    profile: &ValidatorProfile,
    review: &ReviewContext<'_>,
) -> Result<(), MeritumError> {
    let need = task.difficulty.min_validator_reputation();
    if profile.reputation < need {
        return Err(MeritumError::InsufficientReputation {
            need,
            have: profile.reputation,
        });
    }

    if let Some(required) = task.kind.required_domain() {
        if !profile.domains.iter().any(|d| d == required) {
            return Err(MeritumError::DomainMismatch {
                required: required.to_string(),
            });
        }
    }

    if profile.participant == *review.submitter {
        return Err(MeritumError::ConflictOfInterest(
            "validator is the submitter".into(),
        ));
    }
    if review.task_submitters.contains(&profile.participant) {
        return Err(MeritumError::ConflictOfInterest(
            "validator submitted to the same task".into(),
        ));
    }
    if let (Some(theirs), Some(ours)) = (profile.employer.as_deref(), review.submitter_employer) {
        if theirs == ours {
            return Err(MeritumError::ConflictOfInterest(format!(
                "validator shares employer {theirs} with the submitter"
            )));
        }
    }
    if profile.declared_interests.contains(&task.id) {
        return Err(MeritumError::ConflictOfInterest(
            "validator declared a financial interest in the task".into(),
        ));
    }

    if profile.validations_in_window >= MAX_VALIDATIONS_PER_WINDOW {
        return Err(MeritumError::ValidationRateLimited {
            performed: profile.validations_in_window,
            limit: MAX_VALIDATIONS_PER_WINDOW,
        });
    }

    Ok(())
}

/// Expert review gate. Experts are not subject to the peer reputation floor
/// or rate limit; their bar is certification and demonstrated accuracy.
pub fn check_expert_eligibility(
    task: &Task,
    profile: &ValidatorProfile,
    now: Timestamp,
) -> Result<(), MeritumError> {
    let required_domain = task.kind.required_domain();

    let relevant: Vec<&Certification> = profile
        .certifications
        .iter()
        .filter(|c| required_domain.map_or(true, |d| c.covers(d)))
        .collect();

    // The freshest relevant certification decides between "none" and
    // "expired".
    let best = match relevant.iter().max_by_key(|c| c.expires_at) {
        Some(c) => *c,
        None => {
            return Err(MeritumError::InsufficientExpertise {
                domain: required_domain.unwrap_or("general").to_string(),
            })
        }
    };
    if !best.valid_at(now) {
        return Err(MeritumError::ExpiredCertification {
            expired_at: best.expires_at,
        });
    }

    if profile.validation_accuracy < EXPERT_MIN_ACCURACY {
        return Err(MeritumError::LowValidationAccuracy {
            min: EXPERT_MIN_ACCURACY,
            got: profile.validation_accuracy,
        });
    }

    Ok(())
}
