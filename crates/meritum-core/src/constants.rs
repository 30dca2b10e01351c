/// ─── Meritum Protocol Constants ─────────────────────────────────────────────
///
/// Evaluation-core constants for the Meritum task marketplace.
///
/// Base unit:  merit  (1 MER = 1,000,000 merits)
/// Ticker:     MER

// ── Currency ─────────────────────────────────────────────────────────────────

/// 1 MER expressed in merits.
pub const MERITS_PER_MER: u128 = 1_000_000;

// ── Task publication rules ───────────────────────────────────────────────────

/// Required stake lower bound: 10% of the reward pool.
pub const MIN_STAKE_BP: u32 = 1_000;

/// Required stake upper bound: 50% of the reward pool.
pub const MAX_STAKE_BP: u32 = 5_000;

/// A submission deadline may be at most 30 days after publication.
pub const MAX_TASK_DURATION_SECS: i64 = 30 * 24 * 3600;

/// Per-difficulty cooldown between submissions by the same participant
/// (Beginner, Intermediate, Advanced, Expert), in seconds.
pub const SUBMISSION_COOLDOWN_SECS: [i64; 4] = [300, 900, 1_800, 3_600];

// ── Validation ───────────────────────────────────────────────────────────────

/// An automatic check counts as passed at or above this score.
pub const VALIDATION_PASS_SCORE: u8 = 70;

/// Minimum historical validation accuracy required of an expert reviewer.
pub const EXPERT_MIN_ACCURACY: f64 = 0.85;

/// Consensus approval threshold per difficulty
/// (Beginner, Intermediate, Advanced, Expert): fraction of total vote
/// weight that must fall within the agreement band.
pub const CONSENSUS_APPROVAL_THRESHOLD: [f64; 4] = [0.60, 0.65, 0.70, 0.80];

/// Votes within this many points of the weighted mean score count toward
/// agreement.
pub const CONSENSUS_AGREEMENT_BAND: u8 = 10;

/// Anti-farming rate limit: validations of similar tasks a single validator
/// may perform inside the rate window.
pub const MAX_VALIDATIONS_PER_WINDOW: u32 = 20;

/// Rate-limit window for validator anti-farming, in seconds.
pub const VALIDATION_RATE_WINDOW_SECS: i64 = 24 * 3600;

/// Minimum effective reputation a peer validator needs, per task difficulty
/// (Beginner, Intermediate, Advanced, Expert). Values follow the Sybil-risk
/// ladder steps.
pub const MIN_VALIDATOR_REPUTATION: [u32; 4] = [2_000, 4_000, 6_000, 8_000];

// ── Fraud analysis ───────────────────────────────────────────────────────────

/// A completion faster than this fraction of the expected minimum duration
/// is treated as suspiciously fast.
pub const TOO_FAST_RATIO: f64 = 0.3;

/// z-score above which a completion time counts as a personal-history
/// anomaly.
pub const TIMING_Z_FLAG: f64 = 3.0;

/// z-score above which the anomaly severity escalates to High.
pub const TIMING_Z_HIGH: f64 = 5.0;

/// Minimum historical samples before the timing pattern check may speak.
pub const TIMING_MIN_SAMPLES: usize = 3;

/// Coefficient of variation below which a submission cadence is bot-like.
pub const CADENCE_CV_FLAG: f64 = 0.1;

/// Minimum recorded submission intervals before the cadence check may speak.
pub const CADENCE_MIN_INTERVALS: usize = 3;

/// Corpus similarity above which a solution is flagged as suspiciously
/// similar to previously seen work.
pub const SIMILARITY_FLAG: f64 = 0.85;

/// Half-width of the temporal window used by collusion analysis, in seconds.
pub const COLLUSION_WINDOW_SECS: i64 = 3_600;

/// Pairwise historical correlation above which co-submission is flagged.
pub const COLLUSION_CORRELATION_FLAG: f64 = 0.8;

/// Confidence-weighted similarity above which plagiarism is flagged.
pub const PLAGIARISM_FLAG: f64 = 0.8;

/// Claimed work-proof duration may disagree with the wall-clock window by
/// at most this relative fraction before being flagged.
pub const WORK_PROOF_TOLERANCE: f64 = 0.5;

// ── Fraud recommendation ladder ──────────────────────────────────────────────

/// Overall risk at or above which a submission is rejected outright.
pub const RISK_REJECT: f64 = 0.9;

/// Overall risk at or above which a submission goes to manual review.
pub const RISK_MANUAL_REVIEW: f64 = 0.7;

/// Overall risk at or above which validation is escalated.
pub const RISK_ENHANCED_VALIDATION: f64 = 0.5;

/// Overall risk at or above which the participant is monitored.
pub const RISK_MONITOR: f64 = 0.3;

/// Reviewers required once a submission is flagged for manual review.
pub const MANUAL_REVIEW_MIN_REVIEWERS: u32 = 3;

/// Extra validators drafted under an enhanced-validation recommendation.
pub const ENHANCED_VALIDATION_EXTRA_VALIDATORS: u32 = 2;

/// Review-window extension under enhanced validation: 24 hours.
pub const ENHANCED_VALIDATION_EXTENSION_SECS: i64 = 24 * 3600;

/// Monitoring window after a Monitor recommendation: 7 days.
pub const MONITOR_WINDOW_SECS: i64 = 7 * 24 * 3600;

/// Risk level that triggers an alert while a participant is monitored.
pub const MONITOR_ALERT_THRESHOLD: f64 = 0.5;

// ── Reputation ───────────────────────────────────────────────────────────────

/// Reputation is carried on a 0–10,000 integer scale.
pub const REPUTATION_SCALE: u32 = 10_000;

/// Score assigned to a freshly registered participant.
pub const INITIAL_REPUTATION: u32 = 5_000;

/// Inactivity decay never drops a participant below this floor.
pub const REPUTATION_FLOOR: u32 = 1_000;

/// Idle period after which one decay step applies, in seconds (30 days).
pub const REPUTATION_DECAY_PERIOD_SECS: i64 = 30 * 24 * 3600;

/// Decay per idle period, in basis points of the distance above the floor.
pub const REPUTATION_DECAY_BP: u32 = 500;

/// Maximum accuracy bonus for validators with a strong track record.
pub const ACCURACY_BONUS_MAX: u32 = 2_000;

/// Validations required before the accuracy bonus applies.
pub const ACCURACY_BONUS_MIN_VALIDATIONS: u64 = 10;

/// Accuracy above which the bonus starts scaling.
pub const ACCURACY_BONUS_THRESHOLD: f64 = 0.8;

/// Flat bonus for participants active longer than the longevity horizon.
pub const LONGEVITY_BONUS: u32 = 1_000;

/// Participation length that earns the longevity bonus, in seconds (90 days).
pub const LONGEVITY_HORIZON_SECS: i64 = 90 * 24 * 3600;

// ── Rewards ──────────────────────────────────────────────────────────────────

/// Winner rank multipliers in basis points (rank 1, 2, 3, lower).
pub const WINNER_RANK_MULTIPLIER_BP: [u32; 4] = [10_000, 6_000, 4_000, 2_000];

/// Validator contribution type weights.
pub const VALIDATOR_WEIGHT_EXPERT: f64 = 2.0;
pub const VALIDATOR_WEIGHT_PEER: f64 = 1.0;
pub const VALIDATOR_WEIGHT_CONSENSUS: f64 = 0.8;

/// Floor weight for participation shares: a submission scoring below this
/// still draws a share as if it had scored this much.
pub const PARTICIPATION_FLOOR_SCORE: u8 = 10;

/// Accuracy assumed for a validator with no recorded validation history.
pub const NEUTRAL_VALIDATION_ACCURACY: f64 = 0.5;
