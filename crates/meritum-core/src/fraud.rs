use crate::constants::{
    ENHANCED_VALIDATION_EXTENSION_SECS, ENHANCED_VALIDATION_EXTRA_VALIDATORS,
    MANUAL_REVIEW_MIN_REVIEWERS, MONITOR_ALERT_THRESHOLD, MONITOR_WINDOW_SECS, RISK_ENHANCED_VALIDATION,
    RISK_MANUAL_REVIEW, RISK_MONITOR, RISK_REJECT,
};
use crate::types::{SubmissionId, Timestamp};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Clamp into the unit interval. Risk and confidence figures pass through
/// this at every construction site.
pub fn clamp01(x: f64) -> f64 {
    x.clamp(0.0, 1.0)
}

// ── Indicators ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
}

impl Severity {
    /// Weight of this severity in the overall-risk combination.
    pub fn weight(self) -> f64 {
        match self {
            Severity::Critical => 1.0,
            Severity::High => 0.8,
            Severity::Medium => 0.6,
            Severity::Low => 0.4,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Critical => "critical",
            Severity::High => "high",
            Severity::Medium => "medium",
            Severity::Low => "low",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IndicatorKind {
    TooFastCompletion,
    TimePatternAnomaly,
    RegularSubmissionPattern,
    HighSolutionSimilarity,
    TemporalCollusion,
    PlagiarismDetected,
    WorkProofInconsistent,
}

impl fmt::Display for IndicatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            IndicatorKind::TooFastCompletion => "too-fast-completion",
            IndicatorKind::TimePatternAnomaly => "time-pattern-anomaly",
            IndicatorKind::RegularSubmissionPattern => "regular-submission-pattern",
            IndicatorKind::HighSolutionSimilarity => "high-solution-similarity",
            IndicatorKind::TemporalCollusion => "temporal-collusion",
            IndicatorKind::PlagiarismDetected => "plagiarism-detected",
            IndicatorKind::WorkProofInconsistent => "work-proof-inconsistent",
        };
        write!(f, "{s}")
    }
}

/// One detected fraud signal. `confidence` is inherited from the emitting
/// analyzer; risk and confidence are clamped at construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FraudIndicator {
    pub kind: IndicatorKind,
    pub severity: Severity,
    pub risk_score: f64,
    pub confidence: f64,
    pub evidence: String,
}

impl FraudIndicator {
    pub fn new(
        kind: IndicatorKind,
        severity: Severity,
        risk_score: f64,
        confidence: f64,
        evidence: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            severity,
            risk_score: clamp01(risk_score),
            confidence: clamp01(confidence),
            evidence: evidence.into(),
        }
    }

    /// risk × confidence × severity weight — the value the combiner works on.
    pub fn weighted(&self) -> f64 {
        self.risk_score * self.confidence * self.severity.weight()
    }
}

// ── Recommendation ladder ────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReviewPriority {
    Low,
    Medium,
    High,
}

/// What the pipeline should do with an analyzed submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Recommendation {
    Reject,
    FlagForManualReview {
        priority: ReviewPriority,
        required_reviewers: u32,
    },
    EnhancedValidation {
        extra_validators: u32,
        extended_window_secs: i64,
    },
    Monitor {
        window_secs: i64,
        alert_threshold: f64,
    },
    Proceed {
        confidence: f64,
    },
}

impl Recommendation {
    /// Reject strips reward eligibility entirely.
    pub fn is_reject(&self) -> bool {
        matches!(self, Recommendation::Reject)
    }

    /// Whether the submission is held out of automatic settlement pending
    /// further validator input.
    pub fn holds_settlement(&self) -> bool {
        matches!(
            self,
            Recommendation::FlagForManualReview { .. } | Recommendation::EnhancedValidation { .. }
        )
    }
}

/// Deterministic threshold ladder over the overall risk score.
pub fn recommend(overall_risk: f64) -> Recommendation {
    if overall_risk >= RISK_REJECT {
        Recommendation::Reject
    } else if overall_risk >= RISK_MANUAL_REVIEW {
        Recommendation::FlagForManualReview {
            priority: ReviewPriority::High,
            required_reviewers: MANUAL_REVIEW_MIN_REVIEWERS,
        }
    } else if overall_risk >= RISK_ENHANCED_VALIDATION {
        Recommendation::EnhancedValidation {
            extra_validators: ENHANCED_VALIDATION_EXTRA_VALIDATORS,
            extended_window_secs: ENHANCED_VALIDATION_EXTENSION_SECS,
        }
    } else if overall_risk >= RISK_MONITOR {
        Recommendation::Monitor {
            window_secs: MONITOR_WINDOW_SECS,
            alert_threshold: MONITOR_ALERT_THRESHOLD,
        }
    } else {
        Recommendation::Proceed {
            confidence: 1.0 - overall_risk,
        }
    }
}

// ── Combination ──────────────────────────────────────────────────────────────

/// Overall risk from a set of indicators:
///
///   0.7 × average(weighted) + 0.3 × max(weighted)
///
/// where weighted = risk × confidence × severity weight. An empty set is
/// zero risk.
pub fn combine_risk(indicators: &[FraudIndicator]) -> f64 {
    if indicators.is_empty() {
        return 0.0;
    }
    let weighted: Vec<f64> = indicators.iter().map(FraudIndicator::weighted).collect();
    let avg = weighted.iter().sum::<f64>() / weighted.len() as f64;
    let max = weighted.iter().fold(0.0_f64, |a, &b| a.max(b));
    clamp01(0.7 * avg + 0.3 * max)
}

// ── Result ───────────────────────────────────────────────────────────────────

/// Complete fraud analysis of one submission. Immutable; re-analysis makes a
/// new result with a fresh `analyzed_at`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FraudAnalysisResult {
    pub submission: SubmissionId,
    pub indicators: Vec<FraudIndicator>,
    pub overall_risk: f64,
    /// How much of the analyzer set contributed signals, scaled by their own
    /// confidence. Fewer contributing analyzers ⇒ lower confidence.
    pub confidence: f64,
    pub recommendation: Recommendation,
    pub analyzed_at: Timestamp,
}

impl FraudAnalysisResult {
    pub fn evaluate(
        submission: SubmissionId,
        indicators: Vec<FraudIndicator>,
        confidence: f64,
        analyzed_at: Timestamp,
    ) -> Self {
        let overall_risk = combine_risk(&indicators);
        let recommendation = recommend(overall_risk);
        Self {
            submission,
            indicators,
            overall_risk,
            confidence: clamp01(confidence),
            recommendation,
            analyzed_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn indicator(kind: IndicatorKind, severity: Severity, risk: f64, conf: f64) -> FraudIndicator {
        FraudIndicator::new(kind, severity, risk, conf, "test evidence")
    }

    #[test]
    fn empty_indicator_set_is_zero_risk() {
        assert_eq!(combine_risk(&[]), 0.0);
        assert!(matches!(
            recommend(0.0),
            Recommendation::Proceed { confidence } if (confidence - 1.0).abs() < 1e-9
        ));
    }

    #[test]
    fn single_critical_indicator_combines_as_itself() {
        let set = [indicator(
            IndicatorKind::TooFastCompletion,
            Severity::Critical,
            1.0,
            1.0,
        )];
        // avg == max == 1.0, so 0.7 + 0.3 = 1.0
        assert!((combine_risk(&set) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn combination_mixes_average_and_max() {
        let set = [
            indicator(IndicatorKind::TooFastCompletion, Severity::Critical, 1.0, 1.0),
            indicator(IndicatorKind::RegularSubmissionPattern, Severity::Medium, 0.5, 1.0),
        ];
        // weighted = [1.0, 0.3]; avg = 0.65; max = 1.0
        let expected = 0.7 * 0.65 + 0.3 * 1.0;
        assert!((combine_risk(&set) - expected).abs() < 1e-9);
    }

    #[test]
    fn risk_is_monotone_in_indicator_risk_and_confidence() {
        let base = vec![
            indicator(IndicatorKind::TemporalCollusion, Severity::High, 0.4, 0.8),
            indicator(IndicatorKind::PlagiarismDetected, Severity::Medium, 0.6, 0.7),
        ];
        let base_risk = combine_risk(&base);

        for step in 1..=6 {
            let bump = 0.1 * step as f64;
            let mut raised = base.clone();
            raised[0].risk_score = clamp01(0.4 + bump);
            assert!(
                combine_risk(&raised) >= base_risk,
                "raising risk_score must not lower overall risk"
            );

            let mut raised = base.clone();
            raised[1].confidence = clamp01(0.7 + bump);
            assert!(
                combine_risk(&raised) >= base_risk,
                "raising confidence must not lower overall risk"
            );
        }
    }

    #[test]
    fn recommendation_ladder_thresholds() {
        assert!(recommend(0.95).is_reject());
        assert!(recommend(0.9).is_reject());
        assert!(matches!(
            recommend(0.7),
            Recommendation::FlagForManualReview {
                priority: ReviewPriority::High,
                required_reviewers: 3,
            }
        ));
        assert!(matches!(
            recommend(0.5),
            Recommendation::EnhancedValidation { .. }
        ));
        assert!(matches!(recommend(0.3), Recommendation::Monitor { .. }));
        assert!(matches!(
            recommend(0.29),
            Recommendation::Proceed { confidence } if (confidence - 0.71).abs() < 1e-9
        ));
    }

    #[test]
    fn holds_settlement_covers_review_paths() {
        assert!(recommend(0.7).holds_settlement());
        assert!(recommend(0.5).holds_settlement());
        assert!(!recommend(0.3).holds_settlement());
        assert!(!recommend(0.95).holds_settlement()); // reject is a gate, not a hold
    }

    #[test]
    fn indicator_construction_clamps() {
        let i = indicator(IndicatorKind::TooFastCompletion, Severity::Critical, 7.0, 2.0);
        assert_eq!(i.risk_score, 1.0);
        assert_eq!(i.confidence, 1.0);
    }
}
