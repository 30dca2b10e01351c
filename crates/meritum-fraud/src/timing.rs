use std::sync::Arc;

use meritum_core::constants::{
    TIMING_MIN_SAMPLES, TIMING_Z_FLAG, TIMING_Z_HIGH, TOO_FAST_RATIO, WORK_PROOF_TOLERANCE,
};
use meritum_core::error::MeritumError;
use meritum_core::fraud::{clamp01, FraudIndicator, IndicatorKind, Severity};
use meritum_core::submission::Submission;
use meritum_core::task::Task;
use meritum_store::TimingHistory;

use crate::config::{DurationModel, FraudConfig};

/// Outcome of the timing analysis. `confidence` reflects how much of the
/// analysis could actually run: a missing duration model or a thin personal
/// history lowers it without producing an indicator.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeAnalysisResult {
    pub indicators: Vec<FraudIndicator>,
    pub confidence: f64,
}

/// Statistical timing checks: claimed duration against the expected-duration
/// envelope, against the participant's own history, and against the
/// wall-clock submission window.
pub struct TimingAnalyzer {
    history: Arc<dyn TimingHistory>,
    config: Arc<FraudConfig>,
}

impl TimingAnalyzer {
    pub fn new(history: Arc<dyn TimingHistory>, config: Arc<FraudConfig>) -> Self {
        Self { history, config }
    }

    pub fn analyze(
        &self,
        task: &Task,
        submission: &Submission,
    ) -> Result<TimeAnalysisResult, MeritumError> {
        let samples = self
            .history
            .completions(&submission.participant, task.kind.tag())?;
        let model = self.config.duration_model(task.kind.tag(), task.difficulty);

        let claimed = submission.work_proof.claimed_duration_secs;
        let mut indicators = Vec::new();

        if let Some(model) = &model {
            if let Some(indicator) = too_fast_indicator(model, claimed) {
                indicators.push(indicator);
            }
        }
        if let Some(indicator) = anomaly_indicator(&samples, claimed) {
            indicators.push(indicator);
        }
        if let Some(indicator) =
            work_proof_indicator(claimed, submission.elapsed_secs(task))
        {
            indicators.push(indicator);
        }

        // The wall-clock cross-check always runs; the envelope check needs a
        // configured model and the anomaly check needs personal history.
        let mut confidence = 0.2;
        if model.is_some() {
            confidence += 0.4;
        }
        if samples.len() >= TIMING_MIN_SAMPLES {
            confidence += 0.4 * (samples.len() as f64 / 10.0).min(1.0);
        }

        Ok(TimeAnalysisResult {
            indicators,
            confidence: clamp01(confidence),
        })
    }
}

fn too_fast_indicator(model: &DurationModel, claimed_secs: u64) -> Option<FraudIndicator> {
    let actual = claimed_secs.max(1) as f64;
    let expected_min = model.min_secs as f64;
    if actual >= TOO_FAST_RATIO * expected_min {
        return None;
    }
    let speed_ratio = expected_min / actual;
    let severity = if speed_ratio > 5.0 {
        Severity::Critical
    } else if speed_ratio > 3.0 {
        Severity::High
    } else {
        Severity::Medium
    };
    // Confidence 1.0: pure arithmetic over the declared duration and the
    // configured envelope, nothing estimated.
    Some(FraudIndicator::new(
        IndicatorKind::TooFastCompletion,
        severity,
        clamp01(expected_min * TOO_FAST_RATIO / actual - 1.0),
        1.0,
        format!(
            "completed in {claimed_secs}s against an expected minimum of {}s",
            model.min_secs
        ),
    ))
}

/// Personal-baseline z-score check. Abstains below `TIMING_MIN_SAMPLES`: a
/// single wild sample with no history is not evidence.
fn anomaly_indicator(samples: &[u64], claimed_secs: u64) -> Option<FraudIndicator> {
    if samples.len() < TIMING_MIN_SAMPLES {
        return None;
    }
    let n = samples.len() as f64;
    let mean = samples.iter().sum::<u64>() as f64 / n;
    let variance = samples
        .iter()
        .map(|&s| {
            let d = s as f64 - mean;
            d * d
        })
        .sum::<f64>()
        / n;
    let stddev = variance.sqrt();
    let deviation = (claimed_secs as f64 - mean).abs();
    // A perfectly flat history makes any deviation infinitely anomalous.
    let z = if stddev > 0.0 {
        deviation / stddev
    } else if deviation > 0.0 {
        f64::INFINITY
    } else {
        0.0
    };
    if z <= TIMING_Z_FLAG {
        return None;
    }
    let severity = if z > TIMING_Z_HIGH {
        Severity::High
    } else {
        Severity::Medium
    };
    Some(FraudIndicator::new(
        IndicatorKind::TimePatternAnomaly,
        severity,
        clamp01((z - TIMING_Z_FLAG) / TIMING_Z_FLAG),
        (0.4 + 0.05 * n).min(0.9),
        format!(
            "duration {claimed_secs}s deviates from the personal mean {mean:.0}s (z = {z:.2})"
        ),
    ))
}

/// Claimed work time cannot plausibly exceed the wall-clock window between
/// publication and submission. Flagged, never silently rejected.
fn work_proof_indicator(claimed_secs: u64, elapsed_secs: i64) -> Option<FraudIndicator> {
    let elapsed = elapsed_secs.max(1) as f64;
    let excess = claimed_secs as f64 / elapsed - 1.0;
    if excess <= WORK_PROOF_TOLERANCE {
        return None;
    }
    let severity = if excess > 2.0 * WORK_PROOF_TOLERANCE {
        Severity::High
    } else {
        Severity::Medium
    };
    Some(FraudIndicator::new(
        IndicatorKind::WorkProofInconsistent,
        severity,
        clamp01(excess - WORK_PROOF_TOLERANCE),
        0.9,
        format!("work proof claims {claimed_secs}s inside a {elapsed_secs}s wall-clock window"),
    ))
}
