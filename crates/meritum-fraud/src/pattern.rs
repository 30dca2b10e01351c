use std::sync::Arc;

use meritum_core::constants::{CADENCE_CV_FLAG, CADENCE_MIN_INTERVALS, SIMILARITY_FLAG};
use meritum_core::error::MeritumError;
use meritum_core::fraud::{clamp01, FraudIndicator, IndicatorKind, Severity};
use meritum_core::submission::Submission;
use meritum_core::task::Task;
use meritum_store::{SolutionCorpus, TimingHistory};
use tracing::debug;

use crate::config::FraudConfig;
use crate::similarity::structural_similarity;

#[derive(Debug, Clone, PartialEq)]
pub struct PatternAnalysisResult {
    pub indicators: Vec<FraudIndicator>,
    pub confidence: f64,
}

/// Behavioral pattern checks: bot-like submission cadence and structural
/// similarity against the global solution-signature corpus.
pub struct PatternAnalyzer {
    timing: Arc<dyn TimingHistory>,
    corpus: Arc<dyn SolutionCorpus>,
    config: Arc<FraudConfig>,
}

impl PatternAnalyzer {
    pub fn new(
        timing: Arc<dyn TimingHistory>,
        corpus: Arc<dyn SolutionCorpus>,
        config: Arc<FraudConfig>,
    ) -> Self {
        Self {
            timing,
            corpus,
            config,
        }
    }

    pub async fn analyze(
        &self,
        task: &Task,
        submission: &Submission,
        content: &[u8],
    ) -> Result<PatternAnalysisResult, MeritumError> {
        // Record first so the cadence window includes the gap to this
        // submission.
        self.timing
            .record_submission(&submission.participant, submission.submitted_at)?;
        let intervals = self.timing.submission_intervals(&submission.participant)?;

        let mut indicators = Vec::new();
        let mut confidence = 0.0;

        if intervals.len() >= CADENCE_MIN_INTERVALS {
            confidence += 0.5 * (intervals.len() as f64 / 8.0).min(1.0);
            if let Some(indicator) = cadence_indicator(&intervals) {
                indicators.push(indicator);
            }
        }

        let candidates = self
            .corpus
            .candidates(task.kind.tag(), self.config.corpus_candidate_limit)
            .await?;
        let mut best: Option<(f64, String)> = None;
        for candidate in &candidates {
            // A participant resembling their own earlier work is not a signal.
            if candidate.participant == submission.participant {
                continue;
            }
            let similarity = structural_similarity(content, &candidate.body);
            if best.as_ref().map_or(true, |(s, _)| similarity > *s) {
                best = Some((similarity, candidate.submission.to_hex()));
            }
        }
        confidence += if candidates.is_empty() { 0.2 } else { 0.5 };

        if let Some((similarity, matched)) = best {
            debug!(%similarity, %matched, "signature lookup best match");
            if similarity > SIMILARITY_FLAG {
                indicators.push(similarity_indicator(similarity, &matched));
            }
        }

        Ok(PatternAnalysisResult {
            indicators,
            confidence: clamp01(confidence),
        })
    }
}

/// Coefficient of variation over recent submission intervals. Humans are
/// noisy; a CV under `CADENCE_CV_FLAG` reads as scripted.
fn cadence_indicator(intervals: &[i64]) -> Option<FraudIndicator> {
    let n = intervals.len() as f64;
    let mean = intervals.iter().sum::<i64>() as f64 / n;
    if mean <= 0.0 {
        return None;
    }
    let variance = intervals
        .iter()
        .map(|&i| {
            let d = i as f64 - mean;
            d * d
        })
        .sum::<f64>()
        / n;
    let cv = variance.sqrt() / mean;
    if cv >= CADENCE_CV_FLAG {
        return None;
    }
    let risk = clamp01((CADENCE_CV_FLAG - cv) / CADENCE_CV_FLAG);
    // High once the CV drops under half the flag threshold.
    let severity = if risk > 0.5 { Severity::High } else { Severity::Medium };
    Some(FraudIndicator::new(
        IndicatorKind::RegularSubmissionPattern,
        severity,
        risk,
        (0.4 + 0.05 * n).min(0.9),
        format!(
            "{} consecutive intervals with mean {mean:.0}s and CV {cv:.3}",
            intervals.len()
        ),
    ))
}

fn similarity_indicator(similarity: f64, matched: &str) -> FraudIndicator {
    let severity = if similarity > 0.95 {
        Severity::Critical
    } else if similarity > 0.90 {
        Severity::High
    } else {
        Severity::Medium
    };
    // The similarity itself is the risk: a 0.88 match is 0.88 risky, not
    // merely a fifth of the way past the flag line.
    FraudIndicator::new(
        IndicatorKind::HighSolutionSimilarity,
        severity,
        clamp01(similarity),
        0.8,
        format!("signature similarity {similarity:.3} to prior submission {matched}"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use meritum_core::submission::WorkProof;
    use meritum_core::task::{DifficultyLevel, TaskKind, TaskStatus, VerificationMethod};
    use meritum_core::types::{ContentHash, ParticipantId, SubmissionId, TaskId, Timestamp};
    use meritum_store::{CorpusEntry, MemoryCorpus, MemoryTimingHistory};

    const NOW: Timestamp = 1_700_000_000;

    fn make_task() -> Task {
        let publisher = ParticipantId::from_bytes([1u8; 32]);
        Task {
            id: TaskId::derive(&publisher, NOW, "classify the logs"),
            publisher,
            title: "classify the logs".into(),
            kind: TaskKind::DataAnalysis {
                domain: "telemetry".into(),
                dataset_size: 10_000,
            },
            difficulty: DifficultyLevel::Intermediate,
            reward_pool: 1_000_000,
            required_stake: 200_000,
            published_at: NOW,
            submission_deadline: NOW + 86_400,
            validation_deadline: NOW + 2 * 86_400,
            quality_threshold: 70,
            verification: VerificationMethod::Automatic,
            status: TaskStatus::Published,
            status_history: Vec::new(),
        }
    }

    fn make_submission(participant: ParticipantId, submitted_at: Timestamp) -> Submission {
        let task = make_task();
        Submission {
            id: SubmissionId::derive(&task.id, &participant, submitted_at),
            task: task.id,
            participant,
            submitted_at,
            content: ContentHash::of(b"an analysis"),
            work_proof: WorkProof {
                claimed_duration_secs: 900,
                cpu_time_ms: 900_000,
                memory_peak_kb: 8_192,
                step_chain_root: ContentHash::of(b"steps"),
                nonce_commitment: [0u8; 32],
            },
        }
    }

    fn make_analyzer() -> (PatternAnalyzer, Arc<MemoryTimingHistory>, Arc<MemoryCorpus>) {
        let timing = Arc::new(MemoryTimingHistory::new());
        let corpus = Arc::new(MemoryCorpus::new());
        let analyzer = PatternAnalyzer::new(
            timing.clone(),
            corpus.clone(),
            Arc::new(FraudConfig::default()),
        );
        (analyzer, timing, corpus)
    }

    #[tokio::test]
    async fn metronomic_cadence_is_flagged() {
        let (analyzer, timing, _) = make_analyzer();
        let participant = ParticipantId::from_bytes([2u8; 32]);
        // Three prior submissions exactly 600s apart; the fourth keeps the
        // beat, so the window holds three identical intervals.
        for at in [NOW - 1_800, NOW - 1_200, NOW - 600] {
            timing.record_submission(&participant, at).unwrap();
        }
        let result = analyzer
            .analyze(&make_task(), &make_submission(participant, NOW), b"fresh work")
            .await
            .unwrap();
        let cadence = result
            .indicators
            .iter()
            .find(|i| i.kind == IndicatorKind::RegularSubmissionPattern)
            .unwrap();
        assert_eq!(cadence.severity, Severity::High);
        assert_eq!(cadence.risk_score, 1.0);
    }

    #[tokio::test]
    async fn human_cadence_is_not_flagged() {
        let (analyzer, timing, _) = make_analyzer();
        let participant = ParticipantId::from_bytes([3u8; 32]);
        for at in [NOW - 9_000, NOW - 4_100, NOW - 700] {
            timing.record_submission(&participant, at).unwrap();
        }
        let result = analyzer
            .analyze(&make_task(), &make_submission(participant, NOW), b"fresh work")
            .await
            .unwrap();
        assert!(result.indicators.is_empty());
    }

    #[tokio::test]
    async fn cadence_abstains_with_short_history() {
        let (analyzer, timing, _) = make_analyzer();
        let participant = ParticipantId::from_bytes([4u8; 32]);
        // Only two intervals after this submission lands.
        for at in [NOW - 1_200, NOW - 600] {
            timing.record_submission(&participant, at).unwrap();
        }
        let result = analyzer
            .analyze(&make_task(), &make_submission(participant, NOW), b"fresh work")
            .await
            .unwrap();
        assert!(result.indicators.is_empty());
        assert!(result.confidence < 0.6);
    }

    #[tokio::test]
    async fn corpus_lookalike_is_flagged() {
        let (analyzer, _, corpus) = make_analyzer();
        let body = b"group the records by host then count failures per window and rank the hosts";
        corpus
            .append(CorpusEntry {
                content: ContentHash::of(body),
                submission: SubmissionId::from_bytes([7u8; 32]),
                participant: ParticipantId::from_bytes([7u8; 32]),
                task_kind: "data-analysis".into(),
                stored_at: NOW - 3_600,
                body: body.to_vec(),
            })
            .await
            .unwrap();
        let participant = ParticipantId::from_bytes([5u8; 32]);
        let result = analyzer
            .analyze(&make_task(), &make_submission(participant, NOW), body)
            .await
            .unwrap();
        let similarity = result
            .indicators
            .iter()
            .find(|i| i.kind == IndicatorKind::HighSolutionSimilarity)
            .unwrap();
        assert_eq!(similarity.severity, Severity::Critical);
        assert_eq!(similarity.risk_score, 1.0);
    }

    #[tokio::test]
    async fn own_prior_work_is_ignored() {
        let (analyzer, _, corpus) = make_analyzer();
        let participant = ParticipantId::from_bytes([6u8; 32]);
        let body = b"group the records by host then count failures per window and rank the hosts";
        corpus
            .append(CorpusEntry {
                content: ContentHash::of(body),
                submission: SubmissionId::from_bytes([8u8; 32]),
                participant: participant.clone(),
                task_kind: "data-analysis".into(),
                stored_at: NOW - 3_600,
                body: body.to_vec(),
            })
            .await
            .unwrap();
        let result = analyzer
            .analyze(&make_task(), &make_submission(participant, NOW), body)
            .await
            .unwrap();
        assert!(result.indicators.is_empty());
    }

    #[test]
    fn similarity_risk_is_the_similarity_itself() {
        let medium = similarity_indicator(0.88, "deadbeef");
        assert_eq!(medium.risk_score, 0.88);
        assert_eq!(medium.severity, Severity::Medium);

        let high = similarity_indicator(0.93, "deadbeef");
        assert_eq!(high.risk_score, 0.93);
        assert_eq!(high.severity, Severity::High);
    }
}
