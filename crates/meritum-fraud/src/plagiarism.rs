use std::sync::Arc;

use meritum_core::error::MeritumError;
use meritum_core::fraud::{clamp01, FraudIndicator, IndicatorKind, Severity};
use meritum_core::submission::Submission;
use meritum_core::task::Task;
use meritum_core::types::SubmissionId;
use meritum_core::constants::PLAGIARISM_FLAG;
use meritum_store::{CorpusEntry, SolutionCorpus};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::FraudConfig;
use crate::similarity::{
    edit_similarity, hash_similarity, semantic_similarity, structural_similarity,
};

// ── Match classification ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchType {
    ExactCopy,
    NearIdentical,
    SubstantialSimilarity,
    PartialSimilarity,
    Minimal,
}

impl MatchType {
    pub fn classify(similarity: f64) -> Self {
        if similarity > 0.95 {
            MatchType::ExactCopy
        } else if similarity > 0.85 {
            MatchType::NearIdentical
        } else if similarity > 0.70 {
            MatchType::SubstantialSimilarity
        } else if similarity > 0.50 {
            MatchType::PartialSimilarity
        } else {
            MatchType::Minimal
        }
    }

    fn severity(self) -> Severity {
        match self {
            MatchType::ExactCopy => Severity::Critical,
            MatchType::NearIdentical => Severity::High,
            MatchType::SubstantialSimilarity => Severity::Medium,
            MatchType::PartialSimilarity | MatchType::Minimal => Severity::Low,
        }
    }
}

/// Best corpus match found for a submission.
#[derive(Debug, Clone, PartialEq)]
pub struct PlagiarismMatch {
    pub submission: SubmissionId,
    pub similarity: f64,
    /// Agreement between the similarity algorithms, 1.0 when they all read
    /// the same.
    pub agreement: f64,
    pub match_type: MatchType,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlagiarismReport {
    pub best_match: Option<PlagiarismMatch>,
    pub indicators: Vec<FraudIndicator>,
    pub confidence: f64,
}

// ── Weighted similarity ──────────────────────────────────────────────────────

/// Algorithm confidences for the weighted average: structural, semantic,
/// edit-distance. The hash check is a short circuit, not an average term; a
/// binary signal would otherwise drag every non-exact copy below the flag
/// threshold.
const ALGO_CONFIDENCE: [f64; 3] = [0.8, 0.7, 0.9];

fn weighted_similarity(a: &[u8], b: &[u8]) -> (f64, f64) {
    if hash_similarity(a, b) == 1.0 {
        return (1.0, 1.0);
    }
    let scores = [
        structural_similarity(a, b),
        semantic_similarity(a, b),
        edit_similarity(a, b),
    ];
    let weighted: f64 = scores
        .iter()
        .zip(ALGO_CONFIDENCE)
        .map(|(s, c)| s * c)
        .sum::<f64>()
        / ALGO_CONFIDENCE.iter().sum::<f64>();
    let spread = scores.iter().fold(0.0_f64, |m, &s| m.max(s))
        - scores.iter().fold(1.0_f64, |m, &s| m.min(s));
    (weighted, clamp01(1.0 - spread))
}

// ── Analyzer ─────────────────────────────────────────────────────────────────

/// Multi-algorithm content-similarity search against the solution corpus.
/// Every analyzed submission joins the corpus afterward, flagged or not, so
/// later submissions can be checked against it.
pub struct PlagiarismAnalyzer {
    corpus: Arc<dyn SolutionCorpus>,
    config: Arc<FraudConfig>,
}

impl PlagiarismAnalyzer {
    pub fn new(corpus: Arc<dyn SolutionCorpus>, config: Arc<FraudConfig>) -> Self {
        Self { corpus, config }
    }

    pub async fn analyze(
        &self,
        task: &Task,
        submission: &Submission,
        content: &[u8],
    ) -> Result<PlagiarismReport, MeritumError> {
        let candidates = self
            .corpus
            .candidates(task.kind.tag(), self.config.corpus_candidate_limit)
            .await?;

        let mut best: Option<PlagiarismMatch> = None;
        for candidate in &candidates {
            if candidate.participant == submission.participant {
                continue;
            }
            let (similarity, agreement) = weighted_similarity(content, &candidate.body);
            if best.as_ref().map_or(true, |b| similarity > b.similarity) {
                best = Some(PlagiarismMatch {
                    submission: candidate.submission.clone(),
                    similarity,
                    agreement,
                    match_type: MatchType::classify(similarity),
                });
            }
        }

        let mut indicators = Vec::new();
        let mut confidence = 0.3;
        if let Some(found) = &best {
            confidence = 0.7 + 0.3 * found.agreement;
            if found.similarity > PLAGIARISM_FLAG {
                debug!(
                    similarity = found.similarity,
                    matched = %found.submission.to_hex(),
                    ?found.match_type,
                    "plagiarism flag"
                );
                indicators.push(FraudIndicator::new(
                    IndicatorKind::PlagiarismDetected,
                    found.match_type.severity(),
                    found.similarity,
                    confidence,
                    format!(
                        "weighted similarity {:.3} ({:?}) to prior submission {}",
                        found.similarity,
                        found.match_type,
                        found.submission.to_hex()
                    ),
                ));
            }
        }

        self.corpus
            .append(CorpusEntry {
                content: submission.content,
                submission: submission.id.clone(),
                participant: submission.participant.clone(),
                task_kind: task.kind.tag().to_string(),
                stored_at: submission.submitted_at,
                body: content.to_vec(),
            })
            .await?;

        Ok(PlagiarismReport {
            best_match: best,
            indicators,
            confidence,
        })
    }
}
