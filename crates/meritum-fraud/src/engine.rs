use std::sync::Arc;
use std::time::Duration;

use futures::future::{join_all, BoxFuture};
use meritum_core::error::MeritumError;
use meritum_core::fraud::{FraudAnalysisResult, FraudIndicator};
use meritum_core::network::NetworkSnapshot;
use meritum_core::submission::Submission;
use meritum_core::task::Task;
use meritum_store::{CollusionGraph, SolutionCorpus, TimingHistory};
use tracing::{debug, warn};

use crate::collusion::CollusionAnalyzer;
use crate::config::FraudConfig;
use crate::pattern::PatternAnalyzer;
use crate::plagiarism::PlagiarismAnalyzer;
use crate::timing::TimingAnalyzer;

const ANALYZER_COUNT: usize = 4;

type AnalyzerOutcome = (Vec<FraudIndicator>, f64);

/// Fans one submission out to the four analyzers, combines whatever they
/// emit into a single risk score and recommendation.
///
/// Analyzers run concurrently, are order-independent, and are failure
/// isolated: an analyzer that errors or outlives its time budget abstains,
/// lowering the result confidence instead of blocking the analysis.
pub struct FraudEngine {
    timing: TimingAnalyzer,
    pattern: PatternAnalyzer,
    collusion: CollusionAnalyzer,
    plagiarism: PlagiarismAnalyzer,
    history: Arc<dyn TimingHistory>,
    config: Arc<FraudConfig>,
}

impl FraudEngine {
    pub fn new(
        corpus: Arc<dyn SolutionCorpus>,
        graph: Arc<dyn CollusionGraph>,
        history: Arc<dyn TimingHistory>,
        config: Arc<FraudConfig>,
    ) -> Self {
        Self {
            timing: TimingAnalyzer::new(history.clone(), config.clone()),
            pattern: PatternAnalyzer::new(history.clone(), corpus.clone(), config.clone()),
            collusion: CollusionAnalyzer::new(graph, config.clone()),
            plagiarism: PlagiarismAnalyzer::new(corpus, config.clone()),
            history,
            config,
        }
    }

    pub async fn analyze(
        &self,
        task: &Task,
        submission: &Submission,
        content: &[u8],
        snapshot: &NetworkSnapshot,
    ) -> Result<FraudAnalysisResult, MeritumError> {
        let jobs: Vec<(&'static str, BoxFuture<'_, Result<AnalyzerOutcome, MeritumError>>)> = vec![
            (
                "timing",
                Box::pin(async move {
                    self.timing
                        .analyze(task, submission)
                        .map(|r| (r.indicators, r.confidence))
                }),
            ),
            (
                "pattern",
                Box::pin(async move {
                    self.pattern
                        .analyze(task, submission, content)
                        .await
                        .map(|r| (r.indicators, r.confidence))
                }),
            ),
            (
                "collusion",
                Box::pin(async move {
                    self.collusion
                        .analyze(submission, snapshot)
                        .map(|r| (r.indicators, r.confidence))
                }),
            ),
            (
                "plagiarism",
                Box::pin(async move {
                    self.plagiarism
                        .analyze(task, submission, content)
                        .await
                        .map(|r| (r.indicators, r.confidence))
                }),
            ),
        ];

        let budget = Duration::from_secs(self.config.analyzer_timeout_secs);
        let guarded = jobs.into_iter().map(|(name, job)| async move {
            match tokio::time::timeout(budget, job).await {
                Ok(Ok(outcome)) => Some(outcome),
                Ok(Err(err)) => {
                    warn!(analyzer = name, %err, "analyzer failed, abstaining");
                    None
                }
                Err(_) => {
                    warn!(
                        analyzer = name,
                        budget_secs = self.config.analyzer_timeout_secs,
                        "analyzer timed out, abstaining"
                    );
                    None
                }
            }
        });

        // join_all keeps declaration order, so the indicator list comes out
        // deterministic regardless of completion order.
        let mut indicators = Vec::new();
        let mut confidence_sum = 0.0;
        for outcome in join_all(guarded).await.into_iter().flatten() {
            indicators.extend(outcome.0);
            confidence_sum += outcome.1;
        }
        let confidence = confidence_sum / ANALYZER_COUNT as f64;

        let result = FraudAnalysisResult::evaluate(
            submission.id.clone(),
            indicators,
            confidence,
            snapshot.now,
        );

        // A rejected claim would poison the personal baseline.
        if !result.recommendation.is_reject() {
            if let Err(err) = self.history.record_completion(
                &submission.participant,
                task.kind.tag(),
                submission.work_proof.claimed_duration_secs,
            ) {
                warn!(%err, "failed to record completion history");
            }
        }

        debug!(
            submission = %submission.id.to_hex(),
            risk = result.overall_risk,
            confidence = result.confidence,
            indicators = result.indicators.len(),
            "fraud analysis complete"
        );
        Ok(result)
    }
}
