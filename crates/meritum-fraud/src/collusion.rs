use std::sync::Arc;

use meritum_core::constants::COLLUSION_CORRELATION_FLAG;
use meritum_core::error::MeritumError;
use meritum_core::fraud::{clamp01, FraudIndicator, IndicatorKind, Severity};
use meritum_core::network::NetworkSnapshot;
use meritum_core::submission::Submission;
use meritum_core::types::ParticipantId;
use meritum_store::CollusionGraph;

use crate::config::FraudConfig;

#[derive(Debug, Clone, PartialEq)]
pub struct CollusionAnalysisResult {
    pub indicators: Vec<FraudIndicator>,
    pub confidence: f64,
}

/// Correlates this submission with others landing on the same task close in
/// time. Historical pairwise correlation above the flag threshold reads as
/// coordination; every co-submission feeds the graph so the signal builds
/// across tasks.
pub struct CollusionAnalyzer {
    graph: Arc<dyn CollusionGraph>,
    config: Arc<FraudConfig>,
}

impl CollusionAnalyzer {
    pub fn new(graph: Arc<dyn CollusionGraph>, config: Arc<FraudConfig>) -> Self {
        Self { graph, config }
    }

    pub fn analyze(
        &self,
        submission: &Submission,
        snapshot: &NetworkSnapshot,
    ) -> Result<CollusionAnalysisResult, MeritumError> {
        let window = self.config.collusion_window_secs;
        let nearby: Vec<&ParticipantId> = snapshot
            .nearby_submissions
            .iter()
            .filter(|n| {
                n.participant != submission.participant
                    && (n.submitted_at - submission.submitted_at).abs() <= window
            })
            .map(|n| &n.participant)
            .collect();

        // Read correlations before recording this co-occurrence so a fresh
        // pair does not count its own first sighting.
        let mut best: Option<(f64, ParticipantId)> = None;
        for partner in &nearby {
            let correlation = self.graph.correlation(&submission.participant, partner)?;
            if best.as_ref().map_or(true, |(c, _)| correlation > *c) {
                best = Some((correlation, (*partner).clone()));
            }
        }

        let mut indicators = Vec::new();
        if let Some((correlation, partner)) = &best {
            if *correlation > COLLUSION_CORRELATION_FLAG {
                let observations = self
                    .graph
                    .edge(&submission.participant, partner)?
                    .map(|e| e.observations)
                    .unwrap_or(0);
                indicators.push(FraudIndicator::new(
                    IndicatorKind::TemporalCollusion,
                    Severity::High,
                    clamp01(
                        (correlation - COLLUSION_CORRELATION_FLAG)
                            / (1.0 - COLLUSION_CORRELATION_FLAG),
                    ),
                    (0.5 + 0.05 * observations as f64).min(0.9),
                    format!(
                        "correlation {correlation:.2} with co-submitter {} over {observations} prior interactions",
                        partner.to_b58()
                    ),
                ));
            }
        }

        for partner in &nearby {
            self.graph.record_interaction(
                &submission.participant,
                partner,
                self.config.interaction_weight,
                submission.submitted_at,
            )?;
        }

        let confidence = if nearby.is_empty() {
            0.3
        } else {
            (0.6 + 0.1 * nearby.len() as f64).min(1.0)
        };

        Ok(CollusionAnalysisResult {
            indicators,
            confidence,
        })
    }
}
