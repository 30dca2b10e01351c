//! Baseline automatic validation shipped with the node binary.
//!
//! Real deployments register capability providers that actually execute or
//! analyze submitted work. The node always registers this one as a floor so
//! automatic-verification tasks can be driven end to end: it judges nothing
//! but the structural plausibility of the submitted text.

use async_trait::async_trait;

use meritum_core::validation::AutoCheck;
use meritum_core::{MeritumError, Submission, Task};
use meritum_validation::{AutoAssessment, AutoValidator};

/// Confidence reported with every assessment. Deliberately low: these checks
/// see shape, not substance, and the scoring weights should treat them that
/// way.
const HEURISTIC_CONFIDENCE: f64 = 0.35;

pub struct BaselineHeuristics;

impl BaselineHeuristics {
    fn length_check(content: &[u8]) -> AutoCheck {
        let len = content.len();
        let score = match len {
            0..=63 => 20,
            64..=255 => 55,
            256..=4095 => 85,
            _ => 70,
        };
        AutoCheck {
            name: "length".into(),
            score,
            detail: format!("{len} bytes"),
        }
    }

    fn vocabulary_check(text: &str) -> AutoCheck {
        let words: Vec<&str> = text.split_whitespace().collect();
        let unique: std::collections::HashSet<&str> = words.iter().copied().collect();
        let score = if words.is_empty() {
            0
        } else {
            let ratio = unique.len() as f64 / words.len() as f64;
            ((ratio * 120.0) as u8).min(95)
        };
        AutoCheck {
            name: "vocabulary".into(),
            score,
            detail: format!("{} unique / {} words", unique.len(), words.len()),
        }
    }

    fn structure_check(text: &str) -> AutoCheck {
        let lines = text.lines().filter(|l| !l.trim().is_empty()).count();
        let sentences = text.matches(['.', '!', '?']).count();
        let score = if lines >= 3 || sentences >= 3 {
            80
        } else if lines >= 1 && sentences >= 1 {
            55
        } else {
            30
        };
        AutoCheck {
            name: "structure".into(),
            score,
            detail: format!("{lines} lines, {sentences} sentence marks"),
        }
    }
}

#[async_trait]
impl AutoValidator for BaselineHeuristics {
    fn tag(&self) -> &'static str {
        "baseline-heuristics"
    }

    fn supports(&self, _task: &Task) -> bool {
        true
    }

    async fn assess(
        &self,
        _task: &Task,
        _submission: &Submission,
        content: &[u8],
    ) -> Result<AutoAssessment, MeritumError> {
        let text = String::from_utf8_lossy(content);
        Ok(AutoAssessment {
            checks: vec![
                Self::length_check(content),
                Self::vocabulary_check(&text),
                Self::structure_check(&text),
            ],
            confidence: HEURISTIC_CONFIDENCE,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meritum_core::constants::VALIDATION_PASS_SCORE;
    use meritum_core::types::{ContentHash, ParticipantId, SubmissionId, TaskId, Timestamp};
    use meritum_core::submission::WorkProof;
    use meritum_core::task::{DifficultyLevel, TaskKind, TaskStatus, VerificationMethod};

    const NOW: Timestamp = 1_700_000_000;

    fn make_task() -> Task {
        let publisher = ParticipantId::from_bytes([1u8; 32]);
        Task {
            id: TaskId::derive(&publisher, NOW, "lint this"),
            publisher,
            title: "lint this".into(),
            kind: TaskKind::CodeAnalysis {
                language: "rust".into(),
                complexity: 3,
            },
            difficulty: DifficultyLevel::Beginner,
            reward_pool: 1_000_000,
            required_stake: 200_000,
            published_at: NOW,
            submission_deadline: NOW + 86_400,
            validation_deadline: NOW + 2 * 86_400,
            quality_threshold: 60,
            verification: VerificationMethod::Automatic,
            status: TaskStatus::UnderValidation,
            status_history: Vec::new(),
        }
    }

    fn make_submission(content: &[u8]) -> Submission {
        let task = make_task();
        let participant = ParticipantId::from_bytes([2u8; 32]);
        Submission {
            id: SubmissionId::derive(&task.id, &participant, NOW + 3_600),
            task: task.id,
            participant,
            submitted_at: NOW + 3_600,
            content: ContentHash::of(content),
            work_proof: WorkProof {
                claimed_duration_secs: 3_000,
                cpu_time_ms: 10_000,
                memory_peak_kb: 2_048,
                step_chain_root: ContentHash::of(b"steps"),
                nonce_commitment: [0u8; 32],
            },
        }
    }

    #[tokio::test]
    async fn structured_prose_outscores_a_fragment() {
        let provider = BaselineHeuristics;
        let task = make_task();

        let prose = b"The allocator leaks in the retry path. Each retry clones \
                      the buffer without releasing the previous arena slot.\n\
                      Fix: release before clone, or reuse the slot.\n\
                      Verified against the bundled reproduction case.";
        let fragment = b"looks fine";

        let rich = provider
            .assess(&task, &make_submission(prose), prose)
            .await
            .unwrap();
        let poor = provider
            .assess(&task, &make_submission(fragment), fragment)
            .await
            .unwrap();

        assert!(rich.overall_score() > poor.overall_score());
        assert!(rich.overall_score() >= VALIDATION_PASS_SCORE);
    }

    #[tokio::test]
    async fn empty_content_fails_every_check() {
        let provider = BaselineHeuristics;
        let task = make_task();
        let assessment = provider
            .assess(&task, &make_submission(b""), b"")
            .await
            .unwrap();
        assert!(assessment.checks.iter().all(|c| !c.passed()));
    }
}
