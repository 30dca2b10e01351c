use crate::error::MeritumError;
use crate::task::Task;
use crate::types::{ContentHash, ParticipantId, SubmissionId, TaskId, Timestamp};
use serde::{Deserialize, Serialize};

/// Proof-of-work metadata a participant attaches to a submission. The chain
/// root commits to the sequence of intermediate process steps; the nonce
/// commitment binds the work to a task-specific random value so answers
/// cannot be precomputed before publication.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkProof {
    /// Working time the participant claims, in seconds.
    pub claimed_duration_secs: u64,
    pub cpu_time_ms: u64,
    pub memory_peak_kb: u64,
    pub step_chain_root: ContentHash,
    pub nonce_commitment: [u8; 32],
}

/// One participant's candidate solution. At most one active submission per
/// (task, participant). Content is an opaque handle; the bytes live behind
/// the external content source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Submission {
    pub id: SubmissionId,
    pub task: TaskId,
    pub participant: ParticipantId,
    pub submitted_at: Timestamp,
    pub content: ContentHash,
    pub work_proof: WorkProof,
}

impl Submission {
    /// Reject submissions outside [published_at, submission_deadline].
    /// A work-proof duration inconsistent with the wall clock is NOT checked
    /// here: that is flagged by timing analysis, never silently rejected.
    pub fn check_window(&self, task: &Task) -> Result<(), MeritumError> {
        if !task.submission_window_contains(self.submitted_at) {
            return Err(MeritumError::SubmissionOutsideWindow);
        }
        Ok(())
    }

    /// Wall-clock seconds between task publication and this submission.
    pub fn elapsed_secs(&self, task: &Task) -> i64 {
        self.submitted_at - task.published_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::{DifficultyLevel, TaskKind, TaskStatus, VerificationMethod};

    const NOW: Timestamp = 1_700_000_000;

    fn make_task() -> Task {
        let publisher = ParticipantId::from_bytes([9u8; 32]);
        Task {
            id: TaskId::derive(&publisher, NOW, "sort faster"),
            publisher,
            title: "sort faster".into(),
            kind: TaskKind::AlgorithmOptimization {
                target: "sorting".into(),
                baseline_metric: 125.0,
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

    fn make_submission(submitted_at: Timestamp) -> Submission {
        let task = make_task();
        let participant = ParticipantId::from_bytes([2u8; 32]);
        Submission {
            id: SubmissionId::derive(&task.id, &participant, submitted_at),
            task: task.id,
            participant,
            submitted_at,
            content: ContentHash::of(b"quicksort with a twist"),
            work_proof: WorkProof {
                claimed_duration_secs: 1_200,
                cpu_time_ms: 900_000,
                memory_peak_kb: 65_536,
                step_chain_root: ContentHash::of(b"steps"),
                nonce_commitment: [0u8; 32],
            },
        }
    }

    #[test]
    fn submission_inside_window_passes() {
        let task = make_task();
        assert!(make_submission(NOW + 3_600).check_window(&task).is_ok());
    }

    #[test]
    fn submission_after_deadline_is_rejected() {
        let task = make_task();
        let late = make_submission(NOW + 86_401);
        assert!(matches!(
            late.check_window(&task),
            Err(MeritumError::SubmissionOutsideWindow)
        ));
    }

    #[test]
    fn elapsed_is_wall_clock_window() {
        let task = make_task();
        assert_eq!(make_submission(NOW + 420).elapsed_secs(&task), 420);
    }
}
