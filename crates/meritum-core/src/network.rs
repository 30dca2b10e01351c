use crate::types::{ParticipantId, SubmissionId, Timestamp};
use serde::{Deserialize, Serialize};

/// Another submission observed near the one under analysis (same task,
/// close in time). Supplied by the network layer, read-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NearbySubmission {
    pub submission: SubmissionId,
    pub participant: ParticipantId,
    pub submitted_at: Timestamp,
}

/// Read-only per-evaluation snapshot of ambient network state. Economic
/// parameters travel separately as the scoring/reward configuration
/// structs; this carries the temporal context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkSnapshot {
    pub now: Timestamp,
    pub block_height: u64,
    /// Submissions to the same task, ordered by submission time.
    pub nearby_submissions: Vec<NearbySubmission>,
}

impl NetworkSnapshot {
    pub fn new(now: Timestamp, block_height: u64) -> Self {
        Self {
            now,
            block_height,
            nearby_submissions: Vec::new(),
        }
    }
}
