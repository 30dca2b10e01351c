use meritum_core::error::MeritumError;
use meritum_core::reputation::{ReputationDelta, ReputationRecord};
use meritum_core::types::ParticipantId;
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::debug;

use crate::db::{ser_err, storage_err};

/// Read/write access to participant reputation. The core computes deltas;
/// this store applies them. Updates to one participant must be atomic and
/// applied in the order their triggering events were finalized — the
/// pipeline serializes the apply calls, the store guarantees each one is a
/// single atomic read-modify-write.
pub trait ReputationStore: Send + Sync {
    fn get(&self, participant: &ParticipantId) -> Result<Option<ReputationRecord>, MeritumError>;

    /// Existing record, or a fresh one anchored at `now` for first-time
    /// participants.
    fn get_or_init(
        &self,
        participant: &ParticipantId,
        now: i64,
    ) -> Result<ReputationRecord, MeritumError>;

    /// Apply one finalized delta and return the updated record.
    fn apply(&self, delta: &ReputationDelta) -> Result<ReputationRecord, MeritumError>;
}

// ── Sled-backed ──────────────────────────────────────────────────────────────

pub struct SledReputationStore {
    tree: sled::Tree,
}

impl SledReputationStore {
    pub fn new(tree: sled::Tree) -> Self {
        Self { tree }
    }
}

impl ReputationStore for SledReputationStore {
    fn get(&self, participant: &ParticipantId) -> Result<Option<ReputationRecord>, MeritumError> {
        match self.tree.get(participant.as_bytes()).map_err(storage_err)? {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes).map_err(ser_err)?)),
            None => Ok(None),
        }
    }

    fn get_or_init(
        &self,
        participant: &ParticipantId,
        now: i64,
    ) -> Result<ReputationRecord, MeritumError> {
        Ok(self
            .get(participant)?
            .unwrap_or_else(|| ReputationRecord::new(participant.clone(), now)))
    }

    fn apply(&self, delta: &ReputationDelta) -> Result<ReputationRecord, MeritumError> {
        let key = *delta.participant.as_bytes();
        let participant = delta.participant.clone();
        let event = delta.event;
        let domain = delta.domain.clone();
        let at = delta.finalized_at;
        self.tree
            .fetch_and_update(key, move |old| {
                let mut record: ReputationRecord = old
                    .and_then(|bytes| bincode::deserialize(bytes).ok())
                    .unwrap_or_else(|| ReputationRecord::new(participant.clone(), at));
                record.apply(event, domain.as_deref(), at);
                bincode::serialize(&record).ok()
            })
            .map_err(storage_err)?;
        let updated = self
            .get(&delta.participant)?
            .ok_or_else(|| MeritumError::UnknownParticipant(delta.participant.to_string()))?;
        debug!(
            participant = %delta.participant,
            event = ?delta.event,
            overall = updated.overall,
            "reputation delta applied"
        );
        Ok(updated)
    }
}

// ── In-memory ────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct MemoryReputationStore {
    records: Mutex<HashMap<ParticipantId, ReputationRecord>>,
}

impl MemoryReputationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a record directly (test setup).
    pub fn insert(&self, record: ReputationRecord) -> Result<(), MeritumError> {
        let mut records = self
            .records
            .lock()
            .map_err(|_| MeritumError::Storage("reputation lock poisoned".into()))?;
        records.insert(record.participant.clone(), record);
        Ok(())
    }
}

impl ReputationStore for MemoryReputationStore {
    fn get(&self, participant: &ParticipantId) -> Result<Option<ReputationRecord>, MeritumError> {
        let records = self
            .records
            .lock()
            .map_err(|_| MeritumError::Storage("reputation lock poisoned".into()))?;
        Ok(records.get(participant).cloned())
    }

    fn get_or_init(
        &self,
        participant: &ParticipantId,
        now: i64,
    ) -> Result<ReputationRecord, MeritumError> {
        Ok(self
            .get(participant)?
            .unwrap_or_else(|| ReputationRecord::new(participant.clone(), now)))
    }

    fn apply(&self, delta: &ReputationDelta) -> Result<ReputationRecord, MeritumError> {
        let mut records = self
            .records
            .lock()
            .map_err(|_| MeritumError::Storage("reputation lock poisoned".into()))?;
        let record = records
            .entry(delta.participant.clone())
            .or_insert_with(|| ReputationRecord::new(delta.participant.clone(), delta.finalized_at));
        record.apply(delta.event, delta.domain.as_deref(), delta.finalized_at);
        Ok(record.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::EvalDb;
    use meritum_core::reputation::ReputationEvent;

    const NOW: i64 = 1_700_000_000;

    fn delta(event: ReputationEvent, at: i64) -> ReputationDelta {
        ReputationDelta {
            participant: ParticipantId::from_bytes([8u8; 32]),
            event,
            domain: Some("rust".into()),
            finalized_at: at,
        }
    }

    #[test]
    fn apply_initializes_then_accumulates() {
        let store = MemoryReputationStore::new();
        let after_first = store
            .apply(&delta(ReputationEvent::SubmissionAccepted, NOW))
            .unwrap();
        assert_eq!(after_first.overall, 5_100);
        let after_second = store
            .apply(&delta(ReputationEvent::ValidationCorrect, NOW + 10))
            .unwrap();
        assert_eq!(after_second.overall, 5_130);
        assert_eq!(after_second.validations_total, 1);
        assert_eq!(after_second.last_active_at, NOW + 10);
    }

    #[test]
    fn sled_apply_matches_memory_semantics() {
        let db = EvalDb::temporary().unwrap();
        let store = db.reputation_store();
        store
            .apply(&delta(ReputationEvent::SubmissionAccepted, NOW))
            .unwrap();
        let updated = store
            .apply(&delta(ReputationEvent::SubmissionRejected, NOW + 5))
            .unwrap();
        assert_eq!(updated.overall, 5_050);
        assert_eq!(updated.domain_proficiency("rust"), 5_025);
    }

    #[test]
    fn get_or_init_does_not_persist() {
        let store = MemoryReputationStore::new();
        let p = ParticipantId::from_bytes([1u8; 32]);
        let fresh = store.get_or_init(&p, NOW).unwrap();
        assert_eq!(fresh.overall, 5_000);
        assert!(store.get(&p).unwrap().is_none());
    }
}
