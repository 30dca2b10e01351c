use meritum_core::error::MeritumError;
use meritum_core::types::{ParticipantId, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;

use crate::db::{ser_err, storage_err};

/// Completion durations kept per (participant, task kind).
const MAX_COMPLETION_SAMPLES: usize = 32;

/// Submission timestamps kept per participant (one more than the interval
/// window the cadence check reads).
const MAX_CADENCE_SAMPLES: usize = 17;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct CompletionSeries {
    durations_secs: Vec<u64>,
}

/// Per-participant timing bookkeeping: completion durations feed the
/// personal-baseline anomaly check, submission timestamps feed the cadence
/// regularity check.
pub trait TimingHistory: Send + Sync {
    fn record_completion(
        &self,
        participant: &ParticipantId,
        task_kind: &str,
        duration_secs: u64,
    ) -> Result<(), MeritumError>;

    /// Historical completion durations, oldest first, bounded window.
    fn completions(
        &self,
        participant: &ParticipantId,
        task_kind: &str,
    ) -> Result<Vec<u64>, MeritumError>;

    fn record_submission(
        &self,
        participant: &ParticipantId,
        at: Timestamp,
    ) -> Result<(), MeritumError>;

    /// Intervals between consecutive recorded submissions, oldest first.
    fn submission_intervals(&self, participant: &ParticipantId) -> Result<Vec<i64>, MeritumError>;
}

fn completion_key(participant: &ParticipantId, task_kind: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(32 + 1 + task_kind.len());
    key.extend_from_slice(participant.as_bytes());
    key.push(b'/');
    key.extend_from_slice(task_kind.as_bytes());
    key
}

fn intervals_of(timestamps: &[Timestamp]) -> Vec<i64> {
    timestamps.windows(2).map(|w| w[1] - w[0]).collect()
}

// ── Sled-backed ──────────────────────────────────────────────────────────────

pub struct SledTimingHistory {
    completions: sled::Tree,
    cadence: sled::Tree,
}

impl SledTimingHistory {
    pub fn new(completions: sled::Tree, cadence: sled::Tree) -> Self {
        Self { completions, cadence }
    }
}

impl TimingHistory for SledTimingHistory {
    fn record_completion(
        &self,
        participant: &ParticipantId,
        task_kind: &str,
        duration_secs: u64,
    ) -> Result<(), MeritumError> {
        self.completions
            .fetch_and_update(completion_key(participant, task_kind), |old| {
                let mut series: CompletionSeries = old
                    .and_then(|bytes| bincode::deserialize(bytes).ok())
                    .unwrap_or_default();
                series.durations_secs.push(duration_secs);
                if series.durations_secs.len() > MAX_COMPLETION_SAMPLES {
                    let excess = series.durations_secs.len() - MAX_COMPLETION_SAMPLES;
                    series.durations_secs.drain(..excess);
                }
                bincode::serialize(&series).ok()
            })
            .map_err(storage_err)?;
        Ok(())
    }

    fn completions(
        &self,
        participant: &ParticipantId,
        task_kind: &str,
    ) -> Result<Vec<u64>, MeritumError> {
        match self
            .completions
            .get(completion_key(participant, task_kind))
            .map_err(storage_err)?
        {
            Some(bytes) => {
                let series: CompletionSeries = bincode::deserialize(&bytes).map_err(ser_err)?;
                Ok(series.durations_secs)
            }
            None => Ok(Vec::new()),
        }
    }

    fn record_submission(
        &self,
        participant: &ParticipantId,
        at: Timestamp,
    ) -> Result<(), MeritumError> {
        self.cadence
            .fetch_and_update(participant.as_bytes(), |old| {
                let mut stamps: Vec<Timestamp> = old
                    .and_then(|bytes| bincode::deserialize(bytes).ok())
                    .unwrap_or_default();
                stamps.push(at);
                stamps.sort_unstable();
                if stamps.len() > MAX_CADENCE_SAMPLES {
                    let excess = stamps.len() - MAX_CADENCE_SAMPLES;
                    stamps.drain(..excess);
                }
                bincode::serialize(&stamps).ok()
            })
            .map_err(storage_err)?;
        Ok(())
    }

    fn submission_intervals(&self, participant: &ParticipantId) -> Result<Vec<i64>, MeritumError> {
        match self.cadence.get(participant.as_bytes()).map_err(storage_err)? {
            Some(bytes) => {
                let stamps: Vec<Timestamp> = bincode::deserialize(&bytes).map_err(ser_err)?;
                Ok(intervals_of(&stamps))
            }
            None => Ok(Vec::new()),
        }
    }
}

// ── In-memory ────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct MemoryTimingHistory {
    completions: Mutex<HashMap<Vec<u8>, Vec<u64>>>,
    cadence: Mutex<HashMap<ParticipantId, Vec<Timestamp>>>,
}

impl MemoryTimingHistory {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TimingHistory for MemoryTimingHistory {
    fn record_completion(
        &self,
        participant: &ParticipantId,
        task_kind: &str,
        duration_secs: u64,
    ) -> Result<(), MeritumError> {
        let mut map = self
            .completions
            .lock()
            .map_err(|_| MeritumError::Storage("timing lock poisoned".into()))?;
        let series = map.entry(completion_key(participant, task_kind)).or_default();
        series.push(duration_secs);
        if series.len() > MAX_COMPLETION_SAMPLES {
            let excess = series.len() - MAX_COMPLETION_SAMPLES;
            series.drain(..excess);
        }
        Ok(())
    }

    fn completions(
        &self,
        participant: &ParticipantId,
        task_kind: &str,
    ) -> Result<Vec<u64>, MeritumError> {
        let map = self
            .completions
            .lock()
            .map_err(|_| MeritumError::Storage("timing lock poisoned".into()))?;
        Ok(map
            .get(&completion_key(participant, task_kind))
            .cloned()
            .unwrap_or_default())
    }

    fn record_submission(
        &self,
        participant: &ParticipantId,
        at: Timestamp,
    ) -> Result<(), MeritumError> {
        let mut map = self
            .cadence
            .lock()
            .map_err(|_| MeritumError::Storage("cadence lock poisoned".into()))?;
        let stamps = map.entry(participant.clone()).or_default();
        stamps.push(at);
        stamps.sort_unstable();
        if stamps.len() > MAX_CADENCE_SAMPLES {
            let excess = stamps.len() - MAX_CADENCE_SAMPLES;
            stamps.drain(..excess);
        }
        Ok(())
    }

    fn submission_intervals(&self, participant: &ParticipantId) -> Result<Vec<i64>, MeritumError> {
        let map = self
            .cadence
            .lock()
            .map_err(|_| MeritumError::Storage("cadence lock poisoned".into()))?;
        Ok(map
            .get(participant)
            .map(|stamps| intervals_of(stamps))
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::EvalDb;

    fn p(byte: u8) -> ParticipantId {
        ParticipantId::from_bytes([byte; 32])
    }

    #[test]
    fn completions_window_is_bounded() {
        let history = MemoryTimingHistory::new();
        for i in 0..40u64 {
            history.record_completion(&p(1), "general", i).unwrap();
        }
        let got = history.completions(&p(1), "general").unwrap();
        assert_eq!(got.len(), MAX_COMPLETION_SAMPLES);
        assert_eq!(*got.first().unwrap(), 8); // oldest retained
        assert_eq!(*got.last().unwrap(), 39);
    }

    #[test]
    fn completions_scope_by_task_kind() {
        let history = MemoryTimingHistory::new();
        history.record_completion(&p(1), "code-analysis", 100).unwrap();
        history.record_completion(&p(1), "security-audit", 900).unwrap();
        assert_eq!(history.completions(&p(1), "code-analysis").unwrap(), vec![100]);
        assert_eq!(history.completions(&p(1), "security-audit").unwrap(), vec![900]);
    }

    #[test]
    fn intervals_come_from_consecutive_submissions() {
        let history = MemoryTimingHistory::new();
        for at in [1_000, 1_600, 2_200, 2_800] {
            history.record_submission(&p(2), at).unwrap();
        }
        assert_eq!(history.submission_intervals(&p(2)).unwrap(), vec![600, 600, 600]);
    }

    #[test]
    fn sled_history_round_trips() {
        let db = EvalDb::temporary().unwrap();
        let history = db.timing_history();
        history.record_completion(&p(3), "general", 450).unwrap();
        history.record_completion(&p(3), "general", 500).unwrap();
        assert_eq!(history.completions(&p(3), "general").unwrap(), vec![450, 500]);
        history.record_submission(&p(3), 10_000).unwrap();
        history.record_submission(&p(3), 10_700).unwrap();
        assert_eq!(history.submission_intervals(&p(3)).unwrap(), vec![700]);
    }
}
