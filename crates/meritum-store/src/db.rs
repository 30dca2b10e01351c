use meritum_core::error::MeritumError;
use meritum_core::reward::RewardDistribution;
use meritum_core::types::TaskId;
use std::path::Path;

use crate::collusion::SledCollusionGraph;
use crate::corpus::SledCorpus;
use crate::reputation::SledReputationStore;
use crate::timing::SledTimingHistory;

/// Persistent evaluation-state database backed by sled (pure-Rust, no C
/// dependencies).
///
/// Named trees (analogous to column families):
///   corpus       — ContentHash bytes              → bincode(CorpusEntry)
///   collusion    — ordered participant pair bytes → bincode(EdgeStats)
///   timing       — participant ‖ kind tag bytes   → bincode(CompletionSeries)
///   cadence      — participant bytes              → bincode(Vec<Timestamp>)
///   reputation   — ParticipantId bytes            → bincode(ReputationRecord)
///   settlements  — TaskId bytes                   → bincode(RewardDistribution)
pub struct EvalDb {
    _db: sled::Db,
    corpus: sled::Tree,
    collusion: sled::Tree,
    timing: sled::Tree,
    cadence: sled::Tree,
    reputation: sled::Tree,
    settlements: sled::Tree,
}

impl EvalDb {
    /// Open or create the evaluation database at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, MeritumError> {
        let db = sled::open(path).map_err(storage_err)?;
        Self::from_sled(db)
    }

    /// An in-process, throwaway database (tests and dry runs).
    pub fn temporary() -> Result<Self, MeritumError> {
        let db = sled::Config::new()
            .temporary(true)
            .open()
            .map_err(storage_err)?;
        Self::from_sled(db)
    }

    fn from_sled(db: sled::Db) -> Result<Self, MeritumError> {
        let corpus = db.open_tree("corpus").map_err(storage_err)?;
        let collusion = db.open_tree("collusion").map_err(storage_err)?;
        let timing = db.open_tree("timing").map_err(storage_err)?;
        let cadence = db.open_tree("cadence").map_err(storage_err)?;
        let reputation = db.open_tree("reputation").map_err(storage_err)?;
        let settlements = db.open_tree("settlements").map_err(storage_err)?;
        Ok(Self {
            _db: db,
            corpus,
            collusion,
            timing,
            cadence,
            reputation,
            settlements,
        })
    }

    // ── Store handles (cheap Tree clones) ────────────────────────────────────

    pub fn corpus(&self) -> SledCorpus {
        SledCorpus::new(self.corpus.clone())
    }

    pub fn collusion_graph(&self) -> SledCollusionGraph {
        SledCollusionGraph::new(self.collusion.clone())
    }

    pub fn timing_history(&self) -> SledTimingHistory {
        SledTimingHistory::new(self.timing.clone(), self.cadence.clone())
    }

    pub fn reputation_store(&self) -> SledReputationStore {
        SledReputationStore::new(self.reputation.clone())
    }

    // ── Settlements (the durable finalization gate) ──────────────────────────

    /// Record a settled distribution. Exactly-once per (task, revision 0):
    /// a second write for the same task fails unless it carries a higher
    /// revision (dispute supersession).
    pub fn record_settlement(&self, dist: &RewardDistribution) -> Result<(), MeritumError> {
        if let Some(existing) = self.settlement(&dist.task)? {
            if dist.revision <= existing.revision {
                return Err(MeritumError::AlreadyFinalized(dist.task.to_string()));
            }
        }
        let bytes = bincode::serialize(dist).map_err(ser_err)?;
        self.settlements
            .insert(dist.task.as_bytes(), bytes)
            .map_err(storage_err)?;
        Ok(())
    }

    pub fn settlement(&self, task: &TaskId) -> Result<Option<RewardDistribution>, MeritumError> {
        match self.settlements.get(task.as_bytes()).map_err(storage_err)? {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes).map_err(ser_err)?)),
            None => Ok(None),
        }
    }

    pub fn is_finalized(&self, task: &TaskId) -> bool {
        self.settlements
            .contains_key(task.as_bytes())
            .unwrap_or(false)
    }

    /// Flush all pending writes to disk.
    pub fn flush(&self) -> Result<(), MeritumError> {
        self._db.flush().map_err(storage_err)?;
        Ok(())
    }
}

pub(crate) fn storage_err(e: sled::Error) -> MeritumError {
    MeritumError::Storage(e.to_string())
}

pub(crate) fn ser_err(e: bincode::Error) -> MeritumError {
    MeritumError::Serialization(e.to_string())
}
