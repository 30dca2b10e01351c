use async_trait::async_trait;
use meritum_core::error::MeritumError;
use meritum_core::types::{ContentHash, ParticipantId, SubmissionId, Timestamp};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::debug;

use crate::db::{ser_err, storage_err};

/// One stored solution in the global signature corpus. The body is kept so
/// later submissions can be compared against it with the content-level
/// similarity algorithms, not just by hash.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorpusEntry {
    pub content: ContentHash,
    pub submission: SubmissionId,
    pub participant: ParticipantId,
    /// Task-kind tag the solution answered; candidate search scopes to it.
    pub task_kind: String,
    pub stored_at: Timestamp,
    pub body: Vec<u8>,
}

/// The global solution-signature corpus. Append-mostly: every analyzed
/// submission lands here regardless of whether it was flagged. Search is an
/// asynchronous suspension point (the production corpus sits behind an
/// index service).
#[async_trait]
pub trait SolutionCorpus: Send + Sync {
    /// Prior solutions for the given task kind, most recent first, capped at
    /// `limit`.
    async fn candidates(
        &self,
        task_kind: &str,
        limit: usize,
    ) -> Result<Vec<CorpusEntry>, MeritumError>;

    /// Append a solution. Concurrent appends from different tasks must both
    /// survive.
    async fn append(&self, entry: CorpusEntry) -> Result<(), MeritumError>;

    async fn contains(&self, content: &ContentHash) -> Result<bool, MeritumError>;
}

// ── Sled-backed ──────────────────────────────────────────────────────────────

pub struct SledCorpus {
    tree: sled::Tree,
}

impl SledCorpus {
    pub fn new(tree: sled::Tree) -> Self {
        Self { tree }
    }
}

#[async_trait]
impl SolutionCorpus for SledCorpus {
    async fn candidates(
        &self,
        task_kind: &str,
        limit: usize,
    ) -> Result<Vec<CorpusEntry>, MeritumError> {
        let mut entries = Vec::new();
        for item in self.tree.iter() {
            let (_, bytes) = item.map_err(storage_err)?;
            let entry: CorpusEntry = bincode::deserialize(&bytes).map_err(ser_err)?;
            if entry.task_kind == task_kind {
                entries.push(entry);
            }
        }
        entries.sort_by(|a, b| b.stored_at.cmp(&a.stored_at));
        entries.truncate(limit);
        Ok(entries)
    }

    async fn append(&self, entry: CorpusEntry) -> Result<(), MeritumError> {
        let bytes = bincode::serialize(&entry).map_err(ser_err)?;
        self.tree
            .insert(entry.content.as_bytes(), bytes)
            .map_err(storage_err)?;
        debug!(content = %entry.content, task_kind = %entry.task_kind, "corpus append");
        Ok(())
    }

    async fn contains(&self, content: &ContentHash) -> Result<bool, MeritumError> {
        self.tree.contains_key(content.as_bytes()).map_err(storage_err)
    }
}

// ── In-memory ────────────────────────────────────────────────────────────────

/// In-process corpus for tests and single-run evaluation.
#[derive(Default)]
pub struct MemoryCorpus {
    entries: RwLock<Vec<CorpusEntry>>,
}

impl MemoryCorpus {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SolutionCorpus for MemoryCorpus {
    async fn candidates(
        &self,
        task_kind: &str,
        limit: usize,
    ) -> Result<Vec<CorpusEntry>, MeritumError> {
        let entries = self.entries.read().await;
        let mut matching: Vec<CorpusEntry> = entries
            .iter()
            .filter(|e| e.task_kind == task_kind)
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.stored_at.cmp(&a.stored_at));
        matching.truncate(limit);
        Ok(matching)
    }

    async fn append(&self, entry: CorpusEntry) -> Result<(), MeritumError> {
        self.entries.write().await.push(entry);
        Ok(())
    }

    async fn contains(&self, content: &ContentHash) -> Result<bool, MeritumError> {
        Ok(self
            .entries
            .read()
            .await
            .iter()
            .any(|e| &e.content == content))
    }
}
