use meritum_core::error::MeritumError;
use meritum_core::types::{ParticipantId, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;

use crate::db::{ser_err, storage_err};

/// Accumulated pairwise interaction statistics for two participants.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EdgeStats {
    /// Additively merged interaction weight. Correlation reads saturate this
    /// at 1.0.
    pub weight: f64,
    pub observations: u64,
    pub last_seen: Timestamp,
}

/// The pairwise collusion-correlation graph. Edges are undirected; weights
/// are accumulated additively over time (last-writer-wins would silently
/// drop concurrent evaluations, so merges must be additive).
pub trait CollusionGraph: Send + Sync {
    /// Add `weight` to the edge between `a` and `b`.
    fn record_interaction(
        &self,
        a: &ParticipantId,
        b: &ParticipantId,
        weight: f64,
        at: Timestamp,
    ) -> Result<(), MeritumError>;

    /// Historical correlation in [0, 1]: accumulated edge weight, saturated.
    fn correlation(&self, a: &ParticipantId, b: &ParticipantId) -> Result<f64, MeritumError>;

    fn edge(&self, a: &ParticipantId, b: &ParticipantId) -> Result<Option<EdgeStats>, MeritumError>;
}

/// Undirected edge key: the lexicographically smaller id first.
fn edge_key(a: &ParticipantId, b: &ParticipantId) -> [u8; 64] {
    let (lo, hi) = if a.as_bytes() <= b.as_bytes() { (a, b) } else { (b, a) };
    let mut key = [0u8; 64];
    key[..32].copy_from_slice(lo.as_bytes());
    key[32..].copy_from_slice(hi.as_bytes());
    key
}

// ── Sled-backed ──────────────────────────────────────────────────────────────

pub struct SledCollusionGraph {
    tree: sled::Tree,
}

impl SledCollusionGraph {
    pub fn new(tree: sled::Tree) -> Self {
        Self { tree }
    }
}

impl CollusionGraph for SledCollusionGraph {
    fn record_interaction(
        &self,
        a: &ParticipantId,
        b: &ParticipantId,
        weight: f64,
        at: Timestamp,
    ) -> Result<(), MeritumError> {
        let key = edge_key(a, b);
        // fetch_and_update is atomic per key, which is exactly the additive
        // merge discipline concurrent task evaluations need.
        self.tree
            .fetch_and_update(key, |old| {
                let mut stats: EdgeStats = old
                    .and_then(|bytes| bincode::deserialize(bytes).ok())
                    .unwrap_or_default();
                stats.weight += weight;
                stats.observations += 1;
                if at > stats.last_seen {
                    stats.last_seen = at;
                }
                bincode::serialize(&stats).ok()
            })
            .map_err(storage_err)?;
        Ok(())
    }

    fn correlation(&self, a: &ParticipantId, b: &ParticipantId) -> Result<f64, MeritumError> {
        Ok(self.edge(a, b)?.map(|s| s.weight.min(1.0)).unwrap_or(0.0))
    }

    fn edge(&self, a: &ParticipantId, b: &ParticipantId) -> Result<Option<EdgeStats>, MeritumError> {
        match self.tree.get(edge_key(a, b)).map_err(storage_err)? {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes).map_err(ser_err)?)),
            None => Ok(None),
        }
    }
}

// ── In-memory ────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct MemoryCollusionGraph {
    edges: Mutex<HashMap<[u8; 64], EdgeStats>>,
}

impl MemoryCollusionGraph {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CollusionGraph for MemoryCollusionGraph {
    fn record_interaction(
        &self,
        a: &ParticipantId,
        b: &ParticipantId,
        weight: f64,
        at: Timestamp,
    ) -> Result<(), MeritumError> {
        let mut edges = self
            .edges
            .lock()
            .map_err(|_| MeritumError::Storage("collusion graph lock poisoned".into()))?;
        let stats = edges.entry(edge_key(a, b)).or_default();
        stats.weight += weight;
        stats.observations += 1;
        if at > stats.last_seen {
            stats.last_seen = at;
        }
        Ok(())
    }

    fn correlation(&self, a: &ParticipantId, b: &ParticipantId) -> Result<f64, MeritumError> {
        Ok(self.edge(a, b)?.map(|s| s.weight.min(1.0)).unwrap_or(0.0))
    }

    fn edge(&self, a: &ParticipantId, b: &ParticipantId) -> Result<Option<EdgeStats>, MeritumError> {
        let edges = self
            .edges
            .lock()
            .map_err(|_| MeritumError::Storage("collusion graph lock poisoned".into()))?;
        Ok(edges.get(&edge_key(a, b)).cloned())
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
    fn edge_key_is_order_independent() {
        assert_eq!(edge_key(&p(1), &p(2)), edge_key(&p(2), &p(1)));
    }

    #[test]
    fn memory_merge_is_additive() {
        let graph = MemoryCollusionGraph::new();
        graph.record_interaction(&p(1), &p(2), 0.3, 100).unwrap();
        graph.record_interaction(&p(2), &p(1), 0.25, 200).unwrap();
        let edge = graph.edge(&p(1), &p(2)).unwrap().unwrap();
        assert!((edge.weight - 0.55).abs() < 1e-9);
        assert_eq!(edge.observations, 2);
        assert_eq!(edge.last_seen, 200);
    }

    #[test]
    fn correlation_saturates_at_one() {
        let graph = MemoryCollusionGraph::new();
        for _ in 0..10 {
            graph.record_interaction(&p(3), &p(4), 0.2, 0).unwrap();
        }
        assert_eq!(graph.correlation(&p(3), &p(4)).unwrap(), 1.0);
    }

    #[test]
    fn sled_merge_is_additive() {
        let db = EvalDb::temporary().unwrap();
        let graph = db.collusion_graph();
        graph.record_interaction(&p(5), &p(6), 0.4, 10).unwrap();
        graph.record_interaction(&p(6), &p(5), 0.45, 20).unwrap();
        assert!((graph.correlation(&p(5), &p(6)).unwrap() - 0.85).abs() < 1e-9);
    }

    #[test]
    fn unknown_pair_has_zero_correlation() {
        let graph = MemoryCollusionGraph::new();
        assert_eq!(graph.correlation(&p(9), &p(10)).unwrap(), 0.0);
    }
}
