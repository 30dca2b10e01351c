use crate::error::MeritumError;
use crate::types::{Amount, ParticipantId, Score, TaskId, Timestamp};
use serde::{Deserialize, Serialize};

/// Why a recipient is paid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RewardKind {
    Winner { rank: u32, final_score: Score },
    Participation,
    Validation,
    QualityBonus,
    SpeedBonus,
    /// The whole pool going back to the publisher when no submission
    /// survived evaluation.
    PoolReturn,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RewardEntry {
    pub recipient: ParticipantId,
    pub amount: Amount,
    pub kind: RewardKind,
}

/// The settled distribution of one task's reward pool. Created exactly once
/// per settlement; a dispute produces a new distribution with a higher
/// revision that supersedes this one, never an edit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RewardDistribution {
    pub task: TaskId,
    pub total_pool: Amount,
    pub network_fee: Amount,
    pub entries: Vec<RewardEntry>,
    pub settled_at: Timestamp,
    /// 0 for the first settlement; disputes supersede with revision + 1.
    pub revision: u32,
}

impl RewardDistribution {
    pub fn distributed(&self) -> Amount {
        self.entries.iter().map(|e| e.amount).sum()
    }

    /// The settlement conservation invariant: entries + fee must equal the
    /// pool exactly. Integer remainders were already folded into the fee by
    /// the reward engine; any mismatch here is fatal for the settlement.
    pub fn verify(&self) -> Result<(), MeritumError> {
        let distributed = self.distributed();
        if distributed + self.network_fee != self.total_pool {
            return Err(MeritumError::SettlementImbalance {
                distributed,
                fee: self.network_fee,
                pool: self.total_pool,
            });
        }
        Ok(())
    }

    pub fn entries_for(&self, participant: &ParticipantId) -> Vec<&RewardEntry> {
        self.entries
            .iter()
            .filter(|e| &e.recipient == participant)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(byte: u8, amount: Amount) -> RewardEntry {
        RewardEntry {
            recipient: ParticipantId::from_bytes([byte; 32]),
            amount,
            kind: RewardKind::Participation,
        }
    }

    #[test]
    fn conservation_holds_for_exact_split() {
        let dist = RewardDistribution {
            task: TaskId::from_bytes([1u8; 32]),
            total_pool: 1_000,
            network_fee: 100,
            entries: vec![entry(1, 500), entry(2, 400)],
            settled_at: 0,
            revision: 0,
        };
        assert!(dist.verify().is_ok());
    }

    #[test]
    fn imbalance_is_fatal() {
        let dist = RewardDistribution {
            task: TaskId::from_bytes([1u8; 32]),
            total_pool: 1_000,
            network_fee: 100,
            entries: vec![entry(1, 500), entry(2, 399)],
            settled_at: 0,
            revision: 0,
        };
        assert!(matches!(
            dist.verify(),
            Err(MeritumError::SettlementImbalance {
                distributed: 899,
                fee: 100,
                pool: 1_000,
            })
        ));
    }
}
