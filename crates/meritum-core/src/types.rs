use serde::{Deserialize, Serialize};
use std::fmt;

/// Reward amount in merits (1 MER = 1_000_000 merits). u128 leaves headroom
/// for any realistic pool size without overflow in proportional splits.
pub type Amount = u128;

/// Unix timestamp (seconds, UTC).
pub type Timestamp = i64;

/// Quality score on the fixed 0–100 integer scale.
pub type Score = u8;

/// Confidence on the fixed 0.0–1.0 scale.
pub type Confidence = f64;

/// Ratio expressed in basis points (10_000 = 100%).
pub type BasisPoints = u32;

// ── ParticipantId ────────────────────────────────────────────────────────────

/// 32-byte participant identifier (account hash assigned by the marketplace).
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ParticipantId(pub [u8; 32]);

impl ParticipantId {
    pub fn from_bytes(b: [u8; 32]) -> Self {
        Self(b)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Base-58 encoded string representation.
    pub fn to_b58(&self) -> String {
        bs58::encode(&self.0).into_string()
    }

    pub fn from_b58(s: &str) -> Result<Self, bs58::decode::Error> {
        let bytes = bs58::decode(s).into_vec()?;
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| bs58::decode::Error::BufferTooSmall)?;
        Ok(Self(arr))
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_b58())
    }
}

impl fmt::Debug for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ParticipantId({})", &self.to_b58()[..8])
    }
}

// ── TaskId ───────────────────────────────────────────────────────────────────

/// 32-byte task identifier: BLAKE3 of (publisher ‖ published_at ‖ title).
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TaskId(pub [u8; 32]);

impl TaskId {
    pub fn from_bytes(b: [u8; 32]) -> Self {
        Self(b)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn derive(publisher: &ParticipantId, published_at: Timestamp, title: &str) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(publisher.as_bytes());
        hasher.update(&published_at.to_le_bytes());
        hasher.update(title.as_bytes());
        Self(*hasher.finalize().as_bytes())
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let bytes = hex::decode(s)?;
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| hex::FromHexError::InvalidStringLength)?;
        Ok(Self(arr))
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TaskId({}…)", &self.to_hex()[..16])
    }
}

// ── SubmissionId ─────────────────────────────────────────────────────────────

/// 32-byte submission identifier: BLAKE3 of (task ‖ participant ‖ submitted_at).
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SubmissionId(pub [u8; 32]);

impl SubmissionId {
    pub fn from_bytes(b: [u8; 32]) -> Self {
        Self(b)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn derive(task: &TaskId, participant: &ParticipantId, submitted_at: Timestamp) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(task.as_bytes());
        hasher.update(participant.as_bytes());
        hasher.update(&submitted_at.to_le_bytes());
        Self(*hasher.finalize().as_bytes())
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for SubmissionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for SubmissionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SubmissionId({}…)", &self.to_hex()[..16])
    }
}

// ── ContentHash ──────────────────────────────────────────────────────────────

/// 32-byte BLAKE3 fingerprint of submission content. The core never sees
/// plaintext unless the external content source hands bytes back for
/// analysis; this hash is the opaque handle it passes around.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ContentHash(pub [u8; 32]);

impl ContentHash {
    pub fn of(bytes: &[u8]) -> Self {
        Self(*blake3::hash(bytes).as_bytes())
    }

    pub fn from_bytes(b: [u8; 32]) -> Self {
        Self(b)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentHash({}…)", &self.to_hex()[..16])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn participant_id_b58_round_trip() {
        let id = ParticipantId::from_bytes([7u8; 32]);
        let b58 = id.to_b58();
        let back = ParticipantId::from_b58(&b58).unwrap();
        assert_eq!(id, back);
    }

    #[test]
    fn task_id_derivation_is_stable() {
        let p = ParticipantId::from_bytes([1u8; 32]);
        let a = TaskId::derive(&p, 1_000, "optimize the scheduler");
        let b = TaskId::derive(&p, 1_000, "optimize the scheduler");
        let c = TaskId::derive(&p, 1_001, "optimize the scheduler");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn content_hash_matches_blake3() {
        let h = ContentHash::of(b"fn main() {}");
        assert_eq!(h.as_bytes(), blake3::hash(b"fn main() {}").as_bytes());
    }

    #[test]
    fn short_b58_input_is_an_error_not_a_panic() {
        assert!(ParticipantId::from_b58("z").is_err());
        assert!(ParticipantId::from_b58("").is_err());
    }

    #[test]
    fn wrong_length_hex_input_is_an_error_not_a_panic() {
        assert!(TaskId::from_hex("abcd").is_err());
        assert!(TaskId::from_hex(&"ff".repeat(33)).is_err());
    }
}
