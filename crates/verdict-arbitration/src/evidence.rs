//! # Dispute Evidence
//!
//! Statements and files submitted by either party while the evidence window
//! is open. Items are append-only and content-addressed: the stored digest
//! lets anyone holding the original bytes prove they were not altered.

use serde::{Deserialize, Serialize};

use verdict_core::{sha256_bytes, ContentDigest, DisputeId, EvidenceId, Timestamp, UserId};

use crate::error::ArbitrationError;

/// Which side submitted an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartySide {
    /// The worker.
    Worker,
    /// The requester.
    Requester,
}

/// A piece of dispute evidence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceItem {
    /// Item identifier.
    pub id: EvidenceId,
    /// The dispute.
    pub dispute_id: DisputeId,
    /// Who submitted it.
    pub submitted_by: UserId,
    /// Their side.
    pub side: PartySide,
    /// Free-text description.
    pub description: String,
    /// SHA-256 of the content.
    pub content_digest: ContentDigest,
    /// Content length in bytes.
    pub content_len: usize,
    /// Submission time.
    pub submitted_at: Timestamp,
}

impl EvidenceItem {
    /// Build an item, hashing `content`.
    pub fn new(
        dispute_id: DisputeId,
        submitted_by: UserId,
        side: PartySide,
        description: impl Into<String>,
        content: &[u8],
        now: Timestamp,
    ) -> Self {
        Self {
            id: EvidenceId::new(),
            dispute_id,
            submitted_by,
            side,
            description: description.into(),
            content_digest: sha256_bytes(content),
            content_len: content.len(),
            submitted_at: now,
        }
    }

    /// Check `content` against the stored digest.
    pub fn verify(&self, content: &[u8]) -> Result<(), ArbitrationError> {
        let actual = sha256_bytes(content);
        if actual != self.content_digest || content.len() != self.content_len {
            return Err(ArbitrationError::EvidenceIntegrityViolation {
                evidence_id: self.id,
                expected: self.content_digest.to_string(),
                actual: actual.to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_matches_content() {
        let item = EvidenceItem::new(
            DisputeId::new(),
            UserId::new(),
            PartySide::Worker,
            "photo of finished fence",
            b"jpeg bytes",
            Timestamp::now(),
        );
        assert_eq!(item.content_digest, sha256_bytes(b"jpeg bytes"));
        assert!(item.verify(b"jpeg bytes").is_ok());
        assert!(item.verify(b"edited bytes").is_err());
    }
}
