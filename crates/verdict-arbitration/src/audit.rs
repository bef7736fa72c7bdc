//! # Audit Trail
//!
//! Append-only, tamper-evident record of every decision the engine makes.
//! Each entry's hash covers its content and the previous entry's hash, so
//! editing or dropping any entry breaks every hash after it.
//!
//! The first entry chains from [`ContentDigest::ZERO`].

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use verdict_core::{sha256_json, ContentDigest, DisputeId, Timestamp};

use crate::dispute::Actor;
use crate::error::ArbitrationError;

/// What an audit entry records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    /// Dispute opened and evidence window started.
    DisputeOpened,
    /// Evidence item stored.
    EvidenceSubmitted,
    /// Tier-1 score recorded.
    AutoScored,
    /// Moved up a tier.
    Escalated,
    /// Jury seated.
    JurySeated,
    /// Juror voted.
    VoteCast,
    /// Decision recorded.
    Resolved,
    /// Jury decision appealed.
    Appealed,
    /// Appeal stake returned or forfeited.
    AppealStakeSettled,
    /// Worker stake settled.
    StakeSettled,
    /// Settlement deferred until the appeal window closes.
    SettlementDeferred,
    /// Settlement failed and was queued.
    SettlementQueued,
    /// Settlement or status update failed after the decision committed.
    RemediationRequired,
}

/// One audit record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Position in the log, from 0.
    pub sequence: u64,
    /// The dispute concerned.
    pub dispute_id: DisputeId,
    /// What happened.
    pub action: AuditAction,
    /// Who did it.
    pub actor: Actor,
    /// Structured detail.
    pub details: serde_json::Value,
    /// When it was recorded.
    pub recorded_at: Timestamp,
    /// Hash of the previous entry.
    pub previous_hash: ContentDigest,
    /// Hash of this entry.
    pub entry_hash: ContentDigest,
}

#[derive(Serialize)]
struct HashedFields<'a> {
    sequence: u64,
    dispute_id: &'a DisputeId,
    action: AuditAction,
    actor: &'a Actor,
    details: &'a serde_json::Value,
    recorded_at: &'a Timestamp,
    previous_hash: &'a ContentDigest,
}

impl AuditEntry {
    fn compute_hash(&self) -> Result<ContentDigest, ArbitrationError> {
        Ok(sha256_json(&HashedFields {
            sequence: self.sequence,
            dispute_id: &self.dispute_id,
            action: self.action,
            actor: &self.actor,
            details: &self.details,
            recorded_at: &self.recorded_at,
            previous_hash: &self.previous_hash,
        })?)
    }
}

/// The hash-chained log.
///
/// A single lock serializes appends so the chain has one order.
#[derive(Debug, Default)]
pub struct AuditLog {
    entries: Mutex<Vec<AuditEntry>>,
}

impl AuditLog {
    /// Empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry and return it.
    pub fn append(
        &self,
        dispute_id: DisputeId,
        action: AuditAction,
        actor: Actor,
        details: serde_json::Value,
        now: Timestamp,
    ) -> Result<AuditEntry, ArbitrationError> {
        let mut entries = self.entries.lock();
        let previous_hash = entries.last().map(|e| e.entry_hash).unwrap_or(ContentDigest::ZERO);
        let mut entry = AuditEntry {
            sequence: entries.len() as u64,
            dispute_id,
            action,
            actor,
            details,
            recorded_at: now,
            previous_hash,
            entry_hash: ContentDigest::ZERO,
        };
        entry.entry_hash = entry.compute_hash()?;
        entries.push(entry.clone());
        Ok(entry)
    }

    /// Every entry, in order.
    pub fn entries(&self) -> Vec<AuditEntry> {
        self.entries.lock().clone()
    }

    /// Entries for one dispute, in order.
    pub fn entries_for(&self, dispute_id: &DisputeId) -> Vec<AuditEntry> {
        self.entries
            .lock()
            .iter()
            .filter(|e| e.dispute_id == *dispute_id)
            .cloned()
            .collect()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether the log is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Recompute every hash and check every link.
    pub fn verify_chain(&self) -> Result<(), ArbitrationError> {
        verify_entries(&self.entries.lock())
    }
}

/// Verify a sequence of entries read back from storage.
pub fn verify_entries(entries: &[AuditEntry]) -> Result<(), ArbitrationError> {
    let mut previous = ContentDigest::ZERO;
    for (index, entry) in entries.iter().enumerate() {
        let broken = |reason: String| ArbitrationError::AuditChainBroken {
            sequence: entry.sequence,
            reason,
        };
        if entry.sequence != index as u64 {
            return Err(broken(format!("expected sequence {index}")));
        }
        if entry.previous_hash != previous {
            return Err(broken("previous hash does not match".into()));
        }
        if entry.compute_hash()? != entry.entry_hash {
            return Err(broken("entry hash does not match content".into()));
        }
        previous = entry.entry_hash;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn log_with(n: usize) -> (AuditLog, DisputeId) {
        let log = AuditLog::new();
        let id = DisputeId::new();
        for i in 0..n {
            log.append(id, AuditAction::VoteCast, Actor::System, json!({ "i": i }), Timestamp::now())
                .unwrap();
        }
        (log, id)
    }

    #[test]
    fn first_entry_chains_from_zero() {
        let (log, _) = log_with(1);
        assert_eq!(log.entries()[0].previous_hash, ContentDigest::ZERO);
        assert!(log.verify_chain().is_ok());
    }

    #[test]
    fn links_follow_previous_hash() {
        let (log, id) = log_with(3);
        let entries = log.entries_for(&id);
        assert_eq!(entries[1].previous_hash, entries[0].entry_hash);
        assert_eq!(entries[2].previous_hash, entries[1].entry_hash);
    }

    #[test]
    fn edited_details_detected() {
        let (log, _) = log_with(3);
        let mut entries = log.entries();
        entries[1].details = json!({ "i": 99 });
        let err = verify_entries(&entries).unwrap_err();
        assert!(matches!(err, ArbitrationError::AuditChainBroken { sequence: 1, .. }));
    }

    #[test]
    fn dropped_entry_detected() {
        let (log, _) = log_with(3);
        let mut entries = log.entries();
        entries.remove(1);
        assert!(verify_entries(&entries).is_err());
    }
}
