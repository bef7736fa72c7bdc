//! # Arbitration Events
//!
//! Outbound notifications for downstream consumers (notifications,
//! webhooks, payouts). Delivery is the sink's concern; the engine publishes
//! after the state change has committed and never waits on a consumer.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use verdict_core::{Amount, DisputeId, SubmissionId, TaskId, Timestamp, UserId};
use verdict_stake::StakeResult;

use crate::dispute::{Actor, Outcome, ResolutionType, Tier};

/// A payment owed to one party as a result of a resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payout {
    /// Recipient.
    pub user_id: UserId,
    /// Amount of the bounty owed.
    pub amount: Amount,
    /// Recipient's primary wallet, if known.
    pub wallet: Option<String>,
}

/// What happened to the worker's stake when a dispute resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SettlementState {
    /// Settled immediately.
    Settled {
        /// The settled stake.
        result: StakeResult,
    },
    /// Held until the appeal window closes.
    Deferred {
        /// Earliest settlement time.
        until: Timestamp,
    },
    /// The provider failed; queued for retry.
    Queued {
        /// Failure reason.
        reason: String,
    },
    /// The stake was already settled under another decision; left for an
    /// operator.
    Conflict {
        /// What the provider reported.
        reason: String,
    },
    /// The worker had no held stake on the task.
    NoStake,
}

/// Published whenever a dispute reaches `resolved`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisputeResolved {
    /// The dispute.
    pub dispute_id: DisputeId,
    /// The disputed submission.
    pub submission_id: SubmissionId,
    /// The task.
    pub task_id: TaskId,
    /// Tier that decided.
    pub tier: Tier,
    /// Who prevailed.
    pub outcome: Outcome,
    /// How the task settles.
    pub resolution_type: ResolutionType,
    /// Worker's share for split decisions.
    pub split_percentage: Option<u8>,
    /// Bounty owed to the worker.
    pub worker_payout: Payout,
    /// Bounty refunded to the requester.
    pub requester_refund: Payout,
    /// Stake settlement.
    pub settlement: SettlementState,
    /// When the decision was made.
    pub resolved_at: Timestamp,
}

/// Everything the engine announces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ArbitrationEvent {
    /// A worker opened a dispute.
    DisputeOpened {
        /// The dispute.
        dispute_id: DisputeId,
        /// The disputed submission.
        submission_id: SubmissionId,
        /// The worker.
        worker_id: UserId,
        /// Evidence window close.
        evidence_deadline: Timestamp,
    },
    /// A dispute moved up a tier.
    DisputeEscalated {
        /// The dispute.
        dispute_id: DisputeId,
        /// Tier before.
        from_tier: Tier,
        /// Tier after.
        to_tier: Tier,
        /// Who escalated.
        actor: Actor,
        /// When.
        at: Timestamp,
    },
    /// A decision was recorded.
    DisputeResolved(DisputeResolved),
    /// The losing party appealed a jury decision.
    DisputeAppealed {
        /// The dispute.
        dispute_id: DisputeId,
        /// The appellant.
        appellant_id: UserId,
        /// Appeal stake held.
        stake: Amount,
        /// When.
        at: Timestamp,
    },
    /// A stake reached a terminal status.
    StakeSettled {
        /// The dispute that drove it, if any.
        dispute_id: Option<DisputeId>,
        /// The settled stake.
        result: StakeResult,
    },
    /// A settlement attempt failed and was queued.
    SettlementFailed {
        /// The dispute.
        dispute_id: DisputeId,
        /// The task.
        task_id: TaskId,
        /// Attempts so far.
        attempts: u32,
        /// Failure reason.
        reason: String,
    },
}

impl ArbitrationEvent {
    /// Event name for logs and routing.
    pub fn name(&self) -> &'static str {
        match self {
            Self::DisputeOpened { .. } => "dispute_opened",
            Self::DisputeEscalated { .. } => "dispute_escalated",
            Self::DisputeResolved(_) => "dispute_resolved",
            Self::DisputeAppealed { .. } => "dispute_appealed",
            Self::StakeSettled { .. } => "stake_settled",
            Self::SettlementFailed { .. } => "settlement_failed",
        }
    }
}

/// Receives published events.
pub trait EventSink: Send + Sync {
    /// Deliver one event. Must not block on slow consumers.
    fn publish(&self, event: ArbitrationEvent);
}

/// Logs each event as structured JSON.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn publish(&self, event: ArbitrationEvent) {
        match serde_json::to_string(&event) {
            Ok(payload) => tracing::info!(event = event.name(), %payload, "arbitration event"),
            Err(e) => tracing::warn!(event = event.name(), error = %e, "event not serializable"),
        }
    }
}

/// Keeps every event in memory.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<ArbitrationEvent>>,
}

impl RecordingSink {
    /// Empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything published so far, in order.
    pub fn events(&self) -> Vec<ArbitrationEvent> {
        self.events.lock().clone()
    }

    /// Only the resolution events.
    pub fn resolutions(&self) -> Vec<DisputeResolved> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                ArbitrationEvent::DisputeResolved(r) => Some(r.clone()),
                _ => None,
            })
            .collect()
    }
}

impl EventSink for RecordingSink {
    fn publish(&self, event: ArbitrationEvent) {
        self.events.lock().push(event);
    }
}
