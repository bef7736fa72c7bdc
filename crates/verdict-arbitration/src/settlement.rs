//! # Stake Settlement Plans and Retry Queue
//!
//! A decision maps to one of three stake operations:
//!
//! | decision              | operation                                   |
//! |-----------------------|---------------------------------------------|
//! | worker wins, no split | release                                     |
//! | requester wins        | slash, requester gets the configured share  |
//! | split `p`%            | partial slash, see below                    |
//!
//! For a split the worker gets back `p × 100` bps of the stake; the
//! forfeited part (`10000 − p × 100`) is shared between requester and
//! platform in the same ratio as a full slash.
//!
//! Settlement that cannot happen now (deferred behind an appeal window, or
//! failed at the provider) sits in the [`SettlementQueue`] keyed by
//! `(task, worker)`. A worker claims an entry before applying it; a claimed
//! entry cannot be withdrawn, so an appeal and a retry never both win.
//!
//! Applying a plan is idempotent: a stake whose status and stored split
//! match the plan counts as settled. A stake settled any other way is
//! reported as [`StakeError::AlreadySettled`].

use serde::{Deserialize, Serialize};

use verdict_core::{Amount, BasisPoints, DisputeId, TaskId, Timestamp, UserId};
use verdict_stake::{SettlementProvider, SettlementSplit, Stake, StakeError, StakeStatus};

use crate::dispute::{Decision, Outcome};
use crate::error::ArbitrationError;
use crate::store::Store;

/// The stake operation a decision calls for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "operation", rename_all = "snake_case")]
pub enum SettlementPlan {
    /// Return the stake.
    Release,
    /// Forfeit the stake.
    Slash {
        /// Requester's share of the stake.
        requester_share: BasisPoints,
    },
    /// Split the stake.
    PartialSlash {
        /// Worker's share of the stake.
        worker_return: BasisPoints,
        /// Requester's share of the stake.
        requester_share: BasisPoints,
    },
}

impl SettlementPlan {
    /// Plan for a decision, given the requester's share of a full slash.
    pub fn for_decision(decision: &Decision, slash_requester_share: BasisPoints) -> Result<Self, ArbitrationError> {
        decision.validate()?;
        Ok(match (decision.split_percentage, decision.outcome) {
            (Some(pct), _) => {
                let worker_return = BasisPoints::from_percent(u32::from(pct))?;
                SettlementPlan::PartialSlash {
                    worker_return,
                    requester_share: worker_return.complement().scale(slash_requester_share),
                }
            }
            (None, Outcome::WorkerWins) => SettlementPlan::Release,
            (None, Outcome::RequesterWins) => SettlementPlan::Slash {
                requester_share: slash_requester_share,
            },
        })
    }

    /// Stake status once the plan has been applied.
    pub fn target_status(&self) -> StakeStatus {
        match self {
            Self::Release => StakeStatus::Released,
            Self::Slash { .. } | Self::PartialSlash { .. } => StakeStatus::Slashed,
        }
    }

    /// Whether `stake` already carries this plan's outcome.
    pub fn is_applied_to(&self, stake: &Stake) -> Result<bool, StakeError> {
        Ok(stake.status == self.target_status() && stake.split() == self.split(stake.amount)?)
    }

    /// How the plan would divide a stake of `amount`.
    pub fn split(&self, amount: Amount) -> Result<SettlementSplit, StakeError> {
        match *self {
            Self::Release => Ok(SettlementSplit::release(amount)),
            Self::Slash { requester_share } => Ok(SettlementSplit::full_slash(amount, requester_share)),
            Self::PartialSlash {
                worker_return,
                requester_share,
            } => SettlementSplit::partial(amount, worker_return, requester_share),
        }
    }

    /// Apply through `provider`.
    ///
    /// Returns `None` if the worker has no stake on the task, and the
    /// current stake unchanged if the plan was already applied. Fails with
    /// [`StakeError::AlreadySettled`] if the stake was settled differently.
    pub fn apply(
        &self,
        provider: &dyn SettlementProvider,
        task_id: &TaskId,
        worker_id: &UserId,
        reason: &str,
    ) -> Result<Option<Stake>, StakeError> {
        let Some(current) = provider.get_stake(task_id, worker_id)? else {
            return Ok(None);
        };
        if self.is_applied_to(&current)? {
            return Ok(Some(current));
        }
        if current.status.is_terminal() {
            return Err(StakeError::AlreadySettled {
                stake_id: current.id,
                status: current.status.as_str().to_string(),
            });
        }
        let settled = match *self {
            Self::Release => provider.release_stake(task_id, worker_id, reason)?,
            Self::Slash { requester_share } => provider.slash_stake(task_id, worker_id, requester_share, reason)?,
            Self::PartialSlash {
                worker_return,
                requester_share,
            } => provider.partial_slash(task_id, worker_id, worker_return, requester_share, reason)?,
        };
        Ok(Some(settled))
    }
}

/// A settlement waiting to be applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingSettlement {
    /// Dispute that produced it, if any.
    pub dispute_id: Option<DisputeId>,
    /// The task.
    pub task_id: TaskId,
    /// The staking worker.
    pub worker_id: UserId,
    /// What to do.
    pub plan: SettlementPlan,
    /// Reason recorded on the ledger.
    pub reason: String,
    /// Not due until strictly after this instant.
    pub deferred_until: Option<Timestamp>,
    /// Failed attempts so far.
    pub attempts: u32,
    /// Most recent failure.
    pub last_error: Option<String>,
    /// When it was queued.
    pub queued_at: Timestamp,
    /// Claimed by a worker that is applying it now.
    #[serde(default)]
    pub in_flight: bool,
}

impl PendingSettlement {
    /// Whether the settlement may be attempted at `now`.
    pub fn is_due(&self, now: Timestamp) -> bool {
        self.deferred_until.map_or(true, |until| now.is_past(&until))
    }
}

/// Pending settlements, one per stake.
#[derive(Debug, Clone, Default)]
pub struct SettlementQueue {
    pending: Store<(TaskId, UserId), PendingSettlement>,
}

impl SettlementQueue {
    /// Empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue or replace the settlement for a stake.
    pub fn enqueue(&self, pending: PendingSettlement) {
        let key = (pending.task_id, pending.worker_id);
        if let Some(previous) = self.pending.insert(key, pending) {
            tracing::debug!(task_id = %previous.task_id, "replaced pending settlement");
        }
    }

    /// Drop the settlement for a stake, returning it.
    pub fn cancel(&self, task_id: &TaskId, worker_id: &UserId) -> Option<PendingSettlement> {
        self.pending.remove(&(*task_id, *worker_id))
    }

    /// Claim a settlement for applying. `None` if it is absent or already
    /// claimed.
    pub fn claim(&self, task_id: &TaskId, worker_id: &UserId) -> Option<PendingSettlement> {
        self.pending
            .try_update(&(*task_id, *worker_id), |p| {
                if p.in_flight {
                    return Err(());
                }
                p.in_flight = true;
                Ok(p.clone())
            })
            .and_then(Result::ok)
    }

    /// Remove a settlement nobody has claimed. `None` if it is absent or
    /// being applied.
    pub fn withdraw(&self, task_id: &TaskId, worker_id: &UserId) -> Option<PendingSettlement> {
        self.pending.remove_if(&(*task_id, *worker_id), |p| !p.in_flight)
    }

    /// The settlement for a stake.
    pub fn get(&self, task_id: &TaskId, worker_id: &UserId) -> Option<PendingSettlement> {
        self.pending.get(&(*task_id, *worker_id))
    }

    /// Every pending settlement.
    pub fn list(&self) -> Vec<PendingSettlement> {
        let mut all = self.pending.list();
        all.sort_by_key(|p| p.queued_at);
        all
    }

    /// Settlements that may be attempted at `now`, oldest first.
    pub fn due(&self, now: Timestamp) -> Vec<PendingSettlement> {
        let mut due: Vec<_> = self.pending.list().into_iter().filter(|p| p.is_due(now)).collect();
        due.sort_by_key(|p| p.queued_at);
        due
    }

    /// Record a failed attempt and release the claim. Returns the new
    /// attempt count.
    pub fn record_failure(&self, task_id: &TaskId, worker_id: &UserId, error: &str) -> Option<u32> {
        self.pending
            .try_update(&(*task_id, *worker_id), |p| -> Result<u32, ()> {
                p.attempts += 1;
                p.last_error = Some(error.to_string());
                p.in_flight = false;
                Ok(p.attempts)
            })
            .and_then(Result::ok)
    }

    /// Number of pending settlements.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Whether nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
