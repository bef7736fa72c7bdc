//! # Stakes and Settlement Splits
//!
//! A [`Stake`] is the amount a worker puts at risk on a task. It moves
//! through a small status machine:
//!
//! ```text
//! Pending ──▶ Held ──┬──▶ Released   (worker keeps everything)
//!                    └──▶ Slashed    (full forfeit, or a three-way split)
//! ```
//!
//! `Released` and `Slashed` are terminal. A partial slash also ends in
//! `Slashed`; the stored shares record how it was divided. Every settling
//! operation produces a [`SettlementSplit`] whose three shares sum to the
//! stake amount exactly; the platform share takes the rounding remainder.
//!
//! Transitions here are pure: they mutate a `Stake` value and return the
//! split. The ledger decides when the new value becomes visible.

use serde::{Deserialize, Serialize};

use verdict_core::{Amount, BasisPoints, Currency, StakeId, TaskId, Timestamp, UserId};

use crate::error::StakeError;

// ── Stake Status ───────────────────────────────────────────────────────

/// Lifecycle status of a stake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StakeStatus {
    /// Created, funds not yet confirmed.
    Pending,
    /// Funds held against the task.
    Held,
    /// Returned in full to the worker. Terminal.
    Released,
    /// Forfeited in full or in part. Terminal.
    Slashed,
}

impl StakeStatus {
    /// Whether no further operations are permitted.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Released | Self::Slashed)
    }

    /// The canonical string name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Held => "held",
            Self::Released => "released",
            Self::Slashed => "slashed",
        }
    }
}

impl std::fmt::Display for StakeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Splits ─────────────────────────────────────────────────────────────

/// How a settled stake was divided.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SettlementSplit {
    /// Returned to the worker.
    pub worker_return: Amount,
    /// Paid to the requester.
    pub requester_share: Amount,
    /// Retained by the platform, including the rounding remainder.
    pub platform_share: Amount,
}

impl SettlementSplit {
    /// Everything back to the worker.
    pub fn release(amount: Amount) -> Self {
        Self {
            worker_return: amount,
            ..Self::default()
        }
    }

    /// Nothing back to the worker; `requester_share` of the stake to the
    /// requester and the rest to the platform.
    pub fn full_slash(amount: Amount, requester_share: BasisPoints) -> Self {
        let requester = amount.apply_bps(requester_share);
        Self {
            worker_return: Amount::ZERO,
            requester_share: requester,
            platform_share: amount.saturating_sub(requester),
        }
    }

    /// Three-way split. Fails if the two explicit fractions exceed 100%.
    pub fn partial(
        amount: Amount,
        worker_return: BasisPoints,
        requester_share: BasisPoints,
    ) -> Result<Self, StakeError> {
        if worker_return.checked_add(requester_share).is_none() {
            return Err(StakeError::SplitExceedsTotal {
                worker_return,
                requester_share,
            });
        }
        let worker = amount.apply_bps(worker_return);
        let requester = amount.apply_bps(requester_share);
        Ok(Self {
            worker_return: worker,
            requester_share: requester,
            platform_share: amount.saturating_sub(worker).saturating_sub(requester),
        })
    }

    /// Sum of all three shares.
    pub fn total(&self) -> Amount {
        [self.worker_return, self.requester_share, self.platform_share]
            .into_iter()
            .sum()
    }
}

// ── Stake ──────────────────────────────────────────────────────────────

/// Input for creating a stake.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakeRequest {
    /// The task being claimed.
    pub task_id: TaskId,
    /// The claiming worker.
    pub worker_id: UserId,
    /// The task's requester, recipient of any slashed requester share.
    pub requester_id: UserId,
    /// The task bounty the stake is computed from.
    pub bounty: Amount,
    /// Worker strike count at claim time.
    pub strike_count: u32,
    /// Worker reputation (0 to 100) at claim time.
    pub reputation: u8,
    /// Settlement currency.
    #[serde(default)]
    pub currency: Currency,
}

/// A worker's stake on a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stake {
    /// Stake identifier.
    pub id: StakeId,
    /// The task.
    pub task_id: TaskId,
    /// The staking worker.
    pub worker_id: UserId,
    /// The task requester.
    pub requester_id: UserId,
    /// Amount at risk.
    pub amount: Amount,
    /// Bounty at creation.
    pub bounty_amount: Amount,
    /// Fraction of the bounty staked.
    pub stake_percentage: BasisPoints,
    /// Strike count used for the calculation.
    pub strike_count_at_creation: u32,
    /// Reputation used for the calculation.
    pub reputation_at_creation: u8,
    /// Current status.
    pub status: StakeStatus,
    /// Paid to the requester on settlement.
    pub requester_share: Amount,
    /// Returned to the worker on settlement.
    pub worker_return: Amount,
    /// Retained by the platform on settlement.
    pub platform_share: Amount,
    /// Settlement currency.
    pub currency: Currency,
    /// Creation time.
    pub created_at: Timestamp,
    /// Settlement time, set when the stake reaches a terminal status.
    pub settled_at: Option<Timestamp>,
    /// Why the stake was slashed, if it was.
    pub slash_reason: Option<String>,
}

impl Stake {
    /// A new pending stake.
    pub fn pending(
        request: &StakeRequest,
        amount: Amount,
        percentage: BasisPoints,
        now: Timestamp,
    ) -> Result<Self, StakeError> {
        if !amount.is_positive() {
            return Err(StakeError::NonPositiveAmount(amount));
        }
        Ok(Self {
            id: StakeId::new(),
            task_id: request.task_id,
            worker_id: request.worker_id,
            requester_id: request.requester_id,
            amount,
            bounty_amount: request.bounty,
            stake_percentage: percentage,
            strike_count_at_creation: request.strike_count,
            reputation_at_creation: request.reputation,
            status: StakeStatus::Pending,
            requester_share: Amount::ZERO,
            worker_return: Amount::ZERO,
            platform_share: Amount::ZERO,
            currency: request.currency.clone(),
            created_at: now,
            settled_at: None,
            slash_reason: None,
        })
    }

    fn require_status(&self, expected: StakeStatus, operation: &'static str) -> Result<(), StakeError> {
        if self.status != expected {
            return Err(StakeError::InvalidStatus {
                stake_id: self.id,
                operation,
                status: self.status.as_str().to_string(),
            });
        }
        Ok(())
    }

    /// Pending → Held.
    pub fn hold(&mut self) -> Result<(), StakeError> {
        self.require_status(StakeStatus::Pending, "hold")?;
        self.status = StakeStatus::Held;
        Ok(())
    }

    /// Held → Released.
    pub fn release(&mut self, now: Timestamp) -> Result<SettlementSplit, StakeError> {
        self.require_status(StakeStatus::Held, "release")?;
        let split = SettlementSplit::release(self.amount);
        self.apply(StakeStatus::Released, split, None, now);
        Ok(split)
    }

    /// Held → Slashed.
    pub fn slash(
        &mut self,
        requester_share: BasisPoints,
        reason: &str,
        now: Timestamp,
    ) -> Result<SettlementSplit, StakeError> {
        self.require_status(StakeStatus::Held, "slash")?;
        let split = SettlementSplit::full_slash(self.amount, requester_share);
        self.apply(StakeStatus::Slashed, split, Some(reason), now);
        Ok(split)
    }

    /// Held → Slashed, with part of the stake returned to the worker.
    pub fn partial_slash(
        &mut self,
        worker_return: BasisPoints,
        requester_share: BasisPoints,
        reason: &str,
        now: Timestamp,
    ) -> Result<SettlementSplit, StakeError> {
        self.require_status(StakeStatus::Held, "partial_slash")?;
        let split = SettlementSplit::partial(self.amount, worker_return, requester_share)?;
        self.apply(StakeStatus::Slashed, split, Some(reason), now);
        Ok(split)
    }

    fn apply(
        &mut self,
        status: StakeStatus,
        split: SettlementSplit,
        reason: Option<&str>,
        now: Timestamp,
    ) {
        self.status = status;
        self.worker_return = split.worker_return;
        self.requester_share = split.requester_share;
        self.platform_share = split.platform_share;
        self.settled_at = Some(now);
        self.slash_reason = reason.map(str::to_string);
    }

    /// The recorded split. All zero until settled.
    pub fn split(&self) -> SettlementSplit {
        SettlementSplit {
            worker_return: self.worker_return,
            requester_share: self.requester_share,
            platform_share: self.platform_share,
        }
    }

    /// The settlement summary, once terminal.
    pub fn result(&self) -> Option<StakeResult> {
        let settled_at = self.settled_at?;
        self.status.is_terminal().then(|| StakeResult {
            stake_id: self.id,
            task_id: self.task_id,
            worker_id: self.worker_id,
            status: self.status,
            amount: self.amount,
            worker_return: self.worker_return,
            requester_share: self.requester_share,
            platform_share: self.platform_share,
            settled_at,
        })
    }
}

/// Summary of a settled stake, attached to resolution events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakeResult {
    /// Stake identifier.
    pub stake_id: StakeId,
    /// The task.
    pub task_id: TaskId,
    /// The worker.
    pub worker_id: UserId,
    /// Terminal status.
    pub status: StakeStatus,
    /// Original amount.
    pub amount: Amount,
    /// Returned to the worker.
    pub worker_return: Amount,
    /// Paid to the requester.
    pub requester_share: Amount,
    /// Retained by the platform.
    pub platform_share: Amount,
    /// Settlement time.
    pub settled_at: Timestamp,
}
