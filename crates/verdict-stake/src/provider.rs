//! # Settlement Providers
//!
//! The arbitration engine moves stake money only through the
//! [`SettlementProvider`] trait, so the backend can be swapped without
//! touching resolution logic. Two implementations ship:
//!
//! - [`LedgerSettlement`]: settles directly against the in-process
//!   [`StakeLedger`]. Used in development, tests and single-node setups.
//! - [`HttpSettlementProvider`](crate::http::HttpSettlementProvider):
//!   instructs an external custody service, then mirrors the result into
//!   the local ledger.
//!
//! The trait is synchronous and object-safe; callers hold an
//! `Arc<dyn SettlementProvider>`.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use verdict_core::{Amount, BasisPoints, TaskId, UserId};

use crate::error::StakeError;
use crate::ledger::StakeLedger;
use crate::stake::{Stake, StakeRequest};

/// Whether a worker can cover a stake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Allowance {
    /// Funds the worker has available.
    pub available: Amount,
    /// The amount asked about.
    pub required: Amount,
    /// `available >= required`.
    pub sufficient: bool,
}

impl Allowance {
    /// Compare available funds against a requirement.
    pub fn evaluate(available: Amount, required: Amount) -> Self {
        Self {
            available,
            required,
            sufficient: available >= required,
        }
    }
}

/// Money-moving backend for stakes.
pub trait SettlementProvider: Send + Sync {
    /// Short name used in logs and errors.
    fn provider_name(&self) -> &str;

    /// Create and hold a stake.
    fn create_stake(&self, request: &StakeRequest) -> Result<Stake, StakeError>;

    /// Return the full stake to the worker.
    fn release_stake(&self, task_id: &TaskId, worker_id: &UserId, reason: &str) -> Result<Stake, StakeError>;

    /// Forfeit the full stake.
    fn slash_stake(
        &self,
        task_id: &TaskId,
        worker_id: &UserId,
        requester_share: BasisPoints,
        reason: &str,
    ) -> Result<Stake, StakeError>;

    /// Three-way split.
    fn partial_slash(
        &self,
        task_id: &TaskId,
        worker_id: &UserId,
        worker_return: BasisPoints,
        requester_share: BasisPoints,
        reason: &str,
    ) -> Result<Stake, StakeError>;

    /// Current stake, if any.
    fn get_stake(&self, task_id: &TaskId, worker_id: &UserId) -> Result<Option<Stake>, StakeError>;

    /// Whether `worker_id` can cover `amount`.
    fn check_allowance(&self, worker_id: &UserId, amount: Amount) -> Result<Allowance, StakeError>;
}

// ── Balances ───────────────────────────────────────────────────────────

/// Source of worker balances for allowance checks.
pub trait BalanceDirectory: Send + Sync {
    /// Funds currently available to the user.
    fn available_balance(&self, user_id: &UserId) -> Result<Amount, StakeError>;
}

/// Balances held in memory. Unknown users have zero.
#[derive(Debug, Default)]
pub struct InMemoryBalances {
    balances: RwLock<HashMap<UserId, Amount>>,
}

impl InMemoryBalances {
    /// Empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a user's available balance.
    pub fn set_balance(&self, user_id: UserId, amount: Amount) {
        self.balances.write().insert(user_id, amount);
    }
}

impl BalanceDirectory for InMemoryBalances {
    fn available_balance(&self, user_id: &UserId) -> Result<Amount, StakeError> {
        Ok(self.balances.read().get(user_id).copied().unwrap_or(Amount::ZERO))
    }
}

// ── Ledger-backed provider ─────────────────────────────────────────────

/// Settles directly against the local [`StakeLedger`].
#[derive(Clone)]
pub struct LedgerSettlement {
    ledger: Arc<StakeLedger>,
    balances: Arc<dyn BalanceDirectory>,
}

impl std::fmt::Debug for LedgerSettlement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LedgerSettlement")
            .field("ledger", &self.ledger)
            .finish_non_exhaustive()
    }
}

impl LedgerSettlement {
    /// Wrap a ledger and balance source.
    pub fn new(ledger: Arc<StakeLedger>, balances: Arc<dyn BalanceDirectory>) -> Self {
        Self { ledger, balances }
    }

    /// The underlying ledger.
    pub fn ledger(&self) -> &Arc<StakeLedger> {
        &self.ledger
    }
}

impl SettlementProvider for LedgerSettlement {
    fn provider_name(&self) -> &str {
        "ledger"
    }

    fn create_stake(&self, request: &StakeRequest) -> Result<Stake, StakeError> {
        self.ledger.create_stake(request)
    }

    fn release_stake(&self, task_id: &TaskId, worker_id: &UserId, reason: &str) -> Result<Stake, StakeError> {
        self.ledger.release_stake(task_id, worker_id, reason)
    }

    fn slash_stake(
        &self,
        task_id: &TaskId,
        worker_id: &UserId,
        requester_share: BasisPoints,
        reason: &str,
    ) -> Result<Stake, StakeError> {
        self.ledger.slash_stake(task_id, worker_id, requester_share, reason)
    }

    fn partial_slash(
        &self,
        task_id: &TaskId,
        worker_id: &UserId,
        worker_return: BasisPoints,
        requester_share: BasisPoints,
        reason: &str,
    ) -> Result<Stake, StakeError> {
        self.ledger
            .partial_slash(task_id, worker_id, worker_return, requester_share, reason)
    }

    fn get_stake(&self, task_id: &TaskId, worker_id: &UserId) -> Result<Option<Stake>, StakeError> {
        Ok(self.ledger.get_stake(task_id, worker_id))
    }

    fn check_allowance(&self, worker_id: &UserId, amount: Amount) -> Result<Allowance, StakeError> {
        let available = self.balances.available_balance(worker_id)?;
        Ok(Allowance::evaluate(available, amount))
    }
}
