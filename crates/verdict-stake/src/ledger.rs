//! # Stake Ledger
//!
//! In-process record of every stake and every money movement against it.
//!
//! ## Atomicity
//!
//! State is partitioned per task: each [`TaskId`] owns one account holding
//! its stakes, its appeal stakes, and its ledger entries. A stake status
//! change and the entries it produces are computed on a copy and committed
//! together while the task's map entry is locked, so no reader ever
//! observes a terminal stake without its entries (or the reverse). Unrelated
//! tasks never contend.
//!
//! ## Conservation
//!
//! For every settled stake, the debit entries written against it sum to the
//! stake amount. Zero-amount shares are not written.

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::json;

use verdict_core::{
    Amount, BasisPoints, Clock, Currency, DisputeId, LedgerEntryId, StakeId, TaskId, Timestamp,
    UserId,
};

use crate::error::StakeError;
use crate::policy::StakePolicy;
use crate::stake::{SettlementSplit, Stake, StakeRequest, StakeResult, StakeStatus};

// ── Ledger Entries ─────────────────────────────────────────────────────

/// What a ledger entry records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryType {
    /// Worker funds moved into the stake.
    StakeHeld,
    /// Stake returned in full to the worker.
    StakeReleased,
    /// Worker's retained portion of a partially slashed stake.
    ReturnedToWorker,
    /// Slashed portion paid to the requester.
    SlashedToRequester,
    /// Slashed portion retained by the platform.
    SlashedToPlatform,
    /// Appellant funds moved into an appeal stake.
    AppealStakeHeld,
    /// Appeal stake returned to a successful appellant.
    AppealStakeReturned,
    /// Appeal stake forfeited to the platform.
    AppealStakeForfeited,
}

/// Whether money enters (credit) or leaves (debit) escrow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Into escrow.
    Credit,
    /// Out of escrow.
    Debit,
}

/// The other side of a ledger movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "user_id", rename_all = "snake_case")]
pub enum Counterparty {
    /// A platform user.
    User(UserId),
    /// The platform itself.
    Platform,
}

/// An append-only ledger record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Entry identifier.
    pub id: LedgerEntryId,
    /// The task the movement belongs to.
    pub task_id: TaskId,
    /// The stake, for worker-stake movements.
    pub stake_id: Option<StakeId>,
    /// The dispute, for appeal-stake movements.
    pub dispute_id: Option<DisputeId>,
    /// What happened.
    pub entry_type: EntryType,
    /// Always positive; direction carries the sign.
    pub amount: Amount,
    /// Currency.
    pub currency: Currency,
    /// Into or out of escrow.
    pub direction: Direction,
    /// Who paid or received.
    pub counterparty: Counterparty,
    /// Free-form context (reason, operation).
    pub metadata: serde_json::Value,
    /// When it was written.
    pub created_at: Timestamp,
}

// ── Appeal Stakes ──────────────────────────────────────────────────────

/// Status of an appeal stake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppealStakeStatus {
    /// Held while the appeal is pending.
    Held,
    /// Returned to the appellant. Terminal.
    Returned,
    /// Forfeited to the platform. Terminal.
    Forfeited,
}

impl AppealStakeStatus {
    /// The canonical string name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Held => "held",
            Self::Returned => "returned",
            Self::Forfeited => "forfeited",
        }
    }
}

/// Funds an appellant puts up to reach the admin tier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppealStake {
    /// The appealed dispute.
    pub dispute_id: DisputeId,
    /// The disputed task.
    pub task_id: TaskId,
    /// The party who appealed.
    pub appellant_id: UserId,
    /// Amount held.
    pub amount: Amount,
    /// Currency.
    pub currency: Currency,
    /// Current status.
    pub status: AppealStakeStatus,
    /// When it was held.
    pub created_at: Timestamp,
    /// When it was returned or forfeited.
    pub settled_at: Option<Timestamp>,
}

// ── Strike Registry ────────────────────────────────────────────────────

/// Increments a worker's strike count when a stake is fully slashed.
pub trait StrikeRegistry: Send + Sync {
    /// Record one strike and return the new count.
    fn record_strike(&self, worker_id: &UserId) -> Result<u32, StakeError>;
}

/// Strike counts held in memory.
#[derive(Debug, Default)]
pub struct InMemoryStrikes {
    counts: DashMap<UserId, u32>,
}

impl InMemoryStrikes {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current strike count for a worker.
    pub fn count(&self, worker_id: &UserId) -> u32 {
        self.counts.get(worker_id).map(|c| *c).unwrap_or(0)
    }
}

impl StrikeRegistry for InMemoryStrikes {
    fn record_strike(&self, worker_id: &UserId) -> Result<u32, StakeError> {
        let mut count = self.counts.entry(*worker_id).or_insert(0);
        *count += 1;
        Ok(*count)
    }
}

// ── Ledger ─────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct TaskAccount {
    stakes: HashMap<UserId, Stake>,
    appeals: HashMap<DisputeId, AppealStake>,
    entries: Vec<LedgerEntry>,
}

/// Stakes, appeal stakes and their ledger entries.
pub struct StakeLedger {
    policy: StakePolicy,
    strikes: Arc<dyn StrikeRegistry>,
    clock: Arc<dyn Clock>,
    accounts: DashMap<TaskId, TaskAccount>,
}

impl std::fmt::Debug for StakeLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StakeLedger")
            .field("policy", &self.policy)
            .field("tasks", &self.accounts.len())
            .finish()
    }
}

impl StakeLedger {
    /// An empty ledger.
    pub fn new(policy: StakePolicy, strikes: Arc<dyn StrikeRegistry>, clock: Arc<dyn Clock>) -> Self {
        Self {
            policy,
            strikes,
            clock,
            accounts: DashMap::new(),
        }
    }

    /// The stake policy in force.
    pub fn policy(&self) -> &StakePolicy {
        &self.policy
    }

    /// Current time on the ledger's clock.
    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    /// Create and hold a stake for `(task, worker)`.
    ///
    /// The amount comes from the stake policy. The stake is created pending
    /// and moved to held in the same commit, together with its
    /// [`EntryType::StakeHeld`] credit.
    pub fn create_stake(&self, request: &StakeRequest) -> Result<Stake, StakeError> {
        let required = self
            .policy
            .required_stake(request.bounty, request.strike_count, request.reputation);
        let now = self.clock.now();

        let mut account = self.accounts.entry(request.task_id).or_default();
        if account.stakes.contains_key(&request.worker_id) {
            return Err(StakeError::AlreadyExists {
                task_id: request.task_id,
                worker_id: request.worker_id,
            });
        }

        let mut stake = Stake::pending(request, required.amount, required.percentage, now)?;
        stake.hold()?;
        let entry = LedgerEntry {
            id: LedgerEntryId::new(),
            task_id: stake.task_id,
            stake_id: Some(stake.id),
            dispute_id: None,
            entry_type: EntryType::StakeHeld,
            amount: stake.amount,
            currency: stake.currency.clone(),
            direction: Direction::Credit,
            counterparty: Counterparty::User(stake.worker_id),
            metadata: json!({ "stake_percentage": stake.stake_percentage.value() }),
            created_at: now,
        };
        account.entries.push(entry);
        account.stakes.insert(stake.worker_id, stake.clone());

        tracing::info!(
            stake_id = %stake.id,
            task_id = %stake.task_id,
            worker_id = %stake.worker_id,
            amount = %stake.amount,
            bps = stake.stake_percentage.value(),
            "stake held"
        );
        Ok(stake)
    }

    /// Return the full stake to the worker.
    pub fn release_stake(&self, task_id: &TaskId, worker_id: &UserId, reason: &str) -> Result<Stake, StakeError> {
        self.settle(task_id, worker_id, reason, false, |stake, now| stake.release(now))
    }

    /// Forfeit the full stake: `requester_share` to the requester, the rest
    /// to the platform. Increments the worker's strike count.
    pub fn slash_stake(
        &self,
        task_id: &TaskId,
        worker_id: &UserId,
        requester_share: BasisPoints,
        reason: &str,
    ) -> Result<Stake, StakeError> {
        self.settle(task_id, worker_id, reason, true, |stake, now| {
            stake.slash(requester_share, reason, now)
        })
    }

    /// Split the stake three ways. The stake ends `Slashed` but no strike
    /// is recorded.
    pub fn partial_slash(
        &self,
        task_id: &TaskId,
        worker_id: &UserId,
        worker_return: BasisPoints,
        requester_share: BasisPoints,
        reason: &str,
    ) -> Result<Stake, StakeError> {
        self.settle(task_id, worker_id, reason, false, |stake, now| {
            stake.partial_slash(worker_return, requester_share, reason, now)
        })
    }

    fn settle(
        &self,
        task_id: &TaskId,
        worker_id: &UserId,
        reason: &str,
        strike: bool,
        transition: impl FnOnce(&mut Stake, Timestamp) -> Result<SettlementSplit, StakeError>,
    ) -> Result<Stake, StakeError> {
        let not_found = || StakeError::NotFound {
            task_id: *task_id,
            worker_id: *worker_id,
        };
        let now = self.clock.now();
        let mut account = self.accounts.get_mut(task_id).ok_or_else(not_found)?;
        let current = account.stakes.get(worker_id).ok_or_else(not_found)?;

        let mut next = current.clone();
        let split = transition(&mut next, now)?;
        if strike {
            let strikes = self.strikes.record_strike(worker_id)?;
            tracing::info!(worker_id = %worker_id, strikes, "strike recorded");
        }

        let entries = settlement_entries(&next, split, reason, now);
        account.entries.extend(entries);
        account.stakes.insert(*worker_id, next.clone());

        tracing::info!(
            stake_id = %next.id,
            task_id = %task_id,
            status = next.status.as_str(),
            worker_return = %split.worker_return,
            requester_share = %split.requester_share,
            platform_share = %split.platform_share,
            "stake settled"
        );
        Ok(next)
    }

    /// Current stake for `(task, worker)`.
    pub fn get_stake(&self, task_id: &TaskId, worker_id: &UserId) -> Option<Stake> {
        self.accounts
            .get(task_id)
            .and_then(|account| account.stakes.get(worker_id).cloned())
    }

    /// Settlement summary, if the stake is terminal.
    pub fn stake_result(&self, task_id: &TaskId, worker_id: &UserId) -> Option<StakeResult> {
        self.get_stake(task_id, worker_id).and_then(|s| s.result())
    }

    /// Ledger entries for one task, in write order.
    pub fn entries_for_task(&self, task_id: &TaskId) -> Vec<LedgerEntry> {
        self.accounts
            .get(task_id)
            .map(|account| account.entries.clone())
            .unwrap_or_default()
    }

    /// Every ledger entry, ordered by creation time.
    pub fn all_entries(&self) -> Vec<LedgerEntry> {
        let mut entries: Vec<LedgerEntry> = self
            .accounts
            .iter()
            .flat_map(|account| account.entries.clone())
            .collect();
        entries.sort_by_key(|e| e.created_at);
        entries
    }

    // ── Appeal stakes ──────────────────────────────────────────────────

    /// Hold an appeal stake. One per dispute.
    pub fn hold_appeal_stake(
        &self,
        task_id: &TaskId,
        dispute_id: &DisputeId,
        appellant_id: &UserId,
        amount: Amount,
        currency: Currency,
    ) -> Result<AppealStake, StakeError> {
        if !amount.is_positive() {
            return Err(StakeError::NonPositiveAmount(amount));
        }
        let now = self.clock.now();
        let mut account = self.accounts.entry(*task_id).or_default();
        if let Some(existing) = account.appeals.get(dispute_id) {
            return Err(StakeError::InvalidAppealStatus {
                dispute_id: *dispute_id,
                operation: "hold",
                status: existing.status.as_str().to_string(),
            });
        }
        let appeal = AppealStake {
            dispute_id: *dispute_id,
            task_id: *task_id,
            appellant_id: *appellant_id,
            amount,
            currency: currency.clone(),
            status: AppealStakeStatus::Held,
            created_at: now,
            settled_at: None,
        };
        account.entries.push(LedgerEntry {
            id: LedgerEntryId::new(),
            task_id: *task_id,
            stake_id: None,
            dispute_id: Some(*dispute_id),
            entry_type: EntryType::AppealStakeHeld,
            amount,
            currency,
            direction: Direction::Credit,
            counterparty: Counterparty::User(*appellant_id),
            metadata: json!({}),
            created_at: now,
        });
        account.appeals.insert(*dispute_id, appeal.clone());
        tracing::info!(dispute_id = %dispute_id, appellant = %appellant_id, amount = %amount, "appeal stake held");
        Ok(appeal)
    }

    /// Return a held appeal stake to the appellant.
    pub fn return_appeal_stake(&self, task_id: &TaskId, dispute_id: &DisputeId) -> Result<AppealStake, StakeError> {
        self.close_appeal(task_id, dispute_id, AppealStakeStatus::Returned)
    }

    /// Forfeit a held appeal stake to the platform.
    pub fn forfeit_appeal_stake(&self, task_id: &TaskId, dispute_id: &DisputeId) -> Result<AppealStake, StakeError> {
        self.close_appeal(task_id, dispute_id, AppealStakeStatus::Forfeited)
    }

    /// Appeal stake for a dispute.
    pub fn get_appeal_stake(&self, task_id: &TaskId, dispute_id: &DisputeId) -> Option<AppealStake> {
        self.accounts
            .get(task_id)
            .and_then(|account| account.appeals.get(dispute_id).cloned())
    }

    fn close_appeal(
        &self,
        task_id: &TaskId,
        dispute_id: &DisputeId,
        outcome: AppealStakeStatus,
    ) -> Result<AppealStake, StakeError> {
        let not_found = || StakeError::AppealStakeNotFound {
            dispute_id: *dispute_id,
        };
        let now = self.clock.now();
        let mut account = self.accounts.get_mut(task_id).ok_or_else(not_found)?;
        let appeal = account.appeals.get_mut(dispute_id).ok_or_else(not_found)?;
        if appeal.status != AppealStakeStatus::Held {
            return Err(StakeError::InvalidAppealStatus {
                dispute_id: *dispute_id,
                operation: match outcome {
                    AppealStakeStatus::Returned => "return",
                    _ => "forfeit",
                },
                status: appeal.status.as_str().to_string(),
            });
        }
        appeal.status = outcome;
        appeal.settled_at = Some(now);
        let closed = appeal.clone();

        let (entry_type, counterparty) = match outcome {
            AppealStakeStatus::Returned => (
                EntryType::AppealStakeReturned,
                Counterparty::User(closed.appellant_id),
            ),
            _ => (EntryType::AppealStakeForfeited, Counterparty::Platform),
        };
        account.entries.push(LedgerEntry {
            id: LedgerEntryId::new(),
            task_id: *task_id,
            stake_id: None,
            dispute_id: Some(*dispute_id),
            entry_type,
            amount: closed.amount,
            currency: closed.currency.clone(),
            direction: Direction::Debit,
            counterparty,
            metadata: json!({}),
            created_at: now,
        });
        tracing::info!(dispute_id = %dispute_id, status = outcome.as_str(), "appeal stake closed");
        Ok(closed)
    }
}

fn settlement_entries(stake: &Stake, split: SettlementSplit, reason: &str, now: Timestamp) -> Vec<LedgerEntry> {
    let worker_type = if stake.status == StakeStatus::Released {
        EntryType::StakeReleased
    } else {
        EntryType::ReturnedToWorker
    };
    [
        (worker_type, split.worker_return, Counterparty::User(stake.worker_id)),
        (
            EntryType::SlashedToRequester,
            split.requester_share,
            Counterparty::User(stake.requester_id),
        ),
        (EntryType::SlashedToPlatform, split.platform_share, Counterparty::Platform),
    ]
    .into_iter()
    .filter(|(_, amount, _)| amount.is_positive())
    .map(|(entry_type, amount, counterparty)| LedgerEntry {
        id: LedgerEntryId::new(),
        task_id: stake.task_id,
        stake_id: Some(stake.id),
        dispute_id: None,
        entry_type,
        amount,
        currency: stake.currency.clone(),
        direction: Direction::Debit,
        counterparty,
        metadata: json!({ "reason": reason, "status": stake.status.as_str() }),
        created_at: now,
    })
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use verdict_core::ManualClock;

    struct Harness {
        ledger: StakeLedger,
        strikes: Arc<InMemoryStrikes>,
    }

    fn harness() -> Harness {
        let strikes = Arc::new(InMemoryStrikes::new());
        let clock = Arc::new(ManualClock::new(Timestamp::parse("2026-03-01T12:00:00Z").unwrap()));
        Harness {
            ledger: StakeLedger::new(StakePolicy::default(), strikes.clone(), clock),
            strikes,
        }
    }

    fn request(bounty_major: i64, strikes: u32, reputation: u8) -> StakeRequest {
        StakeRequest {
            task_id: TaskId::new(),
            worker_id: UserId::new(),
            requester_id: UserId::new(),
            bounty: Amount::from_major(bounty_major),
            strike_count: strikes,
            reputation,
            currency: Currency::default(),
        }
    }

    fn bps(v: u32) -> BasisPoints {
        BasisPoints::new(v).unwrap()
    }

    fn debit_total(entries: &[LedgerEntry], stake_id: StakeId) -> Amount {
        entries
            .iter()
            .filter(|e| e.stake_id == Some(stake_id) && e.direction == Direction::Debit)
            .map(|e| e.amount)
            .sum()
    }

    #[test]
    fn create_and_release() {
        let h = harness();
        let req = request(100, 0, 75);
        let stake = h.ledger.create_stake(&req).unwrap();
        assert_eq!(stake.status, StakeStatus::Held);
        assert_eq!(stake.amount, Amount::from_major(15));

        let released = h.ledger.release_stake(&req.task_id, &req.worker_id, "approved").unwrap();
        assert_eq!(released.status, StakeStatus::Released);

        let entries = h.ledger.entries_for_task(&req.task_id);
        let types: Vec<_> = entries.iter().map(|e| e.entry_type).collect();
        assert_eq!(types, vec![EntryType::StakeHeld, EntryType::StakeReleased]);
        assert_eq!(debit_total(&entries, stake.id), stake.amount);
    }

    #[test]
    fn one_stake_per_task_worker() {
        let h = harness();
        let req = request(100, 0, 75);
        h.ledger.create_stake(&req).unwrap();
        assert!(matches!(
            h.ledger.create_stake(&req).unwrap_err(),
            StakeError::AlreadyExists { .. }
        ));
        let other_worker = StakeRequest {
            worker_id: UserId::new(),
            ..req
        };
        assert!(h.ledger.create_stake(&other_worker).is_ok());
    }

    #[test]
    fn slash_records_strike_and_split() {
        let h = harness();
        let req = request(100, 0, 75);
        let stake = h.ledger.create_stake(&req).unwrap();
        let slashed = h
            .ledger
            .slash_stake(&req.task_id, &req.worker_id, bps(5_000), "rejected work")
            .unwrap();
        assert_eq!(slashed.requester_share, Amount::from_minor(750));
        assert_eq!(slashed.platform_share, Amount::from_minor(750));
        assert_eq!(h.strikes.count(&req.worker_id), 1);

        let entries = h.ledger.entries_for_task(&req.task_id);
        assert_eq!(debit_total(&entries, stake.id), stake.amount);
        assert!(entries
            .iter()
            .any(|e| e.counterparty == Counterparty::User(req.requester_id)
                && e.entry_type == EntryType::SlashedToRequester));
    }

    #[test]
    fn partial_slash_does_not_add_strike() {
        let h = harness();
        // 20.00 stake: bounty 200 at 10%.
        let req = request(200, 0, 95);
        let stake = h.ledger.create_stake(&req).unwrap();
        assert_eq!(stake.amount, Amount::from_minor(2_000));
        let settled = h
            .ledger
            .partial_slash(&req.task_id, &req.worker_id, bps(3_000), bps(3_500), "split decision")
            .unwrap();
        assert_eq!(settled.worker_return, Amount::from_minor(600));
        assert_eq!(settled.requester_share, Amount::from_minor(700));
        assert_eq!(settled.platform_share, Amount::from_minor(700));
        assert_eq!(settled.status, StakeStatus::Slashed);
        assert_eq!(h.strikes.count(&req.worker_id), 0);

        let entries = h.ledger.entries_for_task(&req.task_id);
        assert_eq!(debit_total(&entries, stake.id), stake.amount);
        assert!(entries.iter().any(|e| e.entry_type == EntryType::ReturnedToWorker));
    }

    #[test]
    fn terminal_stake_rejects_and_leaves_entries_unchanged() {
        let h = harness();
        let req = request(100, 0, 75);
        h.ledger.create_stake(&req).unwrap();
        h.ledger.release_stake(&req.task_id, &req.worker_id, "ok").unwrap();
        let before = h.ledger.entries_for_task(&req.task_id).len();

        let err = h
            .ledger
            .slash_stake(&req.task_id, &req.worker_id, bps(5_000), "late")
            .unwrap_err();
        assert!(matches!(err, StakeError::InvalidStatus { operation: "slash", .. }));
        assert_eq!(h.ledger.entries_for_task(&req.task_id).len(), before);
    }

    #[test]
    fn missing_stake_is_not_found() {
        let h = harness();
        let err = h
            .ledger
            .release_stake(&TaskId::new(), &UserId::new(), "nothing")
            .unwrap_err();
        assert!(matches!(err, StakeError::NotFound { .. }));
    }

    struct FailingStrikes;

    impl StrikeRegistry for FailingStrikes {
        fn record_strike(&self, worker_id: &UserId) -> Result<u32, StakeError> {
            Err(StakeError::StrikeRegistry {
                worker_id: *worker_id,
                reason: "directory offline".into(),
            })
        }
    }

    #[test]
    fn strike_failure_leaves_stake_held() {
        let clock = Arc::new(ManualClock::new(Timestamp::now()));
        let ledger = StakeLedger::new(StakePolicy::default(), Arc::new(FailingStrikes), clock);
        let req = request(100, 0, 75);
        ledger.create_stake(&req).unwrap();
        assert!(ledger
            .slash_stake(&req.task_id, &req.worker_id, bps(5_000), "x")
            .is_err());
        assert_eq!(
            ledger.get_stake(&req.task_id, &req.worker_id).unwrap().status,
            StakeStatus::Held
        );
        assert_eq!(ledger.entries_for_task(&req.task_id).len(), 1);
    }

    #[test]
    fn appeal_stake_lifecycle() {
        let h = harness();
        let task = TaskId::new();
        let dispute = DisputeId::new();
        let appellant = UserId::new();
        h.ledger
            .hold_appeal_stake(&task, &dispute, &appellant, Amount::from_major(10), Currency::default())
            .unwrap();
        assert!(h
            .ledger
            .hold_appeal_stake(&task, &dispute, &appellant, Amount::from_major(10), Currency::default())
            .is_err());

        let returned = h.ledger.return_appeal_stake(&task, &dispute).unwrap();
        assert_eq!(returned.status, AppealStakeStatus::Returned);
        assert!(h.ledger.forfeit_appeal_stake(&task, &dispute).is_err());

        let types: Vec<_> = h
            .ledger
            .entries_for_task(&task)
            .iter()
            .map(|e| e.entry_type)
            .collect();
        assert_eq!(types, vec![EntryType::AppealStakeHeld, EntryType::AppealStakeReturned]);
    }

    #[test]
    fn concurrent_settlement_has_one_winner() {
        let h = Arc::new(harness());
        let req = request(100, 0, 75);
        h.ledger.create_stake(&req).unwrap();

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let h = Arc::clone(&h);
                let req = req.clone();
                std::thread::spawn(move || {
                    if i % 2 == 0 {
                        h.ledger.release_stake(&req.task_id, &req.worker_id, "race").is_ok()
                    } else {
                        h.ledger
                            .slash_stake(&req.task_id, &req.worker_id, bps(5_000), "race")
                            .is_ok()
                    }
                })
            })
            .collect();
        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|ok| *ok)
            .count();
        assert_eq!(winners, 1);
        let stake = h.ledger.get_stake(&req.task_id, &req.worker_id).unwrap();
        let entries = h.ledger.entries_for_task(&req.task_id);
        assert_eq!(debit_total(&entries, stake.id), stake.amount);
    }
}
