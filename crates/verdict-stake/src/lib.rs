#![deny(missing_docs)]

//! # verdict-stake: Worker Stakes and Settlement
//!
//! Workers stake a fraction of a task's bounty when they claim it. This
//! crate computes that fraction, holds the stake, and settles it when the
//! task or its dispute concludes:
//!
//! - [`policy`]: required-stake calculation from strikes and reputation.
//! - [`stake`]: the stake status machine and exact basis-point splits.
//! - [`ledger`]: the in-process stake ledger, with per-task atomic commits
//!   of status changes and their ledger entries, plus appeal stakes.
//! - [`provider`]: the [`SettlementProvider`] trait and the ledger-backed
//!   implementation.
//! - [`http`]: the custody-service implementation.
//!
//! All money is integer minor units; see [`verdict_core::Amount`].

pub mod error;
pub mod http;
pub mod ledger;
pub mod policy;
pub mod provider;
mod retry;
pub mod stake;

pub use error::StakeError;
pub use http::{ExternalSettlementConfig, HttpSettlementProvider};
pub use ledger::{
    AppealStake, AppealStakeStatus, Counterparty, Direction, EntryType, InMemoryStrikes,
    LedgerEntry, StakeLedger, StrikeRegistry,
};
pub use policy::{calculate_required_stake, RequiredStake, StakePolicy};
pub use provider::{Allowance, BalanceDirectory, InMemoryBalances, LedgerSettlement, SettlementProvider};
pub use retry::RetryPolicy;
pub use stake::{SettlementSplit, Stake, StakeRequest, StakeResult, StakeStatus};
