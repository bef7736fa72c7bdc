//! # Stake Error Types
//!
//! Not-found, conflict, validation and provider failures are separate
//! variants so callers can decide between "fix the request", "reread and
//! retry", and "retry the settlement later".

use thiserror::Error;

use verdict_core::{Amount, BasisPoints, DisputeId, StakeId, TaskId, UserId, ValidationError};

/// Errors arising from stake and settlement operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StakeError {
    /// A stake already exists for this (task, worker) pair.
    #[error("stake already exists for {task_id} / {worker_id}")]
    AlreadyExists {
        /// The task.
        task_id: TaskId,
        /// The worker.
        worker_id: UserId,
    },

    /// No stake exists for this (task, worker) pair.
    #[error("no stake for {task_id} / {worker_id}")]
    NotFound {
        /// The task.
        task_id: TaskId,
        /// The worker.
        worker_id: UserId,
    },

    /// The stake is not in a status that permits the operation.
    #[error("stake {stake_id} cannot perform {operation} in status {status}")]
    InvalidStatus {
        /// The stake identifier.
        stake_id: StakeId,
        /// The attempted operation.
        operation: &'static str,
        /// The current status.
        status: String,
    },

    /// The stake already reached a terminal status with a different split
    /// than the one requested.
    #[error("stake {stake_id} already settled as {status}")]
    AlreadySettled {
        /// The stake identifier.
        stake_id: StakeId,
        /// The terminal status.
        status: String,
    },

    /// Worker return plus requester share exceed 100%.
    #[error("split exceeds 100%: worker {worker_return} + requester {requester_share}")]
    SplitExceedsTotal {
        /// Requested worker return.
        worker_return: BasisPoints,
        /// Requested requester share.
        requester_share: BasisPoints,
    },

    /// Appeal stake bookkeeping failed its status guard.
    #[error("appeal stake for {dispute_id} cannot perform {operation} in status {status}")]
    InvalidAppealStatus {
        /// The dispute the appeal stake belongs to.
        dispute_id: DisputeId,
        /// The attempted operation.
        operation: &'static str,
        /// The current status.
        status: String,
    },

    /// No appeal stake recorded for the dispute.
    #[error("no appeal stake for {dispute_id}")]
    AppealStakeNotFound {
        /// The dispute.
        dispute_id: DisputeId,
    },

    /// Stake amount must be positive.
    #[error("stake amount must be positive, got {0}")]
    NonPositiveAmount(Amount),

    /// Domain primitive validation failure.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The strike registry could not record a strike.
    #[error("strike registry failure for {worker_id}: {reason}")]
    StrikeRegistry {
        /// The worker whose strike count was being incremented.
        worker_id: UserId,
        /// Underlying reason.
        reason: String,
    },

    /// The settlement backend is unreachable or returned a server error.
    #[error("settlement provider {provider} unavailable: {reason}")]
    ProviderUnavailable {
        /// Provider name.
        provider: String,
        /// Underlying reason.
        reason: String,
    },

    /// The settlement backend refused the instruction.
    #[error("settlement provider {provider} rejected {operation}: {reason}")]
    ProviderRejected {
        /// Provider name.
        provider: String,
        /// The attempted operation.
        operation: &'static str,
        /// Rejection reason from the backend.
        reason: String,
    },
}

impl StakeError {
    /// Whether retrying the same instruction later may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ProviderUnavailable { .. } | Self::StrikeRegistry { .. }
        )
    }
}
