//! # Arbitration Error Types
//!
//! Every variant carries the dispute (or record) it concerns and, for state
//! machine rejections, the current state and the attempted target.
//! [`ArbitrationError::kind`] folds variants into the five classes a caller
//! needs to pick a response: fix the request, look elsewhere, reread and
//! retry, retry later, or page someone.

use thiserror::Error;

use verdict_core::{Amount, DisputeId, EvidenceId, SubmissionId, TaskId, UserId, ValidationError};
use verdict_stake::StakeError;

use crate::dispute::Tier;

/// Coarse classification of an [`ArbitrationError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The request itself is invalid.
    Validation,
    /// A referenced record does not exist.
    NotFound,
    /// The request conflicts with current state; reread and retry.
    Conflict,
    /// A dependency cannot serve the request right now.
    Unavailable,
    /// An internal invariant failed.
    Internal,
}

/// Errors arising from arbitration operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ArbitrationError {
    /// No dispute with this id.
    #[error("dispute {0} not found")]
    DisputeNotFound(DisputeId),

    /// No submission with this id.
    #[error("submission {0} not found")]
    SubmissionNotFound(SubmissionId),

    /// No task with this id.
    #[error("task {0} not found")]
    TaskNotFound(TaskId),

    /// No user profile with this id.
    #[error("user {0} not found")]
    UserNotFound(UserId),

    /// The dispute has no seated jury.
    #[error("no jury seated for dispute {0}")]
    JuryNotSeated(DisputeId),

    /// Attempted status transition is not valid from the current status.
    #[error("dispute {dispute_id}: invalid transition from {from} to {to}: {reason}")]
    InvalidTransition {
        /// The dispute.
        dispute_id: DisputeId,
        /// Current status.
        from: String,
        /// Attempted target status.
        to: String,
        /// Why it was rejected.
        reason: String,
    },

    /// The dispute is already resolved.
    #[error("dispute {dispute_id} is already resolved")]
    AlreadyResolved {
        /// The dispute.
        dispute_id: DisputeId,
    },

    /// The jury decision's stake settlement has already started, so it can
    /// no longer be appealed.
    #[error("dispute {dispute_id}: stake settlement already started")]
    SettlementStarted {
        /// The dispute.
        dispute_id: DisputeId,
    },

    /// Compare-and-set on the tier failed.
    #[error("dispute {dispute_id}: expected tier {expected}, found tier {actual}")]
    TierMismatch {
        /// The dispute.
        dispute_id: DisputeId,
        /// Tier the caller read.
        expected: Tier,
        /// Tier at write time.
        actual: Tier,
    },

    /// A dispute is already open on this submission.
    #[error("submission {submission_id} already has open dispute {dispute_id}")]
    DisputeAlreadyOpen {
        /// The submission.
        submission_id: SubmissionId,
        /// The open dispute.
        dispute_id: DisputeId,
    },

    /// The submission was already decided by a dispute.
    #[error("submission {submission_id} was already arbitrated by dispute {dispute_id}")]
    AlreadyArbitrated {
        /// The submission.
        submission_id: SubmissionId,
        /// The concluded dispute.
        dispute_id: DisputeId,
    },

    /// The submission is not in a status that permits the operation.
    #[error("submission {submission_id} is {status}; {operation} not allowed")]
    InvalidSubmissionStatus {
        /// The submission.
        submission_id: SubmissionId,
        /// Current status.
        status: String,
        /// The attempted operation.
        operation: &'static str,
    },

    /// A window has not closed yet.
    #[error("dispute {dispute_id}: {window} window open until {deadline}")]
    DeadlineNotReached {
        /// The dispute.
        dispute_id: DisputeId,
        /// Which window.
        window: &'static str,
        /// When it closes.
        deadline: String,
    },

    /// A window has already closed.
    #[error("dispute {dispute_id}: {window} window closed at {deadline}")]
    DeadlinePassed {
        /// The dispute.
        dispute_id: DisputeId,
        /// Which window.
        window: &'static str,
        /// When it closed.
        deadline: String,
    },

    /// The juror has already voted.
    #[error("juror {juror_id} already voted on dispute {dispute_id}")]
    AlreadyVoted {
        /// The dispute.
        dispute_id: DisputeId,
        /// The juror.
        juror_id: UserId,
    },

    /// Voting is closed for this dispute.
    #[error("voting is closed for dispute {dispute_id}")]
    VotingClosed {
        /// The dispute.
        dispute_id: DisputeId,
    },

    /// Voting cannot be finalized yet.
    #[error("voting still open for dispute {dispute_id}: {cast} of {seated} votes cast")]
    VotingStillOpen {
        /// The dispute.
        dispute_id: DisputeId,
        /// Votes cast so far.
        cast: usize,
        /// Jurors seated.
        seated: usize,
    },

    /// The user is neither the worker nor the requester.
    #[error("user {user_id} is not a party to dispute {dispute_id}")]
    NotAParty {
        /// The dispute.
        dispute_id: DisputeId,
        /// The user.
        user_id: UserId,
    },

    /// Only the submitting worker may dispute a submission.
    #[error("user {user_id} did not make submission {submission_id}")]
    NotSubmitter {
        /// The submission.
        submission_id: SubmissionId,
        /// The user.
        user_id: UserId,
    },

    /// The user is not seated on the jury.
    #[error("user {user_id} is not a juror on dispute {dispute_id}")]
    NotAJuror {
        /// The dispute.
        dispute_id: DisputeId,
        /// The user.
        user_id: UserId,
    },

    /// Only the losing party may appeal.
    #[error("user {user_id} did not lose dispute {dispute_id} and cannot appeal")]
    NotLosingParty {
        /// The dispute.
        dispute_id: DisputeId,
        /// The user.
        user_id: UserId,
    },

    /// Appeal stake below the required fraction of the bounty.
    #[error("appeal stake {offered} is below the required {required}")]
    AppealStakeTooSmall {
        /// Minimum stake.
        required: Amount,
        /// Offered stake.
        offered: Amount,
    },

    /// Split percentage outside 0..=100.
    #[error("invalid split percentage {0} (expected 0..=100)")]
    InvalidSplit(u8),

    /// Uphold requested but there is no prior decision to uphold.
    #[error("dispute {dispute_id} has no prior decision to uphold")]
    NothingToUphold {
        /// The dispute.
        dispute_id: DisputeId,
    },

    /// Worker cannot cover the required stake.
    #[error("worker {worker_id} has {available} available, stake requires {required}")]
    InsufficientFunds {
        /// The worker.
        worker_id: UserId,
        /// Required stake.
        required: Amount,
        /// Available balance.
        available: Amount,
    },

    /// Too few eligible jurors to seat a full jury.
    #[error("dispute {dispute_id}: {eligible} eligible jurors, {needed} required")]
    InsufficientJurors {
        /// The dispute.
        dispute_id: DisputeId,
        /// Jury size.
        needed: usize,
        /// Eligible candidates found.
        eligible: usize,
    },

    /// Evidence content does not match its stored digest.
    #[error("evidence integrity violation for {evidence_id}: expected {expected}, got {actual}")]
    EvidenceIntegrityViolation {
        /// The evidence item.
        evidence_id: EvidenceId,
        /// Stored digest.
        expected: String,
        /// Recomputed digest.
        actual: String,
    },

    /// Primitive validation failure.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Stake or settlement failure.
    #[error(transparent)]
    Stake(#[from] StakeError),

    /// An external directory failed.
    #[error("{service} unavailable: {reason}")]
    Collaborator {
        /// Which collaborator.
        service: &'static str,
        /// Underlying reason.
        reason: String,
    },

    /// Invalid configuration.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The audit hash chain does not verify.
    #[error("audit chain broken at sequence {sequence}: {reason}")]
    AuditChainBroken {
        /// First bad entry.
        sequence: u64,
        /// What failed.
        reason: String,
    },

    /// Serialization failure while hashing or encoding.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl ArbitrationError {
    /// Classify the error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::DisputeNotFound(_)
            | Self::SubmissionNotFound(_)
            | Self::TaskNotFound(_)
            | Self::UserNotFound(_)
            | Self::JuryNotSeated(_) => ErrorKind::NotFound,

            Self::InvalidTransition { .. }
            | Self::AlreadyResolved { .. }
            | Self::SettlementStarted { .. }
            | Self::TierMismatch { .. }
            | Self::DisputeAlreadyOpen { .. }
            | Self::AlreadyArbitrated { .. }
            | Self::InvalidSubmissionStatus { .. }
            | Self::DeadlineNotReached { .. }
            | Self::DeadlinePassed { .. }
            | Self::AlreadyVoted { .. }
            | Self::VotingClosed { .. }
            | Self::VotingStillOpen { .. } => ErrorKind::Conflict,

            Self::NotAParty { .. }
            | Self::NotSubmitter { .. }
            | Self::NotAJuror { .. }
            | Self::NotLosingParty { .. }
            | Self::AppealStakeTooSmall { .. }
            | Self::InvalidSplit(_)
            | Self::NothingToUphold { .. }
            | Self::InsufficientFunds { .. }
            | Self::EvidenceIntegrityViolation { .. }
            | Self::Validation(_)
            | Self::Config(_) => ErrorKind::Validation,

            Self::InsufficientJurors { .. } | Self::Collaborator { .. } => ErrorKind::Unavailable,

            Self::Stake(err) => match err {
                StakeError::NotFound { .. } | StakeError::AppealStakeNotFound { .. } => {
                    ErrorKind::NotFound
                }
                StakeError::AlreadyExists { .. }
                | StakeError::InvalidStatus { .. }
                | StakeError::AlreadySettled { .. }
                | StakeError::InvalidAppealStatus { .. }
                | StakeError::ProviderRejected { .. } => ErrorKind::Conflict,
                StakeError::ProviderUnavailable { .. } | StakeError::StrikeRegistry { .. } => {
                    ErrorKind::Unavailable
                }
                StakeError::SplitExceedsTotal { .. }
                | StakeError::NonPositiveAmount(_)
                | StakeError::Validation(_) => ErrorKind::Validation,
            },

            Self::AuditChainBroken { .. } | Self::Serialization(_) => ErrorKind::Internal,
        }
    }
}

impl From<serde_json::Error> for ArbitrationError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
