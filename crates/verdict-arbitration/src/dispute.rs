//! # Dispute Model
//!
//! A dispute is raised by a worker against a rejected submission and moves
//! through three tiers of review:
//!
//! ```text
//!  opened ─▶ evidence_pending ─▶ tier1_review ─┬─▶ resolved ─▶ tier3_appeal ─▶ resolved
//!                    │                         │       ▲              ▲
//!                    │                         ▼       │              │
//!                    └───────(admin)──────▶ tier2_voting ─────────────┘
//! ```
//!
//! The transitions themselves live in [`crate::tier`]; this module defines
//! the record and the value types stored on it.
//!
//! ## History
//!
//! `tier_history` is append-only and is the source of truth for what was
//! decided at each tier. Entries are tagged variants carrying a schema
//! version so readers can evolve without guessing at shapes. When an appeal
//! reopens a dispute, the decision it supersedes is kept both in history and
//! in [`Dispute::superseded_resolution`].

use serde::{Deserialize, Serialize};

use verdict_core::{Amount, DisputeId, SubmissionId, TaskId, Timestamp, UserId};

use crate::autoscore::{AutoScoreResult, Recommendation};
use crate::error::ArbitrationError;

/// Current version of [`TierTransition`] records.
pub const HISTORY_SCHEMA_VERSION: u16 = 1;

// ── Tier ───────────────────────────────────────────────────────────────

/// Review tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Tier {
    /// Automated scoring.
    One,
    /// Community jury.
    Two,
    /// Administrative appeal.
    Three,
}

impl Tier {
    /// Numeric tier.
    pub fn as_u8(&self) -> u8 {
        match self {
            Self::One => 1,
            Self::Two => 2,
            Self::Three => 3,
        }
    }
}

impl TryFrom<u8> for Tier {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::One),
            2 => Ok(Self::Two),
            3 => Ok(Self::Three),
            other => Err(format!("invalid tier {other}")),
        }
    }
}

impl From<Tier> for u8 {
    fn from(tier: Tier) -> u8 {
        tier.as_u8()
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_u8())
    }
}

// ── Status ─────────────────────────────────────────────────────────────

/// Dispute lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisputeStatus {
    /// Just created.
    Opened,
    /// Parties may submit evidence.
    EvidencePending,
    /// Scored; waiting out the review window.
    Tier1Review,
    /// Jury is voting.
    Tier2Voting,
    /// Awaiting an administrative decision.
    Tier3Appeal,
    /// Decided. Reopened only by appeal.
    Resolved,
}

impl DisputeStatus {
    /// The canonical string name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Opened => "opened",
            Self::EvidencePending => "evidence_pending",
            Self::Tier1Review => "tier1_review",
            Self::Tier2Voting => "tier2_voting",
            Self::Tier3Appeal => "tier3_appeal",
            Self::Resolved => "resolved",
        }
    }

    /// Valid target statuses from this status.
    pub fn valid_transitions(&self) -> &'static [DisputeStatus] {
        match self {
            Self::Opened => &[Self::EvidencePending],
            Self::EvidencePending => &[Self::Tier1Review, Self::Tier2Voting, Self::Tier3Appeal],
            Self::Tier1Review => &[Self::Resolved, Self::Tier2Voting, Self::Tier3Appeal],
            Self::Tier2Voting => &[Self::Resolved, Self::Tier3Appeal],
            Self::Tier3Appeal => &[Self::Resolved],
            Self::Resolved => &[Self::Tier3Appeal],
        }
    }

    /// Whether the dispute is still being worked.
    pub fn is_active(&self) -> bool {
        !matches!(self, Self::Resolved)
    }
}

impl std::fmt::Display for DisputeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Outcomes ───────────────────────────────────────────────────────────

/// Which side prevailed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// The worker's submission stands.
    WorkerWins,
    /// The requester's rejection stands.
    RequesterWins,
}

impl Outcome {
    /// The outcome a decisive Tier-1 recommendation maps to.
    pub fn from_recommendation(rec: Recommendation) -> Option<Self> {
        match rec {
            Recommendation::WorkerWins => Some(Self::WorkerWins),
            Recommendation::RequesterWins => Some(Self::RequesterWins),
            Recommendation::Escalate => None,
        }
    }

    /// The opposite outcome.
    pub fn flipped(&self) -> Self {
        match self {
            Self::WorkerWins => Self::RequesterWins,
            Self::RequesterWins => Self::WorkerWins,
        }
    }

    /// The canonical string name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::WorkerWins => "worker_wins",
            Self::RequesterWins => "requester_wins",
        }
    }
}

/// How the task is settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionType {
    /// Pure worker win: work accepted, bounty paid.
    AcceptPay,
    /// Pure requester win: work rejected, bounty refunded.
    RejectRefund,
    /// Bounty split between the parties.
    PartialPay,
}

impl ResolutionType {
    /// The canonical string name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AcceptPay => "accept_pay",
            Self::RejectRefund => "reject_refund",
            Self::PartialPay => "partial_pay",
        }
    }
}

/// An outcome plus an optional worker split percentage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    /// Who prevailed.
    pub outcome: Outcome,
    /// Worker's share of the bounty, `0..=100`, when the decision is a split.
    pub split_percentage: Option<u8>,
}

impl Decision {
    /// A pure (unsplit) decision.
    pub fn pure(outcome: Outcome) -> Self {
        Self {
            outcome,
            split_percentage: None,
        }
    }

    /// A split decision.
    pub fn split(outcome: Outcome, worker_percentage: u8) -> Result<Self, ArbitrationError> {
        if worker_percentage > 100 {
            return Err(ArbitrationError::InvalidSplit(worker_percentage));
        }
        Ok(Self {
            outcome,
            split_percentage: Some(worker_percentage),
        })
    }

    /// Re-check the split bound on a decision built by hand or deserialized.
    pub fn validate(&self) -> Result<(), ArbitrationError> {
        match self.split_percentage {
            Some(p) if p > 100 => Err(ArbitrationError::InvalidSplit(p)),
            _ => Ok(()),
        }
    }

    /// The resolution type this decision produces.
    pub fn resolution_type(&self) -> ResolutionType {
        match (self.split_percentage, self.outcome) {
            (Some(_), _) => ResolutionType::PartialPay,
            (None, Outcome::WorkerWins) => ResolutionType::AcceptPay,
            (None, Outcome::RequesterWins) => ResolutionType::RejectRefund,
        }
    }

    /// Worker's share of the bounty in whole percent.
    pub fn worker_percentage(&self) -> u8 {
        match (self.split_percentage, self.outcome) {
            (Some(p), _) => p,
            (None, Outcome::WorkerWins) => 100,
            (None, Outcome::RequesterWins) => 0,
        }
    }
}

/// Who made a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Resolver {
    /// Tier-1 automated scoring.
    AutoScore,
    /// Tier-2 jury.
    Jury,
    /// Tier-3 administrator.
    Admin {
        /// The administrator.
        user_id: UserId,
    },
}

/// A recorded decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    /// Who prevailed.
    pub outcome: Outcome,
    /// How the task is settled.
    pub resolution_type: ResolutionType,
    /// Worker's share for split decisions.
    pub split_percentage: Option<u8>,
    /// Who decided.
    pub resolver: Resolver,
    /// Tier at which the decision was made.
    pub tier: Tier,
    /// When it was made.
    pub resolved_at: Timestamp,
}

impl Resolution {
    /// Record a decision.
    pub fn new(decision: Decision, resolver: Resolver, tier: Tier, at: Timestamp) -> Self {
        Self {
            outcome: decision.outcome,
            resolution_type: decision.resolution_type(),
            split_percentage: decision.split_percentage,
            resolver,
            tier,
            resolved_at: at,
        }
    }

    /// The decision this resolution records.
    pub fn decision(&self) -> Decision {
        Decision {
            outcome: self.outcome,
            split_percentage: self.split_percentage,
        }
    }
}

// ── History ────────────────────────────────────────────────────────────

/// Who caused a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "user_id", rename_all = "snake_case")]
pub enum Actor {
    /// The engine itself (scoring, sweeps, deadlines).
    System,
    /// The worker or requester.
    Party(UserId),
    /// An administrator.
    Admin(UserId),
}

/// Why a transition happened.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TransitionDetails {
    /// Dispute created.
    Opened {
        /// The worker's stated reason.
        reason: String,
    },
    /// Evidence window started.
    EvidenceWindowOpened {
        /// When it closes.
        deadline: Timestamp,
    },
    /// Tier-1 score recorded.
    AutoScored {
        /// Total score.
        score: f64,
        /// Recommendation derived from it.
        recommendation: Recommendation,
    },
    /// Moved up a tier.
    Escalated {
        /// Free-text reason.
        reason: String,
    },
    /// Decision recorded.
    Resolved {
        /// The decision.
        resolution: Resolution,
    },
    /// Jury closed without a single non-abstain vote.
    VotingClosedWithoutVotes {
        /// Jurors seated.
        seated: usize,
    },
    /// Reopened by the losing party.
    Appealed {
        /// Appeal stake held.
        stake: Amount,
        /// The decision being appealed.
        superseded: Resolution,
    },
}

/// One entry in a dispute's tier history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TierTransition {
    /// Record format version.
    pub schema_version: u16,
    /// Status before.
    pub from: DisputeStatus,
    /// Status after.
    pub to: DisputeStatus,
    /// Tier before.
    pub from_tier: Tier,
    /// Tier after.
    pub to_tier: Tier,
    /// Who caused it.
    pub actor: Actor,
    /// When.
    pub timestamp: Timestamp,
    /// Why.
    pub details: TransitionDetails,
}

// ── Dispute ────────────────────────────────────────────────────────────

/// A dispute over a rejected submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dispute {
    /// Dispute identifier.
    pub id: DisputeId,
    /// The disputed submission.
    pub submission_id: SubmissionId,
    /// The submission's task.
    pub task_id: TaskId,
    /// The worker who raised it.
    pub worker_id: UserId,
    /// The requester who rejected the work.
    pub requester_id: UserId,
    /// Current status.
    pub status: DisputeStatus,
    /// Current tier. Only increases.
    pub current_tier: Tier,
    /// Append-only transition log.
    pub tier_history: Vec<TierTransition>,
    /// Tier-1 scoring result, once scored.
    pub auto_score_result: Option<AutoScoreResult>,
    /// Evidence window close.
    pub evidence_deadline: Option<Timestamp>,
    /// Tier-1 review window close.
    pub tier1_deadline: Option<Timestamp>,
    /// Tier-2 voting close.
    pub tier2_deadline: Option<Timestamp>,
    /// Target date for the Tier-3 decision.
    pub tier3_deadline: Option<Timestamp>,
    /// Last moment a Tier-2 decision may be appealed.
    pub appeal_deadline: Option<Timestamp>,
    /// Appeal stake amount, if appealed.
    pub escalation_stake: Option<Amount>,
    /// The appealing party, if appealed.
    pub appellant_id: Option<UserId>,
    /// The decision in force, if resolved.
    pub resolution: Option<Resolution>,
    /// The decision an appeal reopened.
    pub superseded_resolution: Option<Resolution>,
    /// Creation time.
    pub opened_at: Timestamp,
    /// Last change.
    pub updated_at: Timestamp,
}

impl Dispute {
    /// Whether `user_id` is the worker or requester.
    pub fn is_party(&self, user_id: &UserId) -> bool {
        *user_id == self.worker_id || *user_id == self.requester_id
    }

    /// The party on the losing side of `outcome`.
    pub fn loser(&self, outcome: Outcome) -> UserId {
        match outcome {
            Outcome::WorkerWins => self.requester_id,
            Outcome::RequesterWins => self.worker_id,
        }
    }

    /// The outcome favouring `user_id`, if they are a party.
    pub fn outcome_for(&self, user_id: &UserId) -> Option<Outcome> {
        if *user_id == self.worker_id {
            Some(Outcome::WorkerWins)
        } else if *user_id == self.requester_id {
            Some(Outcome::RequesterWins)
        } else {
            None
        }
    }

    /// Resolution type in force.
    pub fn resolution_type(&self) -> Option<ResolutionType> {
        self.resolution.as_ref().map(|r| r.resolution_type)
    }

    /// When the decision in force was made.
    pub fn resolved_at(&self) -> Option<Timestamp> {
        self.resolution.as_ref().map(|r| r.resolved_at)
    }
}
