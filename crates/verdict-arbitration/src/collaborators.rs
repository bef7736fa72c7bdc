//! # External Collaborators
//!
//! The engine reads submissions, tasks and user profiles it does not own,
//! and writes back only submission and task status. Each concern is a
//! narrow object-safe trait so production can back it with the platform's
//! own services.
//!
//! [`InMemoryDirectory`] implements every trait here, plus the stake
//! crate's [`StrikeRegistry`] and [`BalanceDirectory`], for development and
//! tests.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use verdict_core::{Amount, Currency, SubmissionId, TaskId, Timestamp, UserId};
use verdict_stake::{BalanceDirectory, StakeError, StrikeRegistry};

use crate::autoscore::{Artefact, GeoPoint};
use crate::error::ArbitrationError;
use crate::jury::JurorCandidate;

// ── Records ────────────────────────────────────────────────────────────

/// Review status of a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionStatus {
    /// Awaiting the requester's review.
    Pending,
    /// Accepted.
    Accepted,
    /// Rejected.
    Rejected,
}

impl SubmissionStatus {
    /// The canonical string name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
        }
    }
}

/// A worker's submission against a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Submission {
    /// Submission identifier.
    pub id: SubmissionId,
    /// The task.
    pub task_id: TaskId,
    /// The submitting worker.
    pub worker_id: UserId,
    /// Review status.
    pub status: SubmissionStatus,
    /// Precomputed verification score, 0 to 100.
    pub verification_score: u8,
    /// Attached artefacts.
    pub artefacts: Vec<Artefact>,
    /// When it was submitted.
    pub submitted_at: Timestamp,
}

/// Task status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Posted, unclaimed.
    Open,
    /// Claimed by a worker.
    Claimed,
    /// Work accepted and paid.
    Accepted,
}

/// A paid task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Task identifier.
    pub id: TaskId,
    /// The posting requester.
    pub requester_id: UserId,
    /// Bounty.
    pub bounty: Amount,
    /// Bounty currency.
    pub currency: Currency,
    /// Artefacts a complete submission carries.
    pub required_artefacts: u32,
    /// Where the work happens, if anywhere.
    pub location: Option<GeoPoint>,
    /// Acceptable distance from `location`, metres.
    pub radius_m: f64,
    /// Submission deadline.
    pub deadline: Option<Timestamp>,
    /// Status.
    pub status: TaskStatus,
}

/// Reputation data for a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    /// The user.
    pub user_id: UserId,
    /// Reputation, 0 to 100.
    pub reputation: u8,
    /// Strikes recorded against the user as a worker.
    pub strike_count: u32,
    /// Reliability as a juror candidate, 0 to 100.
    pub reliability: u8,
    /// Tasks completed and accepted.
    pub accepted_tasks: u32,
}

// ── Traits ─────────────────────────────────────────────────────────────

/// Submissions and tasks.
pub trait TaskDirectory: Send + Sync {
    /// Look up a submission.
    fn get_submission(&self, id: &SubmissionId) -> Result<Option<Submission>, ArbitrationError>;

    /// Look up a task.
    fn get_task(&self, id: &TaskId) -> Result<Option<Task>, ArbitrationError>;

    /// Record a submission's review status.
    fn set_submission_status(&self, id: &SubmissionId, status: SubmissionStatus) -> Result<(), ArbitrationError>;

    /// Record a task's status.
    fn set_task_status(&self, id: &TaskId, status: TaskStatus) -> Result<(), ArbitrationError>;
}

/// User profiles and the juror pool.
pub trait UserDirectory: Send + Sync {
    /// Look up a profile.
    fn profile(&self, id: &UserId) -> Result<Option<UserProfile>, ArbitrationError>;

    /// Users who may be considered for jury duty. Eligibility is decided by
    /// the selector, not here.
    fn juror_candidates(&self) -> Result<Vec<JurorCandidate>, ArbitrationError>;
}

/// Where a user's payouts go.
pub trait PayoutResolver: Send + Sync {
    /// The user's primary payout wallet, if one is registered.
    fn primary_wallet(&self, user_id: &UserId) -> Result<Option<String>, ArbitrationError>;
}

// ── In-memory implementation ───────────────────────────────────────────

/// In-process directory backing every collaborator trait.
#[derive(Debug, Default)]
pub struct InMemoryDirectory {
    submissions: DashMap<SubmissionId, Submission>,
    tasks: DashMap<TaskId, Task>,
    profiles: DashMap<UserId, UserProfile>,
    wallets: DashMap<UserId, String>,
    balances: DashMap<UserId, Amount>,
}

impl InMemoryDirectory {
    /// Empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a submission.
    pub fn put_submission(&self, submission: Submission) {
        self.submissions.insert(submission.id, submission);
    }

    /// Add or replace a task.
    pub fn put_task(&self, task: Task) {
        self.tasks.insert(task.id, task);
    }

    /// Add or replace a profile.
    pub fn put_profile(&self, profile: UserProfile) {
        self.profiles.insert(profile.user_id, profile);
    }

    /// Register a payout wallet.
    pub fn set_wallet(&self, user_id: UserId, wallet: impl Into<String>) {
        self.wallets.insert(user_id, wallet.into());
    }

    /// Set a user's available balance.
    pub fn set_balance(&self, user_id: UserId, amount: Amount) {
        self.balances.insert(user_id, amount);
    }

    /// Current submission snapshot.
    pub fn submission(&self, id: &SubmissionId) -> Option<Submission> {
        self.submissions.get(id).map(|s| s.clone())
    }

    /// Current task snapshot.
    pub fn task(&self, id: &TaskId) -> Option<Task> {
        self.tasks.get(id).map(|t| t.clone())
    }

    /// Current profile snapshot.
    pub fn user(&self, id: &UserId) -> Option<UserProfile> {
        self.profiles.get(id).map(|p| *p)
    }
}

impl TaskDirectory for InMemoryDirectory {
    fn get_submission(&self, id: &SubmissionId) -> Result<Option<Submission>, ArbitrationError> {
        Ok(self.submission(id))
    }

    fn get_task(&self, id: &TaskId) -> Result<Option<Task>, ArbitrationError> {
        Ok(self.task(id))
    }

    fn set_submission_status(&self, id: &SubmissionId, status: SubmissionStatus) -> Result<(), ArbitrationError> {
        let mut submission = self
            .submissions
            .get_mut(id)
            .ok_or(ArbitrationError::SubmissionNotFound(*id))?;
        submission.status = status;
        Ok(())
    }

    fn set_task_status(&self, id: &TaskId, status: TaskStatus) -> Result<(), ArbitrationError> {
        let mut task = self.tasks.get_mut(id).ok_or(ArbitrationError::TaskNotFound(*id))?;
        task.status = status;
        Ok(())
    }
}

impl UserDirectory for InMemoryDirectory {
    fn profile(&self, id: &UserId) -> Result<Option<UserProfile>, ArbitrationError> {
        Ok(self.user(id))
    }

    fn juror_candidates(&self) -> Result<Vec<JurorCandidate>, ArbitrationError> {
        Ok(self
            .profiles
            .iter()
            .map(|p| JurorCandidate {
                user_id: p.user_id,
                reliability: p.reliability,
                accepted_tasks: p.accepted_tasks,
            })
            .collect())
    }
}

impl PayoutResolver for InMemoryDirectory {
    fn primary_wallet(&self, user_id: &UserId) -> Result<Option<String>, ArbitrationError> {
        Ok(self.wallets.get(user_id).map(|w| w.clone()))
    }
}

impl StrikeRegistry for InMemoryDirectory {
    fn record_strike(&self, worker_id: &UserId) -> Result<u32, StakeError> {
        let mut profile = self
            .profiles
            .get_mut(worker_id)
            .ok_or_else(|| StakeError::StrikeRegistry {
                worker_id: *worker_id,
                reason: "no profile".into(),
            })?;
        profile.strike_count = profile.strike_count.saturating_add(1);
        Ok(profile.strike_count)
    }
}

impl BalanceDirectory for InMemoryDirectory {
    fn available_balance(&self, user_id: &UserId) -> Result<Amount, StakeError> {
        Ok(self.balances.get(user_id).map(|b| *b).unwrap_or(Amount::ZERO))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(reliability: u8) -> UserProfile {
        UserProfile {
            user_id: UserId::new(),
            reputation: 80,
            strike_count: 0,
            reliability,
            accepted_tasks: 10,
        }
    }

    #[test]
    fn strikes_accumulate_on_profile() {
        let dir = InMemoryDirectory::new();
        let p = profile(95);
        dir.put_profile(p);
        assert_eq!(dir.record_strike(&p.user_id).unwrap(), 1);
        assert_eq!(dir.record_strike(&p.user_id).unwrap(), 2);
        assert_eq!(dir.user(&p.user_id).unwrap().strike_count, 2);
    }

    #[test]
    fn strike_for_unknown_user_fails() {
        let dir = InMemoryDirectory::new();
        let err = dir.record_strike(&UserId::new()).unwrap_err();
        assert!(matches!(err, StakeError::StrikeRegistry { .. }));
    }

    #[test]
    fn status_update_on_missing_submission_is_not_found() {
        let dir = InMemoryDirectory::new();
        let id = SubmissionId::new();
        let err = dir.set_submission_status(&id, SubmissionStatus::Accepted).unwrap_err();
        assert_eq!(err, ArbitrationError::SubmissionNotFound(id));
    }

    #[test]
    fn juror_candidates_mirror_profiles() {
        let dir = InMemoryDirectory::new();
        dir.put_profile(profile(92));
        dir.put_profile(profile(70));
        let candidates = dir.juror_candidates().unwrap();
        assert_eq!(candidates.len(), 2);
        assert!(candidates.iter().any(|c| c.reliability == 92));
    }

    #[test]
    fn unknown_balance_is_zero() {
        let dir = InMemoryDirectory::new();
        assert_eq!(dir.available_balance(&UserId::new()).unwrap(), Amount::ZERO);
    }
}
