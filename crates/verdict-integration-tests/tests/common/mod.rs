//! Shared fixtures for the cross-crate tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Duration;

use verdict_arbitration::autoscore::GeoPoint;
use verdict_arbitration::collaborators::{Submission, SubmissionStatus, Task, TaskStatus, UserProfile};
use verdict_arbitration::{
    ArbitrationConfig, ArbitrationService, Dispute, InMemoryDirectory, RecordingSink, ServiceDeps,
};
use verdict_core::{Amount, BasisPoints, Currency, ManualClock, SubmissionId, TaskId, Timestamp, UserId};
use verdict_stake::{Allowance, SettlementProvider, Stake, StakeError, StakeRequest, StakeStatus};

pub fn t0() -> Timestamp {
    Timestamp::parse("2026-03-01T12:00:00Z").unwrap()
}

pub fn hours(h: i64) -> Duration {
    Duration::hours(h)
}

// ── Submission fixtures ───────────────────────────────────────────────
//
// With no artefacts and no photos the image check scores 50. The other
// checks are chosen to land on a known total.

/// What the scorer sees.
#[derive(Debug, Clone, Copy)]
pub struct Evidence {
    pub verification: u8,
    pub required_artefacts: u32,
    pub location: Option<GeoPoint>,
    pub deadline: Option<Timestamp>,
}

/// Scores `(30v + 6250) / 100`: 92.5 at v = 100, 85.0 at v = 75.
pub fn unlocated(verification: u8) -> Evidence {
    Evidence {
        verification,
        required_artefacts: 0,
        location: None,
        deadline: None,
    }
}

/// Located task, no GPS on the submission: scores 50.0.
pub fn no_gps() -> Evidence {
    Evidence {
        verification: 0,
        required_artefacts: 0,
        location: Some(GeoPoint { lat: 24.4539, lon: 54.3773 }),
        deadline: None,
    }
}

/// Nothing submitted, late, no GPS: scores 20.0.
pub fn empty_and_late() -> Evidence {
    Evidence {
        verification: 0,
        required_artefacts: 4,
        location: Some(GeoPoint { lat: 24.4539, lon: 54.3773 }),
        deadline: Some(t0().plus(hours(-1))),
    }
}

// ── Flaky settlement backend ───────────────────────────────────────────

/// Delegates to an inner provider, failing settlement calls while down.
pub struct FlakyProvider {
    inner: Arc<dyn SettlementProvider>,
    down: AtomicBool,
}

impl FlakyProvider {
    pub fn new(inner: Arc<dyn SettlementProvider>) -> Self {
        Self {
            inner,
            down: AtomicBool::new(false),
        }
    }

    pub fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), StakeError> {
        if self.down.load(Ordering::SeqCst) {
            return Err(StakeError::ProviderUnavailable {
                provider: "flaky".into(),
                reason: "connection refused".into(),
            });
        }
        Ok(())
    }
}

impl SettlementProvider for FlakyProvider {
    fn provider_name(&self) -> &str {
        "flaky"
    }

    fn create_stake(&self, request: &StakeRequest) -> Result<Stake, StakeError> {
        self.inner.create_stake(request)
    }

    fn release_stake(&self, task_id: &TaskId, worker_id: &UserId, reason: &str) -> Result<Stake, StakeError> {
        self.check()?;
        self.inner.release_stake(task_id, worker_id, reason)
    }

    fn slash_stake(
        &self,
        task_id: &TaskId,
        worker_id: &UserId,
        requester_share: BasisPoints,
        reason: &str,
    ) -> Result<Stake, StakeError> {
        self.check()?;
        self.inner.slash_stake(task_id, worker_id, requester_share, reason)
    }

    fn partial_slash(
        &self,
        task_id: &TaskId,
        worker_id: &UserId,
        worker_return: BasisPoints,
        requester_share: BasisPoints,
        reason: &str,
    ) -> Result<Stake, StakeError> {
        self.check()?;
        self.inner
            .partial_slash(task_id, worker_id, worker_return, requester_share, reason)
    }

    fn get_stake(&self, task_id: &TaskId, worker_id: &UserId) -> Result<Option<Stake>, StakeError> {
        self.inner.get_stake(task_id, worker_id)
    }

    fn check_allowance(&self, worker_id: &UserId, amount: Amount) -> Result<Allowance, StakeError> {
        self.inner.check_allowance(worker_id, amount)
    }
}

// ── World ─────────────────────────────────────────────────────────────

pub struct World {
    pub service: ArbitrationService,
    pub directory: Arc<InMemoryDirectory>,
    pub clock: ManualClock,
    pub sink: Arc<RecordingSink>,
    pub flaky: Arc<FlakyProvider>,
    pub worker: UserId,
    pub requester: UserId,
    pub jurors: Vec<UserId>,
}

/// A world with one juror per entry in `juror_reliability`.
pub fn world(juror_reliability: &[u8]) -> World {
    world_with(ArbitrationConfig::default(), juror_reliability)
}

pub fn world_with(config: ArbitrationConfig, juror_reliability: &[u8]) -> World {
    let clock = ManualClock::new(t0());
    let directory = Arc::new(InMemoryDirectory::new());
    let sink = Arc::new(RecordingSink::new());
    let mut deps = ServiceDeps::in_memory(Arc::clone(&directory), &config, Arc::new(clock.clone()), sink.clone());
    let flaky = Arc::new(FlakyProvider::new(Arc::clone(&deps.provider)));
    deps.provider = flaky.clone();

    let worker = UserId::new();
    let requester = UserId::new();
    for (user_id, reputation) in [(worker, 50), (requester, 80)] {
        directory.put_profile(UserProfile {
            user_id,
            reputation,
            strike_count: 0,
            reliability: 0,
            accepted_tasks: 0,
        });
    }
    directory.set_balance(worker, Amount::from_major(10_000));
    directory.set_wallet(worker, "wallet-worker");
    directory.set_wallet(requester, "wallet-requester");

    let jurors = juror_reliability
        .iter()
        .map(|&reliability| {
            let user_id = UserId::new();
            directory.put_profile(UserProfile {
                user_id,
                reputation: 70,
                strike_count: 0,
                reliability,
                accepted_tasks: 40,
            });
            user_id
        })
        .collect();

    World {
        service: ArbitrationService::new(config, deps).unwrap(),
        directory,
        clock,
        sink,
        flaky,
        worker,
        requester,
        jurors,
    }
}

impl World {
    /// A claimed task with a rejected submission and a held stake.
    pub fn rejected(&self, evidence: Evidence) -> (TaskId, SubmissionId) {
        let task = Task {
            id: TaskId::new(),
            requester_id: self.requester,
            bounty: Amount::from_major(100),
            currency: Currency::default(),
            required_artefacts: evidence.required_artefacts,
            location: evidence.location,
            radius_m: 50.0,
            deadline: evidence.deadline,
            status: TaskStatus::Claimed,
        };
        let submission = Submission {
            id: SubmissionId::new(),
            task_id: task.id,
            worker_id: self.worker,
            status: SubmissionStatus::Rejected,
            verification_score: evidence.verification,
            artefacts: Vec::new(),
            submitted_at: t0(),
        };
        let ids = (task.id, submission.id);
        self.directory.put_task(task);
        self.directory.put_submission(submission);
        self.service.stake_for_claim(ids.0, self.worker).unwrap();
        ids
    }

    /// Open a dispute on a fresh rejected submission.
    pub fn dispute(&self, evidence: Evidence) -> (TaskId, Dispute) {
        let (task_id, submission_id) = self.rejected(evidence);
        let dispute = self
            .service
            .open_dispute(submission_id, self.worker, "the work matches the brief")
            .unwrap();
        (task_id, dispute)
    }

    pub fn stake_status(&self, task_id: &TaskId) -> StakeStatus {
        self.service.ledger().get_stake(task_id, &self.worker).unwrap().status
    }
}
