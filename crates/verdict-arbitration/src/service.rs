//! # Arbitration Service
//!
//! The entry point that ties the tiers together. It owns the dispute,
//! jury and evidence records and drives each dispute through:
//!
//! ```text
//! open_dispute ─▶ submit_evidence* ─▶ run_auto_score ─┬─▶ finalize_tier1 ─▶ resolved
//!                                                     └─▶ (jury seated) ─▶ cast_vote* ─▶ finalize_voting
//!                                                                                  │
//!                        request_appeal ─▶ admin_resolve ◀─────────────────────────┘
//! ```
//!
//! Every public operation reads the current time from the injected
//! [`Clock`]; [`ArbitrationService::sweep`] takes an explicit `now` so an
//! external scheduler can drive deadline expiry.
//!
//! ## Locking
//!
//! Disputes, juries, evidence and stakes are independently locked per
//! record. Where one operation touches two records it always takes the
//! dispute lock last, except evidence and appeal stakes, which are written
//! while the dispute lock is held so they commit with the status check.
//! The jury lock is never held while the dispute lock is taken.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::json;

use verdict_core::{Amount, Clock, DisputeId, SubmissionId, TaskId, Timestamp, UserId};
use verdict_stake::{
    LedgerSettlement, SettlementProvider, Stake, StakeLedger, StakeRequest,
};

use crate::audit::{AuditAction, AuditLog};
use crate::autoscore::{AutoScoreEngine, Recommendation, ScoringInput};
use crate::collaborators::{
    InMemoryDirectory, PayoutResolver, SubmissionStatus, TaskDirectory, UserDirectory,
};
use crate::config::ArbitrationConfig;
use crate::dispute::{Actor, Decision, Dispute, DisputeStatus, Outcome, Resolver, Tier};
use crate::error::{ArbitrationError, ErrorKind};
use crate::events::{ArbitrationEvent, EventSink};
use crate::evidence::{EvidenceItem, PartySide};
use crate::jury::{JuryPanel, JurySelector, Vote, VoteTally};
use crate::resolution::{ExecutorDeps, ResolutionExecutor, ResolutionRequest};
use crate::settlement::{PendingSettlement, SettlementPlan, SettlementQueue};
use crate::store::Store;
use crate::tier::Escalation;

/// An administrator's Tier-3 ruling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "ruling", rename_all = "snake_case")]
pub enum AdminDecision {
    /// Reinstate the decision the appeal reopened.
    Uphold,
    /// Replace it.
    Override {
        /// The new decision.
        decision: Decision,
    },
}

/// What one sweep did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepReport {
    /// Disputes scored after their evidence window closed.
    pub scored: Vec<DisputeId>,
    /// Disputes moved to Tier 2.
    pub escalated: Vec<DisputeId>,
    /// Tier-1 decisions applied.
    pub tier1_resolved: Vec<DisputeId>,
    /// Juries finalized after their deadline.
    pub voting_finalized: Vec<DisputeId>,
    /// Tier-3 disputes past their target date.
    pub overdue_tier3: Vec<DisputeId>,
    /// Deferred or failed settlements applied.
    pub settlements_applied: usize,
    /// Disputes the sweep could not advance, with the reason.
    pub errors: Vec<(DisputeId, String)>,
}

/// Collaborators the service is built from.
#[derive(Clone)]
pub struct ServiceDeps {
    /// Submissions and tasks.
    pub tasks: Arc<dyn TaskDirectory>,
    /// Profiles and the juror pool.
    pub users: Arc<dyn UserDirectory>,
    /// Payout wallets.
    pub payouts: Arc<dyn PayoutResolver>,
    /// Worker stake backend.
    pub provider: Arc<dyn SettlementProvider>,
    /// Local ledger, also holding appeal stakes.
    pub ledger: Arc<StakeLedger>,
    /// Event delivery.
    pub events: Arc<dyn EventSink>,
    /// Time source.
    pub clock: Arc<dyn Clock>,
}

impl ServiceDeps {
    /// Wire everything to one in-memory directory and a ledger-backed
    /// settlement provider.
    pub fn in_memory(
        directory: Arc<InMemoryDirectory>,
        config: &ArbitrationConfig,
        clock: Arc<dyn Clock>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        let ledger = Arc::new(StakeLedger::new(
            config.stake.clone(),
            directory.clone(),
            Arc::clone(&clock),
        ));
        let provider = Arc::new(LedgerSettlement::new(Arc::clone(&ledger), directory.clone()));
        Self {
            tasks: directory.clone(),
            users: directory.clone(),
            payouts: directory,
            provider,
            ledger,
            events,
            clock,
        }
    }
}

/// The dispute engine.
pub struct ArbitrationService {
    config: ArbitrationConfig,
    deps: ServiceDeps,
    engine: AutoScoreEngine,
    selector: JurySelector,
    disputes: Store<DisputeId, Dispute>,
    by_submission: Store<SubmissionId, DisputeId>,
    juries: Store<DisputeId, JuryPanel>,
    evidence: Store<DisputeId, Vec<EvidenceItem>>,
    audit: Arc<AuditLog>,
    executor: ResolutionExecutor,
}

impl std::fmt::Debug for ArbitrationService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArbitrationService")
            .field("disputes", &self.disputes.len())
            .field("provider", &self.deps.provider.provider_name())
            .finish()
    }
}

impl ArbitrationService {
    /// Build a service. Fails on invalid configuration.
    pub fn new(config: ArbitrationConfig, deps: ServiceDeps) -> Result<Self, ArbitrationError> {
        config.validate()?;
        let disputes = Store::new();
        let audit = Arc::new(AuditLog::new());
        let executor = ResolutionExecutor::new(
            ExecutorDeps {
                disputes: disputes.clone(),
                tasks: Arc::clone(&deps.tasks),
                payouts: Arc::clone(&deps.payouts),
                provider: Arc::clone(&deps.provider),
                ledger: Arc::clone(&deps.ledger),
                queue: SettlementQueue::new(),
                events: Arc::clone(&deps.events),
                audit: Arc::clone(&audit),
            },
            config.slash_requester_share(),
            config.appeal_window(),
        );
        Ok(Self {
            engine: AutoScoreEngine::new(config.thresholds),
            selector: JurySelector::new(config.jury.clone()),
            config,
            deps,
            disputes,
            by_submission: Store::new(),
            juries: Store::new(),
            evidence: Store::new(),
            audit,
            executor,
        })
    }

    // ── Tier 1 ─────────────────────────────────────────────────────────

    /// Open a dispute on a rejected submission and start the evidence
    /// window.
    pub fn open_dispute(
        &self,
        submission_id: SubmissionId,
        worker_id: UserId,
        reason: &str,
    ) -> Result<Dispute, ArbitrationError> {
        let now = self.deps.clock.now();
        let submission = self
            .deps
            .tasks
            .get_submission(&submission_id)?
            .ok_or(ArbitrationError::SubmissionNotFound(submission_id))?;
        if submission.worker_id != worker_id {
            return Err(ArbitrationError::NotSubmitter {
                submission_id,
                user_id: worker_id,
            });
        }
        if submission.status != SubmissionStatus::Rejected {
            return Err(ArbitrationError::InvalidSubmissionStatus {
                submission_id,
                status: submission.status.as_str().to_string(),
                operation: "open dispute",
            });
        }
        let task = self
            .deps
            .tasks
            .get_task(&submission.task_id)?
            .ok_or(ArbitrationError::TaskNotFound(submission.task_id))?;

        let mut dispute = Dispute::open(
            submission_id,
            submission.task_id,
            worker_id,
            task.requester_id,
            reason,
            now,
        );
        let evidence_deadline = now.plus(self.config.evidence_window());
        dispute.open_evidence_window(evidence_deadline, now)?;

        if !self.by_submission.insert_new(submission_id, dispute.id) {
            let existing = self.by_submission.get(&submission_id);
            let concluded = existing
                .and_then(|id| self.disputes.get(&id))
                .filter(|d| !d.status.is_active());
            return Err(match (existing, concluded) {
                (Some(dispute_id), Some(_)) => ArbitrationError::AlreadyArbitrated {
                    submission_id,
                    dispute_id,
                },
                (existing, _) => ArbitrationError::DisputeAlreadyOpen {
                    submission_id,
                    dispute_id: existing.unwrap_or(dispute.id),
                },
            });
        }
        self.evidence.insert(dispute.id, Vec::new());
        self.disputes.insert(dispute.id, dispute.clone());

        tracing::info!(
            dispute_id = %dispute.id,
            submission_id = %submission_id,
            worker_id = %worker_id,
            evidence_deadline = %evidence_deadline,
            "dispute opened"
        );
        self.record(
            dispute.id,
            AuditAction::DisputeOpened,
            Actor::Party(worker_id),
            json!({ "submission_id": submission_id, "reason": reason, "evidence_deadline": evidence_deadline }),
            now,
        );
        self.deps.events.publish(ArbitrationEvent::DisputeOpened {
            dispute_id: dispute.id,
            submission_id,
            worker_id,
            evidence_deadline,
        });
        Ok(dispute)
    }

    /// Attach evidence while the evidence window is open.
    pub fn submit_evidence(
        &self,
        dispute_id: DisputeId,
        user_id: UserId,
        description: &str,
        content: &[u8],
    ) -> Result<EvidenceItem, ArbitrationError> {
        let now = self.deps.clock.now();
        let item = self
            .disputes
            .try_update(&dispute_id, |d| {
                let side = if user_id == d.worker_id {
                    PartySide::Worker
                } else if user_id == d.requester_id {
                    PartySide::Requester
                } else {
                    return Err(ArbitrationError::NotAParty { dispute_id, user_id });
                };
                let deadline = d.evidence_deadline.unwrap_or(d.opened_at);
                if d.status != DisputeStatus::EvidencePending || now.is_past(&deadline) {
                    return Err(ArbitrationError::DeadlinePassed {
                        dispute_id,
                        window: "evidence",
                        deadline: deadline.to_iso8601(),
                    });
                }
                let item = EvidenceItem::new(dispute_id, user_id, side, description, content, now);
                let stored = item.clone();
                self.evidence
                    .try_update(&dispute_id, move |items| -> Result<(), ArbitrationError> {
                        items.push(stored);
                        Ok(())
                    })
                    .unwrap_or(Ok(()))?;
                Ok(item)
            })
            .ok_or(ArbitrationError::DisputeNotFound(dispute_id))??;

        tracing::info!(dispute_id = %dispute_id, evidence_id = %item.id, side = ?item.side, "evidence submitted");
        self.record(
            dispute_id,
            AuditAction::EvidenceSubmitted,
            Actor::Party(user_id),
            json!({ "evidence_id": item.id, "digest": item.content_digest.to_hex(), "len": item.content_len }),
            now,
        );
        Ok(item)
    }

    /// Score the dispute and enter Tier-1 review. A no-op on a dispute that
    /// is already scored. An `escalate` recommendation seats a jury at once.
    pub fn run_auto_score(&self, dispute_id: DisputeId) -> Result<Dispute, ArbitrationError> {
        self.score_at(dispute_id, self.deps.clock.now())
    }

    fn score_at(&self, dispute_id: DisputeId, now: Timestamp) -> Result<Dispute, ArbitrationError> {
        let dispute = self.load(dispute_id)?;
        if dispute.auto_score_result.is_some() {
            return Ok(dispute);
        }
        let submission = self
            .deps
            .tasks
            .get_submission(&dispute.submission_id)?
            .ok_or(ArbitrationError::SubmissionNotFound(dispute.submission_id))?;
        let task = self
            .deps
            .tasks
            .get_task(&dispute.task_id)?
            .ok_or(ArbitrationError::TaskNotFound(dispute.task_id))?;
        let input = ScoringInput {
            verification_score: submission.verification_score,
            artefacts: submission.artefacts,
            required_artefacts: task.required_artefacts,
            task_location: task.location,
            radius_m: task.radius_m,
            submitted_at: submission.submitted_at,
            task_deadline: task.deadline,
        };
        let result = self.engine.score(&input, now);
        let review_deadline = now.plus(self.config.tier1_review());

        let (scored, fresh) = self
            .disputes
            .try_update(&dispute_id, |d| {
                if d.auto_score_result.is_some() {
                    return Ok((d.clone(), false));
                }
                d.record_auto_score(result.clone(), review_deadline, now)?;
                Ok::<_, ArbitrationError>((d.clone(), true))
            })
            .ok_or(ArbitrationError::DisputeNotFound(dispute_id))??;
        if !fresh {
            return Ok(scored);
        }

        tracing::info!(
            dispute_id = %dispute_id,
            score = result.score,
            recommendation = result.recommendation.as_str(),
            "dispute scored"
        );
        self.record(dispute_id, AuditAction::AutoScored, Actor::System, json!(result), now);

        if result.recommendation == Recommendation::Escalate {
            match self.enter_tier2(dispute_id, Actor::System, Tier::One, "score recommends jury review", now) {
                Ok(escalated) => return Ok(escalated),
                Err(e) => {
                    tracing::warn!(dispute_id = %dispute_id, error = %e, "automatic escalation deferred");
                }
            }
        }
        Ok(scored)
    }

    /// Apply a decisive Tier-1 recommendation once the review window has
    /// closed, or escalate an `escalate` recommendation.
    pub fn finalize_tier1(&self, dispute_id: DisputeId) -> Result<Dispute, ArbitrationError> {
        self.finalize_tier1_at(dispute_id, self.deps.clock.now())
    }

    fn finalize_tier1_at(&self, dispute_id: DisputeId, now: Timestamp) -> Result<Dispute, ArbitrationError> {
        let dispute = self.load(dispute_id)?;
        if dispute.status == DisputeStatus::Resolved {
            return Err(ArbitrationError::AlreadyResolved { dispute_id });
        }
        let recommendation = match (&dispute.auto_score_result, dispute.status) {
            (Some(result), DisputeStatus::Tier1Review) => result.recommendation,
            _ => {
                return Err(ArbitrationError::InvalidTransition {
                    dispute_id,
                    from: dispute.status.as_str().to_string(),
                    to: DisputeStatus::Resolved.as_str().to_string(),
                    reason: "tier 1 finalizes only a scored dispute in review".into(),
                })
            }
        };

        match Outcome::from_recommendation(recommendation) {
            None => self.enter_tier2(dispute_id, Actor::System, Tier::One, "score recommends jury review", now),
            Some(outcome) => {
                if let Some(deadline) = dispute.tier1_deadline {
                    if !now.is_past(&deadline) {
                        return Err(ArbitrationError::DeadlineNotReached {
                            dispute_id,
                            window: "tier1 review",
                            deadline: deadline.to_iso8601(),
                        });
                    }
                }
                self.executor.execute(
                    ResolutionRequest {
                        dispute_id,
                        decision: Decision::pure(outcome),
                        resolver: Resolver::AutoScore,
                        actor: Actor::System,
                        expected_tier: Some(Tier::One),
                    },
                    now,
                )
            }
        }
    }

    // ── Escalation ─────────────────────────────────────────────────────

    /// A party asks for jury review of a Tier-1 recommendation.
    pub fn request_escalation(
        &self,
        dispute_id: DisputeId,
        user_id: UserId,
        expected_tier: Tier,
    ) -> Result<Dispute, ArbitrationError> {
        let now = self.deps.clock.now();
        self.enter_tier2(dispute_id, Actor::Party(user_id), expected_tier, "party requested jury review", now)
    }

    /// An administrator routes a dispute to a higher tier, bypassing the
    /// party guards.
    pub fn admin_escalate(
        &self,
        dispute_id: DisputeId,
        admin_id: UserId,
        expected_tier: Tier,
        target: Tier,
    ) -> Result<Dispute, ArbitrationError> {
        let now = self.deps.clock.now();
        if target == Tier::Two {
            return self.enter_tier2(dispute_id, Actor::Admin(admin_id), expected_tier, "administrator override", now);
        }
        let escalation = Escalation {
            target,
            expected_tier,
            actor: Actor::Admin(admin_id),
            reason: "administrator override".into(),
            deadline: now.plus(self.config.tier3_appeal()),
        };
        let dispute = self
            .disputes
            .try_update(&dispute_id, |d| {
                d.escalate(escalation, now)?;
                Ok::<_, ArbitrationError>(d.clone())
            })
            .ok_or(ArbitrationError::DisputeNotFound(dispute_id))??;

        if self
            .juries
            .try_update(&dispute_id, |panel| -> Result<(), ArbitrationError> {
                panel.closed = true;
                Ok(())
            })
            .is_some()
        {
            tracing::info!(dispute_id = %dispute_id, "jury dismissed by administrator");
        }
        self.announce_escalation(&dispute, expected_tier, Actor::Admin(admin_id), now);
        Ok(dispute)
    }

    fn enter_tier2(
        &self,
        dispute_id: DisputeId,
        actor: Actor,
        expected_tier: Tier,
        reason: &str,
        now: Timestamp,
    ) -> Result<Dispute, ArbitrationError> {
        let deadline = now.plus(self.config.tier2_voting());
        let escalation = Escalation {
            target: Tier::Two,
            expected_tier,
            actor,
            reason: reason.to_string(),
            deadline,
        };

        // Check the guards before seating anyone.
        let mut probe = self.load(dispute_id)?;
        probe.escalate(escalation.clone(), now)?;

        let candidates = self.deps.users.juror_candidates()?;
        let seated = self.juries.get(&dispute_id).map(|p| p.juror_ids()).unwrap_or_default();
        let jurors = self.selector.select(
            dispute_id,
            &[probe.worker_id, probe.requester_id],
            &seated,
            &candidates,
        )?;
        let juror_ids: Vec<UserId> = jurors.iter().map(|j| j.juror_id).collect();
        let inserted = self.juries.insert_new(dispute_id, JuryPanel::new(dispute_id, jurors, deadline));

        let committed = self
            .disputes
            .try_update(&dispute_id, |d| {
                d.escalate(escalation, now)?;
                Ok::<_, ArbitrationError>(d.clone())
            })
            .ok_or(ArbitrationError::DisputeNotFound(dispute_id));
        let dispute = match committed {
            Ok(Ok(dispute)) => dispute,
            Ok(Err(e)) | Err(e) => {
                if inserted {
                    self.juries.remove(&dispute_id);
                }
                return Err(e);
            }
        };

        tracing::info!(dispute_id = %dispute_id, jurors = juror_ids.len(), deadline = %deadline, "jury seated");
        self.record(
            dispute_id,
            AuditAction::JurySeated,
            Actor::System,
            json!({ "jurors": juror_ids, "deadline": deadline }),
            now,
        );
        self.announce_escalation(&dispute, expected_tier, actor, now);
        Ok(dispute)
    }

    fn announce_escalation(&self, dispute: &Dispute, from_tier: Tier, actor: Actor, now: Timestamp) {
        tracing::info!(
            dispute_id = %dispute.id,
            from_tier = %from_tier,
            to_tier = %dispute.current_tier,
            status = dispute.status.as_str(),
            "dispute escalated"
        );
        self.record(
            dispute.id,
            AuditAction::Escalated,
            actor,
            json!({ "from_tier": from_tier, "to_tier": dispute.current_tier, "status": dispute.status }),
            now,
        );
        self.deps.events.publish(ArbitrationEvent::DisputeEscalated {
            dispute_id: dispute.id,
            from_tier,
            to_tier: dispute.current_tier,
            actor,
            at: now,
        });
    }

    // ── Tier 2 ─────────────────────────────────────────────────────────

    /// Record a juror's vote. Finalizes the jury when the last vote lands.
    pub fn cast_vote(&self, dispute_id: DisputeId, juror_id: UserId, vote: Vote) -> Result<VoteTally, ArbitrationError> {
        let now = self.deps.clock.now();
        let dispute = self.load(dispute_id)?;
        if dispute.status != DisputeStatus::Tier2Voting {
            return Err(ArbitrationError::VotingClosed { dispute_id });
        }
        let tally = self
            .juries
            .try_update(&dispute_id, |panel| panel.cast_vote(juror_id, vote, now))
            .ok_or(ArbitrationError::JuryNotSeated(dispute_id))??;

        tracing::info!(
            dispute_id = %dispute_id,
            juror_id = %juror_id,
            cast = tally.votes_cast,
            seated = tally.seated,
            "vote cast"
        );
        self.record(
            dispute_id,
            AuditAction::VoteCast,
            Actor::Party(juror_id),
            json!({ "vote": vote, "votes_cast": tally.votes_cast }),
            now,
        );

        if tally.all_voted() {
            if let Err(e) = self.finalize_voting_at(dispute_id, now) {
                match e.kind() {
                    ErrorKind::Conflict => {
                        tracing::debug!(dispute_id = %dispute_id, error = %e, "voting already finalized")
                    }
                    _ => tracing::warn!(dispute_id = %dispute_id, error = %e, "voting finalization failed"),
                }
            }
        }
        Ok(tally)
    }

    /// Close the jury and apply its verdict. Allowed once every juror has
    /// voted or the voting deadline has passed.
    pub fn finalize_voting(&self, dispute_id: DisputeId) -> Result<Dispute, ArbitrationError> {
        self.finalize_voting_at(dispute_id, self.deps.clock.now())
    }

    fn finalize_voting_at(&self, dispute_id: DisputeId, now: Timestamp) -> Result<Dispute, ArbitrationError> {
        let tally = self
            .juries
            .try_update(&dispute_id, |panel| {
                if panel.closed {
                    return Err(ArbitrationError::VotingClosed { dispute_id });
                }
                if !panel.is_complete(now) {
                    let tally = panel.tally();
                    return Err(ArbitrationError::VotingStillOpen {
                        dispute_id,
                        cast: tally.votes_cast,
                        seated: tally.seated,
                    });
                }
                panel.closed = true;
                Ok(panel.tally())
            })
            .ok_or(ArbitrationError::JuryNotSeated(dispute_id))??;

        tracing::info!(
            dispute_id = %dispute_id,
            worker_weight = tally.worker_weight,
            requester_weight = tally.requester_weight,
            abstentions = tally.abstentions,
            "voting closed"
        );

        match tally.outcome() {
            Some(outcome) => self.executor.execute(
                ResolutionRequest {
                    dispute_id,
                    decision: Decision::pure(outcome),
                    resolver: Resolver::Jury,
                    actor: Actor::System,
                    expected_tier: Some(Tier::Two),
                },
                now,
            ),
            None => {
                let tier3_deadline = now.plus(self.config.tier3_appeal());
                let dispute = self
                    .disputes
                    .try_update(&dispute_id, |d| {
                        d.close_voting_without_votes(tally.seated, tier3_deadline, now)?;
                        Ok::<_, ArbitrationError>(d.clone())
                    })
                    .ok_or(ArbitrationError::DisputeNotFound(dispute_id))??;
                self.announce_escalation(&dispute, Tier::Two, Actor::System, now);
                Ok(dispute)
            }
        }
    }

    // ── Tier 3 ─────────────────────────────────────────────────────────

    /// The losing party appeals a jury decision, staking at least the
    /// configured fraction of the bounty.
    pub fn request_appeal(
        &self,
        dispute_id: DisputeId,
        appellant_id: UserId,
        stake: Amount,
        expected_tier: Tier,
    ) -> Result<Dispute, ArbitrationError> {
        let now = self.deps.clock.now();
        let current = self.load(dispute_id)?;
        let task = self
            .deps
            .tasks
            .get_task(&current.task_id)?
            .ok_or(ArbitrationError::TaskNotFound(current.task_id))?;
        let required = task.bounty.apply_bps(self.config.appeal_stake_fraction());
        if stake < required || !stake.is_positive() {
            return Err(ArbitrationError::AppealStakeTooSmall {
                required,
                offered: stake,
            });
        }

        let tier3_deadline = now.plus(self.config.tier3_appeal());
        let dispute = self
            .disputes
            .try_update(&dispute_id, |d| {
                let mut next = d.clone();
                next.reopen_for_appeal(appellant_id, stake, expected_tier, tier3_deadline, now)?;
                let deferred = self.executor.cancel_deferred(&next)?;
                if let Err(e) = self.deps.ledger.hold_appeal_stake(
                    &next.task_id,
                    &dispute_id,
                    &appellant_id,
                    stake,
                    task.currency.clone(),
                ) {
                    self.executor.restore_deferred(deferred);
                    return Err(ArbitrationError::from(e));
                }
                *d = next;
                Ok::<_, ArbitrationError>(d.clone())
            })
            .ok_or(ArbitrationError::DisputeNotFound(dispute_id))??;

        tracing::info!(dispute_id = %dispute_id, appellant = %appellant_id, stake = %stake, "dispute appealed");
        self.record(
            dispute_id,
            AuditAction::Appealed,
            Actor::Party(appellant_id),
            json!({ "stake": stake, "superseded": dispute.superseded_resolution }),
            now,
        );
        self.deps.events.publish(ArbitrationEvent::DisputeAppealed {
            dispute_id,
            appellant_id,
            stake,
            at: now,
        });
        Ok(dispute)
    }

    /// Final administrative ruling on a dispute in Tier 3.
    pub fn admin_resolve(
        &self,
        dispute_id: DisputeId,
        admin_id: UserId,
        ruling: AdminDecision,
    ) -> Result<Dispute, ArbitrationError> {
        let now = self.deps.clock.now();
        let dispute = self.load(dispute_id)?;
        if dispute.status == DisputeStatus::Resolved {
            return Err(ArbitrationError::AlreadyResolved { dispute_id });
        }
        let decision = match ruling {
            AdminDecision::Uphold => dispute
                .superseded_resolution
                .as_ref()
                .map(|r| r.decision())
                .ok_or(ArbitrationError::NothingToUphold { dispute_id })?,
            AdminDecision::Override { decision } => {
                decision.validate()?;
                decision
            }
        };
        self.executor.execute(
            ResolutionRequest {
                dispute_id,
                decision,
                resolver: Resolver::Admin { user_id: admin_id },
                actor: Actor::Admin(admin_id),
                expected_tier: Some(Tier::Three),
            },
            now,
        )
    }

    // ── Stakes ─────────────────────────────────────────────────────────

    /// Create and hold the worker's stake when they claim a task.
    pub fn stake_for_claim(&self, task_id: TaskId, worker_id: UserId) -> Result<Stake, ArbitrationError> {
        let task = self
            .deps
            .tasks
            .get_task(&task_id)?
            .ok_or(ArbitrationError::TaskNotFound(task_id))?;
        let profile = self
            .deps
            .users
            .profile(&worker_id)?
            .ok_or(ArbitrationError::UserNotFound(worker_id))?;
        let required = self
            .config
            .stake
            .required_stake(task.bounty, profile.strike_count, profile.reputation);

        let allowance = self.deps.provider.check_allowance(&worker_id, required.amount)?;
        if !allowance.sufficient {
            return Err(ArbitrationError::InsufficientFunds {
                worker_id,
                required: allowance.required,
                available: allowance.available,
            });
        }
        let stake = self.deps.provider.create_stake(&StakeRequest {
            task_id,
            worker_id,
            requester_id: task.requester_id,
            bounty: task.bounty,
            strike_count: profile.strike_count,
            reputation: profile.reputation,
            currency: task.currency,
        })?;
        Ok(stake)
    }

    /// Release a held stake when the work was accepted, or rejected and
    /// never disputed. Returns `None` if there is no stake.
    pub fn settle_without_dispute(&self, task_id: TaskId, worker_id: UserId) -> Result<Option<Stake>, ArbitrationError> {
        let disputed = self
            .disputes
            .list()
            .into_iter()
            .find(|d| d.task_id == task_id && d.worker_id == worker_id);
        if let Some(dispute) = disputed {
            return Err(if dispute.status.is_active() {
                ArbitrationError::DisputeAlreadyOpen {
                    submission_id: dispute.submission_id,
                    dispute_id: dispute.id,
                }
            } else {
                ArbitrationError::AlreadyArbitrated {
                    submission_id: dispute.submission_id,
                    dispute_id: dispute.id,
                }
            });
        }
        let stake = SettlementPlan::Release.apply(
            self.deps.provider.as_ref(),
            &task_id,
            &worker_id,
            "settled without dispute",
        )?;
        if let Some(result) = stake.as_ref().and_then(Stake::result) {
            self.deps.events.publish(ArbitrationEvent::StakeSettled {
                dispute_id: None,
                result,
            });
        }
        Ok(stake)
    }

    /// Attempt every due deferred or failed settlement.
    pub fn retry_settlements(&self, now: Timestamp) -> usize {
        self.executor.retry_settlements(now)
    }

    // ── Sweep ──────────────────────────────────────────────────────────

    /// Advance every dispute whose deadline has passed as of `now`, then
    /// retry due settlements.
    pub fn sweep(&self, now: Timestamp) -> SweepReport {
        let mut report = SweepReport::default();
        for dispute in self.disputes.list() {
            let id = dispute.id;
            let past = |deadline: Option<Timestamp>| deadline.is_some_and(|d| now.is_past(&d));
            let outcome = match dispute.status {
                DisputeStatus::EvidencePending if past(dispute.evidence_deadline) => {
                    self.score_at(id, now).map(|d| {
                        report.scored.push(id);
                        if d.status == DisputeStatus::Tier2Voting {
                            report.escalated.push(id);
                        }
                    })
                }
                DisputeStatus::Tier1Review => {
                    let escalate = dispute
                        .auto_score_result
                        .as_ref()
                        .is_some_and(|r| r.recommendation == Recommendation::Escalate);
                    if escalate || past(dispute.tier1_deadline) {
                        self.finalize_tier1_at(id, now).map(|d| match d.status {
                            DisputeStatus::Tier2Voting => report.escalated.push(id),
                            _ => report.tier1_resolved.push(id),
                        })
                    } else {
                        Ok(())
                    }
                }
                DisputeStatus::Tier2Voting if past(dispute.tier2_deadline) => {
                    self.finalize_voting_at(id, now).map(|_| report.voting_finalized.push(id))
                }
                DisputeStatus::Tier3Appeal if past(dispute.tier3_deadline) => {
                    tracing::warn!(dispute_id = %id, "tier 3 decision overdue");
                    report.overdue_tier3.push(id);
                    Ok(())
                }
                _ => Ok(()),
            };
            if let Err(e) = outcome {
                tracing::warn!(dispute_id = %id, error = %e, "sweep could not advance dispute");
                report.errors.push((id, e.to_string()));
            }
        }
        report.settlements_applied = self.retry_settlements(now);
        tracing::info!(
            scored = report.scored.len(),
            escalated = report.escalated.len(),
            tier1_resolved = report.tier1_resolved.len(),
            voting_finalized = report.voting_finalized.len(),
            overdue = report.overdue_tier3.len(),
            settlements = report.settlements_applied,
            errors = report.errors.len(),
            "sweep complete"
        );
        report
    }

    // ── Reads ──────────────────────────────────────────────────────────

    /// A dispute.
    pub fn dispute(&self, dispute_id: &DisputeId) -> Option<Dispute> {
        self.disputes.get(dispute_id)
    }

    /// Every dispute.
    pub fn disputes(&self) -> Vec<Dispute> {
        self.disputes.list()
    }

    /// The dispute's jury, if seated.
    pub fn jury(&self, dispute_id: &DisputeId) -> Option<JuryPanel> {
        self.juries.get(dispute_id)
    }

    /// Evidence submitted on a dispute, in submission order.
    pub fn evidence(&self, dispute_id: &DisputeId) -> Vec<EvidenceItem> {
        self.evidence.get(dispute_id).unwrap_or_default()
    }

    /// The audit trail.
    pub fn audit(&self) -> &AuditLog {
        &self.audit
    }

    /// The stake ledger.
    pub fn ledger(&self) -> &Arc<StakeLedger> {
        &self.deps.ledger
    }

    /// Deferred and failed settlements.
    pub fn pending_settlements(&self) -> Vec<PendingSettlement> {
        self.executor.queue().list()
    }

    /// The configuration in force.
    pub fn config(&self) -> &ArbitrationConfig {
        &self.config
    }

    fn load(&self, dispute_id: DisputeId) -> Result<Dispute, ArbitrationError> {
        self.disputes
            .get(&dispute_id)
            .ok_or(ArbitrationError::DisputeNotFound(dispute_id))
    }

    fn record(&self, dispute_id: DisputeId, action: AuditAction, actor: Actor, details: serde_json::Value, now: Timestamp) {
        if let Err(e) = self.audit.append(dispute_id, action, actor, details, now) {
            tracing::error!(dispute_id = %dispute_id, error = %e, "audit append failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use verdict_core::{BasisPoints, Currency, ManualClock};
    use verdict_stake::{AppealStakeStatus, StakeStatus};

    use crate::autoscore::GeoPoint;
    use crate::collaborators::{Submission, Task, TaskStatus, UserProfile};
    use crate::events::RecordingSink;

    fn t0() -> Timestamp {
        Timestamp::parse("2026-03-01T12:00:00Z").unwrap()
    }

    struct Harness {
        service: ArbitrationService,
        directory: Arc<InMemoryDirectory>,
        clock: ManualClock,
        sink: Arc<RecordingSink>,
        worker: UserId,
        requester: UserId,
        jurors: Vec<UserId>,
    }

    fn profile(user_id: UserId, reliability: u8) -> UserProfile {
        UserProfile {
            user_id,
            reputation: 50,
            strike_count: 0,
            reliability,
            accepted_tasks: 20,
        }
    }

    fn harness_with(jurors: usize) -> Harness {
        let clock = ManualClock::new(t0());
        let directory = Arc::new(InMemoryDirectory::new());
        let sink = Arc::new(RecordingSink::new());
        let config = ArbitrationConfig::default();
        let deps = ServiceDeps::in_memory(
            Arc::clone(&directory),
            &config,
            Arc::new(clock.clone()),
            sink.clone(),
        );
        let worker = UserId::new();
        let requester = UserId::new();
        // Parties are excluded from the jury even when eligible.
        directory.put_profile(profile(worker, 99));
        directory.put_profile(profile(requester, 99));
        directory.set_balance(worker, Amount::from_major(1_000));
        let jurors: Vec<UserId> = (0..jurors).map(|_| UserId::new()).collect();
        for id in &jurors {
            directory.put_profile(profile(*id, 95));
        }
        Harness {
            service: ArbitrationService::new(config, deps).unwrap(),
            directory,
            clock,
            sink,
            worker,
            requester,
            jurors,
        }
    }

    fn harness() -> Harness {
        harness_with(5)
    }

    /// Verification 100, nothing missing: scores 92.5.
    fn strong() -> (u8, u32, Option<GeoPoint>, Option<Timestamp>) {
        (100, 0, None, None)
    }

    /// Verification 0, nothing missing: scores 62.5.
    fn middling() -> (u8, u32, Option<GeoPoint>, Option<Timestamp>) {
        (0, 0, None, None)
    }

    /// No artefacts, no GPS, late: scores 20.0.
    fn weak() -> (u8, u32, Option<GeoPoint>, Option<Timestamp>) {
        (0, 4, Some(GeoPoint { lat: 0.0, lon: 0.0 }), Some(t0().plus(Duration::hours(-1))))
    }

    impl Harness {
        fn rejected_submission(&self, profile: (u8, u32, Option<GeoPoint>, Option<Timestamp>)) -> (TaskId, SubmissionId) {
            let (verification, required, location, deadline) = profile;
            let task = Task {
                id: TaskId::new(),
                requester_id: self.requester,
                bounty: Amount::from_major(100),
                currency: Currency::default(),
                required_artefacts: required,
                location,
                radius_m: 100.0,
                deadline,
                status: TaskStatus::Claimed,
            };
            let submission = Submission {
                id: SubmissionId::new(),
                task_id: task.id,
                worker_id: self.worker,
                status: SubmissionStatus::Rejected,
                verification_score: verification,
                artefacts: Vec::new(),
                submitted_at: t0(),
            };
            let ids = (task.id, submission.id);
            self.directory.put_task(task);
            self.directory.put_submission(submission);
            self.service.stake_for_claim(ids.0, self.worker).unwrap();
            ids
        }

        fn open(&self, profile: (u8, u32, Option<GeoPoint>, Option<Timestamp>)) -> (TaskId, Dispute) {
            let (task_id, submission_id) = self.rejected_submission(profile);
            let dispute = self.service.open_dispute(submission_id, self.worker, "photos were fine").unwrap();
            (task_id, dispute)
        }

        fn stake_status(&self, task_id: &TaskId) -> StakeStatus {
            self.service.ledger().get_stake(task_id, &self.worker).unwrap().status
        }
    }

    #[test]
    fn open_requires_rejected_submission_by_the_worker() {
        let h = harness();
        let (_, submission_id) = h.rejected_submission(strong());

        let err = h.service.open_dispute(submission_id, h.requester, "x").unwrap_err();
        assert!(matches!(err, ArbitrationError::NotSubmitter { .. }));

        let mut pending = h.directory.submission(&submission_id).unwrap();
        pending.status = SubmissionStatus::Pending;
        h.directory.put_submission(pending);
        let err = h.service.open_dispute(submission_id, h.worker, "x").unwrap_err();
        assert!(matches!(err, ArbitrationError::InvalidSubmissionStatus { .. }));
    }

    #[test]
    fn one_dispute_per_submission() {
        let h = harness();
        let (_, submission_id) = h.rejected_submission(strong());
        let first = h.service.open_dispute(submission_id, h.worker, "x").unwrap();
        assert_eq!(first.status, DisputeStatus::EvidencePending);
        assert_eq!(first.evidence_deadline, Some(t0().plus(Duration::hours(48))));

        let err = h.service.open_dispute(submission_id, h.worker, "again").unwrap_err();
        assert_eq!(
            err,
            ArbitrationError::DisputeAlreadyOpen {
                submission_id,
                dispute_id: first.id
            }
        );
    }

    #[test]
    fn evidence_only_from_parties_inside_the_window() {
        let h = harness();
        let (_, dispute) = h.open(strong());

        let item = h.service.submit_evidence(dispute.id, h.requester, "receipt", b"pdf").unwrap();
        assert!(item.verify(b"pdf").is_ok());
        assert_eq!(h.service.evidence(&dispute.id).len(), 1);

        let err = h.service.submit_evidence(dispute.id, h.jurors[0], "x", b"x").unwrap_err();
        assert!(matches!(err, ArbitrationError::NotAParty { .. }));

        h.clock.advance(Duration::hours(48));
        assert!(h.service.submit_evidence(dispute.id, h.worker, "edge", b"y").is_ok());
        h.clock.advance(Duration::seconds(1));
        let err = h.service.submit_evidence(dispute.id, h.worker, "late", b"z").unwrap_err();
        assert!(matches!(err, ArbitrationError::DeadlinePassed { window: "evidence", .. }));
    }

    #[test]
    fn tier1_worker_win_applies_after_review_window() {
        let h = harness();
        let (task_id, dispute) = h.open(strong());
        let scored = h.service.run_auto_score(dispute.id).unwrap();
        assert_eq!(scored.status, DisputeStatus::Tier1Review);
        assert_eq!(scored.auto_score_result.as_ref().unwrap().score, 92.5);

        let err = h.service.finalize_tier1(dispute.id).unwrap_err();
        assert!(matches!(err, ArbitrationError::DeadlineNotReached { .. }));

        h.clock.advance(Duration::hours(25));
        let resolved = h.service.finalize_tier1(dispute.id).unwrap();
        assert_eq!(resolved.status, DisputeStatus::Resolved);
        assert_eq!(resolved.current_tier, Tier::One);
        assert_eq!(h.stake_status(&task_id), StakeStatus::Released);
        assert_eq!(h.directory.task(&task_id).unwrap().status, TaskStatus::Accepted);
        assert_eq!(
            h.directory.submission(&dispute.submission_id).unwrap().status,
            SubmissionStatus::Accepted
        );

        let events = h.sink.resolutions();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].worker_payout.amount, Amount::from_major(100));
        assert!(h.service.audit().verify_chain().is_ok());
    }

    #[test]
    fn rescoring_is_a_no_op() {
        let h = harness();
        let (_, dispute) = h.open(weak());
        let first = h.service.run_auto_score(dispute.id).unwrap();
        h.clock.advance(Duration::hours(1));
        let second = h.service.run_auto_score(dispute.id).unwrap();
        assert_eq!(first.auto_score_result, second.auto_score_result);
        assert_eq!(first.tier_history.len(), second.tier_history.len());
    }

    #[test]
    fn escalate_recommendation_seats_jury() {
        let h = harness();
        let (_, dispute) = h.open(middling());
        let escalated = h.service.run_auto_score(dispute.id).unwrap();
        assert_eq!(escalated.status, DisputeStatus::Tier2Voting);
        assert_eq!(escalated.current_tier, Tier::Two);

        let jury = h.service.jury(&dispute.id).unwrap();
        assert_eq!(jury.jurors.len(), 5);
        assert!(!jury.juror_ids().contains(&h.worker));
        assert!(!jury.juror_ids().contains(&h.requester));
    }

    #[test]
    fn too_few_jurors_leaves_dispute_in_tier1() {
        let h = harness_with(3);
        let (_, dispute) = h.open(middling());
        let scored = h.service.run_auto_score(dispute.id).unwrap();
        assert_eq!(scored.status, DisputeStatus::Tier1Review);
        assert!(h.service.jury(&dispute.id).is_none());

        let report = h.service.sweep(t0().plus(Duration::hours(1)));
        assert_eq!(report.errors.len(), 1);
        assert_eq!(h.service.dispute(&dispute.id).unwrap().status, DisputeStatus::Tier1Review);
    }

    #[test]
    fn jury_decision_defers_settlement_until_appeal_window_closes() {
        let h = harness();
        let (task_id, dispute) = h.open(middling());
        h.service.run_auto_score(dispute.id).unwrap();
        let jurors = h.service.jury(&dispute.id).unwrap().juror_ids();
        for juror in &jurors {
            h.service.cast_vote(dispute.id, *juror, Vote::Requester).unwrap();
        }

        let resolved = h.service.dispute(&dispute.id).unwrap();
        assert_eq!(resolved.status, DisputeStatus::Resolved);
        assert_eq!(resolved.appeal_deadline, Some(t0().plus(Duration::hours(48))));
        assert_eq!(h.stake_status(&task_id), StakeStatus::Held);
        assert_eq!(h.service.pending_settlements().len(), 1);

        assert_eq!(h.service.retry_settlements(t0().plus(Duration::hours(48))), 0);
        assert_eq!(h.service.retry_settlements(t0().plus(Duration::hours(49))), 1);
        assert_eq!(h.stake_status(&task_id), StakeStatus::Slashed);
        assert!(h.service.pending_settlements().is_empty());
    }

    #[test]
    fn appeal_after_settlement_started_is_rejected() {
        let h = harness();
        let (task_id, dispute) = h.open(middling());
        h.service.run_auto_score(dispute.id).unwrap();
        for juror in h.service.jury(&dispute.id).unwrap().juror_ids() {
            h.service.cast_vote(dispute.id, juror, Vote::Requester).unwrap();
        }

        // A sweep driven by a later clock settles while the service clock
        // still sits inside the appeal window.
        assert_eq!(h.service.retry_settlements(t0().plus(Duration::hours(49))), 1);
        assert_eq!(h.stake_status(&task_id), StakeStatus::Slashed);

        let err = h
            .service
            .request_appeal(dispute.id, h.worker, Amount::from_major(10), Tier::Two)
            .unwrap_err();
        assert_eq!(err, ArbitrationError::SettlementStarted { dispute_id: dispute.id });
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert_eq!(h.service.dispute(&dispute.id).unwrap().status, DisputeStatus::Resolved);
        assert!(h.service.ledger().get_appeal_stake(&task_id, &dispute.id).is_none());
    }

    #[test]
    fn claimed_deferred_settlement_blocks_appeal() {
        let h = harness();
        let (task_id, dispute) = h.open(middling());
        h.service.run_auto_score(dispute.id).unwrap();
        for juror in h.service.jury(&dispute.id).unwrap().juror_ids() {
            h.service.cast_vote(dispute.id, juror, Vote::Requester).unwrap();
        }

        let claimed = h.service.executor.queue().claim(&task_id, &h.worker).unwrap();
        let err = h
            .service
            .request_appeal(dispute.id, h.worker, Amount::from_major(10), Tier::Two)
            .unwrap_err();
        assert_eq!(err, ArbitrationError::SettlementStarted { dispute_id: dispute.id });

        // Once the claim is released the appeal goes through.
        h.service
            .executor
            .queue()
            .record_failure(&claimed.task_id, &claimed.worker_id, "interrupted");
        let appealed = h
            .service
            .request_appeal(dispute.id, h.worker, Amount::from_major(10), Tier::Two)
            .unwrap();
        assert_eq!(appealed.status, DisputeStatus::Tier3Appeal);
        assert!(h.service.pending_settlements().is_empty());
    }

    #[test]
    fn conflicting_queued_settlement_is_dropped_for_remediation() {
        let h = harness();
        let (task_id, dispute) = h.open(middling());
        h.service
            .ledger()
            .slash_stake(&task_id, &h.worker, BasisPoints::new(5_000).unwrap(), "manual")
            .unwrap();
        h.service.executor.queue().enqueue(PendingSettlement {
            dispute_id: Some(dispute.id),
            task_id,
            worker_id: h.worker,
            plan: SettlementPlan::Release,
            reason: "overturned".into(),
            deferred_until: None,
            attempts: 1,
            last_error: None,
            queued_at: t0(),
            in_flight: false,
        });

        assert_eq!(h.service.retry_settlements(t0()), 0);
        assert!(h.service.pending_settlements().is_empty());
        assert_eq!(h.stake_status(&task_id), StakeStatus::Slashed);
        assert!(h
            .service
            .audit()
            .entries_for(&dispute.id)
            .iter()
            .any(|e| e.action == AuditAction::RemediationRequired));
        // Nothing left to retry on the next sweep.
        assert_eq!(h.service.retry_settlements(t0().plus(Duration::hours(1))), 0);
    }

    #[test]
    fn vote_after_close_is_rejected() {
        let h = harness();
        let (_, dispute) = h.open(middling());
        h.service.run_auto_score(dispute.id).unwrap();
        let jurors = h.service.jury(&dispute.id).unwrap().juror_ids();
        for juror in &jurors {
            h.service.cast_vote(dispute.id, *juror, Vote::Worker).unwrap();
        }
        let err = h.service.cast_vote(dispute.id, jurors[0], Vote::Requester).unwrap_err();
        assert_eq!(err, ArbitrationError::VotingClosed { dispute_id: dispute.id });
    }

    #[test]
    fn all_abstain_goes_to_tier3() {
        let h = harness();
        let (_, dispute) = h.open(middling());
        h.service.run_auto_score(dispute.id).unwrap();
        for juror in h.service.jury(&dispute.id).unwrap().juror_ids() {
            h.service.cast_vote(dispute.id, juror, Vote::Abstain).unwrap();
        }
        let d = h.service.dispute(&dispute.id).unwrap();
        assert_eq!(d.status, DisputeStatus::Tier3Appeal);
        assert_eq!(d.current_tier, Tier::Three);
        assert!(d.superseded_resolution.is_none());

        let err = h
            .service
            .admin_resolve(dispute.id, UserId::new(), AdminDecision::Uphold)
            .unwrap_err();
        assert_eq!(err, ArbitrationError::NothingToUphold { dispute_id: dispute.id });
    }

    #[test]
    fn appeal_then_uphold_forfeits_appeal_stake() {
        let h = harness();
        let admin = UserId::new();
        let (task_id, dispute) = h.open(middling());
        h.service.run_auto_score(dispute.id).unwrap();
        for juror in h.service.jury(&dispute.id).unwrap().juror_ids() {
            h.service.cast_vote(dispute.id, juror, Vote::Requester).unwrap();
        }

        let err = h
            .service
            .request_appeal(dispute.id, h.worker, Amount::from_major(5), Tier::Two)
            .unwrap_err();
        assert!(matches!(err, ArbitrationError::AppealStakeTooSmall { .. }));
        let err = h
            .service
            .request_appeal(dispute.id, h.requester, Amount::from_major(10), Tier::Two)
            .unwrap_err();
        assert!(matches!(err, ArbitrationError::NotLosingParty { .. }));

        let appealed = h
            .service
            .request_appeal(dispute.id, h.worker, Amount::from_major(10), Tier::Two)
            .unwrap();
        assert_eq!(appealed.status, DisputeStatus::Tier3Appeal);
        assert!(h.service.pending_settlements().is_empty());

        let resolved = h.service.admin_resolve(dispute.id, admin, AdminDecision::Uphold).unwrap();
        assert_eq!(resolved.current_tier, Tier::Three);
        assert_eq!(resolved.resolution.as_ref().unwrap().outcome, Outcome::RequesterWins);
        assert_eq!(h.stake_status(&task_id), StakeStatus::Slashed);
        let appeal = h.service.ledger().get_appeal_stake(&task_id, &dispute.id).unwrap();
        assert_eq!(appeal.status, AppealStakeStatus::Forfeited);
    }

    #[test]
    fn admin_escalation_from_voting_dismisses_the_jury() {
        let h = harness();
        let admin = UserId::new();
        let (_, dispute) = h.open(middling());
        h.service.run_auto_score(dispute.id).unwrap();
        assert!(!h.service.jury(&dispute.id).unwrap().closed);

        let escalated = h
            .service
            .admin_escalate(dispute.id, admin, Tier::Two, Tier::Three)
            .unwrap();
        assert_eq!(escalated.status, DisputeStatus::Tier3Appeal);
        assert!(h.service.jury(&dispute.id).unwrap().closed);
    }

    #[test]
    fn admin_override_with_split() {
        let h = harness();
        let admin = UserId::new();
        let (task_id, dispute) = h.open(weak());
        h.service
            .admin_escalate(dispute.id, admin, Tier::One, Tier::Three)
            .unwrap();
        let decision = Decision::split(Outcome::WorkerWins, 60).unwrap();
        let resolved = h
            .service
            .admin_resolve(dispute.id, admin, AdminDecision::Override { decision })
            .unwrap();
        assert_eq!(resolved.resolution_type(), Some(crate::dispute::ResolutionType::PartialPay));
        let stake = h.service.ledger().get_stake(&task_id, &h.worker).unwrap();
        assert_eq!(stake.status, StakeStatus::Slashed);
        assert_eq!(stake.worker_return, stake.amount.apply_bps(BasisPoints::new(6_000).unwrap()));
        let payout = &h.sink.resolutions()[0];
        assert_eq!(payout.worker_payout.amount, Amount::from_major(60));
        assert_eq!(payout.requester_refund.amount, Amount::from_major(40));
    }

    #[test]
    fn claim_requires_allowance() {
        let h = harness();
        let task = Task {
            id: TaskId::new(),
            requester_id: h.requester,
            bounty: Amount::from_major(100_000),
            currency: Currency::default(),
            required_artefacts: 0,
            location: None,
            radius_m: 0.0,
            deadline: None,
            status: TaskStatus::Open,
        };
        let task_id = task.id;
        h.directory.put_task(task);
        let err = h.service.stake_for_claim(task_id, h.worker).unwrap_err();
        assert!(matches!(err, ArbitrationError::InsufficientFunds { .. }));
        let err = h.service.stake_for_claim(task_id, UserId::new()).unwrap_err();
        assert!(matches!(err, ArbitrationError::UserNotFound(_)));
    }

    #[test]
    fn undisputed_release_refuses_disputed_stake() {
        let h = harness();
        let (task_id, _dispute) = h.open(strong());
        let err = h.service.settle_without_dispute(task_id, h.worker).unwrap_err();
        assert!(matches!(err, ArbitrationError::DisputeAlreadyOpen { .. }));

        let (other_task, _) = h.rejected_submission(strong());
        let stake = h.service.settle_without_dispute(other_task, h.worker).unwrap().unwrap();
        assert_eq!(stake.status, StakeStatus::Released);
    }

    #[test]
    fn sweep_advances_by_deadline() {
        let h = harness();
        let (_, strong_dispute) = h.open(strong());
        let (_, weak_dispute) = h.open(weak());

        let early = h.service.sweep(t0().plus(Duration::hours(47)));
        assert!(early.scored.is_empty());

        let scored = h.service.sweep(t0().plus(Duration::hours(49)));
        assert_eq!(scored.scored.len(), 2);

        let finalized = h.service.sweep(t0().plus(Duration::hours(49 + 25)));
        assert_eq!(finalized.tier1_resolved.len(), 2);
        let outcome = |id: &DisputeId| h.service.dispute(id).unwrap().resolution.unwrap().outcome;
        assert_eq!(outcome(&strong_dispute.id), Outcome::WorkerWins);
        assert_eq!(outcome(&weak_dispute.id), Outcome::RequesterWins);
        assert!(h.service.audit().verify_chain().is_ok());
    }
}
