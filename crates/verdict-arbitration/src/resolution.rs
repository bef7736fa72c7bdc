//! # Resolution Executor
//!
//! Applies a final decision. The dispute commit is the only step that can
//! fail the call; everything after it is a consequence of a decision that
//! already stands:
//!
//! 1. Record the resolution on the dispute (compare-and-set on tier when
//!    the caller supplies one).
//! 2. Set submission status (accepted on a worker win, rejected otherwise)
//!    and task status (accepted only on a pure worker win).
//! 3. Settle the appeal stake, if there is one: returned when the final
//!    outcome favours the appellant, forfeited otherwise.
//! 4. Settle the worker stake. A Tier-2 decision stays appealable, so its
//!    settlement is deferred until the appeal window closes; Tier-1 and
//!    Tier-3 decisions settle immediately. A provider failure queues the
//!    settlement for retry.
//! 5. Publish [`DisputeResolved`] and append to the audit log.
//!
//! Failures in steps 2 to 4 are logged and audited as needing remediation;
//! they never roll back step 1. A stake that some other decision already
//! settled is not retried either: the conflict is audited and left to an
//! operator.

use std::sync::Arc;

use chrono::Duration;
use serde_json::json;

use verdict_core::{Amount, BasisPoints, DisputeId, Timestamp, UserId};
use verdict_stake::{SettlementProvider, StakeError, StakeLedger};

use crate::audit::{AuditAction, AuditLog};
use crate::collaborators::{PayoutResolver, SubmissionStatus, TaskDirectory, TaskStatus};
use crate::dispute::{Actor, Decision, Dispute, DisputeStatus, Outcome, Resolution, ResolutionType, Resolver, Tier};
use crate::error::ArbitrationError;
use crate::events::{ArbitrationEvent, DisputeResolved, EventSink, Payout, SettlementState};
use crate::settlement::{PendingSettlement, SettlementPlan, SettlementQueue};
use crate::store::Store;

/// A decision to apply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolutionRequest {
    /// The dispute.
    pub dispute_id: DisputeId,
    /// What was decided.
    pub decision: Decision,
    /// Who decided.
    pub resolver: Resolver,
    /// Who is recorded in history.
    pub actor: Actor,
    /// Tier the caller read, checked at write time.
    pub expected_tier: Option<Tier>,
}

/// Everything the executor touches.
#[derive(Clone)]
pub struct ExecutorDeps {
    /// Dispute records.
    pub disputes: Store<DisputeId, Dispute>,
    /// Submission and task status.
    pub tasks: Arc<dyn TaskDirectory>,
    /// Payout wallets.
    pub payouts: Arc<dyn PayoutResolver>,
    /// Worker stake backend.
    pub provider: Arc<dyn SettlementProvider>,
    /// Appeal stakes.
    pub ledger: Arc<StakeLedger>,
    /// Deferred and failed settlements.
    pub queue: SettlementQueue,
    /// Event delivery.
    pub events: Arc<dyn EventSink>,
    /// Audit trail.
    pub audit: Arc<AuditLog>,
}

/// Applies decisions.
pub struct ResolutionExecutor {
    deps: ExecutorDeps,
    slash_requester_share: BasisPoints,
    appeal_window: Duration,
}

impl std::fmt::Debug for ResolutionExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolutionExecutor")
            .field("provider", &self.deps.provider.provider_name())
            .field("slash_requester_share", &self.slash_requester_share)
            .field("appeal_window", &self.appeal_window)
            .finish()
    }
}

impl ResolutionExecutor {
    /// Executor with the given dependencies and settlement parameters.
    pub fn new(deps: ExecutorDeps, slash_requester_share: BasisPoints, appeal_window: Duration) -> Self {
        Self {
            deps,
            slash_requester_share,
            appeal_window,
        }
    }

    /// The settlement queue.
    pub fn queue(&self) -> &SettlementQueue {
        &self.deps.queue
    }

    /// Apply a decision. Returns the committed dispute.
    pub fn execute(&self, request: ResolutionRequest, now: Timestamp) -> Result<Dispute, ArbitrationError> {
        let plan = SettlementPlan::for_decision(&request.decision, self.slash_requester_share)?;
        let task_id = self
            .deps
            .disputes
            .get(&request.dispute_id)
            .ok_or(ArbitrationError::DisputeNotFound(request.dispute_id))?
            .task_id;
        let task = self
            .deps
            .tasks
            .get_task(&task_id)?
            .ok_or(ArbitrationError::TaskNotFound(task_id))?;

        let worker_amount = task
            .bounty
            .apply_bps(BasisPoints::from_percent(u32::from(request.decision.worker_percentage()))?);

        let appeal_window = self.appeal_window;
        let dispute = self
            .deps
            .disputes
            .try_update(&request.dispute_id, |d| {
                if let Some(expected) = request.expected_tier {
                    d.require_tier(expected)?;
                }
                let appeal_deadline =
                    (d.status == DisputeStatus::Tier2Voting).then(|| now.plus(appeal_window));
                let resolution = Resolution::new(request.decision, request.resolver, d.current_tier, now);
                d.resolve(resolution, request.actor, appeal_deadline, now)?;
                Ok::<_, ArbitrationError>(d.clone())
            })
            .ok_or(ArbitrationError::DisputeNotFound(request.dispute_id))??;

        tracing::info!(
            dispute_id = %dispute.id,
            tier = %dispute.current_tier,
            outcome = request.decision.outcome.as_str(),
            resolution_type = request.decision.resolution_type().as_str(),
            "dispute resolved"
        );

        self.update_directory(&dispute, &request.decision, now);
        self.settle_appeal_stake(&dispute, request.decision.outcome, now);
        let settlement = self.settle_worker_stake(&dispute, plan, now);

        let event = DisputeResolved {
            dispute_id: dispute.id,
            submission_id: dispute.submission_id,
            task_id: dispute.task_id,
            tier: dispute.current_tier,
            outcome: request.decision.outcome,
            resolution_type: request.decision.resolution_type(),
            split_percentage: request.decision.split_percentage,
            worker_payout: self.payout(dispute.worker_id, worker_amount),
            requester_refund: self.payout(dispute.requester_id, task.bounty.saturating_sub(worker_amount)),
            settlement,
            resolved_at: now,
        };
        self.audit(
            dispute.id,
            AuditAction::Resolved,
            request.actor,
            json!({
                "tier": dispute.current_tier,
                "outcome": event.outcome,
                "resolution_type": event.resolution_type,
                "split_percentage": event.split_percentage,
                "worker_payout": event.worker_payout.amount,
                "requester_refund": event.requester_refund.amount,
                "settlement": event.settlement,
            }),
            now,
        );
        self.deps.events.publish(ArbitrationEvent::DisputeResolved(event));
        Ok(dispute)
    }

    /// Attempt every due settlement. Returns how many settled.
    ///
    /// Each entry is claimed before it is applied, so a concurrent appeal
    /// cannot withdraw it mid-flight and two sweeps never apply it twice.
    pub fn retry_settlements(&self, now: Timestamp) -> usize {
        let mut settled = 0;
        for due in self.deps.queue.due(now) {
            let Some(pending) = self.deps.queue.claim(&due.task_id, &due.worker_id) else {
                continue;
            };
            match pending.plan.apply(
                self.deps.provider.as_ref(),
                &pending.task_id,
                &pending.worker_id,
                &pending.reason,
            ) {
                Ok(stake) => {
                    self.deps.queue.cancel(&pending.task_id, &pending.worker_id);
                    settled += 1;
                    tracing::info!(
                        task_id = %pending.task_id,
                        worker_id = %pending.worker_id,
                        attempts = pending.attempts,
                        "pending settlement applied"
                    );
                    if let (Some(stake), Some(dispute_id)) = (stake, pending.dispute_id) {
                        if let Some(result) = stake.result() {
                            self.audit(dispute_id, AuditAction::StakeSettled, Actor::System, json!(result), now);
                            self.deps.events.publish(ArbitrationEvent::StakeSettled {
                                dispute_id: Some(dispute_id),
                                result,
                            });
                        }
                    }
                }
                Err(e @ StakeError::AlreadySettled { .. }) => {
                    self.deps.queue.cancel(&pending.task_id, &pending.worker_id);
                    tracing::warn!(
                        task_id = %pending.task_id,
                        worker_id = %pending.worker_id,
                        error = %e,
                        "pending settlement dropped"
                    );
                    if let Some(dispute_id) = pending.dispute_id {
                        self.remediation(
                            dispute_id,
                            "stake already settled differently",
                            &ArbitrationError::from(e),
                            now,
                        );
                    }
                }
                Err(e) => {
                    let attempts = self
                        .deps
                        .queue
                        .record_failure(&pending.task_id, &pending.worker_id, &e.to_string())
                        .unwrap_or(pending.attempts + 1);
                    tracing::warn!(
                        task_id = %pending.task_id,
                        worker_id = %pending.worker_id,
                        attempts,
                        error = %e,
                        "pending settlement failed"
                    );
                    if let Some(dispute_id) = pending.dispute_id {
                        self.deps.events.publish(ArbitrationEvent::SettlementFailed {
                            dispute_id,
                            task_id: pending.task_id,
                            attempts,
                            reason: e.to_string(),
                        });
                    }
                }
            }
        }
        settled
    }

    /// Withdraw a deferred settlement because the decision is being
    /// appealed. Fails once a sweep has claimed or applied it.
    pub fn cancel_deferred(&self, dispute: &Dispute) -> Result<PendingSettlement, ArbitrationError> {
        self.deps
            .queue
            .withdraw(&dispute.task_id, &dispute.worker_id)
            .ok_or(ArbitrationError::SettlementStarted { dispute_id: dispute.id })
    }

    /// Put back a settlement withdrawn by an appeal that did not commit.
    pub fn restore_deferred(&self, pending: PendingSettlement) {
        self.deps.queue.enqueue(pending);
    }

    // ── steps ──────────────────────────────────────────────────────────

    fn update_directory(&self, dispute: &Dispute, decision: &Decision, now: Timestamp) {
        let submission_status = match decision.outcome {
            Outcome::WorkerWins => SubmissionStatus::Accepted,
            Outcome::RequesterWins => SubmissionStatus::Rejected,
        };
        if let Err(e) = self
            .deps
            .tasks
            .set_submission_status(&dispute.submission_id, submission_status)
        {
            self.remediation(dispute.id, "submission status update failed", &e, now);
        }
        if decision.resolution_type() == ResolutionType::AcceptPay {
            if let Err(e) = self.deps.tasks.set_task_status(&dispute.task_id, TaskStatus::Accepted) {
                self.remediation(dispute.id, "task status update failed", &e, now);
            }
        }
    }

    fn settle_appeal_stake(&self, dispute: &Dispute, outcome: Outcome, now: Timestamp) {
        let Some(appellant) = dispute.appellant_id else {
            return;
        };
        if dispute.current_tier != Tier::Three {
            return;
        }
        let won = dispute.outcome_for(&appellant) == Some(outcome);
        let result = if won {
            self.deps.ledger.return_appeal_stake(&dispute.task_id, &dispute.id)
        } else {
            self.deps.ledger.forfeit_appeal_stake(&dispute.task_id, &dispute.id)
        };
        match result {
            Ok(stake) => self.audit(
                dispute.id,
                AuditAction::AppealStakeSettled,
                Actor::System,
                json!({ "appellant": appellant, "status": stake.status, "amount": stake.amount }),
                now,
            ),
            Err(e) => self.remediation(dispute.id, "appeal stake settlement failed", &ArbitrationError::from(e), now),
        }
    }

    fn settle_worker_stake(&self, dispute: &Dispute, plan: SettlementPlan, now: Timestamp) -> SettlementState {
        let reason = format!("dispute {} resolved at tier {}", dispute.id, dispute.current_tier);
        let mut pending = PendingSettlement {
            dispute_id: Some(dispute.id),
            task_id: dispute.task_id,
            worker_id: dispute.worker_id,
            plan,
            reason,
            deferred_until: None,
            attempts: 0,
            last_error: None,
            queued_at: now,
            in_flight: false,
        };

        if let Some(until) = dispute.appeal_deadline.filter(|_| dispute.current_tier == Tier::Two) {
            pending.deferred_until = Some(until);
            self.deps.queue.enqueue(pending);
            self.audit(
                dispute.id,
                AuditAction::SettlementDeferred,
                Actor::System,
                json!({ "until": until, "plan": plan }),
                now,
            );
            return SettlementState::Deferred { until };
        }

        match plan.apply(
            self.deps.provider.as_ref(),
            &dispute.task_id,
            &dispute.worker_id,
            &pending.reason,
        ) {
            Ok(Some(stake)) => match stake.result() {
                Some(result) => {
                    self.audit(dispute.id, AuditAction::StakeSettled, Actor::System, json!(result), now);
                    self.deps.events.publish(ArbitrationEvent::StakeSettled {
                        dispute_id: Some(dispute.id),
                        result: result.clone(),
                    });
                    SettlementState::Settled { result }
                }
                None => SettlementState::NoStake,
            },
            Ok(None) => {
                tracing::info!(dispute_id = %dispute.id, task_id = %dispute.task_id, "no stake to settle");
                SettlementState::NoStake
            }
            Err(e @ StakeError::AlreadySettled { .. }) => {
                let reason = e.to_string();
                self.remediation(dispute.id, "stake already settled differently", &ArbitrationError::from(e), now);
                SettlementState::Conflict { reason }
            }
            Err(e) => {
                let reason = e.to_string();
                tracing::warn!(
                    dispute_id = %dispute.id,
                    provider = self.deps.provider.provider_name(),
                    retryable = e.is_retryable(),
                    error = %reason,
                    "settlement failed; queued for retry"
                );
                pending.attempts = 1;
                pending.last_error = Some(reason.clone());
                self.deps.queue.enqueue(pending);
                self.audit(
                    dispute.id,
                    AuditAction::SettlementQueued,
                    Actor::System,
                    json!({ "plan": plan, "error": reason }),
                    now,
                );
                self.deps.events.publish(ArbitrationEvent::SettlementFailed {
                    dispute_id: dispute.id,
                    task_id: dispute.task_id,
                    attempts: 1,
                    reason: reason.clone(),
                });
                SettlementState::Queued { reason }
            }
        }
    }

    fn payout(&self, user_id: UserId, amount: Amount) -> Payout {
        let wallet = match self.deps.payouts.primary_wallet(&user_id) {
            Ok(wallet) => wallet,
            Err(e) => {
                tracing::warn!(user_id = %user_id, error = %e, "payout wallet lookup failed");
                None
            }
        };
        Payout { user_id, amount, wallet }
    }

    fn remediation(&self, dispute_id: DisputeId, what: &str, error: &ArbitrationError, now: Timestamp) {
        tracing::warn!(dispute_id = %dispute_id, error = %error, "{what}");
        self.audit(
            dispute_id,
            AuditAction::RemediationRequired,
            Actor::System,
            json!({ "step": what, "error": error.to_string() }),
            now,
        );
    }

    fn audit(&self, dispute_id: DisputeId, action: AuditAction, actor: Actor, details: serde_json::Value, now: Timestamp) {
        if let Err(e) = self.deps.audit.append(dispute_id, action, actor, details, now) {
            tracing::error!(dispute_id = %dispute_id, error = %e, "audit append failed");
        }
    }
}
