//! # Tier State Machine
//!
//! Guarded transitions on [`Dispute`]. Each method checks the current
//! status (and, where the caller supplies one, the tier it expects), applies
//! the change, and appends a [`TierTransition`]. A rejected transition
//! leaves the dispute untouched.
//!
//! Guards enforced here:
//!
//! - `current_tier` never decreases.
//! - Tier 1 resolves or auto-escalates only with a recorded score, and a
//!   Tier-1 resolution must match the score's recommendation.
//! - A party may escalate Tier 1 → Tier 2 only after the evidence window
//!   closes; administrators bypass this.
//! - Only a resolved Tier-2 decision can be appealed, only by the losing
//!   party, and only before the appeal deadline. The appeal clears the
//!   decision in force and keeps it as `superseded_resolution`.

use verdict_core::{Amount, DisputeId, SubmissionId, TaskId, Timestamp, UserId};

use crate::autoscore::{AutoScoreResult, Recommendation};
use crate::dispute::{
    Actor, Dispute, DisputeStatus, Outcome, Resolution, Resolver, Tier, TierTransition,
    TransitionDetails, HISTORY_SCHEMA_VERSION,
};
use crate::error::ArbitrationError;

/// Parameters for moving a dispute up a tier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Escalation {
    /// Tier to move to.
    pub target: Tier,
    /// Tier the caller read; checked at write time.
    pub expected_tier: Tier,
    /// Who is escalating.
    pub actor: Actor,
    /// Free-text reason for history.
    pub reason: String,
    /// Deadline for the target tier.
    pub deadline: Timestamp,
}

impl Dispute {
    /// Create a dispute in `opened`.
    pub fn open(
        submission_id: SubmissionId,
        task_id: TaskId,
        worker_id: UserId,
        requester_id: UserId,
        reason: &str,
        now: Timestamp,
    ) -> Self {
        let mut dispute = Self {
            id: DisputeId::new(),
            submission_id,
            task_id,
            worker_id,
            requester_id,
            status: DisputeStatus::Opened,
            current_tier: Tier::One,
            tier_history: Vec::new(),
            auto_score_result: None,
            evidence_deadline: None,
            tier1_deadline: None,
            tier2_deadline: None,
            tier3_deadline: None,
            appeal_deadline: None,
            escalation_stake: None,
            appellant_id: None,
            resolution: None,
            superseded_resolution: None,
            opened_at: now,
            updated_at: now,
        };
        dispute.record(
            DisputeStatus::Opened,
            Tier::One,
            Actor::Party(worker_id),
            TransitionDetails::Opened {
                reason: reason.to_string(),
            },
            now,
        );
        dispute
    }

    /// opened → evidence_pending.
    pub fn open_evidence_window(&mut self, deadline: Timestamp, now: Timestamp) -> Result<(), ArbitrationError> {
        self.require_status(&[DisputeStatus::Opened], DisputeStatus::EvidencePending)?;
        self.evidence_deadline = Some(deadline);
        self.record(
            DisputeStatus::EvidencePending,
            Tier::One,
            Actor::System,
            TransitionDetails::EvidenceWindowOpened { deadline },
            now,
        );
        Ok(())
    }

    /// evidence_pending → tier1_review, storing the score.
    pub fn record_auto_score(
        &mut self,
        result: AutoScoreResult,
        review_deadline: Timestamp,
        now: Timestamp,
    ) -> Result<(), ArbitrationError> {
        self.require_status(&[DisputeStatus::EvidencePending], DisputeStatus::Tier1Review)?;
        let details = TransitionDetails::AutoScored {
            score: result.score,
            recommendation: result.recommendation,
        };
        self.auto_score_result = Some(result);
        self.tier1_deadline = Some(review_deadline);
        self.record(DisputeStatus::Tier1Review, Tier::One, Actor::System, details, now);
        Ok(())
    }

    /// Move to a higher tier.
    pub fn escalate(&mut self, escalation: Escalation, now: Timestamp) -> Result<(), ArbitrationError> {
        self.require_tier(escalation.expected_tier)?;
        if escalation.target <= self.current_tier {
            return Err(self.invalid(
                escalation.target_status(),
                format!("tier only increases; currently tier {}", self.current_tier),
            ));
        }

        match escalation.target {
            Tier::Two => self.guard_tier2_escalation(&escalation, now)?,
            Tier::One | Tier::Three => {
                if !matches!(escalation.actor, Actor::Admin(_)) {
                    return Err(self.invalid(
                        DisputeStatus::Tier3Appeal,
                        "only an administrator routes an unresolved dispute to tier 3".into(),
                    ));
                }
                self.require_status(
                    &[
                        DisputeStatus::EvidencePending,
                        DisputeStatus::Tier1Review,
                        DisputeStatus::Tier2Voting,
                    ],
                    DisputeStatus::Tier3Appeal,
                )?;
            }
        }

        let to = escalation.target_status();
        match escalation.target {
            Tier::Two => self.tier2_deadline = Some(escalation.deadline),
            _ => self.tier3_deadline = Some(escalation.deadline),
        }
        self.record(
            to,
            escalation.target,
            escalation.actor,
            TransitionDetails::Escalated {
                reason: escalation.reason,
            },
            now,
        );
        Ok(())
    }

    fn guard_tier2_escalation(&self, escalation: &Escalation, now: Timestamp) -> Result<(), ArbitrationError> {
        match escalation.actor {
            Actor::Admin(_) => self.require_status(
                &[DisputeStatus::EvidencePending, DisputeStatus::Tier1Review],
                DisputeStatus::Tier2Voting,
            ),
            Actor::System => {
                self.require_status(&[DisputeStatus::Tier1Review], DisputeStatus::Tier2Voting)?;
                match &self.auto_score_result {
                    Some(r) if r.recommendation == Recommendation::Escalate => Ok(()),
                    Some(_) => Err(self.invalid(
                        DisputeStatus::Tier2Voting,
                        "score recommendation is decisive".into(),
                    )),
                    None => Err(self.invalid(DisputeStatus::Tier2Voting, "dispute not scored".into())),
                }
            }
            Actor::Party(user_id) => {
                if !self.is_party(&user_id) {
                    return Err(ArbitrationError::NotAParty {
                        dispute_id: self.id,
                        user_id,
                    });
                }
                self.require_status(&[DisputeStatus::Tier1Review], DisputeStatus::Tier2Voting)?;
                if let Some(deadline) = self.evidence_deadline {
                    if !now.is_past(&deadline) {
                        return Err(ArbitrationError::DeadlineNotReached {
                            dispute_id: self.id,
                            window: "evidence",
                            deadline: deadline.to_iso8601(),
                        });
                    }
                }
                Ok(())
            }
        }
    }

    /// Record a decision.
    ///
    /// `appeal_deadline` is set for Tier-2 decisions, which remain
    /// appealable until then.
    pub fn resolve(
        &mut self,
        resolution: Resolution,
        actor: Actor,
        appeal_deadline: Option<Timestamp>,
        now: Timestamp,
    ) -> Result<(), ArbitrationError> {
        if self.status == DisputeStatus::Resolved {
            return Err(ArbitrationError::AlreadyResolved { dispute_id: self.id });
        }
        self.require_status(
            &[
                DisputeStatus::Tier1Review,
                DisputeStatus::Tier2Voting,
                DisputeStatus::Tier3Appeal,
            ],
            DisputeStatus::Resolved,
        )?;
        if self.status == DisputeStatus::Tier1Review {
            let recommended = self
                .auto_score_result
                .as_ref()
                .and_then(|r| Outcome::from_recommendation(r.recommendation));
            if recommended != Some(resolution.outcome) || resolution.resolver != Resolver::AutoScore {
                return Err(self.invalid(
                    DisputeStatus::Resolved,
                    "tier 1 resolves only as its score recommends".into(),
                ));
            }
        }

        self.appeal_deadline = appeal_deadline;
        self.resolution = Some(resolution.clone());
        self.record(
            DisputeStatus::Resolved,
            self.current_tier,
            actor,
            TransitionDetails::Resolved { resolution },
            now,
        );
        Ok(())
    }

    /// tier2_voting → tier3_appeal when the jury produced no usable votes.
    pub fn close_voting_without_votes(
        &mut self,
        seated: usize,
        tier3_deadline: Timestamp,
        now: Timestamp,
    ) -> Result<(), ArbitrationError> {
        self.require_status(&[DisputeStatus::Tier2Voting], DisputeStatus::Tier3Appeal)?;
        self.tier3_deadline = Some(tier3_deadline);
        self.record(
            DisputeStatus::Tier3Appeal,
            Tier::Three,
            Actor::System,
            TransitionDetails::VotingClosedWithoutVotes { seated },
            now,
        );
        Ok(())
    }

    /// resolved (tier 2) → tier3_appeal.
    ///
    /// Returns the superseded decision.
    pub fn reopen_for_appeal(
        &mut self,
        appellant_id: UserId,
        stake: Amount,
        expected_tier: Tier,
        tier3_deadline: Timestamp,
        now: Timestamp,
    ) -> Result<Resolution, ArbitrationError> {
        self.require_tier(expected_tier)?;
        self.require_status(&[DisputeStatus::Resolved], DisputeStatus::Tier3Appeal)?;
        if self.current_tier != Tier::Two {
            return Err(self.invalid(
                DisputeStatus::Tier3Appeal,
                format!("only tier 2 decisions are appealable; decided at tier {}", self.current_tier),
            ));
        }
        if let Some(deadline) = self.appeal_deadline {
            if now.is_past(&deadline) {
                return Err(ArbitrationError::DeadlinePassed {
                    dispute_id: self.id,
                    window: "appeal",
                    deadline: deadline.to_iso8601(),
                });
            }
        }
        let current = match &self.resolution {
            Some(r) => r.clone(),
            None => return Err(self.invalid(DisputeStatus::Tier3Appeal, "no decision in force".into())),
        };
        if !self.is_party(&appellant_id) {
            return Err(ArbitrationError::NotAParty {
                dispute_id: self.id,
                user_id: appellant_id,
            });
        }
        if self.loser(current.outcome) != appellant_id {
            return Err(ArbitrationError::NotLosingParty {
                dispute_id: self.id,
                user_id: appellant_id,
            });
        }

        self.resolution = None;
        self.superseded_resolution = Some(current.clone());
        self.escalation_stake = Some(stake);
        self.appellant_id = Some(appellant_id);
        self.tier3_deadline = Some(tier3_deadline);
        self.record(
            DisputeStatus::Tier3Appeal,
            Tier::Three,
            Actor::Party(appellant_id),
            TransitionDetails::Appealed {
                stake,
                superseded: current.clone(),
            },
            now,
        );
        Ok(current)
    }

    // ── guards ─────────────────────────────────────────────────────────

    fn require_status(&self, allowed: &[DisputeStatus], target: DisputeStatus) -> Result<(), ArbitrationError> {
        if allowed.contains(&self.status) && self.status.valid_transitions().contains(&target) {
            return Ok(());
        }
        let expected: Vec<&str> = allowed.iter().map(DisputeStatus::as_str).collect();
        Err(self.invalid(target, format!("expected status {}", expected.join(" or "))))
    }

    pub(crate) fn require_tier(&self, expected: Tier) -> Result<(), ArbitrationError> {
        if self.current_tier != expected {
            return Err(ArbitrationError::TierMismatch {
                dispute_id: self.id,
                expected,
                actual: self.current_tier,
            });
        }
        Ok(())
    }

    fn invalid(&self, target: DisputeStatus, reason: String) -> ArbitrationError {
        ArbitrationError::InvalidTransition {
            dispute_id: self.id,
            from: self.status.as_str().to_string(),
            to: target.as_str().to_string(),
            reason,
        }
    }

    fn record(
        &mut self,
        to: DisputeStatus,
        to_tier: Tier,
        actor: Actor,
        details: TransitionDetails,
        now: Timestamp,
    ) {
        self.tier_history.push(TierTransition {
            schema_version: HISTORY_SCHEMA_VERSION,
            from: self.status,
            to,
            from_tier: self.current_tier,
            to_tier,
            actor,
            timestamp: now,
            details,
        });
        self.status = to;
        self.current_tier = to_tier;
        self.updated_at = now;
    }
}

impl Escalation {
    fn target_status(&self) -> DisputeStatus {
        match self.target {
            Tier::Three => DisputeStatus::Tier3Appeal,
            _ => DisputeStatus::Tier2Voting,
        }
    }
}
