//! # Tier 2: Jury Selection and Voting
//!
//! ## Selection
//!
//! A candidate is eligible when reliability ≥ 90, they are not a party,
//! they are not already seated on this dispute, and they have at least five
//! accepted tasks. Eligible candidates are ranked by reliability and the
//! top `pool_multiplier × jury_size` form the pool. The jury is drawn from
//! the pool by ordering on `sha256(dispute_id ‖ candidate_id)`, so the same
//! dispute and pool always seat the same jury and no caller can steer it.
//!
//! A dispute with too few eligible candidates gets
//! [`ArbitrationError::InsufficientJurors`], never an undersized jury.
//!
//! ## Weights
//!
//! `weight = 1.0 + (min(reliability, 100) − 90) / 50`, held as integer
//! thousandths (1000 to 1200) so tallies are exact.
//!
//! ## Votes
//!
//! Each juror votes once; a vote is never changed. Tallies are always
//! recomputed from the stored votes. Abstentions count toward completion
//! but carry no weight. A tie goes to the worker.

use serde::{Deserialize, Serialize};

use verdict_core::{sha256_bytes, DisputeId, Timestamp, UserId};

use crate::dispute::Outcome;
use crate::error::ArbitrationError;

/// Selection parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JuryPolicy {
    /// Jurors seated per dispute.
    pub jury_size: usize,
    /// Pool size as a multiple of `jury_size`.
    pub pool_multiplier: usize,
    /// Minimum reliability.
    pub min_reliability: u8,
    /// Minimum accepted tasks.
    pub min_accepted_tasks: u32,
}

impl Default for JuryPolicy {
    fn default() -> Self {
        Self {
            jury_size: 5,
            pool_multiplier: 3,
            min_reliability: 90,
            min_accepted_tasks: 5,
        }
    }
}

/// A user who might serve on a jury.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JurorCandidate {
    /// The user.
    pub user_id: UserId,
    /// Reliability, 0 to 100.
    pub reliability: u8,
    /// Tasks completed and accepted.
    pub accepted_tasks: u32,
}

/// A juror's voting weight in thousandths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JurorWeight(u32);

impl JurorWeight {
    /// Weight for a juror with the given reliability.
    pub fn for_reliability(reliability: u8) -> Self {
        let above = u32::from(reliability.min(100)).saturating_sub(90);
        Self(1_000 + above * 20)
    }

    /// Thousandths.
    pub fn millis(&self) -> u32 {
        self.0
    }

    /// As a decimal.
    pub fn as_f64(&self) -> f64 {
        f64::from(self.0) / 1_000.0
    }
}

/// A juror's vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Vote {
    /// For the worker.
    Worker,
    /// For the requester.
    Requester,
    /// No side.
    Abstain,
}

/// A seat on a dispute's jury.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisputeJuror {
    /// The dispute.
    pub dispute_id: DisputeId,
    /// The juror.
    pub juror_id: UserId,
    /// Voting weight, fixed at seating.
    pub weight: JurorWeight,
    /// The vote, once cast.
    pub vote: Option<Vote>,
    /// When it was cast.
    pub voted_at: Option<Timestamp>,
}

/// Weighted vote totals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct VoteTally {
    /// Σ weight of worker votes, thousandths.
    pub worker_weight: u32,
    /// Σ weight of requester votes, thousandths.
    pub requester_weight: u32,
    /// Abstentions.
    pub abstentions: usize,
    /// Votes cast, including abstentions.
    pub votes_cast: usize,
    /// Jurors seated.
    pub seated: usize,
}

impl VoteTally {
    /// Outcome of the tally, or `None` if nobody voted for either side.
    pub fn outcome(&self) -> Option<Outcome> {
        if self.worker_weight == 0 && self.requester_weight == 0 {
            return None;
        }
        if self.requester_weight > self.worker_weight {
            Some(Outcome::RequesterWins)
        } else {
            Some(Outcome::WorkerWins)
        }
    }

    /// Whether every seated juror has voted.
    pub fn all_voted(&self) -> bool {
        self.votes_cast == self.seated
    }
}

// ── Selection ──────────────────────────────────────────────────────────

/// Seats juries.
#[derive(Debug, Clone, Default)]
pub struct JurySelector {
    policy: JuryPolicy,
}

impl JurySelector {
    /// Selector with the given policy.
    pub fn new(policy: JuryPolicy) -> Self {
        Self { policy }
    }

    /// The policy in force.
    pub fn policy(&self) -> &JuryPolicy {
        &self.policy
    }

    /// Whether a candidate may serve on this dispute.
    pub fn is_eligible(&self, candidate: &JurorCandidate, parties: &[UserId], seated: &[UserId]) -> bool {
        candidate.reliability >= self.policy.min_reliability
            && candidate.accepted_tasks >= self.policy.min_accepted_tasks
            && !parties.contains(&candidate.user_id)
            && !seated.contains(&candidate.user_id)
    }

    /// Draw a jury.
    pub fn select(
        &self,
        dispute_id: DisputeId,
        parties: &[UserId],
        seated: &[UserId],
        candidates: &[JurorCandidate],
    ) -> Result<Vec<DisputeJuror>, ArbitrationError> {
        let mut eligible: Vec<&JurorCandidate> = candidates
            .iter()
            .filter(|c| self.is_eligible(c, parties, seated))
            .collect();
        eligible.sort_by_key(|c| c.user_id);
        eligible.dedup_by_key(|c| c.user_id);

        let needed = self.policy.jury_size;
        if needed == 0 || eligible.len() < needed {
            return Err(ArbitrationError::InsufficientJurors {
                dispute_id,
                needed,
                eligible: eligible.len(),
            });
        }

        eligible.sort_by(|a, b| b.reliability.cmp(&a.reliability).then(a.user_id.cmp(&b.user_id)));
        eligible.truncate(needed.saturating_mul(self.policy.pool_multiplier).max(needed));

        let mut pool: Vec<(verdict_core::ContentDigest, &JurorCandidate)> = eligible
            .into_iter()
            .map(|c| (selection_key(&dispute_id, &c.user_id), c))
            .collect();
        pool.sort_by(|a, b| a.0 .0.cmp(&b.0 .0));

        Ok(pool
            .into_iter()
            .take(needed)
            .map(|(_, c)| DisputeJuror {
                dispute_id,
                juror_id: c.user_id,
                weight: JurorWeight::for_reliability(c.reliability),
                vote: None,
                voted_at: None,
            })
            .collect())
    }
}

fn selection_key(dispute_id: &DisputeId, user_id: &UserId) -> verdict_core::ContentDigest {
    let mut seed = Vec::with_capacity(32);
    seed.extend_from_slice(dispute_id.as_uuid().as_bytes());
    seed.extend_from_slice(user_id.as_uuid().as_bytes());
    sha256_bytes(&seed)
}

// ── Panel ──────────────────────────────────────────────────────────────

/// A seated jury and its votes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JuryPanel {
    /// The dispute.
    pub dispute_id: DisputeId,
    /// Seats.
    pub jurors: Vec<DisputeJuror>,
    /// Voting close.
    pub deadline: Timestamp,
    /// Set once the result has been taken; no votes after.
    pub closed: bool,
}

impl JuryPanel {
    /// A panel with no votes.
    pub fn new(dispute_id: DisputeId, jurors: Vec<DisputeJuror>, deadline: Timestamp) -> Self {
        Self {
            dispute_id,
            jurors,
            deadline,
            closed: false,
        }
    }

    /// Record a vote. Rejected once closed, after the deadline, from a
    /// non-juror, or from a juror who already voted.
    pub fn cast_vote(&mut self, juror_id: UserId, vote: Vote, now: Timestamp) -> Result<VoteTally, ArbitrationError> {
        let dispute_id = self.dispute_id;
        if self.closed || now.is_past(&self.deadline) {
            return Err(ArbitrationError::VotingClosed { dispute_id });
        }
        let seat = self
            .jurors
            .iter_mut()
            .find(|j| j.juror_id == juror_id)
            .ok_or(ArbitrationError::NotAJuror {
                dispute_id,
                user_id: juror_id,
            })?;
        if seat.vote.is_some() {
            return Err(ArbitrationError::AlreadyVoted { dispute_id, juror_id });
        }
        seat.vote = Some(vote);
        seat.voted_at = Some(now);
        Ok(self.tally())
    }

    /// Recompute totals from stored votes.
    pub fn tally(&self) -> VoteTally {
        let mut tally = VoteTally {
            seated: self.jurors.len(),
            ..VoteTally::default()
        };
        for juror in &self.jurors {
            match juror.vote {
                Some(Vote::Worker) => tally.worker_weight += juror.weight.millis(),
                Some(Vote::Requester) => tally.requester_weight += juror.weight.millis(),
                Some(Vote::Abstain) => tally.abstentions += 1,
                None => continue,
            }
            tally.votes_cast += 1;
        }
        tally
    }

    /// Whether voting can be finalized.
    pub fn is_complete(&self, now: Timestamp) -> bool {
        self.tally().all_voted() || now.is_past(&self.deadline)
    }

    /// Seated juror ids.
    pub fn juror_ids(&self) -> Vec<UserId> {
        self.jurors.iter().map(|j| j.juror_id).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn t0() -> Timestamp {
        Timestamp::parse("2026-03-01T12:00:00Z").unwrap()
    }

    fn candidates(n: usize, reliability: u8) -> Vec<JurorCandidate> {
        (0..n)
            .map(|_| JurorCandidate {
                user_id: UserId::new(),
                reliability,
                accepted_tasks: 10,
            })
            .collect()
    }

    fn seat(dispute_id: DisputeId, reliability: u8) -> DisputeJuror {
        DisputeJuror {
            dispute_id,
            juror_id: UserId::new(),
            weight: JurorWeight::for_reliability(reliability),
            vote: None,
            voted_at: None,
        }
    }

    #[test]
    fn weight_formula() {
        assert_eq!(JurorWeight::for_reliability(90).millis(), 1_000);
        assert_eq!(JurorWeight::for_reliability(95).millis(), 1_100);
        assert_eq!(JurorWeight::for_reliability(100).millis(), 1_200);
        assert_eq!(JurorWeight::for_reliability(255).millis(), 1_200);
        assert!((JurorWeight::for_reliability(95).as_f64() - 1.1).abs() < f64::EPSILON);
    }

    #[test]
    fn eligibility_filters() {
        let selector = JurySelector::default();
        let party = UserId::new();
        let ok = JurorCandidate {
            user_id: UserId::new(),
            reliability: 90,
            accepted_tasks: 5,
        };
        assert!(selector.is_eligible(&ok, &[party], &[]));
        assert!(!selector.is_eligible(&JurorCandidate { reliability: 89, ..ok.clone() }, &[party], &[]));
        assert!(!selector.is_eligible(&JurorCandidate { accepted_tasks: 4, ..ok.clone() }, &[party], &[]));
        assert!(!selector.is_eligible(&ok, &[ok.user_id], &[]));
        assert!(!selector.is_eligible(&ok, &[party], &[ok.user_id]));
    }

    #[test]
    fn selection_is_reproducible_and_excludes_parties() {
        let selector = JurySelector::default();
        let dispute = DisputeId::new();
        let mut pool = candidates(20, 95);
        let party = pool[0].user_id;

        let first = selector.select(dispute, &[party], &[], &pool).unwrap();
        pool.reverse();
        let second = selector.select(dispute, &[party], &[], &pool).unwrap();

        assert_eq!(first.len(), 5);
        assert_eq!(first, second);
        assert!(first.iter().all(|j| j.juror_id != party));
    }

    #[test]
    fn pool_prefers_most_reliable() {
        let selector = JurySelector::default();
        let mut pool = candidates(15, 100);
        let low = candidates(30, 90);
        pool.extend(low.iter().cloned());
        let jury = selector.select(DisputeId::new(), &[], &[], &pool).unwrap();
        // Pool is the top 15 by reliability, all at 100.
        assert!(jury.iter().all(|j| j.weight.millis() == 1_200));
    }

    #[test]
    fn too_few_eligible_is_an_error() {
        let selector = JurySelector::default();
        let mut pool = candidates(4, 95);
        pool.extend(candidates(10, 80));
        let err = selector.select(DisputeId::new(), &[], &[], &pool).unwrap_err();
        assert!(matches!(
            err,
            ArbitrationError::InsufficientJurors {
                needed: 5,
                eligible: 4,
                ..
            }
        ));
    }

    #[test]
    fn weighted_majority_three_vs_two() {
        let dispute = DisputeId::new();
        let jurors: Vec<_> = (0..3)
            .map(|_| seat(dispute, 95))
            .chain((0..2).map(|_| seat(dispute, 90)))
            .collect();
        let ids: Vec<_> = jurors.iter().map(|j| j.juror_id).collect();
        let mut panel = JuryPanel::new(dispute, jurors, t0().plus(Duration::hours(72)));
        for id in &ids[..3] {
            panel.cast_vote(*id, Vote::Worker, t0()).unwrap();
        }
        for id in &ids[3..] {
            panel.cast_vote(*id, Vote::Requester, t0()).unwrap();
        }
        let tally = panel.tally();
        assert_eq!(tally.worker_weight, 3_300);
        assert_eq!(tally.requester_weight, 2_000);
        assert_eq!(tally.outcome(), Some(Outcome::WorkerWins));
        assert!(panel.is_complete(t0()));
    }

    #[test]
    fn tie_goes_to_worker() {
        let tally = VoteTally {
            worker_weight: 2_100,
            requester_weight: 2_100,
            abstentions: 1,
            votes_cast: 5,
            seated: 5,
        };
        assert_eq!(tally.outcome(), Some(Outcome::WorkerWins));
    }

    #[test]
    fn only_abstentions_has_no_outcome() {
        let dispute = DisputeId::new();
        let jurors = vec![seat(dispute, 95), seat(dispute, 95)];
        let ids: Vec<_> = jurors.iter().map(|j| j.juror_id).collect();
        let mut panel = JuryPanel::new(dispute, jurors, t0().plus(Duration::hours(1)));
        for id in ids {
            panel.cast_vote(id, Vote::Abstain, t0()).unwrap();
        }
        assert_eq!(panel.tally().outcome(), None);
        assert!(panel.tally().all_voted());
    }

    #[test]
    fn votes_are_write_once_and_deadline_bound() {
        let dispute = DisputeId::new();
        let jurors = vec![seat(dispute, 95), seat(dispute, 95)];
        let (a, b) = (jurors[0].juror_id, jurors[1].juror_id);
        let deadline = t0().plus(Duration::hours(1));
        let mut panel = JuryPanel::new(dispute, jurors, deadline);

        panel.cast_vote(a, Vote::Worker, t0()).unwrap();
        assert!(matches!(
            panel.cast_vote(a, Vote::Requester, t0()).unwrap_err(),
            ArbitrationError::AlreadyVoted { .. }
        ));
        assert!(matches!(
            panel.cast_vote(UserId::new(), Vote::Worker, t0()).unwrap_err(),
            ArbitrationError::NotAJuror { .. }
        ));
        assert!(matches!(
            panel
                .cast_vote(b, Vote::Worker, deadline.plus(Duration::seconds(1)))
                .unwrap_err(),
            ArbitrationError::VotingClosed { .. }
        ));
        // Exactly at the deadline is still open.
        panel.cast_vote(b, Vote::Requester, deadline).unwrap();
        assert_eq!(panel.jurors[0].vote, Some(Vote::Worker));
    }
}
