//! # Engine Configuration
//!
//! Every window, threshold and fraction the engine uses, loadable from
//! YAML. Missing keys take their defaults, so a file only needs to name
//! what it changes:
//!
//! ```yaml
//! tier2_voting_hours: 96
//! jury:
//!   jury_size: 7
//! ```

use std::path::Path;

use chrono::Duration;
use serde::{Deserialize, Serialize};

use verdict_core::{BasisPoints, Currency};
use verdict_stake::StakePolicy;

use crate::autoscore::ScoreThresholds;
use crate::error::ArbitrationError;
use crate::jury::JuryPolicy;

/// Arbitration engine settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArbitrationConfig {
    /// How long parties may submit evidence after a dispute opens.
    pub evidence_window_hours: u32,
    /// How long a decisive Tier-1 recommendation waits before it applies.
    pub tier1_review_hours: u32,
    /// Jury voting window.
    pub tier2_voting_hours: u32,
    /// Target turnaround for a Tier-3 decision.
    pub tier3_appeal_hours: u32,
    /// How long a Tier-2 decision stays appealable.
    pub appeal_window_hours: u32,
    /// Tier-1 score thresholds.
    pub thresholds: ScoreThresholds,
    /// Jury selection.
    pub jury: JuryPolicy,
    /// Minimum appeal stake as a fraction of the bounty.
    pub appeal_stake_bps: u32,
    /// Requester's share of a slashed stake; the platform keeps the rest.
    pub slash_requester_share_bps: u32,
    /// Settlement currency.
    pub currency: Currency,
    /// Worker stake sizing.
    pub stake: StakePolicy,
}

impl Default for ArbitrationConfig {
    fn default() -> Self {
        Self {
            evidence_window_hours: 48,
            tier1_review_hours: 24,
            tier2_voting_hours: 72,
            tier3_appeal_hours: 168,
            appeal_window_hours: 48,
            thresholds: ScoreThresholds::default(),
            jury: JuryPolicy::default(),
            appeal_stake_bps: 1_000,
            slash_requester_share_bps: 5_000,
            currency: Currency::default(),
            stake: StakePolicy::default(),
        }
    }
}

impl ArbitrationConfig {
    /// Parse YAML and validate.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ArbitrationError> {
        let config: Self = serde_yaml::from_str(yaml).map_err(|e| ArbitrationError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a YAML file.
    pub fn load(path: &Path) -> Result<Self, ArbitrationError> {
        let yaml = std::fs::read_to_string(path)
            .map_err(|e| ArbitrationError::Config(format!("{}: {e}", path.display())))?;
        Self::from_yaml_str(&yaml)
    }

    /// Reject inconsistent settings. Reports every problem at once.
    pub fn validate(&self) -> Result<(), ArbitrationError> {
        let mut errors = Vec::new();

        let t = &self.thresholds;
        if !(0.0..=100.0).contains(&t.requester_wins) || !(0.0..=100.0).contains(&t.worker_wins) {
            errors.push("score thresholds must lie within 0..=100".to_string());
        }
        if t.requester_wins >= t.worker_wins {
            errors.push(format!(
                "requester_wins threshold ({}) must be below worker_wins ({})",
                t.requester_wins, t.worker_wins
            ));
        }
        if self.jury.jury_size == 0 {
            errors.push("jury.jury_size must be > 0".to_string());
        }
        if self.jury.pool_multiplier == 0 {
            errors.push("jury.pool_multiplier must be > 0".to_string());
        }
        if self.jury.min_reliability > 100 {
            errors.push(format!("jury.min_reliability ({}) exceeds 100", self.jury.min_reliability));
        }
        for (name, bps) in [
            ("appeal_stake_bps", self.appeal_stake_bps),
            ("slash_requester_share_bps", self.slash_requester_share_bps),
        ] {
            if BasisPoints::new(bps).is_err() {
                errors.push(format!("{name} ({bps}) exceeds 10000"));
            }
        }
        for (name, hours) in [
            ("evidence_window_hours", self.evidence_window_hours),
            ("tier2_voting_hours", self.tier2_voting_hours),
            ("tier3_appeal_hours", self.tier3_appeal_hours),
        ] {
            if hours == 0 {
                errors.push(format!("{name} must be > 0"));
            }
        }
        if let Err(e) = self.stake.validate() {
            errors.push(format!("stake: {e}"));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ArbitrationError::Config(errors.join("; ")))
        }
    }

    /// Evidence window length.
    pub fn evidence_window(&self) -> Duration {
        Duration::hours(i64::from(self.evidence_window_hours))
    }

    /// Tier-1 review window length.
    pub fn tier1_review(&self) -> Duration {
        Duration::hours(i64::from(self.tier1_review_hours))
    }

    /// Tier-2 voting window length.
    pub fn tier2_voting(&self) -> Duration {
        Duration::hours(i64::from(self.tier2_voting_hours))
    }

    /// Tier-3 turnaround.
    pub fn tier3_appeal(&self) -> Duration {
        Duration::hours(i64::from(self.tier3_appeal_hours))
    }

    /// Appeal window after a Tier-2 decision.
    pub fn appeal_window(&self) -> Duration {
        Duration::hours(i64::from(self.appeal_window_hours))
    }

    /// Minimum appeal stake fraction. Valid after [`validate`](Self::validate).
    pub fn appeal_stake_fraction(&self) -> BasisPoints {
        BasisPoints::new(self.appeal_stake_bps).unwrap_or(BasisPoints::FULL)
    }

    /// Requester's share of slashed stake. Valid after [`validate`](Self::validate).
    pub fn slash_requester_share(&self) -> BasisPoints {
        BasisPoints::new(self.slash_requester_share_bps).unwrap_or(BasisPoints::FULL)
    }
}
