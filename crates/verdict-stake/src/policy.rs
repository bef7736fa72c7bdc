//! # Required-Stake Policy
//!
//! A worker claiming a task stakes a fraction of the bounty. The fraction
//! starts at a base rate, rises with each prior strike, falls for
//! high-reputation workers, and is clamped to a floor and ceiling.
//!
//! ```text
//! bps = base + per_strike * strikes - (reputation >= threshold ? discount : 0)
//! bps = clamp(bps, min, max)
//! amount = floor(bounty * bps / 10000)
//! ```

use serde::{Deserialize, Serialize};

use verdict_core::{Amount, BasisPoints, ValidationError};

/// Tunable parameters for the required-stake calculation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StakePolicy {
    /// Starting stake fraction.
    pub base_bps: u32,
    /// Added per prior strike.
    pub per_strike_bps: u32,
    /// Reputation at or above which the discount applies.
    pub high_reputation_threshold: u8,
    /// Subtracted for high-reputation workers.
    pub high_reputation_discount_bps: u32,
    /// Floor.
    pub min_bps: u32,
    /// Ceiling.
    pub max_bps: u32,
}

impl Default for StakePolicy {
    fn default() -> Self {
        Self {
            base_bps: 1_500,
            per_strike_bps: 200,
            high_reputation_threshold: 90,
            high_reputation_discount_bps: 500,
            min_bps: 500,
            max_bps: 3_000,
        }
    }
}

/// Result of a required-stake calculation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequiredStake {
    /// The clamped stake fraction.
    pub percentage: BasisPoints,
    /// The stake amount in minor units.
    pub amount: Amount,
}

impl StakePolicy {
    /// Check that the floor and ceiling are ordered and within 100%.
    pub fn validate(&self) -> Result<(), ValidationError> {
        BasisPoints::new(self.max_bps)?;
        BasisPoints::new(self.base_bps)?;
        if self.min_bps > self.max_bps {
            return Err(ValidationError::InvalidBasisPoints(self.min_bps));
        }
        if self.high_reputation_threshold > 100 {
            return Err(ValidationError::InvalidPercentage(u32::from(
                self.high_reputation_threshold,
            )));
        }
        Ok(())
    }

    /// The stake fraction for a worker with the given history.
    pub fn required_percentage(&self, strike_count: u32, reputation: u8) -> BasisPoints {
        let mut bps = i64::from(self.base_bps)
            .saturating_add(i64::from(self.per_strike_bps).saturating_mul(i64::from(strike_count)));
        if reputation >= self.high_reputation_threshold {
            bps -= i64::from(self.high_reputation_discount_bps);
        }
        let clamped = bps.clamp(i64::from(self.min_bps), i64::from(self.max_bps));
        // Clamped into [min, max]; max is a validated basis-point value.
        BasisPoints::new(clamped as u32).unwrap_or(BasisPoints::FULL)
    }

    /// The stake fraction and amount for a bounty.
    pub fn required_stake(&self, bounty: Amount, strike_count: u32, reputation: u8) -> RequiredStake {
        let percentage = self.required_percentage(strike_count, reputation);
        RequiredStake {
            percentage,
            amount: bounty.apply_bps(percentage),
        }
    }
}

/// Required stake under the default policy.
pub fn calculate_required_stake(bounty: Amount, strike_count: u32, reputation: u8) -> RequiredStake {
    StakePolicy::default().required_stake(bounty, strike_count, reputation)
}
