//! # Fixed-Point Money
//!
//! [`Amount`] counts minor currency units (cents) in an `i64`. Percentages
//! are [`BasisPoints`] (1 bps = 0.01%). The only multiplication path is
//! [`Amount::apply_bps`], which widens to `i128` and floors toward zero.
//!
//! ## Remainder Rule
//!
//! Whenever an amount is split into shares, every share except one is
//! computed with `apply_bps` and the designated remainder share receives
//! `amount - sum(others)`. The shares therefore always sum to the original
//! amount exactly. Callers document which share takes the remainder.
//!
//! ## Display
//!
//! All supported currencies use two fractional digits, so `Amount(1000)`
//! renders as `10.00`.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Number of minor units in one major unit.
const MINOR_PER_MAJOR: i64 = 100;

/// A monetary amount in minor currency units.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Amount(i64);

impl Amount {
    /// The zero amount.
    pub const ZERO: Amount = Amount(0);

    /// Construct from minor units (e.g., cents).
    pub const fn from_minor(minor: i64) -> Self {
        Self(minor)
    }

    /// Construct from whole major units (e.g., dollars).
    pub const fn from_major(major: i64) -> Self {
        Self(major * MINOR_PER_MAJOR)
    }

    /// The raw minor-unit value.
    pub const fn minor_units(&self) -> i64 {
        self.0
    }

    /// Whether the amount is exactly zero.
    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Whether the amount is strictly positive.
    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// Checked addition.
    pub fn checked_add(self, other: Amount) -> Option<Amount> {
        self.0.checked_add(other.0).map(Amount)
    }

    /// Checked subtraction.
    pub fn checked_sub(self, other: Amount) -> Option<Amount> {
        self.0.checked_sub(other.0).map(Amount)
    }

    /// Saturating subtraction, used for remainder shares where the caller
    /// has already proven `other <= self`.
    pub fn saturating_sub(self, other: Amount) -> Amount {
        Amount(self.0.saturating_sub(other.0))
    }

    /// Multiply by a basis-point fraction, flooring toward zero.
    pub fn apply_bps(self, bps: BasisPoints) -> Amount {
        let scaled = (self.0 as i128) * (bps.value() as i128) / (BasisPoints::MAX_VALUE as i128);
        Amount(scaled as i64)
    }

    /// Parse a decimal string such as `"100"`, `"20.5"` or `"20.00"`.
    ///
    /// At most two fractional digits are accepted; anything finer would be
    /// silently rounded, which is exactly what fixed-point money forbids.
    pub fn parse_decimal(s: &str) -> Result<Self, ValidationError> {
        let invalid = || ValidationError::InvalidAmount(s.to_string());
        let trimmed = s.trim();
        let (negative, body) = match trimmed.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, trimmed),
        };
        if body.is_empty() {
            return Err(invalid());
        }
        let (whole, frac) = match body.split_once('.') {
            Some((w, f)) => (w, f),
            None => (body, ""),
        };
        if whole.is_empty() || !whole.chars().all(|c| c.is_ascii_digit()) {
            return Err(invalid());
        }
        if frac.len() > 2 || !frac.chars().all(|c| c.is_ascii_digit()) {
            return Err(invalid());
        }
        if body.contains('.') && frac.is_empty() {
            return Err(invalid());
        }
        let whole: i64 = whole.parse().map_err(|_| invalid())?;
        let frac_minor: i64 = match frac.len() {
            0 => 0,
            1 => frac.parse::<i64>().map_err(|_| invalid())? * 10,
            _ => frac.parse().map_err(|_| invalid())?,
        };
        let minor = whole
            .checked_mul(MINOR_PER_MAJOR)
            .and_then(|w| w.checked_add(frac_minor))
            .ok_or_else(invalid)?;
        Ok(Self(if negative { -minor } else { minor }))
    }
}

impl std::fmt::Display for Amount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        let per = MINOR_PER_MAJOR as u64;
        write!(f, "{sign}{}.{:02}", abs / per, abs % per)
    }
}

impl std::iter::Sum for Amount {
    fn sum<I: Iterator<Item = Amount>>(iter: I) -> Self {
        Amount(iter.map(|a| a.0).sum())
    }
}

/// A fraction expressed in basis points, `0..=10000`.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(try_from = "u32", into = "u32")]
pub struct BasisPoints(u32);

impl BasisPoints {
    /// 100% expressed in basis points.
    pub const MAX_VALUE: u32 = 10_000;
    /// Zero basis points.
    pub const ZERO: BasisPoints = BasisPoints(0);
    /// One hundred percent.
    pub const FULL: BasisPoints = BasisPoints(Self::MAX_VALUE);

    /// Construct a validated basis-point value.
    pub fn new(value: u32) -> Result<Self, ValidationError> {
        if value > Self::MAX_VALUE {
            return Err(ValidationError::InvalidBasisPoints(value));
        }
        Ok(Self(value))
    }

    /// Construct from a whole percentage `0..=100`.
    pub fn from_percent(percent: u32) -> Result<Self, ValidationError> {
        if percent > 100 {
            return Err(ValidationError::InvalidPercentage(percent));
        }
        Ok(Self(percent * 100))
    }

    /// The raw basis-point value.
    pub const fn value(&self) -> u32 {
        self.0
    }

    /// `10000 - self`.
    pub fn complement(&self) -> BasisPoints {
        BasisPoints(Self::MAX_VALUE - self.0)
    }

    /// Add two fractions, failing if the sum exceeds 100%.
    pub fn checked_add(self, other: BasisPoints) -> Option<BasisPoints> {
        let sum = self.0 + other.0;
        (sum <= Self::MAX_VALUE).then_some(BasisPoints(sum))
    }

    /// Scale this fraction by another (`self * other / 10000`), flooring.
    pub fn scale(&self, by: BasisPoints) -> BasisPoints {
        BasisPoints(self.0 * by.0 / Self::MAX_VALUE)
    }
}

impl TryFrom<u32> for BasisPoints {
    type Error = ValidationError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<BasisPoints> for u32 {
    fn from(bps: BasisPoints) -> u32 {
        bps.0
    }
}

impl std::fmt::Display for BasisPoints {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}bps", self.0)
    }
}

/// ISO 4217 currency code.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Currency(String);

impl Currency {
    /// Validate and construct a currency code.
    pub fn new(code: impl Into<String>) -> Result<Self, ValidationError> {
        let code = code.into();
        if code.len() != 3 || !code.chars().all(|c| c.is_ascii_uppercase()) {
            return Err(ValidationError::InvalidCurrency(code));
        }
        Ok(Self(code))
    }

    /// The currency code as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for Currency {
    fn default() -> Self {
        Self("USD".to_string())
    }
}

impl TryFrom<String> for Currency {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Currency> for String {
    fn from(c: Currency) -> String {
        c.0
    }
}

impl std::fmt::Display for Currency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn parse_decimal_accepts_common_forms() {
        assert_eq!(Amount::parse_decimal("100").unwrap(), Amount::from_minor(10_000));
        assert_eq!(Amount::parse_decimal("20.00").unwrap(), Amount::from_minor(2_000));
        assert_eq!(Amount::parse_decimal("20.5").unwrap(), Amount::from_minor(2_050));
        assert_eq!(Amount::parse_decimal("0.07").unwrap(), Amount::from_minor(7));
        assert_eq!(Amount::parse_decimal("-1.25").unwrap(), Amount::from_minor(-125));
    }

    #[test]
    fn parse_decimal_rejects_bad_input() {
        for bad in ["", "-", ".", "1.", ".5", "1.234", "abc", "1.2.3", "1e3"] {
            assert!(Amount::parse_decimal(bad).is_err(), "accepted {bad:?}");
        }
    }

    #[test]
    fn display_two_decimals() {
        assert_eq!(Amount::from_minor(1_000).to_string(), "10.00");
        assert_eq!(Amount::from_minor(7).to_string(), "0.07");
        assert_eq!(Amount::from_minor(-125).to_string(), "-1.25");
    }

    #[test]
    fn apply_bps_floors() {
        let amount = Amount::from_minor(2_000);
        assert_eq!(amount.apply_bps(BasisPoints::new(3_000).unwrap()), Amount::from_minor(600));
        assert_eq!(Amount::from_minor(333).apply_bps(BasisPoints::new(5_000).unwrap()), Amount::from_minor(166));
    }

    #[test]
    fn basis_points_bounds() {
        assert!(BasisPoints::new(10_000).is_ok());
        assert!(BasisPoints::new(10_001).is_err());
        assert!(BasisPoints::from_percent(101).is_err());
        assert_eq!(BasisPoints::from_percent(30).unwrap().value(), 3_000);
    }

    #[test]
    fn basis_points_serde_rejects_out_of_range() {
        assert!(serde_json::from_str::<BasisPoints>("10001").is_err());
        assert_eq!(serde_json::from_str::<BasisPoints>("2500").unwrap().value(), 2_500);
    }

    #[test]
    fn checked_add_caps_at_full() {
        let a = BasisPoints::new(6_000).unwrap();
        let b = BasisPoints::new(4_001).unwrap();
        assert!(a.checked_add(b).is_none());
        assert_eq!(a.checked_add(a.complement()), Some(BasisPoints::FULL));
    }

    #[test]
    fn currency_validation() {
        assert!(Currency::new("USD").is_ok());
        assert!(Currency::new("usd").is_err());
        assert!(Currency::new("US").is_err());
        assert_eq!(Currency::default().as_str(), "USD");
    }

    proptest! {
        #[test]
        fn apply_bps_never_exceeds_amount(minor in 0i64..1_000_000_000, bps in 0u32..=10_000) {
            let amount = Amount::from_minor(minor);
            let share = amount.apply_bps(BasisPoints::new(bps).unwrap());
            prop_assert!(share <= amount);
            prop_assert!(share >= Amount::ZERO);
        }

        #[test]
        fn display_parse_roundtrip(minor in -1_000_000_000i64..1_000_000_000) {
            let amount = Amount::from_minor(minor);
            prop_assert_eq!(Amount::parse_decimal(&amount.to_string()).unwrap(), amount);
        }
    }
}
