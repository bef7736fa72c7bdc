//! # Validation Errors
//!
//! Errors raised when constructing domain primitives. Each variant carries
//! the rejected input so operators can diagnose bad data without guesswork.

use thiserror::Error;

/// Validation errors for domain primitive newtypes.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Basis points outside `0..=10000`.
    #[error("invalid basis points: {0} (expected 0..=10000)")]
    InvalidBasisPoints(u32),

    /// Percentage outside `0..=100`.
    #[error("invalid percentage: {0} (expected 0..=100)")]
    InvalidPercentage(u32),

    /// Monetary amount string could not be parsed as a fixed-point decimal.
    #[error("invalid monetary amount: \"{0}\" (expected decimal with at most 2 fractional digits)")]
    InvalidAmount(String),

    /// Currency code is not a three-letter ISO 4217 code.
    #[error("invalid currency code: \"{0}\" (expected 3 uppercase ASCII letters)")]
    InvalidCurrency(String),

    /// Timestamp string is not RFC 3339 UTC.
    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),
}
