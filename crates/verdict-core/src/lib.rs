#![deny(missing_docs)]

//! # verdict-core: Foundational Types for the Verdict Dispute Engine
//!
//! This crate defines the types every other crate in the workspace depends
//! on. It has no internal crate dependencies.
//!
//! ## Design Principles
//!
//! 1. **Newtype wrappers for identifiers.** You cannot pass a [`TaskId`]
//!    where a [`SubmissionId`] is expected.
//!
//! 2. **Fixed-point money.** [`Amount`] is an integer count of minor
//!    currency units and every percentage is expressed in [`BasisPoints`].
//!    No floating-point value ever touches a monetary computation.
//!
//! 3. **Injected time.** Deadlines are evaluated against a [`Clock`] so
//!    expiry behaviour is deterministic under test.
//!
//! 4. **Structured errors.** [`ValidationError`] built with `thiserror`.

pub mod digest;
pub mod error;
pub mod identity;
pub mod money;
pub mod temporal;

pub use digest::{sha256_bytes, sha256_json, ContentDigest};
pub use error::ValidationError;
pub use identity::{
    DisputeId, EvidenceId, LedgerEntryId, StakeId, SubmissionId, TaskId, UserId,
};
pub use money::{Amount, BasisPoints, Currency};
pub use temporal::{Clock, ManualClock, SystemClock, Timestamp};
