#![deny(missing_docs)]

//! # verdict-arbitration: Multi-Tier Dispute Resolution
//!
//! Resolves disputes over rejected task submissions in up to three tiers:
//!
//! - **Tier 1** (`autoscore.rs`): a weighted score over the submission's
//!   verification score, artefact count, GPS proximity, timing and image
//!   quality. Decisive scores resolve after a review window; the middle
//!   band escalates.
//!
//! - **Tier 2** (`jury.rs`): a deterministic, reliability-weighted jury
//!   drawn from eligible users. Ties favour the worker.
//!
//! - **Tier 3** (`service.rs`): an administrator upholds or overrides an
//!   appealed jury decision. Appeals require a stake.
//!
//! The dispute record and its tier state machine live in `dispute.rs` and
//! `tier.rs`. Every decision flows through the
//! [`ResolutionExecutor`](resolution::ResolutionExecutor), which commits
//! the decision, settles the worker's stake through `verdict-stake`,
//! records a hash-chained audit entry and publishes an event.
//!
//! ## Crate Policy
//!
//! - Depends on `verdict-core` and `verdict-stake` internally.
//! - All money is integer minor units; splits use basis points.
//! - Time is read from an injected [`Clock`](verdict_core::Clock).

pub mod audit;
pub mod autoscore;
pub mod collaborators;
pub mod config;
pub mod dispute;
pub mod error;
pub mod events;
pub mod evidence;
pub mod jury;
pub mod resolution;
pub mod service;
pub mod settlement;
pub mod store;
pub mod tier;

pub use audit::{AuditAction, AuditEntry, AuditLog};
pub use autoscore::{AutoScoreEngine, AutoScoreResult, Recommendation, ScoreThresholds, ScoringInput};
pub use collaborators::{InMemoryDirectory, PayoutResolver, TaskDirectory, UserDirectory};
pub use config::ArbitrationConfig;
pub use dispute::{Actor, Decision, Dispute, DisputeStatus, Outcome, Resolution, ResolutionType, Resolver, Tier};
pub use error::{ArbitrationError, ErrorKind};
pub use events::{ArbitrationEvent, DisputeResolved, EventSink, RecordingSink, TracingSink};
pub use evidence::EvidenceItem;
pub use jury::{JuryPanel, JurySelector, Vote, VoteTally};
pub use service::{AdminDecision, ArbitrationService, ServiceDeps, SweepReport};
pub use settlement::{PendingSettlement, SettlementPlan};
