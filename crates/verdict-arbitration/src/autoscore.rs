//! # Tier 1: Automated Evidence Scoring
//!
//! Five weighted checks over the disputed submission:
//!
//! | check          | weight | rule                                                    |
//! |----------------|--------|---------------------------------------------------------|
//! | verification   | 30     | the submission's precomputed score, 0 to 100            |
//! | artefact count | 15     | `min(100, submitted / required * 100)`                  |
//! | location       | 25     | nearest GPS fix: 100 inside radius, 70 ≤1.5×, 40 ≤2×, 0 |
//! | timing         | 15     | 100 if submitted strictly before the deadline, else 0   |
//! | image quality  | 15     | tiered on average photo size and largest dimension      |
//!
//! The total is `Σ(score × weight) / Σweight`, rounded half-up to one
//! decimal. It is computed in integer tenths so the recommendation
//! thresholds compare exactly.

use serde::{Deserialize, Serialize};

use verdict_core::Timestamp;

/// Current version of [`AutoScoreResult`] records.
pub const AUTO_SCORE_SCHEMA_VERSION: u16 = 1;

const EARTH_RADIUS_M: f64 = 6_371_000.0;

// ── Inputs ─────────────────────────────────────────────────────────────

/// A WGS-84 coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    /// Latitude in degrees.
    pub lat: f64,
    /// Longitude in degrees.
    pub lon: f64,
}

impl GeoPoint {
    /// Great-circle distance in metres.
    pub fn distance_m(&self, other: &GeoPoint) -> f64 {
        let (lat1, lat2) = (self.lat.to_radians(), other.lat.to_radians());
        let dlat = lat2 - lat1;
        let dlon = (other.lon - self.lon).to_radians();
        let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
        2.0 * EARTH_RADIUS_M * a.sqrt().atan2((1.0 - a).sqrt())
    }
}

/// Kind of uploaded artefact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtefactKind {
    /// Still image.
    Photo,
    /// Video clip.
    Video,
    /// Document or scan.
    Document,
    /// Anything else.
    Other,
}

/// Extracted metadata for one uploaded artefact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artefact {
    /// Kind.
    pub kind: ArtefactKind,
    /// Size in bytes.
    pub file_size_bytes: u64,
    /// Pixel width, for images and video.
    #[serde(default)]
    pub width: Option<u32>,
    /// Pixel height, for images and video.
    #[serde(default)]
    pub height: Option<u32>,
    /// Embedded GPS fix.
    #[serde(default)]
    pub location: Option<GeoPoint>,
}

/// Everything the engine needs to score a submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringInput {
    /// The submission's precomputed verification score, 0 to 100.
    pub verification_score: u8,
    /// Submitted artefacts.
    pub artefacts: Vec<Artefact>,
    /// Artefacts the task asked for.
    pub required_artefacts: u32,
    /// Where the work was to be done, if the task is located.
    #[serde(default)]
    pub task_location: Option<GeoPoint>,
    /// Acceptable distance from `task_location`.
    #[serde(default)]
    pub radius_m: f64,
    /// When the work was submitted.
    pub submitted_at: Timestamp,
    /// Task deadline, if any.
    #[serde(default)]
    pub task_deadline: Option<Timestamp>,
}

// ── Outputs ────────────────────────────────────────────────────────────

/// Tier-1 recommendation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Recommendation {
    /// Score at or above the worker threshold.
    WorkerWins,
    /// Score at or below the requester threshold.
    RequesterWins,
    /// In between; send to a jury.
    Escalate,
}

impl Recommendation {
    /// Recommendation under the default thresholds (80 / 20).
    pub fn for_score(score: f64) -> Self {
        ScoreThresholds::default().recommend(score)
    }

    /// The canonical string name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::WorkerWins => "worker_wins",
            Self::RequesterWins => "requester_wins",
            Self::Escalate => "escalate",
        }
    }
}

/// Decision thresholds on the total score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoreThresholds {
    /// At or above: worker wins.
    pub worker_wins: f64,
    /// At or below: requester wins.
    pub requester_wins: f64,
}

impl Default for ScoreThresholds {
    fn default() -> Self {
        Self {
            worker_wins: 80.0,
            requester_wins: 20.0,
        }
    }
}

impl ScoreThresholds {
    /// Map a total score to a recommendation.
    pub fn recommend(&self, score: f64) -> Recommendation {
        if score >= self.worker_wins {
            Recommendation::WorkerWins
        } else if score <= self.requester_wins {
            Recommendation::RequesterWins
        } else {
            Recommendation::Escalate
        }
    }
}

/// The individual checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckName {
    /// Precomputed verification score.
    Verification,
    /// Submitted vs required artefacts.
    ArtefactCount,
    /// GPS proximity to the task location.
    Location,
    /// Submitted before the task deadline.
    Timing,
    /// Photo size and resolution.
    ImageQuality,
}

/// One check's contribution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckScore {
    /// Which check.
    pub check: CheckName,
    /// Score, 0 to 100.
    pub score: u8,
    /// Weight in the total.
    pub weight: u8,
    /// Human-readable basis for the score.
    pub detail: String,
}

/// Stored Tier-1 outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutoScoreResult {
    /// Record format version.
    pub schema_version: u16,
    /// Total, 0.0 to 100.0, one decimal.
    pub score: f64,
    /// Per-check breakdown.
    pub checks: Vec<CheckScore>,
    /// What the score recommends.
    pub recommendation: Recommendation,
    /// When it was computed.
    pub scored_at: Timestamp,
}

// ── Engine ─────────────────────────────────────────────────────────────

/// Computes [`AutoScoreResult`]s.
#[derive(Debug, Clone, Default)]
pub struct AutoScoreEngine {
    thresholds: ScoreThresholds,
}

impl AutoScoreEngine {
    /// Engine with the given thresholds.
    pub fn new(thresholds: ScoreThresholds) -> Self {
        Self { thresholds }
    }

    /// Score a submission.
    pub fn score(&self, input: &ScoringInput, now: Timestamp) -> AutoScoreResult {
        let checks = vec![
            verification_check(input),
            artefact_count_check(input),
            location_check(input),
            timing_check(input),
            image_quality_check(input),
        ];
        let weighted: u32 = checks
            .iter()
            .map(|c| u32::from(c.score) * u32::from(c.weight))
            .sum();
        let total_weight: u32 = checks.iter().map(|c| u32::from(c.weight)).sum();
        let tenths = if total_weight == 0 {
            0
        } else {
            (weighted * 20 + total_weight) / (2 * total_weight)
        };
        let score = f64::from(tenths) / 10.0;

        AutoScoreResult {
            schema_version: AUTO_SCORE_SCHEMA_VERSION,
            score,
            recommendation: self.thresholds.recommend(score),
            checks,
            scored_at: now,
        }
    }
}

fn check(check: CheckName, score: u8, weight: u8, detail: String) -> CheckScore {
    CheckScore {
        check,
        score,
        weight,
        detail,
    }
}

fn verification_check(input: &ScoringInput) -> CheckScore {
    let score = input.verification_score.min(100);
    check(CheckName::Verification, score, 30, format!("verification score {score}"))
}

fn artefact_count_check(input: &ScoringInput) -> CheckScore {
    let submitted = input.artefacts.len() as u64;
    let score = if input.required_artefacts == 0 {
        100
    } else {
        (submitted * 100 / u64::from(input.required_artefacts)).min(100) as u8
    };
    check(
        CheckName::ArtefactCount,
        score,
        15,
        format!("{submitted} of {} required artefacts", input.required_artefacts),
    )
}

fn location_check(input: &ScoringInput) -> CheckScore {
    let Some(target) = input.task_location else {
        return check(CheckName::Location, 100, 25, "task has no location".into());
    };
    let nearest = input
        .artefacts
        .iter()
        .filter_map(|a| a.location)
        .map(|p| p.distance_m(&target))
        .fold(None, |best: Option<f64>, d| Some(best.map_or(d, |b| b.min(d))));
    let Some(distance) = nearest else {
        return check(CheckName::Location, 50, 25, "no GPS data on any artefact".into());
    };
    let radius = input.radius_m.max(0.0);
    let score = if distance <= radius {
        100
    } else if distance <= radius * 1.5 {
        70
    } else if distance <= radius * 2.0 {
        40
    } else {
        0
    };
    check(
        CheckName::Location,
        score,
        25,
        format!("nearest fix {distance:.0}m, radius {radius:.0}m"),
    )
}

fn timing_check(input: &ScoringInput) -> CheckScore {
    let (score, detail) = match input.task_deadline {
        None => (100, "task has no deadline".to_string()),
        Some(deadline) if deadline.is_past(&input.submitted_at) => {
            (100, format!("submitted before {deadline}"))
        }
        Some(deadline) => (0, format!("submitted at or after {deadline}")),
    };
    check(CheckName::Timing, score, 15, detail)
}

fn image_quality_check(input: &ScoringInput) -> CheckScore {
    let photos: Vec<&Artefact> = input
        .artefacts
        .iter()
        .filter(|a| a.kind == ArtefactKind::Photo)
        .collect();
    if photos.is_empty() {
        return check(CheckName::ImageQuality, 50, 15, "no photos".into());
    }
    let avg_size = photos.iter().map(|p| p.file_size_bytes).sum::<u64>() / photos.len() as u64;
    let max_dimension = photos
        .iter()
        .map(|p| p.width.unwrap_or(0).max(p.height.unwrap_or(0)))
        .max()
        .unwrap_or(0);
    let score = match (avg_size, max_dimension) {
        (s, d) if s >= 500 * 1024 && d >= 1920 => 100,
        (s, d) if s >= 200 * 1024 && d >= 1280 => 75,
        (s, d) if s >= 50 * 1024 && d >= 640 => 50,
        _ => 25,
    };
    check(
        CheckName::ImageQuality,
        score,
        15,
        format!("{} photos, avg {} KiB, max {max_dimension}px", photos.len(), avg_size / 1024),
    )
}
