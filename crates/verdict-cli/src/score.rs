//! # Score CLI: run Tier-1 scoring over a submission fixture.
//!
//! The fixture is a JSON [`ScoringInput`]. The result is printed as JSON so
//! it can be diffed against a stored dispute's `auto_score_result`.

use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use verdict_arbitration::{ArbitrationConfig, AutoScoreEngine, ScoringInput};
use verdict_core::Timestamp;

/// Score subcommand arguments.
#[derive(Args, Debug)]
pub struct ScoreArgs {
    /// Path to a JSON scoring fixture.
    pub fixture: PathBuf,

    /// Evaluation time (RFC 3339, Z suffix). Defaults to now.
    #[arg(long)]
    pub at: Option<String>,

    /// Print only the total and recommendation.
    #[arg(long)]
    pub brief: bool,
}

/// Execute the score subcommand.
pub fn run_score(args: &ScoreArgs, config: &ArbitrationConfig, out: &mut dyn Write) -> Result<u8> {
    let raw = std::fs::read_to_string(&args.fixture)
        .with_context(|| format!("failed to read fixture: {}", args.fixture.display()))?;
    let input: ScoringInput = serde_json::from_str(&raw)
        .with_context(|| format!("invalid scoring fixture: {}", args.fixture.display()))?;
    let now = match &args.at {
        Some(at) => Timestamp::parse(at).with_context(|| format!("invalid --at {at:?}"))?,
        None => Timestamp::now(),
    };

    let result = AutoScoreEngine::new(config.thresholds).score(&input, now);
    tracing::info!(
        fixture = %args.fixture.display(),
        score = result.score,
        recommendation = result.recommendation.as_str(),
        "fixture scored"
    );

    if args.brief {
        writeln!(out, "{:.1} {}", result.score, result.recommendation.as_str())?;
    } else {
        writeln!(out, "{}", serde_json::to_string_pretty(&result)?)?;
    }
    Ok(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture(dir: &tempfile::TempDir, body: &str) -> PathBuf {
        let path = dir.path().join("fixture.json");
        std::fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn scores_fixture() {
        let dir = tempfile::tempdir().unwrap();
        let path = fixture(
            &dir,
            r#"{
                "verification_score": 100,
                "artefacts": [],
                "required_artefacts": 0,
                "submitted_at": "2026-03-01T12:00:00Z"
            }"#,
        );
        let args = ScoreArgs {
            fixture: path,
            at: Some("2026-03-02T12:00:00Z".into()),
            brief: true,
        };
        let mut out = Vec::new();
        assert_eq!(run_score(&args, &ArbitrationConfig::default(), &mut out).unwrap(), 0);
        assert_eq!(String::from_utf8(out).unwrap().trim(), "92.5 worker_wins");
    }

    #[test]
    fn malformed_fixture_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let args = ScoreArgs {
            fixture: fixture(&dir, "{ not json"),
            at: None,
            brief: false,
        };
        let err = run_score(&args, &ArbitrationConfig::default(), &mut Vec::new()).unwrap_err();
        assert!(err.to_string().contains("invalid scoring fixture"));
    }
}
