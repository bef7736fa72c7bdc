//! # verdict-cli: Operator CLI for the Verdict Dispute Engine
//!
//! Offline tooling over the engine's pure computations. Nothing here talks
//! to a live dispute store.
//!
//! ## Subcommands
//!
//! - `verdict stake quote`: required stake for a bounty and worker history.
//! - `verdict stake split`: how a decision divides a stake.
//! - `verdict score`: run Tier-1 scoring over a submission fixture.
//! - `verdict config check`: validate a configuration file and print the
//!   effective settings.
//!
//! ```bash
//! verdict stake quote --bounty 100.00 --strikes 2 --reputation 95
//! verdict stake split --stake 15.00 --outcome requester
//! verdict --config verdict.yaml score fixtures/late-photo.json
//! verdict --config verdict.yaml config check
//! ```
//!
//! ## Crate Policy
//!
//! - Argument parsing lives here; every computation delegates to the domain
//!   crates.
//! - Handlers write to a caller-supplied writer and return an exit code.

pub mod config;
pub mod score;
pub mod stake;

use std::path::Path;

use anyhow::{Context, Result};
use verdict_arbitration::ArbitrationConfig;

/// Parse configuration from `path`, or the defaults when no path is given.
/// Does not validate.
pub fn parse_config(path: Option<&Path>) -> Result<ArbitrationConfig> {
    let Some(path) = path else {
        tracing::debug!("no configuration file; using defaults");
        return Ok(ArbitrationConfig::default());
    };
    let yaml = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read configuration from {}", path.display()))?;
    let config: ArbitrationConfig = serde_yaml::from_str(&yaml)
        .with_context(|| format!("failed to parse configuration from {}", path.display()))?;
    tracing::debug!(path = %path.display(), "configuration loaded");
    Ok(config)
}

/// Parse and validate configuration.
pub fn load_config(path: Option<&Path>) -> Result<ArbitrationConfig> {
    let config = parse_config(path)?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_without_path() {
        let config = load_config(None).unwrap();
        assert_eq!(config, ArbitrationConfig::default());
    }

    #[test]
    fn load_error_names_the_file() {
        let err = load_config(Some(Path::new("/nonexistent/verdict.yaml"))).unwrap_err();
        assert!(format!("{err:#}").contains("/nonexistent/verdict.yaml"));
    }

    #[test]
    fn loads_yaml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("verdict.yaml");
        std::fs::write(&path, "jury:\n  jury_size: 3\n").unwrap();
        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.jury.jury_size, 3);
    }

    #[test]
    fn parse_accepts_what_validation_rejects() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("verdict.yaml");
        std::fs::write(&path, "jury:\n  jury_size: 0\n").unwrap();
        assert_eq!(parse_config(Some(&path)).unwrap().jury.jury_size, 0);
        assert!(load_config(Some(&path)).is_err());
    }
}
