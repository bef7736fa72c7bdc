//! # verdict CLI entry point
//!
//! Parses command-line arguments, initialises logging and dispatches to the
//! subcommand handlers.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use verdict_cli::config::{run_config, ConfigArgs};
use verdict_cli::score::{run_score, ScoreArgs};
use verdict_cli::stake::{run_stake, StakeArgs};
use verdict_cli::{load_config, parse_config};

/// Verdict dispute engine tooling.
///
/// Quotes worker stakes, previews settlement splits, scores submission
/// fixtures and checks configuration files.
#[derive(Parser, Debug)]
#[command(name = "verdict", version, about, long_about = None)]
struct Cli {
    /// Enable verbose output. Repeat for more verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    log_json: bool,

    /// Path to a YAML configuration file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Stake quotes and settlement splits.
    Stake(StakeArgs),

    /// Run Tier-1 scoring over a submission fixture.
    Score(ScoreArgs),

    /// Configuration checks.
    Config(ConfigArgs),
}

fn init_tracing(verbose: u8, json: bool) {
    // RUST_LOG wins over -v.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| match verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    });
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.log_json);

    let mut stdout = std::io::stdout().lock();
    let result = match &cli.command {
        Commands::Config(args) => {
            parse_config(cli.config.as_deref()).and_then(|config| run_config(args, &config, &mut stdout))
        }
        Commands::Stake(args) => {
            load_config(cli.config.as_deref()).and_then(|config| run_stake(args, &config, &mut stdout))
        }
        Commands::Score(args) => {
            load_config(cli.config.as_deref()).and_then(|config| run_score(args, &config, &mut stdout))
        }
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{e:#}");
            eprintln!("error: {e:#}");
            ExitCode::from(1)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_stake_quote() {
        let cli = Cli::try_parse_from([
            "verdict", "stake", "quote", "--bounty", "100", "--strikes", "2", "--reputation", "95",
        ])
        .unwrap();
        assert!(matches!(cli.command, Commands::Stake(_)));
    }

    #[test]
    fn reputation_above_100_rejected() {
        let err = Cli::try_parse_from(["verdict", "stake", "quote", "--bounty", "1", "--reputation", "101"]);
        assert!(err.is_err());
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["verdict", "config", "check", "-vv", "--config", "v.yaml", "--log-json"]).unwrap();
        assert_eq!(cli.verbose, 2);
        assert!(cli.log_json);
        assert_eq!(cli.config, Some(PathBuf::from("v.yaml")));
    }

    #[test]
    fn score_takes_fixture_path() {
        let cli = Cli::try_parse_from(["verdict", "score", "fixture.json", "--brief"]).unwrap();
        match cli.command {
            Commands::Score(args) => {
                assert_eq!(args.fixture, PathBuf::from("fixture.json"));
                assert!(args.brief);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn split_requires_outcome() {
        assert!(Cli::try_parse_from(["verdict", "stake", "split", "--stake", "10"]).is_err());
    }
}
