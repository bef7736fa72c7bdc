//! # Stake CLI: quote required stakes and preview settlement splits.
//!
//! ```bash
//! verdict stake quote --bounty 250.00 --strikes 1 --reputation 40
//! verdict stake split --stake 37.50 --outcome worker --split 60
//! ```

use std::io::Write;

use anyhow::{Context, Result};
use clap::{Args, Subcommand, ValueEnum};
use serde_json::json;

use verdict_arbitration::{ArbitrationConfig, Decision, Outcome, SettlementPlan};
use verdict_core::Amount;

/// Stake subcommand arguments.
#[derive(Args, Debug)]
pub struct StakeArgs {
    #[command(subcommand)]
    pub command: StakeCommand,
}

/// Available stake subcommands.
#[derive(Subcommand, Debug)]
pub enum StakeCommand {
    /// Required stake for a worker claiming a task.
    Quote {
        /// Task bounty, e.g. 100 or 99.50.
        #[arg(long)]
        bounty: String,

        /// Strikes on the worker's record.
        #[arg(long, default_value_t = 0)]
        strikes: u32,

        /// Worker reputation, 0 to 100.
        #[arg(long, default_value_t = 50, value_parser = clap::value_parser!(u8).range(0..=100))]
        reputation: u8,

        /// Print JSON instead of text.
        #[arg(long)]
        json: bool,
    },

    /// Divide a stake the way a dispute decision would.
    Split {
        /// Stake amount.
        #[arg(long)]
        stake: String,

        /// Winning side.
        #[arg(long, value_enum)]
        outcome: Side,

        /// Worker's share of the bounty in percent, for a partial decision.
        #[arg(long, value_parser = clap::value_parser!(u8).range(0..=100))]
        split: Option<u8>,

        /// Print JSON instead of text.
        #[arg(long)]
        json: bool,
    },
}

/// A dispute side on the command line.
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Side {
    /// The worker.
    Worker,
    /// The requester.
    Requester,
}

impl From<Side> for Outcome {
    fn from(side: Side) -> Self {
        match side {
            Side::Worker => Outcome::WorkerWins,
            Side::Requester => Outcome::RequesterWins,
        }
    }
}

/// Execute the stake subcommand.
pub fn run_stake(args: &StakeArgs, config: &ArbitrationConfig, out: &mut dyn Write) -> Result<u8> {
    match &args.command {
        StakeCommand::Quote {
            bounty,
            strikes,
            reputation,
            json,
        } => run_quote(config, bounty, *strikes, *reputation, *json, out),
        StakeCommand::Split {
            stake,
            outcome,
            split,
            json,
        } => run_split(config, stake, *outcome, *split, *json, out),
    }
}

fn parse_amount(flag: &str, value: &str) -> Result<Amount> {
    let amount = Amount::parse_decimal(value).with_context(|| format!("invalid --{flag} {value:?}"))?;
    if amount.minor_units() < 0 {
        anyhow::bail!("--{flag} must not be negative");
    }
    Ok(amount)
}

fn run_quote(
    config: &ArbitrationConfig,
    bounty: &str,
    strikes: u32,
    reputation: u8,
    json: bool,
    out: &mut dyn Write,
) -> Result<u8> {
    let bounty = parse_amount("bounty", bounty)?;
    let required = config.stake.required_stake(bounty, strikes, reputation);
    tracing::debug!(%bounty, strikes, reputation, bps = required.percentage.value(), "stake quoted");

    if json {
        let body = json!({
            "bounty": bounty,
            "currency": config.currency,
            "strike_count": strikes,
            "reputation": reputation,
            "percentage_bps": required.percentage,
            "amount": required.amount,
        });
        writeln!(out, "{}", serde_json::to_string_pretty(&body)?)?;
    } else {
        writeln!(out, "  bounty:     {bounty} {}", config.currency)?;
        writeln!(out, "  strikes:    {strikes}")?;
        writeln!(out, "  reputation: {reputation}")?;
        writeln!(out, "  stake:      {} ({})", required.amount, required.percentage)?;
    }
    Ok(0)
}

fn run_split(
    config: &ArbitrationConfig,
    stake: &str,
    side: Side,
    split: Option<u8>,
    json: bool,
    out: &mut dyn Write,
) -> Result<u8> {
    let stake = parse_amount("stake", stake)?;
    let decision = match split {
        Some(pct) => Decision::split(side.into(), pct)?,
        None => Decision::pure(side.into()),
    };
    let plan = SettlementPlan::for_decision(&decision, config.slash_requester_share())?;
    let shares = plan.split(stake)?;

    if json {
        let body = json!({
            "stake": stake,
            "decision": decision,
            "plan": plan,
            "split": shares,
        });
        writeln!(out, "{}", serde_json::to_string_pretty(&body)?)?;
    } else {
        writeln!(out, "  decision:   {}", decision.resolution_type().as_str())?;
        writeln!(out, "  worker:     {}", shares.worker_return)?;
        writeln!(out, "  requester:  {}", shares.requester_share)?;
        writeln!(out, "  platform:   {}", shares.platform_share)?;
    }
    Ok(0)
}
