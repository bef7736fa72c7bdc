//! # Config CLI: validate configuration and print the effective settings.

use std::io::Write;

use anyhow::Result;
use clap::{Args, Subcommand};

use verdict_arbitration::ArbitrationConfig;

/// Config subcommand arguments.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

/// Available config subcommands.
#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Validate the configuration and print it with defaults filled in.
    Check,
}

/// Execute the config subcommand.
///
/// `config` has already been parsed; validation errors are reported with
/// exit code 2 rather than as a hard error so scripts can tell a bad file
/// from a missing one.
pub fn run_config(args: &ConfigArgs, config: &ArbitrationConfig, out: &mut dyn Write) -> Result<u8> {
    match args.command {
        ConfigCommand::Check => match config.validate() {
            Ok(()) => {
                writeln!(out, "{}", serde_yaml::to_string(config)?.trim_end())?;
                Ok(0)
            }
            Err(e) => {
                writeln!(out, "configuration invalid: {e}")?;
                Ok(2)
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn effective_config_round_trips() {
        let mut out = Vec::new();
        let code = run_config(
            &ConfigArgs {
                command: ConfigCommand::Check,
            },
            &ArbitrationConfig::default(),
            &mut out,
        )
        .unwrap();
        assert_eq!(code, 0);
        let printed = ArbitrationConfig::from_yaml_str(&String::from_utf8(out).unwrap()).unwrap();
        assert_eq!(printed, ArbitrationConfig::default());
    }

    #[test]
    fn invalid_config_exits_2() {
        let config = ArbitrationConfig {
            slash_requester_share_bps: 12_000,
            ..ArbitrationConfig::default()
        };
        let mut out = Vec::new();
        let code = run_config(
            &ConfigArgs {
                command: ConfigCommand::Check,
            },
            &config,
            &mut out,
        )
        .unwrap();
        assert_eq!(code, 2);
        assert!(String::from_utf8(out).unwrap().contains("slash_requester_share_bps"));
    }
}
