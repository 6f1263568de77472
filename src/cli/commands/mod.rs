//! CLI command definitions and dispatch.
//!
//! Each subcommand is implemented in its own submodule:
//! - `check`: site configuration validation and summary
//! - `replay`: scenario replay against the in-memory platform

mod check;
mod replay;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub use check::{cmd_check, cmd_default_config};
pub use replay::cmd_replay;

/// Showcase developer CLI
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands
#[derive(Subcommand)]
pub enum Commands {
    /// Validate a site configuration file and summarize it
    Check {
        /// Path to the TOML config
        config: PathBuf,
    },
    /// Replay a scenario and print the resulting page state as JSON
    Replay {
        /// Path to the TOML scenario
        scenario: PathBuf,
        /// Site config to run with (defaults are used if absent)
        #[arg(short, long, env = "SHOWCASE_CONFIG")]
        config: Option<PathBuf>,
    },
    /// Print the default configuration as TOML
    DefaultConfig,
}

/// Run the specified CLI command.
///
/// Returns `Ok(true)` if a command was run, `Ok(false)` if no command was
/// specified (meaning usage should be printed).
pub fn run_command(cli: &Cli) -> anyhow::Result<bool> {
    match &cli.command {
        Some(Commands::Check { config }) => {
            cmd_check(config)?;
            Ok(true)
        }
        Some(Commands::Replay { scenario, config }) => {
            cmd_replay(scenario, config.as_deref())?;
            Ok(true)
        }
        Some(Commands::DefaultConfig) => {
            cmd_default_config()?;
            Ok(true)
        }
        None => Ok(false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_replay_with_config() {
        let cli = Cli::try_parse_from(["showcase", "replay", "s.toml", "--config", "site.toml"])
            .unwrap();
        match cli.command {
            Some(Commands::Replay { scenario, config }) => {
                assert_eq!(scenario, PathBuf::from("s.toml"));
                assert_eq!(config, Some(PathBuf::from("site.toml")));
            }
            _ => panic!("expected replay"),
        }
    }

    #[test]
    fn no_command_is_not_an_error() {
        let cli = Cli::try_parse_from(["showcase"]).unwrap();
        assert!(!run_command(&cli).unwrap());
    }
}
