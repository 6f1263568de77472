//! Showcase developer CLI.
//!
//! Validates site configuration and replays interaction scenarios against
//! the in-memory platform, printing the resulting page state.

use clap::{CommandFactory, Parser};
use showcase::cli;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

fn main() -> anyhow::Result<()> {
    let args = cli::Cli::parse();

    // Logs go to stderr so replay output stays parseable
    let filter = EnvFilter::from_default_env().add_directive("showcase=info".parse()?);
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .with(filter)
        .init();

    if cli::run_command(&args)? {
        return Ok(());
    }

    // No command specified
    cli::Cli::command().print_help()?;
    println!();
    Ok(())
}
