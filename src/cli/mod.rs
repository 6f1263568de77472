//! Command-line interface for the showcase developer harness.
//!
//! The page runtime itself runs in the browser; these commands validate site
//! configuration and replay interaction scenarios without one.

mod commands;

pub use commands::{Cli, Commands, run_command};
