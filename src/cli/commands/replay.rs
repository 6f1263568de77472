//! Scenario replay command.

use std::path::Path;

use tracing::info;

use crate::config;
use crate::headless::{self, Scenario};

/// Config picked up from the working directory when none is given.
const DEFAULT_CONFIG_FILE: &str = "showcase.toml";

/// Replay a scenario file and print the final snapshot as pretty JSON.
pub fn cmd_replay(scenario_path: &Path, config_path: Option<&Path>) -> anyhow::Result<()> {
    let config = match config_path {
        Some(path) => config::from_path(path)?,
        None => config::load(Path::new(DEFAULT_CONFIG_FILE)),
    };
    let scenario = Scenario::from_path(scenario_path)?;
    info!("Replaying {:?}", scenario_path);

    let snapshot = headless::run(&config, &scenario)?;
    println!("{}", serde_json::to_string_pretty(&snapshot)?);
    Ok(())
}
