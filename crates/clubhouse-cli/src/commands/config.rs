use anyhow::{Context, Result};
use clubhouse_config::ClubhouseConfig;

use crate::cli::ConfigCommands;

pub fn execute(config: &ClubhouseConfig, command: ConfigCommands) -> Result<bool> {
    match command {
        ConfigCommands::Show => {
            let rendered = toml::to_string_pretty(config).context("failed to render configuration")?;
            print!("{}", rendered);
            Ok(true)
        }
    }
}
