//! Subcommand implementations
//!
//! Every command prints one JSON action envelope on stdout and reports
//! whether it succeeded so `main` can pick the exit code.

pub mod assign;
pub mod config;
pub mod query;

use std::io::Read;

use anyhow::{Context, Result};
use clubhouse_core::ActionResult;
use serde::Serialize;

/// Print an action envelope as pretty JSON and report success
pub fn print_envelope<T: Serialize>(result: &ActionResult<T>) -> Result<bool> {
    let json = serde_json::to_string_pretty(result).context("failed to encode result")?;
    println!("{}", json);
    Ok(result.is_success())
}

/// Inline argument, or all of stdin when absent
pub fn read_input(inline: Option<String>) -> Result<String> {
    match inline {
        Some(text) => Ok(text),
        None => {
            let mut buffer = String::new();
            std::io::stdin()
                .read_to_string(&mut buffer)
                .context("failed to read stdin")?;
            Ok(buffer)
        }
    }
}
