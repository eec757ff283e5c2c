//! Clubhouse CLI library
//!
//! Argument parsing, logging bootstrap and subcommand implementations for
//! the `clubhouse` binary. Commands are generic over the table store so they
//! run against DynamoDB in production and the in-memory table in tests.

pub mod cli;
pub mod commands;
pub mod logging;
