use clap::{Parser, Subcommand, ValueEnum};
use clubhouse_core::Outcome;
use std::path::PathBuf;
use tracing_subscriber::filter::LevelFilter;

#[derive(Parser)]
#[command(name = "clubhouse")]
#[command(about = "clubhouse - query members and claim outreach targets")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Log level: off, error, warn, info, debug or trace
    /// (config file value when omitted)
    #[arg(short = 'l', long, global = true, value_name = "LEVEL")]
    pub log_level: Option<LevelFilter>,

    /// Enable verbose logging (shortcut for --log-level=debug)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Config file path (defaults and CLUBHOUSE_* environment when omitted)
    #[arg(short = 'C', long, global = true)]
    pub config: Option<PathBuf>,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    pub json_logs: bool,

    /// Table name (overrides config file and environment)
    #[arg(long, global = true)]
    pub table: Option<String>,

    /// Endpoint URL, e.g. a local DynamoDB (overrides config file and environment)
    #[arg(long, global = true)]
    pub endpoint: Option<String>,
}

/// Queryable resources
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Resource {
    User,
    Location,
    Group,
    Role,
    Page,
    LocationCode,
    Task,
}

/// Outcome recorded for a claimed target
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutcomeArg {
    Skipped,
    Completed,
}

impl From<OutcomeArg> for Outcome {
    fn from(outcome: OutcomeArg) -> Self {
        match outcome {
            OutcomeArg::Skipped => Outcome::Skipped,
            OutcomeArg::Completed => Outcome::Completed,
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a query against one resource and print the result envelope
    Query {
        /// Resource to query
        #[arg(short, long, value_enum)]
        resource: Resource,

        /// Query JSON (reads stdin when omitted)
        #[arg(short, long)]
        spec: Option<String>,

        /// Interpret the input as table UI state instead of a query
        #[arg(long)]
        table_state: bool,
    },

    /// Fetch one item by id
    Get {
        /// Resource to read
        #[arg(short, long, value_enum)]
        resource: Resource,

        /// Item id (email for users)
        #[arg(long)]
        id: String,
    },

    /// Claim unassigned targets of a task for a volunteer
    Assign {
        /// Task id
        #[arg(long)]
        task: String,

        /// Volunteer email to act as
        #[arg(long = "as", value_name = "EMAIL")]
        volunteer: String,

        /// Number of targets to claim
        #[arg(short = 'n', long, default_value_t = 1)]
        count: usize,
    },

    /// Record the outcome of a claimed target
    Outcome {
        /// Task id
        #[arg(long)]
        task: String,

        /// Target user email
        #[arg(long)]
        target: String,

        /// Volunteer email that owns the claim
        #[arg(long = "as", value_name = "EMAIL")]
        volunteer: String,

        /// Final outcome
        #[arg(value_enum)]
        outcome: OutcomeArg,
    },

    /// Return a claimed target to the pool
    Release {
        /// Task id
        #[arg(long)]
        task: String,

        /// Target user email
        #[arg(long)]
        target: String,

        /// Volunteer email that owns the claim
        #[arg(long = "as", value_name = "EMAIL")]
        volunteer: String,
    },

    /// List a volunteer's assignments within a task
    Assignments {
        /// Task id
        #[arg(long)]
        task: String,

        /// Volunteer email
        #[arg(long = "as", value_name = "EMAIL")]
        volunteer: String,
    },

    /// Configuration commands
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum ConfigCommands {
    /// Print the effective configuration as TOML
    Show,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_with_inline_spec() {
        let cli = Cli::try_parse_from([
            "clubhouse",
            "query",
            "--resource",
            "location-code",
            "--spec",
            "{}",
        ])
        .unwrap();
        match cli.command {
            Commands::Query {
                resource,
                spec,
                table_state,
            } => {
                assert_eq!(resource, Resource::LocationCode);
                assert_eq!(spec.as_deref(), Some("{}"));
                assert!(!table_state);
            }
            _ => panic!("expected query"),
        }
    }

    #[test]
    fn test_assign_uses_as_flag() {
        let cli = Cli::try_parse_from([
            "clubhouse", "assign", "--task", "t1", "--as", "ann@club.org", "-n", "5", "-v",
        ])
        .unwrap();
        assert!(cli.verbose);
        match cli.command {
            Commands::Assign {
                task,
                volunteer,
                count,
            } => {
                assert_eq!(task, "t1");
                assert_eq!(volunteer, "ann@club.org");
                assert_eq!(count, 5);
            }
            _ => panic!("expected assign"),
        }
    }

    #[test]
    fn test_outcome_requires_known_value() {
        assert!(Cli::try_parse_from([
            "clubhouse", "outcome", "--task", "t1", "--target", "b@c.d", "--as", "a@c.d", "maybe",
        ])
        .is_err());
    }

    #[test]
    fn test_global_overrides_after_subcommand() {
        let cli = Cli::try_parse_from([
            "clubhouse",
            "config",
            "show",
            "--table",
            "club-dev",
            "--log-level",
            "warn",
        ])
        .unwrap();
        assert_eq!(cli.table.as_deref(), Some("club-dev"));
        assert_eq!(cli.log_level, Some(LevelFilter::WARN));
        assert!(matches!(cli.command, Commands::Config(ConfigCommands::Show)));
    }

    #[test]
    fn test_package_metadata_names_this_project() {
        assert_eq!(env!("CARGO_PKG_AUTHORS"), "Clubhouse developers");
        assert_eq!(env!("CARGO_PKG_REPOSITORY"), "");
        assert_eq!(env!("CARGO_PKG_HOMEPAGE"), "");
    }
}
