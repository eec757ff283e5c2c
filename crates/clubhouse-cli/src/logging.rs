use clubhouse_config::LoggingConfig;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

use crate::cli::Cli;

/// Level forced by command-line flags, if any
pub fn flag_level(cli: &Cli) -> Option<LevelFilter> {
    if cli.verbose {
        Some(LevelFilter::DEBUG)
    } else {
        cli.log_level
    }
}

/// Filter from flags, then `RUST_LOG`, then the configured directive
pub fn build_filter(cli: &Cli, config: &LoggingConfig) -> EnvFilter {
    match flag_level(cli) {
        Some(level) => EnvFilter::builder()
            .with_default_directive(level.into())
            .from_env_lossy(),
        None => EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(&config.level))
            .unwrap_or_else(|_| EnvFilter::new("info")),
    }
}

/// Install the global subscriber; logs go to stderr so stdout stays JSON
pub fn init(cli: &Cli, config: &LoggingConfig) {
    let filter = build_filter(cli, config);

    if cli.json_logs || config.json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
}
