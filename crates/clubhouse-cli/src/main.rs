use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{debug, info};

use clubhouse_cli::{
    cli::{Cli, Commands},
    commands, logging,
};
use clubhouse_config::{ClubhouseConfig, ConfigLoader};
use clubhouse_core::SelfAssignmentEngine;
use clubhouse_dynamodb::DynamoTable;

async fn connect(config: &ClubhouseConfig) -> Arc<DynamoTable> {
    let table = Arc::new(DynamoTable::connect(&config.table).await);
    info!(table = table.table_name(), "connected");
    table
}

async fn engine(config: &ClubhouseConfig) -> SelfAssignmentEngine<Arc<DynamoTable>> {
    SelfAssignmentEngine::new(connect(config).await, config.assignment.clone())
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // Load configuration, then apply CLI overrides
    let mut config = ConfigLoader::load(cli.config.as_deref())
        .await
        .context("failed to load configuration")?;
    if let Some(table) = &cli.table {
        config.table.name = table.clone();
    }
    if let Some(endpoint) = &cli.endpoint {
        config.table.endpoint = Some(endpoint.clone());
    }

    logging::init(&cli, &config.logging);
    debug!(table = %config.table.name, "configuration loaded");

    let ok = match cli.command {
        Commands::Config(cmd) => commands::config::execute(&config, cmd)?,

        Commands::Query {
            resource,
            spec,
            table_state,
        } => {
            let input = commands::read_input(spec)?;
            let spec = commands::query::parse_spec(&input, table_state)?;
            commands::query::execute(connect(&config).await, &config.query, resource, &spec).await?
        }

        Commands::Get { resource, id } => {
            commands::query::get(connect(&config).await, &config.query, resource, &id).await?
        }

        Commands::Assign {
            task,
            volunteer,
            count,
        } => commands::assign::claim(&engine(&config).await, &task, &volunteer, count).await?,

        Commands::Outcome {
            task,
            target,
            volunteer,
            outcome,
        } => {
            commands::assign::record_outcome(
                &engine(&config).await,
                &task,
                &target,
                &volunteer,
                outcome.into(),
            )
            .await?
        }

        Commands::Release {
            task,
            target,
            volunteer,
        } => commands::assign::release(&engine(&config).await, &task, &target, &volunteer).await?,

        Commands::Assignments { task, volunteer } => {
            commands::assign::list(&engine(&config).await, &task, &volunteer).await?
        }
    };

    Ok(if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}
