use anyhow::{Context, Result};
use clubhouse_config::QueryConfig;
use clubhouse_core::{
    fetch_by_id, run_query, table_state_to_query_spec, AdapterConfig, Entity, Group, Location,
    LocationCodeLookup, Page, PaginationMode, QuerySpec, Role, ScanDataSource, TableState,
    TableStore, Task, User,
};
use tracing::debug;

use super::print_envelope;
use crate::cli::Resource;

/// Decode the command input into a query
///
/// Table state is converted in cursor mode since scan-backed resources only
/// page by cursor.
pub fn parse_spec(input: &str, table_state: bool) -> Result<QuerySpec> {
    if table_state {
        let state: TableState =
            serde_json::from_str(input).context("input is not valid table state JSON")?;
        let adapter = AdapterConfig::default().mode(PaginationMode::Cursor);
        Ok(table_state_to_query_spec(&state, &adapter))
    } else if input.trim().is_empty() {
        Ok(QuerySpec::new())
    } else {
        serde_json::from_str(input).context("input is not valid query JSON")
    }
}

fn source<E: Entity, S: TableStore>(store: S, config: &QueryConfig) -> ScanDataSource<E, S> {
    ScanDataSource::new(store)
        .with_default_limit(config.default_limit)
        .with_max_limit(config.max_limit)
}

async fn query_as<E: Entity, S: TableStore>(
    store: S,
    config: &QueryConfig,
    spec: &QuerySpec,
) -> Result<bool> {
    let source = source::<E, S>(store, config);
    print_envelope(&run_query(&source, spec).await)
}

async fn get_as<E: Entity, S: TableStore>(store: S, config: &QueryConfig, id: &str) -> Result<bool> {
    let source = source::<E, S>(store, config);
    print_envelope(&fetch_by_id(&source, id).await)
}

/// Run `spec` against `resource`
pub async fn execute<S: TableStore>(
    store: S,
    config: &QueryConfig,
    resource: Resource,
    spec: &QuerySpec,
) -> Result<bool> {
    debug!(?resource, filters = spec.filters.len(), "running query");
    match resource {
        Resource::User => query_as::<User, S>(store, config, spec).await,
        Resource::Location => query_as::<Location, S>(store, config, spec).await,
        Resource::Group => query_as::<Group, S>(store, config, spec).await,
        Resource::Role => query_as::<Role, S>(store, config, spec).await,
        Resource::Page => query_as::<Page, S>(store, config, spec).await,
        Resource::LocationCode => query_as::<LocationCodeLookup, S>(store, config, spec).await,
        Resource::Task => query_as::<Task, S>(store, config, spec).await,
    }
}

/// Fetch one `resource` item by id
pub async fn get<S: TableStore>(
    store: S,
    config: &QueryConfig,
    resource: Resource,
    id: &str,
) -> Result<bool> {
    debug!(?resource, id, "fetching by id");
    match resource {
        Resource::User => get_as::<User, S>(store, config, id).await,
        Resource::Location => get_as::<Location, S>(store, config, id).await,
        Resource::Group => get_as::<Group, S>(store, config, id).await,
        Resource::Role => get_as::<Role, S>(store, config, id).await,
        Resource::Page => get_as::<Page, S>(store, config, id).await,
        Resource::LocationCode => get_as::<LocationCodeLookup, S>(store, config, id).await,
        Resource::Task => get_as::<Task, S>(store, config, id).await,
    }
}
