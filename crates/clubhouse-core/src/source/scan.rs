//! Scan-backed data source over one entity type
//!
//! Filters are applied by the backend *after* it reads each item, so the
//! page `limit` bounds how many items come back, not how many the backend
//! reads to find them. A selective filter over a large table can read the
//! whole table to fill one page. That is why every query is checked against
//! the entity's filter whitelist before any storage call, and why lookups by
//! id go through [`KeyedDataSource::get_by_id`], which is a single-item read.
//!
//! Pagination is cursor-only. Offsets greater than zero are rejected, and a
//! requested sort is ignored (results come back in table key order).

use std::marker::PhantomData;

use async_trait::async_trait;
use clubhouse_config::MAX_PAGE_SIZE;
use serde_json::Value;
use tracing::{debug, warn};

use super::{DataSource, KeyedDataSource};
use crate::entities::Entity;
use crate::error::{DataError, DataResult};
use crate::keys::{META, PK_ATTR};
use crate::query::{decode_cursor, encode_cursor, FilterOp, QueryResult, QuerySpec, DEFAULT_LIMIT};
use crate::table::{ContinuationKey, ScanFilter, ScanOp, ScanRequest, TableStore};
use crate::validation::{validate_filters, ResourceFilterConfig};

fn scan_op(op: FilterOp) -> ScanOp {
    match op {
        FilterOp::Eq => ScanOp::Eq,
        FilterOp::Contains => ScanOp::Contains,
        FilterOp::Gt => ScanOp::Gt,
        FilterOp::Lt => ScanOp::Lt,
    }
}

/// Cursor-paginated source backed by a filtered table scan
pub struct ScanDataSource<E, S> {
    store: S,
    filter_config: ResourceFilterConfig,
    default_limit: u32,
    max_limit: u32,
    _entity: PhantomData<fn() -> E>,
}

impl<E: Entity, S: TableStore> ScanDataSource<E, S> {
    /// Create a source using the entity's own filter whitelist
    pub fn new(store: S) -> Self {
        Self {
            store,
            filter_config: E::filter_config(),
            default_limit: DEFAULT_LIMIT,
            max_limit: MAX_PAGE_SIZE,
            _entity: PhantomData,
        }
    }

    /// Builder-style: replace the filter whitelist
    #[must_use]
    pub fn with_filter_config(mut self, config: ResourceFilterConfig) -> Self {
        self.filter_config = config;
        self
    }

    /// Builder-style: page size used when a query has no pagination
    #[must_use]
    pub fn with_default_limit(mut self, limit: u32) -> Self {
        self.default_limit = limit;
        self
    }

    /// Builder-style: largest page a query may request
    #[must_use]
    pub fn with_max_limit(mut self, limit: u32) -> Self {
        self.max_limit = limit;
        self
    }

    /// Scan filter for `spec`: the entity restriction plus every condition
    pub fn scan_filter(spec: &QuerySpec) -> ScanFilter {
        spec.filters.iter().fold(
            ScanFilter::for_entities(E::KIND.prefix(), META),
            |filter, condition| {
                filter.clause(
                    condition.field.clone(),
                    scan_op(condition.op),
                    condition.value.clone(),
                )
            },
        )
    }
}

#[async_trait]
impl<E: Entity, S: TableStore> DataSource<E> for ScanDataSource<E, S> {
    async fn query(&self, spec: &QuerySpec) -> DataResult<QueryResult<E>> {
        validate_filters(spec, &self.filter_config)?;

        if spec.offset() > 0 {
            return Err(DataError::invalid_query(
                "offset pagination is not supported for this resource; use cursor pagination",
            ));
        }
        if let Some(sort) = &spec.sort {
            warn!(kind = %E::KIND, field = %sort.field, "sort ignored by scan; results are in table key order");
        }

        let start_key = spec
            .cursor()
            .map(decode_cursor::<ContinuationKey>)
            .transpose()?;
        let limit = spec.limit_within(self.default_limit, self.max_limit);
        let request = ScanRequest {
            filter: Self::scan_filter(spec),
            limit,
            start_key,
        };

        debug!(kind = %E::KIND, limit, resumed = request.start_key.is_some(), "scan query");
        let page = self.store.scan(request).await?;

        let prefix = E::KIND.prefix();
        let mut items = Vec::with_capacity(page.items.len());
        for item in &page.items {
            let pk = item.get(PK_ATTR).and_then(Value::as_str).unwrap_or_default();
            if !pk.starts_with(&prefix) {
                debug!(kind = %E::KIND, pk, "dropping item outside entity prefix");
                continue;
            }
            match E::from_item(item) {
                Ok(entity) => items.push(entity),
                Err(err) => warn!(kind = %E::KIND, error = %err, "dropping item that does not match entity schema"),
            }
        }

        let next_cursor = page.last_key.as_ref().map(|key| encode_cursor(key)).transpose()?;
        Ok(QueryResult::new(items).with_next_cursor(next_cursor))
    }
}

#[async_trait]
impl<E: Entity, S: TableStore> KeyedDataSource<E> for ScanDataSource<E, S> {
    async fn get_by_id(&self, id: &str) -> DataResult<Option<E>> {
        let key = E::key_for(id);
        debug!(pk = %key.pk, "get by id");
        self.store
            .get_item(&key)
            .await?
            .map(|item| E::from_item(&item))
            .transpose()
    }
}
