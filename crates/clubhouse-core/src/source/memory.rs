//! Collection-backed data source
//!
//! Every query reloads the collection through its [`CollectionLoader`]; there
//! is no caching between calls. Filtering, sorting and slicing happen on the
//! serialized JSON form of each item, so any `Serialize` type works and
//! fields can be addressed with dotted paths (`address.city`).

use std::cmp::Ordering;
use std::future::Future;
use std::marker::PhantomData;

use async_trait::async_trait;
use clubhouse_config::MAX_PAGE_SIZE;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use super::{DataSource, KeyedDataSource};
use crate::error::{DataError, DataResult};
use crate::query::{FilterCondition, FilterOp, QueryResult, QuerySpec, SortDirection, DEFAULT_LIMIT};
use crate::validation::{validate_filters, ResourceFilterConfig};

/// Produces the full collection for one query
#[async_trait]
pub trait CollectionLoader<T>: Send + Sync {
    async fn load(&self) -> DataResult<Vec<T>>;
}

/// [`CollectionLoader`] backed by an async closure
pub struct FnLoader<F>(pub F);

#[async_trait]
impl<T, F, Fut> CollectionLoader<T> for FnLoader<F>
where
    T: Send + 'static,
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = DataResult<Vec<T>>> + Send,
{
    async fn load(&self) -> DataResult<Vec<T>> {
        (self.0)().await
    }
}

/// In-memory source with offset pagination and a total count
pub struct InMemoryDataSource<T, L> {
    loader: L,
    default_limit: u32,
    max_limit: u32,
    filter_config: Option<ResourceFilterConfig>,
    id_field: String,
    _item: PhantomData<fn() -> T>,
}

impl<T, L> InMemoryDataSource<T, L>
where
    T: Serialize + Send + 'static,
    L: CollectionLoader<T>,
{
    /// Create a source over `loader`
    pub fn new(loader: L) -> Self {
        Self {
            loader,
            default_limit: DEFAULT_LIMIT,
            max_limit: MAX_PAGE_SIZE,
            filter_config: None,
            id_field: "id".to_string(),
            _item: PhantomData,
        }
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

    /// Builder-style: reject filters outside `config` before loading
    #[must_use]
    pub fn with_filter_config(mut self, config: ResourceFilterConfig) -> Self {
        self.filter_config = Some(config);
        self
    }

    /// Builder-style: field matched by [`KeyedDataSource::get_by_id`]
    #[must_use]
    pub fn with_id_field(mut self, field: impl Into<String>) -> Self {
        self.id_field = field.into();
        self
    }

    async fn load_rows(&self) -> DataResult<Vec<(T, Value)>> {
        let items = self.loader.load().await.map_err(|err| match err {
            DataError::Fetch(_) => err,
            other => DataError::fetch(other.to_string()),
        })?;
        items
            .into_iter()
            .map(|item| {
                serde_json::to_value(&item)
                    .map(|value| (item, value))
                    .map_err(DataError::from)
            })
            .collect()
    }
}

/// Resolve a possibly dotted field path
fn lookup<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    let found = path
        .split('.')
        .try_fold(value, |current, segment| current.get(segment))?;
    (!found.is_null()).then_some(found)
}

fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Ordering between values of the same JSON type
fn native_cmp(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

fn matches(item: &Value, condition: &FilterCondition) -> bool {
    let Some(actual) = lookup(item, &condition.field) else {
        return false;
    };
    match condition.op {
        FilterOp::Contains => stringify(actual)
            .to_lowercase()
            .contains(&stringify(&condition.value).to_lowercase()),
        FilterOp::Eq => match native_cmp(actual, &condition.value) {
            Some(ordering) => ordering == Ordering::Equal,
            None => actual == &condition.value,
        },
        FilterOp::Gt => native_cmp(actual, &condition.value) == Some(Ordering::Greater),
        FilterOp::Lt => native_cmp(actual, &condition.value) == Some(Ordering::Less),
    }
}

fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Bool(_) => 0,
        Value::Number(_) => 1,
        Value::String(_) => 2,
        _ => 3,
    }
}

/// Sort comparator: missing values last in either direction
fn sort_cmp(left: Option<&Value>, right: Option<&Value>, direction: SortDirection) -> Ordering {
    match (left, right) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(a), Some(b)) => {
            let ordering = native_cmp(a, b)
                .unwrap_or_else(|| type_rank(a).cmp(&type_rank(b)));
            match direction {
                SortDirection::Asc => ordering,
                SortDirection::Desc => ordering.reverse(),
            }
        }
    }
}

#[async_trait]
impl<T, L> DataSource<T> for InMemoryDataSource<T, L>
where
    T: Serialize + Send + 'static,
    L: CollectionLoader<T>,
{
    async fn query(&self, spec: &QuerySpec) -> DataResult<QueryResult<T>> {
        if let Some(config) = &self.filter_config {
            validate_filters(spec, config)?;
        }

        let mut rows = self.load_rows().await?;
        let loaded = rows.len();
        rows.retain(|(_, value)| spec.filters.iter().all(|c| matches(value, c)));

        if let Some(sort) = &spec.sort {
            rows.sort_by(|(_, a), (_, b)| {
                sort_cmp(lookup(a, &sort.field), lookup(b, &sort.field), sort.direction)
            });
        }

        let total = rows.len();
        let offset = spec.offset();
        let limit = spec.limit_within(self.default_limit, self.max_limit);
        let items: Vec<T> = rows
            .into_iter()
            .skip(offset)
            .take(limit)
            .map(|(item, _)| item)
            .collect();

        debug!(loaded, total, offset, limit, returned = items.len(), "in-memory query");
        Ok(QueryResult::new(items).with_total_count(total))
    }
}

#[async_trait]
impl<T, L> KeyedDataSource<T> for InMemoryDataSource<T, L>
where
    T: Serialize + Send + 'static,
    L: CollectionLoader<T>,
{
    async fn get_by_id(&self, id: &str) -> DataResult<Option<T>> {
        let rows = self.load_rows().await?;
        Ok(rows
            .into_iter()
            .find(|(_, value)| lookup(value, &self.id_field).map(stringify).as_deref() == Some(id))
            .map(|(item, _)| item))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{PaginationSpec, SortSpec};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
    use std::sync::Arc;

    fn source(rows: Vec<Value>) -> InMemoryDataSource<Value, impl CollectionLoader<Value>> {
        InMemoryDataSource::new(FnLoader(move || {
            let rows = rows.clone();
            async move { Ok::<_, DataError>(rows) }
        }))
    }

    #[tokio::test]
    async fn test_contains_is_case_insensitive_on_stringified_values() {
        let src = source(vec![
            json!({"id": "1", "name": "John Smith", "zip": 90210}),
            json!({"id": "2", "name": "Ann", "zip": 10001}),
        ]);

        let by_name = src
            .query(&QuerySpec::new().filter(FilterCondition::contains("name", "JOHN")))
            .await
            .unwrap();
        assert_eq!(by_name.items.len(), 1);

        let by_zip = src
            .query(&QuerySpec::new().filter(FilterCondition::contains("zip", "902")))
            .await
            .unwrap();
        assert_eq!(by_zip.items[0]["id"], "1");
    }

    #[tokio::test]
    async fn test_type_mismatch_never_matches() {
        let src = source(vec![json!({"age": 40}), json!({"age": "40"})]);
        let result = src
            .query(&QuerySpec::new().filter(FilterCondition::gt("age", 30)))
            .await
            .unwrap();
        assert_eq!(result.total_count, Some(1));
    }

    #[tokio::test]
    async fn test_sort_puts_missing_values_last() {
        let src = source(vec![
            json!({"id": "a"}),
            json!({"id": "b", "rank": 2}),
            json!({"id": "c", "rank": 9}),
        ]);
        let result = src
            .query(&QuerySpec::new().sort(SortSpec::desc("rank")))
            .await
            .unwrap();
        let ids: Vec<_> = result.items.iter().map(|v| v["id"].clone()).collect();
        assert_eq!(ids, vec![json!("c"), json!("b"), json!("a")]);
    }

    #[tokio::test]
    async fn test_dotted_field_path() {
        let src = source(vec![
            json!({"id": "1", "address": {"city": "Leeds"}}),
            json!({"id": "2", "address": {"city": "York"}}),
        ]);
        let result = src
            .query(&QuerySpec::new().filter(FilterCondition::eq("address.city", "York")))
            .await
            .unwrap();
        assert_eq!(result.items[0]["id"], "2");
    }

    #[tokio::test]
    async fn test_loader_failure_is_fetch_error() {
        let src: InMemoryDataSource<Value, _> = InMemoryDataSource::new(FnLoader(|| async {
            Err::<Vec<Value>, _>(DataError::unavailable("db down"))
        }));
        let err = src.query(&QuerySpec::new()).await.unwrap_err();
        assert!(matches!(err, DataError::Fetch(_)));
    }

    #[tokio::test]
    async fn test_whitelist_checked_before_loading() {
        let loads = Arc::new(AtomicUsize::new(0));
        let counter = loads.clone();
        let src: InMemoryDataSource<Value, _> = InMemoryDataSource::new(FnLoader(move || {
            counter.fetch_add(1, AtomicOrdering::SeqCst);
            async { Ok::<Vec<Value>, DataError>(Vec::new()) }
        }))
        .with_filter_config(ResourceFilterConfig::new(["name"]));

        let err = src
            .query(&QuerySpec::new().filter(FilterCondition::eq("ssn", "x")))
            .await
            .unwrap_err();
        assert!(matches!(err, DataError::Validation(_)));
        assert_eq!(loads.load(AtomicOrdering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_offset_past_end_is_empty_with_count() {
        let src = source(vec![json!({"id": "1"}), json!({"id": "2"})]);
        let result = src
            .query(&QuerySpec::new().paginate(PaginationSpec::offset(10, 5)))
            .await
            .unwrap();
        assert!(result.items.is_empty());
        assert_eq!(result.total_count, Some(2));
        assert!(result.next_cursor.is_none());
    }

    #[tokio::test]
    async fn test_get_by_id() {
        let src = source(vec![json!({"id": 7, "name": "x"})]).with_id_field("id");
        assert!(src.get_by_id("7").await.unwrap().is_some());
        assert!(src.get_by_id("8").await.unwrap().is_none());
    }
}
