//! In-process [`TableStore`]
//!
//! Items live in an ordered map keyed by `(PK, SK)`, so partition reads and
//! scans come back in the same key order a real table would use. Every write
//! (including a whole transaction) runs under one write lock, which makes
//! condition checks and the writes they guard atomic with respect to each
//! other.
//!
//! Filter evaluation mirrors the backend expression language: `contains` is
//! case-sensitive, comparisons only apply between values of the same type,
//! and a missing attribute never matches.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};
use std::ops::Bound;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;
use tracing::trace;

use super::{
    Condition, ContinuationKey, Item, ItemKey, Page, PartitionQuery, ScanClause, ScanFilter,
    ScanOp, ScanRequest, TableError, TableResult, TableStore, WriteOp,
};
use crate::keys::{PK_ATTR, SK_ATTR};

/// Thread-safe in-memory table
#[derive(Default)]
pub struct MemoryTable {
    items: RwLock<BTreeMap<ItemKey, Item>>,
    evaluated: AtomicU64,
}

impl MemoryTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored items
    pub fn len(&self) -> usize {
        self.items.read().len()
    }

    /// Check if the table holds no items
    pub fn is_empty(&self) -> bool {
        self.items.read().is_empty()
    }

    /// Total items read by scans so far, matching or not
    pub fn items_evaluated(&self) -> u64 {
        self.evaluated.load(AtomicOrdering::Relaxed)
    }

    /// Copy of every item, in key order
    pub fn snapshot(&self) -> Vec<Item> {
        self.items.read().values().cloned().collect()
    }

    fn start_bound(start_key: Option<&ContinuationKey>, floor: ItemKey) -> TableResult<Bound<ItemKey>> {
        match start_key {
            Some(key) => {
                let key = ItemKey::from_continuation(key)?;
                Ok(if key > floor {
                    Bound::Excluded(key)
                } else {
                    Bound::Included(floor)
                })
            }
            None => Ok(Bound::Included(floor)),
        }
    }
}

fn compare(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

fn values_equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(_), Value::Number(_)) => compare(left, right) == Some(Ordering::Equal),
        _ => left == right,
    }
}

fn clause_matches(item: &Item, clause: &ScanClause) -> bool {
    let Some(actual) = item.get(&clause.attribute) else {
        return false;
    };
    match clause.op {
        ScanOp::Eq => values_equal(actual, &clause.value),
        ScanOp::Gt => compare(actual, &clause.value) == Some(Ordering::Greater),
        ScanOp::Lt => compare(actual, &clause.value) == Some(Ordering::Less),
        ScanOp::Contains => match (actual, &clause.value) {
            (Value::String(haystack), Value::String(needle)) => haystack.contains(needle.as_str()),
            (Value::Array(elements), needle) => elements.iter().any(|e| values_equal(e, needle)),
            _ => false,
        },
        ScanOp::BeginsWith => match (actual, &clause.value) {
            (Value::String(s), Value::String(prefix)) => s.starts_with(prefix.as_str()),
            _ => false,
        },
    }
}

fn filter_matches(key: &ItemKey, item: &Item, filter: &ScanFilter) -> bool {
    if let Some(prefix) = &filter.partition_prefix {
        if !key.pk.starts_with(prefix.as_str()) {
            return false;
        }
    }
    if let Some(sort_key) = &filter.sort_key {
        if &key.sk != sort_key {
            return false;
        }
    }
    filter.clauses.iter().all(|clause| clause_matches(item, clause))
}

fn condition_holds(existing: Option<&Item>, condition: &Condition) -> bool {
    match condition {
        Condition::NotExists => existing.is_none(),
        Condition::Exists => existing.is_some(),
        Condition::AttributeEquals { attribute, value } => existing
            .and_then(|item| item.get(attribute))
            .is_some_and(|actual| values_equal(actual, value)),
        Condition::All(conditions) => conditions.iter().all(|c| condition_holds(existing, c)),
    }
}

fn check(items: &BTreeMap<ItemKey, Item>, key: &ItemKey, op: &WriteOp) -> TableResult<()> {
    match op.condition() {
        Some(condition) if !condition_holds(items.get(key), condition) => {
            Err(TableError::ConditionFailed(format!(
                "{:?} not satisfied for {}/{}",
                condition, key.pk, key.sk
            )))
        }
        _ => Ok(()),
    }
}

fn apply(items: &mut BTreeMap<ItemKey, Item>, key: ItemKey, op: WriteOp) {
    match op {
        WriteOp::Put { item, .. } => {
            items.insert(key, item);
        }
        WriteOp::Delete { .. } => {
            items.remove(&key);
        }
        WriteOp::Check { .. } => {}
    }
}

#[async_trait]
impl TableStore for MemoryTable {
    async fn get_item(&self, key: &ItemKey) -> TableResult<Option<Item>> {
        Ok(self.items.read().get(key).cloned())
    }

    async fn query_partition(&self, query: PartitionQuery) -> TableResult<Page> {
        let floor = ItemKey::new(query.pk.clone(), query.sk_prefix.clone().unwrap_or_default());
        let start = Self::start_bound(query.start_key.as_ref(), floor)?;
        let prefix = query.sk_prefix.as_deref().unwrap_or("");
        let limit = query.limit.unwrap_or(usize::MAX);

        let items = self.items.read();
        let mut matching = items
            .range((start, Bound::Unbounded))
            .take_while(|(key, _)| key.pk == query.pk && key.sk.starts_with(prefix));

        let mut page = Page::default();
        let mut last = None;
        for (key, item) in matching.by_ref().take(limit) {
            page.items.push(item.clone());
            last = Some(key.clone());
        }
        if matching.next().is_some() {
            page.last_key = last.map(|k| k.to_continuation());
        }
        Ok(page)
    }

    async fn scan(&self, request: ScanRequest) -> TableResult<Page> {
        let start = match &request.start_key {
            Some(key) => Bound::Excluded(ItemKey::from_continuation(key)?),
            None => Bound::Unbounded,
        };

        let items = self.items.read();
        let mut remaining = items.range((start, Bound::Unbounded));
        let mut page = Page::default();
        let mut last = None;
        let mut evaluated = 0u64;

        if request.limit > 0 {
            for (key, item) in remaining.by_ref() {
                evaluated += 1;
                if filter_matches(key, item, &request.filter) {
                    page.items.push(item.clone());
                    last = Some(key.clone());
                    if page.items.len() >= request.limit {
                        break;
                    }
                }
            }
        }
        if page.items.len() >= request.limit && remaining.next().is_some() {
            page.last_key = last.map(|k| k.to_continuation());
        }

        self.evaluated.fetch_add(evaluated, AtomicOrdering::Relaxed);
        trace!(evaluated, returned = page.items.len(), "memory scan");
        Ok(page)
    }

    async fn write(&self, op: WriteOp) -> TableResult<()> {
        let key = op.key()?;
        let mut items = self.items.write();
        check(&items, &key, &op)?;
        apply(&mut items, key, op);
        Ok(())
    }

    async fn transact(&self, ops: Vec<WriteOp>) -> TableResult<()> {
        let keyed = ops
            .into_iter()
            .map(|op| op.key().map(|key| (key, op)))
            .collect::<TableResult<Vec<_>>>()?;

        let mut seen = HashSet::new();
        for (key, _) in &keyed {
            if !seen.insert(key) {
                return Err(TableError::InvalidRequest(format!(
                    "transaction touches {}/{} more than once",
                    key.pk, key.sk
                )));
            }
        }

        let mut items = self.items.write();
        for (key, op) in &keyed {
            check(&items, key, op)?;
        }
        for (key, op) in keyed {
            apply(&mut items, key, op);
        }
        Ok(())
    }
}

impl std::fmt::Debug for MemoryTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryTable")
            .field("items", &self.len())
            .finish()
    }
}

/// Item with `PK`/`SK` and the given attributes, for seeding tables
pub fn item(pk: &str, sk: &str, attributes: Value) -> Item {
    let mut item = match attributes {
        Value::Object(map) => map,
        _ => Item::new(),
    };
    item.insert(PK_ATTR.to_string(), Value::String(pk.to_string()));
    item.insert(SK_ATTR.to_string(), Value::String(sk.to_string()));
    item
}
