//! Single-table storage abstraction
//!
//! [`TableStore`] is the seam between the data-access core and a concrete
//! NoSQL backend. It exposes exactly the primitives the core needs:
//!
//! - [`TableStore::get_item`]: key-equality read
//! - [`TableStore::query_partition`]: one partition, optional sort-key prefix
//! - [`TableStore::scan`]: broad read with post-read filtering
//! - [`TableStore::write`]: single put/delete with an optional condition
//! - [`TableStore::transact`]: all-or-nothing batch of conditional writes
//!
//! Conditional writes are the only concurrency-control primitive. A failed
//! condition surfaces as [`TableError::ConditionFailed`] and leaves the table
//! untouched.
//!
//! Stores are constructed explicitly and handed to each data source, so
//! client lifecycle belongs to the process bootstrap.

pub mod memory;

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::keys::{PK_ATTR, SK_ATTR};

pub use memory::MemoryTable;

/// A stored item: attribute name to JSON value, including `PK` and `SK`
pub type Item = Map<String, Value>;

/// Backend continuation key, e.g. `{"PK": "...", "SK": "..."}`
pub type ContinuationKey = Map<String, Value>;

/// Errors raised by table backends
#[derive(Error, Debug, Clone)]
pub enum TableError {
    #[error("Condition check failed: {0}")]
    ConditionFailed(String),

    #[error("Backend unavailable: {0}")]
    Unavailable(String),

    #[error("Operation timed out after {duration_ms}ms")]
    Timeout { duration_ms: u64 },

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

/// Result type for table operations
pub type TableResult<T> = Result<T, TableError>;

/// Primary key of an item
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ItemKey {
    pub pk: String,
    pub sk: String,
}

impl ItemKey {
    /// Create a key
    pub fn new(pk: impl Into<String>, sk: impl Into<String>) -> Self {
        Self {
            pk: pk.into(),
            sk: sk.into(),
        }
    }

    /// Extract the key of a stored item
    pub fn of(item: &Item) -> Option<Self> {
        let pk = item.get(PK_ATTR)?.as_str()?;
        let sk = item.get(SK_ATTR)?.as_str()?;
        Some(Self::new(pk, sk))
    }

    /// Key as a continuation map
    pub fn to_continuation(&self) -> ContinuationKey {
        let mut map = Map::new();
        map.insert(PK_ATTR.to_string(), Value::String(self.pk.clone()));
        map.insert(SK_ATTR.to_string(), Value::String(self.sk.clone()));
        map
    }

    /// Parse a continuation map produced by [`ItemKey::to_continuation`]
    pub fn from_continuation(key: &ContinuationKey) -> TableResult<Self> {
        Self::of(key).ok_or_else(|| {
            TableError::InvalidRequest("continuation key must carry string PK and SK".to_string())
        })
    }
}

/// Build an item from its key and attributes
pub fn item_with_key(key: &ItemKey, attributes: Map<String, Value>) -> Item {
    let mut item = attributes;
    item.insert(PK_ATTR.to_string(), Value::String(key.pk.clone()));
    item.insert(SK_ATTR.to_string(), Value::String(key.sk.clone()));
    item
}

/// Comparison used by scan filter clauses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanOp {
    Eq,
    Contains,
    Gt,
    Lt,
    BeginsWith,
}

/// One `attribute <op> value` clause of a scan filter
#[derive(Debug, Clone, PartialEq)]
pub struct ScanClause {
    pub attribute: String,
    pub op: ScanOp,
    pub value: Value,
}

/// AND-ed scan filter plus the entity-type restriction
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScanFilter {
    /// Only items whose `PK` begins with this prefix
    pub partition_prefix: Option<String>,
    /// Only items whose `SK` equals this value
    pub sort_key: Option<String>,
    /// Caller-supplied clauses, in order
    pub clauses: Vec<ScanClause>,
}

/// A filter rendered into a backend expression
///
/// User values only ever appear in `values`, referenced by positional
/// placeholders, never inline in `expression`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompiledExpression {
    pub expression: String,
    pub names: BTreeMap<String, String>,
    pub values: BTreeMap<String, Value>,
}

impl CompiledExpression {
    /// Check if there is nothing to filter on
    pub fn is_empty(&self) -> bool {
        self.expression.is_empty()
    }
}

impl ScanFilter {
    /// Restrict to entity nodes whose partition key begins with `prefix`
    pub fn for_entities(prefix: impl Into<String>, sort_key: impl Into<String>) -> Self {
        Self {
            partition_prefix: Some(prefix.into()),
            sort_key: Some(sort_key.into()),
            clauses: Vec::new(),
        }
    }

    /// Builder-style: append a clause
    #[must_use]
    pub fn clause(mut self, attribute: impl Into<String>, op: ScanOp, value: Value) -> Self {
        self.clauses.push(ScanClause {
            attribute: attribute.into(),
            op,
            value,
        });
        self
    }

    /// Render as a filter expression with placeholder names and values
    ///
    /// Clause `i` uses `#f<i>` / `:v<i>`; the entity restriction uses the
    /// reserved `#pk` / `:pk_prefix` and `#sk` / `:sk` placeholders.
    pub fn compile(&self) -> CompiledExpression {
        let mut parts = Vec::new();
        let mut compiled = CompiledExpression::default();

        if let Some(prefix) = &self.partition_prefix {
            parts.push("begins_with(#pk, :pk_prefix)".to_string());
            compiled.names.insert("#pk".to_string(), PK_ATTR.to_string());
            compiled
                .values
                .insert(":pk_prefix".to_string(), Value::String(prefix.clone()));
        }
        if let Some(sort_key) = &self.sort_key {
            parts.push("#sk = :sk".to_string());
            compiled.names.insert("#sk".to_string(), SK_ATTR.to_string());
            compiled
                .values
                .insert(":sk".to_string(), Value::String(sort_key.clone()));
        }

        for (i, clause) in self.clauses.iter().enumerate() {
            let name = format!("#f{}", i);
            let value = format!(":v{}", i);
            let part = match clause.op {
                ScanOp::Eq => format!("{} = {}", name, value),
                ScanOp::Contains => format!("contains({}, {})", name, value),
                ScanOp::Gt => format!("{} > {}", name, value),
                ScanOp::Lt => format!("{} < {}", name, value),
                ScanOp::BeginsWith => format!("begins_with({}, {})", name, value),
            };
            parts.push(part);
            compiled.names.insert(name, clause.attribute.clone());
            compiled.values.insert(value, clause.value.clone());
        }

        compiled.expression = parts.join(" AND ");
        compiled
    }
}

/// Read of one partition, optionally narrowed by a sort-key prefix
#[derive(Debug, Clone, PartialEq)]
pub struct PartitionQuery {
    pub pk: String,
    pub sk_prefix: Option<String>,
    pub limit: Option<usize>,
    pub start_key: Option<ContinuationKey>,
}

impl PartitionQuery {
    /// Every item in partition `pk`
    pub fn new(pk: impl Into<String>) -> Self {
        Self {
            pk: pk.into(),
            sk_prefix: None,
            limit: None,
            start_key: None,
        }
    }

    /// Builder-style: only sort keys starting with `prefix`
    #[must_use]
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.sk_prefix = Some(prefix.into());
        self
    }

    /// Builder-style: cap the page size
    #[must_use]
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Builder-style: continue after `key`
    #[must_use]
    pub fn starting_after(mut self, key: Option<ContinuationKey>) -> Self {
        self.start_key = key;
        self
    }
}

/// Filtered scan of the whole table
///
/// `limit` caps the number of *matching* items returned; the backend may read
/// many more items than that while filtering, which is why scan cost grows
/// with table size regardless of page size.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanRequest {
    pub filter: ScanFilter,
    pub limit: usize,
    pub start_key: Option<ContinuationKey>,
}

/// One page read from the table
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    pub items: Vec<Item>,
    /// Set iff the read stopped before the end of its range
    pub last_key: Option<ContinuationKey>,
}

/// Precondition attached to a write
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// No item exists at the key
    NotExists,
    /// An item exists at the key
    Exists,
    /// An item exists and `attribute` equals `value`
    AttributeEquals { attribute: String, value: Value },
    /// Every inner condition holds
    All(Vec<Condition>),
}

impl Condition {
    /// Existing item whose `attribute` equals `value`
    pub fn equals(attribute: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::AttributeEquals {
            attribute: attribute.into(),
            value: value.into(),
        }
    }
}

/// A single write, possibly conditional
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    Put {
        item: Item,
        condition: Option<Condition>,
    },
    Delete {
        key: ItemKey,
        condition: Option<Condition>,
    },
    /// Condition on another item, only meaningful inside a transaction
    Check { key: ItemKey, condition: Condition },
}

impl WriteOp {
    /// Unconditional put
    pub fn put(item: Item) -> Self {
        Self::Put {
            item,
            condition: None,
        }
    }

    /// Put only if nothing exists at the item's key
    pub fn put_if_absent(item: Item) -> Self {
        Self::Put {
            item,
            condition: Some(Condition::NotExists),
        }
    }

    /// Unconditional delete
    pub fn delete(key: ItemKey) -> Self {
        Self::Delete {
            key,
            condition: None,
        }
    }

    /// Require `condition` on `key` without writing it
    pub fn check(key: ItemKey, condition: Condition) -> Self {
        Self::Check { key, condition }
    }

    /// Builder-style: attach a condition
    #[must_use]
    pub fn when(self, condition: Condition) -> Self {
        match self {
            Self::Check { key, .. } => Self::Check { key, condition },
            Self::Put { item, .. } => Self::Put {
                item,
                condition: Some(condition),
            },
            Self::Delete { key, .. } => Self::Delete {
                key,
                condition: Some(condition),
            },
        }
    }

    /// Key this write targets
    pub fn key(&self) -> TableResult<ItemKey> {
        match self {
            Self::Put { item, .. } => ItemKey::of(item).ok_or_else(|| {
                TableError::InvalidRequest("item is missing string PK/SK".to_string())
            }),
            Self::Delete { key, .. } | Self::Check { key, .. } => Ok(key.clone()),
        }
    }

    /// Condition attached to this write
    pub fn condition(&self) -> Option<&Condition> {
        match self {
            Self::Put { condition, .. } | Self::Delete { condition, .. } => condition.as_ref(),
            Self::Check { condition, .. } => Some(condition),
        }
    }
}

/// Single-table NoSQL store
///
/// Implementations must be `Send + Sync` so one store can serve concurrent
/// requests.
#[async_trait]
pub trait TableStore: Send + Sync {
    /// Read one item by key; `None` when absent
    async fn get_item(&self, key: &ItemKey) -> TableResult<Option<Item>>;

    /// Read a partition in sort-key order
    async fn query_partition(&self, query: PartitionQuery) -> TableResult<Page>;

    /// Filtered scan in table order
    async fn scan(&self, request: ScanRequest) -> TableResult<Page>;

    /// Apply one write
    async fn write(&self, op: WriteOp) -> TableResult<()>;

    /// Apply every write or none of them
    ///
    /// If any condition fails the whole batch is rejected with
    /// [`TableError::ConditionFailed`].
    async fn transact(&self, ops: Vec<WriteOp>) -> TableResult<()>;
}

#[async_trait]
impl<T: TableStore + ?Sized> TableStore for std::sync::Arc<T> {
    async fn get_item(&self, key: &ItemKey) -> TableResult<Option<Item>> {
        (**self).get_item(key).await
    }

    async fn query_partition(&self, query: PartitionQuery) -> TableResult<Page> {
        (**self).query_partition(query).await
    }

    async fn scan(&self, request: ScanRequest) -> TableResult<Page> {
        (**self).scan(request).await
    }

    async fn write(&self, op: WriteOp) -> TableResult<()> {
        (**self).write(op).await
    }

    async fn transact(&self, ops: Vec<WriteOp>) -> TableResult<()> {
        (**self).transact(ops).await
    }
}
