//! Table UI state to [`QuerySpec`] and back
//!
//! The conversion is one-directional on purpose. A result only ever hands
//! its next cursor back to the table state; it never derives a page index,
//! because cursor pagination has no stable page numbers.

use std::collections::HashMap;

use clubhouse_config::MAX_PAGE_SIZE;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::query::{
    FilterCondition, FilterOp, PaginationMode, PaginationSpec, QueryResult, QuerySpec, SortSpec,
};

/// One column filter as the table widget reports it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnFilter {
    pub id: String,
    pub value: Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSort {
    pub id: String,
    #[serde(default)]
    pub desc: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TablePagination {
    pub page_index: u32,
    pub page_size: u32,
}

impl Default for TablePagination {
    fn default() -> Self {
        Self {
            page_index: 0,
            page_size: crate::query::DEFAULT_LIMIT,
        }
    }
}

/// Filter, sort and page state of a data table
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TableState {
    pub column_filters: Vec<ColumnFilter>,
    pub sorting: Vec<ColumnSort>,
    pub pagination: TablePagination,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cursor: Option<String>,
}

/// Per-resource conversion settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AdapterConfig {
    /// Operator to use per column instead of the inferred one
    pub field_operators: HashMap<String, FilterOp>,
    /// Force a pagination mode; cursor mode is also chosen whenever the
    /// state carries a cursor
    pub pagination_mode: Option<PaginationMode>,
}

impl AdapterConfig {
    /// Builder-style: use `op` for column `field`
    #[must_use]
    pub fn operator(mut self, field: impl Into<String>, op: FilterOp) -> Self {
        self.field_operators.insert(field.into(), op);
        self
    }

    /// Builder-style: always paginate with `mode`
    #[must_use]
    pub fn mode(mut self, mode: PaginationMode) -> Self {
        self.pagination_mode = Some(mode);
        self
    }
}

/// State changes produced by a query result
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableStatePatch {
    pub cursor: Option<String>,
}

impl TableStatePatch {
    pub fn apply(self, state: &mut TableState) {
        state.cursor = self.cursor;
    }
}

fn inferred_op(value: &Value) -> FilterOp {
    match value {
        Value::String(_) => FilterOp::Contains,
        _ => FilterOp::Eq,
    }
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

/// Convert table state into a query
///
/// Blank column filters (null or empty string) are cleared filters and
/// produce no condition. Only the first sort entry is used.
pub fn table_state_to_query_spec(state: &TableState, config: &AdapterConfig) -> QuerySpec {
    let filters = state
        .column_filters
        .iter()
        .filter(|filter| !is_blank(&filter.value))
        .map(|filter| {
            let op = config
                .field_operators
                .get(&filter.id)
                .copied()
                .unwrap_or_else(|| inferred_op(&filter.value));
            FilterCondition::new(filter.id.clone(), op, filter.value.clone())
        })
        .collect();

    let sort = state.sorting.first().map(|column| {
        if column.desc {
            SortSpec::desc(column.id.clone())
        } else {
            SortSpec::asc(column.id.clone())
        }
    });

    let page_size = state.pagination.page_size.clamp(1, MAX_PAGE_SIZE);
    let use_cursor =
        state.cursor.is_some() || config.pagination_mode == Some(PaginationMode::Cursor);
    let pagination = if use_cursor {
        PaginationSpec::cursor(page_size, state.cursor.clone())
    } else {
        PaginationSpec::offset(page_size, state.pagination.page_index.saturating_mul(page_size))
    };

    QuerySpec {
        filters,
        sort,
        pagination: Some(pagination),
    }
}

/// Thread a result's next cursor back into table state
pub fn query_result_to_table_state<T>(result: &QueryResult<T>, _state: &TableState) -> TableStatePatch {
    TableStatePatch {
        cursor: result.next_cursor.clone(),
    }
}
