//! Backend-agnostic query intent: filters, one sort field, pagination

use serde::{Deserialize, Serialize};
use serde_json::Value;

use clubhouse_config::MAX_PAGE_SIZE;

/// Page size used when a query carries no pagination
pub const DEFAULT_LIMIT: u32 = 20;

/// Filter operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterOp {
    /// Equal
    Eq,
    /// Substring match
    Contains,
    /// Greater than
    Gt,
    /// Less than
    Lt,
}

impl FilterOp {
    /// Wire name of the operator
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterOp::Eq => "eq",
            FilterOp::Contains => "contains",
            FilterOp::Gt => "gt",
            FilterOp::Lt => "lt",
        }
    }

    /// Check if this operator is an ordering comparison
    pub fn is_comparison(&self) -> bool {
        matches!(self, FilterOp::Gt | FilterOp::Lt)
    }
}

impl std::fmt::Display for FilterOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single `{field, op, value}` condition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterCondition {
    pub field: String,
    pub op: FilterOp,
    pub value: Value,
}

impl FilterCondition {
    /// Create a condition
    pub fn new(field: impl Into<String>, op: FilterOp, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            op,
            value: value.into(),
        }
    }

    /// `field = value`
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, FilterOp::Eq, value)
    }

    /// `contains(field, value)`
    pub fn contains(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, FilterOp::Contains, value)
    }

    /// `field > value`
    pub fn gt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, FilterOp::Gt, value)
    }

    /// `field < value`
    pub fn lt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, FilterOp::Lt, value)
    }
}

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

/// Single-field sort
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortSpec {
    pub field: String,
    #[serde(default)]
    pub direction: SortDirection,
}

impl SortSpec {
    /// Ascending sort on `field`
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Asc,
        }
    }

    /// Descending sort on `field`
    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Desc,
        }
    }
}

/// Pagination style
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaginationMode {
    /// Opaque continuation token
    Cursor,
    /// Numeric skip
    Offset,
}

/// Pagination request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginationSpec {
    pub mode: PaginationMode,
    pub limit: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cursor: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<u32>,
}

impl PaginationSpec {
    /// Cursor-mode page, continuing from `cursor` when given
    pub fn cursor(limit: u32, cursor: Option<String>) -> Self {
        Self {
            mode: PaginationMode::Cursor,
            limit,
            cursor,
            offset: None,
        }
    }

    /// Offset-mode page
    pub fn offset(limit: u32, offset: u32) -> Self {
        Self {
            mode: PaginationMode::Offset,
            limit,
            cursor: None,
            offset: Some(offset),
        }
    }

    /// Requested limit clamped to `1..=100`
    pub fn effective_limit(&self) -> u32 {
        self.limit.clamp(1, MAX_PAGE_SIZE)
    }
}

/// What a caller wants from a collection
///
/// Multiple conditions on the same field are AND-ed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QuerySpec {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub filters: Vec<FilterCondition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort: Option<SortSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pagination: Option<PaginationSpec>,
}

impl QuerySpec {
    /// Empty spec: everything, default page
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style: add a filter condition
    #[must_use]
    pub fn filter(mut self, condition: FilterCondition) -> Self {
        self.filters.push(condition);
        self
    }

    /// Builder-style: set the sort
    #[must_use]
    pub fn sort(mut self, sort: SortSpec) -> Self {
        self.sort = Some(sort);
        self
    }

    /// Builder-style: set pagination
    #[must_use]
    pub fn paginate(mut self, pagination: PaginationSpec) -> Self {
        self.pagination = Some(pagination);
        self
    }

    /// Page size after defaults and clamping
    pub fn limit_or(&self, default_limit: u32) -> usize {
        self.limit_within(default_limit, MAX_PAGE_SIZE)
    }

    /// Page size after defaults, capped at `max_limit` (itself at most 100)
    pub fn limit_within(&self, default_limit: u32, max_limit: u32) -> usize {
        let max_limit = max_limit.clamp(1, MAX_PAGE_SIZE);
        self.pagination
            .as_ref()
            .map_or(default_limit, |p| p.limit)
            .clamp(1, max_limit) as usize
    }

    /// Requested offset, zero when absent
    pub fn offset(&self) -> usize {
        self.pagination
            .as_ref()
            .and_then(|p| p.offset)
            .unwrap_or(0) as usize
    }

    /// Requested cursor, if any
    pub fn cursor(&self) -> Option<&str> {
        self.pagination.as_ref().and_then(|p| p.cursor.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_wire_shape() {
        let spec = QuerySpec::new()
            .filter(FilterCondition::contains("name", "john"))
            .sort(SortSpec::desc("createdAt"))
            .paginate(PaginationSpec::offset(20, 20));

        assert_eq!(
            serde_json::to_value(&spec).unwrap(),
            json!({
                "filters": [{"field": "name", "op": "contains", "value": "john"}],
                "sort": {"field": "createdAt", "direction": "desc"},
                "pagination": {"mode": "offset", "limit": 20, "offset": 20}
            })
        );
    }

    #[test]
    fn test_all_sections_optional() {
        let spec: QuerySpec = serde_json::from_value(json!({})).unwrap();
        assert!(spec.filters.is_empty());
        assert_eq!(spec.limit_or(DEFAULT_LIMIT), 20);
        assert_eq!(spec.offset(), 0);
        assert_eq!(spec.cursor(), None);
    }

    #[test]
    fn test_unknown_operator_is_rejected_at_parse() {
        let result: Result<QuerySpec, _> = serde_json::from_value(json!({
            "filters": [{"field": "name", "op": "regex", "value": ".*"}]
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_limit_is_clamped() {
        assert_eq!(PaginationSpec::cursor(500, None).effective_limit(), 100);
        assert_eq!(PaginationSpec::cursor(0, None).effective_limit(), 1);
        assert_eq!(PaginationSpec::offset(35, 0).effective_limit(), 35);
    }

    #[test]
    fn test_limit_respects_configured_max() {
        let spec = QuerySpec::new().paginate(PaginationSpec::offset(50, 0));
        assert_eq!(spec.limit_within(20, 10), 10);
        assert_eq!(spec.limit_within(20, 500), 50);
        assert_eq!(QuerySpec::new().limit_within(20, 10), 10);
        assert_eq!(QuerySpec::new().limit_within(5, 10), 5);
        assert_eq!(
            QuerySpec::new()
                .paginate(PaginationSpec::cursor(0, None))
                .limit_within(20, 10),
            1
        );
    }
}
