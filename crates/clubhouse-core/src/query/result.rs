//! Query results

use serde::{Deserialize, Serialize};

/// One page of results
///
/// `items` is always present, possibly empty. `next_cursor` is only set by
/// cursor-mode sources when another page exists; `total_count` is only set by
/// sources that can count without a full scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResult<T> {
    pub items: Vec<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_count: Option<usize>,
}

impl<T> QueryResult<T> {
    /// A page with no continuation and no count
    pub fn new(items: Vec<T>) -> Self {
        Self {
            items,
            next_cursor: None,
            total_count: None,
        }
    }

    /// Empty page
    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    /// Builder-style: set the continuation cursor
    #[must_use]
    pub fn with_next_cursor(mut self, cursor: Option<String>) -> Self {
        self.next_cursor = cursor;
        self
    }

    /// Builder-style: set the total count
    #[must_use]
    pub fn with_total_count(mut self, total: usize) -> Self {
        self.total_count = Some(total);
        self
    }

    /// Check if another page can be requested
    pub fn has_more(&self) -> bool {
        self.next_cursor.is_some()
    }

    /// Transform the items, keeping pagination metadata
    pub fn map<U, F: FnMut(T) -> U>(self, f: F) -> QueryResult<U> {
        QueryResult {
            items: self.items.into_iter().map(f).collect(),
            next_cursor: self.next_cursor,
            total_count: self.total_count,
        }
    }
}

impl<T> Default for QueryResult<T> {
    fn default() -> Self {
        Self::empty()
    }
}
