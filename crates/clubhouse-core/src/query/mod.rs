//! Query specification model
//!
//! - [`QuerySpec`]: filters, a single sort field and pagination
//! - [`QueryResult`]: one page of items plus optional cursor / count
//! - [`encode_cursor`] / [`decode_cursor`]: opaque continuation tokens

pub mod cursor;
pub mod result;
pub mod spec;

pub use cursor::{decode_cursor, encode_cursor};
pub use result::QueryResult;
pub use spec::{
    FilterCondition, FilterOp, PaginationMode, PaginationSpec, QuerySpec, SortDirection,
    SortSpec, DEFAULT_LIMIT,
};
