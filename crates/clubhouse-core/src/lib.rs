//! Data-access core for the clubhouse application
//!
//! Collections are queried through a backend-agnostic [`QuerySpec`] and
//! answered by a [`DataSource`]. Entities and their relationships share one
//! table, addressed by the key scheme in [`keys`]. Volunteers claim outreach
//! targets through the [`SelfAssignmentEngine`], which relies only on
//! conditional writes for correctness under concurrency.

pub mod actions;
pub mod adapter;
pub mod assignment;
pub mod entities;
pub mod error;
pub mod graph;
pub mod keys;
pub mod query;
pub mod source;
pub mod table;
pub mod validation;

pub use actions::{
    fetch_by_id, run_query, self_assign_for_current_user, ActionResult, AuthError,
    CurrentUserProvider, StaticUser,
};
pub use adapter::{
    query_result_to_table_state, table_state_to_query_spec, AdapterConfig, ColumnFilter,
    ColumnSort, TablePagination, TableState, TableStatePatch,
};
pub use assignment::{
    Assignment, AssignmentStatus, Outcome, SelfAssignOutcome, SelfAssignmentEngine,
};
pub use entities::{
    Entity, Group, Location, LocationCodeLookup, MemberStatus, Page, Role, Task, TaskStatus, User,
};
pub use error::{DataError, DataResult};
pub use graph::{Edge, EdgeDirection, EdgeKind, EdgePair, EntityRef, GraphStore};
pub use keys::EntityKind;
pub use query::{
    decode_cursor, encode_cursor, FilterCondition, FilterOp, PaginationMode, PaginationSpec,
    QueryResult, QuerySpec, SortDirection, SortSpec,
};
pub use source::{
    CollectionLoader, DataSource, FnLoader, InMemoryDataSource, KeyedDataSource, ScanDataSource,
};
pub use table::{MemoryTable, TableError, TableStore};
pub use validation::{validate_filters, FilterValidationError, ResourceFilterConfig};
