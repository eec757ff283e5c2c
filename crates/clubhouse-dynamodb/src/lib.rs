//! # Clubhouse DynamoDB backend
//!
//! [`DynamoTable`] implements the core's `TableStore` seam over one DynamoDB
//! table with string `PK` / `SK` keys. Multi-item writes go through
//! `TransactWriteItems`. A transaction cancelled by a failed condition
//! surfaces as `TableError::ConditionFailed`, distinct from an outage.
//!
//! ```rust,no_run
//! use clubhouse_config::TableConfig;
//! use clubhouse_core::{ScanDataSource, User};
//! use clubhouse_dynamodb::DynamoTable;
//!
//! # async fn example() {
//! let table = DynamoTable::connect(&TableConfig::default()).await;
//! let users: ScanDataSource<User, _> = ScanDataSource::new(table);
//! # }
//! ```

#![warn(clippy::all)]

pub mod convert;
pub mod expression;
mod table;

pub use table::{DynamoTable, MAX_TRANSACT_ITEMS};
