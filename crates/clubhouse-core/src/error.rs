//! Data-access error types

use thiserror::Error;

use crate::table::TableError;
use crate::validation::FilterValidationError;

/// Error type for every operation at or below the data-source layer
#[derive(Error, Debug, Clone)]
pub enum DataError {
    /// A filter named a field or operator outside the resource whitelist
    #[error(transparent)]
    Validation(#[from] FilterValidationError),

    /// The query itself is malformed (bad cursor, unsupported pagination)
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// A write targeted something that does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// The backing store could not be reached or failed
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    /// A stored item does not match the shape expected for its type
    #[error("Schema mismatch for {key}: {reason}")]
    SchemaMismatch { key: String, reason: String },

    /// A conditional write lost to a concurrent writer
    #[error("Conflict: {0}")]
    Conflict(String),

    /// A collection loader failed
    #[error("Failed to fetch data: {0}")]
    Fetch(String),

    /// The requested state change is not allowed from the current state
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    /// Items could not be serialized for storage
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Result type for data-access operations
pub type DataResult<T> = Result<T, DataError>;

impl DataError {
    /// Create a storage-unavailable error
    pub fn unavailable<S: Into<String>>(msg: S) -> Self {
        Self::StorageUnavailable(msg.into())
    }

    /// Create an invalid-query error
    pub fn invalid_query<S: Into<String>>(msg: S) -> Self {
        Self::InvalidQuery(msg.into())
    }

    /// Create a fetch error
    pub fn fetch<S: Into<String>>(msg: S) -> Self {
        Self::Fetch(msg.into())
    }

    /// Check if the caller may retry the operation
    ///
    /// Only backend failures qualify. Validation and not-found are terminal.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::StorageUnavailable(_) | Self::Fetch(_))
    }

    /// Message safe to show an end user
    ///
    /// Validation messages are surfaced verbatim; backend failures collapse to
    /// a generic message since their detail belongs in the logs.
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation(err) => err.message.clone(),
            Self::InvalidQuery(msg)
            | Self::NotFound(msg)
            | Self::Conflict(msg)
            | Self::InvalidTransition(msg) => msg.clone(),
            Self::StorageUnavailable(_)
            | Self::Fetch(_)
            | Self::SchemaMismatch { .. }
            | Self::Serialization(_) => "Failed to fetch data. Please try again.".to_string(),
        }
    }
}

impl From<TableError> for DataError {
    fn from(err: TableError) -> Self {
        match err {
            TableError::ConditionFailed(msg) => Self::Conflict(msg),
            TableError::Unavailable(msg) => Self::StorageUnavailable(msg),
            TableError::Timeout { duration_ms } => Self::StorageUnavailable(format!(
                "operation timed out after {}ms",
                duration_ms
            )),
            TableError::Serialization(msg) => Self::Serialization(msg),
            TableError::InvalidRequest(msg) => Self::InvalidQuery(msg),
        }
    }
}

impl From<serde_json::Error> for DataError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
