//! Configuration types

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Hard ceiling on any page size a caller may request.
pub const MAX_PAGE_SIZE: u32 = 100;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A field holds a value that cannot be used
    #[error("Invalid value for {field}: {value}")]
    InvalidValue {
        /// Dotted path of the offending field
        field: String,
        /// Description of the problem
        value: String,
    },

    /// The config file could not be read
    #[error("Failed to read config {path}: {message}")]
    Io {
        /// Path that was being read
        path: String,
        /// Underlying error text
        message: String,
    },

    /// The config file is not valid TOML for this schema
    #[error("Failed to parse config: {0}")]
    Parse(String),
}

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ClubhouseConfig {
    /// Storage table settings
    pub table: TableConfig,
    /// Query defaults
    pub query: QueryConfig,
    /// Self-assignment bounds
    pub assignment: AssignmentConfig,
    /// Logging settings
    pub logging: LoggingConfig,
}

/// Single-table storage settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TableConfig {
    /// Physical table name
    pub name: String,
    /// Region override (SDK default when unset)
    pub region: Option<String>,
    /// Endpoint override, e.g. a local emulator
    pub endpoint: Option<String>,
    /// Per-call operation timeout in milliseconds
    pub timeout_ms: u64,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            name: "clubhouse".to_string(),
            region: None,
            endpoint: None,
            timeout_ms: 3_000,
        }
    }
}

/// Query defaults shared by every data source
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct QueryConfig {
    /// Page size used when a query carries no pagination
    pub default_limit: u32,
    /// Largest page size a caller may request
    pub max_limit: u32,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            default_limit: 20,
            max_limit: MAX_PAGE_SIZE,
        }
    }
}

/// Bounds for the self-assignment engine
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AssignmentConfig {
    /// Candidate page size as a multiple of the requested count
    pub contention_factor: u32,
    /// Maximum number of candidates tried in one call
    pub max_candidates: u32,
}

impl Default for AssignmentConfig {
    fn default() -> Self {
        Self {
            contention_factor: 3,
            max_candidates: 100,
        }
    }
}

/// Logging output settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive, e.g. `info` or `clubhouse_core=debug`
    pub level: String,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl ClubhouseConfig {
    /// Check cross-field constraints
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.table.name.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "table.name".to_string(),
                value: "must not be empty".to_string(),
            });
        }
        if self.table.timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "table.timeout_ms".to_string(),
                value: "must be greater than zero".to_string(),
            });
        }
        if self.query.max_limit == 0 || self.query.max_limit > MAX_PAGE_SIZE {
            return Err(ConfigError::InvalidValue {
                field: "query.max_limit".to_string(),
                value: format!("must be between 1 and {}", MAX_PAGE_SIZE),
            });
        }
        if self.query.default_limit == 0 || self.query.default_limit > self.query.max_limit {
            return Err(ConfigError::InvalidValue {
                field: "query.default_limit".to_string(),
                value: format!("must be between 1 and {}", self.query.max_limit),
            });
        }
        if self.assignment.contention_factor == 0 {
            return Err(ConfigError::InvalidValue {
                field: "assignment.contention_factor".to_string(),
                value: "must be at least 1".to_string(),
            });
        }
        if self.assignment.max_candidates == 0 {
            return Err(ConfigError::InvalidValue {
                field: "assignment.max_candidates".to_string(),
                value: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}
