//! Field-level filter whitelisting
//!
//! Scan-backed sources filter *after* reading, so an unrestricted filter lets
//! a caller force a full-table read just to filter on an unindexed or
//! sensitive field. Every resource declares which fields (and optionally
//! which operators per field) may be filtered on, and [`validate_filters`]
//! rejects anything else before any storage call is made.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::query::{FilterOp, QuerySpec};

/// Per-resource filter whitelist
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceFilterConfig {
    /// Fields that may appear in a filter condition
    pub allowed_fields: Vec<String>,
    /// Optional per-field operator restrictions
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub field_operators: HashMap<String, Vec<FilterOp>>,
}

impl ResourceFilterConfig {
    /// Whitelist the given fields with any operator
    pub fn new<I, S>(allowed_fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            allowed_fields: allowed_fields.into_iter().map(Into::into).collect(),
            field_operators: HashMap::new(),
        }
    }

    /// Builder-style: restrict `field` to `ops`
    #[must_use]
    pub fn restrict(mut self, field: impl Into<String>, ops: &[FilterOp]) -> Self {
        self.field_operators.insert(field.into(), ops.to_vec());
        self
    }

    /// Check if `field` may be filtered on at all
    pub fn allows_field(&self, field: &str) -> bool {
        self.allowed_fields.iter().any(|f| f == field)
    }

    /// Operators allowed on `field`, `None` when unrestricted
    pub fn operators_for(&self, field: &str) -> Option<&[FilterOp]> {
        self.field_operators.get(field).map(Vec::as_slice)
    }
}

/// Why a filter condition was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FilterRejection {
    /// The field is not in the whitelist
    FieldNotAllowed,
    /// The field is whitelisted but not with this operator
    OperatorNotAllowed,
}

/// A disallowed field/operator combination
///
/// `message` is already rendered for display; callers show it as-is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterValidationError {
    pub reason: FilterRejection,
    pub field: String,
    pub operator: FilterOp,
    pub allowed_fields: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_operators: Option<Vec<FilterOp>>,
    pub message: String,
}

impl fmt::Display for FilterValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for FilterValidationError {}

fn join_ops(ops: &[FilterOp]) -> String {
    ops.iter().map(FilterOp::as_str).collect::<Vec<_>>().join(", ")
}

/// Check every filter condition in `spec` against `config`
///
/// The first offending condition is reported. A spec without filters is
/// always valid.
pub fn validate_filters(
    spec: &QuerySpec,
    config: &ResourceFilterConfig,
) -> Result<(), FilterValidationError> {
    for condition in &spec.filters {
        if !config.allows_field(&condition.field) {
            return Err(FilterValidationError {
                reason: FilterRejection::FieldNotAllowed,
                field: condition.field.clone(),
                operator: condition.op,
                allowed_fields: config.allowed_fields.clone(),
                allowed_operators: None,
                message: format!(
                    "Filtering on field '{}' is not allowed. Allowed fields: {}",
                    condition.field,
                    config.allowed_fields.join(", ")
                ),
            });
        }

        if let Some(ops) = config.operators_for(&condition.field) {
            if !ops.contains(&condition.op) {
                return Err(FilterValidationError {
                    reason: FilterRejection::OperatorNotAllowed,
                    field: condition.field.clone(),
                    operator: condition.op,
                    allowed_fields: config.allowed_fields.clone(),
                    allowed_operators: Some(ops.to_vec()),
                    message: format!(
                        "Operator '{}' is not allowed on field '{}'. Allowed operators: {}",
                        condition.op,
                        condition.field,
                        join_ops(ops)
                    ),
                });
            }
        }
    }
    Ok(())
}
