//! Caller-facing operations with a uniform result envelope
//!
//! Everything above the data-source layer answers with
//! `{"success": true, "data": ...}` or `{"success": false, "error": "..."}`.
//! Validation and request errors are reported verbatim. Storage failures are
//! logged with their detail and reported with a generic message.

use async_trait::async_trait;
use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use thiserror::Error;
use tracing::{error, info};

use crate::assignment::{SelfAssignOutcome, SelfAssignmentEngine};
use crate::error::{DataError, DataResult};
use crate::query::{QueryResult, QuerySpec};
use crate::source::{DataSource, KeyedDataSource};
use crate::table::TableStore;

/// Success/error envelope
#[derive(Debug, Clone, PartialEq)]
pub enum ActionResult<T> {
    Success(T),
    Failure(String),
}

impl<T> ActionResult<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, ActionResult::Success(_))
    }

    pub fn data(&self) -> Option<&T> {
        match self {
            ActionResult::Success(data) => Some(data),
            ActionResult::Failure(_) => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            ActionResult::Success(_) => None,
            ActionResult::Failure(message) => Some(message),
        }
    }

    /// Wrap a data-layer result, logging failures under `action`
    pub fn from_result(result: DataResult<T>, action: &str) -> Self {
        match result {
            Ok(data) => ActionResult::Success(data),
            Err(err) => {
                if err.is_retryable()
                    || matches!(err, DataError::Serialization(_) | DataError::SchemaMismatch { .. })
                {
                    error!(action, error = %err, "action failed");
                } else {
                    info!(action, error = %err, "action rejected");
                }
                ActionResult::Failure(err.user_message())
            }
        }
    }
}

impl<T: Serialize> Serialize for ActionResult<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut envelope = serializer.serialize_struct("ActionResult", 2)?;
        match self {
            ActionResult::Success(data) => {
                envelope.serialize_field("success", &true)?;
                envelope.serialize_field("data", data)?;
            }
            ActionResult::Failure(message) => {
                envelope.serialize_field("success", &false)?;
                envelope.serialize_field("error", message)?;
            }
        }
        envelope.end()
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("unauthenticated")]
    Unauthenticated,
}

/// Resolves the id (email) of the user making the request
#[async_trait]
pub trait CurrentUserProvider: Send + Sync {
    async fn current_user_id(&self) -> Result<String, AuthError>;
}

/// Provider with a fixed identity, or none
#[derive(Debug, Clone, Default)]
pub struct StaticUser(Option<String>);

impl StaticUser {
    pub fn new(id: impl Into<String>) -> Self {
        Self(Some(id.into()))
    }

    pub fn anonymous() -> Self {
        Self(None)
    }
}

#[async_trait]
impl CurrentUserProvider for StaticUser {
    async fn current_user_id(&self) -> Result<String, AuthError> {
        self.0.clone().ok_or(AuthError::Unauthenticated)
    }
}

/// Run `spec` against `source`
pub async fn run_query<T, D>(source: &D, spec: &QuerySpec) -> ActionResult<QueryResult<T>>
where
    D: DataSource<T> + ?Sized,
{
    ActionResult::from_result(source.query(spec).await, "run_query")
}

/// Look up one item; a missing item is a successful `None`
pub async fn fetch_by_id<T, D>(source: &D, id: &str) -> ActionResult<Option<T>>
where
    D: KeyedDataSource<T> + ?Sized,
{
    ActionResult::from_result(source.get_by_id(id).await, "fetch_by_id")
}

/// Claim `count` targets of `task_id` for whoever is signed in
pub async fn self_assign_for_current_user<S, U>(
    engine: &SelfAssignmentEngine<S>,
    users: &U,
    task_id: &str,
    count: usize,
) -> ActionResult<SelfAssignOutcome>
where
    S: TableStore,
    U: CurrentUserProvider + ?Sized,
{
    let volunteer = match users.current_user_id().await {
        Ok(id) => id,
        Err(err) => return ActionResult::Failure(err.to_string()),
    };
    ActionResult::from_result(
        engine.self_assign(task_id, &volunteer, count).await,
        "self_assign",
    )
}
