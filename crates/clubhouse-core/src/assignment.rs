//! Self-assignment of outreach targets to volunteers
//!
//! Each target user within a task moves through
//! `UNASSIGNED -> ASSIGNED(volunteer) -> SKIPPED | COMPLETED`, and an
//! assigned target can be released back to `UNASSIGNED` by its volunteer.
//!
//! Claiming is one conditional transaction per candidate:
//!
//! 1. put `(TASK#t, ASSIGNMENT#target)` only if it does not exist
//! 2. put the volunteer's `(USER#v, TASK_ASSIGNMENT#t#target)` edge
//! 3. delete `(TASK#t, UNASSIGNED#target)` only if it still exists
//!
//! The existence condition on the claim item is what guarantees at most one
//! assignment per target. No lock is taken. A volunteer that loses the race
//! for a candidate moves on to the next one and never retries it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error, info, warn};

use clubhouse_config::AssignmentConfig;

use crate::error::{DataError, DataResult};
use crate::keys::{
    assignment_sk, entity_pk, normalize_email, strip_prefix, task_assignment_prefix,
    task_assignment_sk, unassigned_prefix, unassigned_sk, EntityKind, SK_ATTR,
};
use crate::table::{
    item_with_key, Condition, Item, ItemKey, PartitionQuery, TableError, TableStore, WriteOp,
};

const VOLUNTEER_ATTR: &str = "volunteerId";
const STATUS_ATTR: &str = "status";

/// State of a claimed target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssignmentStatus {
    Assigned,
    Skipped,
    Completed,
}

impl AssignmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssignmentStatus::Assigned => "ASSIGNED",
            AssignmentStatus::Skipped => "SKIPPED",
            AssignmentStatus::Completed => "COMPLETED",
        }
    }
}

/// Final outcome a volunteer records for a claimed target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Outcome {
    Skipped,
    Completed,
}

impl From<Outcome> for AssignmentStatus {
    fn from(outcome: Outcome) -> Self {
        match outcome {
            Outcome::Skipped => AssignmentStatus::Skipped,
            Outcome::Completed => AssignmentStatus::Completed,
        }
    }
}

/// A target user claimed by a volunteer within a task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assignment {
    pub task_id: String,
    pub target_user_id: String,
    pub volunteer_id: String,
    pub status: AssignmentStatus,
    pub assigned_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Assignment {
    fn claim_key(&self) -> ItemKey {
        ItemKey::new(
            entity_pk(EntityKind::Task, &self.task_id),
            assignment_sk(&self.target_user_id),
        )
    }

    fn volunteer_key(&self) -> ItemKey {
        ItemKey::new(
            entity_pk(EntityKind::User, &self.volunteer_id),
            task_assignment_sk(&self.task_id, &self.target_user_id),
        )
    }

    fn attributes(&self) -> DataResult<Item> {
        match serde_json::to_value(self)? {
            Value::Object(map) => Ok(map),
            _ => Err(DataError::Serialization(
                "assignment did not serialize to an object".to_string(),
            )),
        }
    }

    fn from_item(item: &Item) -> DataResult<Self> {
        serde_json::from_value(Value::Object(item.clone())).map_err(|e| DataError::SchemaMismatch {
            key: item
                .get(SK_ATTR)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            reason: e.to_string(),
        })
    }

    /// Condition: still assigned, and to this volunteer
    fn owned_and_open(&self) -> Condition {
        Condition::All(vec![
            Condition::equals(VOLUNTEER_ATTR, self.volunteer_id.as_str()),
            Condition::equals(STATUS_ATTR, AssignmentStatus::Assigned.as_str()),
        ])
    }
}

/// Result of a self-assignment request
///
/// `assigned.len() + shortfall` always equals the requested count. A
/// shortfall means the candidate pool ran dry, not that anything failed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelfAssignOutcome {
    pub assigned: Vec<Assignment>,
    pub shortfall: usize,
}

/// Claims, transitions and releases assignments over a [`TableStore`]
pub struct SelfAssignmentEngine<S> {
    store: S,
    config: AssignmentConfig,
}

impl<S: TableStore> SelfAssignmentEngine<S> {
    pub fn new(store: S, config: AssignmentConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &AssignmentConfig {
        &self.config
    }

    /// Mark `targets` as unassigned within `task_id`
    ///
    /// Targets that already have a marker or an assignment are skipped.
    /// Returns the number of targets newly seeded.
    pub async fn seed_targets(&self, task_id: &str, targets: &[String]) -> DataResult<usize> {
        let task_pk = entity_pk(EntityKind::Task, task_id);
        let now = Utc::now();
        let mut seeded = 0;

        for target in targets {
            let target = normalize_email(target);
            let mut attributes = Item::new();
            attributes.insert("targetUserId".to_string(), Value::String(target.clone()));
            attributes.insert("seededAt".to_string(), Value::String(now.to_rfc3339()));
            let marker = item_with_key(&ItemKey::new(task_pk.clone(), unassigned_sk(&target)), attributes);

            let ops = vec![
                WriteOp::put_if_absent(marker),
                WriteOp::check(
                    ItemKey::new(task_pk.clone(), assignment_sk(&target)),
                    Condition::NotExists,
                ),
            ];
            match self.store.transact(ops).await {
                Ok(()) => seeded += 1,
                Err(TableError::ConditionFailed(_)) => {
                    debug!(task_id, target = %target, "target already seeded or claimed")
                }
                Err(err) => return Err(err.into()),
            }
        }

        info!(task_id, requested = targets.len(), seeded, "seeded targets");
        Ok(seeded)
    }

    /// Claim up to `requested` unassigned targets of `task_id` for `volunteer_id`
    ///
    /// Candidates are read from the task partition a working set at a time
    /// (`requested * contention_factor`). Each is claimed with one
    /// conditional transaction; a lost race skips the candidate. Stops when
    /// the request is filled, the pool is exhausted, or `max_candidates`
    /// have been tried.
    pub async fn self_assign(
        &self,
        task_id: &str,
        volunteer_id: &str,
        requested: usize,
    ) -> DataResult<SelfAssignOutcome> {
        if requested == 0 {
            return Ok(SelfAssignOutcome {
                assigned: Vec::new(),
                shortfall: 0,
            });
        }

        let volunteer = normalize_email(volunteer_id);
        let max_candidates = self.config.max_candidates.max(1) as usize;
        let working_set = requested
            .saturating_mul(self.config.contention_factor.max(1) as usize)
            .min(max_candidates)
            .max(requested.min(max_candidates));
        let query = PartitionQuery::new(entity_pk(EntityKind::Task, task_id))
            .with_prefix(unassigned_prefix())
            .with_limit(working_set);

        let mut assigned = Vec::with_capacity(requested);
        let mut tried = 0usize;
        let mut conflicts = 0usize;
        let mut start_key = None;

        'pages: loop {
            let page = self
                .store
                .query_partition(query.clone().starting_after(start_key))
                .await?;

            for item in &page.items {
                if assigned.len() >= requested || tried >= max_candidates {
                    break 'pages;
                }
                let Some(target) = item
                    .get(SK_ATTR)
                    .and_then(Value::as_str)
                    .and_then(|sk| strip_prefix(sk, &unassigned_prefix()))
                    .map(str::to_string)
                else {
                    warn!(task_id, "skipping unassigned marker without a target");
                    continue;
                };

                tried += 1;
                match self.claim(task_id, &target, &volunteer).await {
                    Ok(assignment) => assigned.push(assignment),
                    Err(DataError::Conflict(_)) => {
                        conflicts += 1;
                        debug!(task_id, target = %target, volunteer = %volunteer, "candidate claimed concurrently, skipping");
                    }
                    Err(err) => {
                        error!(task_id, volunteer = %volunteer, claimed = assigned.len(), error = %err, "self-assignment aborted");
                        return Err(err);
                    }
                }
            }

            if assigned.len() >= requested || tried >= max_candidates {
                break;
            }
            match page.last_key {
                Some(key) => start_key = Some(key),
                None => break,
            }
        }

        let shortfall = requested - assigned.len();
        if shortfall > 0 {
            warn!(task_id, volunteer = %volunteer, requested, shortfall, tried, conflicts, "self-assignment partially filled");
        } else {
            debug!(task_id, volunteer = %volunteer, requested, tried, conflicts, "self-assignment filled");
        }
        Ok(SelfAssignOutcome {
            assigned,
            shortfall,
        })
    }

    async fn claim(&self, task_id: &str, target: &str, volunteer: &str) -> DataResult<Assignment> {
        let assignment = Assignment {
            task_id: task_id.to_string(),
            target_user_id: target.to_string(),
            volunteer_id: volunteer.to_string(),
            status: AssignmentStatus::Assigned,
            assigned_at: Utc::now(),
            updated_at: None,
        };
        let attributes = assignment.attributes()?;
        let task_pk = entity_pk(EntityKind::Task, task_id);

        self.store
            .transact(vec![
                WriteOp::put_if_absent(item_with_key(&assignment.claim_key(), attributes.clone())),
                WriteOp::put(item_with_key(&assignment.volunteer_key(), attributes)),
                WriteOp::delete(ItemKey::new(task_pk, unassigned_sk(target))).when(Condition::Exists),
            ])
            .await?;
        Ok(assignment)
    }

    async fn load_claim(&self, task_id: &str, target: &str, volunteer: &str) -> DataResult<Assignment> {
        let key = ItemKey::new(entity_pk(EntityKind::Task, task_id), assignment_sk(target));
        let item = self
            .store
            .get_item(&key)
            .await?
            .ok_or_else(|| DataError::NotFound(format!("no assignment for {} in task {}", target, task_id)))?;
        let assignment = Assignment::from_item(&item)?;

        if assignment.volunteer_id != normalize_email(volunteer) {
            return Err(DataError::Conflict(format!(
                "{} is assigned to another volunteer",
                assignment.target_user_id
            )));
        }
        if assignment.status != AssignmentStatus::Assigned {
            return Err(DataError::InvalidTransition(format!(
                "assignment for {} is already {}",
                assignment.target_user_id,
                assignment.status.as_str()
            )));
        }
        Ok(assignment)
    }

    /// Move an assignment owned by `volunteer_id` to its final state
    pub async fn record_outcome(
        &self,
        task_id: &str,
        target_user_id: &str,
        volunteer_id: &str,
        outcome: Outcome,
    ) -> DataResult<Assignment> {
        let current = self.load_claim(task_id, target_user_id, volunteer_id).await?;
        let guard = current.owned_and_open();
        let updated = Assignment {
            status: outcome.into(),
            updated_at: Some(Utc::now()),
            ..current
        };
        let attributes = updated.attributes()?;

        self.store
            .transact(vec![
                WriteOp::put(item_with_key(&updated.claim_key(), attributes.clone())).when(guard),
                WriteOp::put(item_with_key(&updated.volunteer_key(), attributes)),
            ])
            .await
            .map_err(|err| match err {
                TableError::ConditionFailed(msg) => DataError::Conflict(msg),
                other => other.into(),
            })?;

        info!(task_id, target = %updated.target_user_id, status = updated.status.as_str(), "recorded outcome");
        Ok(updated)
    }

    /// Give an assigned target back to the pool
    pub async fn release(&self, task_id: &str, target_user_id: &str, volunteer_id: &str) -> DataResult<()> {
        let current = self.load_claim(task_id, target_user_id, volunteer_id).await?;
        let mut marker = Item::new();
        marker.insert(
            "targetUserId".to_string(),
            Value::String(current.target_user_id.clone()),
        );
        marker.insert("seededAt".to_string(), Value::String(Utc::now().to_rfc3339()));
        let marker_key = ItemKey::new(
            entity_pk(EntityKind::Task, task_id),
            unassigned_sk(&current.target_user_id),
        );

        self.store
            .transact(vec![
                WriteOp::delete(current.claim_key()).when(current.owned_and_open()),
                WriteOp::delete(current.volunteer_key()),
                WriteOp::put_if_absent(item_with_key(&marker_key, marker)),
            ])
            .await?;

        info!(task_id, target = %current.target_user_id, "released assignment");
        Ok(())
    }

    /// Assignments `volunteer_id` holds within `task_id`
    pub async fn assignments_for_volunteer(
        &self,
        volunteer_id: &str,
        task_id: &str,
    ) -> DataResult<Vec<Assignment>> {
        let query = PartitionQuery::new(entity_pk(EntityKind::User, volunteer_id))
            .with_prefix(task_assignment_prefix(task_id));
        let mut assignments = Vec::new();
        let mut start_key = None;
        loop {
            let page = self
                .store
                .query_partition(query.clone().starting_after(start_key))
                .await?;
            for item in &page.items {
                let assignment = Assignment::from_item(item)?;
                if assignment.task_id == task_id {
                    assignments.push(assignment);
                }
            }
            match page.last_key {
                Some(key) => start_key = Some(key),
                None => break,
            }
        }
        Ok(assignments)
    }

    /// Targets of `task_id` still waiting to be claimed
    pub async fn unassigned_targets(&self, task_id: &str) -> DataResult<Vec<String>> {
        let query = PartitionQuery::new(entity_pk(EntityKind::Task, task_id))
            .with_prefix(unassigned_prefix());
        let prefix = unassigned_prefix();
        let mut targets = Vec::new();
        let mut start_key = None;
        loop {
            let page = self
                .store
                .query_partition(query.clone().starting_after(start_key))
                .await?;
            targets.extend(page.items.iter().filter_map(|item| {
                item.get(SK_ATTR)
                    .and_then(Value::as_str)
                    .and_then(|sk| strip_prefix(sk, &prefix))
                    .map(str::to_string)
            }));
            match page.last_key {
                Some(key) => start_key = Some(key),
                None => break,
            }
        }
        Ok(targets)
    }
}
