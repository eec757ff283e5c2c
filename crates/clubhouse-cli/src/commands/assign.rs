use anyhow::Result;
use clubhouse_core::{
    self_assign_for_current_user, ActionResult, Outcome, SelfAssignmentEngine, StaticUser,
    TableStore,
};

use super::print_envelope;

/// Claim `count` targets of `task` as `volunteer`
pub async fn claim<S: TableStore>(
    engine: &SelfAssignmentEngine<S>,
    task: &str,
    volunteer: &str,
    count: usize,
) -> Result<bool> {
    let user = StaticUser::new(volunteer);
    print_envelope(&self_assign_for_current_user(engine, &user, task, count).await)
}

pub async fn record_outcome<S: TableStore>(
    engine: &SelfAssignmentEngine<S>,
    task: &str,
    target: &str,
    volunteer: &str,
    outcome: Outcome,
) -> Result<bool> {
    let result = engine.record_outcome(task, target, volunteer, outcome).await;
    print_envelope(&ActionResult::from_result(result, "record_outcome"))
}

pub async fn release<S: TableStore>(
    engine: &SelfAssignmentEngine<S>,
    task: &str,
    target: &str,
    volunteer: &str,
) -> Result<bool> {
    let result = engine.release(task, target, volunteer).await;
    print_envelope(&ActionResult::from_result(result, "release"))
}

pub async fn list<S: TableStore>(
    engine: &SelfAssignmentEngine<S>,
    task: &str,
    volunteer: &str,
) -> Result<bool> {
    let result = engine.assignments_for_volunteer(volunteer, task).await;
    print_envelope(&ActionResult::from_result(result, "assignments_for_volunteer"))
}
