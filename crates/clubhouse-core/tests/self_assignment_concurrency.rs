//! Self-assignment under concurrent callers
//!
//! Claims are only protected by conditional writes, so these tests race
//! several volunteers against one task pool and check that no target is ever
//! handed to two of them.

use std::collections::HashSet;
use std::sync::Arc;

use clubhouse_config::AssignmentConfig;
use clubhouse_core::keys;
use clubhouse_core::table::{memory, TableStore, WriteOp};
use clubhouse_core::{MemoryTable, SelfAssignmentEngine};
use serde_json::json;

// =============================================================================
// TEST UTILITIES
// =============================================================================

fn targets(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("target{:03}@club.org", i)).collect()
}

async fn seeded_engine(
    n: usize,
    config: AssignmentConfig,
) -> Arc<SelfAssignmentEngine<Arc<MemoryTable>>> {
    let engine = SelfAssignmentEngine::new(Arc::new(MemoryTable::new()), config);
    let seeded = engine.seed_targets("outreach", &targets(n)).await.unwrap();
    assert_eq!(seeded, n);
    Arc::new(engine)
}

// =============================================================================
// CONCURRENT CLAIMS
// =============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_three_callers_never_share_a_target() {
    let engine = seeded_engine(10, AssignmentConfig::default()).await;

    let mut handles = Vec::new();
    for volunteer in ["v1@club.org", "v2@club.org", "v3@club.org"] {
        let engine = engine.clone();
        handles.push(tokio::spawn(async move {
            engine.self_assign("outreach", volunteer, 5).await.unwrap()
        }));
    }

    let mut seen = HashSet::new();
    let mut total = 0;
    for handle in handles {
        let outcome = handle.await.unwrap();
        assert_eq!(outcome.assigned.len() + outcome.shortfall, 5);
        total += outcome.assigned.len();
        for assignment in outcome.assigned {
            assert!(
                seen.insert(assignment.target_user_id.clone()),
                "{} assigned twice",
                assignment.target_user_id
            );
        }
    }

    assert!(total <= 10);
    // Pool of 10 against 15 requested: every target ends up claimed
    assert_eq!(total, 10);
    assert!(engine.unassigned_targets("outreach").await.unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_many_single_claims_are_disjoint() {
    let engine = seeded_engine(20, AssignmentConfig::default()).await;

    let handles: Vec<_> = (0..40)
        .map(|i| {
            let engine = engine.clone();
            tokio::spawn(async move {
                engine
                    .self_assign("outreach", &format!("vol{}@club.org", i), 1)
                    .await
                    .unwrap()
            })
        })
        .collect();

    let mut claimed = HashSet::new();
    let mut shortfall = 0;
    for handle in handles {
        let outcome = handle.await.unwrap();
        shortfall += outcome.shortfall;
        for assignment in outcome.assigned {
            assert!(claimed.insert(assignment.target_user_id));
        }
    }

    assert_eq!(claimed.len(), 20);
    assert_eq!(shortfall, 20);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_each_claim_appears_on_exactly_one_volunteer() {
    let engine = seeded_engine(12, AssignmentConfig::default()).await;
    let volunteers = ["a@club.org", "b@club.org", "c@club.org", "d@club.org"];

    let handles: Vec<_> = volunteers
        .iter()
        .map(|volunteer| {
            let engine = engine.clone();
            let volunteer = volunteer.to_string();
            tokio::spawn(async move { engine.self_assign("outreach", &volunteer, 4).await.unwrap() })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap();
    }

    let mut owners = HashSet::new();
    for volunteer in volunteers {
        for assignment in engine.assignments_for_volunteer(volunteer, "outreach").await.unwrap() {
            assert_eq!(assignment.volunteer_id, volunteer);
            assert!(owners.insert(assignment.target_user_id));
        }
    }
    assert_eq!(owners.len(), 12);
}

#[tokio::test]
async fn test_listing_stays_within_task_when_ids_share_a_prefix() {
    let engine = SelfAssignmentEngine::new(Arc::new(MemoryTable::new()), AssignmentConfig::default());
    engine.seed_targets("a#b", &targets(2)).await.unwrap();
    engine.seed_targets("a", &targets(1)).await.unwrap();

    let nested = engine.self_assign("a#b", "v@club.org", 2).await.unwrap();
    assert_eq!(nested.assigned.len(), 2);

    assert!(engine
        .assignments_for_volunteer("v@club.org", "a")
        .await
        .unwrap()
        .is_empty());
    let listed = engine.assignments_for_volunteer("v@club.org", "a#b").await.unwrap();
    assert_eq!(listed.len(), 2);
    assert!(listed.iter().all(|a| a.task_id == "a#b"));

    engine.self_assign("a", "v@club.org", 1).await.unwrap();
    let plain = engine.assignments_for_volunteer("v@club.org", "a").await.unwrap();
    assert_eq!(plain.len(), 1);
    assert_eq!(plain[0].task_id, "a");
}

// =============================================================================
// SHORTFALL
// =============================================================================

#[tokio::test]
async fn test_shortfall_accounts_for_every_requested_slot() {
    let engine = seeded_engine(3, AssignmentConfig::default()).await;

    let outcome = engine.self_assign("outreach", "v@club.org", 7).await.unwrap();
    assert_eq!(outcome.assigned.len(), 3);
    assert_eq!(outcome.shortfall, 4);
    assert_eq!(outcome.assigned.len() + outcome.shortfall, 7);

    let empty = engine.self_assign("outreach", "w@club.org", 2).await.unwrap();
    assert!(empty.assigned.is_empty());
    assert_eq!(empty.shortfall, 2);
}

#[tokio::test]
async fn test_unknown_task_is_all_shortfall() {
    let engine = seeded_engine(3, AssignmentConfig::default()).await;
    let outcome = engine.self_assign("no-such-task", "v@club.org", 2).await.unwrap();
    assert_eq!(outcome.shortfall, 2);
}

#[tokio::test]
async fn test_stale_markers_are_skipped_across_pages() {
    let store = Arc::new(MemoryTable::new());
    let engine = SelfAssignmentEngine::new(
        store.clone(),
        AssignmentConfig {
            contention_factor: 1,
            max_candidates: 100,
        },
    );
    engine.seed_targets("outreach", &targets(4)).await.unwrap();
    let first = engine.self_assign("outreach", "v@club.org", 2).await.unwrap();

    // Put the markers back for the claimed targets without removing the claims
    for assignment in &first.assigned {
        let marker = memory::item(
            "TASK#outreach",
            &keys::unassigned_sk(&assignment.target_user_id),
            json!({}),
        );
        store.write(WriteOp::put(marker)).await.unwrap();
    }

    // First page of two holds only the stale markers; both claims lose
    let second = engine.self_assign("outreach", "w@club.org", 2).await.unwrap();
    assert_eq!(second.assigned.len(), 2);
    assert_eq!(second.shortfall, 0);
    for assignment in &second.assigned {
        assert!(first
            .assigned
            .iter()
            .all(|a| a.target_user_id != assignment.target_user_id));
    }
}
