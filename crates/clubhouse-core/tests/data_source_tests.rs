//! Integration tests for the in-memory and scan-backed data sources

use std::collections::HashSet;
use std::sync::Arc;

use clubhouse_core::table::{memory, ScanRequest, TableStore, WriteOp};
use chrono::Utc;
use clubhouse_core::{
    DataError, DataSource, Entity, FilterCondition, FnLoader, InMemoryDataSource,
    KeyedDataSource, Location, MemoryTable, PaginationSpec, QuerySpec, ScanDataSource, SortSpec,
    Task, TaskStatus, User,
};
use serde::Serialize;
use serde_json::json;

// =============================================================================
// IN-MEMORY SOURCE
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
struct Member {
    id: u32,
    name: &'static str,
    age: u32,
}

fn members() -> Vec<Member> {
    vec![
        Member { id: 1, name: "Ada", age: 36 },
        Member { id: 2, name: "Ben", age: 22 },
        Member { id: 3, name: "Cleo", age: 51 },
        Member { id: 4, name: "Dev", age: 30 },
        Member { id: 5, name: "Eve", age: 44 },
    ]
}

fn member_source() -> impl DataSource<Member> {
    InMemoryDataSource::new(FnLoader(|| {
        futures::future::ready(Ok::<_, DataError>(members()))
    }))
}

#[tokio::test]
async fn test_age_filter_returns_exact_subset_and_count() {
    let source = member_source();

    for limit in [1, 2, 20] {
        let spec = QuerySpec::new()
            .filter(FilterCondition::gt("age", 30))
            .paginate(PaginationSpec::offset(limit, 0));
        let result = source.query(&spec).await.unwrap();

        assert_eq!(result.total_count, Some(3), "limit {}", limit);
        assert!(result.items.iter().all(|m| m.age > 30));
        assert_eq!(result.items.len(), (limit as usize).min(3));
        assert!(result.next_cursor.is_none());
    }
}

#[tokio::test]
async fn test_offset_pages_partition_sorted_set() {
    let source = member_source();
    let sorted = |offset| {
        QuerySpec::new()
            .sort(SortSpec::asc("age"))
            .paginate(PaginationSpec::offset(2, offset))
    };

    let first = source.query(&sorted(0)).await.unwrap();
    let second = source.query(&sorted(2)).await.unwrap();
    let third = source.query(&sorted(4)).await.unwrap();

    let mut pages: Vec<u32> = Vec::new();
    for page in [&first, &second, &third] {
        pages.extend(page.items.iter().map(|m| m.id));
    }
    let all = source
        .query(&QuerySpec::new().sort(SortSpec::asc("age")))
        .await
        .unwrap();
    let full: Vec<u32> = all.items.iter().map(|m| m.id).collect();

    assert_eq!(pages, full);
    assert_eq!(full, vec![2, 4, 1, 5, 3]);
    assert_eq!(first.items.len() + second.items.len() + third.items.len(), 5);
}

#[tokio::test]
async fn test_conditions_are_anded() {
    let source = member_source();
    let spec = QuerySpec::new()
        .filter(FilterCondition::gt("age", 25))
        .filter(FilterCondition::lt("age", 45))
        .filter(FilterCondition::contains("name", "E"));

    let result = source.query(&spec).await.unwrap();
    let names: Vec<_> = result.items.iter().map(|m| m.name).collect();
    assert_eq!(names, vec!["Dev", "Eve"]);
}

#[tokio::test]
async fn test_default_limit_applies() {
    let many: Vec<Member> = (0..50)
        .map(|i| Member { id: i, name: "x", age: i })
        .collect();
    let source = InMemoryDataSource::new(FnLoader(move || {
        futures::future::ready(Ok::<_, DataError>(many.clone()))
    }));

    let result = source.query(&QuerySpec::new()).await.unwrap();
    assert_eq!(result.items.len(), 20);
    assert_eq!(result.total_count, Some(50));
}

#[tokio::test]
async fn test_configured_max_limit_caps_requested_page() {
    let many: Vec<Member> = (0..50)
        .map(|i| Member { id: i, name: "x", age: i })
        .collect();
    let source = InMemoryDataSource::new(FnLoader(move || {
        futures::future::ready(Ok::<_, DataError>(many.clone()))
    }))
    .with_max_limit(10);

    let spec = QuerySpec::new().paginate(PaginationSpec::offset(50, 0));
    let result = source.query(&spec).await.unwrap();
    assert_eq!(result.items.len(), 10);
    assert_eq!(result.total_count, Some(50));
}

// =============================================================================
// SCAN SOURCE
// =============================================================================

async fn mixed_table() -> Arc<MemoryTable> {
    let table = Arc::new(MemoryTable::new());
    for i in 0..7 {
        let user = User::new(format!("user{}@club.org", i), format!("First{}", i), "Lee");
        table.write(WriteOp::put(user.to_item().unwrap())).await.unwrap();
    }
    let location = Location {
        id: "loc-1".to_string(),
        name: "Hall".to_string(),
        code: None,
    };
    table.write(WriteOp::put(location.to_item().unwrap())).await.unwrap();
    let task = Task {
        id: "t1".to_string(),
        title: "Phone round".to_string(),
        description: None,
        status: TaskStatus::Open,
        created_by: "user0@club.org".to_string(),
        created_at: Utc::now(),
    };
    table.write(WriteOp::put(task.to_item().unwrap())).await.unwrap();
    // Edge items share the USER# partitions but never come back from a scan
    table
        .write(WriteOp::put(memory::item("USER#user1@club.org", "LOCATION#loc-1", json!({}))))
        .await
        .unwrap();
    table
}

#[tokio::test]
async fn test_cursor_pages_cover_every_entity_once() {
    let table = mixed_table().await;
    let source: ScanDataSource<User, _> = ScanDataSource::new(table);

    let mut seen = HashSet::new();
    let mut cursor = None;
    let mut pages = 0;
    loop {
        let spec = QuerySpec::new().paginate(PaginationSpec::cursor(3, cursor.clone()));
        let result = source.query(&spec).await.unwrap();
        pages += 1;
        assert!(result.items.len() <= 3);
        assert!(result.total_count.is_none());
        for user in result.items {
            assert!(seen.insert(user.email));
        }
        match result.next_cursor {
            Some(next) => cursor = Some(next),
            None => break,
        }
    }

    assert_eq!(seen.len(), 7);
    assert!(pages >= 3);
}

#[tokio::test]
async fn test_scan_page_capped_by_configured_max_limit() {
    let table = mixed_table().await;
    let source: ScanDataSource<User, _> = ScanDataSource::new(table).with_max_limit(2);

    let spec = QuerySpec::new().paginate(PaginationSpec::cursor(50, None));
    let result = source.query(&spec).await.unwrap();
    assert_eq!(result.items.len(), 2);
    assert!(result.next_cursor.is_some());
}

#[tokio::test]
async fn test_scan_only_returns_requested_kind() {
    let table = mixed_table().await;
    let locations: ScanDataSource<Location, _> = ScanDataSource::new(table.clone());
    let result = locations.query(&QuerySpec::new()).await.unwrap();
    assert_eq!(result.items.len(), 1);
    assert_eq!(result.items[0].name, "Hall");

    let tasks: ScanDataSource<Task, _> = ScanDataSource::new(table);
    let result = tasks
        .query(&QuerySpec::new().filter(FilterCondition::eq("status", "open")))
        .await
        .unwrap();
    assert_eq!(result.items.len(), 1);
}

#[tokio::test]
async fn test_scan_reads_past_limit_to_fill_a_page() {
    let table = mixed_table().await;
    let source: ScanDataSource<User, _> = ScanDataSource::new(table.clone());

    let spec = QuerySpec::new()
        .filter(FilterCondition::eq("firstName", "First6"))
        .paginate(PaginationSpec::cursor(1, None));
    let result = source.query(&spec).await.unwrap();

    assert_eq!(result.items.len(), 1);
    assert!(table.items_evaluated() > 1);
}

#[tokio::test]
async fn test_bad_cursor_is_invalid_query() {
    let source: ScanDataSource<User, _> = ScanDataSource::new(mixed_table().await);
    let spec = QuerySpec::new().paginate(PaginationSpec::cursor(5, Some("%%%".to_string())));
    assert!(matches!(
        source.query(&spec).await,
        Err(DataError::InvalidQuery(_))
    ));
}

#[tokio::test]
async fn test_disallowed_operator_is_rejected_before_scan() {
    let table = mixed_table().await;
    let source: ScanDataSource<Task, _> = ScanDataSource::new(table.clone());

    let err = source
        .query(&QuerySpec::new().filter(FilterCondition::contains("status", "op")))
        .await
        .unwrap_err();
    assert_eq!(err.user_message(), "Operator 'contains' is not allowed on field 'status'. Allowed operators: eq");
    assert_eq!(table.items_evaluated(), 0);
}

#[tokio::test]
async fn test_get_by_id_is_a_key_read() {
    let table = mixed_table().await;
    let source: ScanDataSource<User, _> = ScanDataSource::new(table.clone());

    let user = source.get_by_id("USER3@club.org").await.unwrap().unwrap();
    assert_eq!(user.first_name, "First3");
    assert_eq!(table.items_evaluated(), 0);

    // Keys for other kinds never resolve through this source
    assert!(source.get_by_id("loc-1").await.unwrap().is_none());
}

#[tokio::test]
async fn test_direct_scan_request_matches_source_filter() {
    let table = mixed_table().await;
    let spec = QuerySpec::new().filter(FilterCondition::contains("firstName", "First"));
    let page = table
        .scan(ScanRequest {
            filter: ScanDataSource::<User, Arc<MemoryTable>>::scan_filter(&spec),
            limit: 100,
            start_key: None,
        })
        .await
        .unwrap();
    assert_eq!(page.items.len(), 7);
    assert!(page.last_key.is_none());
}
