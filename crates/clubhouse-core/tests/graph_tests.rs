//! Edge writes keep both directions in step

use std::sync::Arc;

use clubhouse_core::keys::EntityKind;
use clubhouse_core::table::{ItemKey, TableStore};
use clubhouse_core::{
    DataError, EdgeDirection, EdgeKind, EntityRef, GraphStore, Group, Location, MemoryTable, User,
};
use serde_json::{json, Map};

async fn graph_with_members() -> (Arc<MemoryTable>, GraphStore<Arc<MemoryTable>>) {
    let table = Arc::new(MemoryTable::new());
    let graph = GraphStore::new(table.clone());

    for email in ["ann@club.org", "bob@club.org"] {
        graph.put_entity(&User::new(email, "x", "y")).await.unwrap();
    }
    graph
        .put_entity(&Location {
            id: "north".to_string(),
            name: "North Hall".to_string(),
            code: Some("NH".to_string()),
        })
        .await
        .unwrap();
    graph
        .put_entity(&Group {
            id: "callers".to_string(),
            name: "Phone callers".to_string(),
            description: None,
        })
        .await
        .unwrap();
    (table, graph)
}

#[tokio::test]
async fn test_link_writes_both_directions() {
    let (table, graph) = graph_with_members().await;

    let mut attributes = Map::new();
    attributes.insert("primary".to_string(), json!(true));
    graph
        .link(EdgeKind::UserLocation, "Ann@Club.org", "north", attributes)
        .await
        .unwrap();

    let forward = table
        .get_item(&ItemKey::new("USER#ann@club.org", "LOCATION#north"))
        .await
        .unwrap()
        .unwrap();
    let reverse = table
        .get_item(&ItemKey::new("LOCATION#north", "USER#ann@club.org"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(forward["direction"], "forward");
    assert_eq!(reverse["direction"], "reverse");
    assert_eq!(reverse["primary"], true);
}

#[tokio::test]
async fn test_neighbors_from_either_side() {
    let (_, graph) = graph_with_members().await;
    for email in ["ann@club.org", "bob@club.org"] {
        graph
            .link(EdgeKind::UserGroup, email, "callers", Map::new())
            .await
            .unwrap();
    }
    graph
        .link(EdgeKind::UserLocation, "ann@club.org", "north", Map::new())
        .await
        .unwrap();

    let group = EntityRef::new(EntityKind::Group, "callers");
    let members = graph.neighbors(&group, EntityKind::User).await.unwrap();
    let ids: Vec<_> = members.iter().map(|e| e.to.id.as_str()).collect();
    assert_eq!(ids, vec!["ann@club.org", "bob@club.org"]);
    assert!(members.iter().all(|e| e.direction == EdgeDirection::Reverse));

    // Only edges of the requested kind, never the node item
    let ann = EntityRef::new(EntityKind::User, "ann@club.org");
    let groups = graph.neighbors(&ann, EntityKind::Group).await.unwrap();
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].kind, EdgeKind::UserGroup);
}

#[tokio::test]
async fn test_unlink_removes_both_or_nothing() {
    let (table, graph) = graph_with_members().await;
    graph
        .link(EdgeKind::UserGroup, "bob@club.org", "callers", Map::new())
        .await
        .unwrap();
    let before = table.len();

    graph
        .unlink(EdgeKind::UserGroup, "bob@club.org", "callers")
        .await
        .unwrap();
    assert_eq!(table.len(), before - 2);

    let again = graph.unlink(EdgeKind::UserGroup, "bob@club.org", "callers").await;
    assert!(matches!(again, Err(DataError::NotFound(_))));
    assert_eq!(table.len(), before - 2);
}

#[tokio::test]
async fn test_relinking_replaces_attributes() {
    let (_, graph) = graph_with_members().await;
    let mut first = Map::new();
    first.insert("since".to_string(), json!("2023"));
    graph
        .link(EdgeKind::UserLocation, "bob@club.org", "north", first)
        .await
        .unwrap();
    let mut second = Map::new();
    second.insert("since".to_string(), json!("2025"));
    graph
        .link(EdgeKind::UserLocation, "bob@club.org", "north", second)
        .await
        .unwrap();

    let location = EntityRef::new(EntityKind::Location, "north");
    let edges = graph.neighbors(&location, EntityKind::User).await.unwrap();
    assert_eq!(edges.len(), 1);
    assert_eq!(edges[0].attributes["since"], "2025");
}
