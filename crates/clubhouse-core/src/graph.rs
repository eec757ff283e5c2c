//! Entity nodes and bidirectional edges over a [`TableStore`]
//!
//! A relationship between two entities is stored as two edge items, one in
//! each entity's partition, so "all X related to Y" is a single partition
//! read from either side. [`EdgePair`] is the only way to build edge items,
//! and [`GraphStore`] only ever writes or removes both halves in one
//! transaction.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::entities::Entity;
use crate::error::{DataError, DataResult};
use crate::keys::{edge_prefix, edge_sk, entity_pk, parse_entity_key, EntityKind, PK_ATTR, SK_ATTR};
use crate::table::{
    item_with_key, Condition, Item, ItemKey, PartitionQuery, TableError, TableStore, WriteOp,
};

const EDGE_TYPE_ATTR: &str = "edgeType";
const DIRECTION_ATTR: &str = "direction";

/// Relationship types between entity kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EdgeKind {
    UserLocation,
    UserGroup,
    GroupRole,
    RolePage,
}

impl EdgeKind {
    /// `(source, target)` kinds in the forward direction
    pub fn endpoints(&self) -> (EntityKind, EntityKind) {
        match self {
            EdgeKind::UserLocation => (EntityKind::User, EntityKind::Location),
            EdgeKind::UserGroup => (EntityKind::User, EntityKind::Group),
            EdgeKind::GroupRole => (EntityKind::Group, EntityKind::Role),
            EdgeKind::RolePage => (EntityKind::Role, EntityKind::Page),
        }
    }

    pub fn token(&self) -> &'static str {
        match self {
            EdgeKind::UserLocation => "USER_LOCATION",
            EdgeKind::UserGroup => "USER_GROUP",
            EdgeKind::GroupRole => "GROUP_ROLE",
            EdgeKind::RolePage => "ROLE_PAGE",
        }
    }

    fn from_token(token: &str) -> Option<Self> {
        [
            EdgeKind::UserLocation,
            EdgeKind::UserGroup,
            EdgeKind::GroupRole,
            EdgeKind::RolePage,
        ]
        .into_iter()
        .find(|kind| kind.token() == token)
    }
}

/// Which half of a relationship an edge item is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeDirection {
    /// Stored in the source entity's partition
    Forward,
    /// Stored in the target entity's partition
    Reverse,
}

impl EdgeDirection {
    fn as_str(&self) -> &'static str {
        match self {
            EdgeDirection::Forward => "forward",
            EdgeDirection::Reverse => "reverse",
        }
    }
}

/// Kind plus normalized id
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EntityRef {
    pub kind: EntityKind,
    pub id: String,
}

impl EntityRef {
    pub fn new(kind: EntityKind, id: &str) -> Self {
        Self {
            kind,
            id: kind.normalize_id(id),
        }
    }

    pub fn pk(&self) -> String {
        entity_pk(self.kind, &self.id)
    }
}

/// One stored half of a relationship, seen from the partition it lives in
#[derive(Debug, Clone, PartialEq)]
pub struct Edge {
    pub kind: EdgeKind,
    pub direction: EdgeDirection,
    /// Entity whose partition holds the item
    pub from: EntityRef,
    /// Entity the item points at
    pub to: EntityRef,
    pub attributes: Map<String, Value>,
}

impl Edge {
    pub fn key(&self) -> ItemKey {
        ItemKey::new(self.from.pk(), edge_sk(self.to.kind, &self.to.id))
    }

    pub fn to_item(&self) -> Item {
        let mut attributes = self.attributes.clone();
        attributes.insert(
            EDGE_TYPE_ATTR.to_string(),
            Value::String(self.kind.token().to_string()),
        );
        attributes.insert(
            DIRECTION_ATTR.to_string(),
            Value::String(self.direction.as_str().to_string()),
        );
        item_with_key(&self.key(), attributes)
    }

    /// Parse an edge item read from `from`'s partition
    pub fn from_item(from: &EntityRef, item: &Item) -> DataResult<Self> {
        let mismatch = |reason: &str| DataError::SchemaMismatch {
            key: from.pk(),
            reason: reason.to_string(),
        };

        let sk = item
            .get(SK_ATTR)
            .and_then(Value::as_str)
            .ok_or_else(|| mismatch("edge without SK"))?;
        let (to_kind, to_id) = parse_entity_key(sk).ok_or_else(|| mismatch("SK is not an entity key"))?;
        let kind = item
            .get(EDGE_TYPE_ATTR)
            .and_then(Value::as_str)
            .and_then(EdgeKind::from_token)
            .ok_or_else(|| mismatch("missing or unknown edgeType"))?;
        let direction = match item.get(DIRECTION_ATTR).and_then(Value::as_str) {
            Some("forward") => EdgeDirection::Forward,
            Some("reverse") => EdgeDirection::Reverse,
            _ => return Err(mismatch("missing or unknown direction")),
        };

        let mut attributes = item.clone();
        for reserved in [PK_ATTR, SK_ATTR, EDGE_TYPE_ATTR, DIRECTION_ATTR] {
            attributes.remove(reserved);
        }

        Ok(Self {
            kind,
            direction,
            from: from.clone(),
            to: EntityRef {
                kind: to_kind,
                id: to_id,
            },
            attributes,
        })
    }
}

/// Forward and reverse halves of one relationship
#[derive(Debug, Clone, PartialEq)]
pub struct EdgePair {
    pub forward: Edge,
    pub reverse: Edge,
}

impl EdgePair {
    /// Relationship `kind` from `source_id` to `target_id`
    pub fn new(
        kind: EdgeKind,
        source_id: &str,
        target_id: &str,
        attributes: Map<String, Value>,
    ) -> Self {
        let (source_kind, target_kind) = kind.endpoints();
        let source = EntityRef::new(source_kind, source_id);
        let target = EntityRef::new(target_kind, target_id);
        Self {
            forward: Edge {
                kind,
                direction: EdgeDirection::Forward,
                from: source.clone(),
                to: target.clone(),
                attributes: attributes.clone(),
            },
            reverse: Edge {
                kind,
                direction: EdgeDirection::Reverse,
                from: target,
                to: source,
                attributes,
            },
        }
    }

    fn puts(&self) -> Vec<WriteOp> {
        vec![
            WriteOp::put(self.forward.to_item()),
            WriteOp::put(self.reverse.to_item()),
        ]
    }

    fn deletes(&self) -> Vec<WriteOp> {
        vec![
            WriteOp::delete(self.forward.key()).when(Condition::Exists),
            WriteOp::delete(self.reverse.key()).when(Condition::Exists),
        ]
    }
}

/// Node and edge access over a single table
pub struct GraphStore<S> {
    store: S,
}

impl<S: TableStore> GraphStore<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Create or replace an entity node
    pub async fn put_entity<E: Entity>(&self, entity: &E) -> DataResult<()> {
        let item = entity.to_item()?;
        self.store.write(WriteOp::put(item)).await?;
        Ok(())
    }

    /// Read an entity node; `None` when absent
    pub async fn get_entity<E: Entity>(&self, id: &str) -> DataResult<Option<E>> {
        self.store
            .get_item(&E::key_for(id))
            .await?
            .map(|item| E::from_item(&item))
            .transpose()
    }

    /// Store both halves of a relationship atomically
    ///
    /// Re-linking replaces the attributes on both halves.
    pub async fn link(
        &self,
        kind: EdgeKind,
        source_id: &str,
        target_id: &str,
        attributes: Map<String, Value>,
    ) -> DataResult<EdgePair> {
        let pair = EdgePair::new(kind, source_id, target_id, attributes);
        debug!(kind = kind.token(), from = %pair.forward.from.pk(), to = %pair.forward.to.pk(), "link");
        self.store.transact(pair.puts()).await?;
        Ok(pair)
    }

    /// Remove both halves of a relationship atomically
    ///
    /// Fails with [`DataError::NotFound`] when the relationship does not
    /// exist; nothing is removed in that case.
    pub async fn unlink(&self, kind: EdgeKind, source_id: &str, target_id: &str) -> DataResult<()> {
        let pair = EdgePair::new(kind, source_id, target_id, Map::new());
        debug!(kind = kind.token(), from = %pair.forward.from.pk(), to = %pair.forward.to.pk(), "unlink");
        match self.store.transact(pair.deletes()).await {
            Ok(()) => Ok(()),
            Err(TableError::ConditionFailed(_)) => Err(DataError::NotFound(format!(
                "{} edge {} -> {}",
                kind.token(),
                pair.forward.from.pk(),
                pair.forward.to.pk()
            ))),
            Err(other) => Err(other.into()),
        }
    }

    /// Every edge from `entity` to entities of `target`, in key order
    pub async fn neighbors(&self, entity: &EntityRef, target: EntityKind) -> DataResult<Vec<Edge>> {
        let query = PartitionQuery::new(entity.pk()).with_prefix(edge_prefix(target));
        let mut edges = Vec::new();
        let mut start_key = None;
        loop {
            let page = self
                .store
                .query_partition(query.clone().starting_after(start_key))
                .await?;
            for item in &page.items {
                edges.push(Edge::from_item(entity, item)?);
            }
            match page.last_key {
                Some(key) => start_key = Some(key),
                None => break,
            }
        }
        Ok(edges)
    }
}
