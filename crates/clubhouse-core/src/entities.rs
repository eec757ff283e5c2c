//! Typed entity nodes
//!
//! Each struct is one node type of the single table. Nodes live at
//! `(<TYPE>#<id>, META)` and carry their kind token in `entityType`, so a
//! scan can be narrowed to one type and every stored item can be parsed back
//! into exactly one struct.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{DataError, DataResult};
use crate::keys::{entity_pk, EntityKind, ENTITY_TYPE_ATTR, META, PK_ATTR};
use crate::query::FilterOp;
use crate::table::{item_with_key, Item, ItemKey};
use crate::validation::ResourceFilterConfig;

/// A node type stored under `(<TYPE>#<id>, META)`
pub trait Entity: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Kind token used in this entity's keys
    const KIND: EntityKind;

    /// Raw id, before key normalization
    fn id(&self) -> &str;

    /// Fields callers may filter on
    fn filter_config() -> ResourceFilterConfig;

    /// Key of this entity's node item
    fn key(&self) -> ItemKey {
        Self::key_for(self.id())
    }

    /// Key of the node item for `id`
    fn key_for(id: &str) -> ItemKey {
        ItemKey::new(entity_pk(Self::KIND, id), META)
    }

    /// Serialize into a storable item
    fn to_item(&self) -> DataResult<Item> {
        let attributes = match serde_json::to_value(self)? {
            Value::Object(map) => map,
            other => {
                return Err(DataError::Serialization(format!(
                    "{} serialized to a non-object: {}",
                    Self::KIND,
                    other
                )))
            }
        };
        let mut item = item_with_key(&self.key(), attributes);
        item.insert(
            ENTITY_TYPE_ATTR.to_string(),
            Value::String(Self::KIND.token().to_string()),
        );
        Ok(item)
    }

    /// Parse a stored item, or explain why it does not fit
    fn from_item(item: &Item) -> DataResult<Self> {
        let key = item
            .get(PK_ATTR)
            .and_then(Value::as_str)
            .unwrap_or("<missing PK>")
            .to_string();

        if let Some(tag) = item.get(ENTITY_TYPE_ATTR).and_then(Value::as_str) {
            if tag != Self::KIND.token() {
                return Err(DataError::SchemaMismatch {
                    key,
                    reason: format!("entityType is {}, expected {}", tag, Self::KIND),
                });
            }
        }

        serde_json::from_value(Value::Object(item.clone())).map_err(|e| DataError::SchemaMismatch {
            key,
            reason: e.to_string(),
        })
    }
}

/// Membership state of a user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemberStatus {
    #[default]
    Active,
    Inactive,
    Pending,
}

/// Club member, identified by email
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default)]
    pub status: MemberStatus,
}

impl User {
    pub fn new(
        email: impl Into<String>,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
    ) -> Self {
        Self {
            email: email.into(),
            first_name: first_name.into(),
            last_name: last_name.into(),
            phone: None,
            status: MemberStatus::Active,
        }
    }
}

impl Entity for User {
    const KIND: EntityKind = EntityKind::User;

    fn id(&self) -> &str {
        &self.email
    }

    fn filter_config() -> ResourceFilterConfig {
        ResourceFilterConfig::new(["firstName", "lastName", "email", "status"])
            .restrict("email", &[FilterOp::Eq, FilterOp::Contains])
            .restrict("status", &[FilterOp::Eq])
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl Entity for Location {
    const KIND: EntityKind = EntityKind::Location;

    fn id(&self) -> &str {
        &self.id
    }

    fn filter_config() -> ResourceFilterConfig {
        ResourceFilterConfig::new(["name", "code"]).restrict("code", &[FilterOp::Eq])
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Entity for Group {
    const KIND: EntityKind = EntityKind::Group;

    fn id(&self) -> &str {
        &self.id
    }

    fn filter_config() -> ResourceFilterConfig {
        ResourceFilterConfig::new(["name"])
    }
}

/// Named permission bundle granted to groups
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Role {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Entity for Role {
    const KIND: EntityKind = EntityKind::Role;

    fn id(&self) -> &str {
        &self.id
    }

    fn filter_config() -> ResourceFilterConfig {
        ResourceFilterConfig::new(["name"])
    }
}

/// Application page a role may access
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    pub id: String,
    pub path: String,
    pub title: String,
}

impl Entity for Page {
    const KIND: EntityKind = EntityKind::Page;

    fn id(&self) -> &str {
        &self.id
    }

    fn filter_config() -> ResourceFilterConfig {
        ResourceFilterConfig::new(["path", "title"])
    }
}

/// Short location code resolved to a location id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationCodeLookup {
    pub code: String,
    pub location_id: String,
}

impl Entity for LocationCodeLookup {
    const KIND: EntityKind = EntityKind::LocationCode;

    fn id(&self) -> &str {
        &self.code
    }

    fn filter_config() -> ResourceFilterConfig {
        ResourceFilterConfig::new(["code", "locationId"])
            .restrict("code", &[FilterOp::Eq])
            .restrict("locationId", &[FilterOp::Eq])
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    #[default]
    Open,
    Closed,
}

/// Outreach task whose targets volunteers claim
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub status: TaskStatus,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

impl Entity for Task {
    const KIND: EntityKind = EntityKind::Task;

    fn id(&self) -> &str {
        &self.id
    }

    fn filter_config() -> ResourceFilterConfig {
        ResourceFilterConfig::new(["title", "status", "createdBy"])
            .restrict("status", &[FilterOp::Eq])
            .restrict("createdBy", &[FilterOp::Eq])
    }
}
