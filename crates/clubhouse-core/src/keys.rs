//! Single-table key scheme
//!
//! Every item in the table is addressed by a partition key (`PK`) and a sort
//! key (`SK`), both strings of the form `<TYPE>#<id>`:
//!
//! | item | PK | SK |
//! |---|---|---|
//! | entity node | `USER#ann@club.org` | `META` |
//! | edge | `USER#ann@club.org` | `LOCATION#loc-1` |
//! | reverse edge | `LOCATION#loc-1` | `USER#ann@club.org` |
//! | unassigned target | `TASK#t1` | `UNASSIGNED#bob@club.org` |
//! | claim | `TASK#t1` | `ASSIGNMENT#bob@club.org` |
//! | volunteer claim edge | `USER#ann@club.org` | `TASK_ASSIGNMENT#t1#bob@club.org` |
//!
//! Type tokens never contain `#`, so splitting on the first `#` recovers the
//! `(type, id)` pair even when the id itself contains `#`. That makes the
//! mapping injective and lets `begins_with(SK, "<TYPE>#")` select every edge
//! of one type.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Attribute name of the partition key
pub const PK_ATTR: &str = "PK";
/// Attribute name of the sort key
pub const SK_ATTR: &str = "SK";
/// Attribute carrying the entity kind token on node items
pub const ENTITY_TYPE_ATTR: &str = "entityType";
/// Reserved sort key of entity node items
pub const META: &str = "META";
/// Separator between a type token and an id
pub const SEPARATOR: char = '#';

const UNASSIGNED: &str = "UNASSIGNED";
const ASSIGNMENT: &str = "ASSIGNMENT";
const TASK_ASSIGNMENT: &str = "TASK_ASSIGNMENT";

/// Entity types stored in the table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntityKind {
    User,
    Location,
    Group,
    Role,
    Page,
    LocationCode,
    Task,
}

impl EntityKind {
    /// All kinds, in token order
    pub const ALL: [EntityKind; 7] = [
        EntityKind::User,
        EntityKind::Location,
        EntityKind::Group,
        EntityKind::Role,
        EntityKind::Page,
        EntityKind::LocationCode,
        EntityKind::Task,
    ];

    /// Key token for this kind
    pub fn token(&self) -> &'static str {
        match self {
            EntityKind::User => "USER",
            EntityKind::Location => "LOCATION",
            EntityKind::Group => "GROUP",
            EntityKind::Role => "ROLE",
            EntityKind::Page => "PAGE",
            EntityKind::LocationCode => "LOCATION_CODE",
            EntityKind::Task => "TASK",
        }
    }

    /// Look up a kind by its key token
    pub fn from_token(token: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.token() == token)
    }

    /// `<TYPE>#`, the prefix shared by every key of this kind
    pub fn prefix(&self) -> String {
        format!("{}{}", self.token(), SEPARATOR)
    }

    /// Normalize an id before it becomes part of a key
    ///
    /// Users are identified by email, which is case-insensitive.
    pub fn normalize_id(&self, id: &str) -> String {
        match self {
            EntityKind::User => normalize_email(id),
            _ => id.to_string(),
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

/// Lower-case and trim an email address for identity lookups
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Partition key of an entity: `<TYPE>#<id>`
pub fn entity_pk(kind: EntityKind, id: &str) -> String {
    format!("{}{}", kind.prefix(), kind.normalize_id(id))
}

/// Sort key of an edge pointing at `target`: `<TARGET_TYPE>#<target_id>`
///
/// Same shape as [`entity_pk`]; edges are keyed by the target's identity.
pub fn edge_sk(target: EntityKind, target_id: &str) -> String {
    entity_pk(target, target_id)
}

/// Prefix selecting every edge from a partition to entities of `target`
pub fn edge_prefix(target: EntityKind) -> String {
    target.prefix()
}

/// Sort key marking `target_user` as not yet claimed within a task
pub fn unassigned_sk(target_user: &str) -> String {
    format!("{}{}{}", UNASSIGNED, SEPARATOR, normalize_email(target_user))
}

/// Prefix selecting every unclaimed target of a task
pub fn unassigned_prefix() -> String {
    format!("{}{}", UNASSIGNED, SEPARATOR)
}

/// Sort key of the claim item for `target_user` within a task
///
/// Exactly one of these may exist per (task, target); claiming is a
/// conditional put on its non-existence.
pub fn assignment_sk(target_user: &str) -> String {
    format!("{}{}{}", ASSIGNMENT, SEPARATOR, normalize_email(target_user))
}

/// Prefix selecting every claim within a task
pub fn assignment_prefix() -> String {
    format!("{}{}", ASSIGNMENT, SEPARATOR)
}

/// Escape `%` and `#` so an id can sit between separators
fn escape_segment(id: &str) -> String {
    id.replace('%', "%25").replace(SEPARATOR, "%23")
}

/// Sort key of the volunteer-side claim edge: `TASK_ASSIGNMENT#<task>#<target>`
///
/// The task segment is escaped, so one task's prefix never matches another's.
pub fn task_assignment_sk(task_id: &str, target_user: &str) -> String {
    format!(
        "{}{}",
        task_assignment_prefix(task_id),
        normalize_email(target_user)
    )
}

/// Prefix selecting a volunteer's claims within one task
pub fn task_assignment_prefix(task_id: &str) -> String {
    format!(
        "{}{}{}{}",
        TASK_ASSIGNMENT,
        SEPARATOR,
        escape_segment(task_id),
        SEPARATOR
    )
}

/// Split a key into its type token and id
///
/// Returns `None` for keys without a separator (such as [`META`]).
pub fn split_key(key: &str) -> Option<(&str, &str)> {
    key.split_once(SEPARATOR)
}

/// Parse an entity key back into `(kind, id)`
pub fn parse_entity_key(key: &str) -> Option<(EntityKind, String)> {
    let (token, id) = split_key(key)?;
    let kind = EntityKind::from_token(token)?;
    Some((kind, id.to_string()))
}

/// Id portion of a sort key with a known prefix
pub fn strip_prefix<'a>(key: &'a str, prefix: &str) -> Option<&'a str> {
    key.strip_prefix(prefix)
}
