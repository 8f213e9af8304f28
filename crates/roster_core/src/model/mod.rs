//! Entity model for accounts, posts, roles and profiles.
//!
//! # Responsibility
//! - Define the entity shapes tracked by the persistence layer.
//! - Own field-level validation rules for each entity kind.
//!
//! # Invariants
//! - `id() == None` means the entity is transient (never persisted).
//! - Identity and relationship fields are read-only outside this crate;
//!   only the unit of work assigns ids and maintains association sets.
//! - Relationships are expressed as ids, never as object references.

use serde::Serialize;
use std::error::Error;
use std::fmt::{Debug, Display, Formatter};
use std::time::{SystemTime, UNIX_EPOCH};

pub mod account;
pub mod address;
pub mod post;
pub mod profile;
pub mod role;

/// Store-assigned surrogate key shared by every entity kind.
pub type EntityId = i64;

/// Discriminates entity kinds for identity keys, errors and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Account,
    Post,
    Role,
    Profile,
}

impl EntityKind {
    /// Stable lowercase name used in log events and messages.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Account => "account",
            Self::Post => "post",
            Self::Role => "role",
            Self::Profile => "profile",
        }
    }

    /// Backing table for rows of this kind.
    pub fn table(self) -> &'static str {
        match self {
            Self::Account => "accounts",
            Self::Post => "posts",
            Self::Role => "roles",
            Self::Profile => "profiles",
        }
    }
}

impl Display for EntityKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of one entity within the store: kind plus surrogate id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct EntityKey {
    pub kind: EntityKind,
    pub id: EntityId,
}

impl EntityKey {
    pub fn new(kind: EntityKind, id: EntityId) -> Self {
        Self { kind, id }
    }
}

impl Display for EntityKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}#{}", self.kind, self.id)
    }
}

/// Field-level rule violations detected before any SQL is issued.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Required text field is empty or whitespace only.
    BlankField {
        kind: EntityKind,
        field: &'static str,
    },
    /// Email does not have a `local@domain` shape.
    MalformedEmail,
    /// Dependent entity has no owning account assigned.
    MissingOwner(EntityKind),
    /// Counter field went negative.
    NegativeCount {
        kind: EntityKind,
        field: &'static str,
    },
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BlankField { kind, field } => write!(f, "{kind}.{field} is required"),
            Self::MalformedEmail => write!(f, "account.email is not a valid address"),
            Self::MissingOwner(kind) => write!(f, "{kind} has no owning account"),
            Self::NegativeCount { kind, field } => write!(f, "{kind}.{field} must be >= 0"),
        }
    }
}

impl Error for ValidationError {}

/// Common surface of every persistable entity.
pub trait Entity: Clone + Debug + Serialize {
    const KIND: EntityKind;

    /// Surrogate id, `None` while transient.
    fn id(&self) -> Option<EntityId>;

    /// Checks field-level rules; called before every insert and update.
    fn validate(&self) -> Result<(), ValidationError>;

    fn is_transient(&self) -> bool {
        self.id().is_none()
    }
}

pub(crate) fn require_text(
    kind: EntityKind,
    field: &'static str,
    value: &str,
) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::BlankField { kind, field });
    }
    Ok(())
}

/// Current wall-clock time in Unix epoch milliseconds.
pub fn now_epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| elapsed.as_millis() as i64)
}

#[cfg(test)]
mod tests {
    use super::{require_text, EntityKey, EntityKind, ValidationError};

    #[test]
    fn require_text_rejects_whitespace() {
        let err = require_text(EntityKind::Post, "title", "   ").unwrap_err();
        assert_eq!(
            err,
            ValidationError::BlankField {
                kind: EntityKind::Post,
                field: "title"
            }
        );
        assert_eq!(err.to_string(), "post.title is required");
    }

    #[test]
    fn entity_keys_order_by_kind_then_id() {
        let mut keys = vec![
            EntityKey::new(EntityKind::Post, 1),
            EntityKey::new(EntityKind::Account, 9),
            EntityKey::new(EntityKind::Account, 2),
        ];
        keys.sort();
        assert_eq!(keys[0], EntityKey::new(EntityKind::Account, 2));
        assert_eq!(keys[2].to_string(), "post#1");
    }
}
