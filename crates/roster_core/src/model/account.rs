//! Account aggregate root.
//!
//! # Responsibility
//! - Hold account attributes and the embedded address value.
//! - Carry the id set of attached roles (one side of the account/role
//!   association).
//!
//! # Invariants
//! - `username` is required and unique across accounts (enforced by store).
//! - `email` is required and must look like `local@domain`.
//! - `role_ids` mirrors `Role::account_ids`; only the association
//!   synchronizer mutates it.

use crate::model::address::Address;
use crate::model::role::RoleId;
use crate::model::{now_epoch_ms, require_text, Entity, EntityId, EntityKind, ValidationError};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s]+$").expect("valid email regex"));

pub type AccountId = EntityId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    id: Option<AccountId>,
    pub username: String,
    pub email: String,
    /// Unix epoch milliseconds.
    pub created_at: i64,
    pub address: Option<Address>,
    #[serde(default)]
    role_ids: BTreeSet<RoleId>,
}

impl Account {
    /// Creates a transient account stamped with the current time.
    pub fn new(username: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: None,
            username: username.into(),
            email: email.into(),
            created_at: now_epoch_ms(),
            address: None,
            role_ids: BTreeSet::new(),
        }
    }

    pub(crate) fn from_row(
        id: AccountId,
        username: String,
        email: String,
        created_at: i64,
        address: Option<Address>,
        role_ids: BTreeSet<RoleId>,
    ) -> Self {
        Self {
            id: Some(id),
            username,
            email,
            created_at,
            address,
            role_ids,
        }
    }

    pub fn role_ids(&self) -> &BTreeSet<RoleId> {
        &self.role_ids
    }

    pub fn has_role(&self, role_id: RoleId) -> bool {
        self.role_ids.contains(&role_id)
    }

    pub(crate) fn set_id(&mut self, id: AccountId) {
        self.id = Some(id);
    }

    pub(crate) fn role_ids_mut(&mut self) -> &mut BTreeSet<RoleId> {
        &mut self.role_ids
    }
}

impl Entity for Account {
    const KIND: EntityKind = EntityKind::Account;

    fn id(&self) -> Option<EntityId> {
        self.id
    }

    fn validate(&self) -> Result<(), ValidationError> {
        require_text(Self::KIND, "username", &self.username)?;
        require_text(Self::KIND, "email", &self.email)?;
        if !EMAIL_RE.is_match(self.email.trim()) {
            return Err(ValidationError::MalformedEmail);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::Account;
    use crate::model::{Entity, ValidationError};

    #[test]
    fn new_account_is_transient_without_roles() {
        let account = Account::new("alice", "a@x.com");
        assert!(account.is_transient());
        assert!(account.role_ids().is_empty());
        assert!(account.address.is_none());
        assert!(account.created_at > 0);
    }

    #[test]
    fn validate_requires_username_and_wellformed_email() {
        assert!(Account::new("alice", "a@x.com").validate().is_ok());
        assert!(matches!(
            Account::new(" ", "a@x.com").validate(),
            Err(ValidationError::BlankField {
                field: "username",
                ..
            })
        ));
        assert_eq!(
            Account::new("alice", "not-an-email").validate(),
            Err(ValidationError::MalformedEmail)
        );
    }
}
