//! Role entity, independently owned and shared by many accounts.

use crate::model::account::AccountId;
use crate::model::{require_text, Entity, EntityId, EntityKind, ValidationError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

pub type RoleId = EntityId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    id: Option<RoleId>,
    pub name: String,
    pub description: String,
    /// Inverse side of `Account::role_ids`.
    #[serde(default)]
    account_ids: BTreeSet<AccountId>,
}

impl Role {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            description: description.into(),
            account_ids: BTreeSet::new(),
        }
    }

    pub(crate) fn from_row(
        id: RoleId,
        name: String,
        description: String,
        account_ids: BTreeSet<AccountId>,
    ) -> Self {
        Self {
            id: Some(id),
            name,
            description,
            account_ids,
        }
    }

    pub fn account_ids(&self) -> &BTreeSet<AccountId> {
        &self.account_ids
    }

    pub fn has_account(&self, account_id: AccountId) -> bool {
        self.account_ids.contains(&account_id)
    }

    pub(crate) fn set_id(&mut self, id: RoleId) {
        self.id = Some(id);
    }

    pub(crate) fn account_ids_mut(&mut self) -> &mut BTreeSet<AccountId> {
        &mut self.account_ids
    }
}

impl Entity for Role {
    const KIND: EntityKind = EntityKind::Role;

    fn id(&self) -> Option<EntityId> {
        self.id
    }

    fn validate(&self) -> Result<(), ValidationError> {
        require_text(Self::KIND, "name", &self.name)
    }
}
