//! Profile entity, at most one per account.
//!
//! # Invariants
//! - A persisted profile always has `account_id`; its lifecycle is bound to
//!   that account (removed with it).

use crate::model::account::AccountId;
use crate::model::{Entity, EntityId, EntityKind, ValidationError};
use serde::{Deserialize, Serialize};

pub type ProfileId = EntityId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    id: Option<ProfileId>,
    pub first_name: String,
    pub last_name: String,
    pub phone_number: String,
    pub bio: String,
    account_id: Option<AccountId>,
}

impl Profile {
    /// Creates a transient profile without an owner.
    ///
    /// Attach it through an account graph, or call [`Profile::owned_by`]
    /// before persisting it on its own.
    pub fn new(
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        phone_number: impl Into<String>,
        bio: impl Into<String>,
    ) -> Self {
        Self {
            id: None,
            first_name: first_name.into(),
            last_name: last_name.into(),
            phone_number: phone_number.into(),
            bio: bio.into(),
            account_id: None,
        }
    }

    pub fn owned_by(mut self, account_id: AccountId) -> Self {
        self.account_id = Some(account_id);
        self
    }

    pub(crate) fn from_row(
        id: ProfileId,
        first_name: String,
        last_name: String,
        phone_number: String,
        bio: String,
        account_id: AccountId,
    ) -> Self {
        Self {
            id: Some(id),
            first_name,
            last_name,
            phone_number,
            bio,
            account_id: Some(account_id),
        }
    }

    pub fn account_id(&self) -> Option<AccountId> {
        self.account_id
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name.trim(), self.last_name.trim())
            .trim()
            .to_string()
    }

    pub(crate) fn set_id(&mut self, id: ProfileId) {
        self.id = Some(id);
    }

    pub(crate) fn set_owner(&mut self, account_id: AccountId) {
        self.account_id = Some(account_id);
    }
}

impl Entity for Profile {
    const KIND: EntityKind = EntityKind::Profile;

    fn id(&self) -> Option<EntityId> {
        self.id
    }

    fn validate(&self) -> Result<(), ValidationError> {
        if self.account_id.is_none() {
            return Err(ValidationError::MissingOwner(Self::KIND));
        }
        Ok(())
    }
}
