//! Role use cases and account/role assignment.
//!
//! # Invariants
//! - Assignment endpoints must exist (`DanglingReference` otherwise).
//! - A role still held by accounts cannot be deleted; the store rejects it
//!   as a constraint violation and nothing changes.

use crate::model::account::AccountId;
use crate::model::role::{Role, RoleId};
use crate::service::{detached, RosterService};
use crate::session::SessionResult;

impl RosterService<'_> {
    pub fn create_role(
        &mut self,
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> SessionResult<Role> {
        let role = Role::new(name, description);
        self.write("role_create", |uow| {
            let id = uow.persist(role)?;
            detached(uow.find::<Role>(id)?, "created role is not tracked")
        })
    }

    pub fn find_role(&mut self, id: RoleId) -> SessionResult<Option<Role>> {
        self.read("role_get", |uow| Ok(uow.find::<Role>(id)?.cloned()))
    }

    pub fn list_roles(&mut self) -> SessionResult<Vec<Role>> {
        self.read("role_list", |uow| {
            Ok(uow.list::<Role>()?.into_iter().cloned().collect())
        })
    }

    pub fn update_role(
        &mut self,
        id: RoleId,
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> SessionResult<Option<Role>> {
        let (name, description) = (name.into(), description.into());
        self.write("role_update", |uow| {
            Ok(uow.find_mut::<Role>(id)?.map(|role| {
                role.name = name;
                role.description = description;
                role.clone()
            }))
        })
    }

    pub fn delete_role(&mut self, id: RoleId) -> SessionResult<bool> {
        self.write("role_delete", |uow| uow.remove::<Role>(id))
    }

    /// Attaches a role to an account.
    ///
    /// Returns `false` when the account already holds the role.
    pub fn assign_role(&mut self, account_id: AccountId, role_id: RoleId) -> SessionResult<bool> {
        self.write("role_assign", |uow| uow.attach(account_id, role_id))
    }

    /// Detaches a role from an account; `false` when it was not attached.
    pub fn revoke_role(&mut self, account_id: AccountId, role_id: RoleId) -> SessionResult<bool> {
        self.write("role_revoke", |uow| uow.detach(account_id, role_id))
    }
}
