//! Query layer over the unit of work.
//!
//! Every query flushes pending writes first so results reflect the
//! transaction's own changes, then resolves rows through the identity map:
//! an identity already tracked is returned as the tracked instance.

use crate::model::account::{Account, AccountId};
use crate::model::post::Post;
use crate::model::profile::Profile;
use crate::model::role::{Role, RoleId};
use crate::model::EntityId;
use crate::session::identity_map::Managed;
use crate::session::unit_of_work::UnitOfWork;
use crate::session::SessionResult;

impl UnitOfWork<'_> {
    /// Account with exactly this username, if any.
    ///
    /// Usernames are unique, so at most one row matches; the first row in
    /// store order is taken regardless.
    pub fn find_account_by_username(&mut self, username: &str) -> SessionResult<Option<&Account>> {
        self.flush()?;
        let found = self.store().find_account_by_username(username)?;
        let id = found.and_then(|account| self.adopt(account));
        Ok(id.and_then(|id| self.map.get::<Account>(id)))
    }

    /// Every stored entity of one kind, in id order.
    pub fn list<E: Managed>(&mut self) -> SessionResult<Vec<&E>> {
        self.flush()?;
        let rows = E::repository(&self.store()).list()?;
        let ids = self.adopt_all(rows);
        Ok(self.resolve(&ids))
    }

    /// Posts written by `author_id`, newest first (`created_at`, then id).
    pub fn posts_by_author(&mut self, author_id: AccountId) -> SessionResult<Vec<&Post>> {
        self.flush()?;
        let rows = self.store().posts_by_author(author_id)?;
        let ids = self.adopt_all(rows);
        Ok(self.resolve(&ids))
    }

    pub fn count_posts_by_author(&mut self, author_id: AccountId) -> SessionResult<usize> {
        self.flush()?;
        Ok(self.store().count_posts_by_author(author_id)?)
    }

    /// Profile owned by `account_id`, if one exists.
    pub fn profile_of(&mut self, account_id: AccountId) -> SessionResult<Option<&Profile>> {
        self.flush()?;
        let found = self.store().profile_for_account(account_id)?;
        let id = found.and_then(|profile| self.adopt(profile));
        Ok(id.and_then(|id| self.map.get::<Profile>(id)))
    }

    /// Roles attached to an account, in role id order.
    ///
    /// Reads the account's in-memory role set, so attachments made earlier
    /// in this unit of work are included. Empty when the account is absent.
    pub fn roles_of(&mut self, account_id: AccountId) -> SessionResult<Vec<&Role>> {
        let role_ids: Vec<RoleId> = match self.find::<Account>(account_id)? {
            Some(account) => account.role_ids().iter().copied().collect(),
            None => return Ok(Vec::new()),
        };
        for role_id in &role_ids {
            self.ensure_loaded::<Role>(*role_id)?;
        }
        Ok(self.resolve(&role_ids))
    }

    /// Accounts holding a role, in account id order.
    pub fn accounts_with_role(&mut self, role_id: RoleId) -> SessionResult<Vec<&Account>> {
        let account_ids: Vec<AccountId> = match self.find::<Role>(role_id)? {
            Some(role) => role.account_ids().iter().copied().collect(),
            None => return Ok(Vec::new()),
        };
        for account_id in &account_ids {
            self.ensure_loaded::<Account>(*account_id)?;
        }
        Ok(self.resolve(&account_ids))
    }

    fn adopt_all<E: Managed>(&mut self, rows: Vec<E>) -> Vec<EntityId> {
        rows.into_iter()
            .filter_map(|entity| self.adopt(entity))
            .collect()
    }

    fn resolve<E: Managed>(&self, ids: &[EntityId]) -> Vec<&E> {
        ids.iter().filter_map(|id| self.map.get::<E>(*id)).collect()
    }
}
