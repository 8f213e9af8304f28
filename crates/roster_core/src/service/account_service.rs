//! Account use cases.
//!
//! # Invariants
//! - Removing an account removes its profile and posts in the same
//!   transaction and detaches it from every role; roles are kept.
//! - Usernames are matched exactly, without trimming or case folding.

use crate::model::account::{Account, AccountId};
use crate::model::address::Address;
use crate::model::profile::Profile;
use crate::model::role::Role;
use crate::service::{detached, AccountDetails, RosterService};
use crate::session::{AccountGraph, SessionResult};

impl RosterService<'_> {
    pub fn create_account(
        &mut self,
        username: impl Into<String>,
        email: impl Into<String>,
    ) -> SessionResult<Account> {
        let account = Account::new(username, email);
        self.write("account_create", |uow| {
            let id = uow.persist(account)?;
            detached(uow.find::<Account>(id)?, "created account is not tracked")
        })
    }

    /// Creates an account and its profile through one persist cascade.
    pub fn create_account_with_profile(
        &mut self,
        username: impl Into<String>,
        email: impl Into<String>,
        profile: Profile,
    ) -> SessionResult<Account> {
        self.create_account_graph(AccountGraph::new(Account::new(username, email)).with_profile(profile))
    }

    /// Persists an account graph: account, profile, posts and role links.
    pub fn create_account_graph(&mut self, graph: AccountGraph) -> SessionResult<Account> {
        self.write("account_graph_create", |uow| {
            let id = uow.persist_graph(graph)?;
            detached(uow.find::<Account>(id)?, "created account is not tracked")
        })
    }

    /// Replaces the embedded address; `None` when the account is absent.
    pub fn add_address(
        &mut self,
        id: AccountId,
        address: Address,
    ) -> SessionResult<Option<Account>> {
        self.write("account_address_set", |uow| {
            Ok(uow.find_mut::<Account>(id)?.map(|account| {
                account.address = Some(address);
                account.clone()
            }))
        })
    }

    pub fn find_account(&mut self, id: AccountId) -> SessionResult<Option<Account>> {
        self.read("account_get", |uow| Ok(uow.find::<Account>(id)?.cloned()))
    }

    pub fn find_account_by_username(&mut self, username: &str) -> SessionResult<Option<Account>> {
        self.read("account_get_by_username", |uow| {
            Ok(uow.find_account_by_username(username)?.cloned())
        })
    }

    pub fn list_accounts(&mut self) -> SessionResult<Vec<Account>> {
        self.read("account_list", |uow| {
            Ok(uow.list::<Account>()?.into_iter().cloned().collect())
        })
    }

    /// Account with its profile, roles and number of posts.
    pub fn account_details(&mut self, id: AccountId) -> SessionResult<Option<AccountDetails>> {
        self.read("account_details", |uow| {
            let Some(account) = uow.find::<Account>(id)?.cloned() else {
                return Ok(None);
            };
            let profile = uow.profile_of(id)?.cloned();
            let roles: Vec<Role> = uow.roles_of(id)?.into_iter().cloned().collect();
            let post_count = uow.count_posts_by_author(id)?;
            Ok(Some(AccountDetails {
                account,
                profile,
                roles,
                post_count,
            }))
        })
    }

    pub fn update_account_email(
        &mut self,
        id: AccountId,
        email: impl Into<String>,
    ) -> SessionResult<Option<Account>> {
        let email = email.into();
        self.write("account_update_email", |uow| {
            Ok(uow.find_mut::<Account>(id)?.map(|account| {
                account.email = email;
                account.clone()
            }))
        })
    }

    /// Deletes an account with its profile and posts; `false` when absent.
    pub fn delete_account(&mut self, id: AccountId) -> SessionResult<bool> {
        self.write("account_delete", |uow| uow.remove::<Account>(id))
    }
}
