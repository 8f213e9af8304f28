//! Account rows, including the inlined address columns.
//!
//! # Invariants
//! - Address columns are all written together (NULL when absent).
//! - Loaded accounts carry their current join-row role ids.

use crate::model::account::Account;
use crate::model::address::Address;
use crate::model::{Entity, EntityId, EntityKind};
use crate::repo::{ensure_updated, missing_id, EntityRepository, RepoResult, SqliteStore};
use rusqlite::{params, Row};

const ACCOUNT_SELECT_SQL: &str = "SELECT
    id,
    username,
    email,
    created_at,
    street,
    city,
    state,
    zip
FROM accounts";

impl EntityRepository<Account> for SqliteStore<'_> {
    fn insert(&self, account: &Account) -> RepoResult<EntityId> {
        account.validate()?;
        let address = account.address.as_ref();
        self.conn.execute(
            "INSERT INTO accounts (
                username,
                email,
                created_at,
                street,
                city,
                state,
                zip
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7);",
            params![
                account.username.as_str(),
                account.email.as_str(),
                account.created_at,
                address.map(|value| value.street.as_str()),
                address.map(|value| value.city.as_str()),
                address.map(|value| value.state.as_str()),
                address.map(|value| value.zip.as_str()),
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn update(&self, account: &Account) -> RepoResult<()> {
        account.validate()?;
        let id = account.id().ok_or_else(|| missing_id(EntityKind::Account))?;
        let address = account.address.as_ref();
        let changed = self.conn.execute(
            "UPDATE accounts
             SET
                username = ?2,
                email = ?3,
                created_at = ?4,
                street = ?5,
                city = ?6,
                state = ?7,
                zip = ?8
             WHERE id = ?1;",
            params![
                id,
                account.username.as_str(),
                account.email.as_str(),
                account.created_at,
                address.map(|value| value.street.as_str()),
                address.map(|value| value.city.as_str()),
                address.map(|value| value.state.as_str()),
                address.map(|value| value.zip.as_str()),
            ],
        )?;
        ensure_updated(changed, EntityKind::Account, id)
    }

    fn get(&self, id: EntityId) -> RepoResult<Option<Account>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{ACCOUNT_SELECT_SQL} WHERE id = ?1;"))?;
        let mut rows = stmt.query([id])?;
        match rows.next()? {
            Some(row) => Ok(Some(self.parse_account_row(row)?)),
            None => Ok(None),
        }
    }

    fn list(&self) -> RepoResult<Vec<Account>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{ACCOUNT_SELECT_SQL} ORDER BY id ASC;"))?;
        let mut rows = stmt.query([])?;
        let mut accounts = Vec::new();
        while let Some(row) = rows.next()? {
            accounts.push(self.parse_account_row(row)?);
        }
        Ok(accounts)
    }
}

impl SqliteStore<'_> {
    /// Looks an account up by its unique username.
    ///
    /// Should the store ever hold more than one match, the first row in
    /// store order wins.
    pub fn find_account_by_username(&self, username: &str) -> RepoResult<Option<Account>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{ACCOUNT_SELECT_SQL} WHERE username = ?1 LIMIT 1;"))?;
        let mut rows = stmt.query([username])?;
        match rows.next()? {
            Some(row) => Ok(Some(self.parse_account_row(row)?)),
            None => Ok(None),
        }
    }

    fn parse_account_row(&self, row: &Row<'_>) -> RepoResult<Account> {
        let id: EntityId = row.get("id")?;
        let address = Address::from_columns(
            row.get("street")?,
            row.get("city")?,
            row.get("state")?,
            row.get("zip")?,
        );
        let account = Account::from_row(
            id,
            row.get("username")?,
            row.get("email")?,
            row.get("created_at")?,
            address,
            self.role_ids_for_account(id)?,
        );
        Ok(account)
    }
}
