//! Join-row persistence for the account/role association.
//!
//! # Invariants
//! - A pair is stored at most once (composite primary key).
//! - Rows are only added/removed explicitly; no FK cascades exist.

use crate::model::account::AccountId;
use crate::model::role::RoleId;
use crate::repo::{RepoResult, SqliteStore};
use rusqlite::params;
use std::collections::BTreeSet;

impl SqliteStore<'_> {
    /// Inserts one join row; an existing pair is left untouched.
    pub fn link(&self, account_id: AccountId, role_id: RoleId) -> RepoResult<bool> {
        let changed = self.conn.execute(
            "INSERT OR IGNORE INTO account_roles (account_id, role_id) VALUES (?1, ?2);",
            params![account_id, role_id],
        )?;
        Ok(changed > 0)
    }

    /// Deletes one join row; returns whether the pair existed.
    pub fn unlink(&self, account_id: AccountId, role_id: RoleId) -> RepoResult<bool> {
        let changed = self.conn.execute(
            "DELETE FROM account_roles WHERE account_id = ?1 AND role_id = ?2;",
            params![account_id, role_id],
        )?;
        Ok(changed > 0)
    }

    pub fn role_ids_for_account(&self, account_id: AccountId) -> RepoResult<BTreeSet<RoleId>> {
        self.collect_ids(
            "SELECT role_id FROM account_roles WHERE account_id = ?1;",
            account_id,
        )
    }

    pub fn account_ids_for_role(&self, role_id: RoleId) -> RepoResult<BTreeSet<AccountId>> {
        self.collect_ids(
            "SELECT account_id FROM account_roles WHERE role_id = ?1;",
            role_id,
        )
    }

    fn collect_ids(&self, sql: &str, id: i64) -> RepoResult<BTreeSet<i64>> {
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query([id])?;
        let mut ids = BTreeSet::new();
        while let Some(row) = rows.next()? {
            ids.insert(row.get(0)?);
        }
        Ok(ids)
    }
}
