//! Role rows; loaded roles carry the ids of accounts holding them.

use crate::model::role::{Role, RoleId};
use crate::model::{Entity, EntityId, EntityKind};
use crate::repo::{ensure_updated, missing_id, EntityRepository, RepoResult, SqliteStore};
use rusqlite::params;

impl EntityRepository<Role> for SqliteStore<'_> {
    fn insert(&self, role: &Role) -> RepoResult<EntityId> {
        role.validate()?;
        self.conn.execute(
            "INSERT INTO roles (name, description) VALUES (?1, ?2);",
            params![role.name.as_str(), role.description.as_str()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn update(&self, role: &Role) -> RepoResult<()> {
        role.validate()?;
        let id = role.id().ok_or_else(|| missing_id(EntityKind::Role))?;
        let changed = self.conn.execute(
            "UPDATE roles SET name = ?2, description = ?3 WHERE id = ?1;",
            params![id, role.name.as_str(), role.description.as_str()],
        )?;
        ensure_updated(changed, EntityKind::Role, id)
    }

    fn get(&self, id: EntityId) -> RepoResult<Option<Role>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, description FROM roles WHERE id = ?1;")?;
        let mut rows = stmt.query([id])?;
        match rows.next()? {
            Some(row) => {
                let id: RoleId = row.get("id")?;
                Ok(Some(Role::from_row(
                    id,
                    row.get("name")?,
                    row.get::<_, Option<String>>("description")?
                        .unwrap_or_default(),
                    self.account_ids_for_role(id)?,
                )))
            }
            None => Ok(None),
        }
    }

    fn list(&self) -> RepoResult<Vec<Role>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, description FROM roles ORDER BY id ASC;")?;
        let mut rows = stmt.query([])?;
        let mut roles = Vec::new();
        while let Some(row) = rows.next()? {
            let id: RoleId = row.get("id")?;
            roles.push(Role::from_row(
                id,
                row.get("name")?,
                row.get::<_, Option<String>>("description")?
                    .unwrap_or_default(),
                self.account_ids_for_role(id)?,
            ));
        }
        Ok(roles)
    }
}
