//! Profile rows keyed by their owning account.

use crate::model::account::AccountId;
use crate::model::profile::{Profile, ProfileId};
use crate::model::{Entity, EntityId, EntityKind, ValidationError};
use crate::repo::{ensure_updated, missing_id, EntityRepository, RepoResult, SqliteStore};
use rusqlite::{params, OptionalExtension, Row};

const PROFILE_SELECT_SQL: &str = "SELECT
    id,
    first_name,
    last_name,
    phone_number,
    bio,
    account_id
FROM profiles";

impl EntityRepository<Profile> for SqliteStore<'_> {
    fn insert(&self, profile: &Profile) -> RepoResult<EntityId> {
        profile.validate()?;
        let account_id = profile
            .account_id()
            .ok_or(ValidationError::MissingOwner(EntityKind::Profile))?;
        self.conn.execute(
            "INSERT INTO profiles (
                first_name,
                last_name,
                phone_number,
                bio,
                account_id
            ) VALUES (?1, ?2, ?3, ?4, ?5);",
            params![
                profile.first_name.as_str(),
                profile.last_name.as_str(),
                profile.phone_number.as_str(),
                profile.bio.as_str(),
                account_id,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn update(&self, profile: &Profile) -> RepoResult<()> {
        profile.validate()?;
        let id = profile
            .id()
            .ok_or_else(|| missing_id(EntityKind::Profile))?;
        let changed = self.conn.execute(
            "UPDATE profiles
             SET
                first_name = ?2,
                last_name = ?3,
                phone_number = ?4,
                bio = ?5
             WHERE id = ?1;",
            params![
                id,
                profile.first_name.as_str(),
                profile.last_name.as_str(),
                profile.phone_number.as_str(),
                profile.bio.as_str(),
            ],
        )?;
        ensure_updated(changed, EntityKind::Profile, id)
    }

    fn get(&self, id: EntityId) -> RepoResult<Option<Profile>> {
        let profile = self
            .conn
            .query_row(
                &format!("{PROFILE_SELECT_SQL} WHERE id = ?1;"),
                [id],
                parse_profile_row,
            )
            .optional()?;
        Ok(profile)
    }

    fn list(&self) -> RepoResult<Vec<Profile>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{PROFILE_SELECT_SQL} ORDER BY id ASC;"))?;
        let profiles = stmt
            .query_map([], parse_profile_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(profiles)
    }
}

impl SqliteStore<'_> {
    pub fn profile_for_account(&self, account_id: AccountId) -> RepoResult<Option<Profile>> {
        let profile = self
            .conn
            .query_row(
                &format!("{PROFILE_SELECT_SQL} WHERE account_id = ?1;"),
                [account_id],
                parse_profile_row,
            )
            .optional()?;
        Ok(profile)
    }

    pub fn profile_id_for_account(&self, account_id: AccountId) -> RepoResult<Option<ProfileId>> {
        let id = self
            .conn
            .query_row(
                "SELECT id FROM profiles WHERE account_id = ?1;",
                [account_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(id)
    }
}

fn parse_profile_row(row: &Row<'_>) -> rusqlite::Result<Profile> {
    Ok(Profile::from_row(
        row.get("id")?,
        row.get::<_, Option<String>>("first_name")?
            .unwrap_or_default(),
        row.get::<_, Option<String>>("last_name")?
            .unwrap_or_default(),
        row.get::<_, Option<String>>("phone_number")?
            .unwrap_or_default(),
        row.get::<_, Option<String>>("bio")?.unwrap_or_default(),
        row.get("account_id")?,
    ))
}
