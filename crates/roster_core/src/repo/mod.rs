//! Row-level repository contracts and the SQLite implementation.
//!
//! # Responsibility
//! - Map entities to and from their table rows.
//! - Keep SQL text inside the persistence boundary.
//! - Translate SQLite failures into semantic errors
//!   (`ConstraintViolation`) plus transport errors.
//!
//! # Invariants
//! - Write paths validate the entity before any SQL mutation.
//! - Read paths reject rows that cannot form a valid entity.
//! - Repositories never track identity; that is the unit of work's job.

use crate::db::DbError;
use crate::model::{EntityId, EntityKind, ValidationError};
use rusqlite::{Connection, ErrorCode};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod account_repo;
pub mod account_role_repo;
pub mod post_repo;
pub mod profile_repo;
pub mod role_repo;

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for row persistence and lookups.
#[derive(Debug)]
pub enum RepoError {
    /// Entity broke a field-level rule before reaching the store.
    Validation(ValidationError),
    /// Store rejected a write (UNIQUE, NOT NULL, FOREIGN KEY).
    ConstraintViolation(String),
    /// Transport or bootstrap failure.
    Db(DbError),
    /// Persisted row cannot be converted into an entity.
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::ConstraintViolation(message) => write!(f, "constraint violation: {message}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            Self::ConstraintViolation(_) | Self::InvalidData(_) => None,
        }
    }
}

impl From<ValidationError> for RepoError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        match &value {
            rusqlite::Error::SqliteFailure(err, message)
                if err.code == ErrorCode::ConstraintViolation =>
            {
                Self::ConstraintViolation(
                    message
                        .clone()
                        .unwrap_or_else(|| "constraint failed".to_string()),
                )
            }
            _ => Self::Db(DbError::Sqlite(value)),
        }
    }
}

/// Row-level CRUD contract for one entity kind.
///
/// Deletion is kind-agnostic and lives on [`SqliteStore::delete_row`].
pub trait EntityRepository<E> {
    /// Inserts a transient entity and returns the store-assigned id.
    fn insert(&self, entity: &E) -> RepoResult<EntityId>;
    /// Rewrites the columns of a persisted entity.
    fn update(&self, entity: &E) -> RepoResult<()>;
    /// Loads one entity by id.
    fn get(&self, id: EntityId) -> RepoResult<Option<E>>;
    /// Loads every entity of this kind in id order.
    fn list(&self) -> RepoResult<Vec<E>>;
}

/// SQLite-backed store over a connection or an open transaction.
pub struct SqliteStore<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteStore<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    /// Deletes one row by kind and id; returns whether a row was removed.
    pub fn delete_row(&self, kind: EntityKind, id: EntityId) -> RepoResult<bool> {
        let changed = self.conn.execute(
            &format!("DELETE FROM {} WHERE id = ?1;", kind.table()),
            [id],
        )?;
        Ok(changed > 0)
    }
}

pub(crate) fn ensure_updated(changed: usize, kind: EntityKind, id: EntityId) -> RepoResult<()> {
    if changed == 0 {
        return Err(RepoError::InvalidData(format!(
            "{kind} {id} vanished before update"
        )));
    }
    Ok(())
}

pub(crate) fn missing_id(kind: EntityKind) -> RepoError {
    RepoError::InvalidData(format!("{kind} update requires a persisted id"))
}
