//! Transaction-scoped persistence context.
//!
//! # Responsibility
//! - Track entity identity per transaction (identity map).
//! - Turn persist/merge/remove intents into store writes, cascading along
//!   relationships according to their policy.
//! - Keep both sides of the account/role association consistent.
//!
//! # Invariants
//! - One `UnitOfWork` owns exactly one SQLite transaction and one identity
//!   map; nothing here is process-global.
//! - At most one in-memory instance exists per `(kind, id)` inside a unit
//!   of work.
//! - Dropping a unit of work without `commit()` rolls everything back,
//!   cascaded writes included.

use crate::model::{EntityId, EntityKind};
use crate::repo::RepoError;
use std::error::Error;
use std::fmt::{Display, Formatter};

mod association;
mod cascade;
mod identity_map;
mod query;
mod unit_of_work;

pub use association::{LinkOp, PendingLinks};
pub use cascade::{traverse, AccountGraph, CascadeOp, CascadePolicy, Relationship, RoleRef};
pub use identity_map::{IdentityMap, Managed, Tracked};
pub use unit_of_work::UnitOfWork;

pub type SessionResult<T> = Result<T, SessionError>;

/// Transaction boundary flavor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxMode {
    /// `BEGIN IMMEDIATE`; write intents allowed, flushed on commit.
    ReadWrite,
    /// Deferred transaction that never writes and always ends in rollback.
    ReadOnly,
}

impl TxMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ReadWrite => "read_write",
            Self::ReadOnly => "read_only",
        }
    }
}

/// Tracking state of an identity inside one unit of work.
///
/// Transient entities (no id) and detached snapshots held by callers are not
/// tracked and therefore have no state here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityState {
    Managed,
    Removed,
}

/// Failure taxonomy exposed to callers of the persistence layer.
///
/// Absent rows are never errors; lookups return `Option`/`bool` instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Uniqueness, required-field or foreign-key rule broken; the
    /// transaction was rolled back.
    ConstraintViolation,
    /// A required relationship target does not exist.
    DanglingReference,
    /// The store cannot be reached or used.
    StoreUnavailable,
    /// Misuse of the API or corrupt persisted data.
    Internal,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ConstraintViolation => "constraint_violation",
            Self::DanglingReference => "dangling_reference",
            Self::StoreUnavailable => "store_unavailable",
            Self::Internal => "internal",
        }
    }
}

#[derive(Debug)]
pub enum SessionError {
    Repo(RepoError),
    /// Operation names an entity that must exist as a relationship target.
    DanglingReference { kind: EntityKind, id: EntityId },
    /// Write intent issued inside a read-only unit of work.
    ReadOnlyTransaction,
    /// `persist` was handed an entity that already has an identity.
    NotTransient { kind: EntityKind, id: EntityId },
    /// Exclusively owned entity offered to a graph rooted at another account.
    ForeignDependent {
        kind: EntityKind,
        id: EntityId,
        account_id: EntityId,
    },
    /// Internal consistency mismatch between write and read-back.
    InconsistentState(&'static str),
}

impl SessionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Repo(RepoError::Validation(_) | RepoError::ConstraintViolation(_)) => {
                ErrorKind::ConstraintViolation
            }
            Self::Repo(RepoError::Db(err)) if err.is_unavailable() => ErrorKind::StoreUnavailable,
            Self::Repo(_) => ErrorKind::Internal,
            Self::DanglingReference { .. } => ErrorKind::DanglingReference,
            Self::ForeignDependent { .. } => ErrorKind::ConstraintViolation,
            Self::ReadOnlyTransaction | Self::NotTransient { .. } | Self::InconsistentState(_) => {
                ErrorKind::Internal
            }
        }
    }
}

impl Display for SessionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Repo(err) => write!(f, "{err}"),
            Self::DanglingReference { kind, id } => {
                write!(f, "referenced {kind} {id} does not exist")
            }
            Self::ReadOnlyTransaction => write!(f, "write attempted in a read-only transaction"),
            Self::NotTransient { kind, id } => {
                write!(f, "{kind} {id} already has an identity; use merge instead")
            }
            Self::ForeignDependent {
                kind,
                id,
                account_id,
            } => write!(f, "{kind} {id} is not owned by account {account_id}"),
            Self::InconsistentState(details) => write!(f, "inconsistent session state: {details}"),
        }
    }
}

impl Error for SessionError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for SessionError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

impl From<rusqlite::Error> for SessionError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Repo(RepoError::from(value))
    }
}
