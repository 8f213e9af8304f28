//! Core persistence layer for the roster application.
//! Accounts, posts, roles and profiles live here together with the unit of
//! work that keeps their identities and relationships consistent.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;
pub mod session;

pub use config::{ConfigError, RosterConfig};
pub use db::{open_db, open_db_in_memory, DbError};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::account::{Account, AccountId};
pub use model::address::Address;
pub use model::post::{Post, PostId};
pub use model::profile::{Profile, ProfileId};
pub use model::role::{Role, RoleId};
pub use model::{Entity, EntityId, EntityKey, EntityKind, ValidationError};
pub use repo::{RepoError, RepoResult};
pub use service::{AccountDetails, RosterService};
pub use session::{
    AccountGraph, EntityState, ErrorKind, RoleRef, SessionError, SessionResult, TxMode,
    UnitOfWork,
};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
