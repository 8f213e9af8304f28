//! Core use-case services.
//!
//! # Responsibility
//! - Expose account, post and role use cases as single calls.
//! - Run each call inside its own unit of work and hand back detached
//!   snapshots.
//!
//! # Invariants
//! - Lookups run in read-only units of work; writes commit or roll back as
//!   one transaction.
//! - Absent identities surface as `None`/`false`, never as errors.

use crate::model::account::Account;
use crate::model::profile::Profile;
use crate::model::role::Role;
use crate::session::{SessionError, SessionResult, TxMode, UnitOfWork};
use log::{error, info};
use rusqlite::Connection;
use serde::Serialize;
use std::time::Instant;

pub mod account_service;
pub mod post_service;
pub mod role_service;

/// Use-case facade over one connection.
pub struct RosterService<'conn> {
    conn: &'conn mut Connection,
}

/// Account snapshot with everything hanging off it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccountDetails {
    pub account: Account,
    pub profile: Option<Profile>,
    pub roles: Vec<Role>,
    pub post_count: usize,
}

impl<'conn> RosterService<'conn> {
    pub fn new(conn: &'conn mut Connection) -> Self {
        Self { conn }
    }

    pub(crate) fn read<T>(
        &mut self,
        op: &'static str,
        work: impl FnOnce(&mut UnitOfWork<'_>) -> SessionResult<T>,
    ) -> SessionResult<T> {
        self.run(op, TxMode::ReadOnly, work)
    }

    pub(crate) fn write<T>(
        &mut self,
        op: &'static str,
        work: impl FnOnce(&mut UnitOfWork<'_>) -> SessionResult<T>,
    ) -> SessionResult<T> {
        self.run(op, TxMode::ReadWrite, work)
    }

    fn run<T>(
        &mut self,
        op: &'static str,
        mode: TxMode,
        work: impl FnOnce(&mut UnitOfWork<'_>) -> SessionResult<T>,
    ) -> SessionResult<T> {
        let started_at = Instant::now();
        let mut uow = UnitOfWork::begin(&mut *self.conn, mode)?;
        let tx_id = uow.id();

        let outcome = match work(&mut uow) {
            Ok(value) => uow.commit().map(|()| value),
            Err(err) => Err(err),
        };

        match &outcome {
            Ok(_) => info!(
                "event={op} module=service status=ok tx_id={tx_id} mode={} duration_ms={}",
                mode.as_str(),
                started_at.elapsed().as_millis()
            ),
            Err(err) => error!(
                "event={op} module=service status=error tx_id={tx_id} mode={} duration_ms={} error_kind={}",
                mode.as_str(),
                started_at.elapsed().as_millis(),
                err.kind().as_str()
            ),
        }
        outcome
    }
}

/// Clones a tracked entity out of the unit of work.
pub(crate) fn detached<E: Clone>(
    found: Option<&E>,
    details: &'static str,
) -> SessionResult<E> {
    found
        .cloned()
        .ok_or(SessionError::InconsistentState(details))
}
