//! Unit of work: one SQLite transaction plus its identity map.
//!
//! # Responsibility
//! - Own the transaction boundary (commit, explicit or implicit rollback).
//! - Resolve entities through the identity map before touching the store.
//! - Collect dirty state, join-row changes and scheduled deletes, and
//!   write them in dependency order on flush.
//!
//! # Invariants
//! - Inserts happen at `persist` time so identities exist immediately.
//! - Flush order: column updates, join-row deletes, join-row inserts, then
//!   row deletes in the order `remove` scheduled them (dependents first).
//! - A removed identity is never reloaded within the same unit of work.

use crate::model::account::Account;
use crate::model::post::Post;
use crate::model::profile::Profile;
use crate::model::role::Role;
use crate::model::{EntityId, EntityKey, EntityKind};
use crate::repo::{RepoError, SqliteStore};
use crate::session::association::{LinkOp, PendingLinks};
use crate::session::cascade::{traverse, CascadeOp};
use crate::session::identity_map::{IdentityMap, Managed};
use crate::session::{EntityState, SessionError, SessionResult, TxMode};
use log::{debug, error, info};
use rusqlite::{Connection, Transaction, TransactionBehavior};
use std::collections::BTreeSet;
use std::time::Instant;
use uuid::Uuid;

/// Transaction-scoped persistence context.
///
/// Borrowing the connection mutably guarantees that no two units of work
/// share a transaction or an identity map.
pub struct UnitOfWork<'conn> {
    tx: Transaction<'conn>,
    mode: TxMode,
    pub(super) tx_id: Uuid,
    started_at: Instant,
    pub(super) map: IdentityMap,
    pub(super) links: PendingLinks,
    pub(super) removed: BTreeSet<EntityKey>,
    pending_deletes: Vec<EntityKey>,
}

impl<'conn> UnitOfWork<'conn> {
    /// Opens a transaction on `conn`.
    ///
    /// `ReadWrite` takes the write lock up front (`BEGIN IMMEDIATE`);
    /// `ReadOnly` uses a deferred transaction that is always rolled back.
    pub fn begin(conn: &'conn mut Connection, mode: TxMode) -> SessionResult<Self> {
        let behavior = match mode {
            TxMode::ReadWrite => TransactionBehavior::Immediate,
            TxMode::ReadOnly => TransactionBehavior::Deferred,
        };
        let tx = conn.transaction_with_behavior(behavior)?;
        let tx_id = Uuid::new_v4();
        debug!(
            "event=tx_begin module=session status=ok tx_id={tx_id} mode={}",
            mode.as_str()
        );
        Ok(Self {
            tx,
            mode,
            tx_id,
            started_at: Instant::now(),
            map: IdentityMap::new(),
            links: PendingLinks::default(),
            removed: BTreeSet::new(),
            pending_deletes: Vec::new(),
        })
    }

    pub fn id(&self) -> Uuid {
        self.tx_id
    }

    pub fn mode(&self) -> TxMode {
        self.mode
    }

    pub fn identity_map(&self) -> &IdentityMap {
        &self.map
    }

    pub fn pending_links(&self) -> &PendingLinks {
        &self.links
    }

    /// Tracking state of `key`; `None` when this unit of work never saw it.
    pub fn state(&self, key: EntityKey) -> Option<EntityState> {
        if self.removed.contains(&key) {
            return Some(EntityState::Removed);
        }
        self.is_tracked(key).then_some(EntityState::Managed)
    }

    /// Resolves an entity by identity, loading it on first access.
    pub fn find<E: Managed>(&mut self, id: EntityId) -> SessionResult<Option<&E>> {
        if !self.ensure_loaded::<E>(id)? {
            return Ok(None);
        }
        Ok(self.map.get::<E>(id))
    }

    /// Mutable access to a managed entity; edits are written on flush.
    ///
    /// # Errors
    /// - `ReadOnlyTransaction` in a read-only unit of work.
    pub fn find_mut<E: Managed>(&mut self, id: EntityId) -> SessionResult<Option<&mut E>> {
        self.ensure_writable()?;
        if !self.ensure_loaded::<E>(id)? {
            return Ok(None);
        }
        Ok(self.map.get_mut::<E>(id))
    }

    /// Inserts a transient entity and starts tracking it.
    ///
    /// # Errors
    /// - `NotTransient` when the entity already has an id.
    /// - `DanglingReference` when a required owner does not exist.
    /// - `Repo(Validation | ConstraintViolation)` when the row is rejected.
    pub fn persist<E: Managed>(&mut self, mut entity: E) -> SessionResult<EntityId> {
        self.ensure_writable()?;
        if let Some(id) = entity.id() {
            return Err(SessionError::NotTransient { kind: E::KIND, id });
        }
        entity.validate().map_err(RepoError::from)?;
        for key in entity.required_refs() {
            self.require(key)?;
        }

        let id = E::repository(&self.store()).insert(&entity)?;
        entity.assign_id(id);
        self.map.track(id, entity);
        debug!(
            "event=entity_persist module=session status=ok tx_id={} kind={} id={}",
            self.tx_id,
            E::KIND,
            id
        );
        Ok(id)
    }

    /// Reconciles a detached copy with its managed instance.
    ///
    /// Transient input is persisted. Returns `None` when the identity no
    /// longer exists (or was removed in this unit of work).
    pub fn merge<E: Managed>(&mut self, detached: E) -> SessionResult<Option<&E>> {
        self.ensure_writable()?;
        let Some(id) = detached.id() else {
            let id = self.persist(detached)?;
            return Ok(self.map.get::<E>(id));
        };
        detached.validate().map_err(RepoError::from)?;
        if !self.ensure_loaded::<E>(id)? {
            return Ok(None);
        }
        if let Some(managed) = self.map.get_mut::<E>(id) {
            managed.absorb(&detached);
        }
        Ok(self.map.get::<E>(id))
    }

    /// Schedules deletion of an entity and everything its remove cascade
    /// reaches. Accounts are detached from their roles first.
    ///
    /// Returns `false` when the identity does not exist.
    pub fn remove<E: Managed>(&mut self, id: EntityId) -> SessionResult<bool> {
        self.ensure_writable()?;
        if !self.ensure_loaded::<E>(id)? {
            return Ok(false);
        }

        let root = EntityKey::new(E::KIND, id);
        let reached = traverse(root, CascadeOp::Remove, |key, rel| {
            self.cascade_targets(key, rel)
        })?;

        for key in reached.iter().rev().copied() {
            if key.kind == EntityKind::Account {
                self.ensure_loaded::<Account>(key.id)?;
                self.detach_all_roles(key.id);
            }
            self.map.evict(key);
            self.removed.insert(key);
            self.pending_deletes.push(key);
        }

        debug!(
            "event=entity_remove module=session status=ok tx_id={} root={} cascaded={}",
            self.tx_id,
            root,
            reached.len() - 1
        );
        Ok(true)
    }

    /// Writes pending changes without ending the transaction.
    pub fn flush(&mut self) -> SessionResult<()> {
        if self.mode == TxMode::ReadOnly {
            return Ok(());
        }

        let updated = self.flush_dirty::<Account>()?
            + self.flush_dirty::<Post>()?
            + self.flush_dirty::<Role>()?
            + self.flush_dirty::<Profile>()?;

        let store = SqliteStore::new(&self.tx);
        let link_ops = self.links.drain();
        for (account_id, role_id, op) in &link_ops {
            match op {
                LinkOp::Delete => store.unlink(*account_id, *role_id)?,
                LinkOp::Insert => store.link(*account_id, *role_id)?,
            };
        }

        let deletes = std::mem::take(&mut self.pending_deletes);
        for key in &deletes {
            store.delete_row(key.kind, key.id)?;
        }

        if updated + link_ops.len() + deletes.len() > 0 {
            debug!(
                "event=flush module=session status=ok tx_id={} updated={} links={} deleted={}",
                self.tx_id,
                updated,
                link_ops.len(),
                deletes.len()
            );
        }
        Ok(())
    }

    /// Flushes and commits. A read-only unit of work is rolled back instead.
    pub fn commit(mut self) -> SessionResult<()> {
        if self.mode == TxMode::ReadOnly {
            return self.rollback();
        }
        if let Err(err) = self.flush() {
            error!(
                "event=tx_commit module=session status=error tx_id={} duration_ms={} error_kind={}",
                self.tx_id,
                self.started_at.elapsed().as_millis(),
                err.kind().as_str()
            );
            return Err(err);
        }

        let tx_id = self.tx_id;
        let started_at = self.started_at;
        self.tx.commit()?;
        info!(
            "event=tx_commit module=session status=ok tx_id={tx_id} duration_ms={}",
            started_at.elapsed().as_millis()
        );
        Ok(())
    }

    /// Discards every change made in this unit of work.
    pub fn rollback(self) -> SessionResult<()> {
        let tx_id = self.tx_id;
        let started_at = self.started_at;
        self.tx.rollback()?;
        debug!(
            "event=tx_rollback module=session status=ok tx_id={tx_id} duration_ms={}",
            started_at.elapsed().as_millis()
        );
        Ok(())
    }

    pub(super) fn store(&self) -> SqliteStore<'_> {
        SqliteStore::new(&self.tx)
    }

    pub(super) fn ensure_writable(&self) -> SessionResult<()> {
        match self.mode {
            TxMode::ReadWrite => Ok(()),
            TxMode::ReadOnly => Err(SessionError::ReadOnlyTransaction),
        }
    }

    /// Makes sure `id` is tracked, loading it from the store if needed.
    ///
    /// Returns `false` when the row does not exist or was removed here.
    pub(super) fn ensure_loaded<E: Managed>(&mut self, id: EntityId) -> SessionResult<bool> {
        if self.removed.contains(&EntityKey::new(E::KIND, id)) {
            return Ok(false);
        }
        if self.map.contains::<E>(id) {
            return Ok(true);
        }
        let loaded = E::repository(&self.store()).get(id)?;
        match loaded {
            Some(entity) => {
                self.adopt(entity);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Registers a row read from the store; an already tracked instance wins.
    pub(super) fn adopt<E: Managed>(&mut self, mut entity: E) -> Option<EntityId> {
        let id = entity.id()?;
        if self.removed.contains(&EntityKey::new(E::KIND, id)) {
            return None;
        }
        if !self.map.contains::<E>(id) {
            entity.apply_links(&self.links);
            self.map.track(id, entity);
        }
        Some(id)
    }

    fn require(&mut self, key: EntityKey) -> SessionResult<()> {
        let exists = match key.kind {
            EntityKind::Account => self.ensure_loaded::<Account>(key.id)?,
            EntityKind::Post => self.ensure_loaded::<Post>(key.id)?,
            EntityKind::Role => self.ensure_loaded::<Role>(key.id)?,
            EntityKind::Profile => self.ensure_loaded::<Profile>(key.id)?,
        };
        if exists {
            Ok(())
        } else {
            Err(SessionError::DanglingReference {
                kind: key.kind,
                id: key.id,
            })
        }
    }

    fn is_tracked(&self, key: EntityKey) -> bool {
        match key.kind {
            EntityKind::Account => self.map.contains::<Account>(key.id),
            EntityKind::Post => self.map.contains::<Post>(key.id),
            EntityKind::Role => self.map.contains::<Role>(key.id),
            EntityKind::Profile => self.map.contains::<Profile>(key.id),
        }
    }

    fn flush_dirty<E: Managed>(&mut self) -> SessionResult<usize> {
        let dirty: Vec<EntityId> = E::slots(&self.map)
            .iter()
            .filter(|(_, tracked)| tracked.is_dirty())
            .map(|(id, _)| *id)
            .collect();

        let store = SqliteStore::new(&self.tx);
        for id in &dirty {
            if let Some(tracked) = E::slots_mut(&mut self.map).get_mut(id) {
                E::repository(&store).update(tracked.current())?;
                tracked.mark_clean();
            }
        }
        Ok(dirty.len())
    }
}

#[cfg(test)]
mod tests {
    use super::UnitOfWork;
    use crate::db::open_db_in_memory;
    use crate::model::account::Account;
    use crate::model::post::Post;
    use crate::model::{EntityKey, EntityKind};
    use crate::session::{EntityState, SessionError, TxMode};

    #[test]
    fn find_returns_the_tracked_instance_not_a_fresh_read() {
        let mut conn = open_db_in_memory().unwrap();
        let mut uow = UnitOfWork::begin(&mut conn, TxMode::ReadWrite).unwrap();
        let id = uow.persist(Account::new("alice", "alice@x.io")).unwrap();

        uow.find_mut::<Account>(id).unwrap().unwrap().email = "new@x.io".to_string();
        let seen = uow.find::<Account>(id).unwrap().unwrap();
        assert_eq!(seen.email, "new@x.io");
        assert!(uow.identity_map().is_dirty::<Account>(id));
    }

    #[test]
    fn persist_rejects_entities_with_identity() {
        let mut conn = open_db_in_memory().unwrap();
        let mut uow = UnitOfWork::begin(&mut conn, TxMode::ReadWrite).unwrap();
        let id = uow.persist(Account::new("alice", "alice@x.io")).unwrap();
        let copy = uow.find::<Account>(id).unwrap().unwrap().clone();

        let err = uow.persist(copy).unwrap_err();
        assert!(matches!(err, SessionError::NotTransient { .. }));
    }

    #[test]
    fn removed_identity_is_not_reloaded() {
        let mut conn = open_db_in_memory().unwrap();
        let mut uow = UnitOfWork::begin(&mut conn, TxMode::ReadWrite).unwrap();
        let account = uow.persist(Account::new("alice", "alice@x.io")).unwrap();
        let post = uow.persist(Post::new(account, "hello", "")).unwrap();

        assert!(uow.remove::<Account>(account).unwrap());
        assert!(uow.find::<Post>(post).unwrap().is_none());
        assert_eq!(
            uow.state(EntityKey::new(EntityKind::Post, post)),
            Some(EntityState::Removed)
        );
        assert!(!uow.remove::<Account>(account).unwrap());
    }

    #[test]
    fn read_only_rejects_write_intents() {
        let mut conn = open_db_in_memory().unwrap();
        let mut uow = UnitOfWork::begin(&mut conn, TxMode::ReadOnly).unwrap();
        let err = uow.persist(Account::new("alice", "alice@x.io")).unwrap_err();
        assert!(matches!(err, SessionError::ReadOnlyTransaction));
        assert!(uow.commit().is_ok());
    }
}
