//! Account/role association synchronizer.
//!
//! # Responsibility
//! - Update `Account::role_ids` and `Role::account_ids` together.
//! - Queue join-row inserts/deletes until flush.
//!
//! # Invariants
//! - For any account and role both tracked by one unit of work:
//!   `role ∈ account.role_ids ⟺ account ∈ role.account_ids`.
//! - Pending operations describe the net change against the store: an
//!   insert followed by a delete of the same pair cancels out.

use crate::model::account::{Account, AccountId};
use crate::model::role::{Role, RoleId};
use crate::model::EntityKind;
use crate::session::unit_of_work::UnitOfWork;
use crate::session::{SessionError, SessionResult};
use log::debug;
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkOp {
    Insert,
    Delete,
}

/// Join-row changes not yet written to the store.
#[derive(Debug, Default)]
pub struct PendingLinks {
    ops: BTreeMap<(AccountId, RoleId), LinkOp>,
}

impl PendingLinks {
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn get(&self, account_id: AccountId, role_id: RoleId) -> Option<LinkOp> {
        self.ops.get(&(account_id, role_id)).copied()
    }

    pub(crate) fn record(&mut self, account_id: AccountId, role_id: RoleId, op: LinkOp) {
        let pair = (account_id, role_id);
        match self.ops.get(&pair) {
            Some(previous) if *previous != op => {
                self.ops.remove(&pair);
            }
            _ => {
                self.ops.insert(pair, op);
            }
        }
    }

    pub(crate) fn replay_for_account(&self, account_id: AccountId, role_ids: &mut BTreeSet<RoleId>) {
        for (&(account, role), op) in &self.ops {
            if account == account_id {
                apply(role_ids, role, *op);
            }
        }
    }

    pub(crate) fn replay_for_role(&self, role_id: RoleId, account_ids: &mut BTreeSet<AccountId>) {
        for (&(account, role), op) in &self.ops {
            if role == role_id {
                apply(account_ids, account, *op);
            }
        }
    }

    /// Takes the queued operations, deletes before inserts.
    pub(crate) fn drain(&mut self) -> Vec<(AccountId, RoleId, LinkOp)> {
        let mut ops: Vec<_> = std::mem::take(&mut self.ops)
            .into_iter()
            .map(|((account, role), op)| (account, role, op))
            .collect();
        ops.sort_by_key(|(_, _, op)| *op == LinkOp::Insert);
        ops
    }
}

fn apply(ids: &mut BTreeSet<i64>, id: i64, op: LinkOp) {
    match op {
        LinkOp::Insert => {
            ids.insert(id);
        }
        LinkOp::Delete => {
            ids.remove(&id);
        }
    }
}

impl UnitOfWork<'_> {
    /// Attaches `role_id` to `account_id` on both sides.
    ///
    /// Returns `false` when the pair was already attached.
    ///
    /// # Errors
    /// - `DanglingReference` when either endpoint does not exist.
    pub fn attach(&mut self, account_id: AccountId, role_id: RoleId) -> SessionResult<bool> {
        self.ensure_writable()?;
        self.require_endpoints(account_id, role_id)?;

        let attached = self
            .map
            .get::<Account>(account_id)
            .is_some_and(|account| account.has_role(role_id));
        if attached {
            return Ok(false);
        }

        self.sync_pair(account_id, role_id, LinkOp::Insert);
        Ok(true)
    }

    /// Detaches `role_id` from `account_id` on both sides.
    ///
    /// Returns `false` (and changes nothing) when the pair was not attached,
    /// so repeated calls are harmless.
    ///
    /// # Errors
    /// - `DanglingReference` when either endpoint does not exist.
    pub fn detach(&mut self, account_id: AccountId, role_id: RoleId) -> SessionResult<bool> {
        self.ensure_writable()?;
        self.require_endpoints(account_id, role_id)?;

        let attached = self
            .map
            .get::<Account>(account_id)
            .is_some_and(|account| account.has_role(role_id));
        if !attached {
            return Ok(false);
        }

        self.sync_pair(account_id, role_id, LinkOp::Delete);
        Ok(true)
    }

    /// Detaches every role from a tracked account ahead of its removal.
    pub(super) fn detach_all_roles(&mut self, account_id: AccountId) {
        let role_ids: Vec<RoleId> = self
            .map
            .get::<Account>(account_id)
            .map(|account| account.role_ids().iter().copied().collect())
            .unwrap_or_default();
        for role_id in role_ids {
            self.sync_pair(account_id, role_id, LinkOp::Delete);
        }
    }

    fn require_endpoints(&mut self, account_id: AccountId, role_id: RoleId) -> SessionResult<()> {
        if !self.ensure_loaded::<Account>(account_id)? {
            return Err(SessionError::DanglingReference {
                kind: EntityKind::Account,
                id: account_id,
            });
        }
        if !self.ensure_loaded::<Role>(role_id)? {
            return Err(SessionError::DanglingReference {
                kind: EntityKind::Role,
                id: role_id,
            });
        }
        Ok(())
    }

    fn sync_pair(&mut self, account_id: AccountId, role_id: RoleId, op: LinkOp) {
        if let Some(account) = self.map.get_mut::<Account>(account_id) {
            apply(account.role_ids_mut(), role_id, op);
        }
        if let Some(role) = self.map.get_mut::<Role>(role_id) {
            apply(role.account_ids_mut(), account_id, op);
        }
        self.links.record(account_id, role_id, op);
        debug!(
            "event=association_sync module=session status=ok tx_id={} account_id={} role_id={} op={:?}",
            self.tx_id, account_id, role_id, op
        );
    }
}

#[cfg(test)]
mod tests {
    use super::{LinkOp, PendingLinks};
    use std::collections::BTreeSet;

    #[test]
    fn opposite_operations_on_one_pair_cancel_out() {
        let mut links = PendingLinks::default();
        links.record(1, 2, LinkOp::Insert);
        links.record(1, 2, LinkOp::Delete);
        assert!(links.is_empty());

        links.record(1, 2, LinkOp::Delete);
        links.record(1, 2, LinkOp::Delete);
        assert_eq!(links.get(1, 2), Some(LinkOp::Delete));
    }

    #[test]
    fn replay_applies_only_matching_side() {
        let mut links = PendingLinks::default();
        links.record(1, 10, LinkOp::Insert);
        links.record(2, 10, LinkOp::Insert);
        links.record(1, 11, LinkOp::Delete);

        let mut roles = BTreeSet::from([11]);
        links.replay_for_account(1, &mut roles);
        assert_eq!(roles, BTreeSet::from([10]));

        let mut accounts = BTreeSet::new();
        links.replay_for_role(10, &mut accounts);
        assert_eq!(accounts, BTreeSet::from([1, 2]));
    }

    #[test]
    fn drain_orders_deletes_first() {
        let mut links = PendingLinks::default();
        links.record(1, 1, LinkOp::Insert);
        links.record(2, 2, LinkOp::Delete);
        let ops = links.drain();
        assert_eq!(ops[0].2, LinkOp::Delete);
        assert_eq!(ops[1].2, LinkOp::Insert);
        assert!(links.is_empty());
    }
}
