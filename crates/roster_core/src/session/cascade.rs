//! Cascade engine: per-relationship policies and graph traversal.
//!
//! # Responsibility
//! - Declare which lifecycle operations propagate along each relationship.
//! - Walk relationship graphs with an explicit worklist and visited set so
//!   the account/role cycle cannot recurse forever.
//! - Apply persist/merge cascades for account graphs.
//!
//! # Invariants
//! - A node is visited at most once per traversal.
//! - Remove cascades delete dependents before their owner.
//! - Roles are never removed through an account.

use crate::model::account::{Account, AccountId};
use crate::model::post::Post;
use crate::model::profile::Profile;
use crate::model::role::{Role, RoleId};
use crate::model::{Entity, EntityKey, EntityKind};
use crate::session::identity_map::Managed;
use crate::session::unit_of_work::UnitOfWork;
use crate::session::{SessionError, SessionResult};
use log::debug;
use std::collections::{BTreeSet, VecDeque};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CascadeOp {
    Persist,
    Merge,
    Remove,
}

impl CascadeOp {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Persist => "persist",
            Self::Merge => "merge",
            Self::Remove => "remove",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CascadePolicy {
    /// Persist, merge and remove all propagate.
    All,
    /// Only persist and merge propagate.
    PersistMerge,
    None,
}

impl CascadePolicy {
    pub fn includes(self, op: CascadeOp) -> bool {
        match self {
            Self::All => true,
            Self::PersistMerge => matches!(op, CascadeOp::Persist | CascadeOp::Merge),
            Self::None => false,
        }
    }
}

/// Directed relationship between two entity kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relationship {
    AccountProfile,
    AccountPosts,
    AccountRoles,
    /// Inverse side of `AccountRoles`.
    RoleAccounts,
    PostAuthor,
    ProfileOwner,
}

impl Relationship {
    pub const ALL: [Relationship; 6] = [
        Self::AccountProfile,
        Self::AccountPosts,
        Self::AccountRoles,
        Self::RoleAccounts,
        Self::PostAuthor,
        Self::ProfileOwner,
    ];

    pub fn source(self) -> EntityKind {
        match self {
            Self::AccountProfile | Self::AccountPosts | Self::AccountRoles => EntityKind::Account,
            Self::RoleAccounts => EntityKind::Role,
            Self::PostAuthor => EntityKind::Post,
            Self::ProfileOwner => EntityKind::Profile,
        }
    }

    pub fn target(self) -> EntityKind {
        match self {
            Self::AccountProfile => EntityKind::Profile,
            Self::AccountPosts => EntityKind::Post,
            Self::AccountRoles => EntityKind::Role,
            Self::RoleAccounts | Self::PostAuthor | Self::ProfileOwner => EntityKind::Account,
        }
    }

    pub fn policy(self) -> CascadePolicy {
        match self {
            Self::AccountProfile | Self::AccountPosts => CascadePolicy::All,
            Self::AccountRoles => CascadePolicy::PersistMerge,
            Self::RoleAccounts | Self::PostAuthor | Self::ProfileOwner => CascadePolicy::None,
        }
    }

    /// Relationships leaving `kind` that propagate `op`.
    pub fn cascading(kind: EntityKind, op: CascadeOp) -> impl Iterator<Item = Relationship> {
        Self::ALL
            .into_iter()
            .filter(move |rel| rel.source() == kind && rel.policy().includes(op))
    }
}

/// Breadth-first cascade walk from `root`.
///
/// `targets` resolves the related identities of one node along one
/// relationship; it is only asked about relationships whose policy includes
/// `op`. Returns visited keys in discovery order, root first.
pub fn traverse<E>(
    root: EntityKey,
    op: CascadeOp,
    mut targets: impl FnMut(EntityKey, Relationship) -> Result<Vec<EntityKey>, E>,
) -> Result<Vec<EntityKey>, E> {
    let mut visited = BTreeSet::from([root]);
    let mut worklist = VecDeque::from([root]);
    let mut order = Vec::new();

    while let Some(key) = worklist.pop_front() {
        order.push(key);
        for rel in Relationship::cascading(key.kind, op) {
            for target in targets(key, rel)? {
                if visited.insert(target) {
                    worklist.push_back(target);
                }
            }
        }
    }

    Ok(order)
}

/// Reference from an account graph to a role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoleRef {
    /// Attach an already stored role.
    Existing(RoleId),
    /// Persist (or merge, when it has an id) the role, then attach it.
    Cascaded(Role),
}

/// An account together with the dependents a persist/merge cascades to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountGraph {
    pub account: Account,
    pub profile: Option<Profile>,
    pub posts: Vec<Post>,
    pub roles: Vec<RoleRef>,
}

impl AccountGraph {
    pub fn new(account: Account) -> Self {
        Self {
            account,
            profile: None,
            posts: Vec::new(),
            roles: Vec::new(),
        }
    }

    pub fn with_profile(mut self, profile: Profile) -> Self {
        self.profile = Some(profile);
        self
    }

    pub fn with_post(mut self, post: Post) -> Self {
        self.posts.push(post);
        self
    }

    pub fn with_role(mut self, role: RoleRef) -> Self {
        self.roles.push(role);
        self
    }
}

impl UnitOfWork<'_> {
    /// Persists a transient account and cascades to its dependents.
    ///
    /// The account row is written first, then profile and posts (owned
    /// through it), then role attachments. Roles referenced more than once
    /// are attached once.
    pub fn persist_graph(&mut self, graph: AccountGraph) -> SessionResult<AccountId> {
        let AccountGraph {
            account,
            profile,
            posts,
            roles,
        } = graph;
        let account_id = self.persist(account)?;
        self.cascade_dependents(account_id, CascadeOp::Persist, profile, posts, roles)?;
        Ok(account_id)
    }

    /// Merges a detached account and cascades to its dependents.
    ///
    /// Transient dependents are persisted under the account; detached ones
    /// are merged. Returns `None` when the account no longer exists. A
    /// transient account is persisted as by [`UnitOfWork::persist_graph`].
    pub fn merge_graph(&mut self, graph: AccountGraph) -> SessionResult<Option<AccountId>> {
        let Some(account_id) = graph.account.id() else {
            return self.persist_graph(graph).map(Some);
        };
        let AccountGraph {
            account,
            profile,
            posts,
            roles,
        } = graph;
        if self.merge(account)?.is_none() {
            return Ok(None);
        }
        self.cascade_dependents(account_id, CascadeOp::Merge, profile, posts, roles)?;
        Ok(Some(account_id))
    }

    fn cascade_dependents(
        &mut self,
        account_id: AccountId,
        op: CascadeOp,
        mut profile: Option<Profile>,
        mut posts: Vec<Post>,
        mut roles: Vec<RoleRef>,
    ) -> SessionResult<()> {
        for rel in Relationship::cascading(EntityKind::Account, op) {
            match rel {
                Relationship::AccountProfile => {
                    if let Some(mut profile) = profile.take() {
                        if profile.is_transient() {
                            profile.set_owner(account_id);
                        }
                        self.merge_dependent(account_id, profile, Profile::account_id)?;
                    }
                }
                Relationship::AccountPosts => {
                    for mut post in std::mem::take(&mut posts) {
                        if post.is_transient() {
                            post.set_author(account_id);
                        }
                        self.merge_dependent(account_id, post, Post::author_id)?;
                    }
                }
                Relationship::AccountRoles => {
                    let mut seen = BTreeSet::new();
                    for role in std::mem::take(&mut roles) {
                        let role_id = match role {
                            RoleRef::Existing(id) => id,
                            RoleRef::Cascaded(role) => match role.id() {
                                Some(id) => {
                                    if self.merge(role)?.is_none() {
                                        return Err(SessionError::DanglingReference {
                                            kind: EntityKind::Role,
                                            id,
                                        });
                                    }
                                    id
                                }
                                None => self.persist(role)?,
                            },
                        };
                        if seen.insert(role_id) {
                            self.attach(account_id, role_id)?;
                        }
                    }
                }
                _ => {}
            }
        }
        debug!(
            "event=cascade module=session status=ok tx_id={} op={} account_id={}",
            self.tx_id,
            op.as_str(),
            account_id
        );
        Ok(())
    }

    /// Merges a profile or post into the graph rooted at `account_id`.
    ///
    /// A detached dependent must still exist and must belong to that account,
    /// both as stored and as offered.
    fn merge_dependent<E: Managed>(
        &mut self,
        account_id: AccountId,
        dependent: E,
        owner: fn(&E) -> Option<AccountId>,
    ) -> SessionResult<()> {
        if let Some(id) = dependent.id() {
            if !self.ensure_loaded::<E>(id)? {
                return Err(SessionError::DanglingReference { kind: E::KIND, id });
            }
            let stored_owner = self.map.get::<E>(id).and_then(owner);
            if stored_owner != Some(account_id) || owner(&dependent) != Some(account_id) {
                return Err(SessionError::ForeignDependent {
                    kind: E::KIND,
                    id,
                    account_id,
                });
            }
        }
        self.merge(dependent)?;
        Ok(())
    }

    /// Resolves the related identities of `key` along `rel`, skipping
    /// identities already removed in this unit of work.
    pub(super) fn cascade_targets(
        &mut self,
        key: EntityKey,
        rel: Relationship,
    ) -> SessionResult<Vec<EntityKey>> {
        let ids: Vec<i64> = match rel {
            Relationship::AccountProfile => self
                .store()
                .profile_id_for_account(key.id)?
                .into_iter()
                .collect(),
            Relationship::AccountPosts => self.store().post_ids_by_author(key.id)?,
            Relationship::AccountRoles => {
                self.ensure_loaded::<Account>(key.id)?;
                self.map
                    .get::<Account>(key.id)
                    .map(|account| account.role_ids().iter().copied().collect())
                    .unwrap_or_default()
            }
            Relationship::RoleAccounts => {
                self.ensure_loaded::<Role>(key.id)?;
                self.map
                    .get::<Role>(key.id)
                    .map(|role| role.account_ids().iter().copied().collect())
                    .unwrap_or_default()
            }
            Relationship::PostAuthor => {
                self.ensure_loaded::<Post>(key.id)?;
                self.map
                    .get::<Post>(key.id)
                    .and_then(Post::author_id)
                    .into_iter()
                    .collect()
            }
            Relationship::ProfileOwner => {
                self.ensure_loaded::<Profile>(key.id)?;
                self.map
                    .get::<Profile>(key.id)
                    .and_then(Profile::account_id)
                    .into_iter()
                    .collect()
            }
        };

        let target = rel.target();
        Ok(ids
            .into_iter()
            .map(|id| EntityKey::new(target, id))
            .filter(|key| !self.removed.contains(key))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::{traverse, CascadeOp, CascadePolicy, Relationship};
    use crate::model::{EntityKey, EntityKind};
    use std::convert::Infallible;

    #[test]
    fn policies_match_relationship_table() {
        assert!(Relationship::AccountPosts.policy().includes(CascadeOp::Remove));
        assert!(Relationship::AccountProfile.policy().includes(CascadeOp::Merge));
        assert!(!Relationship::AccountRoles.policy().includes(CascadeOp::Remove));
        assert!(Relationship::AccountRoles.policy().includes(CascadeOp::Persist));
        assert_eq!(Relationship::RoleAccounts.policy(), CascadePolicy::None);
    }

    #[test]
    fn remove_cascade_from_account_skips_roles() {
        let rels: Vec<_> = Relationship::cascading(EntityKind::Account, CascadeOp::Remove).collect();
        assert_eq!(
            rels,
            vec![Relationship::AccountProfile, Relationship::AccountPosts]
        );
    }

    #[test]
    fn traversal_visits_each_node_once_even_with_a_cycle() {
        let account = EntityKey::new(EntityKind::Account, 1);
        let role = EntityKey::new(EntityKind::Role, 5);
        let mut calls = 0;

        // Persist follows account -> role; pretend every role also points back.
        let order = traverse(account, CascadeOp::Persist, |key, rel| {
            calls += 1;
            Ok::<_, Infallible>(match (key.kind, rel) {
                (EntityKind::Account, Relationship::AccountRoles) => vec![role, role],
                _ => Vec::new(),
            })
        })
        .unwrap();

        assert_eq!(order, vec![account, role]);
        assert!(calls <= 3);
    }

    #[test]
    fn traversal_lists_root_before_dependents() {
        let account = EntityKey::new(EntityKind::Account, 1);
        let profile = EntityKey::new(EntityKind::Profile, 4);
        let post = EntityKey::new(EntityKind::Post, 9);

        let order = traverse(account, CascadeOp::Remove, |key, rel| {
            Ok::<_, Infallible>(match (key.kind, rel) {
                (EntityKind::Account, Relationship::AccountProfile) => vec![profile],
                (EntityKind::Account, Relationship::AccountPosts) => vec![post],
                _ => Vec::new(),
            })
        })
        .unwrap();

        assert_eq!(order, vec![account, profile, post]);
    }
}
