//! Per-transaction identity map and the entity hooks it relies on.
//!
//! # Invariants
//! - Each `(kind, id)` has at most one tracked instance.
//! - `Tracked::snapshot` is the state last read from or written to the
//!   store; dirtiness is a column-wise comparison against it.

use crate::model::account::Account;
use crate::model::post::Post;
use crate::model::profile::Profile;
use crate::model::role::Role;
use crate::model::{Entity, EntityId, EntityKey, EntityKind};
use crate::repo::{EntityRepository, SqliteStore};
use crate::session::association::PendingLinks;
use std::collections::BTreeMap;

/// One managed instance plus its last-synchronized snapshot.
#[derive(Debug, Clone)]
pub struct Tracked<E> {
    current: E,
    snapshot: E,
}

impl<E: Managed> Tracked<E> {
    fn new(entity: E) -> Self {
        Self {
            snapshot: entity.clone(),
            current: entity,
        }
    }

    pub fn current(&self) -> &E {
        &self.current
    }

    /// Whether any stored column differs from the last synchronized state.
    pub fn is_dirty(&self) -> bool {
        !self.current.columns_eq(&self.snapshot)
    }

    pub(crate) fn current_mut(&mut self) -> &mut E {
        &mut self.current
    }

    pub(crate) fn mark_clean(&mut self) {
        self.snapshot = self.current.clone();
    }
}

/// Entity kinds the unit of work knows how to track and store.
pub trait Managed: Entity + 'static {
    #[doc(hidden)]
    fn slots(map: &IdentityMap) -> &BTreeMap<EntityId, Tracked<Self>>;
    #[doc(hidden)]
    fn slots_mut(map: &mut IdentityMap) -> &mut BTreeMap<EntityId, Tracked<Self>>;
    #[doc(hidden)]
    fn repository<'a>(store: &'a SqliteStore<'_>) -> &'a dyn EntityRepository<Self>;
    #[doc(hidden)]
    fn assign_id(&mut self, id: EntityId);

    /// Copies the caller-editable columns of a detached instance.
    ///
    /// Identity, ownership and association sets are never copied.
    fn absorb(&mut self, detached: &Self);

    /// Compares the columns an UPDATE would write.
    fn columns_eq(&self, other: &Self) -> bool;

    /// Identities that must exist before this entity can be inserted.
    fn required_refs(&self) -> Vec<EntityKey> {
        Vec::new()
    }

    /// Replays not-yet-flushed join-row changes onto a freshly loaded copy.
    fn apply_links(&mut self, _links: &PendingLinks) {}
}

#[derive(Debug, Default)]
pub struct IdentityMap {
    accounts: BTreeMap<EntityId, Tracked<Account>>,
    posts: BTreeMap<EntityId, Tracked<Post>>,
    roles: BTreeMap<EntityId, Tracked<Role>>,
    profiles: BTreeMap<EntityId, Tracked<Profile>>,
}

impl IdentityMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get<E: Managed>(&self, id: EntityId) -> Option<&E> {
        E::slots(self).get(&id).map(Tracked::current)
    }

    pub fn contains<E: Managed>(&self, id: EntityId) -> bool {
        E::slots(self).contains_key(&id)
    }

    pub fn is_dirty<E: Managed>(&self, id: EntityId) -> bool {
        E::slots(self).get(&id).is_some_and(Tracked::is_dirty)
    }

    pub fn len(&self) -> usize {
        self.accounts.len() + self.posts.len() + self.roles.len() + self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn get_mut<E: Managed>(&mut self, id: EntityId) -> Option<&mut E> {
        E::slots_mut(self).get_mut(&id).map(Tracked::current_mut)
    }

    /// Starts tracking `entity`; an already tracked instance wins.
    pub(crate) fn track<E: Managed>(&mut self, id: EntityId, entity: E) {
        E::slots_mut(self)
            .entry(id)
            .or_insert_with(|| Tracked::new(entity));
    }

    pub(crate) fn evict(&mut self, key: EntityKey) -> bool {
        match key.kind {
            EntityKind::Account => self.accounts.remove(&key.id).is_some(),
            EntityKind::Post => self.posts.remove(&key.id).is_some(),
            EntityKind::Role => self.roles.remove(&key.id).is_some(),
            EntityKind::Profile => self.profiles.remove(&key.id).is_some(),
        }
    }
}

impl Managed for Account {
    fn slots(map: &IdentityMap) -> &BTreeMap<EntityId, Tracked<Self>> {
        &map.accounts
    }

    fn slots_mut(map: &mut IdentityMap) -> &mut BTreeMap<EntityId, Tracked<Self>> {
        &mut map.accounts
    }

    fn repository<'a>(store: &'a SqliteStore<'_>) -> &'a dyn EntityRepository<Self> {
        store
    }

    fn assign_id(&mut self, id: EntityId) {
        self.set_id(id);
    }

    fn absorb(&mut self, detached: &Self) {
        self.username = detached.username.clone();
        self.email = detached.email.clone();
        self.created_at = detached.created_at;
        self.address = detached.address.clone();
    }

    fn columns_eq(&self, other: &Self) -> bool {
        self.username == other.username
            && self.email == other.email
            && self.created_at == other.created_at
            && self.address == other.address
    }

    fn apply_links(&mut self, links: &PendingLinks) {
        if let Some(id) = self.id() {
            links.replay_for_account(id, self.role_ids_mut());
        }
    }
}

impl Managed for Post {
    fn slots(map: &IdentityMap) -> &BTreeMap<EntityId, Tracked<Self>> {
        &map.posts
    }

    fn slots_mut(map: &mut IdentityMap) -> &mut BTreeMap<EntityId, Tracked<Self>> {
        &mut map.posts
    }

    fn repository<'a>(store: &'a SqliteStore<'_>) -> &'a dyn EntityRepository<Self> {
        store
    }

    fn assign_id(&mut self, id: EntityId) {
        self.set_id(id);
    }

    fn absorb(&mut self, detached: &Self) {
        self.title = detached.title.clone();
        self.content = detached.content.clone();
        self.created_at = detached.created_at;
        self.view_count = detached.view_count;
    }

    fn columns_eq(&self, other: &Self) -> bool {
        self.title == other.title
            && self.content == other.content
            && self.created_at == other.created_at
            && self.view_count == other.view_count
    }

    fn required_refs(&self) -> Vec<EntityKey> {
        self.author_id()
            .map(|id| EntityKey::new(EntityKind::Account, id))
            .into_iter()
            .collect()
    }
}

impl Managed for Role {
    fn slots(map: &IdentityMap) -> &BTreeMap<EntityId, Tracked<Self>> {
        &map.roles
    }

    fn slots_mut(map: &mut IdentityMap) -> &mut BTreeMap<EntityId, Tracked<Self>> {
        &mut map.roles
    }

    fn repository<'a>(store: &'a SqliteStore<'_>) -> &'a dyn EntityRepository<Self> {
        store
    }

    fn assign_id(&mut self, id: EntityId) {
        self.set_id(id);
    }

    fn absorb(&mut self, detached: &Self) {
        self.name = detached.name.clone();
        self.description = detached.description.clone();
    }

    fn columns_eq(&self, other: &Self) -> bool {
        self.name == other.name && self.description == other.description
    }

    fn apply_links(&mut self, links: &PendingLinks) {
        if let Some(id) = self.id() {
            links.replay_for_role(id, self.account_ids_mut());
        }
    }
}

impl Managed for Profile {
    fn slots(map: &IdentityMap) -> &BTreeMap<EntityId, Tracked<Self>> {
        &map.profiles
    }

    fn slots_mut(map: &mut IdentityMap) -> &mut BTreeMap<EntityId, Tracked<Self>> {
        &mut map.profiles
    }

    fn repository<'a>(store: &'a SqliteStore<'_>) -> &'a dyn EntityRepository<Self> {
        store
    }

    fn assign_id(&mut self, id: EntityId) {
        self.set_id(id);
    }

    fn absorb(&mut self, detached: &Self) {
        self.first_name = detached.first_name.clone();
        self.last_name = detached.last_name.clone();
        self.phone_number = detached.phone_number.clone();
        self.bio = detached.bio.clone();
    }

    fn columns_eq(&self, other: &Self) -> bool {
        self.first_name == other.first_name
            && self.last_name == other.last_name
            && self.phone_number == other.phone_number
            && self.bio == other.bio
    }

    fn required_refs(&self) -> Vec<EntityKey> {
        self.account_id()
            .map(|id| EntityKey::new(EntityKind::Account, id))
            .into_iter()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::{IdentityMap, Managed};
    use crate::model::post::Post;
    use crate::model::{EntityKey, EntityKind};

    fn managed_post(id: i64) -> Post {
        let mut post = Post::new(1, "title", "body");
        post.assign_id(id);
        post
    }

    #[test]
    fn track_keeps_the_first_instance() {
        let mut map = IdentityMap::new();
        map.track(7, managed_post(7));

        let mut other = managed_post(7);
        other.title = "replacement".to_string();
        map.track(7, other);

        assert_eq!(map.get::<Post>(7).map(|post| post.title.as_str()), Some("title"));
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn column_edits_mark_the_entry_dirty() {
        let mut map = IdentityMap::new();
        map.track(3, managed_post(3));
        assert!(!map.is_dirty::<Post>(3));

        map.get_mut::<Post>(3).unwrap().view_count += 1;
        assert!(map.is_dirty::<Post>(3));
    }

    #[test]
    fn evict_forgets_the_identity() {
        let mut map = IdentityMap::new();
        map.track(3, managed_post(3));
        assert!(map.evict(EntityKey::new(EntityKind::Post, 3)));
        assert!(!map.contains::<Post>(3));
        assert!(map.is_empty());
    }
}
