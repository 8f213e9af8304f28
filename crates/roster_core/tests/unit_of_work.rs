use roster_core::{
    open_db_in_memory, Account, Entity, EntityKey, EntityKind, EntityState, Post, Profile,
    RosterService, SessionError, TxMode, UnitOfWork,
};

#[test]
fn repeated_finds_return_one_instance() {
    let mut conn = open_db_in_memory().unwrap();
    let id = RosterService::new(&mut conn)
        .create_account("alice", "alice@example.com")
        .unwrap()
        .id()
        .unwrap();

    let mut uow = UnitOfWork::begin(&mut conn, TxMode::ReadOnly).unwrap();
    let first = uow.find::<Account>(id).unwrap().unwrap() as *const Account;
    let second = uow.find::<Account>(id).unwrap().unwrap() as *const Account;
    assert_eq!(first, second);
    assert_eq!(uow.identity_map().len(), 1);
    assert_eq!(
        uow.state(EntityKey::new(EntityKind::Account, id)),
        Some(EntityState::Managed)
    );
}

#[test]
fn dropping_without_commit_rolls_back_everything() {
    let mut conn = open_db_in_memory().unwrap();
    {
        let mut uow = UnitOfWork::begin(&mut conn, TxMode::ReadWrite).unwrap();
        let account = uow.persist(Account::new("alice", "alice@example.com")).unwrap();
        uow.persist(Post::new(account, "lost", "")).unwrap();
        uow.persist(Profile::new("A", "L", "", "").owned_by(account))
            .unwrap();
    }

    let mut service = RosterService::new(&mut conn);
    assert!(service.list_accounts().unwrap().is_empty());
    assert!(service.list_posts().unwrap().is_empty());
}

#[test]
fn explicit_rollback_discards_edits() {
    let mut conn = open_db_in_memory().unwrap();
    let id = RosterService::new(&mut conn)
        .create_account("alice", "alice@example.com")
        .unwrap()
        .id()
        .unwrap();

    let mut uow = UnitOfWork::begin(&mut conn, TxMode::ReadWrite).unwrap();
    uow.find_mut::<Account>(id).unwrap().unwrap().email = "changed@example.com".to_string();
    uow.flush().unwrap();
    uow.rollback().unwrap();

    let found = RosterService::new(&mut conn).find_account(id).unwrap().unwrap();
    assert_eq!(found.email, "alice@example.com");
}

#[test]
fn dirty_entities_are_written_on_commit() {
    let mut conn = open_db_in_memory().unwrap();
    let id = RosterService::new(&mut conn)
        .create_account("alice", "alice@example.com")
        .unwrap()
        .id()
        .unwrap();

    let mut uow = UnitOfWork::begin(&mut conn, TxMode::ReadWrite).unwrap();
    uow.find_mut::<Account>(id).unwrap().unwrap().email = "changed@example.com".to_string();
    assert!(uow.identity_map().is_dirty::<Account>(id));
    uow.commit().unwrap();

    let found = RosterService::new(&mut conn).find_account(id).unwrap().unwrap();
    assert_eq!(found.email, "changed@example.com");
}

#[test]
fn merge_copies_detached_columns_but_not_identity_fields() {
    let mut conn = open_db_in_memory().unwrap();
    let mut service = RosterService::new(&mut conn);
    let alice = service.create_account("alice", "alice@example.com").unwrap();
    let bob = service.create_account("bob", "bob@example.com").unwrap();
    let post = service
        .create_post(alice.id().unwrap(), "hello", "")
        .unwrap();

    let mut detached = post.clone();
    detached.title = "merged".to_string();
    let mut uow = UnitOfWork::begin(&mut conn, TxMode::ReadWrite).unwrap();
    let merged = uow.merge(detached).unwrap().unwrap();
    assert_eq!(merged.title, "merged");
    assert_eq!(merged.author_id(), alice.id());
    assert_ne!(merged.author_id(), bob.id());
    uow.commit().unwrap();

    let found = RosterService::new(&mut conn)
        .find_post(post.id().unwrap())
        .unwrap()
        .unwrap();
    assert_eq!(found.title, "merged");
}

#[test]
fn merge_of_a_transient_entity_persists_it() {
    let mut conn = open_db_in_memory().unwrap();
    let mut uow = UnitOfWork::begin(&mut conn, TxMode::ReadWrite).unwrap();
    let merged = uow
        .merge(Account::new("alice", "alice@example.com"))
        .unwrap()
        .unwrap();
    assert_eq!(merged.id(), Some(1));
}

#[test]
fn profile_without_owner_is_rejected() {
    let mut conn = open_db_in_memory().unwrap();
    let mut uow = UnitOfWork::begin(&mut conn, TxMode::ReadWrite).unwrap();

    let unowned = uow.persist(Profile::new("A", "L", "", "")).unwrap_err();
    assert_eq!(unowned.to_string(), "profile has no owning account");

    let dangling = uow
        .persist(Profile::new("A", "L", "", "").owned_by(9))
        .unwrap_err();
    assert!(matches!(
        dangling,
        SessionError::DanglingReference {
            kind: EntityKind::Account,
            id: 9
        }
    ));
}

#[test]
fn second_profile_for_one_account_violates_uniqueness() {
    let mut conn = open_db_in_memory().unwrap();
    let mut uow = UnitOfWork::begin(&mut conn, TxMode::ReadWrite).unwrap();
    let account = uow.persist(Account::new("alice", "alice@example.com")).unwrap();
    uow.persist(Profile::new("A", "L", "", "").owned_by(account))
        .unwrap();

    let err = uow
        .persist(Profile::new("B", "M", "", "").owned_by(account))
        .unwrap_err();
    assert_eq!(err.kind(), roster_core::ErrorKind::ConstraintViolation);
}

#[test]
fn account_details_serialize_to_a_stable_shape() {
    let mut conn = open_db_in_memory().unwrap();
    let mut service = RosterService::new(&mut conn);
    let account = service
        .create_account_with_profile(
            "alice",
            "alice@example.com",
            Profile::new("Alice", "Liddell", "555-0100", ""),
        )
        .unwrap();
    let id = account.id().unwrap();
    let role = service.create_role("admin", "").unwrap();
    service.assign_role(id, role.id().unwrap()).unwrap();
    service.create_post(id, "hello", "").unwrap();

    let details = service.account_details(id).unwrap().unwrap();
    let json = serde_json::to_value(&details).unwrap();

    assert_eq!(json["account"]["username"], "alice");
    assert_eq!(json["account"]["role_ids"], serde_json::json!([1]));
    assert_eq!(json["profile"]["first_name"], "Alice");
    assert_eq!(json["roles"][0]["name"], "admin");
    assert_eq!(json["post_count"], 1);
}
