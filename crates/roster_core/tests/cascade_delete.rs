use roster_core::{
    open_db_in_memory, Account, AccountGraph, Entity, EntityKind, ErrorKind, Post, Profile, Role,
    RoleRef, RosterService, SessionError, TxMode, UnitOfWork,
};
use rusqlite::Connection;

fn count(conn: &Connection, table: &str) -> i64 {
    conn.query_row(&format!("SELECT COUNT(*) FROM {table};"), [], |row| {
        row.get(0)
    })
    .unwrap()
}

#[test]
fn deleting_an_account_removes_profile_and_posts_but_keeps_roles() {
    let mut conn = open_db_in_memory().unwrap();
    let mut service = RosterService::new(&mut conn);

    let account = service
        .create_account_with_profile(
            "alice",
            "alice@example.com",
            Profile::new("Alice", "Liddell", "", ""),
        )
        .unwrap();
    let account_id = account.id().unwrap();
    let first = service.create_post(account_id, "one", "").unwrap();
    let second = service.create_post(account_id, "two", "").unwrap();
    let role = service.create_role("admin", "full access").unwrap();
    let role_id = role.id().unwrap();
    service.assign_role(account_id, role_id).unwrap();

    assert!(service.delete_account(account_id).unwrap());

    assert!(service.find_account(account_id).unwrap().is_none());
    assert!(service.find_post(first.id().unwrap()).unwrap().is_none());
    assert!(service.find_post(second.id().unwrap()).unwrap().is_none());
    let kept = service.find_role(role_id).unwrap().unwrap();
    assert!(kept.account_ids().is_empty());

    assert_eq!(count(&conn, "profiles"), 0);
    assert_eq!(count(&conn, "posts"), 0);
    assert_eq!(count(&conn, "account_roles"), 0);
    assert_eq!(count(&conn, "roles"), 1);
}

#[test]
fn deleting_one_account_leaves_other_accounts_untouched() {
    let mut conn = open_db_in_memory().unwrap();
    let mut service = RosterService::new(&mut conn);
    let alice = service.create_account("alice", "a@example.com").unwrap();
    let bob = service.create_account("bob", "b@example.com").unwrap();
    let bob_post = service
        .create_post(bob.id().unwrap(), "bob's post", "")
        .unwrap();
    service
        .create_post(alice.id().unwrap(), "alice's post", "")
        .unwrap();

    service.delete_account(alice.id().unwrap()).unwrap();

    let remaining = service.list_posts().unwrap();
    assert_eq!(remaining, vec![bob_post]);
}

#[test]
fn alice_scenario() {
    let mut conn = open_db_in_memory().unwrap();
    let mut service = RosterService::new(&mut conn);

    let alice = service.create_account("alice", "a@x.io").unwrap();
    assert_eq!(alice.id(), Some(1));

    let post = service.create_post(1, "Hello", "World").unwrap();
    assert_eq!(post.id(), Some(1));
    assert_eq!(post.author_id(), Some(1));

    assert!(service.delete_account(1).unwrap());
    assert!(service.find_post(1).unwrap().is_none());
}

#[test]
fn account_graph_persists_every_dependent() {
    let mut conn = open_db_in_memory().unwrap();
    let mut service = RosterService::new(&mut conn);
    let existing = service.create_role("reader", "").unwrap().id().unwrap();

    let graph = AccountGraph::new(Account::new("carol", "carol@example.com"))
        .with_profile(Profile::new("Carol", "King", "", ""))
        .with_post(Post::draft("draft one", "body"))
        .with_post(Post::draft("draft two", "body"))
        .with_role(RoleRef::Cascaded(Role::new("writer", "")))
        .with_role(RoleRef::Existing(existing))
        .with_role(RoleRef::Existing(existing));
    let account = service.create_account_graph(graph).unwrap();
    let account_id = account.id().unwrap();

    let details = service.account_details(account_id).unwrap().unwrap();
    assert!(details.profile.is_some());
    assert_eq!(details.post_count, 2);
    let names: Vec<&str> = details.roles.iter().map(|role| role.name.as_str()).collect();
    assert_eq!(names, vec!["reader", "writer"]);
    assert_eq!(account.role_ids().len(), 2);
    assert_eq!(count(&conn, "account_roles"), 2);
}

#[test]
fn graph_with_missing_role_is_rejected_as_a_whole() {
    let mut conn = open_db_in_memory().unwrap();
    let mut service = RosterService::new(&mut conn);

    let graph = AccountGraph::new(Account::new("dave", "dave@example.com"))
        .with_post(Post::draft("never stored", ""))
        .with_role(RoleRef::Existing(404));
    let err = service.create_account_graph(graph).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::DanglingReference);
    assert!(service.list_accounts().unwrap().is_empty());
    assert_eq!(count(&conn, "posts"), 0);
}

#[test]
fn merge_graph_updates_the_account_and_adds_new_dependents() {
    let mut conn = open_db_in_memory().unwrap();
    let account = RosterService::new(&mut conn)
        .create_account("erin", "erin@example.com")
        .unwrap();
    let account_id = account.id().unwrap();

    let mut detached = account.clone();
    detached.email = "erin@new.example".to_string();
    let graph = AccountGraph::new(detached)
        .with_post(Post::draft("added by merge", ""))
        .with_role(RoleRef::Cascaded(Role::new("editor", "")));

    let mut uow = UnitOfWork::begin(&mut conn, TxMode::ReadWrite).unwrap();
    assert_eq!(uow.merge_graph(graph).unwrap(), Some(account_id));
    uow.commit().unwrap();

    let mut service = RosterService::new(&mut conn);
    let details = service.account_details(account_id).unwrap().unwrap();
    assert_eq!(details.account.email, "erin@new.example");
    assert_eq!(details.post_count, 1);
    assert_eq!(details.roles.len(), 1);
}

#[test]
fn merging_a_deleted_account_reports_absence() {
    let mut conn = open_db_in_memory().unwrap();
    let mut service = RosterService::new(&mut conn);
    let snapshot = service.create_account("frank", "frank@example.com").unwrap();
    service.delete_account(snapshot.id().unwrap()).unwrap();

    let mut uow = UnitOfWork::begin(&mut conn, TxMode::ReadWrite).unwrap();
    assert!(uow.merge(snapshot.clone()).unwrap().is_none());
    assert_eq!(uow.merge_graph(AccountGraph::new(snapshot)).unwrap(), None);
}

#[test]
fn deleting_a_post_keeps_its_author() {
    let mut conn = open_db_in_memory().unwrap();
    let mut service = RosterService::new(&mut conn);
    let author = service.create_account("gina", "gina@example.com").unwrap();
    let post = service.create_post(author.id().unwrap(), "bye", "").unwrap();

    assert!(service.delete_post(post.id().unwrap()).unwrap());
    assert!(!service.delete_post(post.id().unwrap()).unwrap());
    assert!(service.find_account(author.id().unwrap()).unwrap().is_some());
}

#[test]
fn role_held_by_an_account_cannot_be_deleted() {
    let mut conn = open_db_in_memory().unwrap();
    let mut service = RosterService::new(&mut conn);
    let account_id = service
        .create_account("hank", "hank@example.com")
        .unwrap()
        .id()
        .unwrap();
    let role_id = service.create_role("ops", "").unwrap().id().unwrap();
    service.assign_role(account_id, role_id).unwrap();

    let err = service.delete_role(role_id).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ConstraintViolation);
    assert!(service.find_role(role_id).unwrap().is_some());

    service.revoke_role(account_id, role_id).unwrap();
    assert!(service.delete_role(role_id).unwrap());
    assert!(service.find_role(role_id).unwrap().is_none());
}

#[test]
fn merge_graph_with_a_deleted_post_is_a_dangling_reference() {
    let mut conn = open_db_in_memory().unwrap();
    let mut service = RosterService::new(&mut conn);
    let account = service.create_account("ivy", "ivy@example.com").unwrap();
    let post = service.create_post(account.id().unwrap(), "gone", "").unwrap();
    let post_id = post.id().unwrap();
    service.delete_post(post_id).unwrap();

    let mut stale = post;
    stale.title = "edited".to_string();
    let mut uow = UnitOfWork::begin(&mut conn, TxMode::ReadWrite).unwrap();
    let err = uow
        .merge_graph(AccountGraph::new(account).with_post(stale))
        .unwrap_err();
    assert!(matches!(
        err,
        SessionError::DanglingReference {
            kind: EntityKind::Post,
            id
        } if id == post_id
    ));
    drop(uow);

    assert_eq!(count(&conn, "posts"), 0);
}

#[test]
fn merge_graph_with_a_deleted_profile_is_a_dangling_reference() {
    let mut conn = open_db_in_memory().unwrap();
    let account = RosterService::new(&mut conn)
        .create_account_with_profile(
            "jon",
            "jon@example.com",
            Profile::new("Jon", "Doe", "", ""),
        )
        .unwrap();
    let account_id = account.id().unwrap();
    let profile = RosterService::new(&mut conn)
        .account_details(account_id)
        .unwrap()
        .unwrap()
        .profile
        .unwrap();
    conn.execute("DELETE FROM profiles;", []).unwrap();

    let mut uow = UnitOfWork::begin(&mut conn, TxMode::ReadWrite).unwrap();
    let err = uow
        .merge_graph(AccountGraph::new(account).with_profile(profile))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DanglingReference);
}

#[test]
fn merge_graph_rejects_dependents_owned_by_another_account() {
    let mut conn = open_db_in_memory().unwrap();
    let mut service = RosterService::new(&mut conn);
    let kim = service.create_account("kim", "kim@example.com").unwrap();
    let lee = service.create_account("lee", "lee@example.com").unwrap();
    let lee_post = service
        .create_post(lee.id().unwrap(), "lee's post", "original")
        .unwrap();

    let mut hijacked = lee_post.clone();
    hijacked.content = "rewritten".to_string();
    let mut uow = UnitOfWork::begin(&mut conn, TxMode::ReadWrite).unwrap();
    let err = uow
        .merge_graph(AccountGraph::new(kim).with_post(hijacked))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ConstraintViolation);
    assert!(matches!(err, SessionError::ForeignDependent { .. }));
    drop(uow);

    let kept = RosterService::new(&mut conn)
        .find_post(lee_post.id().unwrap())
        .unwrap()
        .unwrap();
    assert_eq!(kept.content, "original");
}
