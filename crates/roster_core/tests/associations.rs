use roster_core::session::LinkOp;
use roster_core::{
    open_db_in_memory, Account, Entity, EntityKind, ErrorKind, Role, RosterService,
    SessionError, TxMode, UnitOfWork,
};

fn seed(service: &mut RosterService<'_>) -> (i64, i64) {
    let account_id = service
        .create_account("alice", "alice@example.com")
        .unwrap()
        .id()
        .unwrap();
    let role_id = service.create_role("admin", "").unwrap().id().unwrap();
    (account_id, role_id)
}

#[test]
fn attach_updates_both_sides_in_memory_and_in_the_store() {
    let mut conn = open_db_in_memory().unwrap();
    let (account_id, role_id) = seed(&mut RosterService::new(&mut conn));

    let mut uow = UnitOfWork::begin(&mut conn, TxMode::ReadWrite).unwrap();
    assert!(uow.attach(account_id, role_id).unwrap());
    assert!(uow.find::<Account>(account_id).unwrap().unwrap().has_role(role_id));
    assert!(uow.find::<Role>(role_id).unwrap().unwrap().has_account(account_id));
    assert_eq!(uow.pending_links().get(account_id, role_id), Some(LinkOp::Insert));
    uow.commit().unwrap();

    let mut service = RosterService::new(&mut conn);
    let account = service.find_account(account_id).unwrap().unwrap();
    let role = service.find_role(role_id).unwrap().unwrap();
    assert!(account.has_role(role_id));
    assert!(role.has_account(account_id));
}

#[test]
fn detach_clears_both_sides() {
    let mut conn = open_db_in_memory().unwrap();
    let mut service = RosterService::new(&mut conn);
    let (account_id, role_id) = seed(&mut service);
    assert!(service.assign_role(account_id, role_id).unwrap());

    assert!(service.revoke_role(account_id, role_id).unwrap());

    let account = service.find_account(account_id).unwrap().unwrap();
    let role = service.find_role(role_id).unwrap().unwrap();
    assert!(!account.has_role(role_id));
    assert!(!role.has_account(account_id));
}

#[test]
fn detaching_twice_is_the_same_as_detaching_once() {
    let mut conn = open_db_in_memory().unwrap();
    let mut service = RosterService::new(&mut conn);
    let (account_id, role_id) = seed(&mut service);
    service.assign_role(account_id, role_id).unwrap();

    assert!(service.revoke_role(account_id, role_id).unwrap());
    assert!(!service.revoke_role(account_id, role_id).unwrap());

    let details = service.account_details(account_id).unwrap().unwrap();
    assert!(details.roles.is_empty());
}

#[test]
fn attaching_twice_writes_one_join_row() {
    let mut conn = open_db_in_memory().unwrap();
    let mut service = RosterService::new(&mut conn);
    let (account_id, role_id) = seed(&mut service);

    assert!(service.assign_role(account_id, role_id).unwrap());
    assert!(!service.assign_role(account_id, role_id).unwrap());

    let rows: i64 = conn
        .query_row("SELECT COUNT(*) FROM account_roles;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(rows, 1);
}

#[test]
fn attach_then_detach_in_one_transaction_writes_nothing() {
    let mut conn = open_db_in_memory().unwrap();
    let (account_id, role_id) = seed(&mut RosterService::new(&mut conn));

    let mut uow = UnitOfWork::begin(&mut conn, TxMode::ReadWrite).unwrap();
    uow.attach(account_id, role_id).unwrap();
    uow.detach(account_id, role_id).unwrap();
    assert!(uow.pending_links().is_empty());
    uow.commit().unwrap();

    let rows: i64 = conn
        .query_row("SELECT COUNT(*) FROM account_roles;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(rows, 0);
}

#[test]
fn missing_endpoints_are_dangling_references() {
    let mut conn = open_db_in_memory().unwrap();
    let mut service = RosterService::new(&mut conn);
    let (account_id, role_id) = seed(&mut service);

    let missing_role = service.assign_role(account_id, 99).unwrap_err();
    assert_eq!(missing_role.kind(), ErrorKind::DanglingReference);
    assert!(matches!(
        missing_role,
        SessionError::DanglingReference {
            kind: EntityKind::Role,
            id: 99
        }
    ));

    let missing_account = service.revoke_role(99, role_id).unwrap_err();
    assert_eq!(missing_account.kind(), ErrorKind::DanglingReference);
}

#[test]
fn role_queries_follow_the_association() {
    let mut conn = open_db_in_memory().unwrap();
    let mut service = RosterService::new(&mut conn);
    let (alice, admin) = seed(&mut service);
    let bob = service
        .create_account("bob", "bob@example.com")
        .unwrap()
        .id()
        .unwrap();
    let viewer = service.create_role("viewer", "").unwrap().id().unwrap();
    service.assign_role(alice, admin).unwrap();
    service.assign_role(alice, viewer).unwrap();
    service.assign_role(bob, viewer).unwrap();

    let mut uow = UnitOfWork::begin(&mut conn, TxMode::ReadOnly).unwrap();
    let alice_roles: Vec<i64> = uow
        .roles_of(alice)
        .unwrap()
        .into_iter()
        .filter_map(|role| role.id())
        .collect();
    assert_eq!(alice_roles, vec![admin, viewer]);

    let viewers: Vec<String> = uow
        .accounts_with_role(viewer)
        .unwrap()
        .into_iter()
        .map(|account| account.username.clone())
        .collect();
    assert_eq!(viewers, vec!["alice", "bob"]);
}

#[test]
fn read_only_transactions_reject_association_changes() {
    let mut conn = open_db_in_memory().unwrap();
    let (account_id, role_id) = seed(&mut RosterService::new(&mut conn));

    let mut uow = UnitOfWork::begin(&mut conn, TxMode::ReadOnly).unwrap();
    let err = uow.attach(account_id, role_id).unwrap_err();
    assert!(matches!(err, SessionError::ReadOnlyTransaction));
    assert_eq!(err.kind(), ErrorKind::Internal);
}
