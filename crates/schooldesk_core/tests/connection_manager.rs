use schooldesk_core::db::manager::ConnectionState;
use schooldesk_core::db::{ConnectionManager, DbTarget, SeedOptions};
use schooldesk_core::{IdentityRepository, RepoError};
use std::sync::Arc;
use std::thread;

fn file_manager(dir: &tempfile::TempDir) -> ConnectionManager {
    ConnectionManager::new(
        DbTarget::File(dir.path().join("school.db")),
        SeedOptions {
            admin_secret: Some("bootstrap-secret".to_string()),
        },
    )
}

#[test]
fn get_before_initialize_fails() {
    let manager = ConnectionManager::new(DbTarget::Memory, SeedOptions::default());

    assert_eq!(manager.connection_state(), ConnectionState::Uninitialized);
    assert!(matches!(manager.get(), Err(RepoError::NotInitialized)));
    assert!(manager.seed_report().is_none());
}

#[test]
fn initialize_twice_returns_the_same_handle() {
    let manager = ConnectionManager::new(DbTarget::Memory, SeedOptions::default());

    let first = manager.initialize().unwrap();
    let second = manager.initialize().unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert!(Arc::ptr_eq(&first, &manager.get().unwrap()));
    assert_eq!(manager.connection_state(), ConnectionState::Ready);
}

#[test]
fn concurrent_initialize_builds_one_handle() {
    let dir = tempfile::tempdir().unwrap();
    let manager = Arc::new(file_manager(&dir));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let manager = Arc::clone(&manager);
            thread::spawn(move || manager.initialize().unwrap())
        })
        .collect();
    let connections: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    for conn in &connections[1..] {
        assert!(Arc::ptr_eq(&connections[0], conn));
    }
    let users = manager.with_repository(|repo| repo.list_users()).unwrap();
    assert_eq!(users.len(), 1);
}

#[test]
fn close_is_terminal_and_idempotent() {
    let manager = ConnectionManager::new(DbTarget::Memory, SeedOptions::default());
    manager.initialize().unwrap();

    manager.close().unwrap();
    manager.close().unwrap();

    assert_eq!(manager.connection_state(), ConnectionState::Closed);
    assert!(matches!(manager.get(), Err(RepoError::Closed)));
    assert!(matches!(manager.initialize(), Err(RepoError::Closed)));
    assert!(matches!(
        manager.with_repository(|repo| repo.list_roles()),
        Err(RepoError::Closed)
    ));
}

#[test]
fn reopening_a_file_database_does_not_reseed() {
    let dir = tempfile::tempdir().unwrap();

    let first = file_manager(&dir);
    first.initialize().unwrap();
    assert_eq!(first.seed_report().unwrap().roles_inserted, 5);
    first.close().unwrap();

    let second = file_manager(&dir);
    second.initialize().unwrap();
    let report = second.seed_report().unwrap();
    assert_eq!(report.roles_inserted, 0);
    assert!(!report.admin_created);

    let (roles, users) = second
        .with_repository(|repo| Ok((repo.list_roles()?.len(), repo.list_users()?.len())))
        .unwrap();
    assert_eq!((roles, users), (5, 1));
}

#[test]
fn schema_is_verified_once_at_initialize() {
    let dir = tempfile::tempdir().unwrap();
    let manager = file_manager(&dir);
    let handle = manager.initialize().unwrap();
    assert_eq!(
        manager
            .with_repository(|repo| repo.list_roles().map(|roles| roles.len()))
            .unwrap(),
        5
    );

    // Routed calls keep working on the verified handle without re-reading
    // the schema version.
    handle
        .lock()
        .unwrap()
        .execute_batch("PRAGMA user_version = 99;")
        .unwrap();
    assert!(manager
        .with_repository(|repo| repo.get_user_by_username("admin"))
        .unwrap()
        .is_some());
    manager.close().unwrap();

    let reopened = file_manager(&dir);
    assert!(reopened.initialize().is_err());
}
