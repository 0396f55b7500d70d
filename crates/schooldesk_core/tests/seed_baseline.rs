use schooldesk_core::credential::verify_password;
use schooldesk_core::db::seed::{
    ADMIN_EMAIL, ADMIN_ROLE, ADMIN_USERNAME, CCTV_OPERATOR_ROLE, STUDENT_ROLE, TEACHER_ROLE,
};
use schooldesk_core::db::{ensure_seed, open_db_in_memory, SeedOptions};
use schooldesk_core::mirror::{MemorySnapshotStore, MirrorOptions, MirrorStore};
use schooldesk_core::repo::SqliteRepository;
use schooldesk_core::IdentityRepository;

#[test]
fn seed_inserts_baseline_roles_and_admin() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteRepository::try_new(&conn).unwrap();

    let report = ensure_seed(
        &repo,
        &SeedOptions {
            admin_secret: Some("bootstrap-secret".to_string()),
        },
    )
    .unwrap();
    assert_eq!(report.roles_inserted, 5);
    assert!(report.admin_created);
    assert!(report.generated_admin_secret.is_none());

    let admin = repo.get_user_by_username(ADMIN_USERNAME).unwrap().unwrap();
    assert_eq!(admin.email, ADMIN_EMAIL);
    assert!(!admin.must_change_password);
    assert!(verify_password(&admin.password_hash, "bootstrap-secret"));

    let role = repo.get_role(admin.role_id).unwrap().unwrap();
    assert_eq!(role.name, ADMIN_ROLE);
    assert!(role.permissions.allows("users", "delete"));
    assert!(role.permissions.allows("camera", "search"));
    assert!(!role.permissions.allows("camera", "delete"));
}

#[test]
fn role_permission_documents_follow_responsibilities() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteRepository::try_new(&conn).unwrap();
    ensure_seed(&repo, &SeedOptions::default()).unwrap();

    let teacher = repo.get_role_by_name(TEACHER_ROLE).unwrap().unwrap();
    assert!(teacher.permissions.allows("attendance", "create"));
    assert!(!teacher.permissions.allows("users", "update"));

    let student = repo.get_role_by_name(STUDENT_ROLE).unwrap().unwrap();
    assert!(student.permissions.allows("homework", "read"));
    assert!(!student.permissions.allows("homework", "update"));

    let operator = repo.get_role_by_name(CCTV_OPERATOR_ROLE).unwrap().unwrap();
    assert!(operator.permissions.allows("camera", "update"));
    assert!(operator.permissions.allows("reports", "create"));
}

#[test]
fn seed_without_secret_generates_one_and_forces_rotation() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteRepository::try_new(&conn).unwrap();

    let report = ensure_seed(&repo, &SeedOptions::default()).unwrap();
    let secret = report.generated_admin_secret.clone().unwrap();

    let admin = repo.get_user_by_username(ADMIN_USERNAME).unwrap().unwrap();
    assert!(admin.must_change_password);
    assert!(verify_password(&admin.password_hash, &secret));
    assert!(!format!("{report:?}").contains(&secret));
}

#[test]
fn seed_is_idempotent() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteRepository::try_new(&conn).unwrap();

    ensure_seed(&repo, &SeedOptions::default()).unwrap();
    let roles = repo.list_roles().unwrap();
    let users = repo.list_users().unwrap();

    for _ in 0..3 {
        let report = ensure_seed(&repo, &SeedOptions::default()).unwrap();
        assert_eq!(report.roles_inserted, 0);
        assert!(!report.admin_created);
        assert!(report.generated_admin_secret.is_none());
    }
    assert_eq!(repo.list_roles().unwrap(), roles);
    assert_eq!(repo.list_users().unwrap(), users);
}

#[test]
fn seed_skips_admin_when_admin_role_is_missing() {
    let conn = open_db_in_memory().unwrap();
    conn.execute(
        "INSERT INTO roles (name, permissions) VALUES ('Librarian', '{}')",
        [],
    )
    .unwrap();
    let repo = SqliteRepository::try_new(&conn).unwrap();

    let report = ensure_seed(&repo, &SeedOptions::default()).unwrap();
    assert_eq!(report.roles_inserted, 0);
    assert!(!report.admin_created);
    assert!(repo.list_users().unwrap().is_empty());
}

#[test]
fn mirror_seeds_the_same_baseline() {
    let mirror = MirrorStore::open(
        MemorySnapshotStore::new(),
        MirrorOptions {
            demo_fixtures: false,
            ..MirrorOptions::default()
        },
    )
    .unwrap();

    let names: Vec<String> = mirror
        .list_roles()
        .unwrap()
        .into_iter()
        .map(|role| role.name)
        .collect();
    assert_eq!(
        names,
        vec!["Admin", "Teacher", "Student", "Parent", "CCTV Operator"]
    );
    assert!(mirror.seed_report().admin_created);
    assert!(mirror.seed_report().generated_admin_secret.is_some());
}
