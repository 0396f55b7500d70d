use rusqlite::Connection;
use schooldesk_core::db::schema::{ensure_schema, latest_version, TABLES};
use schooldesk_core::db::{open_db, open_db_in_memory, DbError};

#[test]
fn open_db_in_memory_declares_every_table() {
    let conn = open_db_in_memory().unwrap();

    assert_eq!(schema_version(&conn), latest_version());
    for table in TABLES {
        assert_table_exists(&conn, table);
    }
}

#[test]
fn opening_same_database_twice_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("school.db");

    let conn_first = open_db(&path).unwrap();
    conn_first
        .execute(
            "INSERT INTO classes (name, academic_year, board) VALUES ('Grade 1', '2024-2025', 'CBSE')",
            [],
        )
        .unwrap();
    drop(conn_first);

    let mut conn_second = open_db(&path).unwrap();
    ensure_schema(&mut conn_second).unwrap();
    assert_eq!(schema_version(&conn_second), latest_version());
    assert_eq!(count(&conn_second, "classes"), 1);
}

#[test]
fn opening_database_with_newer_schema_version_returns_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("future.db");

    let conn = Connection::open(&path).unwrap();
    conn.execute_batch("PRAGMA user_version = 999;").unwrap();
    drop(conn);

    let err = open_db(&path).unwrap_err();
    match err {
        DbError::UnsupportedSchemaVersion {
            db_version,
            latest_supported,
        } => {
            assert_eq!(db_version, 999);
            assert_eq!(latest_supported, latest_version());
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn foreign_keys_are_enforced() {
    let conn = open_db_in_memory().unwrap();

    let err = conn
        .execute("INSERT INTO sections (class_id, name) VALUES (42, 'A')", [])
        .unwrap_err();
    assert!(err.to_string().contains("FOREIGN KEY"), "{err}");
}

#[test]
fn subjectless_assignments_are_unique() {
    let conn = open_db_in_memory().unwrap();
    conn.execute_batch(
        "INSERT INTO roles (name, permissions) VALUES ('Teacher', '{}');
         INSERT INTO users (username, password_hash, email, role_id, first_name, last_name)
             VALUES ('t1', 'x', 't1@school.com', 1, 'Tara', 'Iyer');
         INSERT INTO teachers (user_id) VALUES (1);
         INSERT INTO classes (name, academic_year, board) VALUES ('Grade 5', '2024-2025', 'CBSE');
         INSERT INTO sections (class_id, name) VALUES (1, 'A');
         INSERT INTO teacher_assignments (teacher_id, class_id, section_id) VALUES (1, 1, 1);",
    )
    .unwrap();

    let err = conn
        .execute(
            "INSERT INTO teacher_assignments (teacher_id, class_id, section_id) VALUES (1, 1, 1)",
            [],
        )
        .unwrap_err();
    assert!(err.to_string().contains("UNIQUE"), "{err}");
}

fn schema_version(conn: &Connection) -> u32 {
    conn.query_row("PRAGMA user_version;", [], |row| row.get(0))
        .unwrap()
}

fn count(conn: &Connection, table: &str) -> i64 {
    conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))
        .unwrap()
}

fn assert_table_exists(conn: &Connection, table_name: &str) {
    let exists: i64 = conn
        .query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM sqlite_master
                WHERE type = 'table' AND name = ?1
            );",
            [table_name],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(exists, 1, "table {table_name} does not exist");
}
