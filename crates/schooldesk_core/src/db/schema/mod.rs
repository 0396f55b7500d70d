//! Schema declaration and idempotent creation.
//!
//! # Responsibility
//! - Declare every table, key, default and constraint in dependency order.
//! - Create the schema only when the marker table (`users`) is absent.
//!
//! # Invariants
//! - `version` values must remain monotonic.
//! - Applied version is mirrored to `PRAGMA user_version`.
//! - A partially failed creation leaves no tables behind (single transaction).

use crate::db::{DbError, DbResult};
use log::info;
use rusqlite::Connection;

/// Table whose presence marks an initialized database.
pub const MARKER_TABLE: &str = "users";

/// Tables in creation order.
pub const TABLES: &[&str] = &[
    "roles",
    "users",
    "classes",
    "sections",
    "subjects",
    "teachers",
    "teacher_assignments",
    "students",
    "parents",
    "parent_students",
    "homework",
    "homework_status",
    "attendance",
    "cameras",
    "feeds",
    "ai_search_logs",
    "reports",
];

#[derive(Debug, Clone, Copy)]
struct Migration {
    version: u32,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    sql: include_str!("0001_init.sql"),
}];

/// Returns the latest schema version known by this binary.
pub fn latest_version() -> u32 {
    MIGRATIONS.last().map_or(0, |migration| migration.version)
}

/// Creates all tables unless the marker table already exists.
///
/// Calling this repeatedly is a no-op after the first success.
pub fn ensure_schema(conn: &mut Connection) -> DbResult<()> {
    let current_version = current_user_version(conn)?;
    let latest = latest_version();

    if current_version > latest {
        return Err(DbError::UnsupportedSchemaVersion {
            db_version: current_version,
            latest_supported: latest,
        });
    }

    if table_exists(conn, MARKER_TABLE)? {
        return Ok(());
    }

    let tx = conn.transaction()?;
    for migration in MIGRATIONS {
        tx.execute_batch(migration.sql)?;
        tx.execute_batch(&format!("PRAGMA user_version = {};", migration.version))?;
    }
    tx.commit()?;

    info!(
        "event=schema_ensure module=db status=ok created_tables={} version={latest}",
        TABLES.len()
    );
    Ok(())
}

pub(crate) fn current_user_version(conn: &Connection) -> DbResult<u32> {
    let version = conn.query_row("PRAGMA user_version;", [], |row| row.get::<_, u32>(0))?;
    Ok(version)
}

pub(crate) fn table_exists(conn: &Connection, table: &str) -> DbResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}
