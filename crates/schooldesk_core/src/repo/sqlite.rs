//! Shared plumbing for the SQLite repository implementations.
//!
//! # Invariants
//! - A `SqliteRepository` only wraps connections whose schema is at the
//!   latest version with every table present.
//! - Multi-statement operations run inside one transaction.

use super::{RepoError, RepoResult};
use crate::db::schema::{current_user_version, latest_version, table_exists, TABLES};
use crate::model::{now_ms, RecordId};
use chrono::NaiveDate;
use log::warn;
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection};

/// SQLite-backed implementation of every repository family.
pub struct SqliteRepository<'conn> {
    pub(super) conn: &'conn Connection,
}

impl<'conn> SqliteRepository<'conn> {
    /// Wraps a connection after checking its schema is ready.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn)?;
        Ok(Self { conn })
    }

    /// Wraps a connection whose schema was already checked by its owner.
    pub(crate) fn ready(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    /// Runs `op` in a transaction, rolling back every statement on error.
    pub(super) fn atomically<T>(
        &self,
        op: impl FnOnce(&SqliteRepository<'_>) -> RepoResult<T>,
    ) -> RepoResult<T> {
        let tx = self.conn.unchecked_transaction()?;
        match op(self) {
            Ok(value) => {
                tx.commit()?;
                Ok(value)
            }
            Err(err) => {
                warn!(
                    "event=unit_of_work module=repo status=error action=rollback error={err}"
                );
                // Dropping the transaction rolls it back.
                drop(tx);
                Err(err)
            }
        }
    }
}

fn ensure_connection_ready(conn: &Connection) -> RepoResult<()> {
    let actual_version = current_user_version(conn)?;
    let expected_version = latest_version();
    if actual_version != expected_version {
        return Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }
    for table in TABLES {
        if !table_exists(conn, table)? {
            return Err(RepoError::MissingRequiredTable(table));
        }
    }
    Ok(())
}

/// Collects `SET` assignments for a partial update by id.
pub(super) struct UpdateBuilder {
    table: &'static str,
    assignments: Vec<String>,
    values: Vec<Value>,
}

impl UpdateBuilder {
    pub(super) fn new(table: &'static str) -> Self {
        Self {
            table,
            assignments: Vec::new(),
            values: Vec::new(),
        }
    }

    pub(super) fn set(&mut self, column: &'static str, value: impl Into<Value>) -> &mut Self {
        self.values.push(value.into());
        self.assignments
            .push(format!("{column} = ?{}", self.values.len()));
        self
    }

    /// Applies the update, refreshing `updated_at`, and returns the affected
    /// row count.
    pub(super) fn execute(mut self, conn: &Connection, id: RecordId) -> RepoResult<usize> {
        self.set("updated_at", now_ms());
        self.values.push(Value::Integer(id));
        let sql = format!(
            "UPDATE {} SET {} WHERE id = ?{};",
            self.table,
            self.assignments.join(", "),
            self.values.len()
        );
        Ok(conn.execute(&sql, params_from_iter(self.values))?)
    }
}

pub(super) fn delete_by_id(conn: &Connection, table: &str, id: RecordId) -> RepoResult<usize> {
    Ok(conn.execute(&format!("DELETE FROM {table} WHERE id = ?1;"), [id])?)
}

pub(super) fn date_value(date: NaiveDate) -> Value {
    Value::Text(date.format("%Y-%m-%d").to_string())
}

pub(super) fn invalid_enum(column: &str, value: &str) -> RepoError {
    RepoError::InvalidData(format!("invalid value `{value}` in {column}"))
}

pub(super) fn limit_value(limit: u32) -> i64 {
    i64::from(limit)
}
