//! Process-wide SQLite connection lifecycle.
//!
//! # Responsibility
//! - Own the single connection handle of a deployment.
//! - Run schema creation and the seed loader exactly once, on first
//!   `initialize()`.
//!
//! # Invariants
//! - Lifecycle is `Uninitialized -> Ready -> Closed`; `Closed` is terminal.
//! - Concurrent `initialize()` calls construct at most one handle; later
//!   callers receive the same handle.
//! - `get()` outside `Ready` fails with `NotInitialized` or `Closed`.

use super::seed::{ensure_seed, SeedOptions, SeedReport};
use super::{open_db, open_db_in_memory};
use crate::repo::{RepoError, RepoResult, SqliteRepository};
use log::{error, info};
use once_cell::sync::OnceCell;
use rusqlite::Connection;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

/// Shared handle to the one connection owned by a [`ConnectionManager`].
pub type SqliteHandle = Arc<Mutex<Connection>>;

const MEMORY_TARGET: &str = ":memory:";

/// Where the SQLite database lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DbTarget {
    File(PathBuf),
    Memory,
}

impl DbTarget {
    /// Parses a path, treating `:memory:` as an in-memory database.
    pub fn from_path(path: &str) -> Self {
        if path == MEMORY_TARGET {
            Self::Memory
        } else {
            Self::File(PathBuf::from(path))
        }
    }

    fn mode(&self) -> &'static str {
        match self {
            Self::File(_) => "file",
            Self::Memory => "memory",
        }
    }
}

/// Observable lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Uninitialized,
    Ready,
    Closed,
}

enum ManagerState {
    Uninitialized,
    Ready(SqliteHandle),
    Closed,
}

/// Lazily opens and owns the deployment's SQLite connection.
pub struct ConnectionManager {
    target: DbTarget,
    seed: SeedOptions,
    state: Mutex<ManagerState>,
    seed_report: OnceCell<SeedReport>,
}

impl ConnectionManager {
    pub fn new(target: DbTarget, seed: SeedOptions) -> Self {
        Self {
            target,
            seed,
            state: Mutex::new(ManagerState::Uninitialized),
            seed_report: OnceCell::new(),
        }
    }

    pub fn target(&self) -> &DbTarget {
        &self.target
    }

    pub fn connection_state(&self) -> ConnectionState {
        match self.lock_state().as_deref() {
            Ok(ManagerState::Uninitialized) => ConnectionState::Uninitialized,
            Ok(ManagerState::Ready(_)) => ConnectionState::Ready,
            Ok(ManagerState::Closed) | Err(_) => ConnectionState::Closed,
        }
    }

    /// Opens the connection, ensures schema and seed, and returns the handle.
    ///
    /// Calling this again while `Ready` returns the existing handle without
    /// touching the database.
    ///
    /// # Errors
    /// - `Closed` after `close()`.
    /// - Open, schema or seed failures; the manager stays `Uninitialized`.
    pub fn initialize(&self) -> RepoResult<SqliteHandle> {
        let mut state = self.lock_state()?;
        match &*state {
            ManagerState::Ready(handle) => return Ok(Arc::clone(handle)),
            ManagerState::Closed => return Err(RepoError::Closed),
            ManagerState::Uninitialized => {}
        }

        let started_at = Instant::now();
        let mode = self.target.mode();
        info!("event=conn_init module=db status=start mode={mode}");
        match self.bootstrap() {
            Ok(conn) => {
                let handle = Arc::new(Mutex::new(conn));
                *state = ManagerState::Ready(Arc::clone(&handle));
                info!(
                    "event=conn_init module=db status=ok mode={mode} duration_ms={}",
                    started_at.elapsed().as_millis()
                );
                Ok(handle)
            }
            Err(err) => {
                error!(
                    "event=conn_init module=db status=error mode={mode} duration_ms={} error={err}",
                    started_at.elapsed().as_millis()
                );
                Err(err)
            }
        }
    }

    fn bootstrap(&self) -> RepoResult<Connection> {
        let conn = match &self.target {
            DbTarget::File(path) => open_db(path)?,
            DbTarget::Memory => open_db_in_memory()?,
        };
        let report = {
            let tx = conn.unchecked_transaction()?;
            let report = ensure_seed(&SqliteRepository::try_new(&conn)?, &self.seed)?;
            tx.commit()?;
            report
        };
        // First successful bootstrap wins; the manager never bootstraps twice.
        let _ = self.seed_report.set(report);
        Ok(conn)
    }

    /// Returns the live handle.
    pub fn get(&self) -> RepoResult<SqliteHandle> {
        match &*self.lock_state()? {
            ManagerState::Ready(handle) => Ok(Arc::clone(handle)),
            ManagerState::Uninitialized => Err(RepoError::NotInitialized),
            ManagerState::Closed => Err(RepoError::Closed),
        }
    }

    /// Runs `op` with a repository bound to the live connection. The schema
    /// was verified by `initialize()`, so no per-call check runs.
    pub fn with_repository<T>(
        &self,
        op: impl FnOnce(&SqliteRepository<'_>) -> RepoResult<T>,
    ) -> RepoResult<T> {
        let handle = self.get()?;
        let conn = handle.lock().map_err(|_| RepoError::LockPoisoned)?;
        op(&SqliteRepository::ready(&conn))
    }

    /// Outcome of the seed run performed by `initialize()`.
    pub fn seed_report(&self) -> Option<&SeedReport> {
        self.seed_report.get()
    }

    /// Releases the handle and moves to `Closed`. Closing twice is a no-op.
    pub fn close(&self) -> RepoResult<()> {
        let mut state = self.lock_state()?;
        let previous = std::mem::replace(&mut *state, ManagerState::Closed);
        if let ManagerState::Ready(handle) = previous {
            drop(handle);
            info!(
                "event=conn_close module=db status=ok mode={}",
                self.target.mode()
            );
        }
        Ok(())
    }

    fn lock_state(&self) -> RepoResult<MutexGuard<'_, ManagerState>> {
        self.state.lock().map_err(|_| RepoError::LockPoisoned)
    }
}
