//! In-process mirror backend.
//!
//! # Responsibility
//! - Implement every repository family over ordered in-memory tables.
//! - Persist mutations through a `SnapshotStore` journal with periodic
//!   full snapshots, and restore from them at startup.
//!
//! # Invariants
//! - Observable behavior matches the SQLite backend: same ids, same
//!   constraint failures, same ordering.
//! - A mutation returns only after its journal entries are durable; a
//!   journal failure rolls the mutation back and is returned as an error.
//! - All access is serialized through one lock.

mod academic_repo;
mod attendance_repo;
mod camera_repo;
mod homework_repo;
mod identity_repo;
pub mod snapshot;
mod state;

use crate::db::{ensure_seed, SeedOptions, SeedReport};
use crate::fixtures::load_demo_fixtures;
use crate::repo::{RepoError, RepoResult};
use log::{error, info, warn};
use state::{MirrorState, Tx};
use std::sync::{Mutex, MutexGuard};
use std::time::Instant;

pub use snapshot::{
    Change, FileSnapshotStore, MemorySnapshotStore, Record, Snapshot, SnapshotError,
    SnapshotStore, Table,
};

/// Journal entries written before a full snapshot replaces them.
pub const DEFAULT_COMPACT_EVERY: usize = 256;

/// Startup and persistence options for [`MirrorStore`].
#[derive(Debug, Clone)]
pub struct MirrorOptions {
    /// Journal entries between full snapshots. Values below 1 count as 1.
    pub compact_every: usize,
    /// Load demo fixtures into a fresh store.
    pub demo_fixtures: bool,
    pub seed: SeedOptions,
}

impl Default for MirrorOptions {
    fn default() -> Self {
        Self {
            compact_every: DEFAULT_COMPACT_EVERY,
            demo_fixtures: true,
            seed: SeedOptions::default(),
        }
    }
}

/// Mirror backend handle. Implements every repository trait.
pub struct MirrorStore {
    inner: Mutex<MirrorInner>,
    seed_report: SeedReport,
}

struct MirrorInner {
    state: MirrorState,
    store: Box<dyn SnapshotStore>,
    journaled: usize,
    compact_every: usize,
    closed: bool,
}

impl MirrorStore {
    /// Restores state from `store` and runs the seed loader.
    ///
    /// A store holding neither snapshot nor journal is treated as fresh: the
    /// baseline (seed plus optional demo fixtures) is built and written as
    /// the first snapshot.
    ///
    /// # Side effects
    /// - Emits `mirror_restore` events with duration and status.
    pub fn open(store: impl SnapshotStore + 'static, options: MirrorOptions) -> RepoResult<Self> {
        let started_at = Instant::now();
        info!("event=mirror_restore module=mirror status=start");
        match Self::restore(Box::new(store), &options) {
            Ok((mirror, fresh, replayed)) => {
                info!(
                    "event=mirror_restore module=mirror status=ok fresh={fresh} replayed={replayed} duration_ms={}",
                    started_at.elapsed().as_millis()
                );
                Ok(mirror)
            }
            Err(err) => {
                error!(
                    "event=mirror_restore module=mirror status=error duration_ms={} error={err}",
                    started_at.elapsed().as_millis()
                );
                Err(err)
            }
        }
    }

    fn restore(
        store: Box<dyn SnapshotStore>,
        options: &MirrorOptions,
    ) -> RepoResult<(Self, bool, usize)> {
        let snapshot = store.load_snapshot()?;
        let journal = store.load_journal()?;
        let fresh = snapshot.is_none() && journal.is_empty();

        let mut state = match snapshot {
            Some(snapshot) => MirrorState::from_snapshot(snapshot)?,
            None => MirrorState::default(),
        };
        let replayed = journal.len();
        for change in journal {
            state.replay(change);
        }

        let mut mirror = Self {
            inner: Mutex::new(MirrorInner {
                state,
                store,
                journaled: replayed,
                compact_every: options.compact_every.max(1),
                closed: false,
            }),
            seed_report: SeedReport::default(),
        };
        mirror.seed_report = ensure_seed(&mirror, &options.seed)?;
        if fresh {
            if options.demo_fixtures {
                load_demo_fixtures(&mirror)?;
            }
            mirror.flush()?;
        }
        Ok((mirror, fresh, replayed))
    }

    /// Outcome of the seed loader run at open.
    pub fn seed_report(&self) -> &SeedReport {
        &self.seed_report
    }

    /// Writes a full snapshot and clears the journal.
    pub fn flush(&self) -> RepoResult<()> {
        let mut inner = self.lock()?;
        if inner.closed {
            return Err(RepoError::Closed);
        }
        inner.compact()?;
        Ok(())
    }

    /// Flushes and rejects every later call with `RepoError::Closed`.
    /// Closing twice is a no-op.
    pub fn close(&self) -> RepoResult<()> {
        let mut inner = self.lock()?;
        if inner.closed {
            return Ok(());
        }
        inner.compact()?;
        inner.closed = true;
        info!(
            "event=conn_close module=mirror status=ok rows={}",
            inner.state.row_count()
        );
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock().map_or(true, |inner| inner.closed)
    }

    fn lock(&self) -> RepoResult<MutexGuard<'_, MirrorInner>> {
        self.inner.lock().map_err(|_| RepoError::LockPoisoned)
    }

    fn read<T>(&self, op: impl FnOnce(&MirrorState) -> RepoResult<T>) -> RepoResult<T> {
        let inner = self.lock()?;
        if inner.closed {
            return Err(RepoError::Closed);
        }
        op(&inner.state)
    }

    /// Runs `op` as one mutation: its writes are journaled together, or
    /// rolled back together when `op` or the journal append fails.
    fn write<T>(&self, op: impl FnOnce(&mut Tx<'_>) -> RepoResult<T>) -> RepoResult<T> {
        let mut guard = self.lock()?;
        let inner = &mut *guard;
        if inner.closed {
            return Err(RepoError::Closed);
        }

        let mut tx = Tx::new(&mut inner.state);
        let value = match op(&mut tx) {
            Ok(value) => value,
            Err(err) => {
                tx.rollback();
                return Err(err);
            }
        };
        if !tx.changes().is_empty() {
            if let Err(err) = inner.store.append_journal(tx.changes()) {
                error!(
                    "event=mirror_journal module=mirror status=error entries={} error={err}",
                    tx.changes().len()
                );
                tx.rollback();
                return Err(err.into());
            }
        }
        inner.journaled += tx.commit();
        inner.compact_if_due();
        Ok(value)
    }

    /// Like [`Self::write`], for operations made of several inserts.
    fn write_atomically<T>(
        &self,
        op: impl FnOnce(&mut Tx<'_>) -> RepoResult<T>,
    ) -> RepoResult<T> {
        self.write(op).map_err(|err| {
            warn!("event=unit_of_work module=mirror status=error action=rollback error={err}");
            err
        })
    }
}

impl MirrorInner {
    fn compact(&mut self) -> Result<(), SnapshotError> {
        let started_at = Instant::now();
        let entries = self.journaled;
        self.store.compact(&self.state.to_snapshot())?;
        self.journaled = 0;
        info!(
            "event=mirror_compact module=mirror status=ok entries={entries} rows={} duration_ms={}",
            self.state.row_count(),
            started_at.elapsed().as_millis()
        );
        Ok(())
    }

    /// The journal already holds every change, so a failed compaction only
    /// delays the snapshot; it is retried after the next mutation.
    fn compact_if_due(&mut self) {
        if self.journaled < self.compact_every {
            return;
        }
        if let Err(err) = self.compact() {
            warn!(
                "event=mirror_compact module=mirror status=error entries={} error={err}",
                self.journaled
            );
        }
    }
}
