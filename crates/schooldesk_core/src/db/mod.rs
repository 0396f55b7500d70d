//! SQLite storage bootstrap, schema, seed and connection lifecycle.
//!
//! # Responsibility
//! - Open and configure SQLite connections.
//! - Create the schema exactly once and load the baseline seed.
//! - Own the single process-wide connection handle.
//!
//! # Invariants
//! - Schema version is tracked via `PRAGMA user_version`.
//! - Repositories must not touch a connection before the schema exists.

use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod manager;
mod open;
pub mod schema;
pub mod seed;

pub use manager::{ConnectionManager, DbTarget, SqliteHandle};
pub use open::{open_db, open_db_in_memory};
pub use schema::ensure_schema;
pub use seed::{ensure_seed, SeedOptions, SeedReport};

pub type DbResult<T> = Result<T, DbError>;

#[derive(Debug)]
pub enum DbError {
    Sqlite(rusqlite::Error),
    UnsupportedSchemaVersion {
        db_version: u32,
        latest_supported: u32,
    },
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "{err}"),
            Self::UnsupportedSchemaVersion {
                db_version,
                latest_supported,
            } => write!(
                f,
                "database schema version {db_version} is newer than supported {latest_supported}"
            ),
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
            Self::UnsupportedSchemaVersion { .. } => None,
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}
