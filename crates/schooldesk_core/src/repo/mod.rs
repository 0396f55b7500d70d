//! Repository contracts and their SQLite implementations.
//!
//! # Responsibility
//! - Define one repository trait per entity family.
//! - Keep SQL details inside the SQLite implementation; the in-process
//!   mirror (`crate::mirror`) implements the same traits.
//!
//! # Invariants
//! - Write paths validate input before any mutation.
//! - Update/delete of a missing id returns `Ok(0)`, never an error.
//! - Uniqueness and foreign-key failures surface as
//!   `RepoError::ConstraintViolation` from every backend.
//! - Lists are ordered by ascending id unless a method documents otherwise.

use crate::db::DbError;
use crate::mirror::SnapshotError;
use crate::model::validation::ValidationError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod academic_repo;
pub mod attendance_repo;
pub mod camera_repo;
pub mod homework_repo;
pub mod identity_repo;
mod sqlite;

pub use academic_repo::AcademicRepository;
pub use attendance_repo::AttendanceRepository;
pub use camera_repo::CameraRepository;
pub use homework_repo::HomeworkRepository;
pub use identity_repo::IdentityRepository;
pub use sqlite::SqliteRepository;

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository-facing error taxonomy shared by all backends.
#[derive(Debug)]
pub enum RepoError {
    /// Connection manager used before `initialize()`.
    NotInitialized,
    /// Connection manager used after `close()`.
    Closed,
    /// Uniqueness, foreign-key or check constraint rejected the write.
    ConstraintViolation(String),
    Validation(ValidationError),
    Db(DbError),
    Snapshot(SnapshotError),
    InvalidData(String),
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    MissingRequiredTable(&'static str),
    /// A thread panicked while holding the storage lock.
    LockPoisoned,
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotInitialized => write!(f, "storage has not been initialized"),
            Self::Closed => write!(f, "storage has been closed"),
            Self::ConstraintViolation(message) => write!(f, "constraint violation: {message}"),
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::Snapshot(err) => write!(f, "{err}"),
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "connection schema version {actual_version} does not match expected {expected_version}"
            ),
            Self::MissingRequiredTable(table) => write!(f, "missing required table `{table}`"),
            Self::LockPoisoned => write!(f, "storage lock poisoned"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            Self::Snapshot(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ValidationError> for RepoError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        match value {
            DbError::Sqlite(err) => Self::from(err),
            other => Self::Db(other),
        }
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        if let rusqlite::Error::SqliteFailure(failure, message) = &value {
            if failure.code == rusqlite::ErrorCode::ConstraintViolation {
                return Self::ConstraintViolation(
                    message.clone().unwrap_or_else(|| failure.to_string()),
                );
            }
        }
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<SnapshotError> for RepoError {
    fn from(value: SnapshotError) -> Self {
        Self::Snapshot(value)
    }
}

/// Every repository family behind one object-safe surface.
pub trait Repositories:
    IdentityRepository
    + AcademicRepository
    + HomeworkRepository
    + AttendanceRepository
    + CameraRepository
{
}

impl<T> Repositories for T where
    T: IdentityRepository
        + AcademicRepository
        + HomeworkRepository
        + AttendanceRepository
        + CameraRepository
{
}
