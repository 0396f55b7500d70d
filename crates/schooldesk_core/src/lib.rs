//! Data layer for a multi-tenant school record system.
//!
//! Two interchangeable backends sit behind one facade: a SQLite store
//! driven by [`db::ConnectionManager`] and an in-process [`mirror`] that
//! persists through a snapshot store. Callers use [`SchoolStore`].

pub mod config;
pub mod credential;
pub mod db;
pub mod fixtures;
pub mod logging;
pub mod mirror;
pub mod model;
pub mod repo;
pub mod service;

pub use config::{BackendConfig, ConfigError, StoreConfig};
pub use db::{ConnectionManager, DbTarget, SeedOptions, SeedReport};
pub use logging::{default_log_level, init_from_config, init_logging, LogLevel};
pub use mirror::{FileSnapshotStore, MemorySnapshotStore, MirrorOptions, MirrorStore};
pub use model::{RecordId, Timestamp};
pub use repo::{
    AcademicRepository, AttendanceRepository, CameraRepository, HomeworkRepository,
    IdentityRepository, RepoError, RepoResult, Repositories,
};
pub use service::{BackendKind, SchoolStore};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
