//! Caller-facing services.
//!
//! # Responsibility
//! - Route repository calls to the configured backend.
//! - Keep callers decoupled from storage details.

pub mod school_store;

pub use school_store::{BackendKind, SchoolStore, StoreBackend};
