//! Entity model shared by every storage backend.
//!
//! # Responsibility
//! - Define the persisted row shapes, insert requests, patches and joined
//!   read models for each entity family.
//! - Own write-path validation so both backends reject the same input.
//!
//! # Invariants
//! - Ids are assigned by storage and never reused.
//! - Timestamps are epoch milliseconds; calendar dates are `NaiveDate`.

use chrono::{NaiveDate, Utc};

pub mod academic;
pub mod attendance;
pub mod camera;
pub mod homework;
pub mod identity;
pub mod validation;

/// Storage-assigned row identifier.
pub type RecordId = i64;

/// Unix epoch milliseconds.
pub type Timestamp = i64;

/// Current wall clock in epoch milliseconds.
pub fn now_ms() -> Timestamp {
    Utc::now().timestamp_millis()
}

/// Returns the inclusive `[start, end]` millisecond bounds covering whole UTC
/// days from `start` through `end`.
pub fn day_range_ms(start: NaiveDate, end: NaiveDate) -> (Timestamp, Timestamp) {
    let from = start
        .and_hms_opt(0, 0, 0)
        .map_or(i64::MIN, |dt| dt.and_utc().timestamp_millis());
    let to = end
        .succ_opt()
        .and_then(|next| next.and_hms_opt(0, 0, 0))
        .map_or(i64::MAX, |dt| dt.and_utc().timestamp_millis() - 1);
    (from, to)
}
