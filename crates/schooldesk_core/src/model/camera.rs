//! Camera registry, captured feeds and AI search request logs.
//!
//! # Invariants
//! - `Camera.name` is unique.
//! - Feed and search-log listings are newest first.

use super::validation::{require_text, ValidationError};
use super::{RecordId, Timestamp};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Camera {
    pub id: RecordId,
    pub name: String,
    pub location: String,
    pub ip_address: Option<String>,
    pub is_active: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCamera {
    pub name: String,
    pub location: String,
    pub ip_address: Option<String>,
}

impl NewCamera {
    pub(crate) fn to_row(&self, id: RecordId, now: Timestamp) -> Result<Camera, ValidationError> {
        require_text("name", &self.name)?;
        require_text("location", &self.location)?;
        Ok(Camera {
            id,
            name: self.name.clone(),
            location: self.location.clone(),
            ip_address: self.ip_address.clone(),
            is_active: true,
            created_at: now,
            updated_at: now,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CameraPatch {
    pub name: Option<String>,
    pub location: Option<String>,
    pub ip_address: Option<Option<String>>,
    pub is_active: Option<bool>,
}

impl CameraPatch {
    pub(crate) fn validate(&self) -> Result<(), ValidationError> {
        if let Some(name) = &self.name {
            require_text("name", name)?;
        }
        if let Some(location) = &self.location {
            require_text("location", location)?;
        }
        Ok(())
    }

    pub(crate) fn apply(&self, camera: &mut Camera, now: Timestamp) {
        if let Some(name) = &self.name {
            camera.name = name.clone();
        }
        if let Some(location) = &self.location {
            camera.location = location.clone();
        }
        if let Some(ip_address) = &self.ip_address {
            camera.ip_address = ip_address.clone();
        }
        if let Some(is_active) = self.is_active {
            camera.is_active = is_active;
        }
        camera.updated_at = now;
    }
}

/// One captured frame or clip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feed {
    pub id: RecordId,
    pub camera_id: RecordId,
    pub timestamp: Timestamp,
    pub image_path: Option<String>,
    pub video_path: Option<String>,
    /// User recognised in the capture, if any.
    pub detected_person_id: Option<RecordId>,
    pub created_at: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewFeed {
    pub camera_id: RecordId,
    pub timestamp: Timestamp,
    pub image_path: Option<String>,
    pub video_path: Option<String>,
    pub detected_person_id: Option<RecordId>,
}

impl NewFeed {
    pub(crate) fn to_row(&self, id: RecordId, now: Timestamp) -> Feed {
        Feed {
            id,
            camera_id: self.camera_id,
            timestamp: self.timestamp,
            image_path: self.image_path.clone(),
            video_path: self.video_path.clone(),
            detected_person_id: self.detected_person_id,
            created_at: now,
        }
    }
}

/// Feed joined with its camera.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeedEntry {
    #[serde(flatten)]
    pub feed: Feed,
    pub camera_name: String,
    pub location: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchLog {
    pub id: RecordId,
    pub user_id: RecordId,
    pub search_type: String,
    pub search_text: String,
    /// Opaque result payload as produced by the caller.
    pub result: Option<String>,
    pub searched_at: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSearchLog {
    pub user_id: RecordId,
    pub search_type: String,
    pub search_text: String,
    pub result: Option<String>,
}

impl NewSearchLog {
    pub(crate) fn to_row(&self, id: RecordId, now: Timestamp) -> Result<SearchLog, ValidationError> {
        require_text("search_type", &self.search_type)?;
        require_text("search_text", &self.search_text)?;
        Ok(SearchLog {
            id,
            user_id: self.user_id,
            search_type: self.search_type.clone(),
            search_text: self.search_text.clone(),
            result: self.result.clone(),
            searched_at: now,
        })
    }
}

/// Search log joined with the requesting username.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchLogEntry {
    #[serde(flatten)]
    pub log: SearchLog,
    pub username: String,
}
