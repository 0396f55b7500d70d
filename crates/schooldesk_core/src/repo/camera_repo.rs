//! Camera repository: camera registry, feeds and AI search request logs.
//!
//! # Invariants
//! - Feed listings order by `timestamp DESC, id DESC`.
//! - Search log listings order by `searched_at DESC, id DESC`.

use super::sqlite::{delete_by_id, limit_value, SqliteRepository, UpdateBuilder};
use super::RepoResult;
use crate::model::camera::{
    Camera, CameraPatch, Feed, FeedEntry, NewCamera, NewFeed, NewSearchLog, SearchLog,
    SearchLogEntry,
};
use crate::model::{day_range_ms, now_ms, RecordId};
use chrono::NaiveDate;
use rusqlite::{params, OptionalExtension, Row};

const CAMERA_SELECT_SQL: &str = "SELECT
    id,
    name,
    location,
    ip_address,
    is_active,
    created_at,
    updated_at
FROM cameras";

const FEED_COLUMNS: &str = "f.id AS id,
    f.camera_id AS camera_id,
    f.timestamp AS timestamp,
    f.image_path AS image_path,
    f.video_path AS video_path,
    f.detected_person_id AS detected_person_id,
    f.created_at AS created_at";

/// Repository interface for cameras, feeds and search logs.
pub trait CameraRepository {
    fn list_cameras(&self) -> RepoResult<Vec<Camera>>;
    fn get_camera(&self, id: RecordId) -> RepoResult<Option<Camera>>;
    fn create_camera(&self, camera: &NewCamera) -> RepoResult<RecordId>;
    fn update_camera(&self, id: RecordId, patch: &CameraPatch) -> RepoResult<usize>;
    fn delete_camera(&self, id: RecordId) -> RepoResult<usize>;

    fn create_feed(&self, feed: &NewFeed) -> RepoResult<RecordId>;
    /// Feeds captured on any UTC day in `[start, end]`, newest first.
    fn feeds_by_date_range(&self, start: NaiveDate, end: NaiveDate)
        -> RepoResult<Vec<FeedEntry>>;
    /// Latest `limit` feeds of one camera, newest first.
    fn feeds_by_camera(&self, camera_id: RecordId, limit: u32) -> RepoResult<Vec<Feed>>;
    /// Feeds in which `person_id` was detected, newest first.
    fn detections_by_person(&self, person_id: RecordId) -> RepoResult<Vec<FeedEntry>>;

    fn log_ai_search(&self, log: &NewSearchLog) -> RepoResult<RecordId>;
    /// Latest `limit` search logs, optionally for one user, newest first.
    fn ai_search_logs(
        &self,
        user_id: Option<RecordId>,
        limit: u32,
    ) -> RepoResult<Vec<SearchLogEntry>>;
}

impl CameraRepository for SqliteRepository<'_> {
    fn list_cameras(&self) -> RepoResult<Vec<Camera>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{CAMERA_SELECT_SQL} ORDER BY id ASC;"))?;
        let cameras = stmt
            .query_map([], parse_camera_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(cameras)
    }

    fn get_camera(&self, id: RecordId) -> RepoResult<Option<Camera>> {
        let camera = self
            .conn
            .query_row(
                &format!("{CAMERA_SELECT_SQL} WHERE id = ?1;"),
                [id],
                parse_camera_row,
            )
            .optional()?;
        Ok(camera)
    }

    fn create_camera(&self, camera: &NewCamera) -> RepoResult<RecordId> {
        let row = camera.to_row(0, now_ms())?;
        self.conn.execute(
            "INSERT INTO cameras (name, location, ip_address, is_active, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
            params![
                row.name,
                row.location,
                row.ip_address,
                row.is_active,
                row.created_at,
                row.updated_at,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn update_camera(&self, id: RecordId, patch: &CameraPatch) -> RepoResult<usize> {
        patch.validate()?;
        let mut update = UpdateBuilder::new("cameras");
        if let Some(name) = &patch.name {
            update.set("name", name.clone());
        }
        if let Some(location) = &patch.location {
            update.set("location", location.clone());
        }
        if let Some(ip_address) = &patch.ip_address {
            update.set("ip_address", ip_address.clone());
        }
        if let Some(is_active) = patch.is_active {
            update.set("is_active", is_active);
        }
        update.execute(self.conn, id)
    }

    fn delete_camera(&self, id: RecordId) -> RepoResult<usize> {
        delete_by_id(self.conn, "cameras", id)
    }

    fn create_feed(&self, feed: &NewFeed) -> RepoResult<RecordId> {
        let row = feed.to_row(0, now_ms());
        self.conn.execute(
            "INSERT INTO feeds (
                camera_id,
                timestamp,
                image_path,
                video_path,
                detected_person_id,
                created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
            params![
                row.camera_id,
                row.timestamp,
                row.image_path,
                row.video_path,
                row.detected_person_id,
                row.created_at,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn feeds_by_date_range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> RepoResult<Vec<FeedEntry>> {
        let (from_ms, to_ms) = day_range_ms(start, end);
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {FEED_COLUMNS}, c.name AS camera_name, c.location AS location
             FROM feeds f
             JOIN cameras c ON c.id = f.camera_id
             WHERE f.timestamp BETWEEN ?1 AND ?2
             ORDER BY f.timestamp DESC, f.id DESC;"
        ))?;
        let feeds = stmt
            .query_map([from_ms, to_ms], parse_feed_entry_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(feeds)
    }

    fn feeds_by_camera(&self, camera_id: RecordId, limit: u32) -> RepoResult<Vec<Feed>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {FEED_COLUMNS}
             FROM feeds f
             WHERE f.camera_id = ?1
             ORDER BY f.timestamp DESC, f.id DESC
             LIMIT ?2;"
        ))?;
        let feeds = stmt
            .query_map([camera_id, limit_value(limit)], parse_feed_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(feeds)
    }

    fn detections_by_person(&self, person_id: RecordId) -> RepoResult<Vec<FeedEntry>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {FEED_COLUMNS}, c.name AS camera_name, c.location AS location
             FROM feeds f
             JOIN cameras c ON c.id = f.camera_id
             WHERE f.detected_person_id = ?1
             ORDER BY f.timestamp DESC, f.id DESC;"
        ))?;
        let feeds = stmt
            .query_map([person_id], parse_feed_entry_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(feeds)
    }

    fn log_ai_search(&self, log: &NewSearchLog) -> RepoResult<RecordId> {
        let row = log.to_row(0, now_ms())?;
        self.conn.execute(
            "INSERT INTO ai_search_logs (user_id, search_type, search_text, result, searched_at)
             VALUES (?1, ?2, ?3, ?4, ?5);",
            params![
                row.user_id,
                row.search_type,
                row.search_text,
                row.result,
                row.searched_at,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn ai_search_logs(
        &self,
        user_id: Option<RecordId>,
        limit: u32,
    ) -> RepoResult<Vec<SearchLogEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT
                l.id AS id,
                l.user_id AS user_id,
                l.search_type AS search_type,
                l.search_text AS search_text,
                l.result AS result,
                l.searched_at AS searched_at,
                u.username AS username
             FROM ai_search_logs l
             JOIN users u ON u.id = l.user_id
             WHERE (?1 IS NULL OR l.user_id = ?1)
             ORDER BY l.searched_at DESC, l.id DESC
             LIMIT ?2;",
        )?;
        let logs = stmt
            .query_map(params![user_id, limit_value(limit)], |row| {
                Ok(SearchLogEntry {
                    log: SearchLog {
                        id: row.get("id")?,
                        user_id: row.get("user_id")?,
                        search_type: row.get("search_type")?,
                        search_text: row.get("search_text")?,
                        result: row.get("result")?,
                        searched_at: row.get("searched_at")?,
                    },
                    username: row.get("username")?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(logs)
    }
}

fn parse_camera_row(row: &Row<'_>) -> rusqlite::Result<Camera> {
    Ok(Camera {
        id: row.get("id")?,
        name: row.get("name")?,
        location: row.get("location")?,
        ip_address: row.get("ip_address")?,
        is_active: row.get("is_active")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn parse_feed_row(row: &Row<'_>) -> rusqlite::Result<Feed> {
    Ok(Feed {
        id: row.get("id")?,
        camera_id: row.get("camera_id")?,
        timestamp: row.get("timestamp")?,
        image_path: row.get("image_path")?,
        video_path: row.get("video_path")?,
        detected_person_id: row.get("detected_person_id")?,
        created_at: row.get("created_at")?,
    })
}

fn parse_feed_entry_row(row: &Row<'_>) -> rusqlite::Result<FeedEntry> {
    Ok(FeedEntry {
        feed: parse_feed_row(row)?,
        camera_name: row.get("camera_name")?,
        location: row.get("location")?,
    })
}
