use super::state::MirrorState;
use super::MirrorStore;
use crate::model::camera::{
    Camera, CameraPatch, Feed, FeedEntry, NewCamera, NewFeed, NewSearchLog, SearchLogEntry,
};
use crate::model::{day_range_ms, now_ms, RecordId};
use crate::repo::{CameraRepository, RepoResult};
use chrono::NaiveDate;
use std::cmp::Reverse;

impl CameraRepository for MirrorStore {
    fn list_cameras(&self) -> RepoResult<Vec<Camera>> {
        self.read(|state| Ok(state.cameras.values().cloned().collect()))
    }

    fn get_camera(&self, id: RecordId) -> RepoResult<Option<Camera>> {
        self.read(|state| Ok(state.cameras.get(&id).cloned()))
    }

    fn create_camera(&self, camera: &NewCamera) -> RepoResult<RecordId> {
        let row = camera.to_row(0, now_ms())?;
        self.write(|tx| tx.insert(row))
    }

    fn update_camera(&self, id: RecordId, patch: &CameraPatch) -> RepoResult<usize> {
        patch.validate()?;
        let now = now_ms();
        self.write(|tx| tx.update::<Camera>(id, |row| patch.apply(row, now)))
    }

    fn delete_camera(&self, id: RecordId) -> RepoResult<usize> {
        self.write(|tx| tx.remove::<Camera>(id))
    }

    fn create_feed(&self, feed: &NewFeed) -> RepoResult<RecordId> {
        let row = feed.to_row(0, now_ms());
        self.write(|tx| tx.insert(row))
    }

    fn feeds_by_date_range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> RepoResult<Vec<FeedEntry>> {
        let (from_ms, to_ms) = day_range_ms(start, end);
        self.read(|state| {
            Ok(feed_entries(state, |feed| {
                feed.timestamp >= from_ms && feed.timestamp <= to_ms
            }))
        })
    }

    fn feeds_by_camera(&self, camera_id: RecordId, limit: u32) -> RepoResult<Vec<Feed>> {
        self.read(|state| {
            let mut feeds: Vec<Feed> = state
                .feeds
                .values()
                .filter(|feed| feed.camera_id == camera_id)
                .cloned()
                .collect();
            feeds.sort_by_key(|feed| Reverse((feed.timestamp, feed.id)));
            feeds.truncate(limit as usize);
            Ok(feeds)
        })
    }

    fn detections_by_person(&self, person_id: RecordId) -> RepoResult<Vec<FeedEntry>> {
        self.read(|state| {
            Ok(feed_entries(state, |feed| {
                feed.detected_person_id == Some(person_id)
            }))
        })
    }

    fn log_ai_search(&self, log: &NewSearchLog) -> RepoResult<RecordId> {
        let row = log.to_row(0, now_ms())?;
        self.write(|tx| tx.insert(row))
    }

    fn ai_search_logs(
        &self,
        user_id: Option<RecordId>,
        limit: u32,
    ) -> RepoResult<Vec<SearchLogEntry>> {
        self.read(|state| {
            let mut logs: Vec<SearchLogEntry> = state
                .ai_search_logs
                .values()
                .filter(|log| user_id.map_or(true, |id| log.user_id == id))
                .filter_map(|log| {
                    state.users.get(&log.user_id).map(|user| SearchLogEntry {
                        log: log.clone(),
                        username: user.username.clone(),
                    })
                })
                .collect();
            logs.sort_by_key(|entry| Reverse((entry.log.searched_at, entry.log.id)));
            logs.truncate(limit as usize);
            Ok(logs)
        })
    }
}

/// Feeds matching `filter` joined with their camera, newest first.
fn feed_entries(state: &MirrorState, filter: impl Fn(&Feed) -> bool) -> Vec<FeedEntry> {
    let mut entries: Vec<FeedEntry> = state
        .feeds
        .values()
        .filter(|&feed| filter(feed))
        .filter_map(|feed| {
            state.cameras.get(&feed.camera_id).map(|camera| FeedEntry {
                feed: feed.clone(),
                camera_name: camera.name.clone(),
                location: camera.location.clone(),
            })
        })
        .collect();
    entries.sort_by_key(|entry| Reverse((entry.feed.timestamp, entry.feed.id)));
    entries
}
