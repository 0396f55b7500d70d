//! Mirror persistence: snapshot document, change journal and store seam.
//!
//! # Responsibility
//! - Define the serialized snapshot (one array per entity family plus id
//!   sequences) and the journal change records.
//! - Provide file-backed and in-memory `SnapshotStore` implementations.
//!
//! # Invariants
//! - Journal replay is idempotent: replaying entries already folded into the
//!   snapshot yields the same state.
//! - File snapshots are replaced atomically (temp file + rename).
//! - Appends start at the end of the last complete journal line, and a
//!   failed append leaves the journal at its previous length.

use crate::model::academic::{Class, Section, Student, Subject, TeacherAssignment};
use crate::model::attendance::Attendance;
use crate::model::camera::{Camera, Feed, SearchLog};
use crate::model::homework::{Homework, HomeworkSubmission};
use crate::model::identity::{Role, Teacher, User};
use crate::model::RecordId;
use log::{error, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

pub const SNAPSHOT_FORMAT_VERSION: u32 = 1;

const SNAPSHOT_FILE_NAME: &str = "snapshot.json";
const SNAPSHOT_TEMP_FILE_NAME: &str = "snapshot.json.tmp";
const JOURNAL_FILE_NAME: &str = "journal.jsonl";

/// Mirror persistence failure.
#[derive(Debug)]
pub enum SnapshotError {
    Io(std::io::Error),
    Serde(serde_json::Error),
    /// Persisted data is structurally invalid.
    Corrupt(String),
}

impl Display for SnapshotError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(err) => write!(f, "snapshot io error: {err}"),
            Self::Serde(err) => write!(f, "snapshot serialization error: {err}"),
            Self::Corrupt(message) => write!(f, "corrupt snapshot data: {message}"),
        }
    }
}

impl Error for SnapshotError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Serde(err) => Some(err),
            Self::Corrupt(_) => None,
        }
    }
}

impl From<std::io::Error> for SnapshotError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<serde_json::Error> for SnapshotError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serde(value)
    }
}

/// Entity family held by the mirror.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Table {
    Roles,
    Users,
    Teachers,
    Classes,
    Sections,
    Subjects,
    Students,
    TeacherAssignments,
    Homework,
    HomeworkStatus,
    Attendance,
    Cameras,
    Feeds,
    AiSearchLogs,
}

impl Table {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Roles => "roles",
            Self::Users => "users",
            Self::Teachers => "teachers",
            Self::Classes => "classes",
            Self::Sections => "sections",
            Self::Subjects => "subjects",
            Self::Students => "students",
            Self::TeacherAssignments => "teacher_assignments",
            Self::Homework => "homework",
            Self::HomeworkStatus => "homework_status",
            Self::Attendance => "attendance",
            Self::Cameras => "cameras",
            Self::Feeds => "feeds",
            Self::AiSearchLogs => "ai_search_logs",
        }
    }
}

/// One full row tagged with its table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "table", content = "row")]
pub enum Record {
    #[serde(rename = "roles")]
    Role(Role),
    #[serde(rename = "users")]
    User(User),
    #[serde(rename = "teachers")]
    Teacher(Teacher),
    #[serde(rename = "classes")]
    Class(Class),
    #[serde(rename = "sections")]
    Section(Section),
    #[serde(rename = "subjects")]
    Subject(Subject),
    #[serde(rename = "students")]
    Student(Student),
    #[serde(rename = "teacher_assignments")]
    TeacherAssignment(TeacherAssignment),
    #[serde(rename = "homework")]
    Homework(Homework),
    #[serde(rename = "homework_status")]
    HomeworkStatus(HomeworkSubmission),
    #[serde(rename = "attendance")]
    Attendance(Attendance),
    #[serde(rename = "cameras")]
    Camera(Camera),
    #[serde(rename = "feeds")]
    Feed(Feed),
    #[serde(rename = "ai_search_logs")]
    AiSearchLog(SearchLog),
}

/// Journal entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Change {
    /// Full row after insert or update.
    Put { record: Record },
    Remove { table: Table, id: RecordId },
}

/// Full mirror state as persisted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub format_version: u32,
    /// Highest id ever assigned per table.
    pub sequences: BTreeMap<Table, RecordId>,
    pub roles: Vec<Role>,
    pub users: Vec<User>,
    pub teachers: Vec<Teacher>,
    pub classes: Vec<Class>,
    pub sections: Vec<Section>,
    pub subjects: Vec<Subject>,
    pub students: Vec<Student>,
    pub teacher_assignments: Vec<TeacherAssignment>,
    pub homework: Vec<Homework>,
    pub homework_status: Vec<HomeworkSubmission>,
    pub attendance: Vec<Attendance>,
    pub cameras: Vec<Camera>,
    pub feeds: Vec<Feed>,
    pub ai_search_logs: Vec<SearchLog>,
}

/// Durable home of a mirror's snapshot and journal.
pub trait SnapshotStore: Send {
    /// Returns the last written snapshot, if any.
    fn load_snapshot(&self) -> Result<Option<Snapshot>, SnapshotError>;
    /// Returns journal entries appended since the last compaction, in order.
    fn load_journal(&self) -> Result<Vec<Change>, SnapshotError>;
    /// Durably appends `changes` before returning.
    fn append_journal(&mut self, changes: &[Change]) -> Result<(), SnapshotError>;
    /// Replaces the snapshot, then truncates the journal.
    fn compact(&mut self, snapshot: &Snapshot) -> Result<(), SnapshotError>;
}

/// Directory-backed store: `snapshot.json` plus `journal.jsonl`.
#[derive(Debug, Clone)]
pub struct FileSnapshotStore {
    dir: PathBuf,
}

impl FileSnapshotStore {
    /// Uses `dir`, creating it when missing.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, SnapshotError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn snapshot_path(&self) -> PathBuf {
        self.dir.join(SNAPSHOT_FILE_NAME)
    }

    pub fn journal_path(&self) -> PathBuf {
        self.dir.join(JOURNAL_FILE_NAME)
    }
}

impl SnapshotStore for FileSnapshotStore {
    fn load_snapshot(&self) -> Result<Option<Snapshot>, SnapshotError> {
        let path = self.snapshot_path();
        if !path.exists() {
            return Ok(None);
        }
        let file = File::open(&path)?;
        let snapshot = serde_json::from_reader(BufReader::new(file))?;
        Ok(Some(snapshot))
    }

    fn load_journal(&self) -> Result<Vec<Change>, SnapshotError> {
        let path = self.journal_path();
        if !path.exists() {
            return Ok(Vec::new());
        }
        let lines = BufReader::new(File::open(&path)?)
            .lines()
            .collect::<Result<Vec<_>, _>>()?;
        parse_journal_lines(&lines)
    }

    fn append_journal(&mut self, changes: &[Change]) -> Result<(), SnapshotError> {
        let mut buffer = String::new();
        for change in changes {
            buffer.push_str(&serde_json::to_string(change)?);
            buffer.push('\n');
        }
        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .open(self.journal_path())?;
        let committed = committed_len(&mut file)?;
        let total = file.metadata()?.len();
        if committed < total {
            warn!(
                "event=mirror_journal module=mirror status=error action=trim_torn_tail bytes={}",
                total - committed
            );
            file.set_len(committed)?;
        }
        file.seek(SeekFrom::Start(committed))?;

        let written = file
            .write_all(buffer.as_bytes())
            .and_then(|()| file.sync_data());
        if let Err(err) = written {
            if let Err(trim_err) = file.set_len(committed).and_then(|()| file.sync_data()) {
                error!(
                    "event=mirror_journal module=mirror status=error action=restore_length error={trim_err}"
                );
            }
            return Err(err.into());
        }
        Ok(())
    }

    fn compact(&mut self, snapshot: &Snapshot) -> Result<(), SnapshotError> {
        let temp_path = self.dir.join(SNAPSHOT_TEMP_FILE_NAME);
        {
            let mut file = File::create(&temp_path)?;
            file.write_all(&serde_json::to_vec(snapshot)?)?;
            file.sync_all()?;
        }
        fs::rename(&temp_path, self.snapshot_path())?;
        File::create(self.journal_path())?.sync_all()?;
        Ok(())
    }
}

/// Process-local store. Clones share the same contents.
#[derive(Debug, Clone, Default)]
pub struct MemorySnapshotStore {
    inner: Arc<Mutex<MemoryContents>>,
}

#[derive(Debug, Default)]
struct MemoryContents {
    snapshot: Option<String>,
    journal: Vec<String>,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_snapshot(&self) -> bool {
        self.contents().snapshot.is_some()
    }

    /// Number of journal entries since the last compaction.
    pub fn journal_len(&self) -> usize {
        self.contents().journal.len()
    }

    fn contents(&self) -> std::sync::MutexGuard<'_, MemoryContents> {
        // Contents are plain strings, so a poisoned guard is still coherent.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl SnapshotStore for MemorySnapshotStore {
    fn load_snapshot(&self) -> Result<Option<Snapshot>, SnapshotError> {
        match &self.contents().snapshot {
            Some(text) => Ok(Some(serde_json::from_str(text)?)),
            None => Ok(None),
        }
    }

    fn load_journal(&self) -> Result<Vec<Change>, SnapshotError> {
        parse_journal_lines(&self.contents().journal)
    }

    fn append_journal(&mut self, changes: &[Change]) -> Result<(), SnapshotError> {
        let encoded = changes
            .iter()
            .map(serde_json::to_string)
            .collect::<Result<Vec<_>, _>>()?;
        self.contents().journal.extend(encoded);
        Ok(())
    }

    fn compact(&mut self, snapshot: &Snapshot) -> Result<(), SnapshotError> {
        let text = serde_json::to_string(snapshot)?;
        let mut contents = self.contents();
        contents.snapshot = Some(text);
        contents.journal.clear();
        Ok(())
    }
}

/// Byte length of the journal up to and including its last newline.
fn committed_len(file: &mut File) -> Result<u64, SnapshotError> {
    let len = file.metadata()?.len();
    if len == 0 {
        return Ok(0);
    }
    let mut last = [0u8; 1];
    file.seek(SeekFrom::Start(len - 1))?;
    file.read_exact(&mut last)?;
    if last[0] == b'\n' {
        return Ok(len);
    }

    let mut contents = Vec::with_capacity(len as usize);
    file.seek(SeekFrom::Start(0))?;
    file.read_to_end(&mut contents)?;
    Ok(contents
        .iter()
        .rposition(|byte| *byte == b'\n')
        .map_or(0, |index| index as u64 + 1))
}

/// Parses journal lines. A malformed final line is a torn append and is
/// dropped; malformed earlier lines are corruption.
fn parse_journal_lines(lines: &[String]) -> Result<Vec<Change>, SnapshotError> {
    let mut changes = Vec::with_capacity(lines.len());
    for (index, line) in lines.iter().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<Change>(line) {
            Ok(change) => changes.push(change),
            Err(err) if index + 1 == lines.len() => {
                warn!(
                    "event=mirror_journal module=mirror status=error action=drop_torn_entry line={} error={err}",
                    index + 1
                );
            }
            Err(err) => {
                return Err(SnapshotError::Corrupt(format!(
                    "journal line {}: {err}",
                    index + 1
                )));
            }
        }
    }
    Ok(changes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::camera::Camera;

    fn camera_change(id: RecordId) -> Change {
        Change::Put {
            record: Record::Camera(Camera {
                id,
                name: format!("Cam {id}"),
                location: "Gate".to_string(),
                ip_address: None,
                is_active: true,
                created_at: 1,
                updated_at: 1,
            }),
        }
    }

    #[test]
    fn change_records_use_table_names_as_tags() {
        let text = serde_json::to_string(&camera_change(3)).unwrap();
        assert!(text.contains("\"op\":\"put\""));
        assert!(text.contains("\"table\":\"cameras\""));

        let removal = Change::Remove {
            table: Table::AiSearchLogs,
            id: 9,
        };
        let text = serde_json::to_string(&removal).unwrap();
        assert!(text.contains("\"table\":\"ai_search_logs\""));
    }

    #[test]
    fn torn_final_journal_line_is_dropped() {
        let lines = vec![
            serde_json::to_string(&camera_change(1)).unwrap(),
            "{\"op\":\"put\",\"rec".to_string(),
        ];
        let changes = parse_journal_lines(&lines).unwrap();
        assert_eq!(changes, vec![camera_change(1)]);
    }

    #[test]
    fn malformed_middle_journal_line_is_corruption() {
        let lines = vec![
            "not json".to_string(),
            serde_json::to_string(&camera_change(1)).unwrap(),
        ];
        assert!(matches!(
            parse_journal_lines(&lines),
            Err(SnapshotError::Corrupt(_))
        ));
    }

    #[test]
    fn file_store_compaction_truncates_journal() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FileSnapshotStore::open(dir.path()).unwrap();
        store.append_journal(&[camera_change(1)]).unwrap();
        assert_eq!(store.load_journal().unwrap().len(), 1);

        store.compact(&Snapshot::default()).unwrap();
        assert!(store.load_journal().unwrap().is_empty());
        assert_eq!(store.load_snapshot().unwrap(), Some(Snapshot::default()));
        assert!(!dir.path().join(SNAPSHOT_TEMP_FILE_NAME).exists());
    }

    #[test]
    fn file_store_append_replaces_a_torn_tail() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FileSnapshotStore::open(dir.path()).unwrap();
        store.append_journal(&[camera_change(1)]).unwrap();

        let mut file = OpenOptions::new()
            .append(true)
            .open(store.journal_path())
            .unwrap();
        file.write_all(b"{\"op\":\"put\",\"rec").unwrap();
        drop(file);
        assert_eq!(store.load_journal().unwrap(), vec![camera_change(1)]);

        store.append_journal(&[camera_change(2)]).unwrap();
        store.append_journal(&[camera_change(3)]).unwrap();
        assert_eq!(
            store.load_journal().unwrap(),
            vec![camera_change(1), camera_change(2), camera_change(3)]
        );
        let text = fs::read_to_string(store.journal_path()).unwrap();
        assert_eq!(text.lines().count(), 3);
        assert!(text.ends_with('\n'));
    }

    #[test]
    fn journal_without_any_newline_is_trimmed_to_empty() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FileSnapshotStore::open(dir.path()).unwrap();
        fs::write(store.journal_path(), "{\"op\":").unwrap();

        store.append_journal(&[camera_change(4)]).unwrap();
        assert_eq!(store.load_journal().unwrap(), vec![camera_change(4)]);
    }

    #[test]
    fn memory_store_clones_share_contents() {
        let mut store = MemorySnapshotStore::new();
        let observer = store.clone();
        store.append_journal(&[camera_change(1)]).unwrap();
        assert_eq!(observer.journal_len(), 1);
        assert!(!observer.has_snapshot());
    }
}
