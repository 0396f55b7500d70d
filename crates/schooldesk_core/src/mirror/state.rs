//! In-memory tables and constraint enforcement for the mirror backend.
//!
//! # Responsibility
//! - Hold one id-ordered collection per entity family plus id sequences.
//! - Enforce the same uniqueness and foreign-key rules as the SQLite schema.
//! - Record journal changes and undo entries for every mutation.
//!
//! # Invariants
//! - Ids come from a per-table high-water sequence and are never reused.
//! - A row never references a missing parent; a referenced row is never
//!   removed.
//! - A rolled-back `Tx` leaves state and sequences exactly as it found them.

use super::snapshot::{Change, Record, Snapshot, Table, SNAPSHOT_FORMAT_VERSION};
use crate::model::academic::{Class, Section, Student, Subject, TeacherAssignment};
use crate::model::attendance::Attendance;
use crate::model::camera::{Camera, Feed, SearchLog};
use crate::model::homework::{Homework, HomeworkSubmission};
use crate::model::identity::{Role, Teacher, User};
use crate::model::RecordId;
use crate::repo::{RepoError, RepoResult};
use std::collections::BTreeMap;

const FOREIGN_KEY_FAILED: &str = "FOREIGN KEY constraint failed";

/// All mirror tables.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct MirrorState {
    pub(crate) roles: BTreeMap<RecordId, Role>,
    pub(crate) users: BTreeMap<RecordId, User>,
    pub(crate) teachers: BTreeMap<RecordId, Teacher>,
    pub(crate) classes: BTreeMap<RecordId, Class>,
    pub(crate) sections: BTreeMap<RecordId, Section>,
    pub(crate) subjects: BTreeMap<RecordId, Subject>,
    pub(crate) students: BTreeMap<RecordId, Student>,
    pub(crate) teacher_assignments: BTreeMap<RecordId, TeacherAssignment>,
    pub(crate) homework: BTreeMap<RecordId, Homework>,
    pub(crate) homework_status: BTreeMap<RecordId, HomeworkSubmission>,
    pub(crate) attendance: BTreeMap<RecordId, Attendance>,
    pub(crate) cameras: BTreeMap<RecordId, Camera>,
    pub(crate) feeds: BTreeMap<RecordId, Feed>,
    pub(crate) ai_search_logs: BTreeMap<RecordId, SearchLog>,
    sequences: BTreeMap<Table, RecordId>,
}

/// A uniqueness constraint value. `columns` is rendered in the error
/// message the same way SQLite names it.
pub(crate) struct UniqueKey {
    columns: &'static str,
    value: String,
}

impl UniqueKey {
    fn new(columns: &'static str, value: String) -> Self {
        Self { columns, value }
    }
}

/// Declared constraints of a mirror row.
pub(crate) trait RowConstraints {
    fn unique_keys(&self) -> Vec<UniqueKey> {
        Vec::new()
    }

    /// Parent rows this row points at.
    fn references(&self) -> Vec<(Table, RecordId)> {
        Vec::new()
    }
}

/// Row type stored in one mirror table.
pub(crate) trait MirrorRow: RowConstraints + Clone {
    const TABLE: Table;
    fn id(&self) -> RecordId;
    fn assign_id(&mut self, id: RecordId);
    fn rows(state: &MirrorState) -> &BTreeMap<RecordId, Self>;
    fn rows_mut(state: &mut MirrorState) -> &mut BTreeMap<RecordId, Self>;
    fn into_record(self) -> Record;
}

macro_rules! mirror_row {
    ($row:ty, $table:ident, $field:ident, $variant:ident) => {
        impl MirrorRow for $row {
            const TABLE: Table = Table::$table;

            fn id(&self) -> RecordId {
                self.id
            }

            fn assign_id(&mut self, id: RecordId) {
                self.id = id;
            }

            fn rows(state: &MirrorState) -> &BTreeMap<RecordId, Self> {
                &state.$field
            }

            fn rows_mut(state: &mut MirrorState) -> &mut BTreeMap<RecordId, Self> {
                &mut state.$field
            }

            fn into_record(self) -> Record {
                Record::$variant(self)
            }
        }
    };
}

mirror_row!(Role, Roles, roles, Role);
mirror_row!(User, Users, users, User);
mirror_row!(Teacher, Teachers, teachers, Teacher);
mirror_row!(Class, Classes, classes, Class);
mirror_row!(Section, Sections, sections, Section);
mirror_row!(Subject, Subjects, subjects, Subject);
mirror_row!(Student, Students, students, Student);
mirror_row!(TeacherAssignment, TeacherAssignments, teacher_assignments, TeacherAssignment);
mirror_row!(Homework, Homework, homework, Homework);
mirror_row!(HomeworkSubmission, HomeworkStatus, homework_status, HomeworkStatus);
mirror_row!(Attendance, Attendance, attendance, Attendance);
mirror_row!(Camera, Cameras, cameras, Camera);
mirror_row!(Feed, Feeds, feeds, Feed);
mirror_row!(SearchLog, AiSearchLogs, ai_search_logs, AiSearchLog);

impl RowConstraints for Role {
    fn unique_keys(&self) -> Vec<UniqueKey> {
        vec![UniqueKey::new("roles.name", self.name.clone())]
    }
}

impl RowConstraints for User {
    fn unique_keys(&self) -> Vec<UniqueKey> {
        vec![
            UniqueKey::new("users.username", self.username.clone()),
            UniqueKey::new("users.email", self.email.clone()),
        ]
    }

    fn references(&self) -> Vec<(Table, RecordId)> {
        vec![(Table::Roles, self.role_id)]
    }
}

impl RowConstraints for Teacher {
    fn unique_keys(&self) -> Vec<UniqueKey> {
        vec![UniqueKey::new("teachers.user_id", self.user_id.to_string())]
    }

    fn references(&self) -> Vec<(Table, RecordId)> {
        vec![(Table::Users, self.user_id)]
    }
}

impl RowConstraints for Class {
    fn unique_keys(&self) -> Vec<UniqueKey> {
        vec![UniqueKey::new("classes.name", self.name.clone())]
    }
}

impl RowConstraints for Section {
    fn unique_keys(&self) -> Vec<UniqueKey> {
        vec![UniqueKey::new(
            "sections.class_id, sections.name",
            composite(&[&self.class_id.to_string(), &self.name]),
        )]
    }

    fn references(&self) -> Vec<(Table, RecordId)> {
        vec![(Table::Classes, self.class_id)]
    }
}

impl RowConstraints for Subject {
    fn unique_keys(&self) -> Vec<UniqueKey> {
        vec![UniqueKey::new("subjects.code", self.code.clone())]
    }
}

impl RowConstraints for Student {
    fn unique_keys(&self) -> Vec<UniqueKey> {
        vec![UniqueKey::new(
            "students.roll_number, students.class_id, students.section_id",
            composite(&[
                &self.roll_number,
                &self.class_id.to_string(),
                &self.section_id.to_string(),
            ]),
        )]
    }

    fn references(&self) -> Vec<(Table, RecordId)> {
        vec![
            (Table::Users, self.user_id),
            (Table::Classes, self.class_id),
            (Table::Sections, self.section_id),
        ]
    }
}

impl RowConstraints for TeacherAssignment {
    fn unique_keys(&self) -> Vec<UniqueKey> {
        vec![UniqueKey::new(
            "index 'idx_teacher_assignments_unique'",
            composite(&[
                &self.teacher_id.to_string(),
                &self.class_id.to_string(),
                &self.section_id.to_string(),
                &self.subject_id.unwrap_or(0).to_string(),
            ]),
        )]
    }

    fn references(&self) -> Vec<(Table, RecordId)> {
        let mut references = vec![
            (Table::Teachers, self.teacher_id),
            (Table::Classes, self.class_id),
            (Table::Sections, self.section_id),
        ];
        references.extend(self.subject_id.map(|id| (Table::Subjects, id)));
        references
    }
}

impl RowConstraints for Homework {
    fn references(&self) -> Vec<(Table, RecordId)> {
        vec![
            (Table::Classes, self.class_id),
            (Table::Sections, self.section_id),
            (Table::Subjects, self.subject_id),
            (Table::Teachers, self.teacher_id),
        ]
    }
}

impl RowConstraints for HomeworkSubmission {
    fn unique_keys(&self) -> Vec<UniqueKey> {
        vec![UniqueKey::new(
            "homework_status.homework_id, homework_status.student_id",
            composite(&[&self.homework_id.to_string(), &self.student_id.to_string()]),
        )]
    }

    fn references(&self) -> Vec<(Table, RecordId)> {
        vec![
            (Table::Homework, self.homework_id),
            (Table::Students, self.student_id),
        ]
    }
}

impl RowConstraints for Attendance {
    fn unique_keys(&self) -> Vec<UniqueKey> {
        vec![UniqueKey::new(
            "attendance.student_id, attendance.date",
            composite(&[&self.student_id.to_string(), &self.date.to_string()]),
        )]
    }

    fn references(&self) -> Vec<(Table, RecordId)> {
        let mut references = vec![(Table::Students, self.student_id)];
        references.extend(self.marked_by.map(|id| (Table::Users, id)));
        references
    }
}

impl RowConstraints for Camera {
    fn unique_keys(&self) -> Vec<UniqueKey> {
        vec![UniqueKey::new("cameras.name", self.name.clone())]
    }
}

impl RowConstraints for Feed {
    fn references(&self) -> Vec<(Table, RecordId)> {
        let mut references = vec![(Table::Cameras, self.camera_id)];
        references.extend(self.detected_person_id.map(|id| (Table::Users, id)));
        references
    }
}

impl RowConstraints for SearchLog {
    fn references(&self) -> Vec<(Table, RecordId)> {
        vec![(Table::Users, self.user_id)]
    }
}

fn composite(parts: &[&str]) -> String {
    parts.join("\u{1f}")
}

impl MirrorState {
    pub(crate) fn from_snapshot(snapshot: Snapshot) -> RepoResult<Self> {
        if snapshot.format_version != SNAPSHOT_FORMAT_VERSION {
            return Err(RepoError::InvalidData(format!(
                "unsupported snapshot format version {}",
                snapshot.format_version
            )));
        }
        let mut state = Self {
            sequences: snapshot.sequences,
            ..Self::default()
        };
        load_rows(&mut state, snapshot.roles);
        load_rows(&mut state, snapshot.users);
        load_rows(&mut state, snapshot.teachers);
        load_rows(&mut state, snapshot.classes);
        load_rows(&mut state, snapshot.sections);
        load_rows(&mut state, snapshot.subjects);
        load_rows(&mut state, snapshot.students);
        load_rows(&mut state, snapshot.teacher_assignments);
        load_rows(&mut state, snapshot.homework);
        load_rows(&mut state, snapshot.homework_status);
        load_rows(&mut state, snapshot.attendance);
        load_rows(&mut state, snapshot.cameras);
        load_rows(&mut state, snapshot.feeds);
        load_rows(&mut state, snapshot.ai_search_logs);
        Ok(state)
    }

    pub(crate) fn to_snapshot(&self) -> Snapshot {
        Snapshot {
            format_version: SNAPSHOT_FORMAT_VERSION,
            sequences: self.sequences.clone(),
            roles: self.roles.values().cloned().collect(),
            users: self.users.values().cloned().collect(),
            teachers: self.teachers.values().cloned().collect(),
            classes: self.classes.values().cloned().collect(),
            sections: self.sections.values().cloned().collect(),
            subjects: self.subjects.values().cloned().collect(),
            students: self.students.values().cloned().collect(),
            teacher_assignments: self.teacher_assignments.values().cloned().collect(),
            homework: self.homework.values().cloned().collect(),
            homework_status: self.homework_status.values().cloned().collect(),
            attendance: self.attendance.values().cloned().collect(),
            cameras: self.cameras.values().cloned().collect(),
            feeds: self.feeds.values().cloned().collect(),
            ai_search_logs: self.ai_search_logs.values().cloned().collect(),
        }
    }

    /// Applies one replayed journal entry.
    pub(crate) fn replay(&mut self, change: Change) {
        match change {
            Change::Put { record } => self.restore(record),
            Change::Remove { table, id } => self.discard(table, id),
        }
    }

    pub(crate) fn row_count(&self) -> usize {
        self.roles.len()
            + self.users.len()
            + self.teachers.len()
            + self.classes.len()
            + self.sections.len()
            + self.subjects.len()
            + self.students.len()
            + self.teacher_assignments.len()
            + self.homework.len()
            + self.homework_status.len()
            + self.attendance.len()
            + self.cameras.len()
            + self.feeds.len()
            + self.ai_search_logs.len()
    }

    fn restore(&mut self, record: Record) {
        match record {
            Record::Role(row) => put_row(self, row),
            Record::User(row) => put_row(self, row),
            Record::Teacher(row) => put_row(self, row),
            Record::Class(row) => put_row(self, row),
            Record::Section(row) => put_row(self, row),
            Record::Subject(row) => put_row(self, row),
            Record::Student(row) => put_row(self, row),
            Record::TeacherAssignment(row) => put_row(self, row),
            Record::Homework(row) => put_row(self, row),
            Record::HomeworkStatus(row) => put_row(self, row),
            Record::Attendance(row) => put_row(self, row),
            Record::Camera(row) => put_row(self, row),
            Record::Feed(row) => put_row(self, row),
            Record::AiSearchLog(row) => put_row(self, row),
        }
    }

    fn discard(&mut self, table: Table, id: RecordId) {
        match table {
            Table::Roles => {
                self.roles.remove(&id);
            }
            Table::Users => {
                self.users.remove(&id);
            }
            Table::Teachers => {
                self.teachers.remove(&id);
            }
            Table::Classes => {
                self.classes.remove(&id);
            }
            Table::Sections => {
                self.sections.remove(&id);
            }
            Table::Subjects => {
                self.subjects.remove(&id);
            }
            Table::Students => {
                self.students.remove(&id);
            }
            Table::TeacherAssignments => {
                self.teacher_assignments.remove(&id);
            }
            Table::Homework => {
                self.homework.remove(&id);
            }
            Table::HomeworkStatus => {
                self.homework_status.remove(&id);
            }
            Table::Attendance => {
                self.attendance.remove(&id);
            }
            Table::Cameras => {
                self.cameras.remove(&id);
            }
            Table::Feeds => {
                self.feeds.remove(&id);
            }
            Table::AiSearchLogs => {
                self.ai_search_logs.remove(&id);
            }
        }
    }

    fn contains(&self, table: Table, id: RecordId) -> bool {
        match table {
            Table::Roles => self.roles.contains_key(&id),
            Table::Users => self.users.contains_key(&id),
            Table::Teachers => self.teachers.contains_key(&id),
            Table::Classes => self.classes.contains_key(&id),
            Table::Sections => self.sections.contains_key(&id),
            Table::Subjects => self.subjects.contains_key(&id),
            Table::Students => self.students.contains_key(&id),
            Table::TeacherAssignments => self.teacher_assignments.contains_key(&id),
            Table::Homework => self.homework.contains_key(&id),
            Table::HomeworkStatus => self.homework_status.contains_key(&id),
            Table::Attendance => self.attendance.contains_key(&id),
            Table::Cameras => self.cameras.contains_key(&id),
            Table::Feeds => self.feeds.contains_key(&id),
            Table::AiSearchLogs => self.ai_search_logs.contains_key(&id),
        }
    }

    fn is_referenced(&self, table: Table, id: RecordId) -> bool {
        let target = (table, id);
        references_any::<User>(self, target)
            || references_any::<Teacher>(self, target)
            || references_any::<Section>(self, target)
            || references_any::<Student>(self, target)
            || references_any::<TeacherAssignment>(self, target)
            || references_any::<Homework>(self, target)
            || references_any::<HomeworkSubmission>(self, target)
            || references_any::<Attendance>(self, target)
            || references_any::<Feed>(self, target)
            || references_any::<SearchLog>(self, target)
    }

    fn check_row<T: MirrorRow>(&self, row: &T) -> RepoResult<()> {
        for key in row.unique_keys() {
            let taken = T::rows(self).values().any(|other| {
                other.id() != row.id()
                    && other
                        .unique_keys()
                        .iter()
                        .any(|existing| {
                            existing.columns == key.columns && existing.value == key.value
                        })
            });
            if taken {
                return Err(RepoError::ConstraintViolation(format!(
                    "UNIQUE constraint failed: {}",
                    key.columns
                )));
            }
        }
        if row
            .references()
            .into_iter()
            .any(|(table, id)| !self.contains(table, id))
        {
            return Err(RepoError::ConstraintViolation(
                FOREIGN_KEY_FAILED.to_string(),
            ));
        }
        Ok(())
    }
}

fn load_rows<T: MirrorRow>(state: &mut MirrorState, rows: Vec<T>) {
    for row in rows {
        put_row(state, row);
    }
}

/// Stores `row` as-is, lifting the table sequence to cover its id.
fn put_row<T: MirrorRow>(state: &mut MirrorState, row: T) {
    let id = row.id();
    let sequence = state.sequences.entry(T::TABLE).or_insert(0);
    *sequence = (*sequence).max(id);
    T::rows_mut(state).insert(id, row);
}

fn references_any<T: MirrorRow>(state: &MirrorState, target: (Table, RecordId)) -> bool {
    T::rows(state)
        .values()
        .any(|row| row.references().contains(&target))
}

enum Undo {
    Restore(Record),
    Discard(Table, RecordId),
    Sequence(Table, Option<RecordId>),
}

/// Mutation scope over the mirror state.
///
/// Every write is applied immediately and recorded both as a journal change
/// and as an undo entry, so a failed scope can be rolled back in place.
pub(crate) struct Tx<'state> {
    state: &'state mut MirrorState,
    changes: Vec<Change>,
    undo: Vec<Undo>,
}

impl<'state> Tx<'state> {
    pub(crate) fn new(state: &'state mut MirrorState) -> Self {
        Self {
            state,
            changes: Vec::new(),
            undo: Vec::new(),
        }
    }

    pub(crate) fn state(&self) -> &MirrorState {
        self.state
    }

    pub(crate) fn changes(&self) -> &[Change] {
        &self.changes
    }

    /// Assigns the next id to `row`, checks constraints and stores it.
    pub(crate) fn insert<T: MirrorRow>(&mut self, mut row: T) -> RepoResult<RecordId> {
        let previous = self.state.sequences.get(&T::TABLE).copied();
        let id = previous.unwrap_or(0) + 1;
        row.assign_id(id);
        self.state.check_row(&row)?;

        self.undo.push(Undo::Sequence(T::TABLE, previous));
        self.state.sequences.insert(T::TABLE, id);
        self.undo.push(Undo::Discard(T::TABLE, id));
        T::rows_mut(self.state).insert(id, row.clone());
        self.changes.push(Change::Put {
            record: row.into_record(),
        });
        Ok(id)
    }

    /// Patches the row with `id`. Returns `Ok(0)` when it does not exist.
    pub(crate) fn update<T: MirrorRow>(
        &mut self,
        id: RecordId,
        patch: impl FnOnce(&mut T),
    ) -> RepoResult<usize> {
        let Some(current) = T::rows(self.state).get(&id) else {
            return Ok(0);
        };
        let mut next = current.clone();
        patch(&mut next);
        next.assign_id(id);
        self.state.check_row(&next)?;

        if let Some(previous) = T::rows_mut(self.state).insert(id, next.clone()) {
            self.undo.push(Undo::Restore(previous.into_record()));
        }
        self.changes.push(Change::Put {
            record: next.into_record(),
        });
        Ok(1)
    }

    /// Removes the row with `id` unless another row references it.
    pub(crate) fn remove<T: MirrorRow>(&mut self, id: RecordId) -> RepoResult<usize> {
        if !T::rows(self.state).contains_key(&id) {
            return Ok(0);
        }
        if self.state.is_referenced(T::TABLE, id) {
            return Err(RepoError::ConstraintViolation(
                FOREIGN_KEY_FAILED.to_string(),
            ));
        }
        if let Some(previous) = T::rows_mut(self.state).remove(&id) {
            self.undo.push(Undo::Restore(previous.into_record()));
        }
        self.changes.push(Change::Remove {
            table: T::TABLE,
            id,
        });
        Ok(1)
    }

    /// Keeps every write; returns the number of journal changes.
    pub(crate) fn commit(self) -> usize {
        self.changes.len()
    }

    /// Reverts every write made through this scope.
    pub(crate) fn rollback(self) {
        let Self { state, undo, .. } = self;
        for entry in undo.into_iter().rev() {
            match entry {
                Undo::Restore(record) => state.restore(record),
                Undo::Discard(table, id) => state.discard(table, id),
                Undo::Sequence(table, Some(value)) => {
                    state.sequences.insert(table, value);
                }
                Undo::Sequence(table, None) => {
                    state.sequences.remove(&table);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::identity::PermissionSet;

    fn role(name: &str) -> Role {
        Role {
            id: 0,
            name: name.to_string(),
            description: None,
            permissions: PermissionSet::default(),
            created_at: 1,
            updated_at: 1,
        }
    }

    fn class(name: &str) -> Class {
        Class {
            id: 0,
            name: name.to_string(),
            academic_year: "2024-25".to_string(),
            board: "CBSE".to_string(),
            created_at: 1,
            updated_at: 1,
        }
    }

    #[test]
    fn ids_are_not_reused_after_remove() {
        let mut state = MirrorState::default();
        let mut tx = Tx::new(&mut state);
        let first = tx.insert(role("A")).unwrap();
        let second = tx.insert(role("B")).unwrap();
        assert_eq!(tx.remove::<Role>(second).unwrap(), 1);
        let third = tx.insert(role("C")).unwrap();
        assert_eq!((first, second, third), (1, 2, 3));
    }

    #[test]
    fn duplicate_unique_key_is_rejected_with_sqlite_message() {
        let mut state = MirrorState::default();
        let mut tx = Tx::new(&mut state);
        tx.insert(class("Grade 1")).unwrap();
        let err = tx.insert(class("Grade 1")).unwrap_err();
        match err {
            RepoError::ConstraintViolation(message) => {
                assert_eq!(message, "UNIQUE constraint failed: classes.name");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn referenced_parent_cannot_be_removed() {
        let mut state = MirrorState::default();
        let mut tx = Tx::new(&mut state);
        let class_id = tx.insert(class("Grade 1")).unwrap();
        tx.insert(Section {
            id: 0,
            class_id,
            name: "A".to_string(),
            created_at: 1,
            updated_at: 1,
        })
        .unwrap();
        assert!(matches!(
            tx.remove::<Class>(class_id),
            Err(RepoError::ConstraintViolation(_))
        ));
    }

    #[test]
    fn rollback_restores_rows_and_sequences() {
        let mut state = MirrorState::default();
        Tx::new(&mut state).insert(role("Admin")).unwrap();
        let before = state.clone();

        let mut tx = Tx::new(&mut state);
        tx.insert(role("Teacher")).unwrap();
        tx.update::<Role>(1, |row| row.name = "Root".to_string())
            .unwrap();
        tx.rollback();

        assert_eq!(state, before);
        let next = Tx::new(&mut state).insert(role("Teacher")).unwrap();
        assert_eq!(next, 2);
    }

    #[test]
    fn snapshot_round_trip_keeps_sequences() {
        let mut state = MirrorState::default();
        let mut tx = Tx::new(&mut state);
        tx.insert(role("A")).unwrap();
        let removed = tx.insert(role("B")).unwrap();
        tx.remove::<Role>(removed).unwrap();

        let mut restored = MirrorState::from_snapshot(state.to_snapshot()).unwrap();
        assert_eq!(restored, state);
        assert_eq!(Tx::new(&mut restored).insert(role("C")).unwrap(), 3);
    }
}
