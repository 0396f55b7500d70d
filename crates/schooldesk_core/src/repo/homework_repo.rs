//! Homework repository: assignments, per-class listings and per-student
//! status upserts.
//!
//! # Invariants
//! - `update_homework_status` keeps exactly one row per
//!   `(homework_id, student_id)`; `submission_date` is set on first write.
//! - Class and student listings include active homework only.

use super::sqlite::{date_value, delete_by_id, invalid_enum, SqliteRepository, UpdateBuilder};
use super::{RepoError, RepoResult};
use crate::model::homework::{
    Homework, HomeworkDetail, HomeworkPatch, HomeworkState, HomeworkStatusUpdate,
    HomeworkSubmission, NewHomework, StudentHomework,
};
use crate::model::{now_ms, RecordId};
use rusqlite::{params, OptionalExtension, Row};

const HOMEWORK_COLUMNS: &str = "h.id AS id,
    h.class_id AS class_id,
    h.section_id AS section_id,
    h.subject_id AS subject_id,
    h.teacher_id AS teacher_id,
    h.title AS title,
    h.description AS description,
    h.due_date AS due_date,
    h.is_active AS is_active,
    h.created_at AS created_at,
    h.updated_at AS updated_at";

const DETAIL_JOIN_SQL: &str = "JOIN subjects sub ON sub.id = h.subject_id
    JOIN teachers t ON t.id = h.teacher_id
    JOIN users tu ON tu.id = t.user_id";

const DETAIL_COLUMNS: &str = "sub.name AS subject_name,
    sub.code AS subject_code,
    tu.first_name || ' ' || tu.last_name AS teacher_name";

const STATUS_SELECT_SQL: &str = "SELECT
    id,
    homework_id,
    student_id,
    status,
    comments,
    submission_date,
    created_at,
    updated_at
FROM homework_status";

/// Repository interface for homework and submission status.
pub trait HomeworkRepository {
    fn list_homework(&self) -> RepoResult<Vec<Homework>>;
    fn get_homework(&self, id: RecordId) -> RepoResult<Option<Homework>>;
    fn create_homework(&self, homework: &NewHomework) -> RepoResult<RecordId>;
    fn update_homework(&self, id: RecordId, patch: &HomeworkPatch) -> RepoResult<usize>;
    fn delete_homework(&self, id: RecordId) -> RepoResult<usize>;
    /// Active homework of a class (optionally one section) with subject and
    /// teacher names.
    fn homework_by_class(
        &self,
        class_id: RecordId,
        section_id: Option<RecordId>,
    ) -> RepoResult<Vec<HomeworkDetail>>;
    /// Active homework of a class section with the student's status,
    /// defaulting to pending.
    fn homework_for_student(
        &self,
        student_id: RecordId,
        class_id: RecordId,
        section_id: RecordId,
    ) -> RepoResult<Vec<StudentHomework>>;
    /// Homework the student has completed.
    fn homework_history(&self, student_id: RecordId) -> RepoResult<Vec<StudentHomework>>;
    /// Inserts or updates the status row for `(homework_id, student_id)`.
    fn update_homework_status(
        &self,
        update: &HomeworkStatusUpdate,
    ) -> RepoResult<HomeworkSubmission>;
    fn get_homework_status(
        &self,
        homework_id: RecordId,
        student_id: RecordId,
    ) -> RepoResult<Option<HomeworkSubmission>>;
}

impl HomeworkRepository for SqliteRepository<'_> {
    fn list_homework(&self) -> RepoResult<Vec<Homework>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {HOMEWORK_COLUMNS} FROM homework h ORDER BY h.id ASC;"
        ))?;
        let homework = stmt
            .query_map([], parse_homework_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(homework)
    }

    fn get_homework(&self, id: RecordId) -> RepoResult<Option<Homework>> {
        let homework = self
            .conn
            .query_row(
                &format!("SELECT {HOMEWORK_COLUMNS} FROM homework h WHERE h.id = ?1;"),
                [id],
                parse_homework_row,
            )
            .optional()?;
        Ok(homework)
    }

    fn create_homework(&self, homework: &NewHomework) -> RepoResult<RecordId> {
        let row = homework.to_row(0, now_ms())?;
        self.conn.execute(
            "INSERT INTO homework (
                class_id,
                section_id,
                subject_id,
                teacher_id,
                title,
                description,
                due_date,
                is_active,
                created_at,
                updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10);",
            params![
                row.class_id,
                row.section_id,
                row.subject_id,
                row.teacher_id,
                row.title,
                row.description,
                date_value(row.due_date),
                row.is_active,
                row.created_at,
                row.updated_at,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn update_homework(&self, id: RecordId, patch: &HomeworkPatch) -> RepoResult<usize> {
        patch.validate()?;
        let mut update = UpdateBuilder::new("homework");
        if let Some(title) = &patch.title {
            update.set("title", title.clone());
        }
        if let Some(description) = &patch.description {
            update.set("description", description.clone());
        }
        if let Some(due_date) = patch.due_date {
            update.set("due_date", date_value(due_date));
        }
        if let Some(is_active) = patch.is_active {
            update.set("is_active", is_active);
        }
        update.execute(self.conn, id)
    }

    fn delete_homework(&self, id: RecordId) -> RepoResult<usize> {
        delete_by_id(self.conn, "homework", id)
    }

    fn homework_by_class(
        &self,
        class_id: RecordId,
        section_id: Option<RecordId>,
    ) -> RepoResult<Vec<HomeworkDetail>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {HOMEWORK_COLUMNS}, {DETAIL_COLUMNS}
             FROM homework h
             {DETAIL_JOIN_SQL}
             WHERE h.class_id = ?1
               AND (?2 IS NULL OR h.section_id = ?2)
               AND h.is_active = 1
             ORDER BY h.id ASC;"
        ))?;
        let homework = stmt
            .query_map(params![class_id, section_id], parse_detail_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(homework)
    }

    fn homework_for_student(
        &self,
        student_id: RecordId,
        class_id: RecordId,
        section_id: RecordId,
    ) -> RepoResult<Vec<StudentHomework>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {HOMEWORK_COLUMNS}, {DETAIL_COLUMNS},
                COALESCE(hs.status, 'pending') AS status,
                hs.comments AS comments,
                hs.submission_date AS submission_date
             FROM homework h
             {DETAIL_JOIN_SQL}
             LEFT JOIN homework_status hs
               ON hs.homework_id = h.id AND hs.student_id = ?1
             WHERE h.class_id = ?2
               AND h.section_id = ?3
               AND h.is_active = 1
             ORDER BY h.id ASC;"
        ))?;
        let mut rows = stmt.query(params![student_id, class_id, section_id])?;
        let mut homework = Vec::new();
        while let Some(row) = rows.next()? {
            homework.push(parse_student_homework_row(row)?);
        }
        Ok(homework)
    }

    fn homework_history(&self, student_id: RecordId) -> RepoResult<Vec<StudentHomework>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {HOMEWORK_COLUMNS}, {DETAIL_COLUMNS},
                hs.status AS status,
                hs.comments AS comments,
                hs.submission_date AS submission_date
             FROM homework_status hs
             JOIN homework h ON h.id = hs.homework_id
             {DETAIL_JOIN_SQL}
             WHERE hs.student_id = ?1
               AND hs.status = 'completed'
             ORDER BY h.id ASC;"
        ))?;
        let mut rows = stmt.query([student_id])?;
        let mut homework = Vec::new();
        while let Some(row) = rows.next()? {
            homework.push(parse_student_homework_row(row)?);
        }
        Ok(homework)
    }

    fn update_homework_status(
        &self,
        update: &HomeworkStatusUpdate,
    ) -> RepoResult<HomeworkSubmission> {
        let now = now_ms();
        self.conn.execute(
            "INSERT INTO homework_status (
                homework_id,
                student_id,
                status,
                comments,
                submission_date,
                created_at,
                updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?5, ?5)
            ON CONFLICT(homework_id, student_id) DO UPDATE SET
                status = excluded.status,
                comments = excluded.comments,
                updated_at = excluded.updated_at;",
            params![
                update.homework_id,
                update.student_id,
                update.status.as_str(),
                update.comments,
                now,
            ],
        )?;
        self.get_homework_status(update.homework_id, update.student_id)?
            .ok_or_else(|| {
                RepoError::InvalidData(format!(
                    "homework status for homework {} student {} missing after upsert",
                    update.homework_id, update.student_id
                ))
            })
    }

    fn get_homework_status(
        &self,
        homework_id: RecordId,
        student_id: RecordId,
    ) -> RepoResult<Option<HomeworkSubmission>> {
        let mut stmt = self.conn.prepare(&format!(
            "{STATUS_SELECT_SQL} WHERE homework_id = ?1 AND student_id = ?2;"
        ))?;
        let mut rows = stmt.query([homework_id, student_id])?;
        match rows.next()? {
            Some(row) => Ok(Some(parse_status_row(row)?)),
            None => Ok(None),
        }
    }
}

fn parse_homework_row(row: &Row<'_>) -> rusqlite::Result<Homework> {
    Ok(Homework {
        id: row.get("id")?,
        class_id: row.get("class_id")?,
        section_id: row.get("section_id")?,
        subject_id: row.get("subject_id")?,
        teacher_id: row.get("teacher_id")?,
        title: row.get("title")?,
        description: row.get("description")?,
        due_date: row.get("due_date")?,
        is_active: row.get("is_active")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn parse_detail_row(row: &Row<'_>) -> rusqlite::Result<HomeworkDetail> {
    Ok(HomeworkDetail {
        homework: parse_homework_row(row)?,
        subject_name: row.get("subject_name")?,
        subject_code: row.get("subject_code")?,
        teacher_name: row.get("teacher_name")?,
    })
}

fn parse_student_homework_row(row: &Row<'_>) -> RepoResult<StudentHomework> {
    let status_text: String = row.get("status")?;
    let status = HomeworkState::parse(&status_text)
        .ok_or_else(|| invalid_enum("homework_status.status", &status_text))?;
    Ok(StudentHomework {
        detail: parse_detail_row(row)?,
        status,
        comments: row.get("comments")?,
        submission_date: row.get("submission_date")?,
    })
}

fn parse_status_row(row: &Row<'_>) -> RepoResult<HomeworkSubmission> {
    let status_text: String = row.get("status")?;
    let status = HomeworkState::parse(&status_text)
        .ok_or_else(|| invalid_enum("homework_status.status", &status_text))?;
    Ok(HomeworkSubmission {
        id: row.get("id")?,
        homework_id: row.get("homework_id")?,
        student_id: row.get("student_id")?,
        status,
        comments: row.get("comments")?,
        submission_date: row.get("submission_date")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}
