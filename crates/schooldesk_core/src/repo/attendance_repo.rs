//! Attendance repository: daily marks, class/day listings and range stats.
//!
//! # Invariants
//! - One mark per `(student_id, date)`.
//! - `bulk_create_attendance` is all-or-nothing.
//! - Stats are computed over the class's current students.

use super::sqlite::{date_value, delete_by_id, invalid_enum, SqliteRepository, UpdateBuilder};
use super::RepoResult;
use crate::model::attendance::{
    stats_from_counts, Attendance, AttendanceEntry, AttendanceMode, AttendancePatch,
    AttendanceStat, AttendanceStatus, NewAttendance,
};
use crate::model::{now_ms, RecordId};
use chrono::NaiveDate;
use rusqlite::{params, Row};

const ATTENDANCE_COLUMNS: &str = "a.id AS id,
    a.student_id AS student_id,
    a.date AS date,
    a.status AS status,
    a.remarks AS remarks,
    a.marked_by AS marked_by,
    a.mode AS mode,
    a.created_at AS created_at,
    a.updated_at AS updated_at";

/// Repository interface for attendance marks.
pub trait AttendanceRepository {
    fn list_attendance(&self) -> RepoResult<Vec<Attendance>>;
    fn get_attendance(&self, id: RecordId) -> RepoResult<Option<Attendance>>;
    fn create_attendance(&self, attendance: &NewAttendance) -> RepoResult<RecordId>;
    fn update_attendance(&self, id: RecordId, patch: &AttendancePatch) -> RepoResult<usize>;
    fn delete_attendance(&self, id: RecordId) -> RepoResult<usize>;
    /// Marks on `date` for students of `class_id`, with student names.
    fn attendance_by_date_and_class(
        &self,
        date: NaiveDate,
        class_id: RecordId,
    ) -> RepoResult<Vec<AttendanceEntry>>;
    /// Inserts marks in order; returns their ids.
    fn bulk_create_attendance(&self, marks: &[NewAttendance]) -> RepoResult<Vec<RecordId>>;
    /// Count and share per status over `[start, end]`, ordered by status name.
    fn attendance_stats(
        &self,
        class_id: RecordId,
        start: NaiveDate,
        end: NaiveDate,
    ) -> RepoResult<Vec<AttendanceStat>>;
}

impl AttendanceRepository for SqliteRepository<'_> {
    fn list_attendance(&self) -> RepoResult<Vec<Attendance>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {ATTENDANCE_COLUMNS} FROM attendance a ORDER BY a.id ASC;"
        ))?;
        let mut rows = stmt.query([])?;
        let mut marks = Vec::new();
        while let Some(row) = rows.next()? {
            marks.push(parse_attendance_row(row)?);
        }
        Ok(marks)
    }

    fn get_attendance(&self, id: RecordId) -> RepoResult<Option<Attendance>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {ATTENDANCE_COLUMNS} FROM attendance a WHERE a.id = ?1;"
        ))?;
        let mut rows = stmt.query([id])?;
        match rows.next()? {
            Some(row) => Ok(Some(parse_attendance_row(row)?)),
            None => Ok(None),
        }
    }

    fn create_attendance(&self, attendance: &NewAttendance) -> RepoResult<RecordId> {
        let row = attendance.to_row(0, now_ms());
        self.conn.execute(
            "INSERT INTO attendance (
                student_id,
                date,
                status,
                remarks,
                marked_by,
                mode,
                created_at,
                updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8);",
            params![
                row.student_id,
                date_value(row.date),
                row.status.as_str(),
                row.remarks,
                row.marked_by,
                row.mode.as_str(),
                row.created_at,
                row.updated_at,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn update_attendance(&self, id: RecordId, patch: &AttendancePatch) -> RepoResult<usize> {
        let mut update = UpdateBuilder::new("attendance");
        if let Some(status) = patch.status {
            update.set("status", status.as_str().to_string());
        }
        if let Some(remarks) = &patch.remarks {
            update.set("remarks", remarks.clone());
        }
        if let Some(marked_by) = patch.marked_by {
            update.set("marked_by", marked_by);
        }
        if let Some(mode) = patch.mode {
            update.set("mode", mode.as_str().to_string());
        }
        update.execute(self.conn, id)
    }

    fn delete_attendance(&self, id: RecordId) -> RepoResult<usize> {
        delete_by_id(self.conn, "attendance", id)
    }

    fn attendance_by_date_and_class(
        &self,
        date: NaiveDate,
        class_id: RecordId,
    ) -> RepoResult<Vec<AttendanceEntry>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {ATTENDANCE_COLUMNS},
                st.roll_number AS roll_number,
                st.section_id AS section_id,
                u.first_name AS first_name,
                u.last_name AS last_name
             FROM attendance a
             JOIN students st ON st.id = a.student_id
             JOIN users u ON u.id = st.user_id
             WHERE a.date = ?1
               AND st.class_id = ?2
             ORDER BY a.id ASC;"
        ))?;
        let mut rows = stmt.query(params![date_value(date), class_id])?;
        let mut entries = Vec::new();
        while let Some(row) = rows.next()? {
            entries.push(AttendanceEntry {
                attendance: parse_attendance_row(row)?,
                roll_number: row.get("roll_number")?,
                section_id: row.get("section_id")?,
                first_name: row.get("first_name")?,
                last_name: row.get("last_name")?,
            });
        }
        Ok(entries)
    }

    fn bulk_create_attendance(&self, marks: &[NewAttendance]) -> RepoResult<Vec<RecordId>> {
        self.atomically(|repo| {
            marks
                .iter()
                .map(|mark| repo.create_attendance(mark))
                .collect()
        })
    }

    fn attendance_stats(
        &self,
        class_id: RecordId,
        start: NaiveDate,
        end: NaiveDate,
    ) -> RepoResult<Vec<AttendanceStat>> {
        let mut stmt = self.conn.prepare(
            "SELECT a.status AS status, COUNT(*) AS count
             FROM attendance a
             JOIN students st ON st.id = a.student_id
             WHERE st.class_id = ?1
               AND a.date BETWEEN ?2 AND ?3
             GROUP BY a.status
             ORDER BY a.status ASC;",
        )?;
        let mut rows = stmt.query(params![class_id, date_value(start), date_value(end)])?;
        let mut counts = Vec::new();
        while let Some(row) = rows.next()? {
            let status_text: String = row.get("status")?;
            let status = AttendanceStatus::parse(&status_text)
                .ok_or_else(|| invalid_enum("attendance.status", &status_text))?;
            counts.push((status, row.get::<_, i64>("count")?));
        }
        Ok(stats_from_counts(counts))
    }
}

fn parse_attendance_row(row: &Row<'_>) -> RepoResult<Attendance> {
    let status_text: String = row.get("status")?;
    let status = AttendanceStatus::parse(&status_text)
        .ok_or_else(|| invalid_enum("attendance.status", &status_text))?;
    let mode_text: String = row.get("mode")?;
    let mode = AttendanceMode::parse(&mode_text)
        .ok_or_else(|| invalid_enum("attendance.mode", &mode_text))?;
    Ok(Attendance {
        id: row.get("id")?,
        student_id: row.get("student_id")?,
        date: row.get("date")?,
        status,
        remarks: row.get("remarks")?,
        marked_by: row.get("marked_by")?,
        mode,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}
