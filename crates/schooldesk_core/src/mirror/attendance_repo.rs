use super::MirrorStore;
use crate::model::attendance::{
    stats_from_counts, Attendance, AttendanceEntry, AttendancePatch, AttendanceStat,
    AttendanceStatus, NewAttendance,
};
use crate::model::{now_ms, RecordId};
use crate::repo::{AttendanceRepository, RepoResult};
use chrono::NaiveDate;
use std::collections::{BTreeMap, HashSet};

impl AttendanceRepository for MirrorStore {
    fn list_attendance(&self) -> RepoResult<Vec<Attendance>> {
        self.read(|state| Ok(state.attendance.values().cloned().collect()))
    }

    fn get_attendance(&self, id: RecordId) -> RepoResult<Option<Attendance>> {
        self.read(|state| Ok(state.attendance.get(&id).cloned()))
    }

    fn create_attendance(&self, attendance: &NewAttendance) -> RepoResult<RecordId> {
        let row = attendance.to_row(0, now_ms());
        self.write(|tx| tx.insert(row))
    }

    fn update_attendance(&self, id: RecordId, patch: &AttendancePatch) -> RepoResult<usize> {
        let now = now_ms();
        self.write(|tx| tx.update::<Attendance>(id, |row| patch.apply(row, now)))
    }

    fn delete_attendance(&self, id: RecordId) -> RepoResult<usize> {
        self.write(|tx| tx.remove::<Attendance>(id))
    }

    fn attendance_by_date_and_class(
        &self,
        date: NaiveDate,
        class_id: RecordId,
    ) -> RepoResult<Vec<AttendanceEntry>> {
        self.read(|state| {
            Ok(state
                .attendance
                .values()
                .filter(|mark| mark.date == date)
                .filter_map(|mark| {
                    let student = state
                        .students
                        .get(&mark.student_id)
                        .filter(|student| student.class_id == class_id)?;
                    let user = state.users.get(&student.user_id)?;
                    Some(AttendanceEntry {
                        attendance: mark.clone(),
                        roll_number: student.roll_number.clone(),
                        section_id: student.section_id,
                        first_name: user.first_name.clone(),
                        last_name: user.last_name.clone(),
                    })
                })
                .collect())
        })
    }

    fn bulk_create_attendance(&self, marks: &[NewAttendance]) -> RepoResult<Vec<RecordId>> {
        let now = now_ms();
        self.write_atomically(|tx| {
            marks
                .iter()
                .map(|mark| tx.insert(mark.to_row(0, now)))
                .collect()
        })
    }

    fn attendance_stats(
        &self,
        class_id: RecordId,
        start: NaiveDate,
        end: NaiveDate,
    ) -> RepoResult<Vec<AttendanceStat>> {
        self.read(|state| {
            let student_ids: HashSet<RecordId> = state
                .students
                .values()
                .filter(|student| student.class_id == class_id)
                .map(|student| student.id)
                .collect();
            // Keyed by status name to match the SQL ordering.
            let mut counts: BTreeMap<&'static str, (AttendanceStatus, i64)> = BTreeMap::new();
            for mark in state.attendance.values() {
                if mark.date < start || mark.date > end || !student_ids.contains(&mark.student_id)
                {
                    continue;
                }
                counts
                    .entry(mark.status.as_str())
                    .or_insert((mark.status, 0))
                    .1 += 1;
            }
            Ok(stats_from_counts(counts.into_values().collect()))
        })
    }
}
