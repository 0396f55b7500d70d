//! Daily attendance marks.
//!
//! # Invariants
//! - At most one mark exists per `(student_id, date)`.

use super::{RecordId, Timestamp};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttendanceStatus {
    Present,
    Absent,
    Late,
}

impl AttendanceStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Present => "present",
            Self::Absent => "absent",
            Self::Late => "late",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "present" => Some(Self::Present),
            "absent" => Some(Self::Absent),
            "late" => Some(Self::Late),
            _ => None,
        }
    }
}

/// How a mark was captured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttendanceMode {
    Manual,
    Camera,
    Badge,
}

impl AttendanceMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Manual => "manual",
            Self::Camera => "camera",
            Self::Badge => "badge",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "manual" => Some(Self::Manual),
            "camera" => Some(Self::Camera),
            "badge" => Some(Self::Badge),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attendance {
    pub id: RecordId,
    pub student_id: RecordId,
    pub date: NaiveDate,
    pub status: AttendanceStatus,
    pub remarks: Option<String>,
    /// User who recorded the mark.
    pub marked_by: Option<RecordId>,
    pub mode: AttendanceMode,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAttendance {
    pub student_id: RecordId,
    pub date: NaiveDate,
    pub status: AttendanceStatus,
    pub remarks: Option<String>,
    pub marked_by: Option<RecordId>,
    pub mode: AttendanceMode,
}

impl NewAttendance {
    pub(crate) fn to_row(&self, id: RecordId, now: Timestamp) -> Attendance {
        Attendance {
            id,
            student_id: self.student_id,
            date: self.date,
            status: self.status,
            remarks: self.remarks.clone(),
            marked_by: self.marked_by,
            mode: self.mode,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttendancePatch {
    pub status: Option<AttendanceStatus>,
    pub remarks: Option<Option<String>>,
    pub marked_by: Option<Option<RecordId>>,
    pub mode: Option<AttendanceMode>,
}

impl AttendancePatch {
    pub(crate) fn apply(&self, attendance: &mut Attendance, now: Timestamp) {
        if let Some(status) = self.status {
            attendance.status = status;
        }
        if let Some(remarks) = &self.remarks {
            attendance.remarks = remarks.clone();
        }
        if let Some(marked_by) = self.marked_by {
            attendance.marked_by = marked_by;
        }
        if let Some(mode) = self.mode {
            attendance.mode = mode;
        }
        attendance.updated_at = now;
    }
}

/// Attendance mark joined with the student's roll number and name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttendanceEntry {
    #[serde(flatten)]
    pub attendance: Attendance,
    pub roll_number: String,
    pub section_id: RecordId,
    pub first_name: String,
    pub last_name: String,
}

/// Share of one status among all class marks in a date range.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttendanceStat {
    pub status: AttendanceStatus,
    pub count: i64,
    /// Percentage of the range total, rounded to two decimals.
    pub percentage: f64,
}

/// Builds per-status stats from raw counts. Input order is preserved.
pub(crate) fn stats_from_counts(counts: Vec<(AttendanceStatus, i64)>) -> Vec<AttendanceStat> {
    let total: i64 = counts.iter().map(|(_, count)| count).sum();
    counts
        .into_iter()
        .map(|(status, count)| AttendanceStat {
            status,
            count,
            percentage: if total == 0 {
                0.0
            } else {
                (count as f64 * 10_000.0 / total as f64).round() / 100.0
            },
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{stats_from_counts, AttendanceStatus};

    #[test]
    fn percentages_round_to_two_decimals() {
        let stats = stats_from_counts(vec![
            (AttendanceStatus::Absent, 1),
            (AttendanceStatus::Present, 2),
        ]);
        assert_eq!(stats[0].percentage, 33.33);
        assert_eq!(stats[1].percentage, 66.67);
    }

    #[test]
    fn empty_counts_produce_no_rows() {
        assert!(stats_from_counts(Vec::new()).is_empty());
    }
}
