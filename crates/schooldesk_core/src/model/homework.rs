//! Homework assignments and per-student submission status.
//!
//! # Invariants
//! - At most one `HomeworkSubmission` exists per `(homework_id, student_id)`;
//!   status writes are upserts on that pair.
//! - Students without a submission row read as `HomeworkState::Pending`.

use super::validation::{require_text, ValidationError};
use super::{RecordId, Timestamp};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HomeworkState {
    Pending,
    Accepted,
    Completed,
}

impl HomeworkState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Completed => "completed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(Self::Pending),
            "accepted" => Some(Self::Accepted),
            "completed" => Some(Self::Completed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Homework {
    pub id: RecordId,
    pub class_id: RecordId,
    pub section_id: RecordId,
    pub subject_id: RecordId,
    pub teacher_id: RecordId,
    pub title: String,
    pub description: Option<String>,
    pub due_date: NaiveDate,
    pub is_active: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewHomework {
    pub class_id: RecordId,
    pub section_id: RecordId,
    pub subject_id: RecordId,
    pub teacher_id: RecordId,
    pub title: String,
    pub description: Option<String>,
    pub due_date: NaiveDate,
}

impl NewHomework {
    pub(crate) fn to_row(&self, id: RecordId, now: Timestamp) -> Result<Homework, ValidationError> {
        require_text("title", &self.title)?;
        Ok(Homework {
            id,
            class_id: self.class_id,
            section_id: self.section_id,
            subject_id: self.subject_id,
            teacher_id: self.teacher_id,
            title: self.title.clone(),
            description: self.description.clone(),
            due_date: self.due_date,
            is_active: true,
            created_at: now,
            updated_at: now,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HomeworkPatch {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub due_date: Option<NaiveDate>,
    pub is_active: Option<bool>,
}

impl HomeworkPatch {
    pub(crate) fn validate(&self) -> Result<(), ValidationError> {
        if let Some(title) = &self.title {
            require_text("title", title)?;
        }
        Ok(())
    }

    pub(crate) fn apply(&self, homework: &mut Homework, now: Timestamp) {
        if let Some(title) = &self.title {
            homework.title = title.clone();
        }
        if let Some(description) = &self.description {
            homework.description = description.clone();
        }
        if let Some(due_date) = self.due_date {
            homework.due_date = due_date;
        }
        if let Some(is_active) = self.is_active {
            homework.is_active = is_active;
        }
        homework.updated_at = now;
    }
}

/// Persisted status row for one student and one homework.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HomeworkSubmission {
    pub id: RecordId,
    pub homework_id: RecordId,
    pub student_id: RecordId,
    pub status: HomeworkState,
    pub comments: Option<String>,
    /// Stamped when the row is first created.
    pub submission_date: Timestamp,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Upsert request keyed by `(homework_id, student_id)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HomeworkStatusUpdate {
    pub homework_id: RecordId,
    pub student_id: RecordId,
    pub status: HomeworkState,
    pub comments: Option<String>,
}

/// Homework joined with subject and teacher names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HomeworkDetail {
    #[serde(flatten)]
    pub homework: Homework,
    pub subject_name: String,
    pub subject_code: String,
    pub teacher_name: String,
}

/// Homework as seen by one student.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StudentHomework {
    #[serde(flatten)]
    pub detail: HomeworkDetail,
    pub status: HomeworkState,
    pub comments: Option<String>,
    pub submission_date: Option<Timestamp>,
}
