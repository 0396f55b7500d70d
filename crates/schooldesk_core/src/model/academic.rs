//! Academic structure: classes, sections, subjects, students and teacher
//! assignments.
//!
//! # Invariants
//! - `Class.name` is unique; `Section` is unique per `(class_id, name)`.
//! - `Subject.code` is unique.
//! - `Student` is unique per `(roll_number, class_id, section_id)`.
//! - `TeacherAssignment` is unique per `(teacher, class, section, subject)`,
//!   where a missing subject counts as one value.

use super::validation::{require_text, ValidationError};
use super::{RecordId, Timestamp};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Class {
    pub id: RecordId,
    pub name: String,
    pub academic_year: String,
    /// Examination board label, e.g. `CBSE`.
    pub board: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewClass {
    pub name: String,
    pub academic_year: String,
    pub board: String,
}

impl NewClass {
    pub(crate) fn to_row(&self, id: RecordId, now: Timestamp) -> Result<Class, ValidationError> {
        require_text("name", &self.name)?;
        require_text("academic_year", &self.academic_year)?;
        Ok(Class {
            id,
            name: self.name.clone(),
            academic_year: self.academic_year.clone(),
            board: self.board.clone(),
            created_at: now,
            updated_at: now,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassPatch {
    pub name: Option<String>,
    pub academic_year: Option<String>,
    pub board: Option<String>,
}

impl ClassPatch {
    pub(crate) fn validate(&self) -> Result<(), ValidationError> {
        if let Some(name) = &self.name {
            require_text("name", name)?;
        }
        if let Some(academic_year) = &self.academic_year {
            require_text("academic_year", academic_year)?;
        }
        Ok(())
    }

    pub(crate) fn apply(&self, class: &mut Class, now: Timestamp) {
        if let Some(name) = &self.name {
            class.name = name.clone();
        }
        if let Some(academic_year) = &self.academic_year {
            class.academic_year = academic_year.clone();
        }
        if let Some(board) = &self.board {
            class.board = board.clone();
        }
        class.updated_at = now;
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    pub id: RecordId,
    pub class_id: RecordId,
    pub name: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSection {
    pub class_id: RecordId,
    pub name: String,
}

impl NewSection {
    pub(crate) fn to_row(&self, id: RecordId, now: Timestamp) -> Result<Section, ValidationError> {
        require_text("name", &self.name)?;
        Ok(Section {
            id,
            class_id: self.class_id,
            name: self.name.clone(),
            created_at: now,
            updated_at: now,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SectionPatch {
    pub class_id: Option<RecordId>,
    pub name: Option<String>,
}

impl SectionPatch {
    pub(crate) fn validate(&self) -> Result<(), ValidationError> {
        if let Some(name) = &self.name {
            require_text("name", name)?;
        }
        Ok(())
    }

    pub(crate) fn apply(&self, section: &mut Section, now: Timestamp) {
        if let Some(class_id) = self.class_id {
            section.class_id = class_id;
        }
        if let Some(name) = &self.name {
            section.name = name.clone();
        }
        section.updated_at = now;
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
    pub id: RecordId,
    pub name: String,
    pub code: String,
    pub description: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSubject {
    pub name: String,
    pub code: String,
    pub description: Option<String>,
}

impl NewSubject {
    pub(crate) fn to_row(&self, id: RecordId, now: Timestamp) -> Result<Subject, ValidationError> {
        require_text("name", &self.name)?;
        require_text("code", &self.code)?;
        Ok(Subject {
            id,
            name: self.name.clone(),
            code: self.code.clone(),
            description: self.description.clone(),
            created_at: now,
            updated_at: now,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubjectPatch {
    pub name: Option<String>,
    pub code: Option<String>,
    pub description: Option<Option<String>>,
}

impl SubjectPatch {
    pub(crate) fn validate(&self) -> Result<(), ValidationError> {
        if let Some(name) = &self.name {
            require_text("name", name)?;
        }
        if let Some(code) = &self.code {
            require_text("code", code)?;
        }
        Ok(())
    }

    pub(crate) fn apply(&self, subject: &mut Subject, now: Timestamp) {
        if let Some(name) = &self.name {
            subject.name = name.clone();
        }
        if let Some(code) = &self.code {
            subject.code = code.clone();
        }
        if let Some(description) = &self.description {
            subject.description = description.clone();
        }
        subject.updated_at = now;
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Student {
    pub id: RecordId,
    pub user_id: RecordId,
    pub roll_number: String,
    pub class_id: RecordId,
    pub section_id: RecordId,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewStudent {
    pub user_id: RecordId,
    pub roll_number: String,
    pub class_id: RecordId,
    pub section_id: RecordId,
}

impl NewStudent {
    pub(crate) fn to_row(&self, id: RecordId, now: Timestamp) -> Result<Student, ValidationError> {
        require_text("roll_number", &self.roll_number)?;
        Ok(Student {
            id,
            user_id: self.user_id,
            roll_number: self.roll_number.clone(),
            class_id: self.class_id,
            section_id: self.section_id,
            created_at: now,
            updated_at: now,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StudentPatch {
    pub roll_number: Option<String>,
    pub class_id: Option<RecordId>,
    pub section_id: Option<RecordId>,
}

impl StudentPatch {
    pub(crate) fn validate(&self) -> Result<(), ValidationError> {
        if let Some(roll_number) = &self.roll_number {
            require_text("roll_number", roll_number)?;
        }
        Ok(())
    }

    pub(crate) fn apply(&self, student: &mut Student, now: Timestamp) {
        if let Some(roll_number) = &self.roll_number {
            student.roll_number = roll_number.clone();
        }
        if let Some(class_id) = self.class_id {
            student.class_id = class_id;
        }
        if let Some(section_id) = self.section_id {
            student.section_id = section_id;
        }
        student.updated_at = now;
    }
}

/// Placement half of a combined user + student creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StudentEnrollment {
    pub roll_number: String,
    pub class_id: RecordId,
    pub section_id: RecordId,
}

impl StudentEnrollment {
    pub(crate) fn for_user(&self, user_id: RecordId) -> NewStudent {
        NewStudent {
            user_id,
            roll_number: self.roll_number.clone(),
            class_id: self.class_id,
            section_id: self.section_id,
        }
    }
}

/// Ids produced by a combined user + student creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StudentAccount {
    pub user_id: RecordId,
    pub student_id: RecordId,
}

/// Student joined with the profile fields of its user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StudentProfile {
    pub student_id: RecordId,
    pub user_id: RecordId,
    pub roll_number: String,
    pub class_id: RecordId,
    pub section_id: RecordId,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub profile_image: Option<String>,
}

/// Per-class roll-up for one attendance day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassStats {
    pub class_id: RecordId,
    pub name: String,
    pub academic_year: String,
    pub board: String,
    pub section_count: i64,
    pub student_count: i64,
    pub present_count: i64,
    pub absent_count: i64,
    pub late_count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeacherAssignment {
    pub id: RecordId,
    pub teacher_id: RecordId,
    pub class_id: RecordId,
    pub section_id: RecordId,
    pub subject_id: Option<RecordId>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTeacherAssignment {
    pub teacher_id: RecordId,
    pub class_id: RecordId,
    pub section_id: RecordId,
    pub subject_id: Option<RecordId>,
}

impl NewTeacherAssignment {
    pub(crate) fn to_row(&self, id: RecordId, now: Timestamp) -> TeacherAssignment {
        TeacherAssignment {
            id,
            teacher_id: self.teacher_id,
            class_id: self.class_id,
            section_id: self.section_id,
            subject_id: self.subject_id,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Assignment joined with class, section and optional subject names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TeacherAssignmentDetail {
    pub id: RecordId,
    pub teacher_id: RecordId,
    pub class_id: RecordId,
    pub class_name: String,
    pub section_id: RecordId,
    pub section_name: String,
    pub subject_id: Option<RecordId>,
    pub subject_name: Option<String>,
}

/// Teacher roll-up: distinct assigned class names joined by `", "`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TeacherSummary {
    pub teacher_id: RecordId,
    pub user_id: RecordId,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub class_names: String,
    pub assignment_count: i64,
}

pub const CLASS_NAME_DELIMITER: &str = ", ";
