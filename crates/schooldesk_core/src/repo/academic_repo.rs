//! Academic structure repository: classes, sections, subjects, students and
//! teacher assignments.
//!
//! # Invariants
//! - `create_student_with_user` is all-or-nothing.
//! - `class_with_stats` lists every class, including classes without
//!   sections or students.

use super::sqlite::{date_value, delete_by_id, SqliteRepository, UpdateBuilder};
use super::{IdentityRepository, RepoResult};
use crate::model::academic::{
    Class, ClassPatch, ClassStats, NewClass, NewSection, NewStudent, NewSubject,
    NewTeacherAssignment, Section, SectionPatch, Student, StudentAccount, StudentEnrollment,
    StudentPatch, StudentProfile, Subject, SubjectPatch, TeacherAssignmentDetail, TeacherSummary,
    CLASS_NAME_DELIMITER,
};
use crate::model::identity::NewUser;
use crate::model::{now_ms, RecordId};
use chrono::NaiveDate;
use rusqlite::{params, OptionalExtension, Row};
use std::collections::BTreeMap;

const CLASS_SELECT_SQL: &str =
    "SELECT id, name, academic_year, board, created_at, updated_at FROM classes";
const SECTION_SELECT_SQL: &str =
    "SELECT id, class_id, name, created_at, updated_at FROM sections";
const SUBJECT_SELECT_SQL: &str =
    "SELECT id, name, code, description, created_at, updated_at FROM subjects";
const STUDENT_SELECT_SQL: &str = "SELECT
    id,
    user_id,
    roll_number,
    class_id,
    section_id,
    created_at,
    updated_at
FROM students";

/// Repository interface for the academic structure.
pub trait AcademicRepository {
    fn list_classes(&self) -> RepoResult<Vec<Class>>;
    fn get_class(&self, id: RecordId) -> RepoResult<Option<Class>>;
    fn create_class(&self, class: &NewClass) -> RepoResult<RecordId>;
    fn update_class(&self, id: RecordId, patch: &ClassPatch) -> RepoResult<usize>;
    fn delete_class(&self, id: RecordId) -> RepoResult<usize>;
    /// Per-class section/student counts and attendance totals on `date`.
    fn class_with_stats(&self, date: NaiveDate) -> RepoResult<Vec<ClassStats>>;

    /// Sections, optionally restricted to one class.
    fn list_sections(&self, class_id: Option<RecordId>) -> RepoResult<Vec<Section>>;
    fn get_section(&self, id: RecordId) -> RepoResult<Option<Section>>;
    fn create_section(&self, section: &NewSection) -> RepoResult<RecordId>;
    fn update_section(&self, id: RecordId, patch: &SectionPatch) -> RepoResult<usize>;
    fn delete_section(&self, id: RecordId) -> RepoResult<usize>;

    fn list_subjects(&self) -> RepoResult<Vec<Subject>>;
    fn get_subject(&self, id: RecordId) -> RepoResult<Option<Subject>>;
    fn create_subject(&self, subject: &NewSubject) -> RepoResult<RecordId>;
    fn update_subject(&self, id: RecordId, patch: &SubjectPatch) -> RepoResult<usize>;
    fn delete_subject(&self, id: RecordId) -> RepoResult<usize>;

    fn list_students(&self) -> RepoResult<Vec<Student>>;
    fn get_student(&self, id: RecordId) -> RepoResult<Option<Student>>;
    fn create_student(&self, student: &NewStudent) -> RepoResult<RecordId>;
    fn update_student(&self, id: RecordId, patch: &StudentPatch) -> RepoResult<usize>;
    fn delete_student(&self, id: RecordId) -> RepoResult<usize>;
    /// Students of a class (optionally one section) with user profile fields.
    fn students_by_class(
        &self,
        class_id: RecordId,
        section_id: Option<RecordId>,
    ) -> RepoResult<Vec<StudentProfile>>;
    /// Moves a student to another class/section.
    fn enroll_student(
        &self,
        student_id: RecordId,
        class_id: RecordId,
        section_id: RecordId,
    ) -> RepoResult<usize>;
    /// Creates a user and its student row as one unit of work.
    fn create_student_with_user(
        &self,
        user: &NewUser,
        enrollment: &StudentEnrollment,
    ) -> RepoResult<StudentAccount>;

    fn assign_teacher_to_class(&self, assignment: &NewTeacherAssignment)
        -> RepoResult<RecordId>;
    fn remove_teacher_assignment(&self, id: RecordId) -> RepoResult<usize>;
    /// Assignments of one teacher with class/section/subject names.
    fn teacher_assignments(&self, teacher_id: RecordId)
        -> RepoResult<Vec<TeacherAssignmentDetail>>;
    /// Every teacher with assigned class names and assignment count.
    fn teachers_with_assignments(&self) -> RepoResult<Vec<TeacherSummary>>;
}

impl AcademicRepository for SqliteRepository<'_> {
    fn list_classes(&self) -> RepoResult<Vec<Class>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{CLASS_SELECT_SQL} ORDER BY id ASC;"))?;
        let classes = stmt
            .query_map([], parse_class_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(classes)
    }

    fn get_class(&self, id: RecordId) -> RepoResult<Option<Class>> {
        let class = self
            .conn
            .query_row(
                &format!("{CLASS_SELECT_SQL} WHERE id = ?1;"),
                [id],
                parse_class_row,
            )
            .optional()?;
        Ok(class)
    }

    fn create_class(&self, class: &NewClass) -> RepoResult<RecordId> {
        let row = class.to_row(0, now_ms())?;
        self.conn.execute(
            "INSERT INTO classes (name, academic_year, board, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5);",
            params![
                row.name,
                row.academic_year,
                row.board,
                row.created_at,
                row.updated_at
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn update_class(&self, id: RecordId, patch: &ClassPatch) -> RepoResult<usize> {
        patch.validate()?;
        let mut update = UpdateBuilder::new("classes");
        if let Some(name) = &patch.name {
            update.set("name", name.clone());
        }
        if let Some(academic_year) = &patch.academic_year {
            update.set("academic_year", academic_year.clone());
        }
        if let Some(board) = &patch.board {
            update.set("board", board.clone());
        }
        update.execute(self.conn, id)
    }

    fn delete_class(&self, id: RecordId) -> RepoResult<usize> {
        delete_by_id(self.conn, "classes", id)
    }

    fn class_with_stats(&self, date: NaiveDate) -> RepoResult<Vec<ClassStats>> {
        let mut stmt = self.conn.prepare(
            "SELECT
                c.id AS class_id,
                c.name AS name,
                c.academic_year AS academic_year,
                c.board AS board,
                COUNT(DISTINCT s.id) AS section_count,
                COUNT(DISTINCT st.id) AS student_count,
                COUNT(DISTINCT CASE WHEN a.status = 'present' THEN a.id END) AS present_count,
                COUNT(DISTINCT CASE WHEN a.status = 'absent' THEN a.id END) AS absent_count,
                COUNT(DISTINCT CASE WHEN a.status = 'late' THEN a.id END) AS late_count
             FROM classes c
             LEFT JOIN sections s ON s.class_id = c.id
             LEFT JOIN students st ON st.section_id = s.id AND st.class_id = c.id
             LEFT JOIN attendance a ON a.student_id = st.id AND a.date = ?1
             GROUP BY c.id
             ORDER BY c.id ASC;",
        )?;
        let stats = stmt
            .query_map([date_value(date)], |row| {
                Ok(ClassStats {
                    class_id: row.get("class_id")?,
                    name: row.get("name")?,
                    academic_year: row.get("academic_year")?,
                    board: row.get("board")?,
                    section_count: row.get("section_count")?,
                    student_count: row.get("student_count")?,
                    present_count: row.get("present_count")?,
                    absent_count: row.get("absent_count")?,
                    late_count: row.get("late_count")?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(stats)
    }

    fn list_sections(&self, class_id: Option<RecordId>) -> RepoResult<Vec<Section>> {
        let mut stmt = self.conn.prepare(&format!(
            "{SECTION_SELECT_SQL} WHERE (?1 IS NULL OR class_id = ?1) ORDER BY id ASC;"
        ))?;
        let sections = stmt
            .query_map([class_id], parse_section_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(sections)
    }

    fn get_section(&self, id: RecordId) -> RepoResult<Option<Section>> {
        let section = self
            .conn
            .query_row(
                &format!("{SECTION_SELECT_SQL} WHERE id = ?1;"),
                [id],
                parse_section_row,
            )
            .optional()?;
        Ok(section)
    }

    fn create_section(&self, section: &NewSection) -> RepoResult<RecordId> {
        let row = section.to_row(0, now_ms())?;
        self.conn.execute(
            "INSERT INTO sections (class_id, name, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4);",
            params![row.class_id, row.name, row.created_at, row.updated_at],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn update_section(&self, id: RecordId, patch: &SectionPatch) -> RepoResult<usize> {
        patch.validate()?;
        let mut update = UpdateBuilder::new("sections");
        if let Some(class_id) = patch.class_id {
            update.set("class_id", class_id);
        }
        if let Some(name) = &patch.name {
            update.set("name", name.clone());
        }
        update.execute(self.conn, id)
    }

    fn delete_section(&self, id: RecordId) -> RepoResult<usize> {
        delete_by_id(self.conn, "sections", id)
    }

    fn list_subjects(&self) -> RepoResult<Vec<Subject>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{SUBJECT_SELECT_SQL} ORDER BY id ASC;"))?;
        let subjects = stmt
            .query_map([], parse_subject_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(subjects)
    }

    fn get_subject(&self, id: RecordId) -> RepoResult<Option<Subject>> {
        let subject = self
            .conn
            .query_row(
                &format!("{SUBJECT_SELECT_SQL} WHERE id = ?1;"),
                [id],
                parse_subject_row,
            )
            .optional()?;
        Ok(subject)
    }

    fn create_subject(&self, subject: &NewSubject) -> RepoResult<RecordId> {
        let row = subject.to_row(0, now_ms())?;
        self.conn.execute(
            "INSERT INTO subjects (name, code, description, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5);",
            params![
                row.name,
                row.code,
                row.description,
                row.created_at,
                row.updated_at
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn update_subject(&self, id: RecordId, patch: &SubjectPatch) -> RepoResult<usize> {
        patch.validate()?;
        let mut update = UpdateBuilder::new("subjects");
        if let Some(name) = &patch.name {
            update.set("name", name.clone());
        }
        if let Some(code) = &patch.code {
            update.set("code", code.clone());
        }
        if let Some(description) = &patch.description {
            update.set("description", description.clone());
        }
        update.execute(self.conn, id)
    }

    fn delete_subject(&self, id: RecordId) -> RepoResult<usize> {
        delete_by_id(self.conn, "subjects", id)
    }

    fn list_students(&self) -> RepoResult<Vec<Student>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{STUDENT_SELECT_SQL} ORDER BY id ASC;"))?;
        let students = stmt
            .query_map([], parse_student_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(students)
    }

    fn get_student(&self, id: RecordId) -> RepoResult<Option<Student>> {
        let student = self
            .conn
            .query_row(
                &format!("{STUDENT_SELECT_SQL} WHERE id = ?1;"),
                [id],
                parse_student_row,
            )
            .optional()?;
        Ok(student)
    }

    fn create_student(&self, student: &NewStudent) -> RepoResult<RecordId> {
        let row = student.to_row(0, now_ms())?;
        self.conn.execute(
            "INSERT INTO students (
                user_id,
                roll_number,
                class_id,
                section_id,
                created_at,
                updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
            params![
                row.user_id,
                row.roll_number,
                row.class_id,
                row.section_id,
                row.created_at,
                row.updated_at
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn update_student(&self, id: RecordId, patch: &StudentPatch) -> RepoResult<usize> {
        patch.validate()?;
        let mut update = UpdateBuilder::new("students");
        if let Some(roll_number) = &patch.roll_number {
            update.set("roll_number", roll_number.clone());
        }
        if let Some(class_id) = patch.class_id {
            update.set("class_id", class_id);
        }
        if let Some(section_id) = patch.section_id {
            update.set("section_id", section_id);
        }
        update.execute(self.conn, id)
    }

    fn delete_student(&self, id: RecordId) -> RepoResult<usize> {
        delete_by_id(self.conn, "students", id)
    }

    fn students_by_class(
        &self,
        class_id: RecordId,
        section_id: Option<RecordId>,
    ) -> RepoResult<Vec<StudentProfile>> {
        let mut stmt = self.conn.prepare(
            "SELECT
                st.id AS student_id,
                st.user_id AS user_id,
                st.roll_number AS roll_number,
                st.class_id AS class_id,
                st.section_id AS section_id,
                u.first_name AS first_name,
                u.last_name AS last_name,
                u.email AS email,
                u.profile_image AS profile_image
             FROM students st
             JOIN users u ON u.id = st.user_id
             WHERE st.class_id = ?1
               AND (?2 IS NULL OR st.section_id = ?2)
             ORDER BY st.id ASC;",
        )?;
        let students = stmt
            .query_map(params![class_id, section_id], |row| {
                Ok(StudentProfile {
                    student_id: row.get("student_id")?,
                    user_id: row.get("user_id")?,
                    roll_number: row.get("roll_number")?,
                    class_id: row.get("class_id")?,
                    section_id: row.get("section_id")?,
                    first_name: row.get("first_name")?,
                    last_name: row.get("last_name")?,
                    email: row.get("email")?,
                    profile_image: row.get("profile_image")?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(students)
    }

    fn enroll_student(
        &self,
        student_id: RecordId,
        class_id: RecordId,
        section_id: RecordId,
    ) -> RepoResult<usize> {
        let mut update = UpdateBuilder::new("students");
        update.set("class_id", class_id).set("section_id", section_id);
        update.execute(self.conn, student_id)
    }

    fn create_student_with_user(
        &self,
        user: &NewUser,
        enrollment: &StudentEnrollment,
    ) -> RepoResult<StudentAccount> {
        self.atomically(|repo| {
            let user_id = repo.create_user(user)?;
            let student_id = repo.create_student(&enrollment.for_user(user_id))?;
            Ok(StudentAccount {
                user_id,
                student_id,
            })
        })
    }

    fn assign_teacher_to_class(
        &self,
        assignment: &NewTeacherAssignment,
    ) -> RepoResult<RecordId> {
        let row = assignment.to_row(0, now_ms());
        self.conn.execute(
            "INSERT INTO teacher_assignments (
                teacher_id,
                class_id,
                section_id,
                subject_id,
                created_at,
                updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
            params![
                row.teacher_id,
                row.class_id,
                row.section_id,
                row.subject_id,
                row.created_at,
                row.updated_at
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn remove_teacher_assignment(&self, id: RecordId) -> RepoResult<usize> {
        delete_by_id(self.conn, "teacher_assignments", id)
    }

    fn teacher_assignments(
        &self,
        teacher_id: RecordId,
    ) -> RepoResult<Vec<TeacherAssignmentDetail>> {
        let mut stmt = self.conn.prepare(
            "SELECT
                ta.id AS id,
                ta.teacher_id AS teacher_id,
                ta.class_id AS class_id,
                c.name AS class_name,
                ta.section_id AS section_id,
                s.name AS section_name,
                ta.subject_id AS subject_id,
                sub.name AS subject_name
             FROM teacher_assignments ta
             JOIN classes c ON c.id = ta.class_id
             JOIN sections s ON s.id = ta.section_id
             LEFT JOIN subjects sub ON sub.id = ta.subject_id
             WHERE ta.teacher_id = ?1
             ORDER BY ta.id ASC;",
        )?;
        let assignments = stmt
            .query_map([teacher_id], |row| {
                Ok(TeacherAssignmentDetail {
                    id: row.get("id")?,
                    teacher_id: row.get("teacher_id")?,
                    class_id: row.get("class_id")?,
                    class_name: row.get("class_name")?,
                    section_id: row.get("section_id")?,
                    section_name: row.get("section_name")?,
                    subject_id: row.get("subject_id")?,
                    subject_name: row.get("subject_name")?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(assignments)
    }

    fn teachers_with_assignments(&self) -> RepoResult<Vec<TeacherSummary>> {
        let mut names_stmt = self.conn.prepare(
            "SELECT DISTINCT ta.teacher_id AS teacher_id, c.name AS class_name
             FROM teacher_assignments ta
             JOIN classes c ON c.id = ta.class_id
             ORDER BY ta.teacher_id ASC, c.name ASC;",
        )?;
        let mut class_names: BTreeMap<RecordId, Vec<String>> = BTreeMap::new();
        let mut rows = names_stmt.query([])?;
        while let Some(row) = rows.next()? {
            class_names
                .entry(row.get("teacher_id")?)
                .or_default()
                .push(row.get("class_name")?);
        }

        let mut stmt = self.conn.prepare(
            "SELECT
                t.id AS teacher_id,
                t.user_id AS user_id,
                u.first_name AS first_name,
                u.last_name AS last_name,
                u.email AS email,
                COUNT(ta.id) AS assignment_count
             FROM teachers t
             JOIN users u ON u.id = t.user_id
             LEFT JOIN teacher_assignments ta ON ta.teacher_id = t.id
             GROUP BY t.id
             ORDER BY t.id ASC;",
        )?;
        let summaries = stmt
            .query_map([], |row| {
                let teacher_id: RecordId = row.get("teacher_id")?;
                Ok(TeacherSummary {
                    teacher_id,
                    user_id: row.get("user_id")?,
                    first_name: row.get("first_name")?,
                    last_name: row.get("last_name")?,
                    email: row.get("email")?,
                    class_names: class_names
                        .get(&teacher_id)
                        .map(|names| names.join(CLASS_NAME_DELIMITER))
                        .unwrap_or_default(),
                    assignment_count: row.get("assignment_count")?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(summaries)
    }
}

fn parse_class_row(row: &Row<'_>) -> rusqlite::Result<Class> {
    Ok(Class {
        id: row.get("id")?,
        name: row.get("name")?,
        academic_year: row.get("academic_year")?,
        board: row.get("board")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn parse_section_row(row: &Row<'_>) -> rusqlite::Result<Section> {
    Ok(Section {
        id: row.get("id")?,
        class_id: row.get("class_id")?,
        name: row.get("name")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn parse_subject_row(row: &Row<'_>) -> rusqlite::Result<Subject> {
    Ok(Subject {
        id: row.get("id")?,
        name: row.get("name")?,
        code: row.get("code")?,
        description: row.get("description")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn parse_student_row(row: &Row<'_>) -> rusqlite::Result<Student> {
    Ok(Student {
        id: row.get("id")?,
        user_id: row.get("user_id")?,
        roll_number: row.get("roll_number")?,
        class_id: row.get("class_id")?,
        section_id: row.get("section_id")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}
