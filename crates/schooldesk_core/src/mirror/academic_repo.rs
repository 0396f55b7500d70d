use super::MirrorStore;
use crate::model::academic::{
    Class, ClassPatch, ClassStats, NewClass, NewSection, NewStudent, NewSubject,
    NewTeacherAssignment, Section, SectionPatch, Student, StudentAccount, StudentEnrollment,
    StudentPatch, StudentProfile, Subject, SubjectPatch, TeacherAssignment,
    TeacherAssignmentDetail, TeacherSummary, CLASS_NAME_DELIMITER,
};
use crate::model::attendance::AttendanceStatus;
use crate::model::identity::NewUser;
use crate::model::{now_ms, RecordId};
use crate::repo::{AcademicRepository, RepoResult};
use chrono::NaiveDate;
use std::collections::{BTreeSet, HashSet};

impl AcademicRepository for MirrorStore {
    fn list_classes(&self) -> RepoResult<Vec<Class>> {
        self.read(|state| Ok(state.classes.values().cloned().collect()))
    }

    fn get_class(&self, id: RecordId) -> RepoResult<Option<Class>> {
        self.read(|state| Ok(state.classes.get(&id).cloned()))
    }

    fn create_class(&self, class: &NewClass) -> RepoResult<RecordId> {
        let row = class.to_row(0, now_ms())?;
        self.write(|tx| tx.insert(row))
    }

    fn update_class(&self, id: RecordId, patch: &ClassPatch) -> RepoResult<usize> {
        patch.validate()?;
        let now = now_ms();
        self.write(|tx| tx.update::<Class>(id, |row| patch.apply(row, now)))
    }

    fn delete_class(&self, id: RecordId) -> RepoResult<usize> {
        self.write(|tx| tx.remove::<Class>(id))
    }

    fn class_with_stats(&self, date: NaiveDate) -> RepoResult<Vec<ClassStats>> {
        self.read(|state| {
            let stats = state
                .classes
                .values()
                .map(|class| {
                    let section_ids: HashSet<RecordId> = state
                        .sections
                        .values()
                        .filter(|section| section.class_id == class.id)
                        .map(|section| section.id)
                        .collect();
                    let student_ids: HashSet<RecordId> = state
                        .students
                        .values()
                        .filter(|student| {
                            student.class_id == class.id
                                && section_ids.contains(&student.section_id)
                        })
                        .map(|student| student.id)
                        .collect();
                    let count_status = |status: AttendanceStatus| {
                        state
                            .attendance
                            .values()
                            .filter(|mark| {
                                mark.date == date
                                    && mark.status == status
                                    && student_ids.contains(&mark.student_id)
                            })
                            .count() as i64
                    };
                    ClassStats {
                        class_id: class.id,
                        name: class.name.clone(),
                        academic_year: class.academic_year.clone(),
                        board: class.board.clone(),
                        section_count: section_ids.len() as i64,
                        student_count: student_ids.len() as i64,
                        present_count: count_status(AttendanceStatus::Present),
                        absent_count: count_status(AttendanceStatus::Absent),
                        late_count: count_status(AttendanceStatus::Late),
                    }
                })
                .collect();
            Ok(stats)
        })
    }

    fn list_sections(&self, class_id: Option<RecordId>) -> RepoResult<Vec<Section>> {
        self.read(|state| {
            Ok(state
                .sections
                .values()
                .filter(|section| class_id.map_or(true, |id| section.class_id == id))
                .cloned()
                .collect())
        })
    }

    fn get_section(&self, id: RecordId) -> RepoResult<Option<Section>> {
        self.read(|state| Ok(state.sections.get(&id).cloned()))
    }

    fn create_section(&self, section: &NewSection) -> RepoResult<RecordId> {
        let row = section.to_row(0, now_ms())?;
        self.write(|tx| tx.insert(row))
    }

    fn update_section(&self, id: RecordId, patch: &SectionPatch) -> RepoResult<usize> {
        patch.validate()?;
        let now = now_ms();
        self.write(|tx| tx.update::<Section>(id, |row| patch.apply(row, now)))
    }

    fn delete_section(&self, id: RecordId) -> RepoResult<usize> {
        self.write(|tx| tx.remove::<Section>(id))
    }

    fn list_subjects(&self) -> RepoResult<Vec<Subject>> {
        self.read(|state| Ok(state.subjects.values().cloned().collect()))
    }

    fn get_subject(&self, id: RecordId) -> RepoResult<Option<Subject>> {
        self.read(|state| Ok(state.subjects.get(&id).cloned()))
    }

    fn create_subject(&self, subject: &NewSubject) -> RepoResult<RecordId> {
        let row = subject.to_row(0, now_ms())?;
        self.write(|tx| tx.insert(row))
    }

    fn update_subject(&self, id: RecordId, patch: &SubjectPatch) -> RepoResult<usize> {
        patch.validate()?;
        let now = now_ms();
        self.write(|tx| tx.update::<Subject>(id, |row| patch.apply(row, now)))
    }

    fn delete_subject(&self, id: RecordId) -> RepoResult<usize> {
        self.write(|tx| tx.remove::<Subject>(id))
    }

    fn list_students(&self) -> RepoResult<Vec<Student>> {
        self.read(|state| Ok(state.students.values().cloned().collect()))
    }

    fn get_student(&self, id: RecordId) -> RepoResult<Option<Student>> {
        self.read(|state| Ok(state.students.get(&id).cloned()))
    }

    fn create_student(&self, student: &NewStudent) -> RepoResult<RecordId> {
        let row = student.to_row(0, now_ms())?;
        self.write(|tx| tx.insert(row))
    }

    fn update_student(&self, id: RecordId, patch: &StudentPatch) -> RepoResult<usize> {
        patch.validate()?;
        let now = now_ms();
        self.write(|tx| tx.update::<Student>(id, |row| patch.apply(row, now)))
    }

    fn delete_student(&self, id: RecordId) -> RepoResult<usize> {
        self.write(|tx| tx.remove::<Student>(id))
    }

    fn students_by_class(
        &self,
        class_id: RecordId,
        section_id: Option<RecordId>,
    ) -> RepoResult<Vec<StudentProfile>> {
        self.read(|state| {
            Ok(state
                .students
                .values()
                .filter(|student| {
                    student.class_id == class_id
                        && section_id.map_or(true, |id| student.section_id == id)
                })
                .filter_map(|student| {
                    state.users.get(&student.user_id).map(|user| StudentProfile {
                        student_id: student.id,
                        user_id: user.id,
                        roll_number: student.roll_number.clone(),
                        class_id: student.class_id,
                        section_id: student.section_id,
                        first_name: user.first_name.clone(),
                        last_name: user.last_name.clone(),
                        email: user.email.clone(),
                        profile_image: user.profile_image.clone(),
                    })
                })
                .collect())
        })
    }

    fn enroll_student(
        &self,
        student_id: RecordId,
        class_id: RecordId,
        section_id: RecordId,
    ) -> RepoResult<usize> {
        let now = now_ms();
        self.write(|tx| {
            tx.update::<Student>(student_id, |row| {
                row.class_id = class_id;
                row.section_id = section_id;
                row.updated_at = now;
            })
        })
    }

    fn create_student_with_user(
        &self,
        user: &NewUser,
        enrollment: &StudentEnrollment,
    ) -> RepoResult<StudentAccount> {
        let now = now_ms();
        let user_row = user.to_row(0, now)?;
        self.write_atomically(|tx| {
            let user_id = tx.insert(user_row)?;
            let student_row = enrollment.for_user(user_id).to_row(0, now)?;
            let student_id = tx.insert(student_row)?;
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
        self.write(|tx| tx.insert(row))
    }

    fn remove_teacher_assignment(&self, id: RecordId) -> RepoResult<usize> {
        self.write(|tx| tx.remove::<TeacherAssignment>(id))
    }

    fn teacher_assignments(
        &self,
        teacher_id: RecordId,
    ) -> RepoResult<Vec<TeacherAssignmentDetail>> {
        self.read(|state| {
            Ok(state
                .teacher_assignments
                .values()
                .filter(|assignment| assignment.teacher_id == teacher_id)
                .filter_map(|assignment| {
                    let class = state.classes.get(&assignment.class_id)?;
                    let section = state.sections.get(&assignment.section_id)?;
                    let subject_name = assignment
                        .subject_id
                        .and_then(|id| state.subjects.get(&id))
                        .map(|subject| subject.name.clone());
                    Some(TeacherAssignmentDetail {
                        id: assignment.id,
                        teacher_id: assignment.teacher_id,
                        class_id: class.id,
                        class_name: class.name.clone(),
                        section_id: section.id,
                        section_name: section.name.clone(),
                        subject_id: assignment.subject_id,
                        subject_name,
                    })
                })
                .collect())
        })
    }

    fn teachers_with_assignments(&self) -> RepoResult<Vec<TeacherSummary>> {
        self.read(|state| {
            Ok(state
                .teachers
                .values()
                .filter_map(|teacher| {
                    let user = state.users.get(&teacher.user_id)?;
                    let assignments: Vec<_> = state
                        .teacher_assignments
                        .values()
                        .filter(|assignment| assignment.teacher_id == teacher.id)
                        .collect();
                    let class_names: BTreeSet<&str> = assignments
                        .iter()
                        .filter_map(|assignment| state.classes.get(&assignment.class_id))
                        .map(|class| class.name.as_str())
                        .collect();
                    Some(TeacherSummary {
                        teacher_id: teacher.id,
                        user_id: user.id,
                        first_name: user.first_name.clone(),
                        last_name: user.last_name.clone(),
                        email: user.email.clone(),
                        class_names: class_names
                            .into_iter()
                            .collect::<Vec<_>>()
                            .join(CLASS_NAME_DELIMITER),
                        assignment_count: assignments.len() as i64,
                    })
                })
                .collect())
        })
    }
}
