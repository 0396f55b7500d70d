//! Illustrative demo dataset for fresh mirror deployments.
//!
//! Everything is written through the repository traits, so the fixtures obey
//! the same validation and constraints as caller data. Demo accounts get
//! generated passwords.

use crate::credential::generate_secret;
use crate::db::seed::{STUDENT_ROLE, TEACHER_ROLE};
use crate::model::academic::{
    NewClass, NewSection, NewSubject, NewTeacherAssignment, StudentEnrollment,
};
use crate::model::camera::NewCamera;
use crate::model::homework::NewHomework;
use crate::model::identity::NewUser;
use crate::model::RecordId;
use crate::repo::{RepoError, RepoResult, Repositories};
use chrono::{Days, Utc};
use log::info;

const ACADEMIC_YEAR: &str = "2024-2025";
const BOARD: &str = "CBSE";

/// What the demo load created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DemoSummary {
    pub classes: usize,
    pub sections: usize,
    pub subjects: usize,
    pub students: usize,
    pub cameras: usize,
    pub homework: usize,
}

/// Loads the demo dataset.
///
/// # Errors
/// - `InvalidData` when the baseline `Teacher` or `Student` role is missing.
/// - Constraint violations when demo rows already exist.
pub fn load_demo_fixtures<R>(repo: &R) -> RepoResult<DemoSummary>
where
    R: Repositories + ?Sized,
{
    let teacher_role = required_role(repo, TEACHER_ROLE)?;
    let student_role = required_role(repo, STUDENT_ROLE)?;

    let mut sections = Vec::new();
    for class_name in ["Grade 6", "Grade 7"] {
        let class_id = repo.create_class(&NewClass {
            name: class_name.to_string(),
            academic_year: ACADEMIC_YEAR.to_string(),
            board: BOARD.to_string(),
        })?;
        for section_name in ["A", "B"] {
            let section_id = repo.create_section(&NewSection {
                class_id,
                name: section_name.to_string(),
            })?;
            sections.push((class_id, section_id));
        }
    }

    let mut subjects = Vec::new();
    for (name, code) in [
        ("Mathematics", "MATH101"),
        ("Science", "SCI101"),
        ("English", "ENG101"),
    ] {
        subjects.push(repo.create_subject(&NewSubject {
            name: name.to_string(),
            code: code.to_string(),
            description: None,
        })?);
    }

    let teacher_user = repo.create_user(&NewUser {
        username: "demo.teacher".to_string(),
        password: generate_secret(),
        email: "demo.teacher@school.com".to_string(),
        role_id: teacher_role,
        first_name: "Asha".to_string(),
        last_name: "Menon".to_string(),
        profile_image: None,
    })?;
    let teacher_id = repo.create_teacher(teacher_user)?;
    for ((class_id, section_id), subject_id) in sections.iter().zip(&subjects) {
        repo.assign_teacher_to_class(&NewTeacherAssignment {
            teacher_id,
            class_id: *class_id,
            section_id: *section_id,
            subject_id: Some(*subject_id),
        })?;
    }

    let students = [
        ("demo.student1", "Ravi", "Kumar"),
        ("demo.student2", "Meera", "Iyer"),
        ("demo.student3", "Kabir", "Shah"),
        ("demo.student4", "Zoya", "Khan"),
    ];
    for (index, ((username, first_name, last_name), (class_id, section_id))) in
        students.iter().zip(&sections).enumerate()
    {
        repo.create_student_with_user(
            &NewUser {
                username: (*username).to_string(),
                password: generate_secret(),
                email: format!("{username}@school.com"),
                role_id: student_role,
                first_name: (*first_name).to_string(),
                last_name: (*last_name).to_string(),
                profile_image: None,
            },
            &StudentEnrollment {
                roll_number: format!("{:03}", index + 1),
                class_id: *class_id,
                section_id: *section_id,
            },
        )?;
    }

    for (name, location, ip_address) in [
        ("Main Gate", "Entrance", "192.168.1.10"),
        ("Library", "Library Hall", "192.168.1.11"),
    ] {
        repo.create_camera(&NewCamera {
            name: name.to_string(),
            location: location.to_string(),
            ip_address: Some(ip_address.to_string()),
        })?;
    }

    let due_date = Utc::now()
        .date_naive()
        .checked_add_days(Days::new(7))
        .unwrap_or_else(|| Utc::now().date_naive());
    let homework = [
        (sections[0], subjects[0], "Fractions worksheet"),
        (sections[2], subjects[2], "Essay: my school"),
    ];
    for ((class_id, section_id), subject_id, title) in homework {
        repo.create_homework(&NewHomework {
            class_id,
            section_id,
            subject_id,
            teacher_id,
            title: title.to_string(),
            description: None,
            due_date,
        })?;
    }

    let summary = DemoSummary {
        classes: 2,
        sections: sections.len(),
        subjects: subjects.len(),
        students: students.len(),
        cameras: 2,
        homework: homework.len(),
    };
    info!(
        "event=fixtures_load module=fixtures status=ok classes={} sections={} students={}",
        summary.classes, summary.sections, summary.students
    );
    Ok(summary)
}

fn required_role<R>(repo: &R, name: &str) -> RepoResult<RecordId>
where
    R: Repositories + ?Sized,
{
    repo.get_role_by_name(name)?
        .map(|role| role.id)
        .ok_or_else(|| RepoError::InvalidData(format!("baseline role `{name}` is missing")))
}
