//! Backend-agnostic facade over the school record repositories.
//!
//! # Responsibility
//! - Pick the backend a deployment runs on from [`StoreConfig`].
//! - Expose every repository operation through one handle; callers never
//!   touch the connection manager or the mirror directly.
//! - Own account use cases that span repository calls (login, password
//!   rotation).
//!
//! # Invariants
//! - Every repository call is routed to exactly one backend.
//! - After `close()` every call fails with `RepoError::Closed`.

use crate::config::{BackendConfig, StoreConfig};
use crate::credential::verify_password;
use crate::db::{ConnectionManager, SeedOptions, SeedReport};
use crate::mirror::{FileSnapshotStore, MemorySnapshotStore, MirrorOptions, MirrorStore};
use crate::model::academic::{
    Class, ClassPatch, ClassStats, NewClass, NewSection, NewStudent, NewSubject,
    NewTeacherAssignment, Section, SectionPatch, Student, StudentAccount, StudentEnrollment,
    StudentPatch, StudentProfile, Subject, SubjectPatch, TeacherAssignmentDetail, TeacherSummary,
};
use crate::model::attendance::{
    Attendance, AttendanceEntry, AttendancePatch, AttendanceStat, NewAttendance,
};
use crate::model::camera::{
    Camera, CameraPatch, Feed, FeedEntry, NewCamera, NewFeed, NewSearchLog, SearchLogEntry,
};
use crate::model::homework::{
    Homework, HomeworkDetail, HomeworkPatch, HomeworkStatusUpdate, HomeworkSubmission,
    NewHomework, StudentHomework,
};
use crate::model::identity::{
    NewRole, NewUser, Role, RolePatch, Teacher, User, UserPatch, UserWithRole,
};
use crate::model::RecordId;
use crate::repo::{
    AcademicRepository, AttendanceRepository, CameraRepository, HomeworkRepository,
    IdentityRepository, RepoResult, Repositories,
};
use chrono::NaiveDate;
use log::info;

/// Storage engine behind a [`SchoolStore`].
pub enum StoreBackend {
    Sqlite(ConnectionManager),
    Mirror(MirrorStore),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Sqlite,
    Mirror,
}

impl BackendKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sqlite => "sqlite",
            Self::Mirror => "mirror",
        }
    }
}

/// Single entry point for callers of the data layer.
pub struct SchoolStore {
    backend: StoreBackend,
}

impl SchoolStore {
    /// Builds and initializes the backend named by `config`.
    ///
    /// # Errors
    /// - Propagates connection, schema, seed and snapshot restore failures.
    pub fn open(config: &StoreConfig) -> RepoResult<Self> {
        let seed = SeedOptions {
            admin_secret: config.admin_secret.clone(),
        };
        match &config.backend {
            BackendConfig::Sqlite { target } => {
                Self::from_manager(ConnectionManager::new(target.clone(), seed))
            }
            BackendConfig::Mirror {
                snapshot_dir,
                compact_every,
                demo_fixtures,
            } => {
                let options = MirrorOptions {
                    compact_every: *compact_every,
                    demo_fixtures: *demo_fixtures,
                    seed,
                };
                let mirror = match snapshot_dir {
                    Some(dir) => MirrorStore::open(FileSnapshotStore::open(dir)?, options)?,
                    None => MirrorStore::open(MemorySnapshotStore::new(), options)?,
                };
                Ok(Self::from_mirror(mirror))
            }
        }
    }

    /// Wraps a connection manager, initializing it if needed.
    pub fn from_manager(manager: ConnectionManager) -> RepoResult<Self> {
        manager.initialize()?;
        info!("event=store_open module=service status=ok backend=sqlite");
        Ok(Self {
            backend: StoreBackend::Sqlite(manager),
        })
    }

    pub fn from_mirror(mirror: MirrorStore) -> Self {
        info!("event=store_open module=service status=ok backend=mirror");
        Self {
            backend: StoreBackend::Mirror(mirror),
        }
    }

    pub fn backend(&self) -> &StoreBackend {
        &self.backend
    }

    pub fn backend_kind(&self) -> BackendKind {
        match self.backend {
            StoreBackend::Sqlite(_) => BackendKind::Sqlite,
            StoreBackend::Mirror(_) => BackendKind::Mirror,
        }
    }

    /// Outcome of the seed loader run while opening the backend.
    pub fn seed_report(&self) -> Option<&SeedReport> {
        match &self.backend {
            StoreBackend::Sqlite(manager) => manager.seed_report(),
            StoreBackend::Mirror(mirror) => Some(mirror.seed_report()),
        }
    }

    /// Runs `op` against the active backend's repositories.
    pub fn with_repos<T>(
        &self,
        op: impl FnOnce(&dyn Repositories) -> RepoResult<T>,
    ) -> RepoResult<T> {
        match &self.backend {
            StoreBackend::Sqlite(manager) => manager.with_repository(|repo| op(repo)),
            StoreBackend::Mirror(mirror) => op(mirror),
        }
    }

    /// Returns the account for a matching username and password.
    ///
    /// Unknown users, wrong passwords and inactive accounts all yield `None`.
    pub fn authenticate(&self, username: &str, password: &str) -> RepoResult<Option<User>> {
        let user = self.get_user_by_username(username)?;
        let accepted = user
            .filter(|user| user.is_active && verify_password(&user.password_hash, password));
        info!(
            "event=auth_attempt module=service status={}",
            if accepted.is_some() { "ok" } else { "rejected" }
        );
        Ok(accepted)
    }

    /// Sets a new password and clears the forced-rotation flag.
    ///
    /// Returns the number of rows changed (`0` for an unknown user).
    pub fn change_password(&self, user_id: RecordId, new_password: &str) -> RepoResult<usize> {
        self.update_user(
            user_id,
            &UserPatch {
                password: Some(new_password.to_string()),
                must_change_password: Some(false),
                ..UserPatch::default()
            },
        )
    }

    /// Releases the backend. Later calls fail with `RepoError::Closed`.
    pub fn close(&self) -> RepoResult<()> {
        match &self.backend {
            StoreBackend::Sqlite(manager) => manager.close(),
            StoreBackend::Mirror(mirror) => mirror.close(),
        }
    }
}

/// Forwards trait methods to whichever backend is active.
macro_rules! route {
    ($(fn $name:ident(&self $(, $arg:ident: $ty:ty)*) -> $ret:ty;)*) => {
        $(
            fn $name(&self $(, $arg: $ty)*) -> $ret {
                self.with_repos(|repo| repo.$name($($arg),*))
            }
        )*
    };
}

impl IdentityRepository for SchoolStore {
    route! {
        fn list_roles(&self) -> RepoResult<Vec<Role>>;
        fn get_role(&self, id: RecordId) -> RepoResult<Option<Role>>;
        fn get_role_by_name(&self, name: &str) -> RepoResult<Option<Role>>;
        fn create_role(&self, role: &NewRole) -> RepoResult<RecordId>;
        fn update_role(&self, id: RecordId, patch: &RolePatch) -> RepoResult<usize>;
        fn delete_role(&self, id: RecordId) -> RepoResult<usize>;
        fn list_users(&self) -> RepoResult<Vec<User>>;
        fn get_user(&self, id: RecordId) -> RepoResult<Option<User>>;
        fn get_user_by_username(&self, username: &str) -> RepoResult<Option<User>>;
        fn list_users_with_roles(&self) -> RepoResult<Vec<UserWithRole>>;
        fn create_user(&self, user: &NewUser) -> RepoResult<RecordId>;
        fn update_user(&self, id: RecordId, patch: &UserPatch) -> RepoResult<usize>;
        fn delete_user(&self, id: RecordId) -> RepoResult<usize>;
        fn list_teachers(&self) -> RepoResult<Vec<Teacher>>;
        fn get_teacher(&self, id: RecordId) -> RepoResult<Option<Teacher>>;
        fn create_teacher(&self, user_id: RecordId) -> RepoResult<RecordId>;
        fn delete_teacher(&self, id: RecordId) -> RepoResult<usize>;
    }
}

impl AcademicRepository for SchoolStore {
    route! {
        fn list_classes(&self) -> RepoResult<Vec<Class>>;
        fn get_class(&self, id: RecordId) -> RepoResult<Option<Class>>;
        fn create_class(&self, class: &NewClass) -> RepoResult<RecordId>;
        fn update_class(&self, id: RecordId, patch: &ClassPatch) -> RepoResult<usize>;
        fn delete_class(&self, id: RecordId) -> RepoResult<usize>;
        fn class_with_stats(&self, date: NaiveDate) -> RepoResult<Vec<ClassStats>>;
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
        fn students_by_class(
            &self,
            class_id: RecordId,
            section_id: Option<RecordId>
        ) -> RepoResult<Vec<StudentProfile>>;
        fn enroll_student(
            &self,
            student_id: RecordId,
            class_id: RecordId,
            section_id: RecordId
        ) -> RepoResult<usize>;
        fn create_student_with_user(
            &self,
            user: &NewUser,
            enrollment: &StudentEnrollment
        ) -> RepoResult<StudentAccount>;
        fn assign_teacher_to_class(
            &self,
            assignment: &NewTeacherAssignment
        ) -> RepoResult<RecordId>;
        fn remove_teacher_assignment(&self, id: RecordId) -> RepoResult<usize>;
        fn teacher_assignments(
            &self,
            teacher_id: RecordId
        ) -> RepoResult<Vec<TeacherAssignmentDetail>>;
        fn teachers_with_assignments(&self) -> RepoResult<Vec<TeacherSummary>>;
    }
}

impl HomeworkRepository for SchoolStore {
    route! {
        fn list_homework(&self) -> RepoResult<Vec<Homework>>;
        fn get_homework(&self, id: RecordId) -> RepoResult<Option<Homework>>;
        fn create_homework(&self, homework: &NewHomework) -> RepoResult<RecordId>;
        fn update_homework(&self, id: RecordId, patch: &HomeworkPatch) -> RepoResult<usize>;
        fn delete_homework(&self, id: RecordId) -> RepoResult<usize>;
        fn homework_by_class(
            &self,
            class_id: RecordId,
            section_id: Option<RecordId>
        ) -> RepoResult<Vec<HomeworkDetail>>;
        fn homework_for_student(
            &self,
            student_id: RecordId,
            class_id: RecordId,
            section_id: RecordId
        ) -> RepoResult<Vec<StudentHomework>>;
        fn homework_history(&self, student_id: RecordId) -> RepoResult<Vec<StudentHomework>>;
        fn update_homework_status(
            &self,
            update: &HomeworkStatusUpdate
        ) -> RepoResult<HomeworkSubmission>;
        fn get_homework_status(
            &self,
            homework_id: RecordId,
            student_id: RecordId
        ) -> RepoResult<Option<HomeworkSubmission>>;
    }
}

impl AttendanceRepository for SchoolStore {
    route! {
        fn list_attendance(&self) -> RepoResult<Vec<Attendance>>;
        fn get_attendance(&self, id: RecordId) -> RepoResult<Option<Attendance>>;
        fn create_attendance(&self, attendance: &NewAttendance) -> RepoResult<RecordId>;
        fn update_attendance(&self, id: RecordId, patch: &AttendancePatch) -> RepoResult<usize>;
        fn delete_attendance(&self, id: RecordId) -> RepoResult<usize>;
        fn attendance_by_date_and_class(
            &self,
            date: NaiveDate,
            class_id: RecordId
        ) -> RepoResult<Vec<AttendanceEntry>>;
        fn bulk_create_attendance(&self, marks: &[NewAttendance]) -> RepoResult<Vec<RecordId>>;
        fn attendance_stats(
            &self,
            class_id: RecordId,
            start: NaiveDate,
            end: NaiveDate
        ) -> RepoResult<Vec<AttendanceStat>>;
    }
}

impl CameraRepository for SchoolStore {
    route! {
        fn list_cameras(&self) -> RepoResult<Vec<Camera>>;
        fn get_camera(&self, id: RecordId) -> RepoResult<Option<Camera>>;
        fn create_camera(&self, camera: &NewCamera) -> RepoResult<RecordId>;
        fn update_camera(&self, id: RecordId, patch: &CameraPatch) -> RepoResult<usize>;
        fn delete_camera(&self, id: RecordId) -> RepoResult<usize>;
        fn create_feed(&self, feed: &NewFeed) -> RepoResult<RecordId>;
        fn feeds_by_date_range(
            &self,
            start: NaiveDate,
            end: NaiveDate
        ) -> RepoResult<Vec<FeedEntry>>;
        fn feeds_by_camera(&self, camera_id: RecordId, limit: u32) -> RepoResult<Vec<Feed>>;
        fn detections_by_person(&self, person_id: RecordId) -> RepoResult<Vec<FeedEntry>>;
        fn log_ai_search(&self, log: &NewSearchLog) -> RepoResult<RecordId>;
        fn ai_search_logs(
            &self,
            user_id: Option<RecordId>,
            limit: u32
        ) -> RepoResult<Vec<SearchLogEntry>>;
    }
}
