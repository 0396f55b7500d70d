//! Behavior both backends must share, checked against each of them.

use chrono::NaiveDate;
use schooldesk_core::db::seed::TEACHER_ROLE;
use schooldesk_core::db::{ConnectionManager, DbTarget, SeedOptions};
use schooldesk_core::mirror::{MemorySnapshotStore, MirrorOptions, MirrorStore};
use schooldesk_core::model::academic::{
    ClassPatch, NewClass, NewSection, NewSubject, NewTeacherAssignment, StudentEnrollment,
};
use schooldesk_core::model::attendance::{AttendanceMode, AttendanceStatus, NewAttendance};
use schooldesk_core::model::camera::{NewCamera, NewFeed, NewSearchLog};
use schooldesk_core::model::homework::{
    HomeworkPatch, HomeworkState, HomeworkStatusUpdate, NewHomework,
};
use schooldesk_core::model::identity::{NewRole, NewUser, PermissionSet};
use schooldesk_core::{
    AcademicRepository, AttendanceRepository, CameraRepository, HomeworkRepository,
    IdentityRepository, RecordId, RepoError, SchoolStore,
};

const SECRET: &str = "bootstrap-secret";

fn seed() -> SeedOptions {
    SeedOptions {
        admin_secret: Some(SECRET.to_string()),
    }
}

fn backends() -> Vec<(&'static str, SchoolStore)> {
    let sqlite =
        SchoolStore::from_manager(ConnectionManager::new(DbTarget::Memory, seed())).unwrap();
    let mirror = MirrorStore::open(
        MemorySnapshotStore::new(),
        MirrorOptions {
            demo_fixtures: false,
            seed: seed(),
            ..MirrorOptions::default()
        },
    )
    .unwrap();
    vec![("sqlite", sqlite), ("mirror", SchoolStore::from_mirror(mirror))]
}

fn day(year: i32, month: u32, date: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, date).unwrap()
}

fn at_hour(date: NaiveDate, hour: u32) -> i64 {
    date.and_hms_opt(hour, 0, 0)
        .unwrap()
        .and_utc()
        .timestamp_millis()
}

fn new_user(username: &str, role_id: RecordId) -> NewUser {
    NewUser {
        username: username.to_string(),
        password: "password-123".to_string(),
        email: format!("{username}@school.com"),
        role_id,
        first_name: format!("{username}-first"),
        last_name: format!("{username}-last"),
        profile_image: None,
    }
}

fn teacher_role(store: &SchoolStore) -> RecordId {
    store.get_role_by_name(TEACHER_ROLE).unwrap().unwrap().id
}

fn create_class(store: &SchoolStore, name: &str) -> RecordId {
    store
        .create_class(&NewClass {
            name: name.to_string(),
            academic_year: "2024-2025".to_string(),
            board: "CBSE".to_string(),
        })
        .unwrap()
}

fn create_section(store: &SchoolStore, class_id: RecordId, name: &str) -> RecordId {
    store
        .create_section(&NewSection {
            class_id,
            name: name.to_string(),
        })
        .unwrap()
}

fn create_subject(store: &SchoolStore, code: &str) -> RecordId {
    store
        .create_subject(&NewSubject {
            name: format!("Subject {code}"),
            code: code.to_string(),
            description: None,
        })
        .unwrap()
}

fn create_teacher(store: &SchoolStore, username: &str) -> RecordId {
    let user_id = store
        .create_user(&new_user(username, teacher_role(store)))
        .unwrap();
    store.create_teacher(user_id).unwrap()
}

fn enroll(
    store: &SchoolStore,
    username: &str,
    roll_number: &str,
    class_id: RecordId,
    section_id: RecordId,
) -> RecordId {
    let role_id = store.get_role_by_name("Student").unwrap().unwrap().id;
    store
        .create_student_with_user(
            &new_user(username, role_id),
            &StudentEnrollment {
                roll_number: roll_number.to_string(),
                class_id,
                section_id,
            },
        )
        .unwrap()
        .student_id
}

fn mark(student_id: RecordId, date: NaiveDate, status: AttendanceStatus) -> NewAttendance {
    NewAttendance {
        student_id,
        date,
        status,
        remarks: None,
        marked_by: None,
        mode: AttendanceMode::Manual,
    }
}

fn counts(repo: &dyn IdentityRepository) -> (usize, usize) {
    (
        repo.list_roles().unwrap().len(),
        repo.list_users().unwrap().len(),
    )
}

fn assert_constraint(result: Result<RecordId, RepoError>, fragment: &str, backend: &str) {
    match result {
        Err(RepoError::ConstraintViolation(message)) => {
            assert!(message.contains(fragment), "{backend}: {message}");
        }
        other => panic!("{backend}: expected constraint violation, got {other:?}"),
    }
}

#[test]
fn initialization_is_idempotent() {
    let manager = ConnectionManager::new(DbTarget::Memory, seed());
    manager.initialize().unwrap();
    let first = manager.with_repository(|repo| Ok(counts(repo))).unwrap();
    for _ in 0..3 {
        manager.initialize().unwrap();
        manager
            .with_repository(|repo| schooldesk_core::db::ensure_seed(repo, &seed()))
            .unwrap();
    }
    assert_eq!(
        manager.with_repository(|repo| Ok(counts(repo))).unwrap(),
        first
    );
    assert_eq!(first, (5, 1));

    let snapshots = MemorySnapshotStore::new();
    let options = MirrorOptions {
        demo_fixtures: false,
        seed: seed(),
        ..MirrorOptions::default()
    };
    for _ in 0..3 {
        let mirror = MirrorStore::open(snapshots.clone(), options.clone()).unwrap();
        assert_eq!(counts(&mirror), (5, 1));
        mirror.close().unwrap();
    }
}

#[test]
fn duplicate_unique_fields_are_rejected() {
    for (backend, store) in backends() {
        let role_id = teacher_role(&store);
        let role_result = store.create_role(&NewRole {
            name: TEACHER_ROLE.to_string(),
            description: None,
            permissions: PermissionSet::default(),
        });
        assert_constraint(role_result, "roles.name", backend);

        let user_id = store.create_user(&new_user("asha", role_id)).unwrap();
        assert_constraint(
            store.create_user(&new_user("asha", role_id)),
            "users.username",
            backend,
        );
        let mut same_email = new_user("asha.two", role_id);
        same_email.email = "asha@school.com".to_string();
        assert_constraint(store.create_user(&same_email), "users.email", backend);
        let original = store.get_user(user_id).unwrap().unwrap();
        assert_eq!(original.username, "asha", "{backend}");

        let class_id = create_class(&store, "Grade 5");
        assert_constraint(
            store.create_class(&NewClass {
                name: "Grade 5".to_string(),
                academic_year: "2025-2026".to_string(),
                board: "ICSE".to_string(),
            }),
            "classes.name",
            backend,
        );
        assert_eq!(
            store.get_class(class_id).unwrap().unwrap().academic_year,
            "2024-2025",
            "{backend}"
        );

        create_subject(&store, "MATH5");
        assert_constraint(
            store.create_subject(&NewSubject {
                name: "Other".to_string(),
                code: "MATH5".to_string(),
                description: None,
            }),
            "subjects.code",
            backend,
        );
        assert_eq!(store.list_subjects().unwrap().len(), 1, "{backend}");
    }
}

#[test]
fn ids_are_never_reused() {
    for (backend, store) in backends() {
        let role_id = teacher_role(&store);
        let ids: Vec<RecordId> = ["u.one", "u.two", "u.three"]
            .iter()
            .map(|name| store.create_user(&new_user(name, role_id)).unwrap())
            .collect();
        assert!(ids.windows(2).all(|pair| pair[0] < pair[1]), "{backend}");

        assert_eq!(store.delete_user(ids[1]).unwrap(), 1, "{backend}");
        let next = store.create_user(&new_user("u.four", role_id)).unwrap();
        assert!(next > ids[2], "{backend}: {next} <= {}", ids[2]);

        assert_eq!(store.delete_user(ids[2]).unwrap(), 1, "{backend}");
        assert_eq!(store.delete_user(next).unwrap(), 1, "{backend}");
        let after_tail_delete = store.create_user(&new_user("u.five", role_id)).unwrap();
        assert!(after_tail_delete > next, "{backend}");
    }
}

#[test]
fn missing_ids_report_zero_rows() {
    for (backend, store) in backends() {
        let patch = ClassPatch {
            board: Some("IB".to_string()),
            ..ClassPatch::default()
        };
        assert_eq!(store.update_class(404, &patch).unwrap(), 0, "{backend}");
        assert_eq!(store.delete_class(404).unwrap(), 0, "{backend}");
        assert_eq!(store.delete_camera(404).unwrap(), 0, "{backend}");
        assert_eq!(store.remove_teacher_assignment(404).unwrap(), 0, "{backend}");
        assert!(store.get_homework(404).unwrap().is_none(), "{backend}");
    }
}

#[test]
fn invalid_input_is_rejected_before_any_write() {
    for (backend, store) in backends() {
        let role_id = teacher_role(&store);
        let users_before = store.list_users().unwrap().len();

        let mut bad_email = new_user("valid.name", role_id);
        bad_email.email = "not-an-email".to_string();
        assert!(
            matches!(store.create_user(&bad_email), Err(RepoError::Validation(_))),
            "{backend}"
        );
        let mut short_password = new_user("valid.name", role_id);
        short_password.password = "short".to_string();
        assert!(
            matches!(
                store.create_user(&short_password),
                Err(RepoError::Validation(_))
            ),
            "{backend}"
        );
        assert!(
            matches!(
                store.create_class(&NewClass {
                    name: "   ".to_string(),
                    academic_year: "2024-2025".to_string(),
                    board: String::new(),
                }),
                Err(RepoError::Validation(_))
            ),
            "{backend}"
        );
        assert_eq!(store.list_users().unwrap().len(), users_before, "{backend}");
        assert!(store.list_classes().unwrap().is_empty(), "{backend}");
    }
}

#[test]
fn deleting_a_referenced_row_is_rejected() {
    for (backend, store) in backends() {
        let class_id = create_class(&store, "Grade 4");
        let section_id = create_section(&store, class_id, "A");

        match store.delete_class(class_id) {
            Err(RepoError::ConstraintViolation(message)) => {
                assert!(message.contains("FOREIGN KEY"), "{backend}: {message}");
            }
            other => panic!("{backend}: expected constraint violation, got {other:?}"),
        }
        assert!(store.get_class(class_id).unwrap().is_some(), "{backend}");

        assert_eq!(store.delete_section(section_id).unwrap(), 1, "{backend}");
        assert_eq!(store.delete_class(class_id).unwrap(), 1, "{backend}");
    }
}

#[test]
fn students_by_class_filters_by_section() {
    for (backend, store) in backends() {
        let class_id = create_class(&store, "Grade 3");
        let section_a = create_section(&store, class_id, "A");
        let section_b = create_section(&store, class_id, "B");
        let in_a = [
            enroll(&store, "kid.one", "01", class_id, section_a),
            enroll(&store, "kid.two", "02", class_id, section_a),
            enroll(&store, "kid.three", "03", class_id, section_a),
        ];
        enroll(&store, "kid.four", "04", class_id, section_b);
        enroll(&store, "kid.five", "05", class_id, section_b);

        let section_roster = store.students_by_class(class_id, Some(section_a)).unwrap();
        let ids: Vec<RecordId> = section_roster.iter().map(|s| s.student_id).collect();
        assert_eq!(ids, in_a, "{backend}");
        let first = &section_roster[0];
        assert_eq!(first.first_name, "kid.one-first", "{backend}");
        assert_eq!(first.last_name, "kid.one-last", "{backend}");
        assert_eq!(first.email, "kid.one@school.com", "{backend}");
        assert_eq!(first.profile_image, None, "{backend}");

        assert_eq!(
            store.students_by_class(class_id, None).unwrap().len(),
            5,
            "{backend}"
        );
        assert_eq!(
            store.list_sections(Some(class_id)).unwrap().len(),
            2,
            "{backend}"
        );
    }
}

#[test]
fn enrolling_moves_student_between_sections() {
    for (backend, store) in backends() {
        let class_id = create_class(&store, "Grade 8");
        let section_a = create_section(&store, class_id, "A");
        let section_b = create_section(&store, class_id, "B");
        let student_id = enroll(&store, "mover", "11", class_id, section_a);

        assert_eq!(
            store.enroll_student(student_id, class_id, section_b).unwrap(),
            1,
            "{backend}"
        );
        assert!(store
            .students_by_class(class_id, Some(section_a))
            .unwrap()
            .is_empty());
        assert_eq!(
            store.get_student(student_id).unwrap().unwrap().section_id,
            section_b,
            "{backend}"
        );
    }
}

#[test]
fn failed_student_creation_leaves_no_user() {
    for (backend, store) in backends() {
        let role_id = teacher_role(&store);
        let users_before = store.list_users().unwrap();
        let last_user_id = users_before.last().unwrap().id;

        let result = store.create_student_with_user(
            &new_user("orphan", role_id),
            &StudentEnrollment {
                roll_number: "99".to_string(),
                class_id: 777,
                section_id: 778,
            },
        );
        assert!(
            matches!(result, Err(RepoError::ConstraintViolation(_))),
            "{backend}: {result:?}"
        );
        assert_eq!(store.list_users().unwrap(), users_before, "{backend}");
        assert!(store.get_user_by_username("orphan").unwrap().is_none());

        let next = store.create_user(&new_user("after", role_id)).unwrap();
        assert_eq!(next, last_user_id + 1, "{backend}");
    }
}

#[test]
fn bulk_attendance_is_all_or_nothing() {
    for (backend, store) in backends() {
        let class_id = create_class(&store, "Grade 9");
        let section_id = create_section(&store, class_id, "A");
        let student_id = enroll(&store, "present.kid", "21", class_id, section_id);
        let date = day(2024, 9, 2);

        let result = store.bulk_create_attendance(&[
            mark(student_id, date, AttendanceStatus::Present),
            mark(student_id, date, AttendanceStatus::Late),
        ]);
        assert!(
            matches!(result, Err(RepoError::ConstraintViolation(_))),
            "{backend}: {result:?}"
        );
        assert!(store.list_attendance().unwrap().is_empty(), "{backend}");

        let ids = store
            .bulk_create_attendance(&[mark(student_id, date, AttendanceStatus::Present)])
            .unwrap();
        assert_eq!(ids.len(), 1, "{backend}");
        let entries = store.attendance_by_date_and_class(date, class_id).unwrap();
        assert_eq!(entries.len(), 1, "{backend}");
        assert_eq!(entries[0].first_name, "present.kid-first", "{backend}");
        assert_eq!(entries[0].roll_number, "21", "{backend}");
    }
}

#[test]
fn attendance_stats_cover_the_date_range() {
    for (backend, store) in backends() {
        let class_id = create_class(&store, "Grade 10");
        let section_id = create_section(&store, class_id, "A");
        let student_id = enroll(&store, "regular", "31", class_id, section_id);
        let start = day(2024, 4, 1);

        let marks: Vec<NewAttendance> = (0..30u64)
            .map(|offset| {
                let status = match offset {
                    0..=24 => AttendanceStatus::Present,
                    25..=28 => AttendanceStatus::Absent,
                    _ => AttendanceStatus::Late,
                };
                mark(
                    student_id,
                    start.checked_add_days(chrono::Days::new(offset)).unwrap(),
                    status,
                )
            })
            .collect();
        store.bulk_create_attendance(&marks).unwrap();

        let end = day(2024, 4, 30);
        let stats = store.attendance_stats(class_id, start, end).unwrap();
        let statuses: Vec<AttendanceStatus> = stats.iter().map(|s| s.status).collect();
        assert_eq!(
            statuses,
            vec![
                AttendanceStatus::Absent,
                AttendanceStatus::Late,
                AttendanceStatus::Present
            ],
            "{backend}"
        );
        let counts: Vec<i64> = stats.iter().map(|s| s.count).collect();
        assert_eq!(counts, vec![4, 1, 25], "{backend}");
        let total: f64 = stats.iter().map(|s| s.percentage).sum();
        assert!((total - 100.0).abs() < 0.05, "{backend}: {total}");
        assert_eq!(stats[2].percentage, 83.33, "{backend}");

        let first_week = store
            .attendance_stats(class_id, start, day(2024, 4, 7))
            .unwrap();
        assert_eq!(first_week.len(), 1, "{backend}");
        assert_eq!(first_week[0].count, 7, "{backend}");
        assert_eq!(first_week[0].percentage, 100.0, "{backend}");
    }
}

#[test]
fn class_stats_include_empty_classes() {
    for (backend, store) in backends() {
        let busy = create_class(&store, "Grade 11");
        let section_id = create_section(&store, busy, "A");
        create_section(&store, busy, "B");
        let empty = create_class(&store, "Grade 12");
        let date = day(2024, 5, 6);

        let first = enroll(&store, "eleven.one", "41", busy, section_id);
        let second = enroll(&store, "eleven.two", "42", busy, section_id);
        store
            .bulk_create_attendance(&[
                mark(first, date, AttendanceStatus::Present),
                mark(second, date, AttendanceStatus::Late),
                mark(second, day(2024, 5, 7), AttendanceStatus::Absent),
            ])
            .unwrap();

        let stats = store.class_with_stats(date).unwrap();
        assert_eq!(stats.len(), 2, "{backend}");
        let busy_stats = &stats[0];
        assert_eq!(busy_stats.class_id, busy, "{backend}");
        assert_eq!(
            (
                busy_stats.section_count,
                busy_stats.student_count,
                busy_stats.present_count,
                busy_stats.absent_count,
                busy_stats.late_count
            ),
            (2, 2, 1, 0, 1),
            "{backend}"
        );
        let empty_stats = &stats[1];
        assert_eq!(empty_stats.class_id, empty, "{backend}");
        assert_eq!(
            (empty_stats.section_count, empty_stats.student_count),
            (0, 0),
            "{backend}"
        );
    }
}

#[test]
fn teacher_assignment_round_trip() {
    for (backend, store) in backends() {
        let teacher_id = create_teacher(&store, "t01");
        let class_id = create_class(&store, "Grade 5");
        let section_id = create_section(&store, class_id, "Rose");

        let assignment_id = store
            .assign_teacher_to_class(&NewTeacherAssignment {
                teacher_id,
                class_id,
                section_id,
                subject_id: None,
            })
            .unwrap();

        let assignments = store.teacher_assignments(teacher_id).unwrap();
        assert_eq!(assignments.len(), 1, "{backend}");
        assert_eq!(assignments[0].id, assignment_id, "{backend}");
        assert_eq!(assignments[0].class_name, "Grade 5", "{backend}");
        assert_eq!(assignments[0].section_name, "Rose", "{backend}");
        assert_eq!(assignments[0].subject_name, None, "{backend}");

        assert_constraint(
            store.assign_teacher_to_class(&NewTeacherAssignment {
                teacher_id,
                class_id,
                section_id,
                subject_id: None,
            }),
            "UNIQUE",
            backend,
        );

        assert_eq!(
            store.remove_teacher_assignment(assignment_id).unwrap(),
            1,
            "{backend}"
        );
        assert!(
            store.teacher_assignments(teacher_id).unwrap().is_empty(),
            "{backend}"
        );
    }
}

#[test]
fn teacher_summaries_list_distinct_class_names() {
    for (backend, store) in backends() {
        let busy = create_teacher(&store, "busy.teacher");
        let idle = create_teacher(&store, "idle.teacher");
        let grade_two = create_class(&store, "Grade 2");
        let grade_one = create_class(&store, "Grade 1");
        let two_a = create_section(&store, grade_two, "A");
        let two_b = create_section(&store, grade_two, "B");
        let one_a = create_section(&store, grade_one, "A");
        let math = create_subject(&store, "M1");

        for (class_id, section_id) in [(grade_two, two_a), (grade_two, two_b), (grade_one, one_a)] {
            store
                .assign_teacher_to_class(&NewTeacherAssignment {
                    teacher_id: busy,
                    class_id,
                    section_id,
                    subject_id: Some(math),
                })
                .unwrap();
        }

        let summaries = store.teachers_with_assignments().unwrap();
        assert_eq!(summaries.len(), 2, "{backend}");
        assert_eq!(summaries[0].teacher_id, busy, "{backend}");
        assert_eq!(summaries[0].class_names, "Grade 1, Grade 2", "{backend}");
        assert_eq!(summaries[0].assignment_count, 3, "{backend}");
        assert_eq!(summaries[1].teacher_id, idle, "{backend}");
        assert_eq!(summaries[1].class_names, "", "{backend}");
        assert_eq!(summaries[1].assignment_count, 0, "{backend}");

        let details = store.teacher_assignments(busy).unwrap();
        assert_eq!(
            details[0].subject_name.as_deref(),
            Some("Subject M1"),
            "{backend}"
        );
    }
}

#[test]
fn homework_status_upserts_per_student() {
    for (backend, store) in backends() {
        let teacher_id = create_teacher(&store, "hw.teacher");
        let class_id = create_class(&store, "Grade 6");
        let section_id = create_section(&store, class_id, "A");
        let subject_id = create_subject(&store, "SCI6");
        let student_id = enroll(&store, "hw.kid", "51", class_id, section_id);

        let new_homework = |title: &str| NewHomework {
            class_id,
            section_id,
            subject_id,
            teacher_id,
            title: title.to_string(),
            description: None,
            due_date: day(2024, 6, 1),
        };
        let first = store.create_homework(&new_homework("Plants")).unwrap();
        let second = store.create_homework(&new_homework("Rocks")).unwrap();

        let pending = store
            .homework_for_student(student_id, class_id, section_id)
            .unwrap();
        assert_eq!(pending.len(), 2, "{backend}");
        assert!(
            pending.iter().all(|item| item.status == HomeworkState::Pending),
            "{backend}"
        );
        assert_eq!(pending[0].detail.subject_code, "SCI6", "{backend}");
        assert_eq!(
            pending[0].detail.teacher_name,
            "hw.teacher-first hw.teacher-last",
            "{backend}"
        );

        let accepted = store
            .update_homework_status(&HomeworkStatusUpdate {
                homework_id: first,
                student_id,
                status: HomeworkState::Accepted,
                comments: Some("on it".to_string()),
            })
            .unwrap();
        let completed = store
            .update_homework_status(&HomeworkStatusUpdate {
                homework_id: first,
                student_id,
                status: HomeworkState::Completed,
                comments: Some("done".to_string()),
            })
            .unwrap();
        assert_eq!(completed.id, accepted.id, "{backend}");
        assert_eq!(completed.submission_date, accepted.submission_date, "{backend}");
        assert!(completed.updated_at >= accepted.updated_at, "{backend}");

        let stored = store.get_homework_status(first, student_id).unwrap().unwrap();
        assert_eq!(stored.status, HomeworkState::Completed, "{backend}");
        assert_eq!(stored.comments.as_deref(), Some("done"), "{backend}");

        let history = store.homework_history(student_id).unwrap();
        assert_eq!(history.len(), 1, "{backend}");
        assert_eq!(history[0].detail.homework.id, first, "{backend}");

        store
            .update_homework(
                second,
                &HomeworkPatch {
                    is_active: Some(false),
                    ..HomeworkPatch::default()
                },
            )
            .unwrap();
        let active = store.homework_by_class(class_id, Some(section_id)).unwrap();
        assert_eq!(active.len(), 1, "{backend}");
        assert_eq!(active[0].homework.id, first, "{backend}");
    }
}

#[test]
fn feeds_and_search_logs_are_newest_first() {
    for (backend, store) in backends() {
        let admin = store.get_user_by_username("admin").unwrap().unwrap();
        let gate = store
            .create_camera(&NewCamera {
                name: "Gate".to_string(),
                location: "Entrance".to_string(),
                ip_address: None,
            })
            .unwrap();
        let monday = day(2024, 7, 1);
        let tuesday = day(2024, 7, 2);

        let mut feed_ids = Vec::new();
        for (date, hour, person) in [
            (monday, 8, None),
            (monday, 9, Some(admin.id)),
            (tuesday, 8, Some(admin.id)),
        ] {
            feed_ids.push(
                store
                    .create_feed(&NewFeed {
                        camera_id: gate,
                        timestamp: at_hour(date, hour),
                        image_path: Some(format!("frames/{hour}.jpg")),
                        video_path: None,
                        detected_person_id: person,
                    })
                    .unwrap(),
            );
        }

        let monday_feeds = store.feeds_by_date_range(monday, monday).unwrap();
        let ids: Vec<RecordId> = monday_feeds.iter().map(|entry| entry.feed.id).collect();
        assert_eq!(ids, vec![feed_ids[1], feed_ids[0]], "{backend}");
        assert_eq!(monday_feeds[0].camera_name, "Gate", "{backend}");

        assert_eq!(
            store.feeds_by_date_range(monday, tuesday).unwrap().len(),
            3,
            "{backend}"
        );
        let latest: Vec<RecordId> = store
            .feeds_by_camera(gate, 2)
            .unwrap()
            .iter()
            .map(|feed| feed.id)
            .collect();
        assert_eq!(latest, vec![feed_ids[2], feed_ids[1]], "{backend}");
        assert_eq!(
            store.detections_by_person(admin.id).unwrap().len(),
            2,
            "{backend}"
        );

        for text in ["red jacket", "blue cap"] {
            store
                .log_ai_search(&NewSearchLog {
                    user_id: admin.id,
                    search_type: "person".to_string(),
                    search_text: text.to_string(),
                    result: None,
                })
                .unwrap();
        }
        let logs = store.ai_search_logs(Some(admin.id), 10).unwrap();
        assert_eq!(logs.len(), 2, "{backend}");
        assert_eq!(logs[0].log.search_text, "blue cap", "{backend}");
        assert_eq!(logs[0].username, "admin", "{backend}");
        assert_eq!(store.ai_search_logs(None, 1).unwrap().len(), 1, "{backend}");
        assert!(store.ai_search_logs(Some(9_999), 10).unwrap().is_empty());
    }
}
