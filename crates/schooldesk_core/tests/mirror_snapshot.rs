use schooldesk_core::db::SeedOptions;
use schooldesk_core::fixtures::DemoSummary;
use schooldesk_core::mirror::{
    Change, FileSnapshotStore, MemorySnapshotStore, MirrorOptions, MirrorStore, Snapshot,
    SnapshotError, SnapshotStore,
};
use schooldesk_core::model::academic::NewClass;
use schooldesk_core::model::camera::{CameraPatch, NewCamera};
use schooldesk_core::{
    AcademicRepository, CameraRepository, HomeworkRepository, IdentityRepository, RepoError,
};
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

fn options(compact_every: usize) -> MirrorOptions {
    MirrorOptions {
        compact_every,
        demo_fixtures: false,
        seed: SeedOptions {
            admin_secret: Some("bootstrap-secret".to_string()),
        },
    }
}

fn camera(name: &str) -> NewCamera {
    NewCamera {
        name: name.to_string(),
        location: format!("{name} hall"),
        ip_address: Some("10.0.0.5".to_string()),
    }
}

/// Memory store whose journal appends can be switched to fail.
#[derive(Clone, Default)]
struct FlakyStore {
    inner: MemorySnapshotStore,
    failing: Arc<AtomicBool>,
}

impl SnapshotStore for FlakyStore {
    fn load_snapshot(&self) -> Result<Option<Snapshot>, SnapshotError> {
        self.inner.load_snapshot()
    }

    fn load_journal(&self) -> Result<Vec<Change>, SnapshotError> {
        self.inner.load_journal()
    }

    fn append_journal(&mut self, changes: &[Change]) -> Result<(), SnapshotError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(SnapshotError::Io(io::Error::new(
                io::ErrorKind::Other,
                "disk full",
            )));
        }
        self.inner.append_journal(changes)
    }

    fn compact(&mut self, snapshot: &Snapshot) -> Result<(), SnapshotError> {
        self.inner.compact(snapshot)
    }
}

#[test]
fn cameras_survive_a_restart_from_files() {
    let dir = tempfile::tempdir().unwrap();

    let first = MirrorStore::open(FileSnapshotStore::open(dir.path()).unwrap(), options(256))
        .unwrap();
    first.create_camera(&camera("Gate")).unwrap();
    first.create_camera(&camera("Library")).unwrap();
    let before = first.list_cameras().unwrap();
    // No flush: the restart has to replay the journal.
    drop(first);

    let second = MirrorStore::open(FileSnapshotStore::open(dir.path()).unwrap(), options(256))
        .unwrap();
    assert_eq!(second.list_cameras().unwrap(), before);
    assert_eq!(before.len(), 2);
    assert_eq!(second.list_users().unwrap().len(), 1);
}

fn camera_names(mirror: &MirrorStore) -> Vec<String> {
    mirror
        .list_cameras()
        .unwrap()
        .into_iter()
        .map(|camera| camera.name)
        .collect()
}

#[test]
fn writes_after_a_torn_journal_tail_survive_restarts() {
    let dir = tempfile::tempdir().unwrap();
    let open = || {
        MirrorStore::open(FileSnapshotStore::open(dir.path()).unwrap(), options(256)).unwrap()
    };

    let first = open();
    first.create_camera(&camera("Gate")).unwrap();
    let journal_path = FileSnapshotStore::open(dir.path()).unwrap().journal_path();
    drop(first);
    let mut journal = OpenOptions::new().append(true).open(&journal_path).unwrap();
    journal.write_all(b"{\"op\":\"put\",\"rec").unwrap();
    drop(journal);

    let second = open();
    assert_eq!(camera_names(&second), vec!["Gate"]);
    second.create_camera(&camera("Library")).unwrap();
    drop(second);

    let third = open();
    assert_eq!(camera_names(&third), vec!["Gate", "Library"]);
    third.create_camera(&camera("Canteen")).unwrap();
    drop(third);

    let fourth = open();
    assert_eq!(camera_names(&fourth), vec!["Gate", "Library", "Canteen"]);
}

#[test]
fn restart_after_compaction_keeps_state_and_sequences() {
    let snapshots = MemorySnapshotStore::new();

    let first = MirrorStore::open(snapshots.clone(), options(3)).unwrap();
    assert!(snapshots.has_snapshot());
    assert_eq!(snapshots.journal_len(), 0);

    let gate = first.create_camera(&camera("Gate")).unwrap();
    let library = first.create_camera(&camera("Library")).unwrap();
    assert_eq!(snapshots.journal_len(), 2);
    first
        .update_camera(
            gate,
            &CameraPatch {
                is_active: Some(false),
                ..CameraPatch::default()
            },
        )
        .unwrap();
    assert_eq!(snapshots.journal_len(), 0);

    assert_eq!(first.delete_camera(library).unwrap(), 1);
    assert_eq!(snapshots.journal_len(), 1);
    let cameras = first.list_cameras().unwrap();
    drop(first);

    let second = MirrorStore::open(snapshots.clone(), options(3)).unwrap();
    assert_eq!(second.list_cameras().unwrap(), cameras);
    assert!(!cameras[0].is_active);

    let next = second.create_camera(&camera("Canteen")).unwrap();
    assert!(next > library, "id {next} reused after restart");
}

#[test]
fn journal_failure_is_returned_and_rolled_back() {
    let store = FlakyStore::default();
    let failing = Arc::clone(&store.failing);
    let mirror = MirrorStore::open(store, options(256)).unwrap();
    let gate = mirror.create_camera(&camera("Gate")).unwrap();

    failing.store(true, Ordering::SeqCst);
    let result = mirror.create_camera(&camera("Library"));
    assert!(matches!(result, Err(RepoError::Snapshot(_))), "{result:?}");
    let rename = mirror.update_camera(
        gate,
        &CameraPatch {
            name: Some("Front Gate".to_string()),
            ..CameraPatch::default()
        },
    );
    assert!(matches!(rename, Err(RepoError::Snapshot(_))));

    let cameras = mirror.list_cameras().unwrap();
    assert_eq!(cameras.len(), 1);
    assert_eq!(cameras[0].name, "Gate");

    failing.store(false, Ordering::SeqCst);
    let library = mirror.create_camera(&camera("Library")).unwrap();
    assert_eq!(library, gate + 1);
}

#[test]
fn closed_mirror_rejects_reads_and_writes() {
    let snapshots = MemorySnapshotStore::new();
    let mirror = MirrorStore::open(snapshots.clone(), options(256)).unwrap();
    mirror.create_camera(&camera("Gate")).unwrap();

    mirror.close().unwrap();
    mirror.close().unwrap();
    assert!(mirror.is_closed());
    assert_eq!(snapshots.journal_len(), 0);
    assert!(matches!(mirror.list_cameras(), Err(RepoError::Closed)));
    assert!(matches!(
        mirror.create_camera(&camera("Library")),
        Err(RepoError::Closed)
    ));
    assert!(matches!(mirror.flush(), Err(RepoError::Closed)));
}

#[test]
fn fresh_mirror_loads_demo_fixtures_once() {
    let snapshots = MemorySnapshotStore::new();
    let demo = MirrorOptions {
        demo_fixtures: true,
        ..options(256)
    };
    let expected = DemoSummary {
        classes: 2,
        sections: 4,
        subjects: 3,
        students: 4,
        cameras: 2,
        homework: 2,
    };

    let first = MirrorStore::open(snapshots.clone(), demo.clone()).unwrap();
    assert_eq!(first.list_classes().unwrap().len(), expected.classes);
    assert_eq!(first.list_sections(None).unwrap().len(), expected.sections);
    assert_eq!(first.list_subjects().unwrap().len(), expected.subjects);
    assert_eq!(first.list_students().unwrap().len(), expected.students);
    assert_eq!(first.list_cameras().unwrap().len(), expected.cameras);
    assert_eq!(first.list_homework().unwrap().len(), expected.homework);
    assert_eq!(first.teachers_with_assignments().unwrap().len(), 1);
    drop(first);

    let second = MirrorStore::open(snapshots, demo).unwrap();
    assert_eq!(second.list_classes().unwrap().len(), expected.classes);
    assert_eq!(second.list_students().unwrap().len(), expected.students);
}

#[test]
fn demo_fixtures_are_not_loaded_into_an_existing_store() {
    let snapshots = MemorySnapshotStore::new();
    let plain = MirrorStore::open(snapshots.clone(), options(256)).unwrap();
    plain
        .create_class(&NewClass {
            name: "Grade 1".to_string(),
            academic_year: "2024-2025".to_string(),
            board: "State".to_string(),
        })
        .unwrap();
    plain.close().unwrap();

    let reopened = MirrorStore::open(
        snapshots,
        MirrorOptions {
            demo_fixtures: true,
            ..options(256)
        },
    )
    .unwrap();
    let names: Vec<String> = reopened
        .list_classes()
        .unwrap()
        .into_iter()
        .map(|class| class.name)
        .collect();
    assert_eq!(names, vec!["Grade 1"]);
}

#[test]
fn corrupt_snapshot_fails_to_open() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileSnapshotStore::open(dir.path()).unwrap();
    std::fs::write(store.snapshot_path(), "{ not json").unwrap();

    let result = MirrorStore::open(store, options(256));
    assert!(matches!(result, Err(RepoError::Snapshot(_))));
}
