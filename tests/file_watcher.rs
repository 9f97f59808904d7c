// tests/file_watcher.rs

use std::fs;
use std::path::Path;

use notify::event::{AccessKind, AccessMode, CreateKind, DataChange, ModifyKind, RemoveKind};
use notify::EventKind;
use tokio::time::{sleep, timeout, Duration};

use buildwatch::types::{MonitoredFileSet, WatchBackend};
use buildwatch::watch::{trigger_kind, FileWatcher, TriggerKind, TriggerStream, WatchOptions};
use buildwatch_test_utils::init_tracing;

fn fast_options() -> WatchOptions {
    WatchOptions {
        retry_interval: Duration::from_millis(50),
        poll_interval: Duration::from_millis(50),
        ..WatchOptions::default()
    }
}

/// Next trigger for `path`, skipping triggers for other monitored files.
async fn next_trigger_for(rx: &mut TriggerStream, path: &Path) -> TriggerKind {
    timeout(Duration::from_secs(5), async {
        loop {
            let trigger = rx.recv().await.expect("trigger stream closed");
            if trigger.path == path {
                return trigger.kind;
            }
        }
    })
    .await
    .expect("no trigger within 5 seconds")
}

fn drain(rx: &mut TriggerStream) {
    while rx.try_recv().is_ok() {}
}

#[test]
fn event_kinds_map_to_triggers() {
    assert_eq!(
        trigger_kind(&EventKind::Create(CreateKind::File)),
        Some(TriggerKind::Created)
    );
    assert_eq!(
        trigger_kind(&EventKind::Modify(ModifyKind::Data(DataChange::Content))),
        Some(TriggerKind::Modified)
    );
    assert_eq!(
        trigger_kind(&EventKind::Remove(RemoveKind::File)),
        Some(TriggerKind::Removed)
    );
    assert_eq!(
        trigger_kind(&EventKind::Access(AccessKind::Close(AccessMode::Write))),
        Some(TriggerKind::Modified)
    );
    assert_eq!(trigger_kind(&EventKind::Any), Some(TriggerKind::Unclassified));
    assert_eq!(trigger_kind(&EventKind::Access(AccessKind::Open(AccessMode::Read))), None);
    assert_eq!(trigger_kind(&EventKind::Other), None);
}

#[tokio::test]
async fn file_created_after_start_triggers() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let marker = dir.path().canonicalize().unwrap().join("db.sqlite");
    let paths = MonitoredFileSet::new([marker.clone()]).unwrap();

    let (mut watcher, mut rx) = FileWatcher::start(&paths, fast_options()).unwrap();
    sleep(Duration::from_millis(100)).await;

    fs::write(&marker, b"v1").unwrap();
    let kind = next_trigger_for(&mut rx, &marker).await;
    assert!(matches!(kind, TriggerKind::Created | TriggerKind::Modified));

    watcher.stop();
}

#[tokio::test]
async fn modifying_and_recreating_a_file_keeps_triggering() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let marker = dir.path().canonicalize().unwrap().join("gc.lock");
    fs::write(&marker, b"initial").unwrap();
    let paths = MonitoredFileSet::new([marker.clone()]).unwrap();

    let (mut watcher, mut rx) = FileWatcher::start(&paths, fast_options()).unwrap();
    sleep(Duration::from_millis(100)).await;

    fs::write(&marker, b"changed").unwrap();
    next_trigger_for(&mut rx, &marker).await;
    sleep(Duration::from_millis(100)).await;
    drain(&mut rx);

    fs::remove_file(&marker).unwrap();
    assert_eq!(next_trigger_for(&mut rx, &marker).await, TriggerKind::Removed);

    sleep(Duration::from_millis(50)).await;
    drain(&mut rx);
    fs::write(&marker, b"again").unwrap();
    next_trigger_for(&mut rx, &marker).await;

    watcher.stop();
}

#[tokio::test]
async fn unrelated_files_in_the_directory_are_ignored() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let marker = dir.path().canonicalize().unwrap().join("db.sqlite");
    let paths = MonitoredFileSet::new([marker.clone()]).unwrap();

    let (mut watcher, mut rx) = FileWatcher::start(&paths, fast_options()).unwrap();
    sleep(Duration::from_millis(100)).await;

    fs::write(dir.path().join("db.sqlite-journal"), b"noise").unwrap();
    sleep(Duration::from_millis(300)).await;

    assert!(rx.try_recv().is_err(), "no trigger for unmonitored files");
    watcher.stop();
}

#[tokio::test]
async fn missing_directory_is_retried_until_it_appears() {
    init_tracing();
    let root = tempfile::tempdir().unwrap();
    let db_dir = root.path().canonicalize().unwrap().join("nix").join("db");
    let marker = db_dir.join("db.sqlite");
    let paths = MonitoredFileSet::new([marker.clone()]).unwrap();

    let (mut watcher, mut rx) = FileWatcher::start(&paths, fast_options()).unwrap();
    sleep(Duration::from_millis(150)).await;
    assert!(rx.try_recv().is_err());

    fs::create_dir_all(&db_dir).unwrap();
    fs::write(&marker, b"db").unwrap();

    // Either the retry finds the existing file (Appeared) or the watch was
    // registered in time to see the write itself.
    let kind = next_trigger_for(&mut rx, &marker).await;
    assert!(matches!(
        kind,
        TriggerKind::Appeared | TriggerKind::Created | TriggerKind::Modified
    ));

    watcher.stop();
}

#[tokio::test]
async fn poll_backend_reports_changes() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let marker = dir.path().canonicalize().unwrap().join("db.sqlite");
    fs::write(&marker, b"v1").unwrap();
    let paths = MonitoredFileSet::new([marker.clone()]).unwrap();

    let options = WatchOptions {
        backend: WatchBackend::Poll,
        ..fast_options()
    };
    let (mut watcher, mut rx) = FileWatcher::start(&paths, options).unwrap();
    sleep(Duration::from_millis(150)).await;

    fs::write(&marker, b"v2 with a different length").unwrap();
    next_trigger_for(&mut rx, &marker).await;

    watcher.stop();
}

#[tokio::test]
async fn stop_is_idempotent_and_closes_the_stream() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let paths = MonitoredFileSet::new([dir.path().join("db.sqlite")]).unwrap();

    let (mut watcher, mut rx) = FileWatcher::start(&paths, fast_options()).unwrap();
    assert!(watcher.is_running());

    watcher.stop();
    watcher.stop();
    assert!(!watcher.is_running());

    let closed = timeout(Duration::from_secs(2), rx.recv()).await.unwrap();
    assert!(closed.is_none());
}

#[tokio::test]
async fn directory_moved_away_and_recreated_is_watched_again() {
    init_tracing();
    let root = tempfile::tempdir().unwrap();
    let root_path = root.path().canonicalize().unwrap();
    let db_dir = root_path.join("db");
    fs::create_dir_all(&db_dir).unwrap();
    let marker = db_dir.join("db.sqlite");
    let paths = MonitoredFileSet::new([marker.clone()]).unwrap();

    let (mut watcher, mut rx) = FileWatcher::start(&paths, fast_options()).unwrap();
    sleep(Duration::from_millis(100)).await;

    fs::rename(&db_dir, root_path.join("db.old")).unwrap();
    sleep(Duration::from_millis(150)).await;
    drain(&mut rx);

    fs::create_dir_all(&db_dir).unwrap();
    fs::write(&marker, b"fresh").unwrap();

    let kind = next_trigger_for(&mut rx, &marker).await;
    assert!(matches!(
        kind,
        TriggerKind::Appeared | TriggerKind::Created | TriggerKind::Modified
    ));

    // Writes inside the moved-away directory are no longer reported.
    sleep(Duration::from_millis(150)).await;
    drain(&mut rx);
    fs::write(root_path.join("db.old").join("db.sqlite"), b"stale").unwrap();
    sleep(Duration::from_millis(300)).await;
    assert!(rx.try_recv().is_err());

    watcher.stop();
}
