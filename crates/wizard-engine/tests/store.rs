use std::fs;
use std::time::{Duration, Instant};

use fs2::FileExt;
use serde_json::{Map, json};
use tempfile::TempDir;
use wizard_engine::{FileStateStore, MemoryStateStore, StateKey, StateStore, StoreError};
use wizard_spec::WizardState;

fn key(session: &str) -> StateKey {
    StateKey::new("application", session).expect("key")
}

fn sample_state() -> WizardState {
    let mut state = WizardState::fresh(
        json!({ "node_id": "n1" })
            .as_object()
            .cloned()
            .expect("meta"),
    );
    state.begin("choose_db");
    state.record(
        "choose_db",
        json!({ "db_name": "pg", "extra": [1, 2] })
            .as_object()
            .cloned()
            .expect("answers"),
    );
    state.advance_to("prefs");
    state
}

#[test]
fn file_store_round_trips_state() {
    let dir = TempDir::new().expect("tempdir");
    let store = FileStateStore::new(dir.path());
    let state = sample_state();

    store.save(&key("s1"), &state).expect("save");
    assert!(store.exists(&key("s1")).expect("exists"));
    assert_eq!(store.load(&key("s1")).expect("load"), state);

    let path = dir.path().join("application").join("s1.json");
    let raw: serde_json::Value =
        serde_json::from_slice(&fs::read(path).expect("read")).expect("json");
    let mut keys = raw
        .as_object()
        .expect("object")
        .keys()
        .cloned()
        .collect::<Vec<_>>();
    keys.sort();
    assert_eq!(
        keys,
        vec![
            "answers",
            "completed",
            "completed_step_ids",
            "current_step_id",
            "meta"
        ]
    );
}

#[test]
fn missing_state_loads_as_default() {
    let dir = TempDir::new().expect("tempdir");
    let store = FileStateStore::new(dir.path());
    assert_eq!(store.load(&key("nobody")).expect("load"), WizardState::default());
    assert!(!store.exists(&key("nobody")).expect("exists"));
}

#[test]
fn save_leaves_no_temporary_files() {
    let dir = TempDir::new().expect("tempdir");
    let store = FileStateStore::new(dir.path());
    store.save(&key("s1"), &sample_state()).expect("save");
    store.save(&key("s1"), &WizardState::default()).expect("overwrite");

    let entries = fs::read_dir(dir.path().join("application"))
        .expect("read_dir")
        .map(|entry| entry.expect("entry").file_name())
        .collect::<Vec<_>>();
    assert_eq!(entries, vec![std::ffi::OsString::from("s1.json")]);
}

#[test]
fn corrupt_and_inconsistent_files_are_reported() {
    let dir = TempDir::new().expect("tempdir");
    let store = FileStateStore::new(dir.path());
    let kind_dir = dir.path().join("application");
    fs::create_dir_all(&kind_dir).expect("mkdir");

    fs::write(kind_dir.join("broken.json"), "{ not json").expect("write");
    assert!(matches!(
        store.load(&key("broken")),
        Err(StoreError::Corrupt { .. })
    ));

    fs::write(
        kind_dir.join("odd.json"),
        json!({ "current_step_id": "a", "completed": true }).to_string(),
    )
    .expect("write");
    assert!(matches!(
        store.load(&key("odd")),
        Err(StoreError::Inconsistent { .. })
    ));
}

#[test]
fn reset_replaces_state_with_fresh_meta() {
    let dir = TempDir::new().expect("tempdir");
    let store = FileStateStore::new(dir.path());
    store.save(&key("s1"), &sample_state()).expect("save");

    let meta = json!({ "node_id": "n2" }).as_object().cloned().expect("meta");
    let fresh = store.reset(&key("s1"), meta.clone()).expect("reset");
    assert_eq!(fresh, WizardState::fresh(meta));
    assert_eq!(store.load(&key("s1")).expect("load"), fresh);
}

#[test]
fn sessions_and_remove() {
    let dir = TempDir::new().expect("tempdir");
    let store = FileStateStore::new(dir.path());
    assert!(store.sessions("application").expect("empty").is_empty());

    store.save(&key("b"), &WizardState::default()).expect("save");
    store.save(&key("a"), &WizardState::default()).expect("save");
    let _guard = store.lock(&key("c")).expect("lock");
    assert_eq!(store.sessions("application").expect("sessions"), vec!["a", "b"]);

    assert!(store.remove(&key("a")).expect("remove"));
    assert!(!store.remove(&key("a")).expect("remove twice"));
    assert_eq!(store.sessions("application").expect("sessions"), vec!["b"]);
}

#[test]
fn file_lock_is_released_on_drop() {
    let dir = TempDir::new().expect("tempdir");
    let store = FileStateStore::new(dir.path());
    let lock_file = dir.path().join("application").join("s1.lock");

    let guard = store.lock(&key("s1")).expect("lock");
    assert!(lock_file.exists());
    assert!(matches!(
        store.lock(&key("s1")),
        Err(StoreError::Locked(_))
    ));
    drop(guard);
    assert!(lock_file.exists());
    assert!(store.lock(&key("s1")).is_ok());
}

#[test]
fn leftover_lock_file_does_not_block() {
    let dir = TempDir::new().expect("tempdir");
    let store = FileStateStore::new(dir.path());
    let lock_file = dir.path().join("application").join("s1.lock");
    fs::create_dir_all(lock_file.parent().expect("parent")).expect("mkdir");
    fs::write(&lock_file, "999999\n").expect("stale lock");

    let guard = store.lock(&key("s1")).expect("stale file is not a held lock");
    drop(guard);
    assert!(store.lock(&key("s1")).is_ok());
}

#[test]
fn os_lock_held_elsewhere_is_respected() {
    let dir = TempDir::new().expect("tempdir");
    let store = FileStateStore::new(dir.path());
    let lock_file = dir.path().join("application").join("s1.lock");
    fs::create_dir_all(lock_file.parent().expect("parent")).expect("mkdir");
    let holder = fs::File::create(&lock_file).expect("lock file");
    holder.try_lock_exclusive().expect("hold lock");

    assert!(matches!(
        store.lock(&key("s1")),
        Err(StoreError::Locked(_))
    ));
    FileExt::unlock(&holder).expect("unlock");
    assert!(store.lock(&key("s1")).is_ok());
}

#[test]
fn lock_wait_retries_before_giving_up() {
    let dir = TempDir::new().expect("tempdir");
    let store = FileStateStore::new(dir.path()).with_lock_wait(Duration::from_millis(100));
    let _guard = store.lock(&key("s1")).expect("lock");

    let started = Instant::now();
    assert!(store.lock(&key("s1")).is_err());
    assert!(started.elapsed() >= Duration::from_millis(100));
}

#[test]
fn memory_store_behaves_like_file_store() {
    let store = MemoryStateStore::new();
    let state = sample_state();
    assert_eq!(store.load(&key("s1")).expect("load"), WizardState::default());
    store.save(&key("s1"), &state).expect("save");
    assert_eq!(store.load(&key("s1")).expect("load"), state);
    assert_eq!(store.sessions("application").expect("sessions"), vec!["s1"]);
    assert!(store.sessions("other").expect("sessions").is_empty());

    let reset = store.reset(&key("s1"), Map::new()).expect("reset");
    assert_eq!(reset, WizardState::default());
    assert!(store.remove(&key("s1")).expect("remove"));
    assert!(!store.exists(&key("s1")).expect("exists"));
}
