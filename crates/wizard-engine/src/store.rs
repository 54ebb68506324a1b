use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use fs2::FileExt;
use serde_json::{Map, Value};
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{debug, warn};
use wizard_spec::WizardState;

const LOCK_RETRY_INTERVAL: Duration = Duration::from_millis(25);

/// Persistence identity of one wizard run: `(kind, session)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StateKey {
    kind: String,
    session: String,
}

impl StateKey {
    pub fn new(kind: impl Into<String>, session: impl Into<String>) -> Result<Self, StoreError> {
        let kind = kind.into();
        let session = session.into();
        check_segment("kind", &kind)?;
        check_segment("session", &session)?;
        Ok(Self { kind, session })
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn session(&self) -> &str {
        &self.session
    }
}

impl fmt::Display for StateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind, self.session)
    }
}

fn check_segment(label: &str, value: &str) -> Result<(), StoreError> {
    if value.is_empty() {
        return Err(StoreError::InvalidKey(format!("{label} must not be empty")));
    }
    if value.starts_with('.') {
        return Err(StoreError::InvalidKey(format!(
            "{label} '{value}' must not start with '.'"
        )));
    }
    if let Some(bad) = value
        .chars()
        .find(|ch| !(ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_' | '.')))
    {
        return Err(StoreError::InvalidKey(format!(
            "{label} '{value}' contains unsupported character '{bad}'"
        )));
    }
    Ok(())
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("invalid state key: {0}")]
    InvalidKey(String),
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("persisted state for '{key}' is not valid JSON: {source}")]
    Corrupt {
        key: StateKey,
        #[source]
        source: serde_json::Error,
    },
    #[error("persisted state for '{key}' is inconsistent: {reason}")]
    Inconsistent { key: StateKey, reason: String },
    #[error("state '{0}' is locked")]
    Locked(StateKey),
    #[error("failed to encode state: {0}")]
    Encode(#[from] serde_json::Error),
}

fn io_error(path: &Path) -> impl FnOnce(io::Error) -> StoreError + '_ {
    move |source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Held for the duration of a read-mutate-write cycle; released on drop.
pub struct StateLock {
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl StateLock {
    pub fn new(release: impl FnOnce() + Send + 'static) -> Self {
        Self {
            release: Some(Box::new(release)),
        }
    }
}

impl Drop for StateLock {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl fmt::Debug for StateLock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateLock")
            .field("held", &self.release.is_some())
            .finish()
    }
}

/// Durable storage of one [`WizardState`] per [`StateKey`].
pub trait StateStore: Send + Sync {
    /// Persisted state, or a fresh default when nothing was saved yet.
    fn load(&self, key: &StateKey) -> Result<WizardState, StoreError>;

    fn exists(&self, key: &StateKey) -> Result<bool, StoreError>;

    fn save(&self, key: &StateKey, state: &WizardState) -> Result<(), StoreError>;

    /// Replaces whatever is stored with a fresh state carrying `meta`.
    fn reset(&self, key: &StateKey, meta: Map<String, Value>) -> Result<WizardState, StoreError> {
        let state = WizardState::fresh(meta);
        self.save(key, &state)?;
        Ok(state)
    }

    /// Returns whether anything was removed.
    fn remove(&self, key: &StateKey) -> Result<bool, StoreError>;

    /// Session names with persisted state for `kind`, sorted.
    fn sessions(&self, kind: &str) -> Result<Vec<String>, StoreError>;

    /// Exclusive lock for `key`; fails with [`StoreError::Locked`].
    fn lock(&self, key: &StateKey) -> Result<StateLock, StoreError>;
}

/// One pretty-printed JSON file per key under `<root>/<kind>/<session>.json`.
///
/// Locks are OS file locks on a sibling `<session>.lock`, so a crashed holder
/// never blocks later callers.
#[derive(Debug, Clone)]
pub struct FileStateStore {
    root: PathBuf,
    lock_wait: Duration,
}

impl FileStateStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            lock_wait: Duration::ZERO,
        }
    }

    /// How long [`lock`](StateStore::lock) keeps retrying before giving up.
    pub fn with_lock_wait(mut self, wait: Duration) -> Self {
        self.lock_wait = wait;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn state_path(&self, key: &StateKey) -> PathBuf {
        self.root
            .join(key.kind())
            .join(format!("{}.json", key.session()))
    }

    fn lock_path(&self, key: &StateKey) -> PathBuf {
        self.root
            .join(key.kind())
            .join(format!("{}.lock", key.session()))
    }
}

impl StateStore for FileStateStore {
    fn load(&self, key: &StateKey) -> Result<WizardState, StoreError> {
        let path = self.state_path(key);
        let raw = match fs::read(&path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(WizardState::default()),
            Err(err) => return Err(io_error(&path)(err)),
        };
        let state: WizardState =
            serde_json::from_slice(&raw).map_err(|source| StoreError::Corrupt {
                key: key.clone(),
                source,
            })?;
        if let Some(reason) = state.invariant_violation() {
            return Err(StoreError::Inconsistent {
                key: key.clone(),
                reason,
            });
        }
        Ok(state)
    }

    fn exists(&self, key: &StateKey) -> Result<bool, StoreError> {
        let path = self.state_path(key);
        path.try_exists().map_err(io_error(&path))
    }

    fn save(&self, key: &StateKey, state: &WizardState) -> Result<(), StoreError> {
        let path = self.state_path(key);
        let dir = path.parent().unwrap_or(self.root.as_path());
        fs::create_dir_all(dir).map_err(io_error(dir))?;

        let mut tmp = NamedTempFile::new_in(dir).map_err(io_error(dir))?;
        serde_json::to_writer_pretty(tmp.as_file_mut(), state)?;
        tmp.as_file_mut()
            .write_all(b"\n")
            .and_then(|_| tmp.as_file().sync_all())
            .map_err(io_error(tmp.path()))?;
        tmp.persist(&path)
            .map_err(|err| io_error(&path)(err.error))?;
        debug!(key = %key, path = %path.display(), "saved wizard state");
        Ok(())
    }

    fn remove(&self, key: &StateKey) -> Result<bool, StoreError> {
        let path = self.state_path(key);
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(io_error(&path)(err)),
        }
    }

    fn sessions(&self, kind: &str) -> Result<Vec<String>, StoreError> {
        check_segment("kind", kind)?;
        let dir = self.root.join(kind);
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(io_error(&dir)(err)),
        };

        let mut sessions = Vec::new();
        for entry in entries {
            let path = entry.map_err(io_error(&dir))?.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|stem| stem.to_str())
                && check_segment("session", stem).is_ok()
            {
                sessions.push(stem.to_string());
            }
        }
        sessions.sort();
        Ok(sessions)
    }

    fn lock(&self, key: &StateKey) -> Result<StateLock, StoreError> {
        let path = self.lock_path(key);
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).map_err(io_error(dir))?;
        }
        // The file outlives the lock; only the OS lock on it is exclusive.
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(io_error(&path))?;

        let contended = fs2::lock_contended_error().raw_os_error();
        let started = Instant::now();
        loop {
            match file.try_lock_exclusive() {
                Ok(()) => {
                    return Ok(StateLock::new(move || {
                        if let Err(err) = FileExt::unlock(&file) {
                            warn!(path = %path.display(), error = %err, "failed to release state lock");
                        }
                    }));
                }
                Err(err) if err.raw_os_error() == contended => {
                    if started.elapsed() >= self.lock_wait {
                        return Err(StoreError::Locked(key.clone()));
                    }
                    thread::sleep(LOCK_RETRY_INTERVAL);
                }
                Err(err) => return Err(io_error(&path)(err)),
            }
        }
    }
}

/// In-process store, mainly for tests and embedding.
#[derive(Debug, Clone, Default)]
pub struct MemoryStateStore {
    states: Arc<Mutex<BTreeMap<StateKey, WizardState>>>,
    locks: Arc<Mutex<BTreeSet<StateKey>>>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn states(&self) -> MutexGuard<'_, BTreeMap<StateKey, WizardState>> {
        self.states.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl StateStore for MemoryStateStore {
    fn load(&self, key: &StateKey) -> Result<WizardState, StoreError> {
        Ok(self.states().get(key).cloned().unwrap_or_default())
    }

    fn exists(&self, key: &StateKey) -> Result<bool, StoreError> {
        Ok(self.states().contains_key(key))
    }

    fn save(&self, key: &StateKey, state: &WizardState) -> Result<(), StoreError> {
        self.states().insert(key.clone(), state.clone());
        Ok(())
    }

    fn remove(&self, key: &StateKey) -> Result<bool, StoreError> {
        Ok(self.states().remove(key).is_some())
    }

    fn sessions(&self, kind: &str) -> Result<Vec<String>, StoreError> {
        Ok(self
            .states()
            .keys()
            .filter(|key| key.kind() == kind)
            .map(|key| key.session().to_string())
            .collect())
    }

    fn lock(&self, key: &StateKey) -> Result<StateLock, StoreError> {
        let mut held = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        if !held.insert(key.clone()) {
            return Err(StoreError::Locked(key.clone()));
        }
        let locks = Arc::clone(&self.locks);
        let key = key.clone();
        Ok(StateLock::new(move || {
            locks
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(&key);
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_reject_path_like_segments() {
        assert!(StateKey::new("app", "s-1.a_b").is_ok());
        for session in ["", "..", ".hidden", "a/b", "a b", "é"] {
            assert!(StateKey::new("app", session).is_err(), "{session:?}");
        }
    }

    #[test]
    fn memory_lock_is_exclusive_until_dropped() {
        let store = MemoryStateStore::new();
        let key = StateKey::new("app", "s1").expect("key");
        let guard = store.lock(&key).expect("first lock");
        assert!(matches!(store.lock(&key), Err(StoreError::Locked(_))));
        drop(guard);
        assert!(store.lock(&key).is_ok());
    }
}
