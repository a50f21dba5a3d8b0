//! Session-scoped key/value cache.
//!
//! The cache survives page navigations (or, for the CLI, separate process
//! runs) without a remote round-trip. Two keys are used: `tasks` holds the
//! JSON task array and `contacts` holds the JSON contact array.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use tracing::debug;

use crate::error::{Error, Result};
use crate::lock::{self, FileLock, DEFAULT_LOCK_TIMEOUT_MS};
use crate::model::{Contact, Task};

pub const TASKS_KEY: &str = "tasks";
pub const CONTACTS_KEY: &str = "contacts";

/// Raw key/value storage behind the session cache.
pub trait SessionStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
    fn clear(&self) -> Result<()>;
}

/// Session storage held in memory; clones share the same entries.
#[derive(Debug, Clone, Default)]
pub struct MemorySession {
    entries: Arc<Mutex<BTreeMap<String, String>>>,
}

impl MemorySession {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MemorySession {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.remove(key);
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.clear();
        Ok(())
    }
}

/// Session storage in a directory: one `<key>.json` file per entry.
#[derive(Debug, Clone)]
pub struct DirSession {
    dir: PathBuf,
}

impl DirSession {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn entry_path(&self, key: &str) -> Result<PathBuf> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|ch| ch.is_ascii_alphanumeric() || ch == '_' || ch == '-');
        if !valid {
            return Err(Error::InvalidArgument(format!(
                "invalid session key '{key}'"
            )));
        }
        Ok(self.dir.join(format!("{key}.json")))
    }
}

impl SessionStore for DirSession {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.entry_path(key)?;
        let _lock = FileLock::acquire(lock::lock_path_for(&path), DEFAULT_LOCK_TIMEOUT_MS)?;
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(fs::read_to_string(&path)?))
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let path = self.entry_path(key)?;
        let _lock = FileLock::acquire(lock::lock_path_for(&path), DEFAULT_LOCK_TIMEOUT_MS)?;
        lock::write_atomic(&path, value.as_bytes())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let path = self.entry_path(key)?;
        let _lock = FileLock::acquire(lock::lock_path_for(&path), DEFAULT_LOCK_TIMEOUT_MS)?;
        if path.exists() {
            fs::remove_file(&path)?;
        }
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        if self.dir.exists() {
            fs::remove_dir_all(&self.dir)?;
        }
        Ok(())
    }
}

/// Typed view over a [`SessionStore`]. Cheap to clone; clones share storage.
#[derive(Clone)]
pub struct SessionCache {
    store: Arc<dyn SessionStore>,
}

impl SessionCache {
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self { store }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemorySession::new()))
    }

    pub fn store_tasks(&self, tasks: &[Task]) -> Result<()> {
        debug!(count = tasks.len(), "caching tasks");
        self.store.set(TASKS_KEY, &serde_json::to_string(tasks)?)
    }

    pub fn cached_tasks(&self) -> Result<Option<Vec<Task>>> {
        self.read(TASKS_KEY)
    }

    pub fn store_contacts(&self, contacts: &[Contact]) -> Result<()> {
        debug!(count = contacts.len(), "caching contacts");
        self.store.set(CONTACTS_KEY, &serde_json::to_string(contacts)?)
    }

    pub fn cached_contacts(&self) -> Result<Option<Vec<Contact>>> {
        self.read(CONTACTS_KEY)
    }

    /// Raw serialized entry, as written.
    pub fn raw(&self, key: &str) -> Result<Option<String>> {
        self.store.get(key)
    }

    /// Drop every entry (logout / tab close).
    pub fn clear(&self) -> Result<()> {
        self.store.clear()
    }

    fn read<T: serde::de::DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.store.get(key)? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }
}

impl std::fmt::Debug for SessionCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionCache").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{TaskDraft, TaskId};
    use chrono::NaiveDate;

    fn task(id: u64, title: &str) -> Task {
        let date = NaiveDate::from_ymd_opt(2026, 2, 1).expect("date");
        Task::from_draft(TaskId(id), TaskDraft::new(title, date))
    }

    #[test]
    fn memory_session_clones_share_entries() {
        let a = MemorySession::new();
        let b = a.clone();
        a.set(TASKS_KEY, "[]").expect("set");
        assert_eq!(b.get(TASKS_KEY).expect("get").as_deref(), Some("[]"));
        b.clear().expect("clear");
        assert_eq!(a.get(TASKS_KEY).expect("get"), None);
    }

    #[test]
    fn dir_session_round_trips_tasks() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cache = SessionCache::new(Arc::new(DirSession::new(dir.path().join("session"))));
        assert!(cache.cached_tasks().expect("read").is_none());

        let tasks = vec![task(1, "One"), task(2, "Two")];
        cache.store_tasks(&tasks).expect("store");
        assert_eq!(cache.cached_tasks().expect("read"), Some(tasks.clone()));
        assert_eq!(
            cache.raw(TASKS_KEY).expect("raw"),
            Some(serde_json::to_string(&tasks).expect("json"))
        );

        cache.clear().expect("clear");
        assert!(cache.cached_tasks().expect("read").is_none());
    }

    #[test]
    fn dir_session_rejects_path_like_keys() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = DirSession::new(dir.path());
        assert!(store.set("../escape", "x").is_err());
    }
}
