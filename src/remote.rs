//! Remote store seam.
//!
//! [`RemoteStore`] is the consumed remote API: `GET/POST/PATCH/DELETE` on the
//! `tasks` and `contacts` collections. Records travel as JSON objects and
//! PATCH merges top-level fields, so a partial update never rewrites fields
//! it does not name.
//!
//! Two stores ship with the crate:
//! - [`MemoryRemote`]: in-process, with failure injection and a log of served
//!   requests.
//! - [`FileRemote`]: one JSON document per collection under a directory,
//!   guarded by file locks. This is what the `tb` binary uses.

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{Error, Result};
use crate::lock::{self, DEFAULT_LOCK_TIMEOUT_MS};
use crate::model::{
    ContactDraft, ContactId, ContactPatch, RawContact, RawTask, TaskDraft, TaskId, TaskPatch,
};

pub const TASKS_FILE: &str = "tasks.json";
pub const CONTACTS_FILE: &str = "contacts.json";

/// Remote store API consumed by the engine.
///
/// Every method is a suspension point. Any failure is reported as
/// [`Error::Transport`].
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// `GET tasks`; records come back undecoded and are checked by
    /// [`RawTask::from_value`] and [`RawTask::normalize`]
    async fn fetch_tasks(&self) -> Result<Vec<Value>>;

    /// `POST tasks`; returns the stored record with its assigned id
    async fn create_task(&self, draft: &TaskDraft) -> Result<RawTask>;

    /// `PATCH tasks/{id}`
    async fn patch_task(&self, id: TaskId, patch: &TaskPatch) -> Result<()>;

    /// `DELETE tasks/{id}`
    async fn delete_task(&self, id: TaskId) -> Result<()>;

    /// `GET contacts`; undecoded, like [`RemoteStore::fetch_tasks`]
    async fn fetch_contacts(&self) -> Result<Vec<Value>>;

    /// `POST contacts`
    async fn create_contact(&self, draft: &ContactDraft) -> Result<RawContact>;

    /// `PATCH contacts/{id}`
    async fn patch_contact(&self, id: ContactId, patch: &ContactPatch) -> Result<()>;

    /// `DELETE contacts/{id}`
    async fn delete_contact(&self, id: ContactId) -> Result<()>;
}

/// Remote operations, used for logging, request logs and failure injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RemoteOp {
    FetchTasks,
    CreateTask,
    PatchTask,
    DeleteTask,
    FetchContacts,
    CreateContact,
    PatchContact,
    DeleteContact,
}

impl RemoteOp {
    pub fn as_str(self) -> &'static str {
        match self {
            RemoteOp::FetchTasks => "GET tasks",
            RemoteOp::CreateTask => "POST tasks",
            RemoteOp::PatchTask => "PATCH tasks",
            RemoteOp::DeleteTask => "DELETE tasks",
            RemoteOp::FetchContacts => "GET contacts",
            RemoteOp::CreateContact => "POST contacts",
            RemoteOp::PatchContact => "PATCH contacts",
            RemoteOp::DeleteContact => "DELETE contacts",
        }
    }
}

impl fmt::Display for RemoteOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One stored collection: records keyed by id plus the next id to assign.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordCollection {
    #[serde(default = "first_record_id")]
    next_id: u64,
    #[serde(default)]
    records: BTreeMap<u64, Map<String, Value>>,
}

fn first_record_id() -> u64 {
    1
}

impl Default for RecordCollection {
    fn default() -> Self {
        Self {
            next_id: first_record_id(),
            records: BTreeMap::new(),
        }
    }
}

impl RecordCollection {
    /// Store `body` under a fresh id and return the stored record.
    pub fn insert(&mut self, op: RemoteOp, body: Value) -> Result<Value> {
        let Value::Object(mut record) = body else {
            return Err(Error::transport(op.as_str(), "request body must be an object"));
        };
        let id = self.next_id;
        self.next_id += 1;
        record.insert("id".to_string(), Value::from(id));
        self.records.insert(id, record.clone());
        Ok(Value::Object(record))
    }

    /// Merge the top-level fields of `fields` into record `id`.
    pub fn patch(&mut self, op: RemoteOp, id: u64, fields: Value) -> Result<()> {
        let Value::Object(fields) = fields else {
            return Err(Error::transport(op.as_str(), "request body must be an object"));
        };
        let record = self
            .records
            .get_mut(&id)
            .ok_or_else(|| Error::transport(op.as_str(), format!("404: no record {id}")))?;
        for (key, value) in fields {
            if key != "id" {
                record.insert(key, value);
            }
        }
        Ok(())
    }

    pub fn remove(&mut self, op: RemoteOp, id: u64) -> Result<()> {
        self.records
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| Error::transport(op.as_str(), format!("404: no record {id}")))
    }

    pub fn get(&self, id: u64) -> Option<Value> {
        self.records.get(&id).cloned().map(Value::Object)
    }

    pub fn values(&self) -> Vec<Value> {
        self.records.values().cloned().map(Value::Object).collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

fn decode_record<T: DeserializeOwned>(op: RemoteOp, value: Value) -> Result<T> {
    serde_json::from_value(value)
        .map_err(|err| Error::transport(op.as_str(), format!("malformed response: {err}")))
}

fn encode_body<T: Serialize>(op: RemoteOp, body: &T) -> Result<Value> {
    serde_json::to_value(body)
        .map_err(|err| Error::transport(op.as_str(), format!("cannot encode request: {err}")))
}

/// A request served by [`MemoryRemote`].
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteRequest {
    pub op: RemoteOp,
    pub id: Option<u64>,
    pub body: Option<Value>,
}

#[derive(Debug, Default)]
struct MemoryState {
    tasks: RecordCollection,
    contacts: RecordCollection,
    failing: HashSet<RemoteOp>,
    requests: Vec<RemoteRequest>,
}

impl MemoryState {
    fn check(&self, op: RemoteOp) -> Result<()> {
        if self.failing.contains(&op) {
            return Err(Error::transport(op.as_str(), "remote store unreachable"));
        }
        Ok(())
    }

    fn record(&mut self, op: RemoteOp, id: Option<u64>, body: Option<Value>) {
        self.requests.push(RemoteRequest { op, id, body });
    }
}

/// In-process remote store.
#[derive(Debug, Default)]
pub struct MemoryRemote {
    state: Mutex<MemoryState>,
}

impl MemoryRemote {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Store a raw task record as-is (any shape) and return its id.
    pub fn seed_task(&self, record: Value) -> TaskId {
        let mut state = self.state();
        let id = state.tasks.next_id;
        match state.tasks.insert(RemoteOp::CreateTask, record) {
            Ok(_) => TaskId(id),
            Err(_) => TaskId(0),
        }
    }

    /// Store a raw contact record as-is and return its id.
    pub fn seed_contact(&self, record: Value) -> ContactId {
        let mut state = self.state();
        let id = state.contacts.next_id;
        match state.contacts.insert(RemoteOp::CreateContact, record) {
            Ok(_) => ContactId(id),
            Err(_) => ContactId(0),
        }
    }

    /// Make every call of `op` fail until [`MemoryRemote::recover`].
    pub fn fail(&self, op: RemoteOp) {
        self.state().failing.insert(op);
    }

    pub fn recover(&self, op: RemoteOp) {
        self.state().failing.remove(&op);
    }

    /// Requests served so far (failed calls are not recorded).
    pub fn requests(&self) -> Vec<RemoteRequest> {
        self.state().requests.clone()
    }

    pub fn requests_of(&self, op: RemoteOp) -> Vec<RemoteRequest> {
        self.state()
            .requests
            .iter()
            .filter(|request| request.op == op)
            .cloned()
            .collect()
    }

    pub fn clear_requests(&self) {
        self.state().requests.clear();
    }

    pub fn task_record(&self, id: TaskId) -> Option<Value> {
        self.state().tasks.get(id.0)
    }

    pub fn contact_record(&self, id: ContactId) -> Option<Value> {
        self.state().contacts.get(id.0)
    }

    pub fn task_count(&self) -> usize {
        self.state().tasks.len()
    }
}

#[async_trait]
impl RemoteStore for MemoryRemote {
    async fn fetch_tasks(&self) -> Result<Vec<Value>> {
        let op = RemoteOp::FetchTasks;
        let mut state = self.state();
        state.check(op)?;
        state.record(op, None, None);
        Ok(state.tasks.values())
    }

    async fn create_task(&self, draft: &TaskDraft) -> Result<RawTask> {
        let op = RemoteOp::CreateTask;
        let body = encode_body(op, draft)?;
        let mut state = self.state();
        state.check(op)?;
        let stored = state.tasks.insert(op, body.clone())?;
        state.record(op, None, Some(body));
        decode_record(op, stored)
    }

    async fn patch_task(&self, id: TaskId, patch: &TaskPatch) -> Result<()> {
        let op = RemoteOp::PatchTask;
        let body = encode_body(op, patch)?;
        let mut state = self.state();
        state.check(op)?;
        state.tasks.patch(op, id.0, body.clone())?;
        state.record(op, Some(id.0), Some(body));
        Ok(())
    }

    async fn delete_task(&self, id: TaskId) -> Result<()> {
        let op = RemoteOp::DeleteTask;
        let mut state = self.state();
        state.check(op)?;
        state.tasks.remove(op, id.0)?;
        state.record(op, Some(id.0), None);
        Ok(())
    }

    async fn fetch_contacts(&self) -> Result<Vec<Value>> {
        let op = RemoteOp::FetchContacts;
        let mut state = self.state();
        state.check(op)?;
        state.record(op, None, None);
        Ok(state.contacts.values())
    }

    async fn create_contact(&self, draft: &ContactDraft) -> Result<RawContact> {
        let op = RemoteOp::CreateContact;
        let body = encode_body(op, draft)?;
        let mut state = self.state();
        state.check(op)?;
        let stored = state.contacts.insert(op, body.clone())?;
        state.record(op, None, Some(body));
        decode_record(op, stored)
    }

    async fn patch_contact(&self, id: ContactId, patch: &ContactPatch) -> Result<()> {
        let op = RemoteOp::PatchContact;
        let body = encode_body(op, patch)?;
        let mut state = self.state();
        state.check(op)?;
        state.contacts.patch(op, id.0, body.clone())?;
        state.record(op, Some(id.0), Some(body));
        Ok(())
    }

    async fn delete_contact(&self, id: ContactId) -> Result<()> {
        let op = RemoteOp::DeleteContact;
        let mut state = self.state();
        state.check(op)?;
        state.contacts.remove(op, id.0)?;
        state.record(op, Some(id.0), None);
        Ok(())
    }
}

/// Remote store backed by JSON documents in a directory.
#[derive(Debug, Clone)]
pub struct FileRemote {
    dir: PathBuf,
    timeout_ms: u64,
}

impl FileRemote {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            timeout_ms: DEFAULT_LOCK_TIMEOUT_MS,
        }
    }

    pub fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn tasks_path(&self) -> PathBuf {
        self.dir.join(TASKS_FILE)
    }

    pub fn contacts_path(&self) -> PathBuf {
        self.dir.join(CONTACTS_FILE)
    }

    fn read(&self, op: RemoteOp, path: &Path) -> Result<RecordCollection> {
        debug!(operation = %op, path = %path.display(), "remote read");
        lock::read_json_locked::<RecordCollection>(path, self.timeout_ms)
            .map(Option::unwrap_or_default)
            .map_err(|err| transport_from(op, err))
    }

    fn update<R, F>(&self, op: RemoteOp, path: &Path, f: F) -> Result<R>
    where
        F: FnOnce(&mut RecordCollection) -> Result<R>,
    {
        debug!(operation = %op, path = %path.display(), "remote write");
        lock::update_json_locked(path, self.timeout_ms, f).map_err(|err| transport_from(op, err))
    }
}

fn transport_from(op: RemoteOp, err: Error) -> Error {
    if err.is_transport() {
        err
    } else {
        Error::transport(op.as_str(), err.to_string())
    }
}

#[async_trait]
impl RemoteStore for FileRemote {
    async fn fetch_tasks(&self) -> Result<Vec<Value>> {
        let op = RemoteOp::FetchTasks;
        let collection = self.read(op, &self.tasks_path())?;
        Ok(collection.values())
    }

    async fn create_task(&self, draft: &TaskDraft) -> Result<RawTask> {
        let op = RemoteOp::CreateTask;
        let body = encode_body(op, draft)?;
        let stored = self.update(op, &self.tasks_path(), |tasks| tasks.insert(op, body))?;
        decode_record(op, stored)
    }

    async fn patch_task(&self, id: TaskId, patch: &TaskPatch) -> Result<()> {
        let op = RemoteOp::PatchTask;
        let body = encode_body(op, patch)?;
        self.update(op, &self.tasks_path(), |tasks| tasks.patch(op, id.0, body))
    }

    async fn delete_task(&self, id: TaskId) -> Result<()> {
        let op = RemoteOp::DeleteTask;
        self.update(op, &self.tasks_path(), |tasks| tasks.remove(op, id.0))
    }

    async fn fetch_contacts(&self) -> Result<Vec<Value>> {
        let op = RemoteOp::FetchContacts;
        let collection = self.read(op, &self.contacts_path())?;
        Ok(collection.values())
    }

    async fn create_contact(&self, draft: &ContactDraft) -> Result<RawContact> {
        let op = RemoteOp::CreateContact;
        let body = encode_body(op, draft)?;
        let stored = self.update(op, &self.contacts_path(), |contacts| {
            contacts.insert(op, body)
        })?;
        decode_record(op, stored)
    }

    async fn patch_contact(&self, id: ContactId, patch: &ContactPatch) -> Result<()> {
        let op = RemoteOp::PatchContact;
        let body = encode_body(op, patch)?;
        self.update(op, &self.contacts_path(), |contacts| {
            contacts.patch(op, id.0, body)
        })
    }

    async fn delete_contact(&self, id: ContactId) -> Result<()> {
        let op = RemoteOp::DeleteContact;
        self.update(op, &self.contacts_path(), |contacts| {
            contacts.remove(op, id.0)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TaskStatus;
    use chrono::NaiveDate;
    use serde_json::json;

    fn draft(title: &str) -> TaskDraft {
        TaskDraft::new(title, NaiveDate::from_ymd_opt(2026, 3, 14).expect("date"))
    }

    #[test]
    fn collection_patch_merges_top_level_fields() {
        let mut tasks = RecordCollection::default();
        let stored = tasks
            .insert(RemoteOp::CreateTask, json!({"title": "a", "status": "toDo"}))
            .expect("insert");
        assert_eq!(stored["id"], json!(1));

        tasks
            .patch(RemoteOp::PatchTask, 1, json!({"status": "done", "id": 99}))
            .expect("patch");
        let record = tasks.get(1).expect("record");
        assert_eq!(record["title"], json!("a"));
        assert_eq!(record["status"], json!("done"));
        assert_eq!(record["id"], json!(1));

        let err = tasks.patch(RemoteOp::PatchTask, 5, json!({})).unwrap_err();
        assert!(err.is_transport());
    }

    #[tokio::test]
    async fn memory_remote_injects_failures() {
        let remote = MemoryRemote::new();
        remote.fail(RemoteOp::CreateTask);
        let err = remote.create_task(&draft("x")).await.unwrap_err();
        assert!(err.is_transport());
        assert!(remote.requests().is_empty());

        remote.recover(RemoteOp::CreateTask);
        let raw = remote.create_task(&draft("x")).await.expect("create");
        assert_eq!(raw.id, Some(TaskId(1)));
        assert_eq!(remote.requests_of(RemoteOp::CreateTask).len(), 1);
    }

    #[tokio::test]
    async fn file_remote_persists_across_instances() {
        let dir = tempfile::tempdir().expect("tempdir");
        let remote = FileRemote::new(dir.path().join("remote"));
        let created = remote.create_task(&draft("Ship")).await.expect("create");
        let id = created.id.expect("id");
        remote
            .patch_task(id, &TaskPatch::status(TaskStatus::Done))
            .await
            .expect("patch");

        let reopened = FileRemote::new(dir.path().join("remote"));
        let tasks = reopened.fetch_tasks().await.expect("fetch");
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0]["status"], "done");
        assert_eq!(tasks[0]["title"], "Ship");

        reopened.delete_task(id).await.expect("delete");
        let err = reopened.delete_task(id).await.unwrap_err();
        assert!(err.is_transport());
    }

    #[tokio::test]
    async fn file_remote_fetch_on_empty_dir_is_empty() {
        let dir = tempfile::tempdir().expect("tempdir");
        let remote = FileRemote::new(dir.path());
        assert!(remote.fetch_contacts().await.expect("fetch").is_empty());
    }
}
