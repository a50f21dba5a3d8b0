//! Task repository: the canonical in-memory task collection.
//!
//! Every mutation goes remote first and touches memory only after the remote
//! store accepted it; memory and the `tasks` session entry are then written
//! together, so the cache is never older than memory once an operation
//! returns.

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::contacts::ContactDirectory;
use crate::error::{Error, Result};
use crate::model::{NormalizedTask, RawTask, Task, TaskDraft, TaskId, TaskPatch};
use crate::reconcile::{reconcile_task, AssigneeDrift};
use crate::remote::RemoteStore;
use crate::session::SessionCache;

/// Outcome of [`TaskRepository::load`].
#[derive(Debug, Clone, Default, Serialize)]
pub struct LoadReport {
    pub loaded: usize,
    pub skipped: usize,
    pub reconciled: Vec<AssigneeDrift>,
}

pub struct TaskRepository {
    remote: Arc<dyn RemoteStore>,
    cache: SessionCache,
    tasks: Vec<Task>,
}

impl TaskRepository {
    pub fn new(remote: Arc<dyn RemoteStore>, cache: SessionCache) -> Self {
        Self {
            remote,
            cache,
            tasks: Vec::new(),
        }
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn get(&self, id: TaskId) -> Option<&Task> {
        self.tasks.iter().find(|task| task.id == id)
    }

    pub fn find(&self, id: TaskId) -> Result<&Task> {
        self.get(id).ok_or(Error::TaskNotFound(id))
    }

    /// Fetch all tasks, reconcile their assignees and replace the collection.
    ///
    /// The directory is fetched first if it is empty and some task has
    /// assignees. Any failure leaves the previous collection in place.
    pub async fn load(&mut self, directory: &mut ContactDirectory) -> Result<LoadReport> {
        let records = self.remote.fetch_tasks().await?;
        let total = records.len();
        let normalized = normalize_tasks(records);
        let skipped = total - normalized.len();

        if normalized
            .iter()
            .any(|entry| !entry.task.assigned_to.is_empty())
        {
            directory.ensure_loaded().await?;
        }

        let mut tasks = Vec::with_capacity(normalized.len());
        let mut reconciled = Vec::new();
        for NormalizedTask {
            mut task,
            unreadable_assignees,
        } in normalized
        {
            if let Some(drift) = reconcile_task(
                &mut task,
                directory.contacts(),
                self.remote.as_ref(),
                unreadable_assignees,
            )
            .await?
            {
                reconciled.push(drift);
            }
            tasks.push(task);
        }

        self.commit(tasks)?;
        info!(
            loaded = self.tasks.len(),
            skipped,
            reconciled = reconciled.len(),
            "tasks loaded"
        );
        Ok(LoadReport {
            loaded: self.tasks.len(),
            skipped,
            reconciled,
        })
    }

    /// Rebuild the collection from the `tasks` session entry without a
    /// remote round-trip. Returns false when nothing is cached.
    pub fn restore_from_cache(&mut self) -> Result<bool> {
        match self.cache.cached_tasks()? {
            Some(tasks) => {
                debug!(count = tasks.len(), "tasks restored from session cache");
                self.tasks = tasks;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub async fn create(&mut self, draft: TaskDraft) -> Result<Task> {
        draft.validate()?;
        let stored = self.remote.create_task(&draft).await?;
        let id = stored
            .id
            .ok_or_else(|| Error::transport("POST tasks", "response carries no id"))?;

        let task = Task::from_draft(id, draft);
        let mut next = self.tasks.clone();
        next.push(task.clone());
        self.commit(next)?;
        info!(id = %id, "task created");
        Ok(task)
    }

    /// Merge `patch` into task `id` and persist it.
    ///
    /// If the remote store rejects the update the local task is unchanged.
    pub async fn patch(&mut self, id: TaskId, patch: TaskPatch) -> Result<Task> {
        patch.validate()?;
        let index = self.index_of(id)?;
        let mut updated = self.tasks[index].clone();
        patch.apply(&mut updated);

        self.remote.patch_task(id, &patch).await?;

        let mut next = self.tasks.clone();
        next[index] = updated.clone();
        self.commit(next)?;
        debug!(id = %id, "task patched");
        Ok(updated)
    }

    /// Delete remotely, then locally. A failed delete keeps the task.
    pub async fn remove(&mut self, id: TaskId) -> Result<Task> {
        let index = self.index_of(id)?;
        self.remote.delete_task(id).await?;

        let mut next = self.tasks.clone();
        let removed = next.remove(index);
        self.commit(next)?;
        info!(id = %id, "task removed");
        Ok(removed)
    }

    /// Reconcile the in-memory collection against `directory` without
    /// refetching tasks (after a contact edit).
    ///
    /// Corrections already written remotely are kept even if a later task
    /// fails.
    pub async fn reconcile_all(&mut self, directory: &ContactDirectory) -> Result<Vec<AssigneeDrift>> {
        let mut next = self.tasks.clone();
        let mut drifts = Vec::new();
        let mut failure = None;

        for task in &mut next {
            match reconcile_task(task, directory.contacts(), self.remote.as_ref(), 0).await {
                Ok(Some(drift)) => drifts.push(drift),
                Ok(None) => {}
                Err(err) => {
                    warn!(task = %task.id, error = %err, "assignee correction failed");
                    failure = Some(err);
                    break;
                }
            }
        }

        if !drifts.is_empty() {
            self.commit(next)?;
        }
        match failure {
            Some(err) => Err(err),
            None => Ok(drifts),
        }
    }

    /// Apply `patch` to memory only and return the task as it was.
    ///
    /// Used for optimistic updates; the caller must follow up with
    /// [`TaskRepository::persist_local`] or [`TaskRepository::revert_local`].
    pub(crate) fn apply_local(&mut self, id: TaskId, patch: &TaskPatch) -> Result<Task> {
        let index = self.index_of(id)?;
        let previous = self.tasks[index].clone();
        patch.apply(&mut self.tasks[index]);
        Ok(previous)
    }

    /// Send an already-applied local change to the remote store. The cache
    /// is written separately with [`TaskRepository::flush_cache`].
    pub(crate) async fn persist_local(&self, id: TaskId, patch: &TaskPatch) -> Result<()> {
        self.remote.patch_task(id, patch).await
    }

    /// Put back the task returned by [`TaskRepository::apply_local`].
    pub(crate) fn revert_local(&mut self, previous: Task) -> Result<()> {
        let index = self.index_of(previous.id)?;
        let mut next = self.tasks.clone();
        next[index] = previous;
        self.commit(next)
    }

    /// Write the current collection to the cache as-is.
    pub(crate) fn flush_cache(&self) -> Result<()> {
        self.cache.store_tasks(&self.tasks)
    }

    fn index_of(&self, id: TaskId) -> Result<usize> {
        self.tasks
            .iter()
            .position(|task| task.id == id)
            .ok_or(Error::TaskNotFound(id))
    }

    fn commit(&mut self, tasks: Vec<Task>) -> Result<()> {
        self.cache.store_tasks(&tasks)?;
        self.tasks = tasks;
        Ok(())
    }
}

fn normalize_tasks(records: Vec<Value>) -> Vec<NormalizedTask> {
    records
        .into_iter()
        .filter_map(|value| match RawTask::from_value(value).and_then(RawTask::normalize_checked) {
            Ok(task) => Some(task),
            Err(err) => {
                warn!(error = %err, "skipping task record");
                None
            }
        })
        .collect()
}
