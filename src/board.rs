//! The board session object.
//!
//! A [`Board`] owns everything one session needs: the task repository, the
//! contact directory, the drag controller, the active search filter and an
//! optional event sink. It is created on session start and consumed by
//! [`Board::logout`], which clears the session cache.

use std::sync::Arc;

use serde::Serialize;
use tracing::warn;

use crate::config::BoardConfig;
use crate::contacts::ContactDirectory;
use crate::drag::{DragController, DropOutcome};
use crate::error::{Error, Result};
use crate::events::{Event, EventKind, EventSink};
use crate::model::{
    Contact, ContactDraft, ContactId, ContactPatch, ContactSnapshot, Subtask, Task, TaskDraft,
    TaskId, TaskPatch, TaskStatus,
};
use crate::reconcile::AssigneeDrift;
use crate::remote::RemoteStore;
use crate::repository::{LoadReport, TaskRepository};
use crate::session::SessionCache;
use crate::subtask::{self, Progress};
use crate::view::{build_view, BoardView, SearchFilter};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoardOptions {
    pub max_visible_badges: usize,
    pub rollback_failed_moves: bool,
}

impl Default for BoardOptions {
    fn default() -> Self {
        Self::from(&BoardConfig::default())
    }
}

impl From<&BoardConfig> for BoardOptions {
    fn from(config: &BoardConfig) -> Self {
        Self {
            max_visible_badges: config.max_visible_badges,
            rollback_failed_moves: config.rollback_failed_moves,
        }
    }
}

/// Result of a contact edit: the contact and the task corrections it caused.
#[derive(Debug, Clone, Serialize)]
pub struct ContactChange {
    pub contact: Contact,
    pub reconciled: Vec<AssigneeDrift>,
}

pub struct Board {
    repo: TaskRepository,
    directory: ContactDirectory,
    drag: DragController,
    filter: SearchFilter,
    cache: SessionCache,
    events: Option<EventSink>,
    max_visible_badges: usize,
    warnings: Vec<String>,
}

impl Board {
    pub fn new(remote: Arc<dyn RemoteStore>, cache: SessionCache, options: BoardOptions) -> Self {
        Self {
            repo: TaskRepository::new(remote.clone(), cache.clone()),
            directory: ContactDirectory::new(remote, cache.clone()),
            drag: DragController::new(options.rollback_failed_moves),
            filter: SearchFilter::default(),
            cache,
            events: None,
            max_visible_badges: options.max_visible_badges,
            warnings: Vec::new(),
        }
    }

    pub fn with_events(mut self, sink: EventSink) -> Self {
        self.events = Some(sink);
        self
    }

    pub fn repository(&self) -> &TaskRepository {
        &self.repo
    }

    pub fn directory(&self) -> &ContactDirectory {
        &self.directory
    }

    pub fn drag(&self) -> &DragController {
        &self.drag
    }

    pub fn tasks(&self) -> &[Task] {
        self.repo.tasks()
    }

    pub fn task(&self, id: TaskId) -> Result<&Task> {
        self.repo.find(id)
    }

    /// Event emission problems collected since the last call.
    pub fn take_warnings(&mut self) -> Vec<String> {
        std::mem::take(&mut self.warnings)
    }

    // =========================================================================
    // Loading
    // =========================================================================

    pub async fn load(&mut self) -> Result<LoadReport> {
        let report = self.repo.load(&mut self.directory).await?;
        if !report.reconciled.is_empty() {
            self.notify(EventKind::AssigneesReconciled, &report.reconciled);
        }
        self.notify(
            EventKind::TasksLoaded,
            serde_json::json!({ "loaded": report.loaded, "skipped": report.skipped }),
        );
        Ok(report)
    }

    /// Rebuild tasks and contacts from the session cache; true when tasks
    /// were cached.
    pub fn restore_from_cache(&mut self) -> Result<bool> {
        self.directory.restore_from_cache()?;
        self.repo.restore_from_cache()
    }

    pub async fn load_contacts(&mut self) -> Result<usize> {
        self.directory.load().await
    }

    // =========================================================================
    // Tasks
    // =========================================================================

    pub async fn create_task(&mut self, draft: TaskDraft) -> Result<Task> {
        let task = self.repo.create(draft).await?;
        self.notify(EventKind::TaskCreated, &task);
        Ok(task)
    }

    pub async fn update_task(&mut self, id: TaskId, patch: TaskPatch) -> Result<Task> {
        if patch.is_empty() {
            return Err(Error::InvalidArgument("nothing to update".to_string()));
        }
        let task = self.repo.patch(id, patch).await?;
        self.notify(EventKind::TaskUpdated, &task);
        Ok(task)
    }

    /// Delete a task. A drag of that task ends once the delete went through.
    pub async fn remove_task(&mut self, id: TaskId) -> Result<Task> {
        let task = self.repo.remove(id).await?;
        if self.drag.dragging() == Some(id) {
            self.drag.cancel_drag();
        }
        self.notify(EventKind::TaskRemoved, serde_json::json!({ "id": id }));
        Ok(task)
    }

    // =========================================================================
    // Status transitions
    // =========================================================================

    /// Begin dragging a task; returns the stale drag it replaced.
    pub fn start_drag(&mut self, id: TaskId) -> Result<Option<TaskId>> {
        self.repo.find(id)?;
        Ok(self.drag.start_drag(id))
    }

    pub fn cancel_drag(&mut self) -> Option<TaskId> {
        self.drag.cancel_drag()
    }

    /// Drop the dragged task on the column labelled `label`.
    pub async fn drop_on(&mut self, label: &str) -> Result<DropOutcome> {
        let outcome = self.drag.drop_on(label, &mut self.repo).await?;
        if outcome.is_moved() {
            self.notify(EventKind::TaskMoved, &outcome);
        }
        Ok(outcome)
    }

    pub async fn move_task(&mut self, id: TaskId, status: TaskStatus) -> Result<DropOutcome> {
        let outcome = self.drag.move_to(id, status, &mut self.repo).await?;
        self.notify(EventKind::TaskMoved, &outcome);
        Ok(outcome)
    }

    // =========================================================================
    // Subtasks
    // =========================================================================

    /// Append a subtask; blank text changes nothing and returns `None`.
    pub async fn add_subtask(&mut self, id: TaskId, text: &str) -> Result<Option<Task>> {
        let mut edited = self.repo.find(id)?.clone();
        if !subtask::add(&mut edited, text) {
            return Ok(None);
        }
        let task = self.persist_subtasks(id, edited.subtasks).await?;
        Ok(Some(task))
    }

    pub async fn toggle_subtask(&mut self, id: TaskId, index: usize) -> Result<Progress> {
        let mut edited = self.repo.find(id)?.clone();
        subtask::toggle(&mut edited, index)?;
        let task = self.persist_subtasks(id, edited.subtasks).await?;
        Ok(subtask::progress(&task))
    }

    pub async fn edit_subtask(&mut self, id: TaskId, index: usize, text: &str) -> Result<Task> {
        let mut edited = self.repo.find(id)?.clone();
        subtask::edit(&mut edited, index, text)?;
        self.persist_subtasks(id, edited.subtasks).await
    }

    pub async fn remove_subtask(&mut self, id: TaskId, index: usize) -> Result<Subtask> {
        let mut edited = self.repo.find(id)?.clone();
        let removed = subtask::remove(&mut edited, index)?;
        self.persist_subtasks(id, edited.subtasks).await?;
        Ok(removed)
    }

    async fn persist_subtasks(&mut self, id: TaskId, subtasks: Vec<Subtask>) -> Result<Task> {
        let task = self.repo.patch(id, TaskPatch::subtasks(subtasks)).await?;
        self.notify(
            EventKind::SubtaskChanged,
            serde_json::json!({ "id": id, "progress": subtask::progress(&task) }),
        );
        Ok(task)
    }

    // =========================================================================
    // Assignment
    // =========================================================================

    /// Assign a contact by embedding a fresh snapshot. Already assigned
    /// contacts are left as they are.
    pub async fn assign(&mut self, id: TaskId, contact: ContactId) -> Result<Task> {
        self.directory.ensure_loaded().await?;
        let snapshot = self.directory.snapshot(contact)?;
        let current = self.repo.find(id)?;
        if current.is_assigned(contact) {
            return Ok(current.clone());
        }
        let mut assigned = current.assigned_to.clone();
        assigned.push(snapshot);
        let task = self.repo.patch(id, TaskPatch::assigned_to(assigned)).await?;
        self.notify(EventKind::TaskUpdated, &task);
        Ok(task)
    }

    /// Fresh snapshots for `ids`, loading the directory on first use.
    pub async fn snapshots(&mut self, ids: &[ContactId]) -> Result<Vec<ContactSnapshot>> {
        self.directory.ensure_loaded().await?;
        ids.iter().map(|&id| self.directory.snapshot(id)).collect()
    }

    pub async fn unassign(&mut self, id: TaskId, contact: ContactId) -> Result<Task> {
        let current = self.repo.find(id)?;
        if !current.is_assigned(contact) {
            return Ok(current.clone());
        }
        let assigned = current
            .assigned_to
            .iter()
            .filter(|snapshot| snapshot.id != contact)
            .cloned()
            .collect();
        let task = self.repo.patch(id, TaskPatch::assigned_to(assigned)).await?;
        self.notify(EventKind::TaskUpdated, &task);
        Ok(task)
    }

    // =========================================================================
    // Contacts
    // =========================================================================

    pub async fn create_contact(&mut self, draft: ContactDraft) -> Result<Contact> {
        self.directory.ensure_loaded().await?;
        let contact = self.directory.create(draft).await?;
        self.notify(EventKind::ContactCreated, &contact);
        Ok(contact)
    }

    /// Edit a contact, then correct every loaded task that embeds it.
    pub async fn update_contact(&mut self, id: ContactId, patch: ContactPatch) -> Result<ContactChange> {
        if patch.is_empty() {
            return Err(Error::InvalidArgument("nothing to update".to_string()));
        }
        self.directory.ensure_loaded().await?;
        let contact = self.directory.patch(id, patch).await?;
        self.notify(EventKind::ContactUpdated, &contact);
        let reconciled = self.reconcile_loaded().await?;
        Ok(ContactChange {
            contact,
            reconciled,
        })
    }

    /// Delete a contact, then drop it from every loaded task.
    pub async fn remove_contact(&mut self, id: ContactId) -> Result<ContactChange> {
        self.directory.ensure_loaded().await?;
        let contact = self.directory.remove(id).await?;
        self.notify(EventKind::ContactRemoved, serde_json::json!({ "id": id }));
        let reconciled = self.reconcile_loaded().await?;
        Ok(ContactChange {
            contact,
            reconciled,
        })
    }

    async fn reconcile_loaded(&mut self) -> Result<Vec<AssigneeDrift>> {
        let reconciled = self.repo.reconcile_all(&self.directory).await?;
        if !reconciled.is_empty() {
            self.notify(EventKind::AssigneesReconciled, &reconciled);
        }
        Ok(reconciled)
    }

    // =========================================================================
    // View
    // =========================================================================

    pub fn set_search(&mut self, query: &str) {
        self.filter = SearchFilter::new(query);
    }

    pub fn search(&self) -> &SearchFilter {
        &self.filter
    }

    /// Columns with the active search filter applied.
    pub fn view(&self) -> BoardView {
        build_view(self.repo.tasks(), &self.filter, self.max_visible_badges)
    }

    /// End the session: clear the session cache and drop all state.
    pub fn logout(self) -> Result<()> {
        self.cache.clear()
    }

    fn notify<T: Serialize>(&mut self, kind: EventKind, data: T) {
        let Some(sink) = self.events.as_mut() else {
            return;
        };
        let result = Event::new(kind)
            .with_data(data)
            .and_then(|event| sink.emit(&event));
        if let Err(err) = result {
            warn!(error = %err, "failed to emit board event");
            self.warnings.push(format!("event emit failed: {err}"));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::{MemoryRemote, RemoteOp};
    use chrono::NaiveDate;
    use serde_json::json;

    fn board() -> (Arc<MemoryRemote>, SessionCache, Board) {
        let remote = Arc::new(MemoryRemote::new());
        let cache = SessionCache::in_memory();
        let board = Board::new(remote.clone(), cache.clone(), BoardOptions::default());
        (remote, cache, board)
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 11, 2).expect("date")
    }

    #[tokio::test]
    async fn subtask_indices_shift_after_removal() {
        let (remote, _, mut board) = board();
        let id = remote.seed_task(json!({
            "title": "Release",
            "date": "2026-11-02",
            "subtasks": ["a", "b", "c"]
        }));
        board.load().await.expect("load");

        let removed = board.remove_subtask(id, 1).await.expect("remove");
        assert_eq!(removed.text, "b");
        let progress = board.toggle_subtask(id, 1).await.expect("toggle");
        assert_eq!(progress.checked, 1);

        let task = board.task(id).expect("task");
        let texts: Vec<&str> = task.subtasks.iter().map(|s| s.text.as_str()).collect();
        assert_eq!(texts, vec!["a", "c"]);
        assert!(task.subtasks[1].is_checked());
        assert_eq!(remote.task_record(id).expect("record")["subtasks"][1]["text"], "c");
    }

    #[tokio::test]
    async fn blank_subtask_is_not_persisted() {
        let (remote, _, mut board) = board();
        let task = board
            .create_task(TaskDraft::new("Plan", date()))
            .await
            .expect("create");
        remote.clear_requests();

        assert!(board.add_subtask(task.id, "   ").await.expect("add").is_none());
        assert!(remote.requests().is_empty());
    }

    #[tokio::test]
    async fn assign_embeds_snapshot_once() {
        let (remote, _, mut board) = board();
        let ada = remote.seed_contact(json!({"name": "Ada Lovelace", "email": "ada@example.com"}));
        let task = board
            .create_task(TaskDraft::new("Engine", date()))
            .await
            .expect("create");

        let assigned = board.assign(task.id, ada).await.expect("assign");
        assert_eq!(assigned.assigned_to.len(), 1);
        assert_eq!(assigned.assigned_to[0].first_letters, "AL");

        remote.clear_requests();
        let again = board.assign(task.id, ada).await.expect("assign again");
        assert_eq!(again.assigned_to.len(), 1);
        assert!(remote.requests_of(RemoteOp::PatchTask).is_empty());

        let cleared = board.unassign(task.id, ada).await.expect("unassign");
        assert!(cleared.assigned_to.is_empty());
    }

    #[tokio::test]
    async fn contact_rename_refreshes_assigned_tasks() {
        let (remote, _, mut board) = board();
        let ada = remote.seed_contact(json!({"name": "Ada Lovelace"}));
        let task = board
            .create_task(TaskDraft::new("Engine", date()))
            .await
            .expect("create");
        board.assign(task.id, ada).await.expect("assign");

        let change = board
            .update_contact(ada, ContactPatch::rename("Ada Byron"))
            .await
            .expect("rename");
        assert_eq!(change.contact.first_letters, "AB");
        assert_eq!(change.reconciled.len(), 1);
        let task = board.task(task.id).expect("task");
        assert_eq!(task.assigned_to[0].name, "Ada Byron");
    }

    #[tokio::test]
    async fn contact_removal_drops_assignee() {
        let (remote, _, mut board) = board();
        let ada = remote.seed_contact(json!({"name": "Ada Lovelace"}));
        let alan = remote.seed_contact(json!({"name": "Alan Turing"}));
        let task = board
            .create_task(TaskDraft::new("Engine", date()))
            .await
            .expect("create");
        board.assign(task.id, ada).await.expect("assign");
        board.assign(task.id, alan).await.expect("assign");

        let change = board.remove_contact(ada).await.expect("remove");
        assert_eq!(change.reconciled[0].dropped, vec![ada]);
        let ids: Vec<ContactId> = board
            .task(task.id)
            .expect("task")
            .assigned_to
            .iter()
            .map(|s| s.id)
            .collect();
        assert_eq!(ids, vec![alan]);
    }

    #[tokio::test]
    async fn drop_moves_dragged_task_and_emits_event() {
        let (remote, _, board) = board();
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("events.jsonl");
        let mut board = board.with_events(EventSink::file(&path).expect("sink"));
        let id = remote.seed_task(json!({"title": "Ship", "date": "2026-11-02"}));
        board.load().await.expect("load");

        board.start_drag(id).expect("drag");
        assert!(board.drag().zones().is_attached());
        let outcome = board.drop_on("Done").await.expect("drop");
        assert!(outcome.is_moved());
        assert!(!board.drag().zones().is_attached());
        assert_eq!(board.task(id).expect("task").status, TaskStatus::Done);

        let content = std::fs::read_to_string(&path).expect("read events");
        assert!(content.lines().any(|line| line.contains("\"task_moved\"")));
        assert!(board.take_warnings().is_empty());
    }

    #[tokio::test]
    async fn search_filters_view() {
        let (_, _, mut board) = board();
        board
            .create_task(TaskDraft::new("Login form", date()))
            .await
            .expect("create");
        board
            .create_task(TaskDraft::new("Billing", date()))
            .await
            .expect("create");

        board.set_search("LOGIN");
        let view = board.view();
        assert_eq!(view.total, 2);
        assert_eq!(view.visible, 1);
        board.set_search("");
        assert_eq!(board.view().visible, 2);
    }

    #[tokio::test]
    async fn logout_clears_session_cache() {
        let (_, cache, mut board) = board();
        board
            .create_task(TaskDraft::new("Cached", date()))
            .await
            .expect("create");
        assert!(cache.cached_tasks().expect("cache").is_some());

        board.logout().expect("logout");
        assert!(cache.cached_tasks().expect("cache").is_none());
    }
}
