//! Status transitions and the drag/drop protocol.
//!
//! Any status may move to any other. A drop applies the new status locally
//! first, then persists it; when the remote store rejects the change the
//! local status is rolled back (unless rollback is turned off in config, in
//! which case memory and cache keep the optimistic status).

use serde::Serialize;
use tracing::{debug, warn};

use crate::error::Result;
use crate::model::{TaskId, TaskPatch, TaskStatus};
use crate::repository::TaskRepository;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ListenerState {
    Detached,
    Attached,
}

/// Drop-target listeners on the four columns, attached while a drag is in
/// progress. `attach` and `detach` are idempotent and report whether the
/// state changed.
#[derive(Debug, Clone)]
pub struct DropZones {
    zones: [TaskStatus; 4],
    state: ListenerState,
}

impl DropZones {
    pub fn new() -> Self {
        Self {
            zones: TaskStatus::ALL,
            state: ListenerState::Detached,
        }
    }

    pub fn attach(&mut self) -> bool {
        if self.state == ListenerState::Attached {
            return false;
        }
        debug!(zones = self.zones.len(), "drop zones attached");
        self.state = ListenerState::Attached;
        true
    }

    pub fn detach(&mut self) -> bool {
        if self.state == ListenerState::Detached {
            return false;
        }
        debug!("drop zones detached");
        self.state = ListenerState::Detached;
        true
    }

    pub fn state(&self) -> ListenerState {
        self.state
    }

    pub fn is_attached(&self) -> bool {
        self.state == ListenerState::Attached
    }

    pub fn zones(&self) -> &[TaskStatus] {
        &self.zones
    }
}

impl Default for DropZones {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DropOutcome {
    Moved {
        task_id: TaskId,
        from: TaskStatus,
        to: TaskStatus,
    },
    /// Drop with no task being dragged.
    NoDrag,
    /// Drop on an empty or unknown column label.
    InvalidTarget { label: String },
}

impl DropOutcome {
    pub fn is_moved(&self) -> bool {
        matches!(self, DropOutcome::Moved { .. })
    }
}

#[derive(Debug)]
pub struct DragController {
    dragging: Option<TaskId>,
    zones: DropZones,
    rollback_failed_moves: bool,
}

impl DragController {
    pub fn new(rollback_failed_moves: bool) -> Self {
        Self {
            dragging: None,
            zones: DropZones::new(),
            rollback_failed_moves,
        }
    }

    /// Start dragging `id`; returns the stale drag it replaced, if any.
    pub fn start_drag(&mut self, id: TaskId) -> Option<TaskId> {
        let stale = self.dragging.replace(id);
        if let Some(stale) = stale {
            debug!(stale = %stale, task = %id, "replacing stale drag");
        }
        self.zones.attach();
        stale
    }

    pub fn cancel_drag(&mut self) -> Option<TaskId> {
        self.zones.detach();
        self.dragging.take()
    }

    pub fn dragging(&self) -> Option<TaskId> {
        self.dragging
    }

    pub fn zones(&self) -> &DropZones {
        &self.zones
    }

    /// Drop the dragged task on the column labelled `label`.
    ///
    /// The drag ends whatever the outcome. With nothing dragged or an
    /// unknown label nothing else happens.
    pub async fn drop_on(&mut self, label: &str, repo: &mut TaskRepository) -> Result<DropOutcome> {
        let Some(id) = self.cancel_drag() else {
            return Ok(DropOutcome::NoDrag);
        };
        let Some(status) = TaskStatus::parse(label.trim()) else {
            debug!(label, "drop on unknown column ignored");
            return Ok(DropOutcome::InvalidTarget {
                label: label.to_string(),
            });
        };
        self.move_to(id, status, repo).await
    }

    /// Move a task to `status` without a drag (menu or keyboard move).
    pub async fn move_to(
        &self,
        id: TaskId,
        status: TaskStatus,
        repo: &mut TaskRepository,
    ) -> Result<DropOutcome> {
        move_task(repo, id, status, self.rollback_failed_moves).await
    }
}

/// Optimistic local status change, then remote persistence, then cache.
pub async fn move_task(
    repo: &mut TaskRepository,
    id: TaskId,
    status: TaskStatus,
    rollback_failed_moves: bool,
) -> Result<DropOutcome> {
    let patch = TaskPatch::status(status);
    let previous = repo.apply_local(id, &patch)?;

    if let Err(err) = repo.persist_local(id, &patch).await {
        if rollback_failed_moves {
            warn!(task = %id, error = %err, "move failed, restoring previous status");
            repo.revert_local(previous)?;
        } else {
            warn!(task = %id, error = %err, "move failed, keeping optimistic status");
            repo.flush_cache()?;
        }
        return Err(err);
    }

    repo.flush_cache()?;
    Ok(DropOutcome::Moved {
        task_id: id,
        from: previous.status,
        to: status,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drop_zones_toggle_idempotently() {
        let mut zones = DropZones::new();
        assert!(!zones.detach());
        assert!(zones.attach());
        assert!(!zones.attach());
        assert_eq!(zones.state(), ListenerState::Attached);
        assert!(zones.detach());
        assert!(!zones.is_attached());
        assert_eq!(zones.zones().len(), 4);
    }

    #[test]
    fn new_drag_replaces_stale_one() {
        let mut drag = DragController::new(true);
        assert_eq!(drag.start_drag(TaskId(1)), None);
        assert_eq!(drag.start_drag(TaskId(2)), Some(TaskId(1)));
        assert_eq!(drag.dragging(), Some(TaskId(2)));
        assert!(drag.zones().is_attached());

        assert_eq!(drag.cancel_drag(), Some(TaskId(2)));
        assert!(!drag.zones().is_attached());
        assert_eq!(drag.dragging(), None);
    }
}
