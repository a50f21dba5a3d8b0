//! Reconciliation of assigned-contact snapshots against the directory.
//!
//! Contacts are edited independently of tasks, so the snapshots embedded in
//! `assignedTo` drift. Each load compares every snapshot with the live
//! contact: deleted contacts are dropped, changed ones are replaced with a
//! fresh snapshot, matching ones are left alone. Only tasks that changed get
//! a partial `assignedTo` write, so a second run with no contact edits writes
//! nothing.

use serde::Serialize;
use tracing::info;

use crate::error::Result;
use crate::model::{Contact, ContactId, ContactSnapshot, Task, TaskId, TaskPatch};
use crate::remote::RemoteStore;

/// Corrected assignee list for one task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciliation {
    pub assigned_to: Vec<ContactSnapshot>,
    pub upload_needed: bool,
    pub dropped: Vec<ContactId>,
    pub refreshed: Vec<ContactId>,
}

/// Drift found and corrected on one task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssigneeDrift {
    pub task_id: TaskId,
    pub dropped: Vec<ContactId>,
    pub refreshed: Vec<ContactId>,
    #[serde(skip_serializing_if = "is_zero")]
    pub unreadable: usize,
}

fn is_zero(count: &usize) -> bool {
    *count == 0
}

/// Compare `assigned` with the live directory.
///
/// Walks the list back to front so removals do not disturb the positions
/// still to be visited; the relative order of kept snapshots is preserved.
pub fn reconcile_assignees(assigned: &[ContactSnapshot], directory: &[Contact]) -> Reconciliation {
    let mut corrected = assigned.to_vec();
    let mut dropped = Vec::new();
    let mut refreshed = Vec::new();

    for index in (0..corrected.len()).rev() {
        let id = corrected[index].id;
        match directory.iter().find(|contact| contact.id == id) {
            None => {
                corrected.remove(index);
                dropped.push(id);
            }
            Some(contact) if !contact.matches(&corrected[index]) => {
                corrected[index] = contact.snapshot();
                refreshed.push(id);
            }
            Some(_) => {}
        }
    }

    dropped.reverse();
    refreshed.reverse();
    Reconciliation {
        upload_needed: !dropped.is_empty() || !refreshed.is_empty(),
        assigned_to: corrected,
        dropped,
        refreshed,
    }
}

/// Reconcile one task in place, writing the corrected list remotely when it
/// changed. The task is only mutated after the remote write succeeds.
///
/// `unreadable` counts stored entries that were lost on the way in; the list
/// is rewritten then even when the remaining snapshots match.
pub async fn reconcile_task(
    task: &mut Task,
    directory: &[Contact],
    remote: &dyn RemoteStore,
    unreadable: usize,
) -> Result<Option<AssigneeDrift>> {
    let outcome = reconcile_assignees(&task.assigned_to, directory);
    if !outcome.upload_needed && unreadable == 0 {
        return Ok(None);
    }

    info!(
        task = %task.id,
        dropped = outcome.dropped.len(),
        refreshed = outcome.refreshed.len(),
        unreadable,
        "assignee snapshots drifted from directory"
    );
    remote
        .patch_task(task.id, &TaskPatch::assigned_to(outcome.assigned_to.clone()))
        .await?;

    task.assigned_to = outcome.assigned_to;
    Ok(Some(AssigneeDrift {
        task_id: task.id,
        dropped: outcome.dropped,
        refreshed: outcome.refreshed,
        unreadable,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contact(id: u64, name: &str) -> Contact {
        Contact {
            id: ContactId(id),
            name: name.to_string(),
            email: format!("{}@example.com", name.to_lowercase()),
            phone: String::new(),
            profile_pic: "#FF7A00".to_string(),
            first_letters: crate::model::first_letters(name),
            is_user: false,
        }
    }

    #[test]
    fn renamed_contact_is_refreshed() {
        let old = contact(5, "Old").snapshot();
        let directory = vec![contact(5, "New")];

        let outcome = reconcile_assignees(&[old], &directory);
        assert!(outcome.upload_needed);
        assert_eq!(outcome.assigned_to, vec![directory[0].snapshot()]);
        assert_eq!(outcome.refreshed, vec![ContactId(5)]);
        assert!(outcome.dropped.is_empty());
    }

    #[test]
    fn deleted_contact_is_dropped() {
        let outcome = reconcile_assignees(&[contact(9, "Gone").snapshot()], &[contact(1, "Ann")]);
        assert!(outcome.upload_needed);
        assert!(outcome.assigned_to.is_empty());
        assert_eq!(outcome.dropped, vec![ContactId(9)]);
    }

    #[test]
    fn matching_snapshots_are_left_alone() {
        let directory = vec![contact(1, "Ann"), contact(2, "Bo")];
        let assigned = vec![directory[1].snapshot(), directory[0].snapshot()];
        let outcome = reconcile_assignees(&assigned, &directory);
        assert!(!outcome.upload_needed);
        assert_eq!(outcome.assigned_to, assigned);
    }

    #[test]
    fn mixed_drift_keeps_order() {
        let mut pic_changed = contact(2, "Bo");
        pic_changed.profile_pic = "#0038FF".to_string();
        let directory = vec![contact(1, "Ann"), pic_changed.clone(), contact(4, "Di")];
        let assigned = vec![
            contact(1, "Ann").snapshot(),
            contact(3, "Cy").snapshot(),
            contact(2, "Bo").snapshot(),
            contact(7, "Ed").snapshot(),
            contact(4, "Di").snapshot(),
        ];

        let outcome = reconcile_assignees(&assigned, &directory);
        let ids: Vec<u64> = outcome.assigned_to.iter().map(|s| s.id.0).collect();
        assert_eq!(ids, vec![1, 2, 4]);
        assert_eq!(outcome.assigned_to[1].profile_pic, "#0038FF");
        assert_eq!(outcome.dropped, vec![ContactId(3), ContactId(7)]);
        assert_eq!(outcome.refreshed, vec![ContactId(2)]);

        let again = reconcile_assignees(&outcome.assigned_to, &directory);
        assert!(!again.upload_needed);
    }
}
