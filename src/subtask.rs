//! Subtask manager: lifecycle of a task's subtasks and derived progress.
//!
//! These functions mutate a task in memory only. Persisting the new subtask
//! list is the caller's job (see `Board::toggle_subtask` and friends).

use serde::Serialize;

use crate::error::{Error, Result};
use crate::model::{Subtask, Task};

/// Completion of a task's subtasks. Always recomputed from the subtasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Progress {
    pub checked: usize,
    pub total: usize,
    pub percent: u32,
}

/// Append an unchecked subtask. Blank text is ignored; returns whether one
/// was added.
pub fn add(task: &mut Task, text: &str) -> bool {
    let text = text.trim();
    if text.is_empty() {
        return false;
    }
    task.subtasks.push(Subtask::new(text));
    true
}

/// Flip checked/unchecked and return the new progress.
pub fn toggle(task: &mut Task, index: usize) -> Result<Progress> {
    let subtask = subtask_mut(task, index)?;
    subtask.status = subtask.status.toggled();
    Ok(progress(task))
}

/// Replace the text in place; status is kept.
pub fn edit(task: &mut Task, index: usize, text: &str) -> Result<()> {
    let text = text.trim();
    if text.is_empty() {
        return Err(Error::InvalidArgument(
            "subtask text cannot be empty".to_string(),
        ));
    }
    subtask_mut(task, index)?.text = text.to_string();
    Ok(())
}

/// Remove and return the subtask; later subtasks shift down by one.
pub fn remove(task: &mut Task, index: usize) -> Result<Subtask> {
    check_index(task, index)?;
    Ok(task.subtasks.remove(index))
}

pub fn progress(task: &Task) -> Progress {
    let total = task.subtasks.len();
    let checked = task.subtasks.iter().filter(|s| s.is_checked()).count();
    let percent = if total == 0 {
        0
    } else {
        (checked as f64 / total as f64 * 100.0).round() as u32
    };
    Progress {
        checked,
        total,
        percent,
    }
}

fn check_index(task: &Task, index: usize) -> Result<()> {
    if index >= task.subtasks.len() {
        return Err(Error::IndexOutOfRange {
            index,
            len: task.subtasks.len(),
        });
    }
    Ok(())
}

fn subtask_mut(task: &mut Task, index: usize) -> Result<&mut Subtask> {
    let len = task.subtasks.len();
    task.subtasks
        .get_mut(index)
        .ok_or(Error::IndexOutOfRange { index, len })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{SubtaskStatus, TaskDraft, TaskId};
    use chrono::NaiveDate;

    fn task_with(texts: &[&str]) -> Task {
        let date = NaiveDate::from_ymd_opt(2026, 6, 30).expect("date");
        let mut task = Task::from_draft(TaskId(1), TaskDraft::new("Release", date));
        for text in texts {
            assert!(add(&mut task, text));
        }
        task
    }

    #[test]
    fn add_ignores_blank_text() {
        let mut task = task_with(&[]);
        assert!(!add(&mut task, "   "));
        assert!(add(&mut task, "  tag build "));
        assert_eq!(task.subtasks.len(), 1);
        assert_eq!(task.subtasks[0].text, "tag build");
        assert_eq!(task.subtasks[0].status, SubtaskStatus::Unchecked);
    }

    #[test]
    fn progress_is_zero_without_subtasks() {
        let task = task_with(&[]);
        assert_eq!(
            progress(&task),
            Progress {
                checked: 0,
                total: 0,
                percent: 0
            }
        );
    }

    #[test]
    fn progress_rounds_to_nearest_percent() {
        let mut task = task_with(&["a", "b", "c"]);
        assert_eq!(toggle(&mut task, 0).expect("toggle").percent, 33);
        assert_eq!(toggle(&mut task, 1).expect("toggle").percent, 67);
        assert_eq!(toggle(&mut task, 2).expect("toggle").percent, 100);
        assert_eq!(toggle(&mut task, 2).expect("toggle").checked, 2);
    }

    #[test]
    fn out_of_range_index_fails_loudly() {
        let mut task = task_with(&["a"]);
        assert!(matches!(
            toggle(&mut task, 1),
            Err(Error::IndexOutOfRange { index: 1, len: 1 })
        ));
        assert!(edit(&mut task, 3, "x").is_err());
        assert!(remove(&mut task, 1).is_err());
    }

    #[test]
    fn edit_keeps_status() {
        let mut task = task_with(&["a"]);
        toggle(&mut task, 0).expect("toggle");
        edit(&mut task, 0, "renamed").expect("edit");
        assert_eq!(task.subtasks[0].text, "renamed");
        assert!(task.subtasks[0].is_checked());
        assert!(edit(&mut task, 0, " ").is_err());
    }

    #[test]
    fn remove_shifts_later_indices() {
        let mut task = task_with(&["first", "second", "third"]);
        let removed = remove(&mut task, 1).expect("remove");
        assert_eq!(removed.text, "second");

        toggle(&mut task, 1).expect("toggle");
        assert_eq!(task.subtasks[1].text, "third");
        assert!(task.subtasks[1].is_checked());
        assert!(!task.subtasks[0].is_checked());
    }
}
