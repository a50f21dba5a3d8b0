//! Board view model: columns, search filtering and card summaries.

use chrono::NaiveDate;
use serde::Serialize;

use crate::model::{Category, ContactId, Priority, Task, TaskId, TaskStatus};
use crate::subtask::{self, Progress};

/// Case-insensitive search over task titles and descriptions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchFilter {
    query: String,
}

impl SearchFilter {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into().trim().to_lowercase(),
        }
    }

    pub fn is_active(&self) -> bool {
        !self.query.is_empty()
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn matches(&self, task: &Task) -> bool {
        !self.is_active()
            || task.title.to_lowercase().contains(&self.query)
            || task.description.to_lowercase().contains(&self.query)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Badge {
    pub contact_id: ContactId,
    pub first_letters: String,
    pub profile_pic: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskCard {
    pub id: TaskId,
    pub title: String,
    pub description: String,
    pub category: Category,
    pub prio: Priority,
    pub date: NaiveDate,
    pub progress: Progress,
    pub badges: Vec<Badge>,
    /// Assignees beyond the visible badges ("+N").
    pub hidden_assignees: usize,
}

impl TaskCard {
    pub fn new(task: &Task, max_badges: usize) -> Self {
        let badges = task
            .assigned_to
            .iter()
            .take(max_badges)
            .map(|snapshot| Badge {
                contact_id: snapshot.id,
                first_letters: snapshot.first_letters.clone(),
                profile_pic: snapshot.profile_pic.clone(),
            })
            .collect();
        Self {
            id: task.id,
            title: task.title.clone(),
            description: task.description.clone(),
            category: task.category,
            prio: task.prio,
            date: task.date,
            progress: subtask::progress(task),
            badges,
            hidden_assignees: task.assigned_to.len().saturating_sub(max_badges),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Column {
    pub status: TaskStatus,
    pub label: &'static str,
    pub cards: Vec<TaskCard>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BoardView {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    pub total: usize,
    pub visible: usize,
    pub columns: Vec<Column>,
}

/// Group `tasks` into the four columns, keeping collection order inside a
/// column and hiding tasks the filter rejects.
pub fn build_view(tasks: &[Task], filter: &SearchFilter, max_badges: usize) -> BoardView {
    let columns: Vec<Column> = TaskStatus::ALL
        .iter()
        .map(|&status| Column {
            status,
            label: status.label(),
            cards: tasks
                .iter()
                .filter(|task| task.status == status && filter.matches(task))
                .map(|task| TaskCard::new(task, max_badges))
                .collect(),
        })
        .collect();
    let visible = columns.iter().map(|column| column.cards.len()).sum();

    BoardView {
        query: filter.is_active().then(|| filter.query().to_string()),
        total: tasks.len(),
        visible,
        columns,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ContactSnapshot, TaskDraft};

    fn task(id: u64, title: &str, status: TaskStatus) -> Task {
        let date = NaiveDate::from_ymd_opt(2026, 4, 1).expect("date");
        let mut task = Task::from_draft(TaskId(id), TaskDraft::new(title, date));
        task.status = status;
        task
    }

    fn snapshot(id: u64) -> ContactSnapshot {
        ContactSnapshot {
            id: ContactId(id),
            name: format!("Person {id}"),
            email: String::new(),
            phone: String::new(),
            profile_pic: "#1FD7C1".to_string(),
            first_letters: "P".to_string(),
        }
    }

    #[test]
    fn columns_follow_status_order() {
        let tasks = vec![
            task(1, "Deploy", TaskStatus::Done),
            task(2, "Design", TaskStatus::ToDo),
            task(3, "Review", TaskStatus::AwaitFeedback),
            task(4, "Docs", TaskStatus::ToDo),
        ];
        let view = build_view(&tasks, &SearchFilter::default(), 3);
        let statuses: Vec<TaskStatus> = view.columns.iter().map(|c| c.status).collect();
        assert_eq!(statuses, TaskStatus::ALL.to_vec());
        let todo: Vec<u64> = view.columns[0].cards.iter().map(|c| c.id.0).collect();
        assert_eq!(todo, vec![2, 4]);
        assert!(view.columns[1].cards.is_empty());
        assert_eq!(view.visible, 4);
        assert_eq!(view.query, None);
    }

    #[test]
    fn search_matches_title_or_description() {
        let mut tasks = vec![
            task(1, "Login form", TaskStatus::ToDo),
            task(2, "Backend", TaskStatus::InProgress),
        ];
        tasks[1].description = "Wire the LOGIN endpoint".to_string();
        tasks.push(task(3, "Unrelated", TaskStatus::Done));

        let view = build_view(&tasks, &SearchFilter::new("  login "), 3);
        assert_eq!(view.visible, 2);
        assert_eq!(view.total, 3);
        assert_eq!(view.query.as_deref(), Some("login"));
    }

    #[test]
    fn badges_are_capped_with_overflow_count() {
        let mut crowded = task(1, "Crowded", TaskStatus::ToDo);
        crowded.assigned_to = (1..=5).map(snapshot).collect();
        let card = TaskCard::new(&crowded, 3);
        assert_eq!(card.badges.len(), 3);
        assert_eq!(card.hidden_assignees, 2);

        let card = TaskCard::new(&crowded, 8);
        assert_eq!(card.badges.len(), 5);
        assert_eq!(card.hidden_assignees, 0);
    }
}
