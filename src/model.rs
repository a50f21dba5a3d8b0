//! Typed records for the board: tasks, subtasks, contacts and snapshots.
//!
//! Remote records arrive as [`RawTask`] / [`RawContact`], whose fields are all
//! optional. They are normalized into the typed records exactly once, at the
//! boundary; nothing past this module re-derives defaults.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::error::{Error, Result};

/// Wire format of due dates.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

const PROFILE_COLORS: [&str; 15] = [
    "#FF7A00", "#FF5EB3", "#6E52FF", "#9327FF", "#00BEE8", "#1FD7C1", "#FF745E", "#FFA35E",
    "#FC71FF", "#FFC701", "#0038FF", "#C3FF2B", "#FFE62B", "#FF4646", "#FFBB2B",
];

/// Identifier assigned to a task by the remote store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub u64);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TaskId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        s.trim()
            .parse::<u64>()
            .map(TaskId)
            .map_err(|_| Error::InvalidArgument(format!("invalid task id '{s}'")))
    }
}

/// Identifier of a contact in the directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContactId(pub u64);

impl fmt::Display for ContactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ContactId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        s.trim()
            .parse::<u64>()
            .map(ContactId)
            .map_err(|_| Error::InvalidArgument(format!("invalid contact id '{s}'")))
    }
}

/// Column a task occupies on the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TaskStatus {
    ToDo,
    InProgress,
    AwaitFeedback,
    Done,
}

impl TaskStatus {
    /// All statuses in board column order.
    pub const ALL: [TaskStatus; 4] = [
        TaskStatus::ToDo,
        TaskStatus::InProgress,
        TaskStatus::AwaitFeedback,
        TaskStatus::Done,
    ];

    /// Wire name (`toDo`, `inProgress`, ...).
    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::ToDo => "toDo",
            TaskStatus::InProgress => "inProgress",
            TaskStatus::AwaitFeedback => "awaitFeedback",
            TaskStatus::Done => "done",
        }
    }

    /// Column heading.
    pub fn label(self) -> &'static str {
        match self {
            TaskStatus::ToDo => "To do",
            TaskStatus::InProgress => "In progress",
            TaskStatus::AwaitFeedback => "Await feedback",
            TaskStatus::Done => "Done",
        }
    }

    /// Parse a status label. Case, spaces, `-` and `_` are ignored, so
    /// `toDo`, `to-do` and `To do` all resolve to [`TaskStatus::ToDo`].
    pub fn parse(label: &str) -> Option<Self> {
        let key: String = label
            .chars()
            .filter(|ch| !matches!(ch, ' ' | '-' | '_'))
            .collect::<String>()
            .to_ascii_lowercase();
        match key.as_str() {
            "todo" => Some(TaskStatus::ToDo),
            "inprogress" => Some(TaskStatus::InProgress),
            "awaitfeedback" => Some(TaskStatus::AwaitFeedback),
            "done" => Some(TaskStatus::Done),
            _ => None,
        }
    }
}

impl Default for TaskStatus {
    fn default() -> Self {
        TaskStatus::ToDo
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        TaskStatus::parse(s).ok_or_else(|| {
            Error::InvalidArgument(format!(
                "unknown task status '{s}' (expected toDo|inProgress|awaitFeedback|done)"
            ))
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    Urgent,
}

impl Priority {
    pub fn as_str(self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::Urgent => "urgent",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "low" => Some(Priority::Low),
            "medium" => Some(Priority::Medium),
            "urgent" => Some(Priority::Urgent),
            _ => None,
        }
    }
}

impl Default for Priority {
    fn default() -> Self {
        Priority::Medium
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Priority::parse(s).ok_or_else(|| {
            Error::InvalidArgument(format!(
                "unknown priority '{s}' (expected low|medium|urgent)"
            ))
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    #[serde(rename = "User Story")]
    UserStory,
    #[serde(rename = "Technical Task")]
    TechnicalTask,
}

impl Category {
    pub fn as_str(self) -> &'static str {
        match self {
            Category::UserStory => "User Story",
            Category::TechnicalTask => "Technical Task",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        let key: String = value
            .chars()
            .filter(|ch| !matches!(ch, ' ' | '-' | '_'))
            .collect::<String>()
            .to_ascii_lowercase();
        match key.as_str() {
            "userstory" | "story" => Some(Category::UserStory),
            "technicaltask" | "technical" => Some(Category::TechnicalTask),
            _ => None,
        }
    }
}

impl Default for Category {
    fn default() -> Self {
        Category::UserStory
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Category::parse(s).ok_or_else(|| {
            Error::InvalidArgument(format!(
                "unknown category '{s}' (expected \"User Story\" or \"Technical Task\")"
            ))
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubtaskStatus {
    Unchecked,
    Checked,
}

impl SubtaskStatus {
    pub fn toggled(self) -> Self {
        match self {
            SubtaskStatus::Unchecked => SubtaskStatus::Checked,
            SubtaskStatus::Checked => SubtaskStatus::Unchecked,
        }
    }
}

impl Default for SubtaskStatus {
    fn default() -> Self {
        SubtaskStatus::Unchecked
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subtask {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    pub text: String,
    #[serde(default)]
    pub status: SubtaskStatus,
}

impl Subtask {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            id: None,
            text: text.into(),
            status: SubtaskStatus::Unchecked,
        }
    }

    pub fn is_checked(&self) -> bool {
        self.status == SubtaskStatus::Checked
    }
}

/// Denormalized copy of a contact's display fields, embedded in a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactSnapshot {
    pub id: ContactId,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub profile_pic: String,
    pub first_letters: String,
}

/// A directory entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    pub id: ContactId,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub profile_pic: String,
    pub first_letters: String,
    #[serde(default)]
    pub is_user: bool,
}

impl Contact {
    pub fn snapshot(&self) -> ContactSnapshot {
        ContactSnapshot {
            id: self.id,
            name: self.name.clone(),
            email: self.email.clone(),
            phone: self.phone.clone(),
            profile_pic: self.profile_pic.clone(),
            first_letters: self.first_letters.clone(),
        }
    }

    /// True when every display field of `snapshot` equals this contact's.
    pub fn matches(&self, snapshot: &ContactSnapshot) -> bool {
        self.id == snapshot.id
            && self.name == snapshot.name
            && self.email == snapshot.email
            && self.phone == snapshot.phone
            && self.profile_pic == snapshot.profile_pic
            && self.first_letters == snapshot.first_letters
    }
}

/// Input for creating a contact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactDraft {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub profile_pic: String,
    pub first_letters: String,
    pub is_user: bool,
}

impl ContactDraft {
    pub fn new(name: impl Into<String>, email: impl Into<String>, phone: impl Into<String>) -> Self {
        let name = name.into().trim().to_string();
        Self {
            first_letters: first_letters(&name),
            profile_pic: default_profile_pic(&name),
            name,
            email: email.into().trim().to_string(),
            phone: phone.into().trim().to_string(),
            is_user: false,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::InvalidArgument(
                "contact name cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Partial update of a contact.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_pic: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_letters: Option<String>,
}

impl ContactPatch {
    /// Rename; initials follow the new name.
    pub fn rename(name: impl Into<String>) -> Self {
        let name = name.into().trim().to_string();
        Self {
            first_letters: Some(first_letters(&name)),
            name: Some(name),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.email.is_none()
            && self.phone.is_none()
            && self.profile_pic.is_none()
            && self.first_letters.is_none()
    }

    pub fn apply(&self, contact: &mut Contact) {
        if let Some(name) = &self.name {
            contact.name = name.clone();
        }
        if let Some(email) = &self.email {
            contact.email = email.clone();
        }
        if let Some(phone) = &self.phone {
            contact.phone = phone.clone();
        }
        if let Some(profile_pic) = &self.profile_pic {
            contact.profile_pic = profile_pic.clone();
        }
        if let Some(letters) = &self.first_letters {
            contact.first_letters = letters.clone();
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: TaskId,
    pub title: String,
    pub description: String,
    pub category: Category,
    pub date: NaiveDate,
    pub prio: Priority,
    pub status: TaskStatus,
    pub subtasks: Vec<Subtask>,
    pub assigned_to: Vec<ContactSnapshot>,
}

impl Task {
    pub fn from_draft(id: TaskId, draft: TaskDraft) -> Self {
        Self {
            id,
            title: draft.title,
            description: draft.description,
            category: draft.category,
            date: draft.date,
            prio: draft.prio,
            status: draft.status,
            subtasks: draft.subtasks,
            assigned_to: draft.assigned_to,
        }
    }

    pub fn is_assigned(&self, contact: ContactId) -> bool {
        self.assigned_to.iter().any(|snapshot| snapshot.id == contact)
    }
}

/// A fully formed task that has not been persisted yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDraft {
    pub title: String,
    pub description: String,
    pub category: Category,
    pub date: NaiveDate,
    pub prio: Priority,
    pub status: TaskStatus,
    pub subtasks: Vec<Subtask>,
    pub assigned_to: Vec<ContactSnapshot>,
}

impl TaskDraft {
    pub fn new(title: impl Into<String>, date: NaiveDate) -> Self {
        Self {
            title: title.into(),
            description: String::new(),
            category: Category::default(),
            date,
            prio: Priority::default(),
            status: TaskStatus::default(),
            subtasks: Vec::new(),
            assigned_to: Vec::new(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.title.trim().is_empty() {
            return Err(Error::InvalidArgument("title cannot be empty".to_string()));
        }
        Ok(())
    }
}

/// Partial update of a task. Only `Some` fields are sent to the remote store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<Category>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prio: Option<Priority>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<TaskStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtasks: Option<Vec<Subtask>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_to: Option<Vec<ContactSnapshot>>,
}

impl TaskPatch {
    pub fn status(status: TaskStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn subtasks(subtasks: Vec<Subtask>) -> Self {
        Self {
            subtasks: Some(subtasks),
            ..Self::default()
        }
    }

    pub fn assigned_to(assigned_to: Vec<ContactSnapshot>) -> Self {
        Self {
            assigned_to: Some(assigned_to),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.category.is_none()
            && self.date.is_none()
            && self.prio.is_none()
            && self.status.is_none()
            && self.subtasks.is_none()
            && self.assigned_to.is_none()
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(title) = &self.title {
            if title.trim().is_empty() {
                return Err(Error::InvalidArgument("title cannot be empty".to_string()));
            }
        }
        Ok(())
    }

    pub fn apply(&self, task: &mut Task) {
        if let Some(title) = &self.title {
            task.title = title.clone();
        }
        if let Some(description) = &self.description {
            task.description = description.clone();
        }
        if let Some(category) = self.category {
            task.category = category;
        }
        if let Some(date) = self.date {
            task.date = date;
        }
        if let Some(prio) = self.prio {
            task.prio = prio;
        }
        if let Some(status) = self.status {
            task.status = status;
        }
        if let Some(subtasks) = &self.subtasks {
            task.subtasks = subtasks.clone();
        }
        if let Some(assigned_to) = &self.assigned_to {
            task.assigned_to = assigned_to.clone();
        }
    }
}

/// Task record as the remote store returns it.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawTask {
    pub id: Option<TaskId>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub date: Option<String>,
    pub prio: Option<String>,
    pub status: Option<String>,
    pub subtasks: Option<Vec<RawSubtask>>,
    pub assigned_to: Option<Vec<RawContact>>,
}

/// Subtask entry; older records store bare strings.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawSubtask {
    Text(String),
    Record {
        #[serde(default)]
        id: Option<u64>,
        #[serde(default)]
        text: Option<String>,
        #[serde(default)]
        status: Option<String>,
        #[serde(default)]
        done: Option<bool>,
    },
}

impl RawSubtask {
    fn normalize(self) -> Option<Subtask> {
        match self {
            RawSubtask::Text(text) => {
                let text = text.trim();
                (!text.is_empty()).then(|| Subtask::new(text))
            }
            RawSubtask::Record {
                id,
                text,
                status,
                done,
            } => {
                let text = text?.trim().to_string();
                if text.is_empty() {
                    return None;
                }
                let checked = match status.as_deref().map(str::trim) {
                    Some(value) => value.eq_ignore_ascii_case("checked"),
                    None => done.unwrap_or(false),
                };
                Some(Subtask {
                    id,
                    text,
                    status: if checked {
                        SubtaskStatus::Checked
                    } else {
                        SubtaskStatus::Unchecked
                    },
                })
            }
        }
    }
}

/// A task built from its stored record.
#[derive(Debug, Clone)]
pub struct NormalizedTask {
    pub task: Task,
    /// `assignedTo` entries without a contact id. They cannot be matched
    /// against the directory, so the stored list must be rewritten.
    pub unreadable_assignees: usize,
}

impl RawTask {
    /// Decode a stored record. Fails when a field has the wrong JSON type.
    pub fn from_value(value: Value) -> Result<Self> {
        serde_json::from_value(value)
            .map_err(|err| Error::InvalidArgument(format!("malformed task record: {err}")))
    }

    /// Build a typed task, filling defaults for missing fields.
    ///
    /// Fails for records with no id, no title, no parseable date or a
    /// status outside the four columns.
    pub fn normalize(self) -> Result<Task> {
        self.normalize_checked().map(|normalized| normalized.task)
    }

    /// Like [`RawTask::normalize`], also counting the assignee entries that
    /// had to be left out.
    pub fn normalize_checked(self) -> Result<NormalizedTask> {
        let id = self
            .id
            .ok_or_else(|| Error::InvalidArgument("task record has no id".to_string()))?;
        let title = self
            .title
            .filter(|title| !title.trim().is_empty())
            .ok_or_else(|| Error::InvalidArgument(format!("task {id} has no title")))?;
        let raw_date = self
            .date
            .ok_or_else(|| Error::InvalidArgument(format!("task {id} has no due date")))?;
        let date = NaiveDate::parse_from_str(raw_date.trim(), DATE_FORMAT).map_err(|err| {
            Error::InvalidArgument(format!("task {id} has invalid due date '{raw_date}': {err}"))
        })?;
        let status = match self.status.as_deref() {
            Some(label) => TaskStatus::parse(label).ok_or_else(|| {
                Error::InvalidArgument(format!("task {id} has unknown status '{label}'"))
            })?,
            None => TaskStatus::default(),
        };
        let prio = self
            .prio
            .as_deref()
            .and_then(Priority::parse)
            .unwrap_or_default();
        let category = self
            .category
            .as_deref()
            .and_then(Category::parse)
            .unwrap_or_default();
        let subtasks = self
            .subtasks
            .unwrap_or_default()
            .into_iter()
            .filter_map(RawSubtask::normalize)
            .collect();
        let raw_assignees = self.assigned_to.unwrap_or_default();
        let listed = raw_assignees.len();
        let assigned_to: Vec<ContactSnapshot> = raw_assignees
            .into_iter()
            .filter_map(RawContact::into_snapshot)
            .collect();
        let unreadable_assignees = listed - assigned_to.len();
        if unreadable_assignees > 0 {
            warn!(task = %id, unreadable_assignees, "assignee entries without contact id");
        }

        Ok(NormalizedTask {
            task: Task {
                id,
                title,
                description: self.description.unwrap_or_default(),
                category,
                date,
                prio,
                status,
                subtasks,
                assigned_to,
            },
            unreadable_assignees,
        })
    }
}

/// Contact record as the remote store returns it. Also used for snapshot
/// entries inside raw task records.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawContact {
    pub id: Option<ContactId>,
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub profile_pic: Option<String>,
    pub first_letters: Option<String>,
    pub is_user: Option<bool>,
}

impl RawContact {
    pub fn from_value(value: Value) -> Result<Self> {
        serde_json::from_value(value)
            .map_err(|err| Error::InvalidArgument(format!("malformed contact record: {err}")))
    }

    pub fn normalize(self) -> Result<Contact> {
        let id = self
            .id
            .ok_or_else(|| Error::InvalidArgument("contact record has no id".to_string()))?;
        let name = self.name.unwrap_or_default().trim().to_string();
        if name.is_empty() {
            return Err(Error::InvalidArgument(format!("contact {id} has no name")));
        }
        Ok(Contact {
            id,
            first_letters: self
                .first_letters
                .filter(|letters| !letters.trim().is_empty())
                .unwrap_or_else(|| first_letters(&name)),
            profile_pic: self
                .profile_pic
                .unwrap_or_else(|| default_profile_pic(&name)),
            name,
            email: self.email.unwrap_or_default(),
            phone: self.phone.unwrap_or_default(),
            is_user: self.is_user.unwrap_or(false),
        })
    }

    /// Snapshot entry embedded in a task. Only the id is required: an entry
    /// with missing display fields is kept so reconciliation refreshes or
    /// drops it.
    pub fn into_snapshot(self) -> Option<ContactSnapshot> {
        let id = self.id?;
        let name = self.name.unwrap_or_default().trim().to_string();
        Some(ContactSnapshot {
            id,
            first_letters: self
                .first_letters
                .filter(|letters| !letters.trim().is_empty())
                .unwrap_or_else(|| first_letters(&name)),
            profile_pic: self
                .profile_pic
                .unwrap_or_else(|| default_profile_pic(&name)),
            name,
            email: self.email.unwrap_or_default(),
            phone: self.phone.unwrap_or_default(),
        })
    }
}

/// Display initials: first letter of the first and of the last word.
pub fn first_letters(name: &str) -> String {
    let words: Vec<&str> = name.split_whitespace().collect();
    let mut letters = String::new();
    if let Some(first) = words.first().and_then(|word| word.chars().next()) {
        letters.extend(first.to_uppercase());
    }
    if words.len() > 1 {
        if let Some(last) = words.last().and_then(|word| word.chars().next()) {
            letters.extend(last.to_uppercase());
        }
    }
    letters
}

/// Badge color picked deterministically from the name.
pub fn default_profile_pic(name: &str) -> String {
    let sum: usize = name.bytes().map(usize::from).sum();
    PROFILE_COLORS[sum % PROFILE_COLORS.len()].to_string()
}
