//! tb task command implementations.

use serde::Serialize;

use crate::cli::{block_on, open_board, parse_date, GlobalOptions};
use crate::drag::DropOutcome;
use crate::error::{Error, Result};
use crate::model::{
    Category, ContactId, Priority, Subtask, Task, TaskDraft, TaskId, TaskPatch, TaskStatus,
};
use crate::output::{emit_success, HumanOutput};
use crate::subtask::{self, Progress};

pub struct NewOptions {
    pub title: String,
    pub date: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub prio: Option<String>,
    pub status: Option<String>,
    pub assign: Vec<u64>,
    pub subtasks: Vec<String>,
    pub global: GlobalOptions,
}

pub struct ShowOptions {
    pub id: u64,
    pub global: GlobalOptions,
}

pub struct EditOptions {
    pub id: u64,
    pub title: Option<String>,
    pub description: Option<String>,
    pub date: Option<String>,
    pub category: Option<String>,
    pub prio: Option<String>,
    pub global: GlobalOptions,
}

pub struct MoveOptions {
    pub id: u64,
    pub status: String,
    pub global: GlobalOptions,
}

pub struct RmOptions {
    pub id: u64,
    pub global: GlobalOptions,
}

pub struct AssignOptions {
    pub id: u64,
    pub contact: u64,
    pub unassign: bool,
    pub global: GlobalOptions,
}

#[derive(Serialize)]
struct TaskDetails<'a> {
    #[serde(flatten)]
    task: &'a Task,
    progress: Progress,
}

pub fn run_new(options: NewOptions) -> Result<()> {
    let mut ctx = open_board(&options.global)?;

    let mut draft = TaskDraft::new(options.title.trim(), parse_date(&options.date)?);
    draft.validate()?;
    if let Some(description) = options.description {
        draft.description = description.trim().to_string();
    }
    if let Some(category) = options.category.as_deref() {
        draft.category = category.parse::<Category>()?;
    }
    if let Some(prio) = options.prio.as_deref() {
        draft.prio = prio.parse::<Priority>()?;
    }
    if let Some(status) = options.status.as_deref() {
        draft.status = status.parse::<TaskStatus>()?;
    }
    draft.subtasks = options
        .subtasks
        .iter()
        .map(|text| text.trim())
        .filter(|text| !text.is_empty())
        .map(Subtask::new)
        .collect();
    let contacts: Vec<ContactId> = options.assign.into_iter().map(ContactId).collect();

    let board = &mut ctx.board;
    let task = block_on(async move {
        board.load().await?;
        if !contacts.is_empty() {
            draft.assigned_to = board.snapshots(&contacts).await?;
        }
        board.create_task(draft).await
    })??;

    let mut human = HumanOutput::new("Task created");
    push_board_warnings(&mut human, ctx.board.take_warnings());
    push_task_summary(&mut human, &task);
    human.push_next_step(format!("tb task move {} in-progress", task.id));

    emit_success(ctx.output, "task new", &task, Some(&human))
}

pub fn run_show(options: ShowOptions) -> Result<()> {
    let mut ctx = open_board(&options.global)?;
    block_on(ctx.board.load())??;
    let task = ctx.board.task(TaskId(options.id))?;

    let mut human = HumanOutput::new(format!("Task #{}: {}", task.id, task.title));
    push_task_summary(&mut human, task);
    if !task.description.is_empty() {
        human.push_summary("Description", task.description.clone());
    }
    for (index, item) in task.subtasks.iter().enumerate() {
        let mark = if item.is_checked() { "x" } else { " " };
        human.push_detail(format!("[{mark}] {index}: {}", item.text));
    }
    for snapshot in &task.assigned_to {
        human.push_detail(format!(
            "assigned: {} ({}) #{}",
            snapshot.name, snapshot.first_letters, snapshot.id
        ));
    }

    let details = TaskDetails {
        task,
        progress: subtask::progress(task),
    };
    emit_success(ctx.output, "task show", &details, Some(&human))
}

pub fn run_edit(options: EditOptions) -> Result<()> {
    let mut ctx = open_board(&options.global)?;

    let patch = TaskPatch {
        title: options.title.map(|title| title.trim().to_string()),
        description: options.description.map(|text| text.trim().to_string()),
        date: options.date.as_deref().map(parse_date).transpose()?,
        category: options
            .category
            .as_deref()
            .map(str::parse::<Category>)
            .transpose()?,
        prio: options
            .prio
            .as_deref()
            .map(str::parse::<Priority>)
            .transpose()?,
        ..TaskPatch::default()
    };
    patch.validate()?;
    if patch.is_empty() {
        return Err(Error::InvalidArgument(
            "nothing to edit (pass --title, --description, --date, --category or --prio)"
                .to_string(),
        ));
    }

    let board = &mut ctx.board;
    let task = block_on(async move {
        board.load().await?;
        board.update_task(TaskId(options.id), patch).await
    })??;

    let mut human = HumanOutput::new("Task updated");
    push_board_warnings(&mut human, ctx.board.take_warnings());
    push_task_summary(&mut human, &task);
    emit_success(ctx.output, "task edit", &task, Some(&human))
}

pub fn run_move(options: MoveOptions) -> Result<()> {
    let mut ctx = open_board(&options.global)?;
    let status = options.status.parse::<TaskStatus>()?;
    let id = TaskId(options.id);

    let board = &mut ctx.board;
    let outcome = block_on(async move {
        board.load().await?;
        board.move_task(id, status).await
    })??;

    let mut human = HumanOutput::new(format!("tb task move: #{id}"));
    push_board_warnings(&mut human, ctx.board.take_warnings());
    if let DropOutcome::Moved { from, to, .. } = &outcome {
        human.push_summary("from", from.label());
        human.push_summary("to", to.label());
    }
    emit_success(ctx.output, "task move", &outcome, Some(&human))
}

pub fn run_rm(options: RmOptions) -> Result<()> {
    let mut ctx = open_board(&options.global)?;
    let board = &mut ctx.board;
    let task = block_on(async move {
        board.load().await?;
        board.remove_task(TaskId(options.id)).await
    })??;

    let mut human = HumanOutput::new(format!("Task #{} deleted", task.id));
    push_board_warnings(&mut human, ctx.board.take_warnings());
    human.push_summary("Title", task.title.clone());
    emit_success(ctx.output, "task rm", &task, Some(&human))
}

pub fn run_assign(options: AssignOptions) -> Result<()> {
    let mut ctx = open_board(&options.global)?;
    let id = TaskId(options.id);
    let contact = ContactId(options.contact);

    let unassign = options.unassign;
    let board = &mut ctx.board;
    let task = block_on(async move {
        board.load().await?;
        if unassign {
            board.unassign(id, contact).await
        } else {
            board.assign(id, contact).await
        }
    })??;

    let (command, header) = if options.unassign {
        ("task unassign", format!("Contact #{contact} unassigned"))
    } else {
        ("task assign", format!("Contact #{contact} assigned"))
    };
    let mut human = HumanOutput::new(header);
    push_board_warnings(&mut human, ctx.board.take_warnings());
    push_task_summary(&mut human, &task);
    emit_success(ctx.output, command, &task, Some(&human))
}

fn push_task_summary(human: &mut HumanOutput, task: &Task) {
    let progress = subtask::progress(task);
    human.push_summary("ID", task.id.to_string());
    human.push_summary("Title", task.title.clone());
    human.push_summary("Status", task.status.label());
    human.push_summary("Priority", task.prio.as_str());
    human.push_summary("Category", task.category.as_str());
    human.push_summary("Due", task.date.to_string());
    if progress.total > 0 {
        human.push_summary(
            "Subtasks",
            format!("{}/{} ({}%)", progress.checked, progress.total, progress.percent),
        );
    }
    if !task.assigned_to.is_empty() {
        let names: Vec<&str> = task
            .assigned_to
            .iter()
            .map(|snapshot| snapshot.name.as_str())
            .collect();
        human.push_summary("Assigned", names.join(", "));
    }
}

pub(crate) fn push_board_warnings(human: &mut HumanOutput, warnings: Vec<String>) {
    for warning in warnings {
        human.push_warning(warning);
    }
}
