//! tb subtask command implementations.

use serde::Serialize;

use crate::cli::task::push_board_warnings;
use crate::cli::{block_on, open_board, GlobalOptions};
use crate::error::Result;
use crate::model::{Subtask, TaskId};
use crate::output::{emit_success, HumanOutput};
use crate::subtask::{self, Progress};

pub struct AddOptions {
    pub task: u64,
    pub text: String,
    pub global: GlobalOptions,
}

pub struct IndexOptions {
    pub task: u64,
    pub index: usize,
    pub global: GlobalOptions,
}

pub struct EditOptions {
    pub task: u64,
    pub index: usize,
    pub text: String,
    pub global: GlobalOptions,
}

#[derive(Serialize)]
struct SubtaskReport {
    task_id: TaskId,
    #[serde(skip_serializing_if = "Option::is_none")]
    index: Option<usize>,
    changed: bool,
    subtasks: Vec<Subtask>,
    progress: Progress,
    #[serde(skip_serializing_if = "Option::is_none")]
    removed: Option<Subtask>,
}

pub fn run_add(options: AddOptions) -> Result<()> {
    let mut ctx = open_board(&options.global)?;
    let id = TaskId(options.task);
    let text = options.text;

    let board = &mut ctx.board;
    let added = block_on(async move {
        board.load().await?;
        board.add_subtask(id, &text).await
    })??;

    let mut human = HumanOutput::new(if added.is_some() {
        format!("Subtask added to #{id}")
    } else {
        "Subtask text is blank; nothing added".to_string()
    });
    let report = report(&ctx.board, id, None, added.is_some(), None)?;
    finish(ctx, human_with(&mut human, &report), "subtask add", &report)
}

pub fn run_toggle(options: IndexOptions) -> Result<()> {
    let mut ctx = open_board(&options.global)?;
    let id = TaskId(options.task);
    let index = options.index;

    let board = &mut ctx.board;
    block_on(async move {
        board.load().await?;
        board.toggle_subtask(id, index).await
    })??;

    let report = report(&ctx.board, id, Some(index), true, None)?;
    let checked = report.subtasks.get(index).is_some_and(Subtask::is_checked);
    let state = if checked {
        "checked"
    } else {
        "unchecked"
    };
    let mut human = HumanOutput::new(format!("Subtask {index} of #{id} {state}"));
    finish(ctx, human_with(&mut human, &report), "subtask toggle", &report)
}

pub fn run_edit(options: EditOptions) -> Result<()> {
    let mut ctx = open_board(&options.global)?;
    let id = TaskId(options.task);
    let index = options.index;
    let text = options.text;

    let board = &mut ctx.board;
    block_on(async move {
        board.load().await?;
        board.edit_subtask(id, index, &text).await
    })??;

    let report = report(&ctx.board, id, Some(index), true, None)?;
    let mut human = HumanOutput::new(format!("Subtask {index} of #{id} updated"));
    finish(ctx, human_with(&mut human, &report), "subtask edit", &report)
}

pub fn run_rm(options: IndexOptions) -> Result<()> {
    let mut ctx = open_board(&options.global)?;
    let id = TaskId(options.task);
    let index = options.index;

    let board = &mut ctx.board;
    let removed = block_on(async move {
        board.load().await?;
        board.remove_subtask(id, index).await
    })??;

    let mut human = HumanOutput::new(format!("Subtask {index} of #{id} deleted"));
    human.push_summary("Removed", removed.text.clone());
    let report = report(&ctx.board, id, Some(index), true, Some(removed))?;
    finish(ctx, human_with(&mut human, &report), "subtask rm", &report)
}

fn report(
    board: &crate::board::Board,
    id: TaskId,
    index: Option<usize>,
    changed: bool,
    removed: Option<Subtask>,
) -> Result<SubtaskReport> {
    let task = board.task(id)?;
    Ok(SubtaskReport {
        task_id: id,
        index,
        changed,
        subtasks: task.subtasks.clone(),
        progress: subtask::progress(task),
        removed,
    })
}

fn human_with<'a>(human: &'a mut HumanOutput, report: &SubtaskReport) -> &'a mut HumanOutput {
    let progress = report.progress;
    human.push_summary(
        "Progress",
        format!("{}/{} ({}%)", progress.checked, progress.total, progress.percent),
    );
    for (index, item) in report.subtasks.iter().enumerate() {
        let mark = if item.is_checked() { "x" } else { " " };
        human.push_detail(format!("[{mark}] {index}: {}", item.text));
    }
    human
}

fn finish(
    mut ctx: crate::cli::BoardContext,
    human: &mut HumanOutput,
    command: &str,
    report: &SubtaskReport,
) -> Result<()> {
    push_board_warnings(human, ctx.board.take_warnings());
    emit_success(ctx.output, command, report, Some(human))
}
