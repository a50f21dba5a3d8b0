//! tb board and tb logout command implementations.

use serde::Serialize;

use crate::cli::{block_on, open_board, GlobalOptions};
use crate::error::Result;
use crate::output::{emit_success, HumanOutput};
use crate::view::{BoardView, TaskCard};

pub struct ShowOptions {
    pub search: Option<String>,
    pub cached: bool,
    pub global: GlobalOptions,
}

#[derive(Serialize)]
struct BoardReport {
    source: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    skipped: Option<usize>,
    #[serde(flatten)]
    view: BoardView,
}

pub fn run_board(options: ShowOptions) -> Result<()> {
    let mut ctx = open_board(&options.global)?;
    let mut human = HumanOutput::new("tb board");

    let (source, skipped) = if options.cached {
        if !ctx.board.restore_from_cache()? {
            human.push_warning("session cache is empty; run tb board without --cached");
        }
        ("cache", None)
    } else {
        let report = block_on(ctx.board.load())??;
        for drift in &report.reconciled {
            human.push_detail(format!(
                "task #{}: refreshed {} assignee(s), dropped {}",
                drift.task_id,
                drift.refreshed.len(),
                drift.dropped.len()
            ));
        }
        if report.skipped > 0 {
            human.push_warning(format!("{} malformed task record(s) skipped", report.skipped));
        }
        ("remote", Some(report.skipped))
    };

    if let Some(query) = options.search.as_deref() {
        ctx.board.set_search(query);
    }
    let view = ctx.board.view();
    for warning in ctx.board.take_warnings() {
        human.push_warning(warning);
    }

    human.push_summary("root", ctx.storage.root().display().to_string());
    if let Some(query) = &view.query {
        human.push_summary("search", query.clone());
    }
    human.push_summary("tasks", format!("{} of {} shown", view.visible, view.total));
    for column in &view.columns {
        human.push_detail(format!("{} ({})", column.label, column.cards.len()));
        for card in &column.cards {
            human.push_detail(format!("  {}", format_card(card)));
        }
    }

    emit_success(
        ctx.output,
        "board",
        &BoardReport {
            source,
            skipped,
            view,
        },
        Some(&human),
    )
}

pub fn run_logout(global: GlobalOptions) -> Result<()> {
    let ctx = open_board(&global)?;
    let session_dir = ctx.storage.session_dir().to_path_buf();
    ctx.board.logout()?;

    let mut human = HumanOutput::new("tb logout: session cache cleared");
    human.push_summary("session", session_dir.display().to_string());

    #[derive(Serialize)]
    struct LogoutReport {
        cleared: bool,
    }

    emit_success(
        ctx.output,
        "logout",
        &LogoutReport { cleared: true },
        Some(&human),
    )
}

fn format_card(card: &TaskCard) -> String {
    let mut line = format!("#{} {} [{}, due {}]", card.id, card.title, card.prio, card.date);
    if card.progress.total > 0 {
        line.push_str(&format!(
            " {}/{} subtasks",
            card.progress.checked, card.progress.total
        ));
    }
    if !card.badges.is_empty() {
        let initials: Vec<&str> = card
            .badges
            .iter()
            .map(|badge| badge.first_letters.as_str())
            .collect();
        line.push_str(&format!(" ({})", initials.join(" ")));
        if card.hidden_assignees > 0 {
            line.push_str(&format!(" +{}", card.hidden_assignees));
        }
    }
    line
}
