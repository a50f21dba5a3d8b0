//! tb contact command implementations.
//!
//! Edits and deletions are followed by assignee reconciliation so tasks on
//! the board never keep a stale or deleted contact.

use serde::Serialize;

use crate::board::ContactChange;
use crate::cli::task::push_board_warnings;
use crate::cli::{block_on, open_board, GlobalOptions};
use crate::error::Result;
use crate::model::{Contact, ContactDraft, ContactId, ContactPatch};
use crate::output::{emit_success, HumanOutput};

pub struct NewOptions {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub global: GlobalOptions,
}

pub struct EditOptions {
    pub id: u64,
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub global: GlobalOptions,
}

pub struct RmOptions {
    pub id: u64,
    pub global: GlobalOptions,
}

#[derive(Serialize)]
struct ContactList<'a> {
    total: usize,
    contacts: &'a [Contact],
}

pub fn run_list(global: GlobalOptions) -> Result<()> {
    let mut ctx = open_board(&global)?;
    let board = &mut ctx.board;
    block_on(async move { board.load_contacts().await })??;

    let contacts = ctx.board.directory().contacts();
    let mut human = HumanOutput::new("Contacts");
    human.push_summary("Total", contacts.len().to_string());
    for contact in contacts {
        let mut line = format!("#{} {} ({})", contact.id, contact.name, contact.first_letters);
        if !contact.email.is_empty() {
            line.push_str(&format!(" <{}>", contact.email));
        }
        if !contact.phone.is_empty() {
            line.push_str(&format!(" {}", contact.phone));
        }
        human.push_detail(line);
    }

    emit_success(
        ctx.output,
        "contact list",
        &ContactList {
            total: contacts.len(),
            contacts,
        },
        Some(&human),
    )
}

pub fn run_new(options: NewOptions) -> Result<()> {
    let mut ctx = open_board(&options.global)?;
    let draft = ContactDraft::new(options.name, options.email, options.phone);
    draft.validate()?;

    let board = &mut ctx.board;
    let contact = block_on(async move {
        board.load_contacts().await?;
        board.create_contact(draft).await
    })??;

    let mut human = HumanOutput::new("Contact created");
    push_board_warnings(&mut human, ctx.board.take_warnings());
    human.push_summary("ID", contact.id.to_string());
    human.push_summary("Name", contact.name.clone());
    human.push_summary("Initials", contact.first_letters.clone());
    human.push_next_step(format!("tb task assign <task> {}", contact.id));

    emit_success(ctx.output, "contact new", &contact, Some(&human))
}

pub fn run_edit(options: EditOptions) -> Result<()> {
    let mut ctx = open_board(&options.global)?;
    let mut patch = match options.name {
        Some(name) => ContactPatch::rename(name),
        None => ContactPatch::default(),
    };
    patch.email = options.email.map(|email| email.trim().to_string());
    patch.phone = options.phone.map(|phone| phone.trim().to_string());

    let id = ContactId(options.id);
    let board = &mut ctx.board;
    let change = block_on(async move {
        board.load().await?;
        board.update_contact(id, patch).await
    })??;

    let mut human = HumanOutput::new(format!("Contact #{id} updated"));
    human.push_summary("Name", change.contact.name.clone());
    finish(&mut human, &change);
    push_board_warnings(&mut human, ctx.board.take_warnings());
    emit_success(ctx.output, "contact edit", &change, Some(&human))
}

pub fn run_rm(options: RmOptions) -> Result<()> {
    let mut ctx = open_board(&options.global)?;
    let id = ContactId(options.id);

    let board = &mut ctx.board;
    let change = block_on(async move {
        board.load().await?;
        board.remove_contact(id).await
    })??;

    let mut human = HumanOutput::new(format!("Contact #{id} deleted"));
    human.push_summary("Name", change.contact.name.clone());
    finish(&mut human, &change);
    push_board_warnings(&mut human, ctx.board.take_warnings());
    emit_success(ctx.output, "contact rm", &change, Some(&human))
}

fn finish(human: &mut HumanOutput, change: &ContactChange) {
    human.push_summary("Tasks updated", change.reconciled.len().to_string());
    for drift in &change.reconciled {
        human.push_detail(format!("task #{}", drift.task_id));
    }
}
