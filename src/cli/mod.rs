//! Command-line interface for tb
//!
//! This module defines the CLI structure using clap derive macros.
//! Each command group is implemented in its own submodule.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use crate::board::{Board, BoardOptions};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::events::{EventDestination, EventSink};
use crate::output::OutputOptions;
use crate::remote::RemoteStore;
use crate::session::SessionCache;
use crate::storage::Storage;

mod board;
mod contact;
mod init;
mod subtask;
mod task;

/// tb - kanban task board
///
/// Manage tasks, subtasks and contacts on a four-column board backed by a
/// file remote store, with a session cache cleared on logout.
#[derive(Parser, Debug)]
#[command(name = "tb")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Board root directory (defaults to current directory)
    #[arg(long, global = true, env = "TB_ROOT")]
    pub root: Option<PathBuf>,

    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Write board events as JSON lines to a file, or `-` for stdout
    #[arg(long, global = true, env = "TB_EVENTS")]
    pub events: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create the board config and store directories
    Init,

    /// Show the board columns
    Board {
        /// Only show tasks whose title or description contains this text
        #[arg(short, long)]
        search: Option<String>,

        /// Render from the session cache instead of the remote store
        #[arg(long)]
        cached: bool,
    },

    /// Task management
    #[command(subcommand)]
    Task(TaskCommands),

    /// Subtask checklist management (indices are zero-based)
    #[command(subcommand)]
    Subtask(SubtaskCommands),

    /// Contact directory management
    #[command(subcommand)]
    Contact(ContactCommands),

    /// Clear the session cache
    Logout,
}

/// Task subcommands
#[derive(Subcommand, Debug)]
pub enum TaskCommands {
    /// Create a task
    New {
        /// Task title
        title: String,

        /// Due date (YYYY-MM-DD)
        #[arg(long)]
        date: String,

        #[arg(short, long)]
        description: Option<String>,

        /// user-story or technical-task
        #[arg(long)]
        category: Option<String>,

        /// low, medium or urgent
        #[arg(long)]
        prio: Option<String>,

        /// Initial column (to-do, in-progress, await-feedback, done)
        #[arg(long)]
        status: Option<String>,

        /// Contact ids to assign
        #[arg(long = "assign")]
        assign: Vec<u64>,

        /// Subtask texts
        #[arg(long = "subtask")]
        subtasks: Vec<String>,
    },

    /// Show one task
    Show {
        id: u64,
    },

    /// Edit task fields
    Edit {
        id: u64,

        #[arg(long)]
        title: Option<String>,

        #[arg(short, long)]
        description: Option<String>,

        #[arg(long)]
        date: Option<String>,

        #[arg(long)]
        category: Option<String>,

        #[arg(long)]
        prio: Option<String>,
    },

    /// Move a task to another column
    Move {
        id: u64,

        /// Target column (label or wire name)
        status: String,
    },

    /// Delete a task
    Rm {
        id: u64,
    },

    /// Assign a contact to a task
    Assign {
        id: u64,
        contact: u64,
    },

    /// Remove a contact from a task
    Unassign {
        id: u64,
        contact: u64,
    },
}

/// Subtask subcommands
#[derive(Subcommand, Debug)]
pub enum SubtaskCommands {
    /// Append a subtask
    Add {
        task: u64,
        text: String,
    },

    /// Check or uncheck a subtask
    Toggle {
        task: u64,
        index: usize,
    },

    /// Replace a subtask's text
    Edit {
        task: u64,
        index: usize,
        text: String,
    },

    /// Delete a subtask
    Rm {
        task: u64,
        index: usize,
    },
}

/// Contact subcommands
#[derive(Subcommand, Debug)]
pub enum ContactCommands {
    /// List contacts sorted by name
    List,

    /// Create a contact
    New {
        name: String,

        #[arg(long, default_value = "")]
        email: String,

        #[arg(long, default_value = "")]
        phone: String,
    },

    /// Edit a contact; assigned tasks pick up the change
    Edit {
        id: u64,

        #[arg(long)]
        name: Option<String>,

        #[arg(long)]
        email: Option<String>,

        #[arg(long)]
        phone: Option<String>,
    },

    /// Delete a contact and drop it from every task
    Rm {
        id: u64,
    },
}

/// Flags shared by every command.
#[derive(Debug, Clone)]
pub struct GlobalOptions {
    pub root: Option<PathBuf>,
    pub events: Option<String>,
    pub json: bool,
    pub quiet: bool,
}

impl Cli {
    /// Execute the CLI command
    pub fn run(self) -> Result<()> {
        let global = GlobalOptions {
            root: self.root,
            events: self.events,
            json: self.json,
            quiet: self.quiet,
        };

        match self.command {
            Commands::Init => init::run(global),
            Commands::Board { search, cached } => {
                board::run_board(board::ShowOptions {
                    search,
                    cached,
                    global,
                })
            }
            Commands::Logout => board::run_logout(global),
            Commands::Task(cmd) => match cmd {
                TaskCommands::New {
                    title,
                    date,
                    description,
                    category,
                    prio,
                    status,
                    assign,
                    subtasks,
                } => task::run_new(task::NewOptions {
                    title,
                    date,
                    description,
                    category,
                    prio,
                    status,
                    assign,
                    subtasks,
                    global,
                }),
                TaskCommands::Show { id } => task::run_show(task::ShowOptions { id, global }),
                TaskCommands::Edit {
                    id,
                    title,
                    description,
                    date,
                    category,
                    prio,
                } => task::run_edit(task::EditOptions {
                    id,
                    title,
                    description,
                    date,
                    category,
                    prio,
                    global,
                }),
                TaskCommands::Move { id, status } => {
                    task::run_move(task::MoveOptions { id, status, global })
                }
                TaskCommands::Rm { id } => task::run_rm(task::RmOptions { id, global }),
                TaskCommands::Assign { id, contact } => task::run_assign(task::AssignOptions {
                    id,
                    contact,
                    unassign: false,
                    global,
                }),
                TaskCommands::Unassign { id, contact } => {
                    task::run_assign(task::AssignOptions {
                        id,
                        contact,
                        unassign: true,
                        global,
                    })
                }
            },
            Commands::Subtask(cmd) => match cmd {
                SubtaskCommands::Add { task, text } => {
                    subtask::run_add(subtask::AddOptions { task, text, global })
                }
                SubtaskCommands::Toggle { task, index } => {
                    subtask::run_toggle(subtask::IndexOptions {
                        task,
                        index,
                        global,
                    })
                }
                SubtaskCommands::Edit { task, index, text } => {
                    subtask::run_edit(subtask::EditOptions {
                        task,
                        index,
                        text,
                        global,
                    })
                }
                SubtaskCommands::Rm { task, index } => subtask::run_rm(subtask::IndexOptions {
                    task,
                    index,
                    global,
                }),
            },
            Commands::Contact(cmd) => match cmd {
                ContactCommands::List => contact::run_list(global),
                ContactCommands::New { name, email, phone } => {
                    contact::run_new(contact::NewOptions {
                        name,
                        email,
                        phone,
                        global,
                    })
                }
                ContactCommands::Edit {
                    id,
                    name,
                    email,
                    phone,
                } => contact::run_edit(contact::EditOptions {
                    id,
                    name,
                    email,
                    phone,
                    global,
                }),
                ContactCommands::Rm { id } => contact::run_rm(contact::RmOptions { id, global }),
            },
        }
    }
}

/// An opened board plus what the command needs to report on it.
struct BoardContext {
    board: Board,
    storage: Storage,
    output: OutputOptions,
}

fn resolve_root(root: Option<PathBuf>) -> Result<PathBuf> {
    match root {
        Some(path) => Ok(path),
        None => Ok(std::env::current_dir()?),
    }
}

fn open_event_sink(events: Option<&str>) -> Result<(Option<EventSink>, bool)> {
    let destination = EventDestination::parse(events);
    let sink = destination.as_ref().map(|dest| dest.open()).transpose()?;
    let events_to_stdout = matches!(destination, Some(EventDestination::Stdout));
    Ok((sink, events_to_stdout))
}

/// Open the board at the configured root. Fails when `tb init` has not run.
fn open_board(global: &GlobalOptions) -> Result<BoardContext> {
    let root = resolve_root(global.root.clone())?;
    let config = Config::load_from_root(&root)?;
    let storage = Storage::new(&root, &config);
    if !storage.is_initialized() {
        return Err(Error::NotInitialized(root));
    }

    let remote: Arc<dyn RemoteStore> = Arc::new(storage.remote());
    let cache = SessionCache::new(Arc::new(storage.session()));
    let (sink, events_to_stdout) = open_event_sink(global.events.as_deref())?;

    let mut board = Board::new(remote, cache, BoardOptions::from(&config.board));
    if let Some(sink) = sink {
        board = board.with_events(sink);
    }

    Ok(BoardContext {
        board,
        storage,
        output: OutputOptions {
            json: global.json && !events_to_stdout,
            quiet: global.quiet || events_to_stdout,
        },
    })
}

/// Drive one async board operation to completion.
fn block_on<F: std::future::Future>(future: F) -> Result<F::Output> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    Ok(runtime.block_on(future))
}

fn parse_date(raw: &str) -> Result<chrono::NaiveDate> {
    chrono::NaiveDate::parse_from_str(raw.trim(), crate::model::DATE_FORMAT).map_err(|_| {
        Error::InvalidArgument(format!("invalid date '{raw}' (expected YYYY-MM-DD)"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_date_accepts_iso_dates() {
        let date = parse_date(" 2026-12-24 ").expect("date");
        assert_eq!(date.to_string(), "2026-12-24");
        assert!(matches!(
            parse_date("24.12.2026"),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn open_board_requires_init() {
        let dir = tempfile::tempdir().expect("tempdir");
        let global = GlobalOptions {
            root: Some(dir.path().to_path_buf()),
            events: None,
            json: true,
            quiet: false,
        };
        let err = open_board(&global).err().expect("uninitialized");
        assert!(matches!(err, Error::NotInitialized(_)));
    }

    #[test]
    fn cli_parses_nested_commands() {
        let cli = Cli::try_parse_from(["tb", "--json", "task", "move", "4", "done"])
            .expect("parse");
        assert!(cli.json);
        assert!(matches!(
            cli.command,
            Commands::Task(TaskCommands::Move { id: 4, .. })
        ));
    }
}
