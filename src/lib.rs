//! taskboard - Task & Contact Synchronization Engine
//!
//! The engine behind a kanban board: tasks live in a remote store, are
//! mirrored into a session cache and keep embedded snapshots of their
//! assigned contacts in sync with the contact directory.
//!
//! # Core Concepts
//!
//! - **Task repository**: the in-memory task collection; every mutation goes
//!   remote first, then memory and cache together
//! - **Contact directory**: authoritative contact list used to reconcile
//!   assignee snapshots
//! - **Reconciliation**: drops deleted contacts from tasks and refreshes
//!   changed snapshots, persisting corrections immediately
//! - **Drag and drop**: optimistic status moves with rollback on failure
//! - **Session cache**: key/value mirror of tasks and contacts, cleared on
//!   logout
//!
//! # Module Organization
//!
//! - `board`: the session object tying everything together
//! - `cli`: Command-line interface using clap
//! - `config`: Configuration loading from `.taskboard.toml`
//! - `contacts`: Contact directory
//! - `drag`: Drag controller and drop zones
//! - `error`: Error types and result aliases
//! - `events`: JSONL board events
//! - `lock`: File locking and atomic writes
//! - `model`: Tasks, contacts, subtasks and wire normalization
//! - `output`: Shared CLI output formatting
//! - `reconcile`: Assignee reconciliation
//! - `remote`: Remote store trait with in-memory and file backends
//! - `repository`: Task repository
//! - `session`: Session cache
//! - `storage`: On-disk layout of a board
//! - `subtask`: Subtask operations and progress
//! - `view`: Board columns, search and card summaries

pub mod board;
pub mod cli;
pub mod config;
pub mod contacts;
pub mod drag;
pub mod error;
pub mod events;
pub mod lock;
pub mod model;
pub mod output;
pub mod reconcile;
pub mod remote;
pub mod repository;
pub mod session;
pub mod storage;
pub mod subtask;
pub mod view;

pub use error::{Error, Result};
