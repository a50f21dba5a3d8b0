//! Error types for taskboard
//!
//! Exit codes:
//! - 0: Success
//! - 2: User error (bad args, unknown task/contact, bad subtask index)
//! - 3: Remote store unavailable (transport failure)
//! - 4: Operation failed (io, serialization, locking)

use std::path::PathBuf;
use thiserror::Error;

use crate::model::{ContactId, TaskId};

/// Exit codes for the tb CLI
pub mod exit_codes {
    pub const SUCCESS: i32 = 0;
    pub const USER_ERROR: i32 = 2;
    pub const REMOTE_UNAVAILABLE: i32 = 3;
    pub const OPERATION_FAILED: i32 = 4;
}

/// Main error type for taskboard operations
#[derive(Error, Debug)]
pub enum Error {
    // User errors (exit code 2)
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Task not found: {0}")]
    TaskNotFound(TaskId),

    #[error("Contact not found: {0}")]
    ContactNotFound(ContactId),

    #[error("Subtask index {index} out of range (task has {len} subtasks)")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("No board initialized at {0}")]
    NotInitialized(PathBuf),

    // Remote failures (exit code 3)
    #[error("Transport error during {operation}: {message}")]
    Transport { operation: String, message: String },

    // Operation failures (exit code 4)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Lock acquisition failed: {0}")]
    LockFailed(PathBuf),
}

impl Error {
    /// Build a transport error for a named remote operation
    pub fn transport(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Transport {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            // User errors
            Error::InvalidArgument(_)
            | Error::InvalidConfig(_)
            | Error::TaskNotFound(_)
            | Error::ContactNotFound(_)
            | Error::IndexOutOfRange { .. }
            | Error::NotInitialized(_) => exit_codes::USER_ERROR,

            // Remote store
            Error::Transport { .. } => exit_codes::REMOTE_UNAVAILABLE,

            // Operation failures
            Error::Io(_)
            | Error::Json(_)
            | Error::TomlParse(_)
            | Error::TomlSerialize(_)
            | Error::LockFailed(_) => exit_codes::OPERATION_FAILED,
        }
    }

    /// Structured details for JSON error output
    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            Error::TaskNotFound(id) => Some(serde_json::json!({ "task_id": id })),
            Error::ContactNotFound(id) => Some(serde_json::json!({ "contact_id": id })),
            Error::IndexOutOfRange { index, len } => {
                Some(serde_json::json!({ "index": index, "len": len }))
            }
            Error::Transport { operation, .. } => {
                Some(serde_json::json!({ "operation": operation }))
            }
            _ => None,
        }
    }

    /// True for failures of the remote store
    pub fn is_transport(&self) -> bool {
        matches!(self, Error::Transport { .. })
    }
}

/// Result type alias for taskboard operations
pub type Result<T> = std::result::Result<T, Error>;

