//! On-disk layout of a board
//!
//! ```text
//! <root>/
//!   .taskboard.toml             # Configuration (optional)
//!   .taskboard/
//!     remote/                   # File-backed remote store
//!       tasks.json              # { next_id, records }
//!       contacts.json
//!     session/                  # Session cache, cleared on logout
//!       tasks.json              # Serialized task array
//!       contacts.json           # Serialized contact array
//! ```
//!
//! Directories come from the config and are resolved against the root;
//! absolute paths are used as-is.

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::{Config, CONFIG_FILE};
use crate::error::Result;
use crate::remote::FileRemote;
use crate::session::DirSession;

/// Resolved paths for one board root
#[derive(Debug, Clone)]
pub struct Storage {
    root: PathBuf,
    store_dir: PathBuf,
    session_dir: PathBuf,
    lock_timeout_ms: u64,
}

impl Storage {
    pub fn new(root: impl Into<PathBuf>, config: &Config) -> Self {
        let root = root.into();
        Self {
            store_dir: root.join(&config.store.dir),
            session_dir: root.join(&config.session.dir),
            lock_timeout_ms: config.store.lock_timeout_ms,
            root,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config_file(&self) -> PathBuf {
        self.root.join(CONFIG_FILE)
    }

    pub fn store_dir(&self) -> &Path {
        &self.store_dir
    }

    pub fn session_dir(&self) -> &Path {
        &self.session_dir
    }

    /// Create the store and session directories
    pub fn init(&self) -> Result<()> {
        fs::create_dir_all(&self.store_dir)?;
        fs::create_dir_all(&self.session_dir)?;
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.store_dir.exists()
    }

    pub fn remote(&self) -> FileRemote {
        FileRemote::new(&self.store_dir).with_timeout(self.lock_timeout_ms)
    }

    pub fn session(&self) -> DirSession {
        DirSession::new(&self.session_dir)
    }
}
