//! Configuration loading and management
//!
//! Handles parsing of `.taskboard.toml` at the board root.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Name of the configuration file at the board root
pub const CONFIG_FILE: &str = ".taskboard.toml";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Remote store configuration
    #[serde(default)]
    pub store: StoreConfig,

    /// Session cache configuration
    #[serde(default)]
    pub session: SessionConfig,

    /// Board behavior
    #[serde(default)]
    pub board: BoardConfig,
}

/// Remote store location (file-backed store)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Directory holding `tasks.json` and `contacts.json`, relative to the root
    #[serde(default = "default_store_dir")]
    pub dir: PathBuf,

    /// How long to wait for the store's file locks
    #[serde(default = "default_lock_timeout_ms")]
    pub lock_timeout_ms: u64,
}

fn default_store_dir() -> PathBuf {
    PathBuf::from(".taskboard/remote")
}

fn default_lock_timeout_ms() -> u64 {
    crate::lock::DEFAULT_LOCK_TIMEOUT_MS
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            dir: default_store_dir(),
            lock_timeout_ms: default_lock_timeout_ms(),
        }
    }
}

/// Session cache location
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Directory holding one file per session key, relative to the root
    #[serde(default = "default_session_dir")]
    pub dir: PathBuf,
}

fn default_session_dir() -> PathBuf {
    PathBuf::from(".taskboard/session")
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            dir: default_session_dir(),
        }
    }
}

/// Board behavior
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoardConfig {
    /// Assignee badges shown on a card before collapsing into "+N"
    #[serde(default = "default_max_visible_badges")]
    pub max_visible_badges: usize,

    /// Restore a task's previous status when persisting a move fails
    #[serde(default = "default_true")]
    pub rollback_failed_moves: bool,
}

fn default_max_visible_badges() -> usize {
    3
}

fn default_true() -> bool {
    true
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            max_visible_badges: default_max_visible_badges(),
            rollback_failed_moves: true,
        }
    }
}

impl Config {
    /// Load configuration from a `.taskboard.toml` file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from the board root, or return defaults when the
    /// file is absent. A present but invalid file is an error.
    pub fn load_from_root(root: &Path) -> Result<Self> {
        let config_path = root.join(CONFIG_FILE);
        if config_path.exists() {
            Self::load(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.store.dir.as_os_str().is_empty() {
            return Err(Error::InvalidConfig("store.dir cannot be empty".to_string()));
        }
        if self.store.lock_timeout_ms == 0 {
            return Err(Error::InvalidConfig(
                "store.lock_timeout_ms must be > 0".to_string(),
            ));
        }
        if self.session.dir.as_os_str().is_empty() {
            return Err(Error::InvalidConfig(
                "session.dir cannot be empty".to_string(),
            ));
        }
        if self.session.dir == self.store.dir {
            return Err(Error::InvalidConfig(
                "session.dir must differ from store.dir".to_string(),
            ));
        }
        if self.board.max_visible_badges == 0 {
            return Err(Error::InvalidConfig(
                "board.max_visible_badges must be >= 1".to_string(),
            ));
        }
        Ok(())
    }
}
