#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;

use assert_cmd::Command;
use chrono::NaiveDate;
use serde_json::Value;
use taskboard::board::{Board, BoardOptions};
use taskboard::remote::MemoryRemote;
use taskboard::session::SessionCache;
use tempfile::TempDir;

/// A board backed by an in-process remote store and session cache.
pub struct MemoryBoard {
    pub remote: Arc<MemoryRemote>,
    pub cache: SessionCache,
    pub board: Board,
}

impl MemoryBoard {
    pub fn new() -> Self {
        Self::with_options(BoardOptions::default())
    }

    pub fn with_options(options: BoardOptions) -> Self {
        let remote = Arc::new(MemoryRemote::new());
        let cache = SessionCache::in_memory();
        let board = Board::new(remote.clone(), cache.clone(), options);
        Self {
            remote,
            cache,
            board,
        }
    }

    /// A second session on the same remote store with its own cache.
    pub fn reopen(&self) -> Board {
        Board::new(
            self.remote.clone(),
            SessionCache::in_memory(),
            BoardOptions::default(),
        )
    }
}

pub fn date(raw: &str) -> NaiveDate {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").expect("date")
}

/// A board root on disk for driving the tb binary.
pub struct TestRoot {
    dir: TempDir,
}

impl TestRoot {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("failed to create tempdir"),
        }
    }

    /// A root with `tb init` already run.
    pub fn initialized() -> Self {
        let root = Self::new();
        root.tb().arg("init").assert().success();
        root
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn tb(&self) -> Command {
        let mut cmd = Command::cargo_bin("tb").expect("binary");
        cmd.arg("--root").arg(self.dir.path());
        cmd.env_remove("TB_ROOT");
        cmd.env_remove("TB_EVENTS");
        cmd
    }

    /// Run a successful JSON command and return the envelope's `data`.
    pub fn json(&self, args: &[&str]) -> Value {
        let output = self
            .tb()
            .arg("--json")
            .args(args)
            .assert()
            .success()
            .get_output()
            .stdout
            .clone();
        let envelope: Value = serde_json::from_slice(&output).expect("json output");
        assert_eq!(envelope["status"], "success");
        envelope["data"].clone()
    }

    /// Run a failing JSON command and return the whole error envelope.
    pub fn json_error(&self, args: &[&str], code: i32) -> Value {
        let output = self
            .tb()
            .arg("--json")
            .args(args)
            .assert()
            .code(code)
            .get_output()
            .stdout
            .clone();
        serde_json::from_slice(&output).expect("json error output")
    }
}
