//! tb init command implementation
//!
//! Creates the board config and the store and session directories.

use std::path::{Path, PathBuf};

use crate::cli::{resolve_root, GlobalOptions};
use crate::config::{Config, CONFIG_FILE};
use crate::error::Result;
use crate::output::{emit_success, HumanOutput, OutputOptions};
use crate::storage::Storage;

#[derive(serde::Serialize)]
struct InitReport {
    root: PathBuf,
    created: InitCreated,
}

#[derive(serde::Serialize)]
struct InitCreated {
    config: bool,
    store_dir: bool,
    session_dir: bool,
}

pub fn run(global: GlobalOptions) -> Result<()> {
    let root = resolve_root(global.root)?;
    std::fs::create_dir_all(&root)?;

    let created_config = ensure_config(&root)?;
    let config = Config::load_from_root(&root)?;
    let storage = Storage::new(&root, &config);
    let created_store = !storage.store_dir().exists();
    let created_session = !storage.session_dir().exists();
    storage.init()?;

    let report = InitReport {
        root: root.clone(),
        created: InitCreated {
            config: created_config,
            store_dir: created_store,
            session_dir: created_session,
        },
    };

    let mut created_items = Vec::new();
    if created_config {
        created_items.push(CONFIG_FILE.to_string());
    }
    if created_store {
        created_items.push(display_relative(&root, storage.store_dir()));
    }
    if created_session {
        created_items.push(display_relative(&root, storage.session_dir()));
    }

    let header = if created_items.is_empty() {
        "tb init: nothing to do".to_string()
    } else {
        "tb init: initialized board".to_string()
    };

    let mut human = HumanOutput::new(header);
    human.push_summary("root", root.display().to_string());
    human.push_summary(
        "created",
        if created_items.is_empty() {
            "none".to_string()
        } else {
            created_items.join(", ")
        },
    );
    human.push_next_step("tb contact new <name>");
    human.push_next_step("tb task new <title> --date YYYY-MM-DD");

    emit_success(
        OutputOptions {
            json: global.json,
            quiet: global.quiet,
        },
        "init",
        &report,
        Some(&human),
    )
}

fn ensure_config(root: &Path) -> Result<bool> {
    let path = root.join(CONFIG_FILE);
    if path.exists() {
        return Ok(false);
    }
    Config::default().save(&path)?;
    Ok(true)
}

fn display_relative(root: &Path, path: &Path) -> String {
    let shown = path.strip_prefix(root).unwrap_or(path);
    format!("{}/", shown.display())
}
