use std::fs;

use taskboard::config::{Config, CONFIG_FILE};
use taskboard::error::Error;
use taskboard::storage::Storage;

#[test]
fn load_from_root_rejects_malformed_toml() {
    let dir = tempfile::tempdir().expect("tempdir");
    fs::write(dir.path().join(CONFIG_FILE), "[board\nmax = ").expect("write config");

    let err = Config::load_from_root(dir.path()).unwrap_err();
    assert!(matches!(err, Error::TomlParse(_)));
}

#[test]
fn load_from_root_rejects_shared_store_and_session_dirs() {
    let dir = tempfile::tempdir().expect("tempdir");
    let content = r#"
[store]
dir = "data"

[session]
dir = "data"
"#;
    fs::write(dir.path().join(CONFIG_FILE), content.trim()).expect("write config");

    let err = Config::load_from_root(dir.path()).unwrap_err();
    assert!(matches!(err, Error::InvalidConfig(_)));
}

#[test]
fn storage_follows_configured_dirs() {
    let dir = tempfile::tempdir().expect("tempdir");
    let content = r#"
[store]
dir = "shared/remote"
lock_timeout_ms = 250
"#;
    fs::write(dir.path().join(CONFIG_FILE), content.trim()).expect("write config");

    let config = Config::load_from_root(dir.path()).expect("config");
    assert_eq!(config.store.lock_timeout_ms, 250);

    let storage = Storage::new(dir.path(), &config);
    storage.init().expect("init");
    assert!(dir.path().join("shared/remote").is_dir());
    assert!(dir.path().join(".taskboard/session").is_dir());
}
