//! File locking and atomic writes for on-disk board state
//!
//! - Exclusive locks (fs2/flock) on a sibling `<file>.lock`
//! - Atomic write pattern (write temp + rename)
//! - Locked read-modify-write of JSON documents
//!
//! Used by the file-backed remote store and the directory session store so
//! that concurrent `tb` processes never observe a half-written document.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use fs2::FileExt;
use serde::{de::DeserializeOwned, Serialize};

use crate::error::{Error, Result};

/// Default lock timeout in milliseconds
pub const DEFAULT_LOCK_TIMEOUT_MS: u64 = 5000;

const LOCK_RETRY_INTERVAL_MS: u64 = 25;

fn is_lock_contended(err: &io::Error) -> bool {
    if err.kind() == io::ErrorKind::WouldBlock {
        return true;
    }

    // On Windows, fs2/libc can surface lock/sharing violations as "Other".
    #[cfg(windows)]
    {
        matches!(err.raw_os_error(), Some(32) | Some(33))
    }
    #[cfg(not(windows))]
    {
        false
    }
}

/// Path of the lock file guarding `path`
pub fn lock_path_for(path: &Path) -> PathBuf {
    PathBuf::from(format!("{}.lock", path.display()))
}

fn open_lock_file(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    Ok(OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)?)
}

/// A file lock guard that releases the lock when dropped
pub struct FileLock {
    file: File,
    path: PathBuf,
}

impl FileLock {
    /// Acquire an exclusive lock, retrying until `timeout_ms` elapses
    pub fn acquire(path: impl AsRef<Path>, timeout_ms: u64) -> Result<Self> {
        let path = path.as_ref();
        let file = open_lock_file(path)?;

        let start = Instant::now();
        let timeout = Duration::from_millis(timeout_ms);
        let retry_interval = Duration::from_millis(LOCK_RETRY_INTERVAL_MS);

        loop {
            match file.try_lock_exclusive() {
                Ok(()) => {
                    return Ok(FileLock {
                        file,
                        path: path.to_path_buf(),
                    });
                }
                Err(e) if is_lock_contended(&e) => {
                    if start.elapsed() >= timeout {
                        return Err(Error::LockFailed(path.to_path_buf()));
                    }
                    std::thread::sleep(retry_interval);
                }
                Err(e) => return Err(Error::Io(e)),
            }
        }
    }

    /// Try to acquire a lock without waiting
    ///
    /// Returns `Ok(None)` when another holder has it.
    pub fn try_acquire(path: impl AsRef<Path>) -> Result<Option<Self>> {
        let path = path.as_ref();
        let file = open_lock_file(path)?;
        match file.try_lock_exclusive() {
            Ok(()) => Ok(Some(FileLock {
                file,
                path: path.to_path_buf(),
            })),
            Err(e) if is_lock_contended(&e) => Ok(None),
            Err(e) => Err(Error::Io(e)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}

/// Atomically write data to a file (temp file in the same directory + rename)
///
/// Does not lock; callers coordinating with other processes hold a
/// [`FileLock`] first.
pub fn write_atomic(path: impl AsRef<Path>, data: &[u8]) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let temp_path = path.with_extension(format!(
        "{}.tmp.{}",
        path.extension().and_then(|e| e.to_str()).unwrap_or(""),
        std::process::id()
    ));

    let mut temp_file = File::create(&temp_path)?;
    temp_file.write_all(data)?;
    temp_file.sync_all()?;
    drop(temp_file);

    fs::rename(&temp_path, path)?;
    Ok(())
}

/// Read a JSON document under its lock; `None` when the file does not exist
pub fn read_json_locked<T: DeserializeOwned>(path: &Path, timeout_ms: u64) -> Result<Option<T>> {
    let _lock = FileLock::acquire(lock_path_for(path), timeout_ms)?;
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    Ok(Some(serde_json::from_str(&content)?))
}

/// Locked read-modify-write of a JSON document
///
/// The document starts from `T::default()` when the file is missing. The
/// file is rewritten only when `f` succeeds.
pub fn update_json_locked<T, R, F>(path: &Path, timeout_ms: u64, f: F) -> Result<R>
where
    T: Serialize + DeserializeOwned + Default,
    F: FnOnce(&mut T) -> Result<R>,
{
    let _lock = FileLock::acquire(lock_path_for(path), timeout_ms)?;
    let mut document: T = if path.exists() {
        let content = fs::read_to_string(path)?;
        serde_json::from_str(&content)?
    } else {
        T::default()
    };

    let result = f(&mut document)?;
    let json = serde_json::to_string_pretty(&document)?;
    write_atomic(path, json.as_bytes())?;
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::sync::{Arc, Barrier};
    use std::thread;
    use tempfile::TempDir;

    #[test]
    fn lock_is_exclusive_until_dropped() {
        let temp_dir = TempDir::new().unwrap();
        let lock_path = temp_dir.path().join("tasks.json.lock");

        let lock = FileLock::acquire(&lock_path, 1000).unwrap();
        assert_eq!(lock.path(), lock_path.as_path());
        assert!(FileLock::try_acquire(&lock_path).unwrap().is_none());

        drop(lock);
        assert!(FileLock::try_acquire(&lock_path).unwrap().is_some());
    }

    #[test]
    fn timeout_returns_lock_failed() {
        let temp_dir = TempDir::new().unwrap();
        let lock_path = temp_dir.path().join("timeout.lock");

        let _lock = FileLock::acquire(&lock_path, 1000).unwrap();
        let result = FileLock::acquire(&lock_path, 50);
        assert!(matches!(result, Err(Error::LockFailed(_))));
    }

    #[test]
    fn atomic_write_replaces_content() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("nested").join("doc.json");

        write_atomic(&file_path, b"[1]").unwrap();
        write_atomic(&file_path, b"[1,2]").unwrap();
        assert_eq!(fs::read_to_string(&file_path).unwrap(), "[1,2]");
    }

    #[test]
    fn failed_update_leaves_document_untouched() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("doc.json");

        update_json_locked::<BTreeMap<String, u32>, _, _>(&path, 1000, |doc| {
            doc.insert("a".to_string(), 1);
            Ok(())
        })
        .unwrap();

        let result = update_json_locked::<BTreeMap<String, u32>, (), _>(&path, 1000, |doc| {
            doc.insert("b".to_string(), 2);
            Err(Error::LockFailed(PathBuf::from("doc.json")))
        });
        assert!(result.is_err());

        let doc: BTreeMap<String, u32> = read_json_locked(&path, 1000).unwrap().unwrap();
        assert_eq!(doc.len(), 1);
    }

    #[test]
    fn concurrent_updates_are_serialized() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("counter.json");

        let threads = 8;
        let barrier = Arc::new(Barrier::new(threads));
        let mut handles = Vec::with_capacity(threads);
        for _ in 0..threads {
            let barrier = Arc::clone(&barrier);
            let path = path.clone();
            handles.push(thread::spawn(move || {
                barrier.wait();
                update_json_locked::<BTreeMap<String, u32>, _, _>(&path, 5000, |doc| {
                    *doc.entry("count".to_string()).or_insert(0) += 1;
                    Ok(())
                })
                .unwrap();
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        let doc: BTreeMap<String, u32> = read_json_locked(&path, 1000).unwrap().unwrap();
        assert_eq!(doc.get("count"), Some(&(threads as u32)));
    }
}
