//! Database directory management.
//!
//! This module handles the file system layout for JsonDB:
//!
//! ```text
//! <db_path>/
//! ├─ LOCK              # Advisory lock for single-process access
//! ├─ wal.log           # Write-ahead log
//! └─ snapshot.dat      # Last checkpoint
//! ```
//!
//! The LOCK file ensures only one process opens the database at a time.

use crate::error::{CoreError, CoreResult};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

/// File names within the database directory.
const LOCK_FILE: &str = "LOCK";
const WAL_FILE: &str = "wal.log";
const SNAPSHOT_FILE: &str = "snapshot.dat";

/// Manages the database directory structure and file locking.
///
/// The `DatabaseDir` holds an exclusive lock on the directory for as long
/// as it lives.
#[derive(Debug)]
pub struct DatabaseDir {
    /// Root directory path.
    path: PathBuf,
    /// Lock file handle (held for exclusive access).
    _lock_file: File,
}

impl DatabaseDir {
    /// Opens or creates a database directory.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The directory doesn't exist and `create_if_missing` is false
    /// - The database exists and `error_if_exists` is true
    /// - Another process holds the lock (returns `DatabaseLocked`)
    /// - I/O errors occur
    pub fn open(path: &Path, create_if_missing: bool, error_if_exists: bool) -> CoreResult<Self> {
        if !path.exists() {
            if create_if_missing {
                fs::create_dir_all(path)?;
            } else {
                return Err(CoreError::invalid_format(format!(
                    "database directory does not exist: {}",
                    path.display()
                )));
            }
        }

        if !path.is_dir() {
            return Err(CoreError::invalid_format(format!(
                "path is not a directory: {}",
                path.display()
            )));
        }

        if error_if_exists && (path.join(WAL_FILE).exists() || path.join(SNAPSHOT_FILE).exists()) {
            return Err(CoreError::invalid_operation(format!(
                "database already exists: {}",
                path.display()
            )));
        }

        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path.join(LOCK_FILE))?;

        if lock_file.try_lock_exclusive().is_err() {
            return Err(CoreError::DatabaseLocked);
        }

        Ok(Self {
            path: path.to_path_buf(),
            _lock_file: lock_file,
        })
    }

    /// Returns the path to the database directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the path to the WAL file.
    #[must_use]
    pub fn wal_path(&self) -> PathBuf {
        self.path.join(WAL_FILE)
    }

    /// Returns the path to the snapshot file.
    #[must_use]
    pub fn snapshot_path(&self) -> PathBuf {
        self.path.join(SNAPSHOT_FILE)
    }
}
