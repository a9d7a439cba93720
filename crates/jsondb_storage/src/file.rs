//! Single-file backend.

use crate::backend::StorageBackend;
use crate::error::{StorageError, StorageResult};
use parking_lot::Mutex;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Suffix of the scratch file used by [`FileBackend::replace_contents`].
const TEMP_SUFFIX: &str = "tmp";

#[derive(Debug)]
struct OpenFile {
    file: File,
    size: u64,
}

/// A byte store backed by one OS file.
///
/// `flush` hands buffered bytes to the OS; `sync` calls `sync_all`.
/// Whole-content replacement goes through `<name>.tmp` and a rename, followed
/// by a directory sync on Unix.
///
/// ```no_run
/// use jsondb_storage::{FileBackend, StorageBackend};
/// use std::path::Path;
///
/// let mut journal = FileBackend::open(Path::new("wal.log")).unwrap();
/// journal.append(b"record").unwrap();
/// journal.sync().unwrap();
/// ```
#[derive(Debug)]
pub struct FileBackend {
    path: PathBuf,
    inner: Mutex<OpenFile>,
}

impl FileBackend {
    /// Opens the file at `path`, creating it when missing.
    ///
    /// A stale scratch file left by an interrupted replacement is removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or created.
    pub fn open(path: &Path) -> StorageResult<Self> {
        let temp = temp_path(path);
        if temp.exists() {
            debug!(path = %temp.display(), "removing stale replacement file");
            fs::remove_file(&temp)?;
        }

        let file = open_rw(path)?;
        let size = file.metadata()?.len();
        Ok(Self {
            path: path.to_path_buf(),
            inner: Mutex::new(OpenFile { file, size }),
        })
    }

    /// Like [`FileBackend::open`], creating parent directories first.
    ///
    /// # Errors
    ///
    /// Returns an error if directories cannot be created or the file cannot
    /// be opened.
    pub fn open_with_create_dirs(path: &Path) -> StorageResult<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        Self::open(path)
    }

    /// Path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn open_rw(path: &Path) -> std::io::Result<File> {
    OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".");
    name.push(TEMP_SUFFIX);
    path.with_file_name(name)
}

#[cfg(unix)]
fn sync_parent(path: &Path) -> std::io::Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => File::open(parent)?.sync_all(),
        _ => Ok(()),
    }
}

#[cfg(not(unix))]
fn sync_parent(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

impl StorageBackend for FileBackend {
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>> {
        let mut inner = self.inner.lock();
        let size = inner.size;
        if offset > size || offset.saturating_add(len as u64) > size {
            return Err(StorageError::ReadPastEnd { offset, len, size });
        }
        if len == 0 {
            return Ok(Vec::new());
        }

        inner.file.seek(SeekFrom::Start(offset))?;
        let mut buffer = vec![0u8; len];
        inner.file.read_exact(&mut buffer)?;
        Ok(buffer)
    }

    fn append(&mut self, data: &[u8]) -> StorageResult<u64> {
        let inner = self.inner.get_mut();
        let offset = inner.size;
        if data.is_empty() {
            return Ok(offset);
        }
        inner.file.seek(SeekFrom::End(0))?;
        inner.file.write_all(data)?;
        inner.size += data.len() as u64;
        Ok(offset)
    }

    fn flush(&mut self) -> StorageResult<()> {
        self.inner.get_mut().file.flush()?;
        Ok(())
    }

    fn sync(&mut self) -> StorageResult<()> {
        let inner = self.inner.get_mut();
        inner.file.flush()?;
        inner.file.sync_all()?;
        Ok(())
    }

    fn size(&self) -> StorageResult<u64> {
        Ok(self.inner.lock().size)
    }

    fn truncate(&mut self, new_size: u64) -> StorageResult<()> {
        let inner = self.inner.get_mut();
        if new_size > inner.size {
            return Err(StorageError::InvalidTruncate {
                requested: new_size,
                size: inner.size,
            });
        }
        inner.file.set_len(new_size)?;
        inner.file.sync_all()?;
        inner.size = new_size;
        Ok(())
    }

    fn replace_contents(&mut self, data: &[u8]) -> StorageResult<()> {
        let temp = temp_path(&self.path);
        {
            let mut scratch = File::create(&temp)?;
            scratch.write_all(data)?;
            scratch.sync_all()?;
        }
        fs::rename(&temp, &self.path)?;
        sync_parent(&self.path)?;

        let file = open_rw(&self.path)?;
        *self.inner.get_mut() = OpenFile {
            file,
            size: data.len() as u64,
        };
        debug!(path = %self.path.display(), bytes = data.len(), "replaced file contents");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn data_survives_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("wal.log");
        {
            let mut store = FileBackend::open(&path).unwrap();
            store.append(b"first").unwrap();
            store.append(b"second").unwrap();
            store.sync().unwrap();
        }
        let store = FileBackend::open(&path).unwrap();
        assert_eq!(store.size().unwrap(), 11);
        assert_eq!(store.read_at(5, 6).unwrap(), b"second");
    }

    #[test]
    fn read_past_end_fails() {
        let dir = tempdir().unwrap();
        let mut store = FileBackend::open(&dir.path().join("f")).unwrap();
        store.append(b"abc").unwrap();
        assert!(matches!(
            store.read_at(1, 5),
            Err(StorageError::ReadPastEnd { size: 3, .. })
        ));
    }

    #[test]
    fn truncate_then_append_continues_at_new_end() {
        let dir = tempdir().unwrap();
        let mut store = FileBackend::open(&dir.path().join("f")).unwrap();
        store.append(b"hello world").unwrap();
        store.truncate(5).unwrap();
        assert_eq!(store.append(b"!").unwrap(), 5);
        assert_eq!(store.read_all().unwrap(), b"hello!");
        assert!(store.truncate(50).is_err());
    }

    #[test]
    fn replace_contents_is_visible_after_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("snapshot.dat");
        {
            let mut store = FileBackend::open(&path).unwrap();
            store.append(b"old snapshot bytes").unwrap();
            store.replace_contents(b"new").unwrap();
            assert_eq!(store.size().unwrap(), 3);
        }
        assert!(!temp_path(&path).exists());
        let store = FileBackend::open(&path).unwrap();
        assert_eq!(store.read_all().unwrap(), b"new");
    }

    #[test]
    fn stale_temp_file_is_removed_on_open() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("snapshot.dat");
        fs::write(temp_path(&path), b"half written").unwrap();
        let _store = FileBackend::open(&path).unwrap();
        assert!(!temp_path(&path).exists());
    }

    #[test]
    fn open_with_create_dirs_builds_parents() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a").join("b").join("wal.log");
        let store = FileBackend::open_with_create_dirs(&path).unwrap();
        assert_eq!(store.path(), path.as_path());
        assert!(path.exists());
    }
}
