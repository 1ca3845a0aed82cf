//! Open file and directory handle tracking.
//!
//! Maps the instance ids handed out by the transport to the native
//! resource behind them. The table lock only guards the map; native calls
//! run on a cloned `Arc` after the lock is dropped.

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::os::fd::IntoRawFd;
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use nix::libc;

use crate::dir::DirStream;
use crate::error::{Error, Result};

#[derive(Clone)]
pub enum Handle {
    File(Arc<File>),
    Dir(Arc<Mutex<DirStream>>),
}

impl Handle {
    /// Reclaims the native resource and reports the close error, if any.
    ///
    /// When another worker still holds the resource the close is deferred
    /// to that worker's drop and nothing can be reported.
    pub fn close(self) -> Result<()> {
        match self {
            Handle::File(file) => match Arc::try_unwrap(file) {
                Ok(file) => Ok(nix::unistd::close(file.into_raw_fd())?),
                Err(_) => Ok(()),
            },
            Handle::Dir(dir) => match Arc::try_unwrap(dir) {
                Ok(dir) => dir.into_inner().unwrap_or_else(PoisonError::into_inner).close(),
                Err(_) => Ok(()),
            },
        }
    }

    pub fn is_dir(&self) -> bool {
        matches!(self, Handle::Dir(_))
    }
}

pub struct HandleTable {
    handles: Mutex<HashMap<u64, Handle>>,
}

impl HandleTable {
    pub fn new() -> Self {
        Self {
            handles: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<u64, Handle>> {
        self.handles.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn open_file(&self, path: &Path, flags: i32, fh: u64) -> Result<()> {
        let file = open_options(flags).open(path)?;
        self.insert(fh, Handle::File(Arc::new(file)))
    }

    pub fn create_file(&self, path: &Path, flags: i32, mode: u32, fh: u64) -> Result<()> {
        let file = open_options(flags | libc::O_CREAT).mode(mode).open(path)?;
        self.insert(fh, Handle::File(Arc::new(file)))
    }

    pub fn open_dir(&self, path: &Path, fh: u64) -> Result<()> {
        let dir = DirStream::open(path)?;
        self.insert(fh, Handle::Dir(Arc::new(Mutex::new(dir))))
    }

    /// Registers `handle` under `fh`. A live entry is never replaced: the
    /// new resource is closed and the call fails.
    pub fn insert(&self, fh: u64, handle: Handle) -> Result<()> {
        let mut handles = self.lock();
        if handles.contains_key(&fh) {
            drop(handles);
            tracing::warn!(fh, "refusing to reuse a live handle id");
            if let Err(e) = handle.close() {
                tracing::debug!(fh, error = %e, "closing refused handle failed");
            }
            return Err(Error::InvalidHandle(fh));
        }
        handles.insert(fh, handle);
        Ok(())
    }

    pub fn get(&self, fh: u64) -> Result<Handle> {
        self.lock().get(&fh).cloned().ok_or(Error::InvalidHandle(fh))
    }

    pub fn file(&self, fh: u64) -> Result<Arc<File>> {
        match self.get(fh)? {
            Handle::File(file) => Ok(file),
            Handle::Dir(_) => Err(Error::IsADirectory),
        }
    }

    pub fn dir(&self, fh: u64) -> Result<Arc<Mutex<DirStream>>> {
        match self.get(fh)? {
            Handle::Dir(dir) => Ok(dir),
            Handle::File(_) => Err(Error::NotADirectory),
        }
    }

    pub fn remove(&self, fh: u64) -> Result<Handle> {
        self.lock().remove(&fh).ok_or(Error::InvalidHandle(fh))
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for HandleTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Builds open options that hand `flags` to open(2) untouched apart from
/// the access mode, which std insists on setting itself.
fn open_options(flags: i32) -> OpenOptions {
    let access = flags & libc::O_ACCMODE;
    let mut options = OpenOptions::new();
    options
        .read(access == libc::O_RDONLY || access == libc::O_RDWR)
        .write(access == libc::O_WRONLY || access == libc::O_RDWR)
        .custom_flags(flags & !libc::O_ACCMODE);
    options
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::os::unix::fs::FileExt;
    use tempfile::TempDir;

    #[test]
    fn open_and_read_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("test.txt");
        fs::write(&path, "hello world").unwrap();

        let table = HandleTable::new();
        table.open_file(&path, libc::O_RDONLY, 1).unwrap();

        let mut buf = [0u8; 100];
        let n = table.file(1).unwrap().read_at(&mut buf, 0).unwrap();
        assert_eq!(&buf[..n], b"hello world");

        table.remove(1).unwrap().close().unwrap();
        assert_eq!(table.get(1).err(), Some(Error::InvalidHandle(1)));
    }

    #[test]
    fn open_and_write_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("test.txt");
        fs::write(&path, "").unwrap();

        let table = HandleTable::new();
        table.open_file(&path, libc::O_RDWR, 2).unwrap();

        let n = table.file(2).unwrap().write_at(b"hello", 0).unwrap();
        assert_eq!(n, 5);

        table.remove(2).unwrap().close().unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "hello");
    }

    #[test]
    fn open_passes_truncate_through() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("test.txt");
        fs::write(&path, "old contents").unwrap();

        let table = HandleTable::new();
        table
            .open_file(&path, libc::O_WRONLY | libc::O_TRUNC, 3)
            .unwrap();
        assert_eq!(fs::metadata(&path).unwrap().len(), 0);
    }

    #[test]
    fn failed_open_creates_no_handle() {
        let tmp = TempDir::new().unwrap();
        let table = HandleTable::new();

        let result = table.open_file(&tmp.path().join("missing"), libc::O_RDONLY, 4);
        assert_eq!(result, Err(Error::NotFound));
        assert!(table.is_empty());
    }

    #[test]
    fn create_honours_access_mode() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("new.txt");

        let table = HandleTable::new();
        table.create_file(&path, libc::O_RDWR, 0o640, 5).unwrap();

        let file = table.file(5).unwrap();
        file.write_at(b"abc", 0).unwrap();
        let mut buf = [0u8; 3];
        assert_eq!(file.read_at(&mut buf, 0).unwrap(), 3);
        assert_eq!(&buf, b"abc");
    }

    #[test]
    fn create_exclusive_on_existing_fails() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("exists.txt");
        fs::write(&path, "").unwrap();

        let table = HandleTable::new();
        let result = table.create_file(&path, libc::O_WRONLY | libc::O_EXCL, 0o644, 6);
        assert_eq!(result, Err(Error::AlreadyExists));
        assert!(table.is_empty());
    }

    #[test]
    fn live_id_is_not_overwritten() {
        let tmp = TempDir::new().unwrap();
        let first = tmp.path().join("first.txt");
        let second = tmp.path().join("second.txt");
        fs::write(&first, "first").unwrap();
        fs::write(&second, "second").unwrap();

        let table = HandleTable::new();
        table.open_file(&first, libc::O_RDONLY, 7).unwrap();

        let result = table.open_file(&second, libc::O_RDONLY, 7);
        assert_eq!(result, Err(Error::InvalidHandle(7)));

        let mut buf = [0u8; 16];
        let n = table.file(7).unwrap().read_at(&mut buf, 0).unwrap();
        assert_eq!(&buf[..n], b"first");
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn refused_insert_closes_new_handle() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("test.txt");
        fs::write(&path, "").unwrap();

        let table = HandleTable::new();
        table.open_file(&path, libc::O_RDONLY, 12).unwrap();

        let dir = DirStream::open(tmp.path()).unwrap();
        let result = table.insert(12, Handle::Dir(Arc::new(Mutex::new(dir))));
        assert_eq!(result, Err(Error::InvalidHandle(12)));
        assert!(!table.get(12).unwrap().is_dir());
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn id_reusable_after_remove() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("test.txt");
        fs::write(&path, "").unwrap();

        let table = HandleTable::new();
        table.open_file(&path, libc::O_RDONLY, 8).unwrap();
        table.remove(8).unwrap().close().unwrap();
        table.open_file(&path, libc::O_RDONLY, 8).unwrap();
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn kind_mismatch() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("test.txt");
        fs::write(&path, "").unwrap();

        let table = HandleTable::new();
        table.open_file(&path, libc::O_RDONLY, 9).unwrap();
        table.open_dir(tmp.path(), 10).unwrap();

        assert_eq!(table.dir(9).err(), Some(Error::NotADirectory));
        assert_eq!(table.file(10).err(), Some(Error::IsADirectory));
        assert!(table.get(10).unwrap().is_dir());
    }

    #[test]
    fn close_deferred_while_in_use() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("test.txt");
        fs::write(&path, "still here").unwrap();

        let table = HandleTable::new();
        table.open_file(&path, libc::O_RDONLY, 11).unwrap();

        let in_flight = table.file(11).unwrap();
        table.remove(11).unwrap().close().unwrap();

        let mut buf = [0u8; 16];
        let n = in_flight.read_at(&mut buf, 0).unwrap();
        assert_eq!(&buf[..n], b"still here");
        assert_eq!(table.get(11).err(), Some(Error::InvalidHandle(11)));
    }

    #[test]
    fn unknown_id_is_invalid_handle() {
        let table = HandleTable::new();
        assert_eq!(table.get(42).err(), Some(Error::InvalidHandle(42)));
        assert_eq!(table.remove(42).err(), Some(Error::InvalidHandle(42)));
    }
}
