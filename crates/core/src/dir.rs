//! Directory stream cursor over a native `DIR*`.

use std::ffi::{CStr, OsStr, OsString};
use std::os::unix::ffi::OsStrExt;
use std::path::Path;
use std::ptr::NonNull;

use nix::errno::Errno;
use nix::libc;
use nix::sys::stat::{FileStat, fstat};

use crate::error::{Error, Result};
use crate::path::to_cstring;

/// One entry yielded by [`DirStream::next_entry`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub ino: u64,
    /// Cursor positioned just after this entry; pass it back to resume.
    pub offset: i64,
    /// `d_type` as reported by the filesystem (`DT_UNKNOWN` allowed).
    pub kind: u8,
    pub name: OsString,
}

pub struct DirStream {
    dir: NonNull<libc::DIR>,
}

// The stream is only ever driven by one thread at a time (the handle table
// keeps it behind a mutex), which is all `DIR*` requires.
unsafe impl Send for DirStream {}

impl DirStream {
    pub fn open(path: &Path) -> Result<Self> {
        let path = to_cstring(path)?;
        let dir = unsafe { libc::opendir(path.as_ptr()) };
        NonNull::new(dir)
            .map(|dir| DirStream { dir })
            .ok_or_else(Error::last)
    }

    pub fn seek(&mut self, offset: i64) {
        unsafe { libc::seekdir(self.dir.as_ptr(), offset as libc::c_long) }
    }

    /// Returns the next entry, `Ok(None)` at end of stream.
    pub fn next_entry(&mut self) -> Result<Option<DirEntry>> {
        // readdir reports both end-of-stream and failure as NULL; only errno
        // tells them apart.
        Errno::clear();
        let entry = unsafe { libc::readdir(self.dir.as_ptr()) };
        if entry.is_null() {
            return match std::io::Error::last_os_error().raw_os_error() {
                None | Some(0) => Ok(None),
                Some(code) => Err(Error::from_errno(code)),
            };
        }

        let entry = unsafe { &*entry };
        let name = unsafe { CStr::from_ptr(entry.d_name.as_ptr()) };
        Ok(Some(DirEntry {
            ino: entry.d_ino as u64,
            offset: entry.d_off as i64,
            kind: entry.d_type,
            name: OsStr::from_bytes(name.to_bytes()).to_os_string(),
        }))
    }

    pub fn stat(&self) -> Result<FileStat> {
        let fd = unsafe { libc::dirfd(self.dir.as_ptr()) };
        if fd < 0 {
            return Err(Error::last());
        }
        Ok(fstat(fd)?)
    }

    /// Closes the stream, reporting what closedir(3) said.
    pub fn close(self) -> Result<()> {
        let dir = self.dir;
        std::mem::forget(self);
        if unsafe { libc::closedir(dir.as_ptr()) } == -1 {
            return Err(Error::last());
        }
        Ok(())
    }
}

impl Drop for DirStream {
    fn drop(&mut self) {
        unsafe { libc::closedir(self.dir.as_ptr()) };
    }
}
