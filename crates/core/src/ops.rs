//! The set of filesystem verbs a transport can dispatch.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use nix::libc;
use nix::sys::stat::FileStat;
use nix::sys::statvfs::Statvfs;
use nix::sys::time::TimeSpec;

use crate::dir::DirEntry;
use crate::error::Result;

/// Receives directory entries from [`FilesystemOps::readdir`]. Returns
/// `true` once the reply buffer is full and enumeration must stop.
pub type DirFiller<'a> = dyn FnMut(&DirEntry) -> bool + 'a;

/// One method per filesystem verb.
///
/// Paths are absolute paths on the real filesystem and are resolved anew on
/// every call. Handle-scoped verbs take the instance id the transport chose
/// when it called [`open`](Self::open), [`create`](Self::create) or
/// [`opendir`](Self::opendir), and never fall back to a path.
pub trait FilesystemOps: Send + Sync {
    fn access(&self, path: &Path, mask: i32) -> Result<()>;

    fn getattr(&self, path: &Path) -> Result<FileStat>;

    fn fgetattr(&self, fh: u64) -> Result<FileStat>;

    fn readlink(&self, path: &Path) -> Result<PathBuf>;

    /// `mode` carries both the file type bits and the permissions.
    fn mknod(&self, path: &Path, mode: u32, rdev: u64) -> Result<()>;

    fn mkdir(&self, path: &Path, mode: u32) -> Result<()>;

    fn unlink(&self, path: &Path) -> Result<()>;

    fn rmdir(&self, path: &Path) -> Result<()>;

    fn link(&self, old: &Path, new: &Path) -> Result<()>;

    fn symlink(&self, target: &Path, link: &Path) -> Result<()>;

    fn rename(&self, from: &Path, to: &Path) -> Result<()>;

    fn chmod(&self, path: &Path, mode: u32) -> Result<()>;

    /// `None` leaves the corresponding id unchanged.
    fn chown(&self, path: &Path, uid: Option<u32>, gid: Option<u32>) -> Result<()>;

    fn truncate(&self, path: &Path, size: u64) -> Result<()>;

    fn ftruncate(&self, fh: u64, size: u64) -> Result<()>;

    /// Accepts `UTIME_NOW` and `UTIME_OMIT` in the nanosecond fields.
    fn utimens(&self, path: &Path, atime: TimeSpec, mtime: TimeSpec) -> Result<()>;

    fn statfs(&self, path: &Path) -> Result<Statvfs>;

    fn open(&self, path: &Path, flags: i32, fh: u64) -> Result<()>;

    fn create(&self, path: &Path, mode: u32, flags: i32, fh: u64) -> Result<()>;

    /// Always drops the handle. The protocol has no use for a close error,
    /// so none is returned.
    fn release(&self, fh: u64);

    /// Returns the number of bytes read; `Ok(0)` means end of file. A read
    /// the host rejects is an error, never `Ok(0)`.
    fn read(&self, fh: u64, buf: &mut [u8], offset: u64) -> Result<usize>;

    /// Returns the number of bytes written, which may be short.
    fn write(&self, fh: u64, data: &[u8], offset: u64) -> Result<usize>;

    fn fallocate(&self, fh: u64, mode: i32, offset: u64, len: u64) -> Result<()>;

    /// POSIX record lock. `F_GETLK` writes the conflicting lock back.
    fn lock(&self, fh: u64, cmd: i32, lock: &mut libc::flock) -> Result<()>;

    fn flock(&self, fh: u64, op: i32) -> Result<()>;

    fn fsync(&self, fh: u64, datasync: bool) -> Result<()>;

    /// With an empty `buf`, returns the size the value needs.
    fn getxattr(&self, path: &Path, name: &OsStr, buf: &mut [u8]) -> Result<usize>;

    fn setxattr(&self, path: &Path, name: &OsStr, value: &[u8], flags: i32) -> Result<()>;

    fn removexattr(&self, path: &Path, name: &OsStr) -> Result<()>;

    /// With an empty `buf`, returns the size the name list needs.
    fn listxattr(&self, path: &Path, buf: &mut [u8]) -> Result<usize>;

    /// `data` is both the input and the output buffer of the request. It is
    /// handed to the host only for requests that encode a direction and a
    /// size, and only when it holds that many bytes. Other requests get a
    /// null argument.
    fn ioctl(&self, fh: u64, cmd: u32, data: &mut [u8]) -> Result<i32>;

    fn opendir(&self, path: &Path, fh: u64) -> Result<()>;

    /// Repositions the stream to `offset` and feeds entries to `filler`
    /// until it is full or the directory is exhausted.
    fn readdir(&self, fh: u64, offset: i64, filler: &mut DirFiller<'_>) -> Result<()>;

    fn releasedir(&self, fh: u64);
}
