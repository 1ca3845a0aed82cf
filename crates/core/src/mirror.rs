//! Passthrough implementation of [`FilesystemOps`].

use std::ffi::OsStr;
use std::os::fd::AsRawFd;
use std::os::unix::fs::{FileExt, PermissionsExt};
use std::path::{Path, PathBuf};
use std::ptr;
use std::sync::PoisonError;

use nix::errno::Errno;
use nix::libc;
use nix::sys::stat::{FileStat, Mode, SFlag, UtimensatFlags, fstat, lstat, mknod, utimensat};
use nix::sys::statvfs::{Statvfs, statvfs};
use nix::sys::time::TimeSpec;
use nix::unistd::AccessFlags;

use crate::dir::DirEntry;
use crate::error::{Error, Result};
use crate::handle::{Handle, HandleTable};
use crate::ops::{DirFiller, FilesystemOps};
use crate::path::{os_to_cstring, to_cstring};

/// Mirrors the real filesystem: every verb is one native call on the path
/// or descriptor it was given.
pub struct MirrorFs {
    handles: HandleTable,
}

impl MirrorFs {
    pub fn new() -> Self {
        Self {
            handles: HandleTable::new(),
        }
    }

    pub fn handles(&self) -> &HandleTable {
        &self.handles
    }

    fn reclaim(&self, fh: u64, verb: &str) {
        match self.handles.remove(fh) {
            Ok(handle) => {
                if let Err(e) = handle.close() {
                    tracing::warn!(fh, error = %e, "{verb}: close failed, handle dropped anyway");
                } else {
                    tracing::debug!(fh, "{verb}");
                }
            }
            Err(_) => tracing::warn!(fh, "{verb}: unknown handle"),
        }
    }
}

impl Default for MirrorFs {
    fn default() -> Self {
        Self::new()
    }
}

fn to_off(value: u64) -> Result<libc::off_t> {
    libc::off_t::try_from(value).map_err(|_| Error::InvalidArgument)
}

/// Argument size encoded in an ioctl request number (asm-generic layout).
fn ioctl_size(cmd: u32) -> usize {
    ((cmd >> 16) & 0x3fff) as usize
}

/// Direction bits of an ioctl request number; zero means no argument.
fn ioctl_dir(cmd: u32) -> u32 {
    cmd >> 30
}

/// Argument pointer for `cmd`. Requests that encode no size get a null
/// argument, since the buffer length they touch is unknown.
fn ioctl_arg(cmd: u32, data: &mut [u8]) -> Result<*mut libc::c_void> {
    let size = ioctl_size(cmd);
    if size == 0 || ioctl_dir(cmd) == 0 {
        return Ok(ptr::null_mut());
    }
    if size > data.len() {
        return Err(Error::InvalidArgument);
    }
    Ok(data.as_mut_ptr().cast())
}

fn is_lock_cmd(cmd: i32) -> bool {
    matches!(
        cmd,
        libc::F_GETLK
            | libc::F_SETLK
            | libc::F_SETLKW
            | libc::F_OFD_GETLK
            | libc::F_OFD_SETLK
            | libc::F_OFD_SETLKW
    )
}

fn buf_ptr(buf: &mut [u8]) -> *mut libc::c_void {
    if buf.is_empty() {
        ptr::null_mut()
    } else {
        buf.as_mut_ptr().cast()
    }
}

fn byte_count(ret: libc::ssize_t) -> Result<usize> {
    if ret < 0 {
        return Err(Error::last());
    }
    Ok(ret as usize)
}

impl FilesystemOps for MirrorFs {
    fn access(&self, path: &Path, mask: i32) -> Result<()> {
        Ok(nix::unistd::access(path, AccessFlags::from_bits_truncate(mask))?)
    }

    fn getattr(&self, path: &Path) -> Result<FileStat> {
        Ok(lstat(path)?)
    }

    fn fgetattr(&self, fh: u64) -> Result<FileStat> {
        match self.handles.get(fh)? {
            Handle::File(file) => Ok(fstat(file.as_raw_fd())?),
            Handle::Dir(dir) => dir.lock().unwrap_or_else(PoisonError::into_inner).stat(),
        }
    }

    fn readlink(&self, path: &Path) -> Result<PathBuf> {
        Ok(std::fs::read_link(path)?)
    }

    fn mknod(&self, path: &Path, mode: u32, rdev: u64) -> Result<()> {
        let kind = SFlag::from_bits_truncate(mode & libc::S_IFMT);
        let perm = Mode::from_bits_truncate(mode & !libc::S_IFMT);
        Ok(mknod(path, kind, perm, rdev as libc::dev_t)?)
    }

    fn mkdir(&self, path: &Path, mode: u32) -> Result<()> {
        Ok(nix::unistd::mkdir(path, Mode::from_bits_truncate(mode))?)
    }

    fn unlink(&self, path: &Path) -> Result<()> {
        Ok(std::fs::remove_file(path)?)
    }

    fn rmdir(&self, path: &Path) -> Result<()> {
        Ok(std::fs::remove_dir(path)?)
    }

    fn link(&self, old: &Path, new: &Path) -> Result<()> {
        Ok(std::fs::hard_link(old, new)?)
    }

    fn symlink(&self, target: &Path, link: &Path) -> Result<()> {
        tracing::debug!(target = %target.display(), link = %link.display(), "symlink");
        Ok(std::os::unix::fs::symlink(target, link)?)
    }

    fn rename(&self, from: &Path, to: &Path) -> Result<()> {
        Ok(std::fs::rename(from, to)?)
    }

    fn chmod(&self, path: &Path, mode: u32) -> Result<()> {
        Ok(std::fs::set_permissions(
            path,
            std::fs::Permissions::from_mode(mode),
        )?)
    }

    fn chown(&self, path: &Path, uid: Option<u32>, gid: Option<u32>) -> Result<()> {
        Ok(std::os::unix::fs::chown(path, uid, gid)?)
    }

    fn truncate(&self, path: &Path, size: u64) -> Result<()> {
        Ok(nix::unistd::truncate(path, to_off(size)?)?)
    }

    fn ftruncate(&self, fh: u64, size: u64) -> Result<()> {
        Ok(self.handles.file(fh)?.set_len(size)?)
    }

    fn utimens(&self, path: &Path, atime: TimeSpec, mtime: TimeSpec) -> Result<()> {
        Ok(utimensat(
            None,
            path,
            &atime,
            &mtime,
            UtimensatFlags::FollowSymlink,
        )?)
    }

    fn statfs(&self, path: &Path) -> Result<Statvfs> {
        Ok(statvfs(path)?)
    }

    fn open(&self, path: &Path, flags: i32, fh: u64) -> Result<()> {
        self.handles.open_file(path, flags, fh)?;
        tracing::debug!(fh, path = %path.display(), flags, "open");
        Ok(())
    }

    fn create(&self, path: &Path, mode: u32, flags: i32, fh: u64) -> Result<()> {
        self.handles.create_file(path, flags, mode, fh)?;
        tracing::debug!(fh, path = %path.display(), flags, mode, "create");
        Ok(())
    }

    fn release(&self, fh: u64) {
        self.reclaim(fh, "release");
    }

    fn read(&self, fh: u64, buf: &mut [u8], offset: u64) -> Result<usize> {
        // A failing pread is an error, never an empty read.
        Ok(self.handles.file(fh)?.read_at(buf, offset)?)
    }

    fn write(&self, fh: u64, data: &[u8], offset: u64) -> Result<usize> {
        Ok(self.handles.file(fh)?.write_at(data, offset)?)
    }

    fn fallocate(&self, fh: u64, mode: i32, offset: u64, len: u64) -> Result<()> {
        let file = self.handles.file(fh)?;
        let (offset, len) = (to_off(offset)?, to_off(len)?);
        Errno::result(unsafe { libc::fallocate(file.as_raw_fd(), mode, offset, len) })?;
        Ok(())
    }

    fn lock(&self, fh: u64, cmd: i32, lock: &mut libc::flock) -> Result<()> {
        if !is_lock_cmd(cmd) {
            return Err(Error::InvalidArgument);
        }
        let file = self.handles.file(fh)?;
        Errno::result(unsafe { libc::fcntl(file.as_raw_fd(), cmd, lock as *mut libc::flock) })?;
        Ok(())
    }

    fn flock(&self, fh: u64, op: i32) -> Result<()> {
        let file = self.handles.file(fh)?;
        Errno::result(unsafe { libc::flock(file.as_raw_fd(), op) })?;
        Ok(())
    }

    fn fsync(&self, fh: u64, datasync: bool) -> Result<()> {
        let file = self.handles.file(fh)?;
        if datasync {
            file.sync_data()?;
        } else {
            file.sync_all()?;
        }
        Ok(())
    }

    fn getxattr(&self, path: &Path, name: &OsStr, buf: &mut [u8]) -> Result<usize> {
        let (path, name) = (to_cstring(path)?, os_to_cstring(name)?);
        byte_count(unsafe {
            libc::getxattr(path.as_ptr(), name.as_ptr(), buf_ptr(buf), buf.len())
        })
    }

    fn setxattr(&self, path: &Path, name: &OsStr, value: &[u8], flags: i32) -> Result<()> {
        let (path, name) = (to_cstring(path)?, os_to_cstring(name)?);
        let ret = unsafe {
            libc::setxattr(
                path.as_ptr(),
                name.as_ptr(),
                value.as_ptr().cast(),
                value.len(),
                flags,
            )
        };
        Errno::result(ret)?;
        Ok(())
    }

    fn removexattr(&self, path: &Path, name: &OsStr) -> Result<()> {
        let (path, name) = (to_cstring(path)?, os_to_cstring(name)?);
        Errno::result(unsafe { libc::removexattr(path.as_ptr(), name.as_ptr()) })?;
        Ok(())
    }

    fn listxattr(&self, path: &Path, buf: &mut [u8]) -> Result<usize> {
        let path = to_cstring(path)?;
        byte_count(unsafe { libc::listxattr(path.as_ptr(), buf_ptr(buf).cast(), buf.len()) })
    }

    fn ioctl(&self, fh: u64, cmd: u32, data: &mut [u8]) -> Result<i32> {
        let arg = ioctl_arg(cmd, data)?;
        let file = self.handles.file(fh)?;
        // `arg` is null or points at no fewer bytes than `cmd` encodes.
        let ret = unsafe { libc::ioctl(file.as_raw_fd(), cmd as _, arg) };
        Ok(Errno::result(ret)?)
    }

    fn opendir(&self, path: &Path, fh: u64) -> Result<()> {
        self.handles.open_dir(path, fh)?;
        tracing::debug!(fh, path = %path.display(), "opendir");
        Ok(())
    }

    fn readdir(&self, fh: u64, offset: i64, filler: &mut DirFiller<'_>) -> Result<()> {
        let dir = self.handles.dir(fh)?;
        let mut stream = dir.lock().unwrap_or_else(PoisonError::into_inner);
        stream.seek(offset);
        while let Some(entry) = stream.next_entry()? {
            if filler(&entry) {
                break;
            }
        }
        Ok(())
    }

    fn releasedir(&self, fh: u64) {
        self.reclaim(fh, "releasedir");
    }
}

/// Collects a whole directory through [`FilesystemOps::readdir`].
pub fn read_all<F: FilesystemOps + ?Sized>(fs: &F, fh: u64) -> Result<Vec<DirEntry>> {
    let mut entries = Vec::new();
    fs.readdir(fh, 0, &mut |entry| {
        entries.push(entry.clone());
        false
    })?;
    Ok(entries)
}
