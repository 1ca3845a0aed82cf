//! Bridges kernel requests from `fuser` to a [`FilesystemOps`] dispatcher.
//!
//! Node ids are resolved to real paths on the session thread; the native
//! call and the reply then happen on the worker pool.

use std::ffi::{OsStr, OsString};
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::SystemTime;

use fuser::{
    FileAttr, consts, Filesystem, KernelConfig, ReplyAttr, ReplyCreate, ReplyData, ReplyDirectory,
    ReplyEmpty, ReplyEntry, ReplyIoctl, ReplyLock, ReplyOpen, ReplyStatfs, ReplyWrite,
    ReplyXattr, Request, TimeOrNow,
};
use mirrorfs_core::{Error, FilesystemOps, Result};
use nix::libc::{self, c_int};
use tracing::{info, trace, warn};

use crate::attr::{TTL, dirent_type, file_attr, time_spec};
use crate::inode::InodeTable;
use crate::pool::WorkerPool;

/// Inode number reported for directory entries the kernel has not looked
/// up yet.
pub const FUSE_UNKNOWN_INO: u64 = 0xffff_ffff;

/// End offset the kernel uses for a lock reaching the end of the file.
const OFFSET_MAX: u64 = i64::MAX as u64;

const FUSE_IOCTL_UNRESTRICTED: u32 = 1 << 1;

/// fcntl and flock locks are both forwarded to `setlk`/`getlk`.
const LOCK_CAPABILITIES: [u64; 2] = [consts::FUSE_POSIX_LOCKS, consts::FUSE_FLOCK_LOCKS];

type Inodes = Arc<Mutex<InodeTable>>;

fn lock_inodes(inodes: &Mutex<InodeTable>) -> MutexGuard<'_, InodeTable> {
    inodes.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Stats `path` and registers one kernel lookup of it.
fn entry<F: FilesystemOps + ?Sized>(
    fs: &F,
    inodes: &Mutex<InodeTable>,
    path: PathBuf,
) -> Result<FileAttr> {
    let st = fs.getattr(&path)?;
    let id = lock_inodes(inodes).insert(path, st.st_dev as u64, st.st_ino as u64);
    Ok(file_attr(id, &st))
}

fn to_offset(value: i64) -> Result<u64> {
    u64::try_from(value).map_err(|_| Error::InvalidArgument)
}

/// Lock owners are open file descriptions on the host, one per kernel
/// handle, so `l_pid` stays zero as `F_OFD_*` requires.
fn lock_request(start: u64, end: u64, typ: i32) -> Result<libc::flock> {
    if end < start && end != OFFSET_MAX {
        return Err(Error::InvalidArgument);
    }
    let mut lock: libc::flock = unsafe { std::mem::zeroed() };
    lock.l_type = typ as libc::c_short;
    lock.l_whence = libc::SEEK_SET as libc::c_short;
    lock.l_start = libc::off_t::try_from(start).map_err(|_| Error::InvalidArgument)?;
    lock.l_len = if end >= OFFSET_MAX {
        0
    } else {
        (end - start + 1) as libc::off_t
    };
    Ok(lock)
}

fn lock_range(lock: &libc::flock) -> (u64, u64) {
    let start = lock.l_start as u64;
    let end = if lock.l_len == 0 {
        OFFSET_MAX
    } else {
        start + lock.l_len as u64 - 1
    };
    (start, end)
}

pub struct MirrorFuse<F> {
    fs: Arc<F>,
    inodes: Inodes,
    pool: WorkerPool,
    next_fh: AtomicU64,
}

impl<F: FilesystemOps + 'static> MirrorFuse<F> {
    /// Serves `fs` with the mount root mapped to the real directory `root`.
    pub fn new(fs: F, root: PathBuf, pool: WorkerPool) -> Self {
        Self {
            fs: Arc::new(fs),
            inodes: Arc::new(Mutex::new(InodeTable::new(root))),
            pool,
            next_fh: AtomicU64::new(1),
        }
    }

    fn alloc_fh(&self) -> u64 {
        self.next_fh.fetch_add(1, Ordering::Relaxed)
    }

    fn path(&self, ino: u64) -> Result<PathBuf> {
        lock_inodes(&self.inodes).get_path(ino)
    }

    fn child(&self, parent: u64, name: &OsStr) -> Result<PathBuf> {
        lock_inodes(&self.inodes).child_path(parent, name)
    }

    fn dispatch<J>(&self, job: J)
    where
        J: FnOnce(&F, &Mutex<InodeTable>) + Send + 'static,
    {
        let fs = Arc::clone(&self.fs);
        let inodes = Arc::clone(&self.inodes);
        self.pool.run(move || job(&fs, &inodes));
    }

    /// Runs a call that answers with a fresh directory entry for `path`.
    fn dispatch_entry<C>(&self, path: PathBuf, reply: ReplyEntry, call: C)
    where
        C: FnOnce(&F, &Path) -> Result<()> + Send + 'static,
    {
        self.dispatch(move |fs, inodes| {
            let result = call(fs, &path).and_then(|()| entry(fs, inodes, path));
            match result {
                Ok(attr) => reply.entry(&TTL, &attr, 0),
                Err(e) => reply.error(e.errno()),
            }
        });
    }

    /// Runs a call that answers with success or an errno.
    fn dispatch_empty<C>(&self, reply: ReplyEmpty, call: C)
    where
        C: FnOnce(&F, &Mutex<InodeTable>) -> Result<()> + Send + 'static,
    {
        self.dispatch(move |fs, inodes| match call(fs, inodes) {
            Ok(()) => reply.ok(),
            Err(e) => reply.error(e.errno()),
        });
    }
}

impl<F: FilesystemOps + 'static> Filesystem for MirrorFuse<F> {
    fn init(
        &mut self,
        _req: &Request<'_>,
        config: &mut KernelConfig,
    ) -> std::result::Result<(), c_int> {
        let root = self.path(fuser::FUSE_ROOT_ID).map_err(|e| e.errno())?;
        // Without these the kernel keeps fcntl and flock locks to itself.
        for capability in LOCK_CAPABILITIES {
            if let Err(missing) = config.add_capabilities(capability) {
                warn!(missing, "remote locking unavailable, locks stay local");
            }
        }
        info!(
            root = %root.display(),
            inline = self.pool.is_inline(),
            "mirrorfs session started"
        );
        Ok(())
    }

    fn destroy(&mut self) {
        info!("mirrorfs session ended");
    }

    fn lookup(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEntry) {
        trace!(parent, ?name, "lookup");
        let path = match self.child(parent, name) {
            Ok(p) => p,
            Err(e) => return reply.error(e.errno()),
        };
        self.dispatch_entry(path, reply, |_, _| Ok(()));
    }

    fn forget(&mut self, _req: &Request<'_>, ino: u64, nlookup: u64) {
        trace!(ino, nlookup, "forget");
        lock_inodes(&self.inodes).forget(ino, nlookup);
    }

    fn getattr(&mut self, _req: &Request<'_>, ino: u64, fh: Option<u64>, reply: ReplyAttr) {
        trace!(ino, ?fh, "getattr");
        let path = match self.path(ino) {
            Ok(p) => p,
            Err(e) => return reply.error(e.errno()),
        };
        self.dispatch(move |fs, _| {
            let result = match fh {
                Some(fh) => fs.fgetattr(fh),
                None => fs.getattr(&path),
            };
            match result {
                Ok(st) => reply.attr(&TTL, &file_attr(ino, &st)),
                Err(e) => reply.error(e.errno()),
            }
        });
    }

    fn setattr(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        mode: Option<u32>,
        uid: Option<u32>,
        gid: Option<u32>,
        size: Option<u64>,
        atime: Option<TimeOrNow>,
        mtime: Option<TimeOrNow>,
        _ctime: Option<SystemTime>,
        fh: Option<u64>,
        _crtime: Option<SystemTime>,
        _chgtime: Option<SystemTime>,
        _bkuptime: Option<SystemTime>,
        _flags: Option<u32>,
        reply: ReplyAttr,
    ) {
        trace!(ino, ?mode, ?uid, ?gid, ?size, ?fh, "setattr");
        let path = match self.path(ino) {
            Ok(p) => p,
            Err(e) => return reply.error(e.errno()),
        };
        self.dispatch(move |fs, _| {
            let result = (|| {
                if let Some(mode) = mode {
                    fs.chmod(&path, mode)?;
                }
                if uid.is_some() || gid.is_some() {
                    fs.chown(&path, uid, gid)?;
                }
                if let Some(size) = size {
                    match fh {
                        Some(fh) => fs.ftruncate(fh, size)?,
                        None => fs.truncate(&path, size)?,
                    }
                }
                if atime.is_some() || mtime.is_some() {
                    fs.utimens(&path, time_spec(atime), time_spec(mtime))?;
                }
                fs.getattr(&path)
            })();
            match result {
                Ok(st) => reply.attr(&TTL, &file_attr(ino, &st)),
                Err(e) => reply.error(e.errno()),
            }
        });
    }

    fn readlink(&mut self, _req: &Request<'_>, ino: u64, reply: ReplyData) {
        trace!(ino, "readlink");
        let path = match self.path(ino) {
            Ok(p) => p,
            Err(e) => return reply.error(e.errno()),
        };
        self.dispatch(move |fs, _| match fs.readlink(&path) {
            Ok(target) => reply.data(target.as_os_str().as_bytes()),
            Err(e) => reply.error(e.errno()),
        });
    }

    fn mknod(
        &mut self,
        _req: &Request<'_>,
        parent: u64,
        name: &OsStr,
        mode: u32,
        _umask: u32,
        rdev: u32,
        reply: ReplyEntry,
    ) {
        trace!(parent, ?name, mode, rdev, "mknod");
        let path = match self.child(parent, name) {
            Ok(p) => p,
            Err(e) => return reply.error(e.errno()),
        };
        self.dispatch_entry(path, reply, move |fs, path| {
            fs.mknod(path, mode, rdev as u64)
        });
    }

    fn mkdir(
        &mut self,
        _req: &Request<'_>,
        parent: u64,
        name: &OsStr,
        mode: u32,
        _umask: u32,
        reply: ReplyEntry,
    ) {
        trace!(parent, ?name, mode, "mkdir");
        let path = match self.child(parent, name) {
            Ok(p) => p,
            Err(e) => return reply.error(e.errno()),
        };
        self.dispatch_entry(path, reply, move |fs, path| fs.mkdir(path, mode));
    }

    fn unlink(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEmpty) {
        trace!(parent, ?name, "unlink");
        let path = match self.child(parent, name) {
            Ok(p) => p,
            Err(e) => return reply.error(e.errno()),
        };
        self.dispatch_empty(reply, move |fs, inodes| {
            fs.unlink(&path)?;
            lock_inodes(inodes).remove_path(&path);
            Ok(())
        });
    }

    fn rmdir(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEmpty) {
        trace!(parent, ?name, "rmdir");
        let path = match self.child(parent, name) {
            Ok(p) => p,
            Err(e) => return reply.error(e.errno()),
        };
        self.dispatch_empty(reply, move |fs, inodes| {
            fs.rmdir(&path)?;
            lock_inodes(inodes).remove_path(&path);
            Ok(())
        });
    }

    fn symlink(
        &mut self,
        _req: &Request<'_>,
        parent: u64,
        link_name: &OsStr,
        target: &Path,
        reply: ReplyEntry,
    ) {
        trace!(parent, ?link_name, ?target, "symlink");
        let path = match self.child(parent, link_name) {
            Ok(p) => p,
            Err(e) => return reply.error(e.errno()),
        };
        let target = target.to_path_buf();
        self.dispatch_entry(path, reply, move |fs, path| fs.symlink(&target, path));
    }

    fn rename(
        &mut self,
        _req: &Request<'_>,
        parent: u64,
        name: &OsStr,
        newparent: u64,
        newname: &OsStr,
        flags: u32,
        reply: ReplyEmpty,
    ) {
        trace!(parent, ?name, newparent, ?newname, flags, "rename");
        // RENAME_NOREPLACE and RENAME_EXCHANGE have no passthrough verb.
        if flags != 0 {
            return reply.error(libc::EINVAL);
        }
        let (from, to) = match (self.child(parent, name), self.child(newparent, newname)) {
            (Ok(from), Ok(to)) => (from, to),
            (Err(e), _) | (_, Err(e)) => return reply.error(e.errno()),
        };
        self.dispatch_empty(reply, move |fs, inodes| {
            fs.rename(&from, &to)?;
            lock_inodes(inodes).rename(&from, &to);
            Ok(())
        });
    }

    fn link(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        newparent: u64,
        newname: &OsStr,
        reply: ReplyEntry,
    ) {
        trace!(ino, newparent, ?newname, "link");
        let (old, new) = match (self.path(ino), self.child(newparent, newname)) {
            (Ok(old), Ok(new)) => (old, new),
            (Err(e), _) | (_, Err(e)) => return reply.error(e.errno()),
        };
        self.dispatch_entry(new, reply, move |fs, new| fs.link(&old, new));
    }

    fn open(&mut self, _req: &Request<'_>, ino: u64, flags: i32, reply: ReplyOpen) {
        trace!(ino, flags, "open");
        let path = match self.path(ino) {
            Ok(p) => p,
            Err(e) => return reply.error(e.errno()),
        };
        let fh = self.alloc_fh();
        self.dispatch(move |fs, _| match fs.open(&path, flags, fh) {
            Ok(()) => reply.opened(fh, 0),
            Err(e) => reply.error(e.errno()),
        });
    }

    fn read(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        fh: u64,
        offset: i64,
        size: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyData,
    ) {
        trace!(ino, fh, offset, size, "read");
        self.dispatch(move |fs, _| {
            let mut buf = vec![0u8; size as usize];
            match to_offset(offset).and_then(|off| fs.read(fh, &mut buf, off)) {
                Ok(n) => reply.data(&buf[..n]),
                Err(e) => reply.error(e.errno()),
            }
        });
    }

    fn write(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        fh: u64,
        offset: i64,
        data: &[u8],
        _write_flags: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyWrite,
    ) {
        trace!(ino, fh, offset, len = data.len(), "write");
        let data = data.to_vec();
        self.dispatch(move |fs, _| {
            match to_offset(offset).and_then(|off| fs.write(fh, &data, off)) {
                Ok(n) => reply.written(n as u32),
                Err(e) => reply.error(e.errno()),
            }
        });
    }

    fn flush(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        fh: u64,
        _lock_owner: u64,
        reply: ReplyEmpty,
    ) {
        trace!(ino, fh, "flush");
        reply.ok();
    }

    fn release(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        fh: u64,
        _flags: i32,
        _lock_owner: Option<u64>,
        _flush: bool,
        reply: ReplyEmpty,
    ) {
        trace!(ino, fh, "release");
        self.dispatch(move |fs, _| {
            fs.release(fh);
            reply.ok();
        });
    }

    fn fsync(&mut self, _req: &Request<'_>, ino: u64, fh: u64, datasync: bool, reply: ReplyEmpty) {
        trace!(ino, fh, datasync, "fsync");
        self.dispatch_empty(reply, move |fs, _| fs.fsync(fh, datasync));
    }

    fn opendir(&mut self, _req: &Request<'_>, ino: u64, _flags: i32, reply: ReplyOpen) {
        trace!(ino, "opendir");
        let path = match self.path(ino) {
            Ok(p) => p,
            Err(e) => return reply.error(e.errno()),
        };
        let fh = self.alloc_fh();
        self.dispatch(move |fs, _| match fs.opendir(&path, fh) {
            Ok(()) => reply.opened(fh, 0),
            Err(e) => reply.error(e.errno()),
        });
    }

    fn readdir(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        fh: u64,
        offset: i64,
        mut reply: ReplyDirectory,
    ) {
        trace!(ino, fh, offset, "readdir");
        self.dispatch(move |fs, inodes| {
            let dev = match fs.fgetattr(fh) {
                Ok(st) => st.st_dev as u64,
                Err(e) => return reply.error(e.errno()),
            };
            let result = fs.readdir(fh, offset, &mut |entry| {
                let known = lock_inodes(inodes).find(dev, entry.ino);
                reply.add(
                    known.unwrap_or(FUSE_UNKNOWN_INO),
                    entry.offset,
                    dirent_type(entry.kind),
                    &entry.name,
                )
            });
            match result {
                Ok(()) => reply.ok(),
                Err(e) => reply.error(e.errno()),
            }
        });
    }

    fn releasedir(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        fh: u64,
        _flags: i32,
        reply: ReplyEmpty,
    ) {
        trace!(ino, fh, "releasedir");
        self.dispatch(move |fs, _| {
            fs.releasedir(fh);
            reply.ok();
        });
    }

    fn fsyncdir(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        fh: u64,
        _datasync: bool,
        reply: ReplyEmpty,
    ) {
        trace!(ino, fh, "fsyncdir");
        reply.ok();
    }

    fn statfs(&mut self, _req: &Request<'_>, ino: u64, reply: ReplyStatfs) {
        trace!(ino, "statfs");
        let path = match self.path(ino) {
            Ok(p) => p,
            Err(e) => return reply.error(e.errno()),
        };
        self.dispatch(move |fs, _| match fs.statfs(&path) {
            Ok(st) => reply.statfs(
                st.blocks() as u64,
                st.blocks_free() as u64,
                st.blocks_available() as u64,
                st.files() as u64,
                st.files_free() as u64,
                st.block_size() as u32,
                st.name_max() as u32,
                st.fragment_size() as u32,
            ),
            Err(e) => reply.error(e.errno()),
        });
    }

    fn setxattr(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        name: &OsStr,
        value: &[u8],
        flags: i32,
        _position: u32,
        reply: ReplyEmpty,
    ) {
        trace!(ino, ?name, len = value.len(), flags, "setxattr");
        let path = match self.path(ino) {
            Ok(p) => p,
            Err(e) => return reply.error(e.errno()),
        };
        let (name, value) = (name.to_os_string(), value.to_vec());
        self.dispatch_empty(reply, move |fs, _| fs.setxattr(&path, &name, &value, flags));
    }

    fn getxattr(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        name: &OsStr,
        size: u32,
        reply: ReplyXattr,
    ) {
        trace!(ino, ?name, size, "getxattr");
        let path = match self.path(ino) {
            Ok(p) => p,
            Err(e) => return reply.error(e.errno()),
        };
        let name = name.to_os_string();
        self.dispatch(move |fs, _| {
            let mut buf = vec![0u8; size as usize];
            match fs.getxattr(&path, &name, &mut buf) {
                Ok(n) if size == 0 => reply.size(n as u32),
                Ok(n) => reply.data(&buf[..n]),
                Err(e) => reply.error(e.errno()),
            }
        });
    }

    fn listxattr(&mut self, _req: &Request<'_>, ino: u64, size: u32, reply: ReplyXattr) {
        trace!(ino, size, "listxattr");
        let path = match self.path(ino) {
            Ok(p) => p,
            Err(e) => return reply.error(e.errno()),
        };
        self.dispatch(move |fs, _| {
            let mut buf = vec![0u8; size as usize];
            match fs.listxattr(&path, &mut buf) {
                Ok(n) if size == 0 => reply.size(n as u32),
                Ok(n) => reply.data(&buf[..n]),
                Err(e) => reply.error(e.errno()),
            }
        });
    }

    fn removexattr(&mut self, _req: &Request<'_>, ino: u64, name: &OsStr, reply: ReplyEmpty) {
        trace!(ino, ?name, "removexattr");
        let path = match self.path(ino) {
            Ok(p) => p,
            Err(e) => return reply.error(e.errno()),
        };
        let name: OsString = name.to_os_string();
        self.dispatch_empty(reply, move |fs, _| fs.removexattr(&path, &name));
    }

    fn access(&mut self, _req: &Request<'_>, ino: u64, mask: i32, reply: ReplyEmpty) {
        trace!(ino, mask, "access");
        let path = match self.path(ino) {
            Ok(p) => p,
            Err(e) => return reply.error(e.errno()),
        };
        self.dispatch_empty(reply, move |fs, _| fs.access(&path, mask));
    }

    fn create(
        &mut self,
        _req: &Request<'_>,
        parent: u64,
        name: &OsStr,
        mode: u32,
        _umask: u32,
        flags: i32,
        reply: ReplyCreate,
    ) {
        trace!(parent, ?name, mode, flags, "create");
        let path = match self.child(parent, name) {
            Ok(p) => p,
            Err(e) => return reply.error(e.errno()),
        };
        let fh = self.alloc_fh();
        self.dispatch(move |fs, inodes| {
            if let Err(e) = fs.create(&path, mode, flags, fh) {
                return reply.error(e.errno());
            }
            match entry(fs, inodes, path) {
                Ok(attr) => reply.created(&TTL, &attr, 0, fh, 0),
                Err(e) => {
                    // The kernel never learns about fh, so nothing else
                    // would release it.
                    fs.release(fh);
                    reply.error(e.errno());
                }
            }
        });
    }

    fn getlk(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        fh: u64,
        _lock_owner: u64,
        start: u64,
        end: u64,
        typ: i32,
        _pid: u32,
        reply: ReplyLock,
    ) {
        trace!(ino, fh, start, end, typ, "getlk");
        self.dispatch(move |fs, _| {
            let result = lock_request(start, end, typ).and_then(|mut lock| {
                fs.lock(fh, libc::F_OFD_GETLK, &mut lock)?;
                Ok(lock)
            });
            match result {
                Ok(lock) => {
                    let (start, end) = lock_range(&lock);
                    // Holders of OFD locks report a pid of -1.
                    let pid = u32::try_from(lock.l_pid).unwrap_or(0);
                    reply.locked(start, end, lock.l_type as i32, pid);
                }
                Err(e) => reply.error(e.errno()),
            }
        });
    }

    fn setlk(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        fh: u64,
        _lock_owner: u64,
        start: u64,
        end: u64,
        typ: i32,
        _pid: u32,
        sleep: bool,
        reply: ReplyEmpty,
    ) {
        trace!(ino, fh, start, end, typ, sleep, "setlk");
        let cmd = if sleep {
            libc::F_OFD_SETLKW
        } else {
            libc::F_OFD_SETLK
        };
        self.dispatch_empty(reply, move |fs, _| {
            let mut lock = lock_request(start, end, typ)?;
            fs.lock(fh, cmd, &mut lock)
        });
    }

    fn ioctl(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        fh: u64,
        flags: u32,
        cmd: u32,
        in_data: &[u8],
        out_size: u32,
        reply: ReplyIoctl,
    ) {
        trace!(ino, fh, flags, cmd, out_size, "ioctl");
        if flags & FUSE_IOCTL_UNRESTRICTED != 0 {
            return reply.error(libc::EPERM);
        }
        let out_size = out_size as usize;
        let mut data = in_data.to_vec();
        data.resize(data.len().max(out_size), 0);
        self.dispatch(move |fs, _| match fs.ioctl(fh, cmd, &mut data) {
            Ok(ret) => reply.ioctl(ret, &data[..out_size]),
            Err(e) => reply.error(e.errno()),
        });
    }

    fn fallocate(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        fh: u64,
        offset: i64,
        length: i64,
        mode: i32,
        reply: ReplyEmpty,
    ) {
        trace!(ino, fh, offset, length, mode, "fallocate");
        self.dispatch_empty(reply, move |fs, _| {
            let (offset, length) = (to_offset(offset)?, to_offset(length)?);
            fs.fallocate(fh, mode, offset, length)
        });
    }
}
