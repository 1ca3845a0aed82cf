//! FUSE transport for mirrorfs.
//!
//! [`MirrorFuse`] receives typed requests from the kernel through `fuser`,
//! translates node ids to real paths with an [`InodeTable`], and hands each
//! request to a [`FilesystemOps`](mirrorfs_core::FilesystemOps) dispatcher
//! on a [`WorkerPool`].

pub mod adapter;
pub mod attr;
pub mod inode;
pub mod pool;

use std::io;
use std::path::Path;

use fuser::{BackgroundSession, MountOption};
use mirrorfs_core::FilesystemOps;

pub use adapter::{FUSE_UNKNOWN_INO, MirrorFuse};
pub use inode::{InodeTable, ROOT_ID};
pub use pool::WorkerPool;

/// Kernel-side options for a mount.
#[derive(Debug, Clone)]
pub struct MountConfig {
    pub fsname: String,
    pub allow_other: bool,
    pub allow_root: bool,
    pub auto_unmount: bool,
    pub read_only: bool,
}

impl Default for MountConfig {
    fn default() -> Self {
        Self {
            fsname: "mirrorfs".to_string(),
            allow_other: false,
            allow_root: false,
            auto_unmount: false,
            read_only: false,
        }
    }
}

impl MountConfig {
    pub fn options(&self) -> Vec<MountOption> {
        let mut options = vec![
            MountOption::FSName(self.fsname.clone()),
            MountOption::Subtype("mirrorfs".to_string()),
        ];
        if self.allow_other {
            options.push(MountOption::AllowOther);
        }
        if self.allow_root {
            options.push(MountOption::AllowRoot);
        }
        if self.auto_unmount {
            options.push(MountOption::AutoUnmount);
        }
        if self.read_only {
            options.push(MountOption::RO);
        }
        options
    }
}

/// Mounts `fs` at `mountpoint` and serves requests until it is unmounted.
pub fn mount<F>(fs: MirrorFuse<F>, mountpoint: &Path, config: &MountConfig) -> io::Result<()>
where
    F: FilesystemOps + 'static,
{
    tracing::info!(mountpoint = %mountpoint.display(), fsname = %config.fsname, "mounting");
    fuser::mount2(fs, mountpoint, &config.options())
}

/// Mounts `fs` and serves it from a background thread. The mount goes away
/// when the returned session is dropped.
pub fn spawn_mount<F>(
    fs: MirrorFuse<F>,
    mountpoint: &Path,
    config: &MountConfig,
) -> io::Result<BackgroundSession>
where
    F: FilesystemOps + 'static,
{
    tracing::info!(mountpoint = %mountpoint.display(), fsname = %config.fsname, "mounting");
    fuser::spawn_mount2(fs, mountpoint, &config.options())
}
