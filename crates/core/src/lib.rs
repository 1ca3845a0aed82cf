//! Operation dispatch for the mirrorfs passthrough filesystem.
//!
//! [`MirrorFs`] turns each filesystem verb into the matching native call on
//! the real filesystem and hands the result back as a [`Result`]. The only
//! state it owns is the [`HandleTable`] of open files and directory
//! streams, which is safe to share between worker threads.
//!
//! # Example
//!
//! ```no_run
//! use mirrorfs_core::{FilesystemOps, MirrorFs};
//! use std::path::Path;
//!
//! let fs = MirrorFs::new();
//! fs.open(Path::new("/etc/hostname"), nix::libc::O_RDONLY, 1)?;
//! let mut buf = [0u8; 64];
//! let n = fs.read(1, &mut buf, 0)?;
//! println!("{}", String::from_utf8_lossy(&buf[..n]));
//! fs.release(1);
//! # Ok::<(), mirrorfs_core::Error>(())
//! ```

pub mod dir;
pub mod error;
pub mod handle;
pub mod mirror;
pub mod ops;
mod path;

pub use dir::{DirEntry, DirStream};
pub use error::{Error, Result};
pub use handle::{Handle, HandleTable};
pub use mirror::{MirrorFs, read_all};
pub use nix::sys::stat::FileStat;
pub use nix::sys::statvfs::Statvfs;
pub use nix::sys::time::TimeSpec;
pub use ops::{DirFiller, FilesystemOps};
