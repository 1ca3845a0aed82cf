//! Conversions between host stat data and kernel attribute replies.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use fuser::{FileAttr, FileType, TimeOrNow};
use nix::libc;
use nix::sys::stat::FileStat;
use nix::sys::time::TimeSpec;

/// Attributes are never cached by the kernel.
pub const TTL: Duration = Duration::ZERO;

fn system_time(secs: i64, nsecs: i64) -> SystemTime {
    let nanos = nsecs.clamp(0, 999_999_999) as u32;
    if secs >= 0 {
        UNIX_EPOCH + Duration::new(secs as u64, nanos)
    } else {
        UNIX_EPOCH - Duration::from_secs(secs.unsigned_abs()) + Duration::from_nanos(nanos as u64)
    }
}

pub fn file_type(mode: u32) -> FileType {
    match mode & libc::S_IFMT {
        libc::S_IFDIR => FileType::Directory,
        libc::S_IFLNK => FileType::Symlink,
        libc::S_IFIFO => FileType::NamedPipe,
        libc::S_IFCHR => FileType::CharDevice,
        libc::S_IFBLK => FileType::BlockDevice,
        libc::S_IFSOCK => FileType::Socket,
        _ => FileType::RegularFile,
    }
}

/// Maps a `d_type` value. `DT_UNKNOWN` is reported as a regular file; the
/// kernel looks the entry up before trusting its type anyway.
pub fn dirent_type(d_type: u8) -> FileType {
    match d_type {
        libc::DT_DIR => FileType::Directory,
        libc::DT_LNK => FileType::Symlink,
        libc::DT_FIFO => FileType::NamedPipe,
        libc::DT_CHR => FileType::CharDevice,
        libc::DT_BLK => FileType::BlockDevice,
        libc::DT_SOCK => FileType::Socket,
        _ => FileType::RegularFile,
    }
}

/// Builds the kernel's view of `st`, reported under node id `ino`.
pub fn file_attr(ino: u64, st: &FileStat) -> FileAttr {
    let ctime = system_time(st.st_ctime, st.st_ctime_nsec);
    FileAttr {
        ino,
        size: st.st_size as u64,
        blocks: st.st_blocks as u64,
        atime: system_time(st.st_atime, st.st_atime_nsec),
        mtime: system_time(st.st_mtime, st.st_mtime_nsec),
        ctime,
        crtime: ctime,
        kind: file_type(st.st_mode),
        perm: (st.st_mode & 0o7777) as u16,
        nlink: st.st_nlink as u32,
        uid: st.st_uid,
        gid: st.st_gid,
        rdev: st.st_rdev as u32,
        blksize: st.st_blksize as u32,
        flags: 0,
    }
}

/// Timestamp argument for `utimens`; an absent time is left untouched.
pub fn time_spec(time: Option<TimeOrNow>) -> TimeSpec {
    match time {
        None => TimeSpec::new(0, libc::UTIME_OMIT),
        Some(TimeOrNow::Now) => TimeSpec::new(0, libc::UTIME_NOW),
        Some(TimeOrNow::SpecificTime(t)) => match t.duration_since(UNIX_EPOCH) {
            Ok(d) => TimeSpec::from_duration(d),
            Err(e) => {
                let before = e.duration();
                let secs = -(before.as_secs() as i64);
                let nanos = before.subsec_nanos() as i64;
                if nanos == 0 {
                    TimeSpec::new(secs, 0)
                } else {
                    TimeSpec::new(secs - 1, 1_000_000_000 - nanos)
                }
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn attr_substitutes_node_id() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("f");
        fs::write(&path, "hello").unwrap();
        let st = nix::sys::stat::lstat(&path).unwrap();

        let attr = file_attr(7, &st);
        assert_eq!(attr.ino, 7);
        assert_eq!(attr.size, 5);
        assert_eq!(attr.kind, FileType::RegularFile);
        assert_eq!(attr.perm as u32, st.st_mode & 0o7777);
        assert_eq!(attr.uid, st.st_uid);
    }

    #[test]
    fn directory_and_symlink_kinds() {
        let tmp = TempDir::new().unwrap();
        std::os::unix::fs::symlink("nowhere", tmp.path().join("l")).unwrap();

        let dir = nix::sys::stat::lstat(tmp.path()).unwrap();
        let link = nix::sys::stat::lstat(&tmp.path().join("l")).unwrap();
        assert_eq!(file_attr(1, &dir).kind, FileType::Directory);
        assert_eq!(file_attr(2, &link).kind, FileType::Symlink);
    }

    #[test]
    fn dirent_types() {
        assert_eq!(dirent_type(libc::DT_DIR), FileType::Directory);
        assert_eq!(dirent_type(libc::DT_REG), FileType::RegularFile);
        assert_eq!(dirent_type(libc::DT_UNKNOWN), FileType::RegularFile);
    }

    #[test]
    fn times_keep_nanoseconds() {
        let t = system_time(1_000, 250);
        assert_eq!(
            t.duration_since(UNIX_EPOCH).unwrap(),
            Duration::new(1_000, 250)
        );
        assert!(system_time(-5, 0) < UNIX_EPOCH);
    }

    #[test]
    fn utimens_arguments() {
        assert_eq!(time_spec(None).tv_nsec(), libc::UTIME_OMIT);
        assert_eq!(time_spec(Some(TimeOrNow::Now)).tv_nsec(), libc::UTIME_NOW);

        let t = UNIX_EPOCH + Duration::new(42, 7);
        let spec = time_spec(Some(TimeOrNow::SpecificTime(t)));
        assert_eq!((spec.tv_sec(), spec.tv_nsec()), (42, 7));

        let before = UNIX_EPOCH - Duration::from_millis(1_500);
        let spec = time_spec(Some(TimeOrNow::SpecificTime(before)));
        assert_eq!((spec.tv_sec(), spec.tv_nsec()), (-2, 500_000_000));
    }
}
