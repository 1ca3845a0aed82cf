use nix::errno::Errno;
use nix::libc;

/// Error kinds a filesystem operation can fail with.
///
/// Every failure originates at exactly one native call and is translated
/// once, by [`Error::from_errno`]. The kinds the kernel protocol depends on
/// get their own variant; everything else travels as [`Error::Other`] with
/// the original code so it reaches the client unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("no such file or directory")]
    NotFound,

    #[error("permission denied")]
    PermissionDenied,

    #[error("operation not permitted")]
    NotPermitted,

    #[error("file exists")]
    AlreadyExists,

    #[error("not a directory")]
    NotADirectory,

    #[error("is a directory")]
    IsADirectory,

    #[error("directory not empty")]
    NotEmpty,

    #[error("no space left on device")]
    NoSpace,

    #[error("invalid argument")]
    InvalidArgument,

    #[error("operation not supported")]
    Unsupported,

    #[error("no open handle with id {0}")]
    InvalidHandle(u64),

    #[error("os error {0}")]
    Other(i32),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Translates a host errno value into an error kind.
    pub fn from_errno(errno: i32) -> Self {
        match errno {
            libc::ENOENT => Error::NotFound,
            libc::EACCES => Error::PermissionDenied,
            libc::EPERM => Error::NotPermitted,
            libc::EEXIST => Error::AlreadyExists,
            libc::ENOTDIR => Error::NotADirectory,
            libc::EISDIR => Error::IsADirectory,
            libc::ENOTEMPTY => Error::NotEmpty,
            libc::ENOSPC => Error::NoSpace,
            libc::EINVAL => Error::InvalidArgument,
            libc::EOPNOTSUPP => Error::Unsupported,
            other => Error::Other(other),
        }
    }

    /// The positive errno value to put on the wire for this error.
    pub fn errno(&self) -> i32 {
        match self {
            Error::NotFound => libc::ENOENT,
            Error::PermissionDenied => libc::EACCES,
            Error::NotPermitted => libc::EPERM,
            Error::AlreadyExists => libc::EEXIST,
            Error::NotADirectory => libc::ENOTDIR,
            Error::IsADirectory => libc::EISDIR,
            Error::NotEmpty => libc::ENOTEMPTY,
            Error::NoSpace => libc::ENOSPC,
            Error::InvalidArgument => libc::EINVAL,
            Error::Unsupported => libc::EOPNOTSUPP,
            Error::InvalidHandle(_) => libc::EBADF,
            Error::Other(code) => *code,
        }
    }

    /// Reads `errno` left behind by the last failing libc call.
    pub fn last() -> Self {
        Errno::last().into()
    }
}

impl From<Errno> for Error {
    fn from(errno: Errno) -> Self {
        Error::from_errno(errno as i32)
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        if let Some(code) = e.raw_os_error() {
            return Error::from_errno(code);
        }
        match e.kind() {
            std::io::ErrorKind::NotFound => Error::NotFound,
            std::io::ErrorKind::PermissionDenied => Error::PermissionDenied,
            std::io::ErrorKind::InvalidInput => Error::InvalidArgument,
            _ => Error::Other(libc::EIO),
        }
    }
}
