use std::ffi::{CString, OsStr};
use std::os::unix::ffi::OsStrExt;
use std::path::Path;

use crate::error::{Error, Result};

/// Converts a path for a raw libc call. Interior NUL bytes cannot name
/// anything on the real filesystem.
pub(crate) fn to_cstring(path: &Path) -> Result<CString> {
    os_to_cstring(path.as_os_str())
}

pub(crate) fn os_to_cstring(s: &OsStr) -> Result<CString> {
    CString::new(s.as_bytes()).map_err(|_| Error::InvalidArgument)
}
