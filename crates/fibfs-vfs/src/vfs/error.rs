//! VFS error types.

use std::io;
use thiserror::Error;

/// VFS error type.
///
/// Every variant maps onto a POSIX errno via [`VfsError::errno`], which is
/// what the host interface hands back to filesystem clients.
#[derive(Debug, Error)]
pub enum VfsError {
    /// File or directory not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Invalid path (e.g. not slash-rooted).
    #[error("invalid path: {0}")]
    InvalidPath(String),

    /// Operation on a handle that is not (or no longer) open.
    #[error("bad file handle: {0}")]
    BadHandle(u64),

    /// I/O error from the backing filesystem.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl VfsError {
    /// Create a NotFound error.
    pub fn not_found(path: impl Into<String>) -> Self {
        Self::NotFound(path.into())
    }

    /// Create an InvalidPath error.
    pub fn invalid_path(path: impl Into<String>) -> Self {
        Self::InvalidPath(path.into())
    }

    /// POSIX errno for this error.
    ///
    /// Backing I/O errors keep the raw OS code of the failed primitive.
    pub fn errno(&self) -> i32 {
        match self {
            VfsError::NotFound(_) => libc::ENOENT,
            VfsError::InvalidPath(_) => libc::EINVAL,
            VfsError::BadHandle(_) => libc::EBADF,
            VfsError::Io(e) => e.raw_os_error().unwrap_or_else(|| match e.kind() {
                io::ErrorKind::NotFound => libc::ENOENT,
                io::ErrorKind::PermissionDenied => libc::EACCES,
                io::ErrorKind::AlreadyExists => libc::EEXIST,
                io::ErrorKind::InvalidInput => libc::EINVAL,
                _ => libc::EIO,
            }),
        }
    }
}

#[cfg(unix)]
impl From<rustix::io::Errno> for VfsError {
    fn from(e: rustix::io::Errno) -> Self {
        VfsError::Io(e.into())
    }
}

/// Convert VfsError to std::io::Error for compatibility.
impl From<VfsError> for io::Error {
    fn from(e: VfsError) -> Self {
        match e {
            VfsError::Io(e) => e,
            other => io::Error::from_raw_os_error(other.errno()),
        }
    }
}

/// VFS result type.
pub type VfsResult<T> = Result<T, VfsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_keeps_raw_os_error() {
        let err = VfsError::from(io::Error::from_raw_os_error(libc::ENOSPC));
        assert_eq!(err.errno(), libc::ENOSPC);
    }

    #[test]
    fn test_io_without_os_code_falls_back_by_kind() {
        let err = VfsError::from(io::Error::new(io::ErrorKind::NotFound, "gone"));
        assert_eq!(err.errno(), libc::ENOENT);

        let err = VfsError::from(io::Error::other("weird"));
        assert_eq!(err.errno(), libc::EIO);
    }

    #[test]
    fn test_rustix_errno_conversion() {
        let err = VfsError::from(rustix::io::Errno::NOTDIR);
        assert_eq!(err.errno(), libc::ENOTDIR);
    }

    #[test]
    fn test_into_io_error() {
        let io_err: io::Error = VfsError::BadHandle(7).into();
        assert_eq!(io_err.raw_os_error(), Some(libc::EBADF));
    }
}
